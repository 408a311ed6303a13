// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use clap::{Arg, ArgAction, Command, crate_version, value_parser};

fn space_arg() -> Arg {
    Arg::new("space")
        .long("space")
        .short('s')
        .required(true)
        .help("Space ID or name")
}

fn json_args() -> [Arg; 2] {
    [
        Arg::new("json")
            .long("json")
            .action(ArgAction::SetTrue)
            .help("Print as pretty JSON"),
        Arg::new("jsonl")
            .long("jsonl")
            .action(ArgAction::SetTrue)
            .conflicts_with("json")
            .help("Print as JSON lines"),
    ]
}

fn id_arg(help: &'static str) -> Arg {
    Arg::new("id").required(true).help(help)
}

fn amount_arg(required: bool) -> Arg {
    Arg::new("amount")
        .long("amount")
        .required(required)
        .help("Amount in major units, e.g. 12.50")
}

fn frequency_arg(required: bool) -> Arg {
    Arg::new("frequency")
        .long("frequency")
        .short('f')
        .required(required)
        .value_parser(["daily", "weekly", "biweekly", "monthly", "yearly"])
}

fn tag_arg() -> Arg {
    Arg::new("tag")
        .long("tag")
        .short('t')
        .action(ArgAction::Append)
        .help("Tag ID or name; repeatable")
}

fn window_args(start_required: bool) -> [Arg; 2] {
    [
        Arg::new("start")
            .long("start")
            .required(start_required)
            .help("YYYY-MM-DD [HH:MM[:SS]]"),
        Arg::new("end")
            .long("end")
            .help("Inclusive; a bare date means the end of that day"),
    ]
}

fn type_arg() -> Arg {
    Arg::new("type")
        .long("type")
        .value_parser(["expense", "topup"])
}

fn method_arg() -> Arg {
    Arg::new("method")
        .long("method")
        .help("Payment method ID or name")
}

fn at_arg() -> Arg {
    Arg::new("at")
        .long("at")
        .help("Evaluate as of this instant instead of now")
}

pub fn build_cli() -> Command {
    Command::new("budgit")
        .about("Shared budgets with recurring expenses, recurring deposits and tag budgets")
        .version(crate_version!())
        .subcommand_required(false)
        .subcommand(Command::new("init").about("Create the database if missing"))
        .subcommand(
            Command::new("space")
                .about("Manage spaces")
                .subcommand(Command::new("add").arg(Arg::new("name").required(true)))
                .subcommand(Command::new("list").args(json_args())),
        )
        .subcommand(
            Command::new("account")
                .about("Money accounts within a space")
                .subcommand(
                    Command::new("add")
                        .arg(space_arg())
                        .arg(Arg::new("name").required(true)),
                )
                .subcommand(Command::new("list").arg(space_arg()).args(json_args()))
                .subcommand(
                    Command::new("transfer")
                        .about("Move money between the space and an account")
                        .arg(space_arg())
                        .arg(Arg::new("account").long("account").short('a').required(true))
                        .arg(amount_arg(true))
                        .arg(
                            Arg::new("direction")
                                .long("direction")
                                .value_parser(["deposit", "withdrawal"])
                                .default_value("deposit"),
                        )
                        .arg(Arg::new("note").long("note")),
                )
                .subcommand(
                    Command::new("history")
                        .arg(space_arg())
                        .arg(Arg::new("account").long("account").short('a').required(true))
                        .args(json_args()),
                )
                .subcommand(
                    Command::new("transfer-rm")
                        .about("Delete a transfer by ID")
                        .arg(Arg::new("id").required(true)),
                ),
        )
        .subcommand(
            Command::new("tag")
                .about("Tags within a space")
                .subcommand(
                    Command::new("add")
                        .arg(space_arg())
                        .arg(Arg::new("name").required(true))
                        .arg(Arg::new("color").long("color")),
                )
                .subcommand(Command::new("list").arg(space_arg()).args(json_args())),
        )
        .subcommand(
            Command::new("method")
                .about("Payment methods within a space")
                .subcommand(
                    Command::new("add")
                        .arg(space_arg())
                        .arg(Arg::new("name").required(true)),
                )
                .subcommand(Command::new("list").arg(space_arg()).args(json_args())),
        )
        .subcommand(
            Command::new("expense")
                .about("One-off expenses and top-ups")
                .subcommand(
                    Command::new("add")
                        .arg(space_arg())
                        .arg(Arg::new("description").long("description").short('d').required(true))
                        .arg(amount_arg(true))
                        .arg(type_arg().default_value("expense"))
                        .arg(Arg::new("date").long("date").help("Defaults to now"))
                        .arg(tag_arg())
                        .arg(method_arg()),
                )
                .subcommand(
                    Command::new("list")
                        .arg(space_arg())
                        .arg(
                            Arg::new("limit")
                                .long("limit")
                                .value_parser(value_parser!(usize)),
                        )
                        .args(json_args()),
                )
                .subcommand(
                    Command::new("edit")
                        .arg(id_arg("Expense ID"))
                        .arg(Arg::new("description").long("description").short('d'))
                        .arg(amount_arg(false))
                        .arg(type_arg())
                        .arg(Arg::new("date").long("date"))
                        .arg(tag_arg())
                        .arg(method_arg()),
                )
                .subcommand(Command::new("rm").arg(id_arg("Expense ID"))),
        )
        .subcommand(
            Command::new("recurring")
                .about("Recurring expenses and top-ups")
                .subcommand(
                    Command::new("add")
                        .arg(space_arg())
                        .arg(Arg::new("description").long("description").short('d').required(true))
                        .arg(amount_arg(true))
                        .arg(type_arg().default_value("expense"))
                        .arg(frequency_arg(true))
                        .args(window_args(true))
                        .arg(tag_arg())
                        .arg(method_arg()),
                )
                .subcommand(Command::new("list").arg(space_arg()).args(json_args()))
                .subcommand(
                    Command::new("edit")
                        .arg(id_arg("Recurring expense ID"))
                        .arg(Arg::new("description").long("description").short('d'))
                        .arg(amount_arg(false))
                        .arg(type_arg())
                        .arg(frequency_arg(false))
                        .args(window_args(false))
                        .arg(
                            Arg::new("no-end")
                                .long("no-end")
                                .action(ArgAction::SetTrue)
                                .conflicts_with("end"),
                        )
                        .arg(tag_arg())
                        .arg(method_arg()),
                )
                .subcommand(Command::new("toggle").arg(id_arg("Recurring expense ID")))
                .subcommand(Command::new("rm").arg(id_arg("Recurring expense ID"))),
        )
        .subcommand(
            Command::new("deposit")
                .about("Recurring deposits into accounts")
                .subcommand(
                    Command::new("add")
                        .arg(space_arg())
                        .arg(Arg::new("account").long("account").short('a').required(true))
                        .arg(amount_arg(true))
                        .arg(frequency_arg(true))
                        .args(window_args(true))
                        .arg(Arg::new("title").long("title").default_value("")),
                )
                .subcommand(Command::new("list").arg(space_arg()).args(json_args()))
                .subcommand(
                    Command::new("edit")
                        .arg(id_arg("Recurring deposit ID"))
                        .arg(Arg::new("account").long("account").short('a'))
                        .arg(amount_arg(false))
                        .arg(frequency_arg(false))
                        .args(window_args(false))
                        .arg(
                            Arg::new("no-end")
                                .long("no-end")
                                .action(ArgAction::SetTrue)
                                .conflicts_with("end"),
                        )
                        .arg(Arg::new("title").long("title")),
                )
                .subcommand(Command::new("toggle").arg(id_arg("Recurring deposit ID")))
                .subcommand(Command::new("rm").arg(id_arg("Recurring deposit ID"))),
        )
        .subcommand(
            Command::new("budget")
                .about("Tag budgets")
                .subcommand(
                    Command::new("add")
                        .arg(space_arg())
                        .arg(tag_arg().required(true))
                        .arg(amount_arg(true))
                        .arg(
                            Arg::new("period")
                                .long("period")
                                .short('p')
                                .value_parser(["weekly", "monthly", "yearly"])
                                .default_value("monthly"),
                        )
                        .args(window_args(false)),
                )
                .subcommand(Command::new("list").arg(space_arg()).args(json_args()))
                .subcommand(
                    Command::new("report")
                        .about("Spend of every active budget in its current period")
                        .arg(space_arg())
                        .arg(at_arg())
                        .args(json_args()),
                )
                .subcommand(
                    Command::new("edit")
                        .arg(id_arg("Budget ID"))
                        .arg(tag_arg())
                        .arg(amount_arg(false))
                        .arg(
                            Arg::new("period")
                                .long("period")
                                .short('p')
                                .value_parser(["weekly", "monthly", "yearly"]),
                        )
                        .args(window_args(false))
                        .arg(
                            Arg::new("no-end")
                                .long("no-end")
                                .action(ArgAction::SetTrue)
                                .conflicts_with("end"),
                        ),
                )
                .subcommand(Command::new("toggle").arg(id_arg("Budget ID")))
                .subcommand(Command::new("rm").arg(id_arg("Budget ID"))),
        )
        .subcommand(
            Command::new("report")
                .about("Reports")
                .subcommand(
                    Command::new("balance")
                        .about("Space, allocated and available balances")
                        .arg(space_arg())
                        .args(json_args()),
                ),
        )
        .subcommand(
            Command::new("process")
                .about("Materialize due recurring rules now")
                .arg(
                    Arg::new("space")
                        .long("space")
                        .short('s')
                        .help("Only this space; all spaces when omitted"),
                )
                .arg(at_arg())
                .args(json_args()),
        )
        .subcommand(
            Command::new("scheduler")
                .about("Run the recurring-rule scheduler until interrupted")
                .arg(
                    Arg::new("interval-secs")
                        .long("interval-secs")
                        .value_parser(value_parser!(u64).range(1..))
                        .help("Overrides BUDGIT_TICK_INTERVAL_SECS"),
                ),
        )
        .subcommand(Command::new("doctor").about("Check stored data for problems"))
}
