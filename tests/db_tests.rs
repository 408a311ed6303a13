// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use budgit::config::Config;
use budgit::db;
use budgit::spaces;
use budgit::utils::parse_datetime;

#[test]
fn open_at_creates_parent_dirs_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("data").join("budgit.sqlite");

    {
        let conn = db::open_at(&path).unwrap();
        spaces::create_space(&conn, "Home", parse_datetime("2024-01-01").unwrap()).unwrap();
    }
    assert!(path.exists());

    let conn = db::open_at(&path).unwrap();
    let all = spaces::list_spaces(&conn).unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].name, "Home");
}

#[test]
fn explicit_db_path_wins() {
    let cfg = Config {
        db_path: Some("/tmp/elsewhere.sqlite".into()),
        ..Config::default()
    };
    assert_eq!(db::db_path(&cfg).unwrap(), std::path::PathBuf::from("/tmp/elsewhere.sqlite"));
}
