use carnage_db::open_memory;
use carnage_db::schema::{CURRENT_VERSION, SchemaError, create_schema, get_schema_version, migrate};
use rusqlite::Connection;

#[test]
fn create_schema_in_memory() {
    let conn = open_memory().unwrap();
    assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_VERSION);
}

#[test]
fn schema_is_idempotent() {
    let conn = open_memory().unwrap();
    create_schema(&conn).unwrap();
}

#[test]
fn foreign_keys_enabled() {
    let conn = open_memory().unwrap();
    let fk: i32 = conn
        .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
        .unwrap();
    assert_eq!(fk, 1);
}

fn table_exists(conn: &Connection, table: &str) -> bool {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1)",
        [table],
        |row| row.get(0),
    )
    .unwrap()
}

#[test]
fn all_tables_exist() {
    let conn = open_memory().unwrap();
    for table in ["schema_version", "games", "players", "processing"] {
        assert!(table_exists(&conn, table), "table '{}' should exist", table);
    }
}

#[test]
fn open_database_creates_parent_dirs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("matches.db");
    let conn = carnage_db::open_database(&path).unwrap();
    assert!(path.exists());
    assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_VERSION);
}

#[test]
fn version_one_database_gains_processing_table() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("matches.db");
    {
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE schema_version (
                 version INTEGER NOT NULL,
                 applied_at TEXT NOT NULL DEFAULT (datetime('now'))
             );
             INSERT INTO schema_version (version) VALUES (1);",
        )
        .unwrap();
        assert!(!table_exists(&conn, "processing"));
    }

    let conn = carnage_db::open_database(&path).unwrap();
    assert!(table_exists(&conn, "processing"));
    assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_VERSION);
}

#[test]
fn newer_schema_is_rejected() {
    let conn = open_memory().unwrap();
    let err = migrate(&conn, CURRENT_VERSION + 1).unwrap_err();
    assert!(matches!(
        err,
        SchemaError::VersionMismatch { expected, found }
            if expected == CURRENT_VERSION && found == CURRENT_VERSION + 1
    ));
}
