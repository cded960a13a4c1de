use mailcast::infrastructure::persistence::Database;
use std::path::PathBuf;
use uuid::Uuid;

pub struct TestDb {
    pub db: Database,
    path: PathBuf,
}

/// File-backed SQLite database with the real migrations applied.
///
/// Every pool connection to `sqlite::memory:` would see its own empty
/// database, so each test gets a uniquely named file instead.
pub async fn setup_test_db() -> TestDb {
    let path = std::env::temp_dir().join(format!("mailcast-test-{}.db", Uuid::new_v4()));
    let db_url = format!("sqlite://{}?mode=rwc", path.display());

    let db = Database::connect(&db_url)
        .await
        .expect("Failed to connect to test database");
    db.run_migrations()
        .await
        .expect("Failed to run migrations");

    TestDb { db, path }
}

pub async fn teardown_test_db(test_db: TestDb) {
    test_db.db.pool().close().await;
    for suffix in ["", "-wal", "-shm"] {
        let mut file = test_db.path.clone().into_os_string();
        file.push(suffix);
        let _ = std::fs::remove_file(file);
    }
}
