pub mod entities;
pub mod services;

#[cfg(test)]
pub mod test_support {
    use sea_orm::{ConnectOptions, Database, DatabaseConnection};
    use tempfile::TempDir;

    use super::services::init_schema;

    /// A SQLite database file inside a temporary directory, schema already applied.
    /// Keep the `TempDir` alive for as long as the connection is used.
    pub async fn sqlite_db() -> (DatabaseConnection, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("links.db").display());
        let mut opt = ConnectOptions::new(url);
        opt.max_connections(1).sqlx_logging(false);
        let db = Database::connect(opt).await.unwrap();
        init_schema(&db).await.unwrap();
        (db, dir)
    }
}
