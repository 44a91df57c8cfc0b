/// Video metrics store — SQLite persistence
///
/// Owns the schema (create / drop) and hands out short-lived connections.
/// Question answering opens one connection per request; bulk import lives in
/// `loader`.

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};

use crate::schema::{DROP_DDL, SCHEMA_DDL};

#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
}

impl Database {
    /// Open (creating if needed) the database file and ensure the tables exist.
    pub fn open(path: &str) -> Result<Self> {
        let db = Self { path: resolve_db_path(path) };
        let conn = db
            .connect()
            .with_context(|| format!("Cannot open DB {}", db.path.display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrate(&conn)?;
        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A fresh connection with foreign keys enforced. Dropped by the caller
    /// as soon as its unit of work is done.
    pub fn connect(&self) -> rusqlite::Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(conn)
    }

    /// A fresh connection that cannot change the store. Ad hoc question SQL
    /// only ever runs on one of these.
    pub fn connect_read_only(&self) -> rusqlite::Result<Connection> {
        Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
    }

    /// Drop both tables and recreate them empty.
    pub fn reset(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute_batch(DROP_DDL)?;
        migrate(&conn)?;
        Ok(())
    }

    pub fn count_videos(&self) -> Result<i64> {
        let conn = self.connect()?;
        let count = conn.query_row("SELECT COUNT(*) FROM videos", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn count_snapshots(&self) -> Result<i64> {
        let conn = self.connect()?;
        let count = conn.query_row("SELECT COUNT(*) FROM video_snapshots", [], |row| row.get(0))?;
        Ok(count)
    }
}

fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA_DDL)?;
    Ok(())
}

/// Resolve bare DB filenames to the local app data directory.
fn resolve_db_path(db_path: &str) -> PathBuf {
    let path = Path::new(db_path);
    if path.is_absolute() || path.components().count() > 1 {
        return path.to_path_buf();
    }
    if let Some(data_dir) = dirs::data_local_dir() {
        let dir = data_dir.join("video-analytics-bot");
        if std::fs::create_dir_all(&dir).is_ok() {
            return dir.join(db_path);
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("videos.db");
        let db = Database::open(path.to_str().unwrap()).unwrap();
        (dir, db)
    }

    #[test]
    fn test_open_creates_tables() {
        let (_dir, db) = temp_db();
        assert_eq!(db.count_videos().unwrap(), 0);
        assert_eq!(db.count_snapshots().unwrap(), 0);
    }

    #[test]
    fn test_snapshot_requires_existing_video() {
        let (_dir, db) = temp_db();
        let conn = db.connect().unwrap();
        let result = conn.execute(
            "INSERT INTO video_snapshots (id, video_id, created_at, updated_at)
             VALUES ('s1', 'missing', '2025-11-28 10:00:00', '2025-11-28 10:00:00')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_deleting_video_cascades_to_snapshots() {
        let (_dir, db) = temp_db();
        let conn = db.connect().unwrap();
        conn.execute_batch(
            "INSERT INTO videos (id, creator_id, video_created_at, created_at, updated_at)
             VALUES ('v1', 'c1', '2025-11-01 00:00:00', '2025-11-01 00:00:00', '2025-11-01 00:00:00');
             INSERT INTO video_snapshots (id, video_id, created_at, updated_at)
             VALUES ('s1', 'v1', '2025-11-28 10:00:00', '2025-11-28 10:00:00');
             DELETE FROM videos WHERE id = 'v1';",
        )
        .unwrap();
        assert_eq!(db.count_snapshots().unwrap(), 0);
    }

    #[test]
    fn test_reset_empties_tables() {
        let (_dir, db) = temp_db();
        db.connect()
            .unwrap()
            .execute(
                "INSERT INTO videos (id, creator_id, video_created_at, created_at, updated_at)
                 VALUES ('v1', 'c1', '2025-11-01 00:00:00', '2025-11-01 00:00:00', '2025-11-01 00:00:00')",
                [],
            )
            .unwrap();
        assert_eq!(db.count_videos().unwrap(), 1);
        db.reset().unwrap();
        assert_eq!(db.count_videos().unwrap(), 0);
    }

    #[test]
    fn test_read_only_connection_rejects_writes() {
        let (_dir, db) = temp_db();
        let conn = db.connect_read_only().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM videos", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);

        let result = conn.execute(
            "INSERT INTO videos (id, creator_id, video_created_at, created_at, updated_at)
             VALUES ('v1', 'c1', '2025-11-01 00:00:00', '2025-11-01 00:00:00', '2025-11-01 00:00:00')",
            [],
        );
        assert!(result.is_err());
        assert_eq!(db.count_videos().unwrap(), 0);
    }

    #[test]
    fn test_relative_paths_with_directories_are_kept() {
        assert_eq!(resolve_db_path("data/videos.db"), PathBuf::from("data/videos.db"));
        assert_eq!(resolve_db_path("/tmp/videos.db"), PathBuf::from("/tmp/videos.db"));
    }
}
