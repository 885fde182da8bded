use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqlitePoolOptions, SqliteConnectOptions};
use sqlx::{FromRow, SqlitePool};
use std::path::Path;
use std::str::FromStr;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Pending,
    Indexed,
    Failed,
}

impl FileStatus {
    fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Pending => "pending",
            FileStatus::Indexed => "indexed",
            FileStatus::Failed => "failed",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "indexed" => FileStatus::Indexed,
            "failed" => FileStatus::Failed,
            _ => FileStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DirectoryRecord {
    pub id: String,
    pub path: String,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileRecord {
    pub path: String,
    pub dir_id: String,
    pub checksum: String,
    pub last_indexed: DateTime<Utc>,
    pub status: FileStatus,
}

#[derive(FromRow)]
struct DirectoryRow {
    id: String,
    path: String,
    added_at: String,
}

#[derive(FromRow)]
struct FileRow {
    path: String,
    dir_id: String,
    checksum: String,
    last_indexed: String,
    status: String,
}

/// Owns the `directories`/`files` registry. The vector store remains the
/// source of truth for "what chunks does a file have"; this registry only
/// answers "does a file record exist, and what was its last known
/// digest/status".
#[derive(Clone)]
pub struct Registry {
    pool: SqlitePool,
}

impl Registry {
    pub async fn connect(data_dir: &str) -> AppResult<Self> {
        std::fs::create_dir_all(data_dir)?;
        let db_path = Path::new(data_dir).join("registry.sqlite3");
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))
            .map_err(|e| AppError::ConfigurationFailure(e.to_string()))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await
            .map_err(|e| AppError::ConfigurationFailure(e.to_string()))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS directories (
                id TEXT PRIMARY KEY,
                path TEXT NOT NULL UNIQUE,
                added_at TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS files (
                path TEXT PRIMARY KEY,
                dir_id TEXT NOT NULL,
                checksum TEXT NOT NULL,
                last_indexed TEXT NOT NULL,
                status TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    pub async fn add_directory(&self, id: &str, path: &str) -> AppResult<()> {
        sqlx::query("INSERT OR IGNORE INTO directories (id, path, added_at) VALUES (?, ?, ?)")
            .bind(id)
            .bind(path)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn find_directory_by_path(&self, path: &str) -> AppResult<Option<DirectoryRecord>> {
        let row = sqlx::query_as::<_, DirectoryRow>(
            "SELECT id, path, added_at FROM directories WHERE path = ?",
        )
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| DirectoryRecord {
            id: r.id,
            path: r.path,
            added_at: DateTime::parse_from_rfc3339(&r.added_at)
                .map(|d| d.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        }))
    }

    pub async fn list_directories(&self) -> AppResult<Vec<DirectoryRecord>> {
        let rows =
            sqlx::query_as::<_, DirectoryRow>("SELECT id, path, added_at FROM directories")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows
            .into_iter()
            .map(|r| DirectoryRecord {
                id: r.id,
                path: r.path,
                added_at: DateTime::parse_from_rfc3339(&r.added_at)
                    .map(|d| d.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
            })
            .collect())
    }

    pub async fn upsert_file(
        &self,
        path: &str,
        dir_id: &str,
        checksum: &str,
        status: FileStatus,
    ) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO files (path, dir_id, checksum, last_indexed, status)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(path) DO UPDATE SET
                dir_id = excluded.dir_id,
                checksum = excluded.checksum,
                last_indexed = excluded.last_indexed,
                status = excluded.status",
        )
        .bind(path)
        .bind(dir_id)
        .bind(checksum)
        .bind(Utc::now().to_rfc3339())
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_file(&self, path: &str) -> AppResult<Option<FileRecord>> {
        let row = sqlx::query_as::<_, FileRow>(
            "SELECT path, dir_id, checksum, last_indexed, status FROM files WHERE path = ?",
        )
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(row_to_record))
    }

    pub async fn remove_file(&self, path: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM files WHERE path = ?")
            .bind(path)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn list_files_for_dir(&self, dir_id: &str) -> AppResult<Vec<FileRecord>> {
        let rows = sqlx::query_as::<_, FileRow>(
            "SELECT path, dir_id, checksum, last_indexed, status FROM files WHERE dir_id = ?",
        )
        .bind(dir_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(row_to_record).collect())
    }
}

fn row_to_record(r: FileRow) -> FileRecord {
    FileRecord {
        path: r.path,
        dir_id: r.dir_id,
        checksum: r.checksum,
        last_indexed: DateTime::parse_from_rfc3339(&r.last_indexed)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        status: FileStatus::parse(&r.status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn roundtrips_a_file_record() {
        let dir = tempfile_dir();
        let registry = Registry::connect(dir.to_str().unwrap()).await.unwrap();
        registry.add_directory("dir-1", "/tmp/project").await.unwrap();

        registry
            .upsert_file("/tmp/project/notes.txt", "dir-1", "abc123", FileStatus::Indexed)
            .await
            .unwrap();

        let record = registry
            .get_file("/tmp/project/notes.txt")
            .await
            .unwrap()
            .expect("file record present");
        assert_eq!(record.checksum, "abc123");
        assert_eq!(record.status, FileStatus::Indexed);

        registry.remove_file("/tmp/project/notes.txt").await.unwrap();
        assert!(registry.get_file("/tmp/project/notes.txt").await.unwrap().is_none());
    }

    fn tempfile_dir() -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("lucidfiles-registry-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
}
