//! 대화 로그 - rusqlite 기반 append-only 저장소
//!
//! 성공한 질의응답을 (username, question, answer, timestamp)로 기록합니다.
//! 순수 관측용이며 세그먼트/인덱스와의 관계는 저장하지 않습니다.
//! 저장 위치: ~/.paperpal/chat.db

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags};

// ============================================================================
// Data Directory
// ============================================================================

/// 데이터 디렉토리 경로 (~/.paperpal/)
pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".paperpal")
}

// ============================================================================
// Types
// ============================================================================

/// 기록된 대화 한 건
#[derive(Debug, Clone)]
pub struct Interaction {
    pub id: i64,
    pub username: String,
    pub question: String,
    pub answer: String,
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// InteractionLog
// ============================================================================

/// 대화 로그 저장소
pub struct InteractionLog {
    conn: Arc<Mutex<Connection>>,
    db_path: PathBuf,
}

impl InteractionLog {
    /// 로그 열기 (없으면 생성)
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)
                    .context("Failed to create database directory")?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open SQLite database")?;

        let log = Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: path.to_path_buf(),
        };

        log.initialize()?;
        Ok(log)
    }

    /// 기본 위치에서 열기 (~/.paperpal/chat.db)
    pub fn open_default() -> Result<Self> {
        let data_dir = get_data_dir();
        if !data_dir.exists() {
            std::fs::create_dir_all(&data_dir).context("Failed to create data directory")?;
        }

        Self::open(&data_dir.join("chat.db"))
    }

    /// DB 경로 반환
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// 스키마 초기화
    fn initialize(&self) -> Result<()> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS interactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL,
                question TEXT NOT NULL,
                answer TEXT NOT NULL,
                timestamp TEXT NOT NULL
            )",
            [],
        )
        .context("Failed to create interactions table")?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_interactions_username ON interactions(username)",
            [],
        )
        .context("Failed to create username index")?;

        tracing::debug!("Interaction log initialized at {:?}", self.db_path);
        Ok(())
    }

    /// 대화 기록 추가 (append-only)
    pub fn append(&self, username: &str, question: &str, answer: &str) -> Result<i64> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO interactions (username, question, answer, timestamp)
             VALUES (?1, ?2, ?3, ?4)",
            params![username, question, answer, now],
        )
        .context("Failed to insert interaction")?;

        let id = conn.last_insert_rowid();
        tracing::debug!("Logged interaction for {} (id={})", username, id);

        Ok(id)
    }

    /// 최근 대화 조회 (최신순)
    ///
    /// 코어는 읽기 API를 요구하지 않지만 CLI history 명령에서 사용합니다.
    /// 읽을 수 없는 행이 있으면 조용히 건너뛰지 않고 에러로 반환합니다.
    pub fn recent(&self, limit: usize, username: Option<&str>) -> Result<Vec<Interaction>> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let map_row = |row: &rusqlite::Row<'_>| {
            Ok(Interaction {
                id: row.get(0)?,
                username: row.get(1)?,
                question: row.get(2)?,
                answer: row.get(3)?,
                timestamp: parse_datetime(row.get::<_, String>(4)?),
            })
        };

        let interactions: Vec<Interaction> = if let Some(user) = username {
            let mut stmt = conn.prepare(
                "SELECT id, username, question, answer, timestamp FROM interactions
                 WHERE username = ?1
                 ORDER BY id DESC
                 LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![user, limit as i64], map_row)?;
            rows.collect::<rusqlite::Result<_>>()
                .context("Failed to read interaction rows")?
        } else {
            let mut stmt = conn.prepare(
                "SELECT id, username, question, answer, timestamp FROM interactions
                 ORDER BY id DESC
                 LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit as i64], map_row)?;
            rows.collect::<rusqlite::Result<_>>()
                .context("Failed to read interaction rows")?
        };

        Ok(interactions)
    }

    /// 기록된 대화 수
    pub fn count(&self) -> Result<usize> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM interactions", [], |row| row.get(0))
            .unwrap_or(0);

        Ok(count as usize)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// RFC3339 문자열을 DateTime<Utc>로 파싱
fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_log() -> (TempDir, InteractionLog) {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("test.db");
        let log = InteractionLog::open(&db_path).unwrap();
        (dir, log)
    }

    #[test]
    fn test_append_and_recent() {
        let (_dir, log) = create_test_log();

        let id = log
            .append("umang", "What color is the sky?", "The sky is blue.")
            .unwrap();
        assert!(id > 0);

        let recent = log.recent(10, None).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].username, "umang");
        assert_eq!(recent[0].question, "What color is the sky?");
        assert_eq!(recent[0].answer, "The sky is blue.");
    }

    #[test]
    fn test_recent_is_newest_first() {
        let (_dir, log) = create_test_log();

        for i in 0..5 {
            log.append("user", &format!("question {}", i), "answer").unwrap();
        }

        let recent = log.recent(3, None).unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].question, "question 4");
        assert_eq!(recent[2].question, "question 2");
    }

    #[test]
    fn test_recent_filters_by_username() {
        let (_dir, log) = create_test_log();

        log.append("alice", "q1", "a1").unwrap();
        log.append("bob", "q2", "a2").unwrap();
        log.append("alice", "q3", "a3").unwrap();

        let alice_only = log.recent(10, Some("alice")).unwrap();
        assert_eq!(alice_only.len(), 2);
        assert!(alice_only.iter().all(|i| i.username == "alice"));
    }

    #[test]
    fn test_recent_surfaces_unreadable_rows() {
        let (_dir, log) = create_test_log();
        log.append("user", "good question", "good answer").unwrap();

        // TEXT 컬럼에 BLOB을 직접 삽입 (affinity 변환 없이 저장됨)
        {
            let conn = log.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO interactions (username, question, answer, timestamp)
                 VALUES ('user', X'00ff', 'a', '2026-01-01T00:00:00Z')",
                [],
            )
            .unwrap();
        }

        // 손상된 행을 조용히 건너뛰지 않고 에러로 반환
        assert!(log.recent(10, None).is_err());
    }

    #[test]
    fn test_count() {
        let (_dir, log) = create_test_log();
        assert_eq!(log.count().unwrap(), 0);

        log.append("user", "q", "a").unwrap();
        log.append("user", "q", "a").unwrap();
        assert_eq!(log.count().unwrap(), 2);
    }
}
