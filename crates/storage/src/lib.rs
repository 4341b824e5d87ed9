use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use uuid::Uuid;

use shared::{
    domain::{FriendlyCode, PageId, SessionId},
    protocol::RecordedAnswer,
};

const IN_MEMORY_URL: &str = "sqlite::memory:";

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

/// A respondent session. `served_pages` counts pages handed out so far; the
/// page currently on the respondent's screen is `served_pages - 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    pub session_id: SessionId,
    pub friendly_code: FriendlyCode,
    pub served_pages: u32,
    pub created_at: DateTime<Utc>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        // every connection to an in-memory url opens its own private database
        let max_connections = if database_url.starts_with(IN_MEMORY_URL) {
            1
        } else {
            5
        };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn create_session(
        &self,
        session_id: SessionId,
        friendly_code: &FriendlyCode,
    ) -> Result<StoredSession> {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO survey_sessions (session_id, friendly_code, served_pages, created_at, updated_at)
             VALUES (?, ?, 0, ?, ?)",
        )
        .bind(session_id.0.to_string())
        .bind(friendly_code.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to create survey session {session_id}"))?;

        Ok(StoredSession {
            session_id,
            friendly_code: friendly_code.clone(),
            served_pages: 0,
            created_at: now,
        })
    }

    pub async fn friendly_code_in_use(&self, friendly_code: &FriendlyCode) -> Result<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM survey_sessions WHERE friendly_code = ?")
                .bind(friendly_code.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(count > 0)
    }

    pub async fn session_by_id(&self, session_id: SessionId) -> Result<Option<StoredSession>> {
        let row = sqlx::query(
            "SELECT session_id, friendly_code, served_pages, created_at
             FROM survey_sessions WHERE session_id = ?",
        )
        .bind(session_id.0.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.map(|row| session_from_row(&row)).transpose()
    }

    pub async fn session_by_code(
        &self,
        friendly_code: &FriendlyCode,
    ) -> Result<Option<StoredSession>> {
        let row = sqlx::query(
            "SELECT session_id, friendly_code, served_pages, created_at
             FROM survey_sessions WHERE friendly_code = ?",
        )
        .bind(friendly_code.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(|row| session_from_row(&row)).transpose()
    }

    pub async fn set_served_pages(&self, session_id: SessionId, served_pages: u32) -> Result<()> {
        let result = sqlx::query(
            "UPDATE survey_sessions SET served_pages = ?, updated_at = ? WHERE session_id = ?",
        )
        .bind(i64::from(served_pages))
        .bind(Utc::now())
        .bind(session_id.0.to_string())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(anyhow!("survey session {session_id} does not exist"));
        }
        Ok(())
    }

    /// Stores the answer for `page_id` and moves the session cursor from
    /// `served_pages` to `served_pages + 1` in one transaction.
    ///
    /// Returns `None` and records nothing when the cursor is no longer at
    /// `served_pages`, which is what a second submission for the same page
    /// sees once the first has committed.
    pub async fn record_answer_and_advance(
        &self,
        session_id: SessionId,
        page_id: PageId,
        response: &Value,
        served_pages: u32,
    ) -> Result<Option<i64>> {
        let now = Utc::now();
        let response_json =
            serde_json::to_string(response).context("failed to encode answer payload")?;

        let mut tx = self.pool.begin().await?;
        let advanced = sqlx::query(
            "UPDATE survey_sessions SET served_pages = served_pages + 1, updated_at = ?
             WHERE session_id = ? AND served_pages = ?",
        )
        .bind(now)
        .bind(session_id.0.to_string())
        .bind(i64::from(served_pages))
        .execute(&mut *tx)
        .await
        .with_context(|| format!("failed to advance survey session {session_id}"))?;
        if advanced.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let answer_id: i64 = sqlx::query_scalar(
            "INSERT INTO survey_answers (session_id, page_id, response_json, answered_at)
             VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(session_id.0.to_string())
        .bind(page_id.0)
        .bind(response_json)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .with_context(|| format!("failed to record answer for session {session_id}"))?;

        tx.commit().await?;
        Ok(Some(answer_id))
    }

    pub async fn answers_for_session(&self, session_id: SessionId) -> Result<Vec<RecordedAnswer>> {
        let rows = sqlx::query(
            "SELECT page_id, response_json, answered_at
             FROM survey_answers WHERE session_id = ? ORDER BY id ASC",
        )
        .bind(session_id.0.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<RecordedAnswer> {
                let raw: String = row.get("response_json");
                Ok(RecordedAnswer {
                    page_id: PageId(row.get::<i64, _>("page_id")),
                    response: serde_json::from_str(&raw)
                        .context("stored answer payload is not valid json")?,
                    answered_at: row.get::<DateTime<Utc>, _>("answered_at"),
                })
            })
            .collect()
    }
}

fn session_from_row(row: &SqliteRow) -> Result<StoredSession> {
    let raw_id: String = row.get("session_id");
    let session_id = Uuid::parse_str(&raw_id)
        .with_context(|| format!("stored session id '{raw_id}' is not a uuid"))?;
    let served_pages: i64 = row.get("served_pages");
    Ok(StoredSession {
        session_id: SessionId(session_id),
        friendly_code: FriendlyCode(row.get("friendly_code")),
        served_pages: u32::try_from(served_pages)
            .with_context(|| format!("invalid served page count {served_pages}"))?,
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
    })
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with(IN_MEMORY_URL) || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
