//! Session/Question store on SQLite
//!
//! Durable record of sessions, questions, answers, summaries, retrieval
//! artifacts, and per-session continuity tokens. Schema is created at startup;
//! all operations are single-row and rely only on SQLite's write atomicity.

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;

use crate::error::ServiceError;

/// User-turn content as stored on the question row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionContent {
    pub user_question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr_text: Option<String>,
}

#[derive(Debug, Clone)]
pub struct QuestionRecord {
    pub id: i64,
    pub session_id: String,
    pub content: QuestionContent,
    pub answer: Option<String>,
    pub summary: Option<String>,
    pub created_at: i64,
}

/// Artifact kinds; at most one row of each kind per question
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Web,
    Rag,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Web => "web",
            ArtifactKind::Rag => "rag",
        }
    }
}

/// The retrieval artifacts attached to one question; `None` means
/// "no grounding of that kind available"
#[derive(Debug, Clone, Default)]
pub struct Artifacts {
    pub web: Option<String>,
    pub rag: Option<String>,
}

#[derive(Clone)]
pub struct Store {
    db: SqlitePool,
}

impl Store {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Create the schema if it does not exist yet
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL UNIQUE,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS questions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL REFERENCES sessions(session_id),
                content TEXT NOT NULL,
                answer TEXT,
                summary TEXT,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS retrieval_artifacts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                question_id INTEGER NOT NULL REFERENCES questions(id),
                kind TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                UNIQUE(question_id, kind)
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS conversation_continuity (
                session_id TEXT PRIMARY KEY REFERENCES sessions(session_id),
                continuity_token TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Create a session row; returns false if it already existed
    pub async fn create_session(&self, session_id: &str) -> Result<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO sessions (session_id, created_at) VALUES ($1, $2)",
        )
        .bind(session_id)
        .bind(Utc::now().timestamp())
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn session_exists(&self, session_id: &str) -> Result<bool> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM sessions WHERE session_id = $1")
                .bind(session_id)
                .fetch_optional(&self.db)
                .await?;
        Ok(row.is_some())
    }

    /// Add a question to an existing session, returning its id
    pub async fn add_question(
        &self,
        session_id: &str,
        content: &QuestionContent,
    ) -> Result<i64, ServiceError> {
        if !self.session_exists(session_id).await.map_err(ServiceError::Internal)? {
            return Err(ServiceError::NotFound(format!(
                "session {} does not exist",
                session_id
            )));
        }

        let content_json =
            serde_json::to_string(content).map_err(|e| ServiceError::Internal(e.into()))?;

        let result = sqlx::query(
            "INSERT INTO questions (session_id, content, created_at) VALUES ($1, $2, $3)",
        )
        .bind(session_id)
        .bind(&content_json)
        .bind(Utc::now().timestamp())
        .execute(&self.db)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get_question(&self, id: i64) -> Result<Option<QuestionRecord>> {
        let row: Option<(i64, String, String, Option<String>, Option<String>, i64)> =
            sqlx::query_as(
                r#"
                SELECT id, session_id, content, answer, summary, created_at
                FROM questions WHERE id = $1
                "#,
            )
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        match row {
            Some((id, session_id, content_json, answer, summary, created_at)) => {
                let content: QuestionContent = serde_json::from_str(&content_json)?;
                Ok(Some(QuestionRecord {
                    id,
                    session_id,
                    content,
                    answer,
                    summary,
                    created_at,
                }))
            }
            None => Ok(None),
        }
    }

    /// Write the answer; unconditional so a retried turn overwrites the prior one
    pub async fn set_answer(&self, id: i64, text: &str) -> Result<()> {
        sqlx::query("UPDATE questions SET answer = $1 WHERE id = $2")
            .bind(text)
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    pub async fn set_summary(&self, id: i64, text: &str) -> Result<()> {
        sqlx::query("UPDATE questions SET summary = $1 WHERE id = $2")
            .bind(text)
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    /// Attach an artifact; replaces a prior artifact of the same kind
    pub async fn add_artifact(
        &self,
        question_id: i64,
        kind: ArtifactKind,
        content: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO retrieval_artifacts (question_id, kind, content, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT(question_id, kind) DO UPDATE SET
                content = excluded.content,
                created_at = excluded.created_at
            "#,
        )
        .bind(question_id)
        .bind(kind.as_str())
        .bind(content)
        .bind(Utc::now().timestamp())
        .execute(&self.db)
        .await?;
        Ok(())
    }

    pub async fn get_artifacts(&self, question_id: i64) -> Result<Artifacts> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT kind, content FROM retrieval_artifacts WHERE question_id = $1",
        )
        .bind(question_id)
        .fetch_all(&self.db)
        .await?;

        let mut artifacts = Artifacts::default();
        for (kind, content) in rows {
            match kind.as_str() {
                "web" => artifacts.web = Some(content),
                "rag" => artifacts.rag = Some(content),
                other => tracing::warn!("unknown artifact kind in store: {}", other),
            }
        }
        Ok(artifacts)
    }

    /// Upsert the continuity token; sessions do not branch, so the newest
    /// token always replaces the prior one
    pub async fn upsert_continuity(&self, session_id: &str, token: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO conversation_continuity (session_id, continuity_token, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT(session_id) DO UPDATE SET
                continuity_token = excluded.continuity_token,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(session_id)
        .bind(token)
        .bind(Utc::now().timestamp())
        .execute(&self.db)
        .await?;
        Ok(())
    }

    pub async fn get_continuity(&self, session_id: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT continuity_token FROM conversation_continuity WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(|(token,)| token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_store() -> Store {
        // Single connection so the in-memory database is shared
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = Store::new(pool);
        store.migrate().await.unwrap();
        store
    }

    #[tokio::test]
    async fn create_session_reports_existing() {
        let store = test_store().await;
        assert!(store.create_session("s1").await.unwrap());
        assert!(!store.create_session("s1").await.unwrap());
    }

    #[tokio::test]
    async fn question_requires_session() {
        let store = test_store().await;
        let content = QuestionContent {
            user_question: "合同违约怎么办".into(),
            ocr_text: None,
        };

        let err = store.add_question("missing", &content).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        store.create_session("s1").await.unwrap();
        let id = store.add_question("s1", &content).await.unwrap();
        let record = store.get_question(id).await.unwrap().unwrap();
        assert_eq!(record.content.user_question, "合同违约怎么办");
        assert!(record.answer.is_none());
    }

    #[tokio::test]
    async fn answer_and_summary_roundtrip() {
        let store = test_store().await;
        store.create_session("s1").await.unwrap();
        let content = QuestionContent {
            user_question: "q".into(),
            ocr_text: Some("ocr".into()),
        };
        let id = store.add_question("s1", &content).await.unwrap();

        store.set_answer(id, "partial").await.unwrap();
        store.set_answer(id, "full answer").await.unwrap();
        store.set_summary(id, "summary").await.unwrap();

        let record = store.get_question(id).await.unwrap().unwrap();
        assert_eq!(record.answer.as_deref(), Some("full answer"));
        assert_eq!(record.summary.as_deref(), Some("summary"));
        assert_eq!(record.content.ocr_text.as_deref(), Some("ocr"));
    }

    #[tokio::test]
    async fn artifacts_one_per_kind() {
        let store = test_store().await;
        store.create_session("s1").await.unwrap();
        let id = store
            .add_question(
                "s1",
                &QuestionContent {
                    user_question: "q".into(),
                    ocr_text: None,
                },
            )
            .await
            .unwrap();

        store.add_artifact(id, ArtifactKind::Web, "first").await.unwrap();
        store.add_artifact(id, ArtifactKind::Web, "second").await.unwrap();
        store.add_artifact(id, ArtifactKind::Rag, "rag data").await.unwrap();

        let artifacts = store.get_artifacts(id).await.unwrap();
        assert_eq!(artifacts.web.as_deref(), Some("second"));
        assert_eq!(artifacts.rag.as_deref(), Some("rag data"));

        let empty = store.get_artifacts(id + 1).await.unwrap();
        assert!(empty.web.is_none() && empty.rag.is_none());
    }

    #[tokio::test]
    async fn continuity_upsert_replaces() {
        let store = test_store().await;
        store.create_session("s1").await.unwrap();

        assert!(store.get_continuity("s1").await.unwrap().is_none());
        store.upsert_continuity("s1", "tok1").await.unwrap();
        store.upsert_continuity("s1", "tok2").await.unwrap();
        assert_eq!(store.get_continuity("s1").await.unwrap().as_deref(), Some("tok2"));
    }
}
