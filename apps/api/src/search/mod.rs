//! Similarity search against remote Postgres stored functions.
//!
//! Ranking, thresholds, and ordering all live in the database functions;
//! this module only embeds the query, marshals parameters, and shapes
//! the returned rows.

use pgvector::Vector;
use serde::Serialize;
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use tracing::warn;

use crate::embeddings::EmbeddingClient;

/// Default similarity floor for direct search endpoints.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.5;
/// Looser floor used for agent context retrieval (more recall).
pub const AGENT_MATCH_THRESHOLD: f64 = 0.4;
pub const AGENT_MATCH_COUNT: i32 = 6;

/// A ranked chunk row from `match_documents` / `match_resume_chunks`.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ChunkMatch {
    pub content: String,
    pub metadata: Value,
    pub similarity: f64,
}

impl ChunkMatch {
    pub fn document_type(&self) -> Option<&str> {
        self.metadata.get("document_type").and_then(|v| v.as_str())
    }

    pub fn user_id(&self) -> Option<&str> {
        self.metadata.get("user_id").and_then(|v| v.as_str())
    }
}

/// A ranked resume chunk from `match_resume_content`.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ResumeChunkMatch {
    pub content: String,
    pub metadata: Value,
    pub similarity: f64,
    pub resume_id: Option<String>,
}

/// A ranked knowledge resource from `match_knowledge_resources`.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ResourceMatch {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub content_type: String,
    pub source_url: String,
    pub similarity: f64,
}

/// A ranked message from `search_conversation_messages` /
/// `search_training_messages`.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MessageMatch {
    pub content: String,
    pub role: Option<String>,
    pub similarity: f64,
}

/// A ranked job listing from `match_jobs`.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct JobListingMatch {
    pub id: i64,
    pub title: String,
    pub company: String,
    pub location: String,
    pub application_url: String,
    pub similarity: f64,
}

#[derive(Clone)]
pub struct SimilaritySearch {
    db: PgPool,
    embeddings: EmbeddingClient,
}

impl SimilaritySearch {
    pub fn new(db: PgPool, embeddings: EmbeddingClient) -> Self {
        Self { db, embeddings }
    }

    /// Same searcher with a caller-supplied embedding key (demo mode).
    pub fn with_embeddings(&self, embeddings: EmbeddingClient) -> Self {
        Self {
            db: self.db.clone(),
            embeddings,
        }
    }

    async fn query_vector(&self, query: &str) -> Vector {
        Vector::from(self.embeddings.embed_one(query).await)
    }

    /// Generic chunk search across all ingested documents.
    pub async fn match_documents(
        &self,
        query: &str,
        threshold: f64,
        count: i32,
    ) -> Result<Vec<ChunkMatch>, sqlx::Error> {
        let embedding = self.query_vector(query).await;
        sqlx::query_as(
            "SELECT content, metadata, similarity FROM match_documents($1, $2, $3)",
        )
        .bind(embedding)
        .bind(threshold)
        .bind(count)
        .fetch_all(&self.db)
        .await
    }

    /// Curated knowledge-resource search.
    pub async fn match_knowledge_resources(
        &self,
        query: &str,
        threshold: f64,
        count: i32,
    ) -> Result<Vec<ResourceMatch>, sqlx::Error> {
        let embedding = self.query_vector(query).await;
        sqlx::query_as(
            r#"
            SELECT id, title, description, content_type, source_url, similarity
            FROM match_knowledge_resources($1, $2, $3)
            "#,
        )
        .bind(embedding)
        .bind(threshold)
        .bind(count)
        .fetch_all(&self.db)
        .await
    }

    /// Resume content search, optionally scoped to one user.
    ///
    /// Falls back to `match_documents` filtered to resume chunks when the
    /// specialized function is not installed.
    pub async fn match_resume_content(
        &self,
        query: &str,
        user_id: Option<&str>,
        threshold: f64,
        count: i32,
    ) -> Result<Vec<ResumeChunkMatch>, sqlx::Error> {
        let embedding = self.query_vector(query).await;

        let specialized: Result<Vec<ResumeChunkMatch>, sqlx::Error> = sqlx::query_as(
            r#"
            SELECT content, metadata, similarity, resume_id
            FROM match_resume_content($1, $2, $3, $4)
            "#,
        )
        .bind(embedding.clone())
        .bind(threshold)
        .bind(count)
        .bind(user_id)
        .fetch_all(&self.db)
        .await;

        match specialized {
            Ok(rows) if !rows.is_empty() => return Ok(rows),
            Ok(_) => {}
            Err(e) => {
                warn!("match_resume_content unavailable, falling back to match_documents: {e}");
            }
        }

        let rows: Vec<ChunkMatch> = sqlx::query_as(
            "SELECT content, metadata, similarity FROM match_documents($1, $2, $3)",
        )
        .bind(embedding)
        .bind(threshold)
        .bind(count)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .filter(|row| row.document_type() == Some("resume"))
            .filter(|row| match user_id {
                Some(uid) => row.user_id() == Some(uid),
                None => true,
            })
            .map(|row| {
                // Resume chunks carry their resume id as the document id.
                let resume_id = row
                    .metadata
                    .get("resume_id")
                    .or_else(|| row.metadata.get("document_id"))
                    .and_then(|v| v.as_str())
                    .map(str::to_string);
                ResumeChunkMatch {
                    content: row.content,
                    metadata: row.metadata,
                    similarity: row.similarity,
                    resume_id,
                }
            })
            .collect())
    }

    /// Structured resume-chunk search (the `resume_chunks` mirror table).
    pub async fn match_resume_chunks(
        &self,
        query: &str,
        user_id: Option<&str>,
        threshold: f64,
        count: i32,
    ) -> Result<Vec<ChunkMatch>, sqlx::Error> {
        let embedding = self.query_vector(query).await;
        sqlx::query_as(
            "SELECT content, metadata, similarity FROM match_resume_chunks($1, $2, $3, $4)",
        )
        .bind(embedding)
        .bind(threshold)
        .bind(count)
        .bind(user_id)
        .fetch_all(&self.db)
        .await
    }

    /// Semantic search over a user's stored conversation history.
    pub async fn search_conversation_messages(
        &self,
        query: &str,
        user_id: Option<&str>,
        threshold: f64,
        count: i32,
    ) -> Result<Vec<MessageMatch>, sqlx::Error> {
        let embedding = self.query_vector(query).await;
        sqlx::query_as(
            "SELECT content, role, similarity FROM search_conversation_messages($1, $2, $3, $4)",
        )
        .bind(embedding)
        .bind(threshold)
        .bind(count)
        .bind(user_id)
        .fetch_all(&self.db)
        .await
    }

    /// Semantic search over curated training/guidance messages.
    pub async fn search_training_messages(
        &self,
        query: &str,
        threshold: f64,
        count: i32,
    ) -> Result<Vec<MessageMatch>, sqlx::Error> {
        let embedding = self.query_vector(query).await;
        sqlx::query_as(
            "SELECT content, role, similarity FROM search_training_messages($1, $2, $3)",
        )
        .bind(embedding)
        .bind(threshold)
        .bind(count)
        .fetch_all(&self.db)
        .await
    }

    /// Matches a stored resume against job listings, reusing the
    /// document's first-chunk embedding (no fresh embed call).
    pub async fn match_resume_to_jobs(
        &self,
        resume_embedding: Vector,
        threshold: f64,
        count: i32,
    ) -> Result<Vec<JobListingMatch>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT id, title, company, location, application_url, similarity
            FROM match_jobs($1, $2, $3)
            "#,
        )
        .bind(resume_embedding)
        .bind(threshold)
        .bind(count)
        .fetch_all(&self.db)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chunk_match_metadata_accessors() {
        let row = ChunkMatch {
            content: "chunk".to_string(),
            metadata: json!({"document_type": "resume", "user_id": "u1"}),
            similarity: 0.9,
        };
        assert_eq!(row.document_type(), Some("resume"));
        assert_eq!(row.user_id(), Some("u1"));
    }

    #[test]
    fn test_chunk_match_missing_metadata_fields() {
        let row = ChunkMatch {
            content: "chunk".to_string(),
            metadata: json!({}),
            similarity: 0.9,
        };
        assert_eq!(row.document_type(), None);
        assert_eq!(row.user_id(), None);
    }

    #[test]
    fn test_match_rows_serialize_for_responses() {
        let row = ResumeChunkMatch {
            content: "c".to_string(),
            metadata: json!({}),
            similarity: 0.72,
            resume_id: Some("resume_ab12cd34_20250101_000000".to_string()),
        };
        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["similarity"], 0.72);
        assert!(value["resume_id"].as_str().unwrap().starts_with("resume_"));
    }
}
