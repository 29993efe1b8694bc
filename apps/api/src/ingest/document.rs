//! Core document pipeline: id generation, storage, and the
//! extract → delete-old → chunk → embed → store sequence.

use base64::Engine;
use bytes::Bytes;
use chrono::Utc;
use pgvector::Vector;
use serde_json::json;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tracing::info;

use crate::embeddings::EmbeddingClient;
use crate::ingest::{chunker, pdf, website, IngestError};
use crate::models::document::{IngestMetadata, ProcessReport};

/// Chunk rows inserted per transaction.
const CHUNK_INSERT_BATCH: usize = 10;

/// Drives documents through extraction, chunking, embedding, and storage.
#[derive(Clone)]
pub struct DocumentIngestor {
    db: PgPool,
    embeddings: EmbeddingClient,
    http: reqwest::Client,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl DocumentIngestor {
    pub fn new(
        db: PgPool,
        embeddings: EmbeddingClient,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Self {
        Self {
            db,
            embeddings,
            http: reqwest::Client::builder()
                .redirect(reqwest::redirect::Policy::limited(5))
                .build()
                .expect("Failed to build HTTP client"),
            chunk_size,
            chunk_overlap,
        }
    }

    pub fn db(&self) -> &PgPool {
        &self.db
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Content-hash-derived document id:
    /// `{first 3 chars of content type}_{8 hex chars}_{timestamp}`.
    pub fn generate_document_id(content: &[u8], content_type: &str) -> String {
        let digest = Sha256::digest(content);
        let mut hash_prefix = String::with_capacity(8);
        for byte in digest.iter().take(4) {
            hash_prefix.push_str(&format!("{byte:02x}"));
        }
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let prefix: String = content_type.to_lowercase().chars().take(3).collect();
        let prefix = if prefix.is_empty() {
            "doc".to_string()
        } else {
            prefix
        };
        format!("{prefix}_{hash_prefix}_{timestamp}")
    }

    /// Ingests PDF bytes as a generic document.
    pub async fn ingest_pdf(
        &self,
        content: &Bytes,
        metadata: &IngestMetadata,
    ) -> Result<ProcessReport, IngestError> {
        let document_id = Self::generate_document_id(content, &metadata.content_type);
        let text = pdf::extract_pdf_text(content)?;
        self.process_document(&document_id, &text, Some(content.as_ref()), metadata)
            .await
    }

    /// Fetches a website, merges scraped metadata under the caller's, and
    /// ingests the extracted text. Returns the report plus the merged
    /// metadata (callers inserting into typed tables need the scraped
    /// fallbacks, e.g. domain as company).
    pub async fn ingest_website(
        &self,
        url: &str,
        metadata: &IngestMetadata,
    ) -> Result<(ProcessReport, IngestMetadata), IngestError> {
        let html = website::fetch_html(&self.http, url).await?;
        let site = website::scrape_site_metadata(url, &html);
        let mut merged = site.merge_into(metadata.clone());
        if merged.source_url.is_none() {
            merged.source_url = Some(url.to_string());
        }

        let text = website::extract_text(&html)?;
        let document_id = Self::generate_document_id(url.as_bytes(), &merged.content_type);
        let mut report = self
            .process_document(&document_id, &text, None, &merged)
            .await?;
        report.domain = Some(site.domain);
        Ok((report, merged))
    }

    /// The pipeline core. Reprocessing an id deletes all previously
    /// stored rows for it first, so chunks never accumulate duplicates.
    ///
    /// Metadata and chunk inserts are separate statements: a chunk-insert
    /// failure leaves the metadata row behind (known consistency gap).
    pub async fn process_document(
        &self,
        document_id: &str,
        text: &str,
        binary: Option<&[u8]>,
        metadata: &IngestMetadata,
    ) -> Result<ProcessReport, IngestError> {
        if text.trim().is_empty() {
            return Err(IngestError::EmptyText);
        }

        self.delete_existing_document(document_id).await?;

        let chunks = chunker::chunk_text(text, self.chunk_size, self.chunk_overlap);
        if chunks.is_empty() {
            return Err(IngestError::EmptyText);
        }

        let embeddings = self.embeddings.embed(&chunks).await;

        self.store_document_metadata(document_id, metadata, text, binary)
            .await?;
        self.store_document_chunks(document_id, &chunks, &embeddings, metadata)
            .await?;

        info!(
            "Processed document {document_id}: {} chars, {} chunks",
            text.len(),
            chunks.len()
        );

        Ok(ProcessReport {
            document_id: document_id.to_string(),
            title: metadata.title.clone(),
            text_length: text.chars().count(),
            chunks_created: chunks.len(),
            processed_at: Utc::now(),
            resource_id: None,
            job_listing_id: None,
            program_id: None,
            resume_id: None,
            domain: None,
        })
    }

    /// Removes all stored rows for a document id (chunks first, then the
    /// metadata record).
    pub async fn delete_existing_document(&self, document_id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM documents WHERE metadata->>'document_id' = $1")
            .bind(document_id)
            .execute(&self.db)
            .await?;
        sqlx::query("DELETE FROM document_metadata WHERE id = $1")
            .bind(document_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn store_document_metadata(
        &self,
        document_id: &str,
        metadata: &IngestMetadata,
        full_text: &str,
        binary: Option<&[u8]>,
    ) -> Result<(), sqlx::Error> {
        let schema = json!({
            "type": metadata.content_type,
            "text_length": full_text.chars().count(),
            "processing_date": Utc::now().to_rfc3339(),
            "user_id": metadata.user_id,
            "partner_id": metadata.partner_id,
            "content_type": metadata.mime_type.as_deref().unwrap_or("text/plain"),
            "source_url": metadata.source_url,
            "filename": metadata.filename,
        });

        let url = metadata
            .source_url
            .clone()
            .unwrap_or_else(|| format!("document://{document_id}"));
        let binary_content =
            binary.map(|b| base64::engine::general_purpose::STANDARD.encode(b));

        sqlx::query(
            r#"
            INSERT INTO document_metadata (id, title, url, schema, content, binary_content)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(document_id)
        .bind(&metadata.title)
        .bind(&url)
        .bind(&schema)
        .bind(full_text)
        .bind(&binary_content)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Stores chunk rows with their embeddings, in batches.
    /// Every vector must match the configured dimensionality; a mismatch
    /// aborts storage rather than padding or truncating.
    async fn store_document_chunks(
        &self,
        document_id: &str,
        chunks: &[String],
        embeddings: &[Vec<f32>],
        metadata: &IngestMetadata,
    ) -> Result<(), IngestError> {
        let expected = self.embeddings.dimensions();
        for embedding in embeddings {
            if embedding.len() != expected {
                return Err(IngestError::DimensionMismatch {
                    expected,
                    actual: embedding.len(),
                });
            }
        }

        let rows: Vec<_> = chunks.iter().zip(embeddings.iter()).enumerate().collect();
        for batch in rows.chunks(CHUNK_INSERT_BATCH) {
            let mut tx = self.db.begin().await.map_err(IngestError::Storage)?;
            for &(index, (chunk, embedding)) in batch {
                let chunk_meta = json!({
                    "document_id": document_id,
                    "document_type": metadata.content_type,
                    "title": metadata.title,
                    "chunk_index": index,
                    "user_id": metadata.user_id,
                    "partner_id": metadata.partner_id,
                    "processed_at": Utc::now().to_rfc3339(),
                });
                sqlx::query("INSERT INTO documents (content, metadata, embedding) VALUES ($1, $2, $3)")
                    .bind(chunk)
                    .bind(&chunk_meta)
                    .bind(Vector::from(embedding.clone()))
                    .execute(&mut *tx)
                    .await
                    .map_err(IngestError::Storage)?;
            }
            tx.commit().await.map_err(IngestError::Storage)?;
        }

        info!(
            "Stored {} chunks for document {document_id}",
            chunks.len()
        );
        Ok(())
    }

    /// Embedding of a document's first chunk, used as the document-level
    /// vector for the curated tables.
    pub async fn first_chunk_embedding(
        &self,
        document_id: &str,
    ) -> Result<Vector, IngestError> {
        let embedding: Option<Vector> = sqlx::query_scalar(
            r#"
            SELECT embedding FROM documents
            WHERE metadata->>'document_id' = $1 AND metadata->>'chunk_index' = '0'
            LIMIT 1
            "#,
        )
        .bind(document_id)
        .fetch_optional(&self.db)
        .await?;

        embedding.ok_or_else(|| {
            IngestError::Extraction(format!("no stored embedding for document {document_id}"))
        })
    }

    /// Full extracted text of a stored document.
    pub async fn document_content(&self, document_id: &str) -> Result<String, IngestError> {
        let content: Option<String> =
            sqlx::query_scalar("SELECT content FROM document_metadata WHERE id = $1 LIMIT 1")
                .bind(document_id)
                .fetch_optional(&self.db)
                .await?;

        content.ok_or_else(|| {
            IngestError::Extraction(format!("no stored content for document {document_id}"))
        })
    }

    pub async fn store_knowledge_resource(
        &self,
        metadata: &IngestMetadata,
        embedding: Vector,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            INSERT INTO knowledge_resources
                (title, description, content_type, source_url, embedding, is_published)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&metadata.title)
        .bind(metadata.description.as_deref().unwrap_or(""))
        .bind(&metadata.content_type)
        .bind(metadata.source_url.as_deref().unwrap_or(""))
        .bind(embedding)
        .bind(metadata.is_published)
        .fetch_one(&self.db)
        .await
    }

    pub async fn store_job_listing(
        &self,
        metadata: &IngestMetadata,
        description: &str,
        embedding: Vector,
    ) -> Result<i64, sqlx::Error> {
        let title = metadata
            .job_title
            .clone()
            .unwrap_or_else(|| metadata.title.clone());
        let application_url = metadata
            .application_url
            .clone()
            .or_else(|| metadata.source_url.clone())
            .unwrap_or_default();

        sqlx::query_scalar(
            r#"
            INSERT INTO job_listings
                (title, description, company, location, application_url, embedding)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&title)
        .bind(description)
        .bind(metadata.company.as_deref().unwrap_or(""))
        .bind(metadata.location.as_deref().unwrap_or(""))
        .bind(&application_url)
        .bind(embedding)
        .fetch_one(&self.db)
        .await
    }

    pub async fn store_education_program(
        &self,
        metadata: &IngestMetadata,
        description: &str,
        embedding: Vector,
    ) -> Result<i64, sqlx::Error> {
        let program_name = metadata
            .program_name
            .clone()
            .unwrap_or_else(|| metadata.title.clone());
        let application_url = metadata
            .application_url
            .clone()
            .or_else(|| metadata.source_url.clone())
            .unwrap_or_default();

        sqlx::query_scalar(
            r#"
            INSERT INTO education_programs
                (program_name, description, institution, application_url, embedding)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&program_name)
        .bind(description)
        .bind(metadata.institution.as_deref().unwrap_or(""))
        .bind(&application_url)
        .bind(embedding)
        .fetch_one(&self.db)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_id_shape() {
        let id = DocumentIngestor::generate_document_id(b"some content", "article");
        let parts: Vec<&str> = id.splitn(3, '_').collect();
        assert_eq!(parts[0], "art");
        assert_eq!(parts[1].len(), 8);
        assert!(parts[1].chars().all(|c| c.is_ascii_hexdigit()));
        // timestamp part: YYYYmmdd_HHMMSS
        assert_eq!(parts[2].len(), 15);
    }

    #[test]
    fn test_document_id_is_content_addressed() {
        let a = DocumentIngestor::generate_document_id(b"same bytes", "guide");
        let b = DocumentIngestor::generate_document_id(b"same bytes", "guide");
        // Hash segment matches even when timestamps differ.
        assert_eq!(a.split('_').nth(1), b.split('_').nth(1));

        let c = DocumentIngestor::generate_document_id(b"other bytes", "guide");
        assert_ne!(a.split('_').nth(1), c.split('_').nth(1));
    }

    #[test]
    fn test_document_id_prefix_falls_back_for_empty_type() {
        let id = DocumentIngestor::generate_document_id(b"x", "");
        assert!(id.starts_with("doc_"));
    }
}
