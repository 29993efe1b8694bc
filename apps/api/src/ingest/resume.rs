//! Resume-specific ingestion on top of the document pipeline.
//!
//! Resumes flow through the same chunk/embed/store path as any document,
//! then mirror into the structured `resumes`/`resume_chunks` tables.
//! The mirror inserts are best-effort: not every deployment provisions
//! those tables, so failures there log a warning instead of failing the
//! job.

use bytes::Bytes;
use chrono::Utc;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::warn;
use uuid::Uuid;

use crate::ingest::{chunker, pdf, DocumentIngestor, IngestError};
use crate::models::document::{IngestMetadata, ProcessReport};
use crate::models::resume::ResumeInfo;

/// Skills matched by substring against resume text. A taxonomy service
/// would replace this list in a non-demo deployment.
const COMMON_SKILLS: &[&str] = &[
    "Python",
    "JavaScript",
    "TypeScript",
    "React",
    "Node.js",
    "AWS",
    "Azure",
    "GCP",
    "Docker",
    "Kubernetes",
    "CI/CD",
    "DevOps",
    "Machine Learning",
    "Data Science",
    "NLP",
    "SQL",
    "PostgreSQL",
    "MySQL",
    "MongoDB",
    "Redis",
    "Project Management",
    "Agile",
    "Scrum",
    "Leadership",
    "Communication",
    "Java",
    "C++",
    "Rust",
    "Go",
    "Swift",
    "Kotlin",
    "PHP",
    "Ruby",
    "Excel",
    "Marketing",
    "Sales",
    "Customer Service",
    "HR",
    "Finance",
    "Accounting",
    "Solar",
    "Wind Energy",
    "Energy Efficiency",
    "HVAC",
    "Electrical",
];

impl DocumentIngestor {
    /// Content-hash-derived resume id: `resume_{8 hex}_{timestamp}`.
    pub fn generate_resume_id(content: &[u8]) -> String {
        let digest = Sha256::digest(content);
        let mut hash_prefix = String::with_capacity(8);
        for byte in digest.iter().take(4) {
            hash_prefix.push_str(&format!("{byte:02x}"));
        }
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        format!("resume_{hash_prefix}_{timestamp}")
    }

    /// Ingests a resume (PDF or plain text) for a user.
    pub async fn ingest_resume(
        &self,
        content: &Bytes,
        filename: &str,
        mime_type: &str,
        user_id: Option<&str>,
    ) -> Result<ProcessReport, IngestError> {
        let resume_id = Self::generate_resume_id(content);

        let text = if mime_type.starts_with("text/") {
            String::from_utf8_lossy(content).into_owned()
        } else {
            pdf::extract_pdf_text(content)?
        };

        let metadata = IngestMetadata {
            title: filename.to_string(),
            content_type: "resume".to_string(),
            user_id: user_id.map(str::to_string),
            filename: Some(filename.to_string()),
            mime_type: Some(mime_type.to_string()),
            ..Default::default()
        };

        let mut report = self
            .process_document(&resume_id, &text, Some(content.as_ref()), &metadata)
            .await?;
        report.resume_id = Some(resume_id.clone());

        self.mirror_resume_rows(&resume_id, filename, &text, content.len(), user_id)
            .await;

        Ok(report)
    }

    /// Best-effort structured mirror of a processed resume.
    async fn mirror_resume_rows(
        &self,
        resume_id: &str,
        filename: &str,
        text: &str,
        file_size: usize,
        user_id: Option<&str>,
    ) {
        let owner = user_id
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let skills = extract_skills(text);
        let resume_insert = sqlx::query(
            r#"
            INSERT INTO resumes
                (id, user_id, file_name, file_size, content_type, content,
                 skills_extracted, processed, processing_status, created_at, processed_at)
            VALUES ($1, $2, $3, $4, 'application/pdf', $5, $6, TRUE, 'completed', NOW(), NOW())
            "#,
        )
        .bind(resume_id)
        .bind(&owner)
        .bind(filename)
        .bind(file_size as i64)
        .bind(text)
        .bind(&skills)
        .execute(self.db())
        .await;

        if let Err(e) = resume_insert {
            warn!("Could not mirror into resumes table (may not exist): {e}");
            return;
        }

        let chunks = chunker::chunk_text(text, self.chunk_size(), self.chunk_overlap());
        for (index, chunk) in chunks.iter().enumerate() {
            let metadata = json!({
                "filename": filename,
                "user_id": user_id,
                "processed_at": Utc::now().to_rfc3339(),
            });
            let result = sqlx::query(
                r#"
                INSERT INTO resume_chunks (id, resume_id, chunk_index, content, metadata, created_at)
                VALUES ($1, $2, $3, $4, $5, NOW())
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(resume_id)
            .bind(index as i32)
            .bind(chunk)
            .bind(&metadata)
            .execute(self.db())
            .await;

            if let Err(e) = result {
                warn!("Could not mirror into resume_chunks table (may not exist): {e}");
                break;
            }
        }
    }

    /// Looks up the most recently processed resume for a user (or any
    /// resume when no user is given).
    pub async fn check_resume_exists(
        &self,
        user_id: Option<&str>,
    ) -> Result<ResumeInfo, sqlx::Error> {
        let row: Option<(String, serde_json::Value)> = sqlx::query_as(
            r#"
            SELECT id, schema FROM document_metadata
            WHERE schema->>'type' = 'resume'
              AND ($1::text IS NULL OR schema->>'user_id' = $1)
            ORDER BY schema->>'processing_date' DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(self.db())
        .await?;

        Ok(match row {
            Some((id, schema)) => ResumeInfo {
                has_resume: true,
                resume_id: Some(id),
                filename: schema
                    .get("filename")
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
                processed_date: schema
                    .get("processing_date")
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
                text_length: schema.get("text_length").and_then(|v| v.as_i64()),
                user_id: schema
                    .get("user_id")
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
            },
            None => ResumeInfo::none(),
        })
    }
}

/// Case-insensitive substring scan for known skills.
pub fn extract_skills(resume_text: &str) -> Vec<String> {
    let haystack = resume_text.to_lowercase();
    COMMON_SKILLS
        .iter()
        .filter(|skill| haystack.contains(&skill.to_lowercase()))
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resume_id_shape() {
        let id = DocumentIngestor::generate_resume_id(b"resume bytes");
        assert!(id.starts_with("resume_"));
        let hash = id.split('_').nth(1).unwrap();
        assert_eq!(hash.len(), 8);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_extract_skills_is_case_insensitive() {
        let skills = extract_skills("Experienced in PYTHON and kubernetes, plus solar installs.");
        assert!(skills.contains(&"Python".to_string()));
        assert!(skills.contains(&"Kubernetes".to_string()));
        assert!(skills.contains(&"Solar".to_string()));
    }

    #[test]
    fn test_extract_skills_empty_text() {
        assert!(extract_skills("").is_empty());
    }

    #[test]
    fn test_extract_skills_no_false_positives() {
        let skills = extract_skills("I enjoy gardening and hiking.");
        assert!(skills.is_empty());
    }
}
