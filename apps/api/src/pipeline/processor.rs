//! Production job processor: dispatches dequeued work to the ingest
//! pipeline and the target-table inserts.

use async_trait::async_trait;

use crate::ingest::{DocumentIngestor, IngestError};
use crate::models::document::{IngestMetadata, ProcessReport};
use crate::pipeline::{JobContent, JobProcessor, QueuedJob, TaskType};

const TARGET_KNOWLEDGE: &str = "knowledge_resources";
const TARGET_JOBS: &str = "job_listings";
const TARGET_PROGRAMS: &str = "education_programs";

pub struct IngestProcessor {
    ingestor: DocumentIngestor,
}

impl IngestProcessor {
    pub fn new(ingestor: DocumentIngestor) -> Self {
        Self { ingestor }
    }

    /// After a full document ingest, promotes the document into one of
    /// the curated tables using its first-chunk embedding as the
    /// document-level vector.
    async fn promote_to_target(
        &self,
        mut report: ProcessReport,
        metadata: &IngestMetadata,
        target_table: &str,
    ) -> Result<ProcessReport, IngestError> {
        let embedding = self
            .ingestor
            .first_chunk_embedding(&report.document_id)
            .await?;

        match target_table {
            TARGET_KNOWLEDGE => {
                let id = self
                    .ingestor
                    .store_knowledge_resource(metadata, embedding)
                    .await?;
                report.resource_id = Some(id);
            }
            TARGET_JOBS => {
                let full_text = self.ingestor.document_content(&report.document_id).await?;
                let id = self
                    .ingestor
                    .store_job_listing(metadata, &full_text, embedding)
                    .await?;
                report.job_listing_id = Some(id);
            }
            TARGET_PROGRAMS => {
                let full_text = self.ingestor.document_content(&report.document_id).await?;
                let id = self
                    .ingestor
                    .store_education_program(metadata, &full_text, embedding)
                    .await?;
                report.program_id = Some(id);
            }
            // Generic ingest: chunks and metadata only.
            _ => {}
        }

        Ok(report)
    }
}

#[async_trait]
impl JobProcessor for IngestProcessor {
    async fn process(&self, job: &QueuedJob) -> Result<ProcessReport, IngestError> {
        match job.task_type {
            TaskType::Pdf => {
                let JobContent::Bytes(bytes) = &job.content else {
                    return Err(IngestError::Extraction(
                        "PDF job carried no file content".to_string(),
                    ));
                };
                let report = self.ingestor.ingest_pdf(bytes, &job.metadata).await?;
                match &job.target_table {
                    Some(target) => self.promote_to_target(report, &job.metadata, target).await,
                    None => Ok(report),
                }
            }
            TaskType::Website => {
                let JobContent::Url(url) = &job.content else {
                    return Err(IngestError::Extraction(
                        "website job carried no URL".to_string(),
                    ));
                };
                let (report, merged) = self.ingestor.ingest_website(url, &job.metadata).await?;
                match &job.target_table {
                    Some(target) => {
                        // Scraped fallbacks: the page's domain stands in
                        // for a missing company/institution.
                        let mut merged = merged;
                        if merged.company.is_none() {
                            merged.company = report.domain.clone();
                        }
                        if merged.institution.is_none() {
                            merged.institution = report.domain.clone();
                        }
                        self.promote_to_target(report, &merged, target).await
                    }
                    None => Ok(report),
                }
            }
            TaskType::Resume => {
                // Target table is ignored for resumes.
                let JobContent::Bytes(bytes) = &job.content else {
                    return Err(IngestError::Extraction(
                        "resume job carried no file content".to_string(),
                    ));
                };
                let filename = job.metadata.filename.as_deref().unwrap_or("resume.pdf");
                let mime_type = job
                    .metadata
                    .mime_type
                    .as_deref()
                    .unwrap_or("application/pdf");
                self.ingestor
                    .ingest_resume(bytes, filename, mime_type, job.metadata.user_id.as_deref())
                    .await
            }
        }
    }
}
