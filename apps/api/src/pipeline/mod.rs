//! Async processing pipeline: a bounded FIFO queue drained by a fixed
//! pool of worker tasks, with in-memory job tracking.
//!
//! Jobs are mutated only by the worker that dequeues them; handlers read
//! snapshots. The map is never pruned and is lost on restart (accepted
//! limitation: status polling is best-effort across deploys).

pub mod handlers;
pub mod processor;

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{error, info};
use uuid::Uuid;

use crate::ingest::IngestError;
use crate::models::document::{IngestMetadata, ProcessReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Pdf,
    Website,
    Resume,
}

impl FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pdf" => Ok(TaskType::Pdf),
            "website" | "url" => Ok(TaskType::Website),
            "resume" => Ok(TaskType::Resume),
            other => Err(format!("Unsupported task type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    NotFound,
}

/// Payload handed to a worker: raw bytes for uploads, a URL for websites.
#[derive(Debug, Clone)]
pub enum JobContent {
    Bytes(Bytes),
    Url(String),
}

/// A dequeued unit of work.
#[derive(Debug, Clone)]
pub struct QueuedJob {
    pub job_id: Uuid,
    pub task_type: TaskType,
    pub content: JobContent,
    pub metadata: IngestMetadata,
    pub target_table: Option<String>,
}

/// Job metadata surfaced in listings.
#[derive(Debug, Clone, Serialize)]
pub struct JobMeta {
    pub title: String,
    pub content_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Tracked state of a job, from enqueue to completion.
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub id: Uuid,
    pub status: JobStatus,
    pub task_type: TaskType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_table: Option<String>,
    pub metadata: JobMeta,
    pub queued_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ProcessReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Status view returned for lookups; unknown ids get `not_found` instead
/// of an error. Fields beyond `id`/`status` are absent for unknown jobs.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatusView {
    pub id: Uuid,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_type: Option<TaskType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_table: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JobMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queued_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ProcessReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobStatusView {
    fn not_found(id: Uuid) -> Self {
        Self {
            id,
            status: JobStatus::NotFound,
            task_type: None,
            target_table: None,
            metadata: None,
            queued_at: None,
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
        }
    }
}

impl From<JobRecord> for JobStatusView {
    fn from(record: JobRecord) -> Self {
        Self {
            id: record.id,
            status: record.status,
            task_type: Some(record.task_type),
            target_table: record.target_table,
            metadata: Some(record.metadata),
            queued_at: Some(record.queued_at),
            started_at: record.started_at,
            completed_at: record.completed_at,
            result: record.result,
            error: record.error,
        }
    }
}

/// Processing backend the workers delegate to. The production impl is
/// [`processor::IngestProcessor`]; tests inject stubs.
#[async_trait]
pub trait JobProcessor: Send + Sync {
    async fn process(&self, job: &QueuedJob) -> Result<ProcessReport, IngestError>;
}

pub struct PipelineManager {
    jobs: Arc<RwLock<HashMap<Uuid, JobRecord>>>,
    tx: mpsc::Sender<QueuedJob>,
    worker_count: usize,
}

impl PipelineManager {
    /// Builds the manager and spawns the worker pool.
    pub fn start(
        processor: Arc<dyn JobProcessor>,
        worker_count: usize,
        queue_capacity: usize,
    ) -> Arc<Self> {
        let worker_count = worker_count.max(1);
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let jobs: Arc<RwLock<HashMap<Uuid, JobRecord>>> = Arc::new(RwLock::new(HashMap::new()));

        for worker_id in 0..worker_count {
            tokio::spawn(worker_loop(
                worker_id,
                rx.clone(),
                jobs.clone(),
                processor.clone(),
            ));
        }
        info!("Started {worker_count} pipeline workers");

        Arc::new(Self {
            jobs,
            tx,
            worker_count,
        })
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Registers a job and queues it for processing. Returns once the
    /// item is accepted onto the (bounded) queue.
    pub async fn enqueue(
        &self,
        task_type: TaskType,
        content: JobContent,
        metadata: IngestMetadata,
        target_table: Option<String>,
    ) -> anyhow::Result<Uuid> {
        let job_id = Uuid::new_v4();
        let record = JobRecord {
            id: job_id,
            status: JobStatus::Queued,
            task_type,
            target_table: target_table.clone(),
            metadata: JobMeta {
                title: if metadata.title.is_empty() {
                    "Untitled".to_string()
                } else {
                    metadata.title.clone()
                },
                content_type: metadata.content_type.clone(),
                user_id: metadata.user_id.clone(),
            },
            queued_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
        };

        self.jobs.write().await.insert(job_id, record);

        self.tx
            .send(QueuedJob {
                job_id,
                task_type,
                content,
                metadata,
                target_table,
            })
            .await
            .map_err(|_| anyhow::anyhow!("processing queue is closed"))?;

        Ok(job_id)
    }

    /// Snapshot of a job's state; unknown ids report `not_found`.
    pub async fn get_status(&self, job_id: Uuid) -> JobStatusView {
        match self.jobs.read().await.get(&job_id) {
            Some(record) => JobStatusView::from(record.clone()),
            None => JobStatusView::not_found(job_id),
        }
    }

    /// All tracked jobs, unordered (callers sort/filter).
    pub async fn list_jobs(&self) -> Vec<JobRecord> {
        self.jobs.read().await.values().cloned().collect()
    }

    pub async fn job_count(&self) -> usize {
        self.jobs.read().await.len()
    }
}

async fn worker_loop(
    worker_id: usize,
    rx: Arc<Mutex<mpsc::Receiver<QueuedJob>>>,
    jobs: Arc<RwLock<HashMap<Uuid, JobRecord>>>,
    processor: Arc<dyn JobProcessor>,
) {
    loop {
        // Hold the receiver lock only for the dequeue so workers process
        // concurrently.
        let job = { rx.lock().await.recv().await };
        let Some(job) = job else {
            info!("Worker {worker_id} shutting down: queue closed");
            break;
        };

        {
            let mut map = jobs.write().await;
            if let Some(record) = map.get_mut(&job.job_id) {
                record.status = JobStatus::Processing;
                record.started_at = Some(Utc::now());
            }
        }

        let outcome = processor.process(&job).await;

        let mut map = jobs.write().await;
        if let Some(record) = map.get_mut(&job.job_id) {
            record.completed_at = Some(Utc::now());
            match outcome {
                Ok(report) => {
                    record.status = JobStatus::Completed;
                    record.result = Some(report);
                }
                Err(e) => {
                    error!("Worker {worker_id}: job {} failed: {e}", job.job_id);
                    record.status = JobStatus::Failed;
                    record.error = Some(e.to_string());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct StubProcessor {
        fail: bool,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl StubProcessor {
        fn ok() -> Arc<Self> {
            Arc::new(Self {
                fail: false,
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                fail: true,
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            })
        }

        fn slow(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                fail: false,
                delay,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl JobProcessor for StubProcessor {
        async fn process(&self, job: &QueuedJob) -> Result<ProcessReport, IngestError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail {
                return Err(IngestError::Extraction("stub failure".to_string()));
            }
            Ok(ProcessReport {
                document_id: "doc_00000000_20250101_000000".to_string(),
                title: job.metadata.title.clone(),
                text_length: 10,
                chunks_created: 1,
                processed_at: Utc::now(),
                resource_id: None,
                job_listing_id: None,
                program_id: None,
                resume_id: None,
                domain: None,
            })
        }
    }

    fn metadata(title: &str) -> IngestMetadata {
        IngestMetadata {
            title: title.to_string(),
            content_type: "article".to_string(),
            ..Default::default()
        }
    }

    async fn wait_for_terminal(manager: &PipelineManager, job_id: Uuid) -> JobStatusView {
        for _ in 0..200 {
            let view = manager.get_status(job_id).await;
            if matches!(view.status, JobStatus::Completed | JobStatus::Failed) {
                return view;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("job {job_id} never reached a terminal status");
    }

    #[tokio::test]
    async fn test_unknown_job_reports_not_found() {
        let manager = PipelineManager::start(StubProcessor::ok(), 1, 8);
        let view = manager.get_status(Uuid::new_v4()).await;
        assert_eq!(view.status, JobStatus::NotFound);
        assert!(view.queued_at.is_none());
        assert_eq!(
            serde_json::to_value(&view).unwrap()["status"],
            serde_json::json!("not_found")
        );
    }

    #[tokio::test]
    async fn test_job_completes_and_records_report() {
        let manager = PipelineManager::start(StubProcessor::ok(), 2, 8);
        let job_id = manager
            .enqueue(
                TaskType::Website,
                JobContent::Url("https://example.com".to_string()),
                metadata("Example"),
                Some("knowledge_resources".to_string()),
            )
            .await
            .unwrap();

        let view = wait_for_terminal(&manager, job_id).await;
        assert_eq!(view.status, JobStatus::Completed);
        assert_eq!(view.result.unwrap().chunks_created, 1);
        assert!(view.started_at.is_some());
        assert!(view.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_failed_job_records_error_and_pool_survives() {
        let stub = StubProcessor::failing();
        let manager = PipelineManager::start(stub.clone(), 1, 8);
        let first = manager
            .enqueue(
                TaskType::Pdf,
                JobContent::Bytes(Bytes::from_static(b"%PDF")),
                metadata("Bad"),
                None,
            )
            .await
            .unwrap();
        let view = wait_for_terminal(&manager, first).await;
        assert_eq!(view.status, JobStatus::Failed);
        assert!(view.error.unwrap().contains("stub failure"));

        // The worker is still alive for subsequent jobs.
        let second = manager
            .enqueue(
                TaskType::Pdf,
                JobContent::Bytes(Bytes::from_static(b"%PDF")),
                metadata("Also bad"),
                None,
            )
            .await
            .unwrap();
        let view = wait_for_terminal(&manager, second).await;
        assert_eq!(view.status, JobStatus::Failed);
        assert_eq!(stub.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_job_is_queued_before_dequeue() {
        // Saturate the single worker so the next job stays queued.
        let manager = PipelineManager::start(StubProcessor::slow(Duration::from_secs(5)), 1, 8);
        let blocker = manager
            .enqueue(
                TaskType::Website,
                JobContent::Url("https://example.com/a".to_string()),
                metadata("Blocker"),
                None,
            )
            .await
            .unwrap();
        let queued = manager
            .enqueue(
                TaskType::Website,
                JobContent::Url("https://example.com/b".to_string()),
                metadata("Waiting"),
                None,
            )
            .await
            .unwrap();

        // Give the worker time to pick up the first job.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let blocker_view = manager.get_status(blocker).await;
        let queued_view = manager.get_status(queued).await;
        assert_eq!(blocker_view.status, JobStatus::Processing);
        assert_eq!(queued_view.status, JobStatus::Queued);
    }

    #[tokio::test]
    async fn test_terminal_status_never_reverts() {
        let manager = PipelineManager::start(StubProcessor::ok(), 2, 8);
        let job_id = manager
            .enqueue(
                TaskType::Website,
                JobContent::Url("https://example.com".to_string()),
                metadata("Done"),
                None,
            )
            .await
            .unwrap();
        wait_for_terminal(&manager, job_id).await;

        // Repeated reads observe the same terminal status.
        for _ in 0..5 {
            let view = manager.get_status(job_id).await;
            assert_eq!(view.status, JobStatus::Completed);
        }
    }

    #[tokio::test]
    async fn test_list_jobs_tracks_every_enqueue() {
        let manager = PipelineManager::start(StubProcessor::ok(), 2, 8);
        for i in 0..3 {
            manager
                .enqueue(
                    TaskType::Website,
                    JobContent::Url(format!("https://example.com/{i}")),
                    metadata(&format!("Job {i}")),
                    None,
                )
                .await
                .unwrap();
        }
        assert_eq!(manager.job_count().await, 3);
        assert_eq!(manager.list_jobs().await.len(), 3);
    }

    #[test]
    fn test_task_type_parsing() {
        assert_eq!("pdf".parse::<TaskType>().unwrap(), TaskType::Pdf);
        assert_eq!("URL".parse::<TaskType>().unwrap(), TaskType::Website);
        assert_eq!("website".parse::<TaskType>().unwrap(), TaskType::Website);
        assert!("spreadsheet".parse::<TaskType>().is_err());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(JobStatus::NotFound).unwrap(),
            serde_json::json!("not_found")
        );
        assert_eq!(
            serde_json::to_value(JobStatus::Queued).unwrap(),
            serde_json::json!("queued")
        );
    }
}
