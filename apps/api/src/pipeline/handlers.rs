use axum::{
    extract::{Multipart, Path, Query, State},
    http::HeaderMap,
    Json,
};
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::document::IngestMetadata;
use crate::models::resume::ResumeInfo;
use crate::pipeline::{JobContent, JobStatus, JobStatusView, TaskType};
use crate::state::AppState;

const DEFAULT_TARGET_TABLE: &str = "knowledge_resources";

#[derive(Debug, Serialize)]
pub struct EnqueueResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub message: String,
}

/// Collected `/process` form fields.
#[derive(Debug, Default)]
struct ProcessForm {
    file: Option<(String, Bytes)>,
    url: Option<String>,
    title: Option<String>,
    description: Option<String>,
    content_type: Option<String>,
    target_table: Option<String>,
    additional_metadata: Option<String>,
}

async fn read_process_form(mut multipart: Multipart) -> Result<ProcessForm, AppError> {
    let mut form = ProcessForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("failed to read file: {e}")))?;
                form.file = Some((filename, bytes));
            }
            "url" => form.url = Some(read_text_field(field).await?),
            "title" => form.title = Some(read_text_field(field).await?),
            "description" => form.description = Some(read_text_field(field).await?),
            "content_type" => form.content_type = Some(read_text_field(field).await?),
            "target_table" => form.target_table = Some(read_text_field(field).await?),
            "additional_metadata" => form.additional_metadata = Some(read_text_field(field).await?),
            _ => {}
        }
    }
    Ok(form)
}

async fn read_text_field(field: axum::extract::multipart::Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| AppError::Validation(format!("failed to read form field: {e}")))
}

/// POST /process
///
/// Accepts a PDF upload or a URL plus descriptive fields, enqueues the
/// document, and returns the job id immediately.
pub async fn handle_process(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<EnqueueResponse>, AppError> {
    let user = state.auth.validate_bearer(&headers, &state.db).await?;
    let form = read_process_form(multipart).await?;

    let target_table = form
        .target_table
        .unwrap_or_else(|| DEFAULT_TARGET_TABLE.to_string());
    if target_table != DEFAULT_TARGET_TABLE && !user.can_publish() {
        return Err(AppError::Forbidden(
            "Only admins and partners can add job listings and education programs".to_string(),
        ));
    }

    let title = form
        .title
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| AppError::Validation("title is required".to_string()))?;

    let mut metadata = IngestMetadata {
        title,
        description: form.description,
        content_type: form.content_type.unwrap_or_else(|| "article".to_string()),
        user_id: Some(user.user_id.clone()),
        ..Default::default()
    };

    if let Some(raw) = form.additional_metadata.as_deref() {
        let patch: Value = serde_json::from_str(raw)
            .map_err(|_| AppError::Validation("Invalid additional_metadata format".to_string()))?;
        metadata = metadata
            .apply_patch(&patch)
            .map_err(|e| AppError::Validation(format!("invalid additional_metadata: {e}")))?;
    }

    let (task_type, content) = match (form.file, form.url) {
        (Some((filename, bytes)), _) => {
            let extension = filename.rsplit('.').next().unwrap_or("").to_lowercase();
            if extension != "pdf" {
                return Err(AppError::Validation(format!(
                    "Unsupported file type: {extension}"
                )));
            }
            metadata.filename = Some(filename);
            metadata.mime_type = Some("application/pdf".to_string());
            (TaskType::Pdf, JobContent::Bytes(bytes))
        }
        (None, Some(url)) => {
            metadata.source_url = Some(url.clone());
            (TaskType::Website, JobContent::Url(url))
        }
        (None, None) => {
            return Err(AppError::Validation(
                "Either file or URL must be provided".to_string(),
            ))
        }
    };

    let job_id = state
        .pipeline
        .enqueue(task_type, content, metadata, Some(target_table))
        .await?;

    Ok(Json(EnqueueResponse {
        job_id,
        status: JobStatus::Queued,
        message: "Document processing started".to_string(),
    }))
}

/// POST /resume/upload
pub async fn handle_resume_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<EnqueueResponse>, AppError> {
    let user = state.auth.validate_bearer(&headers, &state.db).await?;

    let mut file: Option<(String, Bytes)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("invalid multipart body: {e}")))?
    {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or("resume.pdf").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(format!("failed to read file: {e}")))?;
            file = Some((filename, bytes));
        }
    }

    let (filename, bytes) =
        file.ok_or_else(|| AppError::Validation("file is required".to_string()))?;
    if !filename.to_lowercase().ends_with(".pdf") {
        return Err(AppError::Validation(
            "Resume must be a PDF file".to_string(),
        ));
    }

    let metadata = IngestMetadata {
        title: filename.clone(),
        content_type: "resume".to_string(),
        user_id: Some(user.user_id),
        filename: Some(filename),
        mime_type: Some("application/pdf".to_string()),
        ..Default::default()
    };

    let job_id = state
        .pipeline
        .enqueue(TaskType::Resume, JobContent::Bytes(bytes), metadata, None)
        .await?;

    Ok(Json(EnqueueResponse {
        job_id,
        status: JobStatus::Queued,
        message: "Resume processing started".to_string(),
    }))
}

/// GET /resume/:user_id
pub async fn handle_get_resume(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> Result<Json<ResumeInfo>, AppError> {
    let user = state.auth.validate_bearer(&headers, &state.db).await?;
    if !user.can_view_resume_of(&user_id) {
        return Err(AppError::Forbidden(
            "Not authorized to view this resume".to_string(),
        ));
    }

    let info = state.ingestor.check_resume_exists(Some(&user_id)).await?;
    Ok(Json(info))
}

/// GET /status/:job_id
pub async fn handle_job_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobStatusView>, AppError> {
    state.auth.validate_bearer(&headers, &state.db).await?;

    let view = state.pipeline.get_status(job_id).await;
    if view.status == JobStatus::NotFound {
        return Err(AppError::NotFound(format!("Job {job_id} not found")));
    }
    Ok(Json(view))
}

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    pub status: Option<JobStatus>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    10
}

#[derive(Debug, Serialize)]
pub struct ListJobsResponse {
    pub total_count: usize,
    pub count: usize,
    pub jobs: Vec<JobStatusView>,
}

/// GET /jobs
///
/// Non-admins only see their own jobs; results are newest-first.
pub async fn handle_list_jobs(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListJobsQuery>,
) -> Result<Json<ListJobsResponse>, AppError> {
    let user = state.auth.validate_bearer(&headers, &state.db).await?;
    let limit = query.limit.clamp(1, 100);

    let mut jobs = state.pipeline.list_jobs().await;
    if !user.is_admin() {
        jobs.retain(|job| job.metadata.user_id.as_deref() == Some(user.user_id.as_str()));
    }
    if let Some(status) = query.status {
        jobs.retain(|job| job.status == status);
    }
    jobs.sort_by(|a, b| b.queued_at.cmp(&a.queued_at));

    let total_count = jobs.len();
    let page: Vec<JobStatusView> = jobs
        .into_iter()
        .skip(query.offset)
        .take(limit)
        .map(JobStatusView::from)
        .collect();

    Ok(Json(ListJobsResponse {
        total_count,
        count: page.len(),
        jobs: page,
    }))
}

#[derive(Debug, Deserialize)]
pub struct BatchItem {
    pub task_type: String,
    /// URL for website items; base64-encoded bytes for pdf/resume items.
    pub content: String,
    #[serde(default)]
    pub metadata: Option<Value>,
    #[serde(default)]
    pub target_table: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub count: usize,
    pub job_ids: Vec<Uuid>,
    pub status: JobStatus,
    pub message: String,
}

/// POST /batch
pub async fn handle_batch(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(items): Json<Vec<BatchItem>>,
) -> Result<Json<BatchResponse>, AppError> {
    let user = state.auth.validate_bearer(&headers, &state.db).await?;
    if !user.can_publish() {
        return Err(AppError::Forbidden(
            "Only admins and partners can use batch processing".to_string(),
        ));
    }
    if items.is_empty() {
        return Err(AppError::Validation("Invalid batch items".to_string()));
    }

    let mut job_ids = Vec::with_capacity(items.len());
    for item in items {
        let task_type: TaskType = item.task_type.parse().map_err(AppError::Validation)?;

        let mut metadata = IngestMetadata {
            title: "Untitled".to_string(),
            user_id: Some(user.user_id.clone()),
            ..Default::default()
        };
        if let Some(patch) = &item.metadata {
            metadata = metadata
                .apply_patch(patch)
                .map_err(|e| AppError::Validation(format!("invalid metadata: {e}")))?;
            metadata.user_id = Some(user.user_id.clone());
        }

        let content = match task_type {
            TaskType::Website => JobContent::Url(item.content),
            TaskType::Pdf | TaskType::Resume => {
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(&item.content)
                    .map_err(|_| {
                        AppError::Validation(
                            "pdf/resume batch content must be base64".to_string(),
                        )
                    })?;
                JobContent::Bytes(Bytes::from(bytes))
            }
        };

        let target_table = match task_type {
            TaskType::Resume => None,
            _ => Some(
                item.target_table
                    .unwrap_or_else(|| DEFAULT_TARGET_TABLE.to_string()),
            ),
        };

        let job_id = state
            .pipeline
            .enqueue(task_type, content, metadata, target_table)
            .await?;
        job_ids.push(job_id);
    }

    Ok(Json(BatchResponse {
        count: job_ids.len(),
        job_ids,
        status: JobStatus::Queued,
        message: "Batch processing started".to_string(),
    }))
}
