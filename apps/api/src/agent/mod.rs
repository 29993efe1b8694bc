//! The chat agent: retrieval-augmented proxy over the chat LLM.
//!
//! Each request embeds the query, pulls relevant knowledge chunks (and
//! resume excerpts when the question is about the user's resume), and
//! forwards one augmented completion call to the LLM.

pub mod handlers;
pub mod prompts;

use base64::Engine;
use bytes::Bytes;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::llm_client::ChatMessage;
use crate::models::chat::{
    AssistantRequest, AssistantResponse, FileAttachment, ProcessedFile, ProcessedFileKind,
};
use crate::search::{SimilaritySearch, AGENT_MATCH_COUNT, AGENT_MATCH_THRESHOLD};
use crate::state::AppState;

/// Resume excerpts injected into the prompt.
const RESUME_CONTEXT_LIMIT: usize = 3;
/// Characters of each excerpt kept in the prompt.
const RESUME_EXCERPT_CHARS: usize = 200;
/// Prior-conversation matches injected into the prompt.
const CONVERSATION_CONTEXT_COUNT: i32 = 3;

pub async fn run_assistant(
    state: &AppState,
    request: AssistantRequest,
    api_key_override: Option<&str>,
) -> Result<AssistantResponse, AppError> {
    let session_id = Uuid::new_v4().to_string();
    let conversation_id = Uuid::new_v4().to_string();

    let processed_files = process_attachments(state, &request).await;
    if !processed_files.is_empty() {
        info!(
            "Processed {} attachments for user {}",
            processed_files.len(),
            request.user_id
        );
    }

    // Caller-supplied key applies to both the completion and the query
    // embeddings for this request.
    let search = match api_key_override {
        Some(key) => state
            .search
            .with_embeddings(state.embeddings.with_api_key(key.to_string())),
        None => state.search.clone(),
    };

    let resume_intent = detect_resume_intent(&request.query);
    let mut user_message = request.query.clone();
    let mut system_prompt = prompts::ASSISTANT_SYSTEM.to_string();

    if resume_intent {
        let has_resume = state
            .ingestor
            .check_resume_exists(Some(&request.user_id))
            .await?
            .has_resume
            || processed_files
                .iter()
                .any(|f| f.kind == ProcessedFileKind::Resume);

        if !has_resume {
            return Ok(AssistantResponse {
                response: prompts::NO_RESUME_REPLY.to_string(),
                session_id,
                conversation_id,
                user_id: request.user_id,
            });
        }

        system_prompt = prompts::RESUME_ANALYSIS_SYSTEM.to_string();
        if let Some(block) = resume_context(&search, &request).await {
            user_message.push_str(&block);
        }
    }

    if let Some(context) = knowledge_context(&search, &request.query).await {
        system_prompt.push_str(&context);
    }
    if let Some(context) = conversation_context(&search, &request).await {
        system_prompt.push_str(&context);
    }

    let messages = vec![
        ChatMessage::system(system_prompt),
        ChatMessage::user(user_message),
    ];

    let response = state
        .llm
        .complete(&messages, api_key_override)
        .await
        .map_err(|e| AppError::Llm(e.to_string()))?;

    Ok(AssistantResponse {
        response,
        session_id,
        conversation_id,
        user_id: request.user_id,
    })
}

/// Ingests PDF and text attachments as resumes, synchronously (chat
/// callers expect their resume to be searchable in the same turn).
async fn process_attachments(state: &AppState, request: &AssistantRequest) -> Vec<ProcessedFile> {
    let Some(files) = &request.files else {
        return Vec::new();
    };

    let mut processed = Vec::with_capacity(files.len());
    for file in files {
        processed.push(process_one_attachment(state, file, &request.user_id).await);
    }
    processed
}

async fn process_one_attachment(
    state: &AppState,
    file: &FileAttachment,
    user_id: &str,
) -> ProcessedFile {
    let filename = file.display_name().to_string();

    if !(file.mime_type.starts_with("application/pdf") || file.mime_type.starts_with("text/")) {
        return ProcessedFile {
            filename,
            kind: ProcessedFileKind::Unsupported,
            resume_id: None,
            error: Some(format!("Unsupported file type: {}", file.mime_type)),
        };
    }

    let bytes = match base64::engine::general_purpose::STANDARD.decode(&file.content) {
        Ok(bytes) => Bytes::from(bytes),
        Err(e) => {
            return ProcessedFile {
                filename,
                kind: ProcessedFileKind::Error,
                resume_id: None,
                error: Some(format!("invalid base64 content: {e}")),
            }
        }
    };

    match state
        .ingestor
        .ingest_resume(&bytes, &filename, &file.mime_type, Some(user_id))
        .await
    {
        Ok(report) => ProcessedFile {
            filename,
            kind: ProcessedFileKind::Resume,
            resume_id: report.resume_id,
            error: None,
        },
        Err(e) => {
            warn!("Attachment {filename} failed to process: {e}");
            ProcessedFile {
                filename,
                kind: ProcessedFileKind::Error,
                resume_id: None,
                error: Some(e.to_string()),
            }
        }
    }
}

fn detect_resume_intent(query: &str) -> bool {
    let lowered = query.to_lowercase();
    lowered.contains("resume") || lowered.contains("analyze")
}

/// Resume excerpts for the prompt: the structured chunk mirror is tried
/// first, then the generic resume-content search.
async fn resume_context(search: &SimilaritySearch, request: &AssistantRequest) -> Option<String> {
    match search
        .match_resume_chunks(&request.query, Some(&request.user_id), 0.5, 5)
        .await
    {
        Ok(matches) if !matches.is_empty() => {
            return Some(resume_context_block(
                matches.iter().map(|m| m.content.as_str()),
            ));
        }
        Ok(_) => {}
        Err(e) => warn!("match_resume_chunks unavailable: {e}"),
    }

    match search
        .match_resume_content(&request.query, Some(&request.user_id), 0.5, 5)
        .await
    {
        Ok(matches) if !matches.is_empty() => Some(resume_context_block(
            matches.iter().map(|m| m.content.as_str()),
        )),
        Ok(_) => None,
        Err(e) => {
            warn!("Resume context retrieval failed: {e}");
            None
        }
    }
}

fn resume_context_block<'a>(excerpts: impl Iterator<Item = &'a str>) -> String {
    let mut block = String::from("\n\nResume excerpts:\n");
    for (i, excerpt) in excerpts.take(RESUME_CONTEXT_LIMIT).enumerate() {
        let trimmed: String = excerpt.chars().take(RESUME_EXCERPT_CHARS).collect();
        block.push_str(&format!("{}. {trimmed}\n", i + 1));
    }
    block
}

/// Knowledge-base context block: document chunks (resume chunks
/// excluded) plus curated resources.
async fn knowledge_context(search: &SimilaritySearch, query: &str) -> Option<String> {
    let mut block = String::new();

    match search
        .match_documents(query, AGENT_MATCH_THRESHOLD, AGENT_MATCH_COUNT)
        .await
    {
        Ok(matches) => {
            let relevant: Vec<_> = matches
                .into_iter()
                .filter(|m| m.document_type() != Some("resume"))
                .collect();
            if !relevant.is_empty() {
                block.push_str("\n\nRelevant context:\n");
                for m in relevant {
                    block.push_str(&format!("- {}\n", m.content));
                }
            }
        }
        Err(e) => warn!("Knowledge retrieval failed: {e}"),
    }

    match search
        .match_knowledge_resources(query, AGENT_MATCH_THRESHOLD, AGENT_MATCH_COUNT)
        .await
    {
        Ok(resources) if !resources.is_empty() => {
            block.push_str("\n\nCurated resources:\n");
            for r in resources {
                block.push_str(&format!("- {}: {} ({})\n", r.title, r.description, r.source_url));
            }
        }
        Ok(_) => {}
        Err(e) => warn!("Resource retrieval failed: {e}"),
    }

    if block.is_empty() {
        None
    } else {
        Some(block)
    }
}

/// Related snippets from the user's earlier conversations.
async fn conversation_context(
    search: &SimilaritySearch,
    request: &AssistantRequest,
) -> Option<String> {
    let matches = match search
        .search_conversation_messages(
            &request.query,
            Some(&request.user_id),
            AGENT_MATCH_THRESHOLD,
            CONVERSATION_CONTEXT_COUNT,
        )
        .await
    {
        Ok(matches) => matches,
        Err(e) => {
            // The conversation store is optional; retrieval failure only
            // costs context.
            warn!("Conversation history retrieval failed: {e}");
            return None;
        }
    };

    if matches.is_empty() {
        return None;
    }

    let mut block = String::from("\n\nFrom earlier conversations:\n");
    for m in matches {
        block.push_str(&format!("- {}\n", m.content));
    }
    Some(block)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resume_intent_detection() {
        assert!(detect_resume_intent("Can you analyze my background?"));
        assert!(detect_resume_intent("look at my RESUME please"));
        assert!(!detect_resume_intent("what solar jobs exist in Boston?"));
    }

    #[test]
    fn test_resume_context_block_limits_excerpts() {
        let excerpts = vec!["a"; 10];
        let block = resume_context_block(excerpts.into_iter());
        assert_eq!(block.matches("\n1. ").count() + block.matches("\n2. ").count(), 2);
        assert!(block.contains("3. a"));
        assert!(!block.contains("4. a"));
    }

    #[test]
    fn test_resume_context_block_truncates_long_excerpts() {
        let long = "x".repeat(500);
        let block = resume_context_block(std::iter::once(long.as_str()));
        assert!(block.len() < 300);
    }
}
