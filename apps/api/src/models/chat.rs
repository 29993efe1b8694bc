use serde::{Deserialize, Serialize};

/// Inline file attachment on a chat request (base64 payload).
#[derive(Debug, Clone, Deserialize)]
pub struct FileAttachment {
    #[serde(default)]
    pub filename: Option<String>,
    /// Accepted alongside `filename` for older clients.
    #[serde(default)]
    pub name: Option<String>,
    pub content: String,
    pub mime_type: String,
}

impl FileAttachment {
    pub fn display_name(&self) -> &str {
        self.filename
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or("unknown_file")
    }
}

/// Request body for the chat endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct AssistantRequest {
    pub query: String,
    pub user_id: String,
    #[serde(default)]
    pub files: Option<Vec<FileAttachment>>,
}

/// Response body for the chat endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct AssistantResponse {
    pub response: String,
    pub session_id: String,
    pub conversation_id: String,
    pub user_id: String,
}

/// Per-attachment processing summary echoed into agent context.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedFile {
    pub filename: String,
    pub kind: ProcessedFileKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessedFileKind {
    Resume,
    Unsupported,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_display_name_prefers_filename() {
        let file = FileAttachment {
            filename: Some("resume.pdf".to_string()),
            name: Some("other".to_string()),
            content: String::new(),
            mime_type: "application/pdf".to_string(),
        };
        assert_eq!(file.display_name(), "resume.pdf");
    }

    #[test]
    fn test_attachment_display_name_falls_back() {
        let file = FileAttachment {
            filename: None,
            name: None,
            content: String::new(),
            mime_type: "text/plain".to_string(),
        };
        assert_eq!(file.display_name(), "unknown_file");
    }

    #[test]
    fn test_assistant_request_parses_without_files() {
        let req: AssistantRequest =
            serde_json::from_str(r#"{"query": "hi", "user_id": "u1"}"#).unwrap();
        assert!(req.files.is_none());
    }
}
