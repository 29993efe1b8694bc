use serde::{Deserialize, Serialize};

/// Response body for resume existence checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeInfo {
    pub has_resume: bool,
    pub resume_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_length: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl ResumeInfo {
    pub fn none() -> Self {
        Self {
            has_resume: false,
            resume_id: None,
            filename: None,
            processed_date: None,
            text_length: None,
            user_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resume_info_none_serializes_minimal() {
        let json = serde_json::to_value(ResumeInfo::none()).unwrap();
        assert_eq!(json["has_resume"], false);
        assert!(json.get("filename").is_none());
    }
}
