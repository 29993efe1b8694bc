use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Successful processing outcome recorded on a completed job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessReport {
    pub document_id: String,
    pub title: String,
    pub text_length: usize,
    pub chunks_created: usize,
    pub processed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_listing_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

/// Caller-supplied document metadata carried through the pipeline.
///
/// `/process` builds this from form fields; `additional_metadata` JSON is
/// overlaid on top so callers can supply the typed extras
/// (company/location/institution/...) used by the target-table inserts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestMetadata {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub partner_id: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default = "default_true")]
    pub is_published: bool,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub application_url: Option<String>,
    #[serde(default)]
    pub program_name: Option<String>,
    #[serde(default)]
    pub institution: Option<String>,
}

fn default_content_type() -> String {
    "article".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for IngestMetadata {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: None,
            content_type: default_content_type(),
            source_url: None,
            user_id: None,
            partner_id: None,
            filename: None,
            mime_type: None,
            is_published: true,
            job_title: None,
            company: None,
            location: None,
            application_url: None,
            program_name: None,
            institution: None,
        }
    }
}

impl IngestMetadata {
    /// Overlays non-null fields of `patch` (arbitrary caller JSON) onto
    /// this metadata. Unknown keys are ignored.
    pub fn apply_patch(self, patch: &Value) -> Result<Self, serde_json::Error> {
        let mut base = serde_json::to_value(&self)?;
        if let (Some(base_map), Some(patch_map)) = (base.as_object_mut(), patch.as_object()) {
            for (key, value) in patch_map {
                if !value.is_null() {
                    base_map.insert(key.clone(), value.clone());
                }
            }
        }
        serde_json::from_value(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_metadata_patch_overrides_fields() {
        let meta = IngestMetadata {
            title: "Original".to_string(),
            content_type: "article".to_string(),
            ..Default::default()
        };
        let patched = meta
            .apply_patch(&json!({"company": "Acme Solar", "location": "Boston"}))
            .unwrap();
        assert_eq!(patched.title, "Original");
        assert_eq!(patched.company.as_deref(), Some("Acme Solar"));
        assert_eq!(patched.location.as_deref(), Some("Boston"));
    }

    #[test]
    fn test_metadata_patch_ignores_null_and_unknown_keys() {
        let meta = IngestMetadata {
            title: "Doc".to_string(),
            description: Some("kept".to_string()),
            ..Default::default()
        };
        let patched = meta
            .apply_patch(&json!({"description": null, "unknown_key": 42}))
            .unwrap();
        assert_eq!(patched.description.as_deref(), Some("kept"));
    }

    #[test]
    fn test_metadata_defaults() {
        let meta: IngestMetadata = serde_json::from_value(json!({"title": "T"})).unwrap();
        assert_eq!(meta.content_type, "article");
        assert!(meta.is_published);
    }
}
