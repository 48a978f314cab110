use super::{from_params, ApiDto, Param};
use crate::error::{CanvasError, Result};
use crate::time::Time;
use serde::{Deserialize, Serialize};

const SUBMISSION_TYPES: &[&str] = &[
    "online_text_entry",
    "online_url",
    "online_upload",
    "media_recording",
    "basic_lti_launch",
    "student_annotation",
];

/// Fields of `POST /courses/:course_id/assignments/:assignment_id/submissions`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateSubmissionDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_ids: Option<Vec<u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_comment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_comment_type: Option<String>,
    /// Submit on behalf of another user (requires grading rights)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotatable_attachment_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<Time>,
}

impl CreateSubmissionDto {
    pub fn from_params(params: Param) -> Result<Self> {
        from_params(params)
    }

    pub fn text_entry(body: impl Into<String>) -> Self {
        CreateSubmissionDto {
            submission_type: Some("online_text_entry".to_string()),
            body: Some(body.into()),
            ..Default::default()
        }
    }

    pub fn upload(file_ids: Vec<u64>) -> Self {
        CreateSubmissionDto {
            submission_type: Some("online_upload".to_string()),
            file_ids: Some(file_ids),
            ..Default::default()
        }
    }
}

impl ApiDto for CreateSubmissionDto {
    fn api_property_name(&self) -> &'static str {
        "submission"
    }

    fn validate(&self) -> Result<()> {
        let kind = self
            .submission_type
            .as_deref()
            .ok_or_else(|| {
                CanvasError::InvalidArgument("submission_type is required".to_string())
            })?;
        if !SUBMISSION_TYPES.contains(&kind) {
            return Err(CanvasError::InvalidArgument(format!(
                "unknown submission_type {:?}",
                kind
            )));
        }

        let missing = match kind {
            "online_text_entry" if self.body.is_none() => Some("body"),
            "online_url" | "basic_lti_launch" if self.url.is_none() => Some("url"),
            "online_upload" if self.file_ids.as_ref().map_or(true, Vec::is_empty) => {
                Some("file_ids")
            }
            "media_recording" if self.media_comment_id.is_none() => Some("media_comment_id"),
            "student_annotation" if self.annotatable_attachment_id.is_none() => {
                Some("annotatable_attachment_id")
            }
            _ => None,
        };
        match missing {
            Some(field) => Err(CanvasError::InvalidArgument(format!(
                "{} is required for {} submissions",
                field, kind
            ))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::FormField;
    use serde_json::json;

    #[test]
    fn test_upload_submission_fields() {
        let fields = CreateSubmissionDto::upload(vec![11, 12]).to_api_array().unwrap();
        assert_eq!(
            fields,
            vec![
                FormField::new("submission[submission_type]", "online_upload"),
                FormField::new("submission[file_ids][]", "11"),
                FormField::new("submission[file_ids][]", "12"),
            ]
        );
    }

    #[test]
    fn test_from_camel_case_params() {
        let params = json!({"submissionType": "online_url", "url": "https://example.com/essay"});
        let dto = CreateSubmissionDto::from_params(params.as_object().cloned().unwrap()).unwrap();
        assert_eq!(dto.submission_type.as_deref(), Some("online_url"));
        assert!(dto.to_api_array().is_ok());
    }

    #[test]
    fn test_validation() {
        let err = CreateSubmissionDto::default().to_api_array().unwrap_err();
        assert!(err.to_string().contains("submission_type is required"));

        let err = CreateSubmissionDto::upload(Vec::new()).to_api_array().unwrap_err();
        assert!(err.to_string().contains("file_ids"));

        let dto = CreateSubmissionDto {
            submission_type: Some("carrier_pigeon".to_string()),
            ..Default::default()
        };
        assert!(matches!(dto.validate(), Err(CanvasError::InvalidArgument(_))));
    }
}
