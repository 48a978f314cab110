use super::{from_params, nullable, ApiDto, Param};
use crate::error::{CanvasError, Result};
use crate::time::Time;
use serde::{Deserialize, Serialize};

/// Fields of `POST /courses/:course_id/discussion_topics`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateDiscussionTopicDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// "side_comment", "threaded" or "not_threaded"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discussion_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delayed_post_at: Option<Time>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_at: Option<Time>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_rating: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_initial_post: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_announcement: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_category_id: Option<u64>,
    /// Comma-separated section ids, or "all"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specific_sections: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_ids: Option<Vec<u64>>,
}

impl CreateDiscussionTopicDto {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        CreateDiscussionTopicDto {
            title: Some(title.into()),
            message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn from_params(params: Param) -> Result<Self> {
        from_params(params)
    }
}

impl ApiDto for CreateDiscussionTopicDto {
    fn api_property_name(&self) -> &'static str {
        ""
    }

    fn validate(&self) -> Result<()> {
        match self.title.as_deref() {
            Some(title) if !title.trim().is_empty() => Ok(()),
            _ => Err(CanvasError::InvalidArgument(
                "discussion topic title is required".to_string(),
            )),
        }
    }
}

/// Fields of `PUT /courses/:course_id/discussion_topics/:topic_id`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateDiscussionTopicDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discussion_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,
    /// `Some(None)` clears a scheduled post
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "nullable")]
    pub delayed_post_at: Option<Option<Time>>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "nullable")]
    pub lock_at: Option<Option<Time>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub podcast_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub podcast_has_student_posts: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_initial_post: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_announcement: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_after: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_category_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_rating: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub only_graders_can_rate: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by_rating: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specific_sections: Option<String>,
}

impl UpdateDiscussionTopicDto {
    pub fn from_params(params: Param) -> Result<Self> {
        from_params(params)
    }

    pub fn with_delayed_post_at(mut self, at: Option<Time>) -> Self {
        self.delayed_post_at = Some(at);
        self
    }
}

impl ApiDto for UpdateDiscussionTopicDto {
    fn api_property_name(&self) -> &'static str {
        ""
    }
}

/// Forced values for announcements, applied over the discussion topic fields.
///
/// A caller-supplied `require_initial_post` is always replaced with `false`;
/// clearing `delayed_post_at` publishes the announcement immediately.
pub fn announcement_overlay(topic: &mut UpdateDiscussionTopicDto) {
    topic.is_announcement = Some(true);
    if topic.require_initial_post.is_some() {
        topic.require_initial_post = Some(false);
    }
    if matches!(topic.delayed_post_at, Some(None)) {
        topic.published = Some(true);
    }
}

/// Announcement creation: a discussion topic with `is_announcement` forced on
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateAnnouncementDto {
    #[serde(flatten)]
    pub topic: CreateDiscussionTopicDto,
}

impl CreateAnnouncementDto {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        CreateAnnouncementDto {
            topic: CreateDiscussionTopicDto::new(title, message),
        }
    }

    pub fn from_params(params: Param) -> Result<Self> {
        Ok(CreateAnnouncementDto {
            topic: from_params(params)?,
        })
    }
}

impl ApiDto for CreateAnnouncementDto {
    fn api_property_name(&self) -> &'static str {
        ""
    }

    fn validate(&self) -> Result<()> {
        self.topic.validate()
    }

    fn overlay(&mut self) {
        self.topic.is_announcement = Some(true);
    }
}

/// Announcement update: discussion topic fields plus [`announcement_overlay`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateAnnouncementDto {
    #[serde(flatten)]
    pub topic: UpdateDiscussionTopicDto,
}

impl UpdateAnnouncementDto {
    pub fn new(topic: UpdateDiscussionTopicDto) -> Self {
        let mut dto = UpdateAnnouncementDto { topic };
        dto.overlay();
        dto
    }

    pub fn from_params(params: Param) -> Result<Self> {
        Ok(Self::new(from_params(params)?))
    }
}

impl ApiDto for UpdateAnnouncementDto {
    fn api_property_name(&self) -> &'static str {
        ""
    }

    fn overlay(&mut self) {
        announcement_overlay(&mut self.topic);
    }
}
