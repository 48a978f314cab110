//! Typed helpers for a few Canvas resources, built on [`CanvasClient`].
//!
//! Models keep the fields callers commonly need; anything else is available
//! through `extra`.

use crate::dto::{
    CreateAnnouncementDto, CreateSharedBrandConfigDto, CreateSubmissionDto, UpdateAnnouncementDto,
    UpdateSharedBrandConfigDto,
};
use crate::error::Result;
use crate::pagination::Paginator;
use crate::rest::{CanvasClient, RequestDescriptor};
use crate::time::Time;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub course_code: Option<String>,
    #[serde(default)]
    pub workflow_state: Option<String>,
    #[serde(default)]
    pub start_at: Option<Time>,
    #[serde(default)]
    pub end_at: Option<Time>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Course {
    pub fn fetch(client: &CanvasClient, course_id: u64) -> Result<Course> {
        client.get(&format!("courses/{}", course_id))
    }

    /// Courses of the current user, across all pages
    pub fn list<'a>(client: &'a CanvasClient, include: &[&str]) -> Result<Paginator<'a, Course>> {
        let descriptor =
            RequestDescriptor::get("courses").query_list("include", include.iter().copied());
        client.execute_collection(&descriptor)
    }
}

/// Discussion topic as returned by the API; announcements share this shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscussionTopic {
    pub id: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub published: Option<bool>,
    #[serde(default)]
    pub delayed_post_at: Option<Time>,
    #[serde(default)]
    pub posted_at: Option<Time>,
    #[serde(default)]
    pub require_initial_post: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub struct Announcement;

impl Announcement {
    pub fn list<'a>(
        client: &'a CanvasClient,
        course_id: u64,
    ) -> Result<Paginator<'a, DiscussionTopic>> {
        let descriptor = RequestDescriptor::get(format!("courses/{}/discussion_topics", course_id))
            .query("only_announcements", true);
        client.execute_collection(&descriptor)
    }

    pub fn create(
        client: &CanvasClient,
        course_id: u64,
        dto: &CreateAnnouncementDto,
    ) -> Result<DiscussionTopic> {
        client.post(&format!("courses/{}/discussion_topics", course_id), dto)
    }

    pub fn update(
        client: &CanvasClient,
        course_id: u64,
        topic_id: u64,
        dto: &UpdateAnnouncementDto,
    ) -> Result<DiscussionTopic> {
        client.put(&format!("courses/{}/discussion_topics/{}", course_id, topic_id), dto)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub assignment_id: Option<u64>,
    #[serde(default)]
    pub user_id: Option<u64>,
    #[serde(default)]
    pub submission_type: Option<String>,
    #[serde(default)]
    pub workflow_state: Option<String>,
    #[serde(default)]
    pub submitted_at: Option<Time>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Submission {
    pub fn create(
        client: &CanvasClient,
        course_id: u64,
        assignment_id: u64,
        dto: &CreateSubmissionDto,
    ) -> Result<Submission> {
        client.post(
            &format!("courses/{}/assignments/{}/submissions", course_id, assignment_id),
            dto,
        )
    }

    pub fn list<'a>(
        client: &'a CanvasClient,
        course_id: u64,
        assignment_id: u64,
    ) -> Result<Paginator<'a, Submission>> {
        client.list(&format!("courses/{}/assignments/{}/submissions", course_id, assignment_id))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedBrandConfig {
    pub id: u64,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub brand_config_md5: Option<String>,
    #[serde(default)]
    pub created_at: Option<Time>,
    #[serde(default)]
    pub updated_at: Option<Time>,
}

impl SharedBrandConfig {
    pub fn create(
        client: &CanvasClient,
        account_id: u64,
        dto: &CreateSharedBrandConfigDto,
    ) -> Result<SharedBrandConfig> {
        client.post(&format!("accounts/{}/shared_brand_configs", account_id), dto)
    }

    /// Sent as JSON: the body keeps the `shared_brand_config` root object
    pub fn update(
        client: &CanvasClient,
        account_id: u64,
        id: u64,
        dto: &UpdateSharedBrandConfigDto,
    ) -> Result<SharedBrandConfig> {
        let body = serde_json::json!({ "shared_brand_config": crate::dto::to_json_body(dto)? });
        let path = format!("accounts/{}/shared_brand_configs/{}", account_id, id);
        let descriptor = RequestDescriptor::put(path).body(crate::dto::Body::Json(body));
        client.request(&descriptor)
    }

    pub fn delete(client: &CanvasClient, id: u64) -> Result<SharedBrandConfig> {
        client.delete(&format!("shared_brand_configs/{}", id))
    }
}
