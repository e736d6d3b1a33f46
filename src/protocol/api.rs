//! JSON API wire types and endpoint catalogue.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One page of a paginated list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListPage<T> {
    pub list: Vec<T>,
    pub may_be_more: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: u64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRef {
    pub id: u64,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    pub id: u64,
    #[serde(default)]
    pub visibility: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub owner: Option<UserRef>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(rename = "type", default)]
    pub user_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: u64,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub user: Option<UserRef>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub problem: Option<NamedRef>,
    #[serde(default)]
    pub full_status: Option<String>,
    #[serde(default)]
    pub initial_status: Option<String>,
    #[serde(default)]
    pub score: Option<i64>,
    #[serde(rename = "type", default)]
    pub submission_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: u64,
    #[serde(rename = "type", default)]
    pub job_type: String,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub creator: Option<UserRef>,
}

/// Capability flags are opaque to the client: a missing flag means "allowed",
/// the server enforces the real rules.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryFlags(pub BTreeMap<String, bool>);

impl QueryFlags {
    pub fn allows(&self, flag: &str) -> bool {
        self.0.get(flag).copied().unwrap_or(true)
    }

    pub fn allows_any(&self, flags: &[&str]) -> bool {
        flags.iter().any(|flag| self.allows(flag))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceCapabilities {
    #[serde(default = "default_true")]
    pub ui_view: bool,
    #[serde(default)]
    pub list_all: QueryFlags,
    #[serde(default)]
    pub list_my: QueryFlags,
}

impl Default for ResourceCapabilities {
    fn default() -> Self {
        Self {
            ui_view: true,
            list_all: QueryFlags::default(),
            list_my: QueryFlags::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Capabilities {
    pub problems: ResourceCapabilities,
    pub users: ResourceCapabilities,
    pub submissions: ResourceCapabilities,
    pub jobs: ResourceCapabilities,
    pub logs: ResourceCapabilities,
}

pub fn url_api_problems() -> String {
    "/api/problems".to_string()
}

pub fn url_api_problems_with_visibility(visibility: &str) -> String {
    format!("/api/problems/visibility=/{visibility}")
}

pub fn url_api_user_problems(user_id: u64) -> String {
    format!("/api/user/{user_id}/problems")
}

pub fn url_api_user_problems_with_visibility(user_id: u64, visibility: &str) -> String {
    format!("/api/user/{user_id}/problems/visibility=/{visibility}")
}

pub fn url_api_problem(problem_id: u64) -> String {
    format!("/api/problem/{problem_id}")
}

pub fn url_api_users() -> String {
    "/api/users".to_string()
}

pub fn url_api_users_with_type(user_type: &str) -> String {
    format!("/api/users/type=/{user_type}")
}

pub fn url_api_user(user_id: u64) -> String {
    format!("/api/user/{user_id}")
}

pub fn url_api_submissions() -> String {
    "/api/submissions".to_string()
}

pub fn url_api_submissions_with_type(submission_type: &str) -> String {
    format!("/api/submissions/type=/{submission_type}")
}

pub fn url_api_user_submissions(user_id: u64) -> String {
    format!("/api/submissions/user=/{user_id}")
}

pub fn url_api_user_submissions_with_type(user_id: u64, submission_type: &str) -> String {
    format!("/api/submissions/user=/{user_id}/type=/{submission_type}")
}

pub fn url_api_submission(submission_id: u64) -> String {
    format!("/api/submission/{submission_id}")
}

pub fn url_api_jobs() -> String {
    "/api/jobs".to_string()
}

pub fn url_api_jobs_with_status(status: &str) -> String {
    format!("/api/jobs/status=/{status}")
}

pub fn url_api_user_jobs(user_id: u64) -> String {
    format!("/api/jobs/user=/{user_id}")
}

pub fn url_api_user_jobs_with_status(user_id: u64, status: &str) -> String {
    format!("/api/jobs/user=/{user_id}/status=/{status}")
}

pub fn url_api_job(job_id: u64) -> String {
    format!("/api/job/{job_id}")
}

pub fn url_api_logs(stream: &str, offset: Option<u64>) -> String {
    match offset {
        Some(offset) => format!("/api/logs/{stream}?{offset}"),
        None => format!("/api/logs/{stream}"),
    }
}

pub fn url_main_page() -> String {
    "/".to_string()
}

pub fn url_problems() -> String {
    "/problems".to_string()
}

pub fn url_problem(problem_id: u64) -> String {
    format!("/p/{problem_id}")
}

pub fn url_users() -> String {
    "/users".to_string()
}

pub fn url_user(user_id: u64) -> String {
    format!("/u/{user_id}")
}

pub fn url_submissions() -> String {
    "/submissions".to_string()
}

pub fn url_submission(submission_id: u64) -> String {
    format!("/s/{submission_id}")
}

pub fn url_jobs() -> String {
    "/jobs".to_string()
}

pub fn url_job(job_id: u64) -> String {
    format!("/jobs/{job_id}")
}

pub fn url_logs() -> String {
    "/logs".to_string()
}

/// `problem_final` -> `Problem final`
pub fn snake_case_to_user_string(value: &str) -> String {
    let mut out = value.replace('_', " ");
    if let Some(first) = out.get(0..1) {
        let upper = first.to_uppercase();
        out.replace_range(0..1, &upper);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_page_parses_with_partial_items() {
        let page: ListPage<Problem> =
            serde_json::from_str(r#"{"list":[{"id":5},{"id":3,"name":"Sum"}],"may_be_more":true}"#)
                .unwrap();
        assert_eq!(page.list.len(), 2);
        assert_eq!(page.list[1].name, "Sum");
        assert!(page.may_be_more);
    }

    #[test]
    fn missing_capability_flags_are_permissive() {
        let caps: Capabilities = serde_json::from_str(
            r#"{"users":{"ui_view":false,"list_all":{"query_with_type_admin":false}}}"#,
        )
        .unwrap();
        assert!(!caps.users.ui_view);
        assert!(!caps.users.list_all.allows("query_with_type_admin"));
        assert!(caps.users.list_all.allows("query_all"));
        assert!(caps.problems.ui_view);
    }

    #[test]
    fn snake_case_is_humanized() {
        assert_eq!(snake_case_to_user_string("problem_final"), "Problem final");
        assert_eq!(snake_case_to_user_string(""), "");
    }
}
