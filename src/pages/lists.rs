//! Problems, users, submissions and jobs: nested tab menus over listers.
//!
//! The outer menu picks whose items to list ("All" or "My"), the inner one
//! picks a server-side filter. Tabs the capabilities rule out are left out.

use chrono::{DateTime, Local};

use crate::core::{
    document::{NodeId, Row, Table},
    lister::PageRenderer,
    Kit, TabMenuBuilder,
};
use crate::protocol::{
    api::{
        snake_case_to_user_string, url_api_jobs, url_api_jobs_with_status, url_api_problems,
        url_api_problems_with_visibility, url_api_submissions, url_api_submissions_with_type,
        url_api_user_jobs, url_api_user_jobs_with_status, url_api_user_problems,
        url_api_user_problems_with_visibility, url_api_user_submissions,
        url_api_user_submissions_with_type, url_api_users, url_api_users_with_type, url_job,
        url_jobs, url_problem, url_problems, url_submission, url_submissions, url_user,
        url_users, Job, Problem, QueryFlags, Submission, User, UserRef,
    },
    Location,
};

/// One inner tab: its name, the capability flag gating it and the filter
/// value (`None` lists everything).
pub struct ListFilter {
    pub tab: &'static str,
    pub flag: &'static str,
    pub value: Option<&'static str>,
}

const fn filter(tab: &'static str, flag: &'static str, value: Option<&'static str>) -> ListFilter {
    ListFilter { tab, flag, value }
}

pub const PROBLEM_FILTERS: &[ListFilter] = &[
    filter("All", "query_all", None),
    filter("Public", "query_with_visibility_public", Some("public")),
    filter("Contest only", "query_with_visibility_contest_only", Some("contest_only")),
    filter("Private", "query_with_visibility_private", Some("private")),
];

pub const USER_FILTERS: &[ListFilter] = &[
    filter("All", "query_all", None),
    filter("Admins", "query_with_type_admin", Some("admin")),
    filter("Teachers", "query_with_type_teacher", Some("teacher")),
    filter("Normal", "query_with_type_normal", Some("normal")),
];

pub const SUBMISSION_FILTERS: &[ListFilter] = &[
    filter("All", "query_all", None),
    filter("Final", "query_with_type_final", Some("final")),
    filter("Problem final", "query_with_type_problem_final", Some("problem_final")),
    filter("Contest final", "query_with_type_contest_problem_final", Some("contest_problem_final")),
    filter("Ignored", "query_with_type_ignored", Some("ignored")),
    filter("Problem solutions", "query_with_type_problem_solution", Some("problem_solution")),
];

pub const JOB_FILTERS: &[ListFilter] = &[
    filter("All", "query_all", None),
    filter("Pending", "query_with_status_pending", Some("pending")),
    filter("In progress", "query_with_status_in_progress", Some("in_progress")),
    filter("Done", "query_with_status_done", Some("done")),
    filter("Failed", "query_with_status_failed", Some("failed")),
    filter("Cancelled", "query_with_status_cancelled", Some("cancelled")),
];

fn can_list(filters: &[ListFilter], flags: &QueryFlags) -> bool {
    filters.iter().any(|f| flags.allows(f.flag))
}

/// Append a filter tab menu to `region`, each tab a lister of `query_url`.
pub fn append_filter_tabs<R>(
    kit: &mut Kit,
    region: NodeId,
    filters: &[ListFilter],
    flags: &QueryFlags,
    query_url: impl Fn(Option<&str>) -> String,
    renderer: R,
) -> NodeId
where
    R: PageRenderer + Clone + 'static,
{
    let mut tabs = TabMenuBuilder::new();
    for f in filters.iter().filter(|f| flags.allows(f.flag)) {
        let url = query_url(f.value);
        let renderer = renderer.clone();
        tabs = tabs.add_tab(f.tab, move |kit, content| {
            kit.add_lister(content, url.clone(), renderer.clone());
        });
    }
    tabs.build_and_append_to(kit, region)
}

pub fn format_datetime(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(time) => time
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        Err(_) => raw.to_string(),
    }
}

fn user_display(user: Option<&UserRef>) -> String {
    match user {
        None => "System".to_string(),
        Some(UserRef {
            username: Some(username),
            ..
        }) => username.clone(),
        Some(user) => format!("deleted (id: {})", user.id),
    }
}

fn full_name(user: Option<&UserRef>) -> String {
    match user {
        None => "System".to_string(),
        Some(user) => {
            let first = user.first_name.as_deref().unwrap_or("");
            let last = user.last_name.as_deref().unwrap_or("");
            format!("{first} {last}").trim().to_string()
        }
    }
}

pub fn submission_language_to_user_string(language: &str) -> String {
    match language {
        "c11" => "C11".to_string(),
        "cpp11" => "C++11".to_string(),
        "cpp14" => "C++14".to_string(),
        "cpp17" => "C++17".to_string(),
        "pascal" => "Pascal".to_string(),
        "python" => "Python".to_string(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct ProblemsRenderer {
    pub show_owner: bool,
    pub show_updated_at: bool,
}

impl PageRenderer for ProblemsRenderer {
    type Item = Problem;

    fn first_page(&mut self, table: &mut Table, items: &[Problem]) {
        if items.is_empty() {
            table.notice = Some("There are no problems to show...".to_string());
            return;
        }
        table.header = ["Id", "Visibility", "Label", "Name"].map(String::from).to_vec();
        if self.show_owner {
            table.header.push("Owner".to_string());
        }
        if self.show_updated_at {
            table.header.push("Updated at".to_string());
        }
        self.next_page(table, items);
    }

    fn next_page(&mut self, table: &mut Table, items: &[Problem]) {
        for problem in items {
            let mut cells = vec![
                problem.id.to_string(),
                snake_case_to_user_string(&problem.visibility),
                problem.label.clone(),
                problem.name.clone(),
            ];
            if self.show_owner {
                cells.push(match &problem.owner {
                    Some(owner) => owner.username.clone().unwrap_or_default(),
                    None => "(Deleted)".to_string(),
                });
            }
            if self.show_updated_at {
                cells.push(problem.updated_at.as_deref().map(format_datetime).unwrap_or_default());
            }
            table.rows.push(Row {
                cells,
                link: Some(Location::new(url_problem(problem.id))),
            });
        }
    }

    fn query_suffix_after(&self, last: &Problem) -> String {
        format!("/id</{}", last.id)
    }
}

#[derive(Debug, Clone)]
pub struct UsersRenderer;

impl PageRenderer for UsersRenderer {
    type Item = User;

    fn first_page(&mut self, table: &mut Table, items: &[User]) {
        if items.is_empty() {
            table.notice = Some("There are no users to show...".to_string());
            return;
        }
        table.header = ["Id", "Username", "First name", "Last name", "Email", "Type"]
            .map(String::from)
            .to_vec();
        self.next_page(table, items);
    }

    fn next_page(&mut self, table: &mut Table, items: &[User]) {
        table.rows.extend(items.iter().map(|user| Row {
            cells: vec![
                user.id.to_string(),
                user.username.clone(),
                user.first_name.clone(),
                user.last_name.clone(),
                user.email.clone(),
                snake_case_to_user_string(&user.user_type),
            ],
            link: Some(Location::new(url_user(user.id))),
        }));
    }

    // Users are listed in ascending id order.
    fn query_suffix_after(&self, last: &User) -> String {
        format!("/id>/{}", last.id)
    }
}

#[derive(Debug, Clone)]
pub struct SubmissionsRenderer {
    pub show_user: bool,
}

impl PageRenderer for SubmissionsRenderer {
    type Item = Submission;

    fn first_page(&mut self, table: &mut Table, items: &[Submission]) {
        if items.is_empty() {
            table.notice = Some("There are no submissions to show...".to_string());
            return;
        }
        table.header = vec!["Id".to_string(), "Lang".to_string()];
        if self.show_user {
            table.header.push("User".to_string());
        }
        table
            .header
            .extend(["Added", "Problem", "Status", "Score", "Type"].map(String::from));
        self.next_page(table, items);
    }

    fn next_page(&mut self, table: &mut Table, items: &[Submission]) {
        for submission in items {
            let mut cells = vec![
                submission.id.to_string(),
                submission_language_to_user_string(&submission.language),
            ];
            if self.show_user {
                cells.push(full_name(submission.user.as_ref()));
            }
            let status = match (&submission.full_status, &submission.initial_status) {
                (Some(full), _) => snake_case_to_user_string(full),
                (None, Some(initial)) => format!("Initial: {}", snake_case_to_user_string(initial)),
                (None, None) => String::new(),
            };
            cells.extend([
                format_datetime(&submission.created_at),
                submission
                    .problem
                    .as_ref()
                    .map(|problem| problem.name.clone())
                    .unwrap_or_default(),
                status,
                submission.score.map(|score| score.to_string()).unwrap_or_default(),
                snake_case_to_user_string(&submission.submission_type),
            ]);
            table.rows.push(Row {
                cells,
                link: Some(Location::new(url_submission(submission.id))),
            });
        }
    }

    fn query_suffix_after(&self, last: &Submission) -> String {
        format!("/id</{}", last.id)
    }
}

#[derive(Debug, Clone)]
pub struct JobsRenderer {
    pub show_creator: bool,
}

impl PageRenderer for JobsRenderer {
    type Item = Job;

    fn first_page(&mut self, table: &mut Table, items: &[Job]) {
        if items.is_empty() {
            table.notice = Some("There are no jobs to show...".to_string());
            return;
        }
        table.header = ["Id", "Type", "Priority", "Created at", "Status"]
            .map(String::from)
            .to_vec();
        if self.show_creator {
            table.header.push("Creator".to_string());
        }
        self.next_page(table, items);
    }

    fn next_page(&mut self, table: &mut Table, items: &[Job]) {
        for job in items {
            let mut cells = vec![
                job.id.to_string(),
                snake_case_to_user_string(&job.job_type),
                job.priority.to_string(),
                format_datetime(&job.created_at),
                snake_case_to_user_string(&job.status),
            ];
            if self.show_creator {
                cells.push(user_display(job.creator.as_ref()));
            }
            table.rows.push(Row {
                cells,
                link: Some(Location::new(url_job(job.id))),
            });
        }
    }

    fn query_suffix_after(&self, last: &Job) -> String {
        format!("/id</{}", last.id)
    }
}

pub fn list_problems(kit: &mut Kit) {
    let view = kit.open_view("Problems", Location::new(url_problems()));
    kit.heading(view, "Problems");

    let session = kit.session().clone();
    let staff = session.is_staff();
    let caps = session.capabilities.problems;
    let mut tabs = TabMenuBuilder::new();
    if can_list(PROBLEM_FILTERS, &caps.list_all) {
        let flags = caps.list_all.clone();
        tabs = tabs.add_tab("All problems", move |kit, content| {
            let query_url = |visibility: Option<&str>| match visibility {
                Some(visibility) => url_api_problems_with_visibility(visibility),
                None => url_api_problems(),
            };
            let renderer = ProblemsRenderer {
                show_owner: staff,
                show_updated_at: staff,
            };
            append_filter_tabs(kit, content, PROBLEM_FILTERS, &flags, query_url, renderer);
        });
    }
    if let Some(user_id) = session.user_id.filter(|_| can_list(PROBLEM_FILTERS, &caps.list_my)) {
        let flags = caps.list_my.clone();
        tabs = tabs.add_tab("My problems", move |kit, content| {
            let query_url = |visibility: Option<&str>| match visibility {
                Some(visibility) => url_api_user_problems_with_visibility(user_id, visibility),
                None => url_api_user_problems(user_id),
            };
            let renderer = ProblemsRenderer {
                show_owner: false,
                show_updated_at: staff,
            };
            append_filter_tabs(kit, content, PROBLEM_FILTERS, &flags, query_url, renderer);
        });
    }
    tabs.build_and_append_to(kit, view);
}

pub fn list_users(kit: &mut Kit) {
    let view = kit.open_view("Users", Location::new(url_users()));
    kit.heading(view, "Users");
    let flags = kit.session().capabilities.users.list_all.clone();
    let query_url = |user_type: Option<&str>| match user_type {
        Some(user_type) => url_api_users_with_type(user_type),
        None => url_api_users(),
    };
    append_filter_tabs(kit, view, USER_FILTERS, &flags, query_url, UsersRenderer);
}

pub fn list_submissions(kit: &mut Kit) {
    let view = kit.open_view("Submissions", Location::new(url_submissions()));
    kit.heading(view, "Submissions");

    let session = kit.session().clone();
    let caps = session.capabilities.submissions;
    let mut tabs = TabMenuBuilder::new();
    if can_list(SUBMISSION_FILTERS, &caps.list_all) {
        let flags = caps.list_all.clone();
        tabs = tabs.add_tab("All submissions", move |kit, content| {
            let query_url = |submission_type: Option<&str>| match submission_type {
                Some(submission_type) => url_api_submissions_with_type(submission_type),
                None => url_api_submissions(),
            };
            let renderer = SubmissionsRenderer { show_user: true };
            append_filter_tabs(kit, content, SUBMISSION_FILTERS, &flags, query_url, renderer);
        });
    }
    if let Some(user_id) = session.user_id.filter(|_| can_list(SUBMISSION_FILTERS, &caps.list_my)) {
        let flags = caps.list_my.clone();
        tabs = tabs.add_tab("My submissions", move |kit, content| {
            append_user_submissions(kit, content, user_id, &flags);
        });
    }
    tabs.build_and_append_to(kit, view);
}

/// Submissions of one user, filtered by type.
pub fn append_user_submissions(kit: &mut Kit, region: NodeId, user_id: u64, flags: &QueryFlags) {
    let query_url = |submission_type: Option<&str>| match submission_type {
        Some(submission_type) => url_api_user_submissions_with_type(user_id, submission_type),
        None => url_api_user_submissions(user_id),
    };
    let renderer = SubmissionsRenderer { show_user: false };
    append_filter_tabs(kit, region, SUBMISSION_FILTERS, flags, query_url, renderer);
}

pub fn list_jobs(kit: &mut Kit) {
    let view = kit.open_view("Jobs", Location::new(url_jobs()));
    kit.heading(view, "Jobs");

    let session = kit.session().clone();
    let caps = session.capabilities.jobs;
    let mut tabs = TabMenuBuilder::new();
    if can_list(JOB_FILTERS, &caps.list_all) {
        let flags = caps.list_all.clone();
        tabs = tabs.add_tab("All jobs", move |kit, content| {
            let query_url = |status: Option<&str>| match status {
                Some(status) => url_api_jobs_with_status(status),
                None => url_api_jobs(),
            };
            let renderer = JobsRenderer { show_creator: true };
            append_filter_tabs(kit, content, JOB_FILTERS, &flags, query_url, renderer);
        });
    }
    if let Some(user_id) = session.user_id.filter(|_| can_list(JOB_FILTERS, &caps.list_my)) {
        let flags = caps.list_my.clone();
        tabs = tabs.add_tab("My jobs", move |kit, content| {
            append_user_jobs(kit, content, user_id, &flags);
        });
    }
    tabs.build_and_append_to(kit, view);
}

/// Jobs of one user, filtered by status.
pub fn append_user_jobs(kit: &mut Kit, region: NodeId, user_id: u64, flags: &QueryFlags) {
    let query_url = |status: Option<&str>| match status {
        Some(status) => url_api_user_jobs_with_status(user_id, status),
        None => url_api_user_jobs(user_id),
    };
    let renderer = JobsRenderer {
        show_creator: false,
    };
    append_filter_tabs(kit, region, JOB_FILTERS, flags, query_url, renderer);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn problem_rows_link_to_details() {
        let mut renderer = ProblemsRenderer {
            show_owner: true,
            show_updated_at: false,
        };
        let mut table = Table::default();
        let items: Vec<Problem> = serde_json::from_str(
            r#"[{"id":7,"visibility":"contest_only","label":"A","name":"Sum","owner":null}]"#,
        )
        .unwrap();
        renderer.first_page(&mut table, &items);
        assert_eq!(table.header, vec!["Id", "Visibility", "Label", "Name", "Owner"]);
        assert_eq!(table.rows[0].cells, vec!["7", "Contest only", "A", "Sum", "(Deleted)"]);
        assert_eq!(table.rows[0].link, Some(Location::new("/p/7")));
        assert_eq!(renderer.query_suffix_after(&items[0]), "/id</7");
    }

    #[test]
    fn empty_lists_say_so() {
        let mut table = Table::default();
        JobsRenderer { show_creator: true }.first_page(&mut table, &[]);
        assert_eq!(table.notice.as_deref(), Some("There are no jobs to show..."));
        assert!(table.header.is_empty());
    }

    #[test]
    fn users_page_forward() {
        let user: User = serde_json::from_str(r#"{"id":12,"username":"ala","type":"teacher"}"#).unwrap();
        assert_eq!(UsersRenderer.query_suffix_after(&user), "/id>/12");
    }

    #[test]
    fn submission_status_falls_back_to_initial() {
        let mut table = Table::default();
        let items: Vec<Submission> = serde_json::from_str(
            r#"[{"id":3,"language":"cpp17","created_at":"x","initial_status":"ok","type":"final"}]"#,
        )
        .unwrap();
        SubmissionsRenderer { show_user: true }.first_page(&mut table, &items);
        assert_eq!(table.rows[0].cells, vec!["3", "C++17", "System", "x", "", "Initial: Ok", "", "Final"]);
    }

    #[test]
    fn job_creators() {
        let deleted = UserRef {
            id: 4,
            username: None,
            first_name: None,
            last_name: None,
        };
        assert_eq!(user_display(None), "System");
        assert_eq!(user_display(Some(&deleted)), "deleted (id: 4)");
    }

    #[test]
    fn filters_follow_capabilities() {
        let flags: QueryFlags = serde_json::from_str(
            r#"{"query_all":false,"query_with_visibility_public":false,
                "query_with_visibility_contest_only":false,"query_with_visibility_private":false}"#,
        )
        .unwrap();
        assert!(!can_list(PROBLEM_FILTERS, &flags));
        assert!(can_list(PROBLEM_FILTERS, &QueryFlags::default()));
    }
}
