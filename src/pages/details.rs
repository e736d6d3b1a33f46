//! Floating views showing one item fetched from the API.

use serde_json::Value;

use crate::core::{
    document::{NodeId, Row, Table},
    request::StatusReport,
    ApiResponse, Kit, NodeKind, TabMenuBuilder,
};
use crate::pages::lists::{append_user_jobs, append_user_submissions, format_datetime};
use crate::protocol::{
    api::{
        snake_case_to_user_string, url_api_job, url_api_problem, url_api_submission, url_api_user,
        url_job, url_problem, url_submission, url_user,
    },
    Location,
};

fn value_to_cell(key: &str, value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) if key.ends_with("_at") => format_datetime(text),
        Value::String(text) => text.clone(),
        Value::Object(object) => match (object.get("id"), object.get("username").or(object.get("name"))) {
            (Some(id), Some(Value::String(name))) => format!("{name} (id: {id})"),
            _ => value.to_string(),
        },
        other => other.to_string(),
    }
}

/// Key/value table of a JSON object's fields, sorted by key.
fn fields_table(value: &Value) -> Table {
    let rows = match value {
        Value::Object(object) => object
            .iter()
            .filter(|(key, _)| key.as_str() != "capabilities")
            .map(|(key, value)| Row {
                cells: vec![snake_case_to_user_string(key), value_to_cell(key, value)],
                link: None,
            })
            .collect(),
        other => vec![Row {
            cells: vec![other.to_string()],
            link: None,
        }],
    };
    Table {
        rows,
        ..Table::default()
    }
}

/// Render the fetched item into the region it was fetched for. An empty body
/// leaves a message instead.
fn show_fields(kit: &mut Kit, response: &ApiResponse, report: &mut StatusReport) -> Option<Value> {
    match &response.value {
        Some(value) => {
            kit.append(response.region, NodeKind::Table(fields_table(value)));
            Some(value.clone())
        }
        None => {
            report.show_error("The server sent nothing to show");
            None
        }
    }
}

fn details_view(kit: &mut Kit, title: String, location: String, api_url: String) -> NodeId {
    let view = kit.open_view(&title, Location::new(location));
    kit.heading(view, title);
    kit.get_from_api(view, api_url, |kit, response, report| {
        show_fields(kit, &response, report);
    });
    view
}

pub fn view_problem(kit: &mut Kit, problem_id: u64) {
    details_view(
        kit,
        format!("Problem {problem_id}"),
        url_problem(problem_id),
        url_api_problem(problem_id),
    );
}

pub fn view_submission(kit: &mut Kit, submission_id: u64) {
    details_view(
        kit,
        format!("Submission {submission_id}"),
        url_submission(submission_id),
        url_api_submission(submission_id),
    );
}

pub fn view_job(kit: &mut Kit, job_id: u64) {
    details_view(kit, format!("Job {job_id}"), url_job(job_id), url_api_job(job_id));
}

/// A user with their submissions and jobs below.
pub fn view_user(kit: &mut Kit, user_id: u64) {
    let title = format!("User {user_id}");
    let view = kit.open_view(&title, Location::new(url_user(user_id)));
    kit.heading(view, title);
    kit.get_from_api(view, url_api_user(user_id), move |kit, response, report| {
        if show_fields(kit, &response, report).is_none() {
            return;
        }
        let caps = kit.session().capabilities.clone();
        let submissions = caps.submissions.list_all.clone();
        let jobs = caps.jobs.list_all.clone();
        TabMenuBuilder::new()
            .add_tab("Submissions", move |kit, content| {
                append_user_submissions(kit, content, user_id, &submissions);
            })
            .add_tab("Jobs", move |kit, content| {
                append_user_jobs(kit, content, user_id, &jobs);
            })
            .build_and_append_to(kit, response.region);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{request::StatusState, Bus, KitConfig, MemoryHistory, ScriptedTransport, Session};
    use crate::pages::router;

    fn kit_at(raw: &str) -> (Kit, ScriptedTransport) {
        let bus = Bus::new();
        let transport = ScriptedTransport::new(bus.completion_tx.clone());
        let mut kit = Kit::new(
            KitConfig::default(),
            Session::default(),
            Box::new(transport.clone()),
            bus,
            Box::new(MemoryHistory::new(Location::parse(raw))),
            router(),
        );
        kit.start();
        (kit, transport)
    }

    fn tables(kit: &Kit, view: NodeId) -> Vec<Table> {
        kit.document()
            .panel_content(view)
            .into_iter()
            .filter_map(|id| kit.document().table(id).cloned())
            .collect()
    }

    #[test]
    fn problem_fields_are_listed() {
        let (mut kit, transport) = kit_at("/p/5");
        let (id, spec) = transport.last().unwrap();
        assert_eq!(spec.url, "/api/problem/5");
        transport.respond(id, r#"{"id":5,"name":"Sum","visibility":"public","capabilities":{}}"#);
        kit.pump();

        let view = kit.current_view().unwrap();
        let table = &tables(&kit, view)[0];
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[1].cells, vec!["Name", "Sum"]);
        assert!(kit.statuses_in(view).is_empty());
    }

    #[test]
    fn empty_body_leaves_a_message() {
        let (mut kit, transport) = kit_at("/jobs/9");
        let (id, _) = transport.last().unwrap();
        transport.respond(id, "");
        kit.pump();
        let view = kit.current_view().unwrap();
        let status = kit.statuses_in(view)[0];
        assert!(matches!(
            kit.document().status(status).unwrap().state,
            StatusState::Error { .. }
        ));
    }

    #[test]
    fn user_view_lists_their_submissions() {
        let (mut kit, transport) = kit_at("/u/3");
        let (id, _) = transport.last().unwrap();
        transport.respond(id, r#"{"id":3,"username":"ala"}"#);
        kit.pump();
        assert_eq!(kit.location().to_string(), "/u/3#Submissions#All");
        assert_eq!(transport.last().unwrap().1.url, "/api/submissions/user=/3");
    }

    #[test]
    fn nested_objects_are_summarized() {
        let value: Value = serde_json::json!({"owner": {"id": 2, "username": "bob"}});
        assert_eq!(fields_table(&value).rows[0].cells, vec!["Owner", "bob (id: 2)"]);
    }
}
