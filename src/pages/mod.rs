//! The pages the terminal client shows, and the router picking one for a
//! location.

pub mod details;
pub mod help;
pub mod lists;
pub mod logs;

use std::rc::Rc;

use chrono::SecondsFormat;

use crate::core::{
    document::{Row, Table},
    runtime::Router,
    Kit, NodeKind,
};
use crate::protocol::{
    api::{url_jobs, url_logs, url_main_page, url_problems, url_submissions, url_users},
    Location,
};

pub fn router() -> Router {
    Rc::new(route)
}

/// Build the page for `location`. With a page view already shown, the result
/// opens on top of it.
pub fn route(kit: &mut Kit, location: &Location) {
    let segments = location.segments();
    let id = segments.get(1).and_then(|raw| raw.parse::<u64>().ok());
    match (segments.as_slice(), id) {
        ([], _) => main_menu(kit),
        (["problems"], _) => lists::list_problems(kit),
        (["users"], _) => lists::list_users(kit),
        (["submissions"], _) => lists::list_submissions(kit),
        (["jobs"], _) => lists::list_jobs(kit),
        (["logs"], _) => logs::view_logs(kit),
        (["p", _], Some(id)) => details::view_problem(kit, id),
        (["u", _], Some(id)) => details::view_user(kit, id),
        (["s", _], Some(id)) => details::view_submission(kit, id),
        (["jobs", _], Some(id)) => details::view_job(kit, id),
        _ => not_found(kit, location),
    }
}

fn main_menu(kit: &mut Kit) {
    let view = kit.open_view("simkit", Location::new(url_main_page()));
    kit.heading(view, "Main menu");

    let caps = kit.session().capabilities.clone();
    let entries = [
        ("Problems", url_problems(), caps.problems.ui_view),
        ("Users", url_users(), caps.users.ui_view),
        ("Submissions", url_submissions(), caps.submissions.ui_view),
        ("Jobs", url_jobs(), caps.jobs.ui_view),
        ("Logs", url_logs(), caps.logs.ui_view),
    ];
    let rows = entries
        .into_iter()
        .filter(|(_, _, visible)| *visible)
        .map(|(name, url, _)| Row {
            cells: vec![name.to_string()],
            link: Some(Location::new(url)),
        })
        .collect();
    kit.append(
        view,
        NodeKind::Table(Table {
            rows,
            full_navigation: true,
            ..Table::default()
        }),
    );

    let server_time = kit.clock().now().to_rfc3339_opts(SecondsFormat::Secs, true);
    kit.paragraph(view, format!("Server time: {server_time}"));
    let signed_in = match (kit.session().user_id, kit.session().user_type.as_deref()) {
        (Some(id), Some(user_type)) => format!("Signed in as user {id} ({user_type})"),
        (Some(id), None) => format!("Signed in as user {id}"),
        (None, _) => "Not signed in".to_string(),
    };
    kit.paragraph(view, signed_in);
    kit.paragraph(view, "Press ? for help.");
}

fn not_found(kit: &mut Kit, location: &Location) {
    log::warn!("no page for {location}");
    let view = kit.open_view("Not found", location.clone());
    kit.heading(view, "Page not found");
    kit.paragraph(view, format!("Nothing lives at {}.", location.path));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Bus, KitConfig, MemoryHistory, ScriptedTransport, Session};

    fn kit_at(path: &str) -> (Kit, ScriptedTransport) {
        let bus = Bus::new();
        let transport = ScriptedTransport::new(bus.completion_tx.clone());
        let mut kit = Kit::new(
            KitConfig::default(),
            Session::default(),
            Box::new(transport.clone()),
            bus,
            Box::new(MemoryHistory::new(Location::parse(path))),
            router(),
        );
        kit.start();
        (kit, transport)
    }

    #[test]
    fn main_menu_links_leave_the_page() {
        let (kit, transport) = kit_at("/");
        let view = kit.current_view().unwrap();
        let links = kit.document().links(view);
        assert_eq!(links.len(), 5);
        assert_eq!(links[0].2, Location::new("/problems"));
        assert!(kit.document().table(links[0].0).unwrap().full_navigation);
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn unknown_path_gets_a_page() {
        let (kit, _) = kit_at("/nowhere");
        let view = kit.current_view().unwrap();
        assert_eq!(kit.document().panel(view).unwrap().title, "Not found");
    }

    #[test]
    fn hidden_resources_are_not_in_the_menu() {
        let bus = Bus::new();
        let transport = ScriptedTransport::new(bus.completion_tx.clone());
        let mut session = Session::default();
        session.capabilities.logs.ui_view = false;
        let mut kit = Kit::new(
            KitConfig::default(),
            session,
            Box::new(transport),
            bus,
            Box::new(MemoryHistory::new(Location::new("/"))),
            router(),
        );
        kit.start();
        let view = kit.current_view().unwrap();
        assert_eq!(kit.document().links(view).len(), 4);
    }
}
