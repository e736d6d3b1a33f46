//! Keeps the panel stack and the native history in step.
//!
//! Every history panel carries a `view_id`; the native entry for it stores
//! the same id. Back and forward arrive as `PopState` and are resolved by
//! finding that panel again and toggling visibility around it, so nothing is
//! rebuilt. When the panel is gone (or the entry has no state) the only
//! option left is a reload.
//!
//! Each history panel also keeps the `#`-tokens of its own entry. Tab menus
//! read and write those, and only the current panel's tokens reach the
//! native entry right away; a covered panel's selection is written back when
//! its entry becomes current again.
//!
//! This is the only place that calls into [`NativeHistory`].

use crate::core::{
    document::{Document, NodeId, NodeKind, Panel, PanelKind},
    history::{HistoryEvent, NativeHistory, NavigationEntry, PersistentState},
    location_state::LocationStateCursor,
};
use crate::protocol::Location;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavOutcome {
    Handled,
    Reload,
}

pub struct NavigationController {
    history: Box<dyn NativeHistory>,
    persistent_state: PersistentState,
    view_id_prefix: String,
    next_view_num: u64,
}

/// A fresh prefix per document load, so a `view_id` left in an old history
/// entry never matches a panel created after a reload.
fn random_view_id_prefix() -> String {
    let parts: Vec<String> = (0..4).map(|_| rand::random::<u32>().to_string()).collect();
    format!("{}-", parts.join(","))
}

impl NavigationController {
    pub fn new(history: Box<dyn NativeHistory>) -> Self {
        Self {
            history,
            persistent_state: PersistentState::default(),
            view_id_prefix: random_view_id_prefix(),
            next_view_num: 0,
        }
    }

    /// Adopt the persistent state of the current entry, or create it with
    /// `make_default` when the entry has none yet.
    pub fn init(&mut self, make_default: impl FnOnce() -> PersistentState) -> PersistentState {
        self.persistent_state = match self.history.state() {
            Some(entry) => entry.persistent_state,
            None => {
                let state = make_default();
                let location = self.history.location();
                self.history.replace_state(
                    NavigationEntry {
                        persistent_state: state,
                        view_id: None,
                    },
                    location,
                );
                state
            }
        };
        self.persistent_state
    }

    /// Start over after a reload: new prefix, new counter.
    pub fn reset_session(&mut self) {
        self.view_id_prefix = random_view_id_prefix();
        self.next_view_num = 0;
    }

    pub fn persistent_state(&self) -> PersistentState {
        self.persistent_state
    }

    pub fn location(&self) -> Location {
        self.history.location()
    }

    /// Next `#`-token for a tab menu being built in `panel`, with its depth.
    pub fn next_state_token(&self, doc: &mut Document, panel: NodeId) -> (Option<String>, usize) {
        match doc.panel_mut(panel) {
            Some(p) => p.tab_state.next_token(),
            None => (None, 0),
        }
    }

    pub fn history(&self) -> &dyn NativeHistory {
        self.history.as_ref()
    }

    pub fn take_events(&mut self) -> Vec<HistoryEvent> {
        self.history.take_events()
    }

    fn next_view_id(&mut self) -> String {
        let id = format!("{}{}", self.view_id_prefix, self.next_view_num);
        self.next_view_num += 1;
        id
    }

    /// History panel of the current native entry.
    pub fn current_view(&self, doc: &Document) -> Option<NodeId> {
        self.history
            .state()
            .and_then(|entry| entry.view_id)
            .and_then(|view_id| doc.find_view(&view_id))
    }

    /// Open a view for `location`: the page view if there is none yet, a
    /// tracked modal on top of the current view otherwise.
    pub fn open_view(&mut self, doc: &mut Document, title: &str, location: Location) -> NodeId {
        // Reopening the current location keeps its tab state.
        let mut location = location;
        let current = self.history.location();
        let with_state = location.with_tokens(current.tokens.clone());
        if current == with_state {
            location = with_state;
        }

        match doc.page_view() {
            None => {
                let page = doc.append(None, panel_node(PanelKind::Page, title));
                self.replace_current(doc, page, location);
                page
            }
            Some(page) => {
                let parent = self.current_view(doc).unwrap_or(page);
                self.delete_hidden_views_forward(doc);
                let view = doc.append(Some(parent), panel_node(PanelKind::TrackedModal, title));
                self.push(doc, view, location);
                view
            }
        }
    }

    /// Plain modal over the current view. It never gets a history entry.
    pub fn open_modal(&mut self, doc: &mut Document, title: &str) -> Option<NodeId> {
        let parent = self.current_view(doc).or_else(|| doc.page_view())?;
        Some(doc.append(Some(parent), panel_node(PanelKind::PlainModal, title)))
    }

    /// Register `panel` as a new history entry. Views left forward of the
    /// current one must already be gone, see `delete_hidden_views_forward`.
    pub fn push(&mut self, doc: &mut Document, panel: NodeId, location: Location) {
        let view_id = self.next_view_id();
        bind_panel(doc, panel, &view_id, &location);
        log::debug!("push {location} as {view_id}");
        self.history.push_state(
            NavigationEntry {
                persistent_state: self.persistent_state,
                view_id: Some(view_id),
            },
            location,
        );
    }

    /// Bind `panel` to the current history entry instead of adding one.
    pub fn replace_current(&mut self, doc: &mut Document, panel: NodeId, location: Location) {
        let existing = doc.panel(panel).and_then(|p| p.view_id.clone());
        let view_id = match existing {
            Some(view_id) => view_id,
            None => self.next_view_id(),
        };
        bind_panel(doc, panel, &view_id, &location);
        self.history.replace_state(
            NavigationEntry {
                persistent_state: self.persistent_state,
                view_id: Some(view_id),
            },
            location,
        );
    }

    /// Hidden views after the current one belong to forward entries, which
    /// can no longer be reached once a new entry is pushed.
    fn delete_hidden_views_forward(&mut self, doc: &mut Document) {
        let Some(current) = self.current_view(doc) else {
            return;
        };
        let panels = doc.history_panels();
        let Some(pos) = panels.iter().position(|id| *id == current) else {
            return;
        };
        for id in &panels[pos + 1..] {
            if doc.is_attached(*id) && doc.is_hidden(*id) {
                doc.remove(*id);
            }
        }
    }

    pub fn on_pop_state(&mut self, doc: &mut Document, state: Option<NavigationEntry>) -> NavOutcome {
        let Some(view_id) = state.and_then(|entry| entry.view_id) else {
            log::debug!("popstate without view state, reloading");
            return NavOutcome::Reload;
        };
        let Some(target) = doc.find_view(&view_id) else {
            log::debug!("popstate to unknown view {view_id}, reloading");
            return NavOutcome::Reload;
        };

        doc.set_hidden(target, false);
        let panels = doc.history_panels();
        if let Some(pos) = panels.iter().position(|id| *id == target) {
            for id in &panels[pos + 1..] {
                if doc.is_hidden(*id) {
                    break;
                }
                doc.set_hidden(*id, true);
            }
            // Going forward by more than one entry leaves gaps below.
            for id in panels[..pos].iter().rev() {
                if !doc.is_hidden(*id) {
                    break;
                }
                doc.set_hidden(*id, false);
            }
        }
        self.restore_tab_state(doc, target);
        NavOutcome::Handled
    }

    /// Write back a selection made while `panel` was covered.
    fn restore_tab_state(&mut self, doc: &Document, panel: NodeId) {
        let Some(location) = doc.panel(panel).and_then(|p| p.location.clone()) else {
            return;
        };
        if location == self.history.location() {
            return;
        }
        log::debug!("restoring tab state {location}");
        let view_id = self.history.state().and_then(|entry| entry.view_id);
        self.history.replace_state(
            NavigationEntry {
                persistent_state: self.persistent_state,
                view_id,
            },
            location,
        );
    }

    pub fn back(&mut self) {
        self.history.go(-1);
    }

    pub fn forward(&mut self) {
        self.history.go(1);
    }

    /// Full navigation to another resource; the document is rebuilt.
    pub fn assign(&mut self, location: Location) {
        self.history.assign(location);
    }

    pub fn reload(&mut self) {
        self.history.reload();
    }

    /// Close a panel. The current history panel is closed by going back so
    /// the native stack stays in step; anything else is just removed.
    pub fn close(&mut self, doc: &mut Document, panel: NodeId) {
        if Some(panel) == self.current_view(doc) {
            if doc.panel(panel).is_some_and(|p| p.kind == PanelKind::Page) {
                return;
            }
            self.history.go(-1);
            return;
        }
        doc.remove(panel);
    }

    /// Escape: drop the top plain modal of the current view, otherwise leave
    /// the current view if it is floating. The page view stays.
    pub fn escape(&mut self, doc: &mut Document) {
        let Some(current) = self.current_view(doc) else {
            return;
        };
        let top_modal = doc.children(current).iter().rev().copied().find(|child| {
            doc.is_visible(*child) && doc.panel(*child).is_some_and(|p| p.kind == PanelKind::PlainModal)
        });
        if let Some(modal) = top_modal {
            doc.remove(modal);
            return;
        }
        if doc.panel(current).is_some_and(|p| p.kind == PanelKind::TrackedModal) {
            self.history.go(-1);
        }
    }

    /// Record a tab selection at `depth` of `panel`. The native entry only
    /// changes when `panel` is the current view.
    pub fn select_tab_state(&mut self, doc: &mut Document, panel: NodeId, depth: usize, tab: &str) {
        let is_current = Some(panel) == self.current_view(doc);
        let Some(p) = doc.panel_mut(panel) else {
            return;
        };
        p.tab_state.resize_and_append(depth, tab);
        let base = p.location.clone().unwrap_or_else(|| self.history.location());
        let location = p.tab_state.location_with_state(&base);
        p.location = Some(location.clone());
        if !is_current {
            log::debug!("{location} selected in a covered view");
            return;
        }
        let view_id = self.history.state().and_then(|entry| entry.view_id);
        self.history.replace_state(
            NavigationEntry {
                persistent_state: self.persistent_state,
                view_id,
            },
            location,
        );
    }

    /// Location a tab of `panel` would lead to, for display.
    pub fn tab_location(&self, doc: &Document, panel: NodeId, depth: usize, tab: &str) -> Option<Location> {
        let p = doc.panel(panel)?;
        let base = p.location.clone().unwrap_or_else(|| self.history.location());
        Some(p.tab_state.location_after_resize_and_append(&base, depth, tab))
    }
}

fn panel_node(kind: PanelKind, title: &str) -> NodeKind {
    NodeKind::Panel(Panel::new(kind, title))
}

fn bind_panel(doc: &mut Document, panel: NodeId, view_id: &str, location: &Location) {
    if let Some(p) = doc.panel_mut(panel) {
        p.view_id = Some(view_id.to_string());
        p.location = Some(location.clone());
        p.tab_state = LocationStateCursor::from_location(location);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::history::MemoryHistory;

    fn setup(location: &str) -> (NavigationController, Document) {
        let mut nav = NavigationController::new(Box::new(MemoryHistory::new(Location::parse(location))));
        nav.init(PersistentState::default);
        (nav, Document::new(20))
    }

    fn pump(nav: &mut NavigationController, doc: &mut Document) -> Vec<NavOutcome> {
        let mut out = Vec::new();
        for event in nav.take_events() {
            out.push(match event {
                HistoryEvent::PopState(state) => nav.on_pop_state(doc, state),
                HistoryEvent::Reload => NavOutcome::Reload,
            });
        }
        out
    }

    #[test]
    fn init_keeps_existing_persistent_state() {
        let mut history = MemoryHistory::new(Location::new("/"));
        history.replace_state(
            NavigationEntry {
                persistent_state: PersistentState { server_time_offset_ms: 42 },
                view_id: None,
            },
            Location::new("/"),
        );
        let mut nav = NavigationController::new(Box::new(history));
        let state = nav.init(|| PersistentState { server_time_offset_ms: 7 });
        assert_eq!(state.server_time_offset_ms, 42);
    }

    #[test]
    fn view_ids_share_prefix_and_count_up() {
        let (mut nav, mut doc) = setup("/");
        let page = nav.open_view(&mut doc, "Main", Location::new("/"));
        let a = nav.open_view(&mut doc, "A", Location::new("/p/1"));
        let page_id = doc.panel(page).unwrap().view_id.clone().unwrap();
        let a_id = doc.panel(a).unwrap().view_id.clone().unwrap();
        assert!(page_id.ends_with("-0"));
        assert!(a_id.ends_with("-1"));
        assert_eq!(page_id.trim_end_matches('0'), a_id.trim_end_matches('1'));
        assert_eq!(page_id.split('-').next().unwrap().split(',').count(), 4);
    }

    #[test]
    fn back_and_forward_toggle_visibility() {
        let (mut nav, mut doc) = setup("/");
        let page = nav.open_view(&mut doc, "Main", Location::new("/"));
        let a = nav.open_view(&mut doc, "A", Location::new("/p/1"));
        let b = nav.open_view(&mut doc, "B", Location::new("/u/2"));
        assert_eq!(doc.parent(b), Some(a));

        nav.back();
        assert_eq!(pump(&mut nav, &mut doc), vec![NavOutcome::Handled]);
        assert!(!doc.is_visible(b));
        assert!(doc.is_visible(a) && doc.is_visible(page));

        nav.back();
        pump(&mut nav, &mut doc);
        assert!(!doc.is_visible(a));
        assert!(doc.is_hidden(b));
        assert_eq!(nav.current_view(&doc), Some(page));

        // forward by two shows both again
        nav.forward();
        nav.forward();
        pump(&mut nav, &mut doc);
        assert!(doc.is_visible(b));
        assert!(doc.is_visible(a));
    }

    #[test]
    fn push_after_back_deletes_forward_views() {
        let (mut nav, mut doc) = setup("/");
        nav.open_view(&mut doc, "Main", Location::new("/"));
        let a = nav.open_view(&mut doc, "A", Location::new("/p/1"));
        nav.back();
        pump(&mut nav, &mut doc);
        let c = nav.open_view(&mut doc, "C", Location::new("/p/3"));
        assert!(!doc.is_attached(a));
        assert!(doc.is_visible(c));
    }

    #[test]
    fn stateless_or_unknown_entry_reloads() {
        let (mut nav, mut doc) = setup("/");
        assert_eq!(nav.on_pop_state(&mut doc, None), NavOutcome::Reload);
        let unknown = NavigationEntry {
            persistent_state: PersistentState::default(),
            view_id: Some("nope-3".into()),
        };
        assert_eq!(nav.on_pop_state(&mut doc, Some(unknown)), NavOutcome::Reload);
    }

    #[test]
    fn escape_closes_plain_modal_then_view_but_never_page() {
        let (mut nav, mut doc) = setup("/");
        let page = nav.open_view(&mut doc, "Main", Location::new("/"));
        let view = nav.open_view(&mut doc, "A", Location::new("/p/1"));
        let modal = nav.open_modal(&mut doc, "Help").unwrap();

        nav.escape(&mut doc);
        assert!(!doc.is_attached(modal));
        assert!(nav.take_events().is_empty());

        nav.escape(&mut doc);
        pump(&mut nav, &mut doc);
        assert!(!doc.is_visible(view));

        nav.escape(&mut doc);
        assert!(nav.take_events().is_empty());
        assert!(doc.is_visible(page));
    }

    #[test]
    fn close_non_current_panel_removes_it() {
        let (mut nav, mut doc) = setup("/");
        nav.open_view(&mut doc, "Main", Location::new("/"));
        let modal = nav.open_modal(&mut doc, "Info").unwrap();
        nav.close(&mut doc, modal);
        assert!(!doc.is_attached(modal));
        assert!(nav.take_events().is_empty());
    }

    #[test]
    fn tab_state_is_written_to_current_entry() {
        let (mut nav, mut doc) = setup("/jobs");
        let page = nav.open_view(&mut doc, "Jobs", Location::new("/jobs"));
        nav.select_tab_state(&mut doc, page, 0, "My jobs");
        nav.select_tab_state(&mut doc, page, 1, "Done");
        assert_eq!(nav.location().to_string(), "/jobs#My%20jobs#Done");
        nav.select_tab_state(&mut doc, page, 0, "All jobs");
        assert_eq!(nav.location().to_string(), "/jobs#All%20jobs");
        assert!(nav.history().state().unwrap().view_id.is_some());
        assert_eq!(
            nav.tab_location(&doc, page, 0, "My jobs").unwrap().to_string(),
            "/jobs#My%20jobs"
        );
    }

    #[test]
    fn reopening_current_location_keeps_tokens() {
        let (mut nav, mut doc) = setup("/problems#All%20problems#Public");
        let page = nav.open_view(&mut doc, "Problems", Location::new("/problems"));
        assert_eq!(nav.location().to_string(), "/problems#All%20problems#Public");
        assert_eq!(nav.next_state_token(&mut doc, page), (Some("All problems".into()), 0));
    }

    #[test]
    fn opened_view_is_registered_and_current() {
        let (mut nav, mut doc) = setup("/");
        let page = nav.open_view(&mut doc, "Main", Location::new("/"));
        let view = nav.open_view(&mut doc, "User 3", Location::new("/u/3"));
        assert!(doc.is_attached(view));
        assert_eq!(doc.history_panels(), vec![page, view]);
        assert_eq!(nav.current_view(&doc), Some(view));
        assert_eq!(nav.location().to_string(), "/u/3");
    }

    #[test]
    fn covered_view_keeps_its_selection_until_it_is_current() {
        let (mut nav, mut doc) = setup("/");
        let page = nav.open_view(&mut doc, "Main", Location::new("/"));
        let view = nav.open_view(&mut doc, "User 3", Location::new("/u/3"));
        nav.back();
        pump(&mut nav, &mut doc);
        assert_eq!(nav.current_view(&doc), Some(page));

        assert_eq!(nav.next_state_token(&mut doc, view), (None, 0));
        nav.select_tab_state(&mut doc, view, 0, "Submissions");
        assert_eq!(nav.location().to_string(), "/");

        nav.forward();
        pump(&mut nav, &mut doc);
        assert_eq!(nav.current_view(&doc), Some(view));
        assert_eq!(nav.location().to_string(), "/u/3#Submissions");
    }
}
