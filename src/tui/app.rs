use std::time::Instant;

use crate::core::{document::PanelKind, request::StatusState, Kit, NodeId};
use crate::pages::help::show_help;
use crate::protocol::Location;
use crate::tui::input::Action;

/// Terminal state around the kit: which row is selected and which tab menu
/// has focus in the top panel.
pub struct App {
    pub kit: Kit,
    pub selected: usize,
    pub focused_menu: Option<usize>,
    panel: Option<NodeId>,
}

impl App {
    pub fn new(kit: Kit) -> Self {
        let mut app = Self {
            kit,
            selected: 0,
            focused_menu: None,
            panel: None,
        };
        app.sync_panel();
        app
    }

    pub fn top_panel(&self) -> Option<NodeId> {
        self.kit.document().top_panel()
    }

    /// Forget the selection once another panel is on top.
    fn sync_panel(&mut self) {
        let top = self.top_panel();
        if top != self.panel {
            self.panel = top;
            self.selected = 0;
            self.focused_menu = None;
        }
        let links = top.map(|panel| self.kit.document().links(panel).len()).unwrap_or(0);
        if self.selected >= links {
            self.selected = links.saturating_sub(1);
        }
        let menus = top.map(|panel| self.kit.tab_menus_in(panel).len()).unwrap_or(0);
        if self.focused_menu.is_some_and(|menu| menu >= menus) {
            self.focused_menu = None;
        }
    }

    /// Selected link of the top panel: table node, row index and target.
    pub fn selection(&self) -> Option<(NodeId, usize, Location)> {
        let panel = self.top_panel()?;
        self.kit.document().links(panel).into_iter().nth(self.selected)
    }

    pub fn focused_menu_id(&self) -> Option<NodeId> {
        let panel = self.top_panel()?;
        self.kit.tab_menus_in(panel).get(self.focused_menu?).copied()
    }

    /// Apply one action. Returns false when the client should quit.
    pub fn apply(&mut self, action: Action) -> bool {
        match action {
            Action::Quit => return false,
            Action::MoveNext => self.step(1),
            Action::MovePrev => self.step(-1),
            Action::PageDown => self.scroll(self.page_rows()),
            Action::PageUp => self.scroll(-self.page_rows()),
            Action::Open => self.open_selected(),
            Action::Back => self.kit.back(),
            Action::Forward => self.kit.forward(),
            Action::Escape => self.kit.escape(),
            Action::FocusNextMenu => self.focus_next_menu(),
            Action::TabLeft => self.switch_tab(-1),
            Action::TabRight => self.switch_tab(1),
            Action::Retry => self.retry(),
            Action::Abort => self.abort(),
            Action::ToggleAutoRefresh => {
                if let Some(log) = self.visible_log() {
                    self.kit.toggle_auto_refresh(log);
                }
            }
            Action::Reload => self.kit.reload(),
            Action::Help => show_help(&mut self.kit),
            Action::None => {}
        }
        self.kit.pump();
        self.sync_panel();
        true
    }

    pub fn tick(&mut self, now: Instant) {
        self.kit.tick(now);
        if self.kit.pump() {
            self.sync_panel();
        }
    }

    pub fn resize(&mut self, rows: usize) {
        self.kit.on_resize(rows);
        self.kit.pump();
    }

    fn page_rows(&self) -> isize {
        self.kit.document().viewport_height().max(1) as isize
    }

    fn visible_log(&self) -> Option<NodeId> {
        let panel = self.top_panel()?;
        let doc = self.kit.document();
        doc.panel_content(panel)
            .into_iter()
            .find(|id| doc.log(*id).is_some() && doc.is_visible(*id))
    }

    /// Move the selection, or scroll when there is nothing to select.
    fn step(&mut self, delta: isize) {
        let Some(panel) = self.top_panel() else {
            return;
        };
        let links = self.kit.document().links(panel).len();
        if links == 0 {
            self.scroll(delta);
            return;
        }
        self.selected = self.selected.saturating_add_signed(delta).min(links - 1);
        self.reveal_selection(panel);
    }

    /// Scroll the panel so the selected row is on screen. Scrolling is what
    /// lets listers notice they are near the bottom.
    fn reveal_selection(&mut self, panel: NodeId) {
        let Some((table, row, _)) = self.selection() else {
            return;
        };
        let doc = self.kit.document();
        let (Some(bottom), Some(data)) = (doc.region_bottom(table), doc.table(table)) else {
            return;
        };
        let top = bottom - doc.height(table);
        let y = top + usize::from(!data.header.is_empty()) + row;
        let scroll_top = doc.panel(panel).map(|p| p.scroll_top).unwrap_or(0);
        let rows = doc.viewport_height().max(1);
        let delta = if y < scroll_top {
            y as isize - scroll_top as isize
        } else if y >= scroll_top + rows {
            (y + 1 - (scroll_top + rows)) as isize
        } else {
            0
        };
        self.kit.scroll_panel(panel, delta);
    }

    fn scroll(&mut self, delta: isize) {
        if let Some(log) = self.visible_log() {
            self.kit.scroll_log(log, delta);
            return;
        }
        if let Some(panel) = self.top_panel() {
            self.kit.scroll_panel(panel, delta);
        }
    }

    fn open_selected(&mut self) {
        let Some((table, _, location)) = self.selection() else {
            return;
        };
        let full_navigation = self
            .kit
            .document()
            .table(table)
            .is_some_and(|table| table.full_navigation);
        if full_navigation {
            self.kit.visit(location);
        } else {
            self.kit.open_location(&location);
        }
    }

    fn focus_next_menu(&mut self) {
        let Some(panel) = self.top_panel() else {
            return;
        };
        let menus = self.kit.tab_menus_in(panel).len();
        self.focused_menu = match self.focused_menu {
            _ if menus == 0 => None,
            None => Some(0),
            Some(index) if index + 1 < menus => Some(index + 1),
            Some(_) => None,
        };
    }

    fn switch_tab(&mut self, delta: isize) {
        let Some(menu) = self.focused_menu_id() else {
            return;
        };
        let Some(node) = self.kit.document().tab_menu(menu) else {
            return;
        };
        let Some(active) = node.active else {
            return;
        };
        let target = active.saturating_add_signed(delta);
        if target != active && target < node.tabs.len() {
            self.kit.select_tab(menu, target);
            self.selected = 0;
        }
    }

    fn statuses(&self) -> Vec<NodeId> {
        self.top_panel()
            .map(|panel| self.kit.statuses_in(panel))
            .unwrap_or_default()
    }

    fn retry(&mut self) {
        let failed = self.statuses().into_iter().find(|status| {
            self.kit
                .document()
                .status(*status)
                .is_some_and(|s| s.can_retry())
        });
        if let Some(status) = failed {
            self.kit.retry(status);
        }
    }

    fn abort(&mut self) {
        let pending = self.statuses().into_iter().find(|status| {
            self.kit
                .document()
                .status(*status)
                .is_some_and(|s| matches!(s.state, StatusState::Pending { .. }))
        });
        if let Some(status) = pending {
            self.kit.abort(status);
        }
    }

    /// Title shown above the panel.
    pub fn panel_title(&self) -> String {
        let Some(panel) = self.top_panel().and_then(|id| self.kit.document().panel(id)) else {
            return String::new();
        };
        match panel.kind {
            PanelKind::Page => panel.title.clone(),
            PanelKind::TrackedModal | PanelKind::PlainModal => format!("{} (Esc to close)", panel.title),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Bus, KitConfig, MemoryHistory, ScriptedTransport, Session};
    use crate::pages::router;

    fn app_at(raw: &str) -> (App, ScriptedTransport) {
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
        (App::new(kit), transport)
    }

    #[test]
    fn menu_entry_leaves_the_page() {
        let (mut app, transport) = app_at("/");
        app.apply(Action::MoveNext);
        assert_eq!(app.selection().unwrap().2, Location::new("/users"));
        app.apply(Action::Open);
        assert_eq!(app.kit.location().to_string(), "/users#All");
        assert_eq!(transport.last().unwrap().1.url, "/api/users");
    }

    #[test]
    fn row_opens_floating_view_and_escape_returns() {
        let (mut app, transport) = app_at("/users");
        let (id, _) = transport.last().unwrap();
        transport.respond(id, r#"{"list":[{"id":1,"username":"a"}],"may_be_more":false}"#);
        app.kit.pump();
        app.sync_panel();

        let page = app.top_panel().unwrap();
        app.apply(Action::Open);
        let floating = app.top_panel().unwrap();
        assert_ne!(floating, page);
        assert_eq!(app.kit.location().path, "/u/1");

        app.apply(Action::Escape);
        assert_eq!(app.top_panel(), Some(page));
        assert_eq!(app.kit.location().to_string(), "/users#All");
    }

    #[test]
    fn tab_focus_and_switch() {
        let (mut app, transport) = app_at("/users");
        app.apply(Action::FocusNextMenu);
        app.apply(Action::TabRight);
        assert_eq!(app.kit.location().to_string(), "/users#Admins");
        assert_eq!(transport.last().unwrap().1.url, "/api/users/type=/admin");
    }

    #[test]
    fn help_is_a_plain_modal() {
        let (mut app, _) = app_at("/");
        let page = app.top_panel();
        app.apply(Action::Help);
        assert_ne!(app.top_panel(), page);
        let location = app.kit.location();
        app.apply(Action::Escape);
        assert_eq!(app.top_panel(), page);
        assert_eq!(app.kit.location(), location);
    }
}
