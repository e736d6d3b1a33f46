//! Tab menus whose selection lives in the location.
//!
//! Each menu reads one `#`-token of the location when it is built, so nested
//! menus restore their selection after back, forward or a reload. Selecting a
//! tab rewrites the entry of the view holding the menu in place; it never
//! adds one.

use std::rc::Rc;

use crate::core::{
    document::{NodeId, NodeKind, TabMenuNode},
    runtime::Kit,
};
use crate::protocol::Location;

/// Fills the content container of a tab.
pub type TabBuilder = Rc<dyn Fn(&mut Kit, NodeId)>;

/// Told the name of the tab that just became active.
pub type TabChanged = Rc<dyn Fn(&mut Kit, &str)>;

pub(crate) struct TabMenuHandlers {
    builders: Vec<TabBuilder>,
    on_change: Option<TabChanged>,
}

#[derive(Default)]
pub struct TabMenuBuilder {
    tabs: Vec<(String, TabBuilder)>,
    on_change: Option<TabChanged>,
    default_tab: usize,
}

impl TabMenuBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_tab(mut self, name: &str, builder: impl Fn(&mut Kit, NodeId) + 'static) -> Self {
        self.tabs.push((name.to_string(), Rc::new(builder)));
        self
    }

    /// Tab shown when the location does not name one. The first by default.
    pub fn default_tab(mut self, index: usize) -> Self {
        self.default_tab = index;
        self
    }

    pub fn on_active_tab_changed(mut self, listener: impl Fn(&mut Kit, &str) + 'static) -> Self {
        self.on_change = Some(Rc::new(listener));
        self
    }

    /// Append the menu and its content container to `parent`, then activate
    /// the tab named by the location, or the first one.
    pub fn build_and_append_to(self, kit: &mut Kit, parent: NodeId) -> NodeId {
        let owner = kit.doc.history_panel_of(parent);
        let (token, depth) = match owner {
            Some(panel) => kit.nav.next_state_token(&mut kit.doc, panel),
            None => (None, 0),
        };
        let names: Vec<String> = self.tabs.iter().map(|(name, _)| name.clone()).collect();

        let menu = kit.append(
            parent,
            NodeKind::TabMenu(TabMenuNode {
                tabs: names.clone(),
                active: None,
                depth,
                content: None,
            }),
        );
        let content = kit.container(parent);
        if let Some(node) = kit.doc.tab_menu_mut(menu) {
            node.content = Some(content);
        }
        kit.tab_menus.insert(
            menu,
            TabMenuHandlers {
                builders: self.tabs.into_iter().map(|(_, builder)| builder).collect(),
                on_change: self.on_change,
            },
        );

        if names.is_empty() {
            return menu;
        }
        let index = match token.as_deref().and_then(|token| names.iter().position(|n| n == token)) {
            Some(index) => index,
            None => {
                let index = self.default_tab.min(names.len() - 1);
                if let Some(token) = token {
                    log::debug!("no tab named {token:?}, showing {:?}", names[index]);
                }
                if let Some(panel) = owner {
                    kit.nav.select_tab_state(&mut kit.doc, panel, depth, &names[index]);
                }
                index
            }
        };
        kit.activate_tab(menu, index);
        menu
    }
}

impl Kit {
    /// Switch `menu` to tab `index`, replacing whatever the old tab built.
    pub fn select_tab(&mut self, menu: NodeId, index: usize) {
        let Some(node) = self.doc.tab_menu(menu) else {
            return;
        };
        let (Some(name), Some(content)) = (node.tabs.get(index).cloned(), node.content) else {
            return;
        };
        let depth = node.depth;
        self.clear_region(content);
        if let Some(panel) = self.doc.history_panel_of(menu) {
            self.nav.select_tab_state(&mut self.doc, panel, depth, &name);
        }
        self.activate_tab(menu, index);
    }

    fn activate_tab(&mut self, menu: NodeId, index: usize) {
        let Some(node) = self.doc.tab_menu_mut(menu) else {
            return;
        };
        node.active = Some(index);
        let (Some(name), Some(content)) = (node.tabs.get(index).cloned(), node.content) else {
            return;
        };
        let Some(handlers) = self.tab_menus.get(&menu) else {
            return;
        };
        let builder = handlers.builders.get(index).cloned();
        let on_change = handlers.on_change.clone();

        if let Some(listener) = on_change {
            listener(self, &name);
        }
        if let Some(builder) = builder {
            builder(self, content);
        }
    }

    /// Where choosing tab `index` of `menu` would lead.
    pub fn tab_location(&self, menu: NodeId, index: usize) -> Option<Location> {
        let node = self.doc.tab_menu(menu)?;
        let name = node.tabs.get(index)?;
        let panel = self.doc.history_panel_of(menu)?;
        self.nav.tab_location(&self.doc, panel, node.depth, name)
    }

    /// Tab menus of `panel`, outermost first.
    pub fn tab_menus_in(&self, panel: NodeId) -> Vec<NodeId> {
        self.doc
            .panel_content(panel)
            .into_iter()
            .filter(|id| self.doc.tab_menu(*id).is_some() && self.doc.is_visible(*id))
            .collect()
    }
}
