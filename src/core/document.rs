//! The node tree everything is rendered from.
//!
//! Nodes live in an arena indexed by [`NodeId`]. Ids are never reused, so a
//! stale id held by a lister or a log stream simply stops resolving once its
//! node has been removed; that is how components notice they were detached.
//!
//! Panels are the scrollable surfaces: the page view at the root, tracked
//! modals (floating views with a history entry) and plain modals. Panels other
//! than the page view are nested under the history panel that was current
//! when they were opened, so preorder over history panels is the order of
//! the history stack.

use crate::core::{colorize::Markup, location_state::LocationStateCursor, request::StatusIndicator};
use crate::protocol::Location;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelKind {
    /// The full-page view, root of the tree.
    Page,
    /// Floating view with its own history entry.
    TrackedModal,
    /// Ephemeral modal, closed without touching history.
    PlainModal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Panel {
    pub kind: PanelKind,
    pub title: String,
    /// Set for history panels once they are registered.
    pub view_id: Option<String>,
    pub scroll_top: usize,
    /// Location of the panel's history entry, tab state included.
    pub location: Option<Location>,
    /// Tokens its tab menus read and write.
    pub tab_state: LocationStateCursor,
}

impl Panel {
    pub fn new(kind: PanelKind, title: &str) -> Self {
        Self {
            kind,
            title: title.to_string(),
            view_id: None,
            scroll_top: 0,
            location: None,
            tab_state: LocationStateCursor::default(),
        }
    }

    pub fn is_history_panel(&self) -> bool {
        self.kind != PanelKind::PlainModal
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Row {
    pub cells: Vec<String>,
    pub link: Option<Location>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Row>,
    /// Shown below the rows, e.g. "There are no problems to show...".
    pub notice: Option<String>,
    /// Row links leave the current page instead of opening on top of it.
    pub full_navigation: bool,
}

impl Table {
    pub fn lines(&self) -> usize {
        usize::from(!self.header.is_empty()) + self.rows.len() + usize::from(self.notice.is_some())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabMenuNode {
    pub tabs: Vec<String>,
    pub active: Option<usize>,
    /// Index in the location state this menu reads and writes.
    pub depth: usize,
    /// Where the active tab's builder puts its content.
    pub content: Option<NodeId>,
}

/// Log output with its own scroll position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogView {
    pub title: String,
    pub markup: Vec<Markup>,
    pub scroll_top: usize,
    pub viewport_height: usize,
    pub auto_refresh: bool,
}

impl LogView {
    pub fn content_lines(&self) -> usize {
        let text: usize = self
            .markup
            .iter()
            .map(|token| match token {
                Markup::Text(text) => text.matches('\n').count(),
                _ => 0,
            })
            .sum();
        // A trailing partial line still takes a row.
        let ends_with_newline = self
            .markup
            .iter()
            .rev()
            .find_map(|token| match token {
                Markup::Text(text) if !text.is_empty() => Some(text.ends_with('\n')),
                _ => None,
            });
        match ends_with_newline {
            None => 0,
            Some(true) => text,
            Some(false) => text + 1,
        }
    }

    pub fn is_scrolled_to_bottom(&self) -> bool {
        self.scroll_top + self.viewport_height >= self.content_lines()
    }

    pub fn max_scroll(&self) -> usize {
        self.content_lines().saturating_sub(self.viewport_height)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Panel(Panel),
    Heading(String),
    Paragraph(String),
    Container,
    TabMenu(TabMenuNode),
    Table(Table),
    Log(LogView),
    Status(StatusIndicator),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub kind: NodeKind,
    pub hidden: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn panel(&self) -> Option<&Panel> {
        match &self.kind {
            NodeKind::Panel(panel) => Some(panel),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Document {
    nodes: Vec<Option<Node>>,
    roots: Vec<NodeId>,
    /// Rows available to a panel's content.
    viewport_height: usize,
}

impl Document {
    pub fn new(viewport_height: usize) -> Self {
        Self {
            nodes: Vec::new(),
            roots: Vec::new(),
            viewport_height,
        }
    }

    pub fn viewport_height(&self) -> usize {
        self.viewport_height
    }

    pub fn set_viewport_height(&mut self, rows: usize) {
        self.viewport_height = rows;
    }

    /// Drop every node. Ids handed out before stay dead.
    pub fn clear(&mut self) {
        for slot in &mut self.nodes {
            *slot = None;
        }
        self.roots.clear();
    }

    pub fn append(&mut self, parent: Option<NodeId>, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(Node {
            kind,
            hidden: false,
            parent,
            children: Vec::new(),
        }));
        if let Some(parent) = parent.and_then(|parent| self.node_mut(parent)) {
            parent.children.push(id);
        } else {
            self.roots.push(id);
        }
        id
    }

    /// Remove `id` and its subtree. Removing a dead id is a no-op.
    pub fn remove(&mut self, id: NodeId) {
        let Some(parent) = self.node(id).map(|node| node.parent) else {
            return;
        };
        match parent {
            Some(parent) => {
                if let Some(parent) = self.node_mut(parent) {
                    parent.children.retain(|child| *child != id);
                }
            }
            None => self.roots.retain(|root| *root != id),
        }
        self.drop_subtree(id);
    }

    fn drop_subtree(&mut self, id: NodeId) {
        let children = match self.nodes.get_mut(id.0).and_then(Option::take) {
            Some(node) => node.children,
            None => return,
        };
        for child in children {
            self.drop_subtree(child);
        }
    }

    pub fn clear_children(&mut self, id: NodeId) {
        let children = match self.node_mut(id) {
            Some(node) => std::mem::take(&mut node.children),
            None => return,
        };
        for child in children {
            self.drop_subtree(child);
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Whether the node is still part of the document.
    pub fn is_attached(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|node| node.children.as_slice()).unwrap_or(&[])
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|node| node.parent)
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn set_hidden(&mut self, id: NodeId, hidden: bool) {
        if let Some(node) = self.node_mut(id) {
            node.hidden = hidden;
        }
    }

    pub fn is_hidden(&self, id: NodeId) -> bool {
        self.node(id).map_or(true, |node| node.hidden)
    }

    /// Attached, not hidden, and no hidden ancestor.
    pub fn is_visible(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(id) = current {
            match self.node(id) {
                Some(node) if !node.hidden => current = node.parent,
                _ => return false,
            }
        }
        true
    }

    pub fn preorder(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        for root in &self.roots {
            self.collect_preorder(*root, &mut out);
        }
        out
    }

    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_preorder(id, &mut out);
        out
    }

    fn collect_preorder(&self, id: NodeId, out: &mut Vec<NodeId>) {
        if let Some(node) = self.node(id) {
            out.push(id);
            for child in &node.children {
                self.collect_preorder(*child, out);
            }
        }
    }

    pub fn panel(&self, id: NodeId) -> Option<&Panel> {
        self.node(id).and_then(Node::panel)
    }

    pub fn panel_mut(&mut self, id: NodeId) -> Option<&mut Panel> {
        match self.node_mut(id).map(|node| &mut node.kind) {
            Some(NodeKind::Panel(panel)) => Some(panel),
            _ => None,
        }
    }

    pub fn table_mut(&mut self, id: NodeId) -> Option<&mut Table> {
        match self.node_mut(id).map(|node| &mut node.kind) {
            Some(NodeKind::Table(table)) => Some(table),
            _ => None,
        }
    }

    pub fn table(&self, id: NodeId) -> Option<&Table> {
        match self.node(id).map(|node| &node.kind) {
            Some(NodeKind::Table(table)) => Some(table),
            _ => None,
        }
    }

    pub fn log_mut(&mut self, id: NodeId) -> Option<&mut LogView> {
        match self.node_mut(id).map(|node| &mut node.kind) {
            Some(NodeKind::Log(log)) => Some(log),
            _ => None,
        }
    }

    pub fn log(&self, id: NodeId) -> Option<&LogView> {
        match self.node(id).map(|node| &node.kind) {
            Some(NodeKind::Log(log)) => Some(log),
            _ => None,
        }
    }

    pub fn tab_menu(&self, id: NodeId) -> Option<&TabMenuNode> {
        match self.node(id).map(|node| &node.kind) {
            Some(NodeKind::TabMenu(menu)) => Some(menu),
            _ => None,
        }
    }

    pub fn tab_menu_mut(&mut self, id: NodeId) -> Option<&mut TabMenuNode> {
        match self.node_mut(id).map(|node| &mut node.kind) {
            Some(NodeKind::TabMenu(menu)) => Some(menu),
            _ => None,
        }
    }

    pub fn status(&self, id: NodeId) -> Option<&StatusIndicator> {
        match self.node(id).map(|node| &node.kind) {
            Some(NodeKind::Status(status)) => Some(status),
            _ => None,
        }
    }

    pub fn status_mut(&mut self, id: NodeId) -> Option<&mut StatusIndicator> {
        match self.node_mut(id).map(|node| &mut node.kind) {
            Some(NodeKind::Status(status)) => Some(status),
            _ => None,
        }
    }

    /// Panels with a history entry, in history stack order.
    pub fn history_panels(&self) -> Vec<NodeId> {
        self.preorder()
            .into_iter()
            .filter(|id| self.panel(*id).is_some_and(Panel::is_history_panel))
            .collect()
    }

    pub fn find_view(&self, view_id: &str) -> Option<NodeId> {
        self.preorder()
            .into_iter()
            .find(|id| self.panel(*id).and_then(|p| p.view_id.as_deref()) == Some(view_id))
    }

    pub fn page_view(&self) -> Option<NodeId> {
        self.roots
            .iter()
            .copied()
            .find(|id| self.panel(*id).is_some_and(|p| p.kind == PanelKind::Page))
    }

    /// Nearest panel containing `id`, `id` itself included.
    pub fn panel_of(&self, id: NodeId) -> Option<NodeId> {
        let mut current = Some(id);
        while let Some(id) = current {
            let node = self.node(id)?;
            if node.panel().is_some() {
                return Some(id);
            }
            current = node.parent;
        }
        None
    }

    /// Nearest panel with a history entry containing `id`.
    pub fn history_panel_of(&self, id: NodeId) -> Option<NodeId> {
        let mut current = Some(id);
        while let Some(id) = current {
            let node = self.node(id)?;
            if node.panel().is_some_and(Panel::is_history_panel) {
                return Some(id);
            }
            current = node.parent;
        }
        None
    }

    /// Topmost visible panel, the one receiving input.
    pub fn top_panel(&self) -> Option<NodeId> {
        self.preorder()
            .into_iter()
            .filter(|id| self.panel(*id).is_some() && self.is_visible(*id))
            .last()
    }

    /// Rows taken by a node when laid out inside its panel. Nested panels
    /// float above their parent and take no rows.
    pub fn height(&self, id: NodeId) -> usize {
        let Some(node) = self.node(id) else {
            return 0;
        };
        if node.hidden {
            return 0;
        }
        let own = match &node.kind {
            NodeKind::Panel(_) | NodeKind::Container => 0,
            NodeKind::Heading(_) => 1,
            NodeKind::Paragraph(text) => text.lines().count().max(1),
            NodeKind::TabMenu(_) => 1,
            NodeKind::Table(table) => table.lines(),
            NodeKind::Log(log) => log.viewport_height,
            NodeKind::Status(status) => status.lines(),
        };
        own + self.children_height(node)
    }

    fn children_height(&self, node: &Node) -> usize {
        node.children
            .iter()
            .filter(|child| self.panel(**child).is_none())
            .map(|child| self.height(*child))
            .sum()
    }

    /// Row just below `region`, measured from the top of its panel.
    pub fn region_bottom(&self, region: NodeId) -> Option<usize> {
        let panel = self.panel_of(region)?;
        let mut top = 0;
        if !self.rows_before(panel, region, &mut top) {
            return None;
        }
        Some(top + self.height(region))
    }

    /// Adds the rows laid out before `target` inside `id` to `acc`; returns
    /// whether `target` was found.
    fn rows_before(&self, id: NodeId, target: NodeId, acc: &mut usize) -> bool {
        if id == target {
            return true;
        }
        let Some(node) = self.node(id) else {
            return false;
        };
        if node.hidden {
            return false;
        }
        *acc += match &node.kind {
            NodeKind::Heading(_) | NodeKind::TabMenu(_) => 1,
            NodeKind::Paragraph(text) => text.lines().count().max(1),
            NodeKind::Table(table) => table.lines(),
            NodeKind::Log(log) => log.viewport_height,
            NodeKind::Status(status) => status.lines(),
            NodeKind::Panel(_) | NodeKind::Container => 0,
        };
        for child in &node.children {
            if self.panel(*child).is_some() {
                continue;
            }
            let before = *acc;
            if self.rows_before(*child, target, acc) {
                return true;
            }
            *acc = before + self.height(*child);
        }
        false
    }

    /// Whether the bottom edge of `region` is within `margin` rows below the
    /// bottom of its panel's viewport. Hidden regions never are.
    pub fn is_near_bottom(&self, region: NodeId, margin: usize) -> bool {
        if !self.is_visible(region) {
            return false;
        }
        let Some(panel) = self.panel_of(region) else {
            return false;
        };
        let Some(bottom) = self.region_bottom(region) else {
            return false;
        };
        let scroll_top = self.panel(panel).map(|p| p.scroll_top).unwrap_or(0);
        let viewport_bottom = scroll_top + self.viewport_height;
        bottom <= viewport_bottom + margin
    }

    /// Total rows of a panel's content.
    pub fn panel_height(&self, panel: NodeId) -> usize {
        self.height(panel)
    }

    /// Nodes laid out inside `panel` in preorder, without nested panels and
    /// what they contain.
    pub fn panel_content(&self, panel: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        for child in self.children(panel) {
            self.collect_content(*child, &mut out);
        }
        out
    }

    fn collect_content(&self, id: NodeId, out: &mut Vec<NodeId>) {
        let Some(node) = self.node(id) else {
            return;
        };
        if node.panel().is_some() {
            return;
        }
        out.push(id);
        for child in &node.children {
            self.collect_content(*child, out);
        }
    }

    /// Linked table rows of a panel, in the order they are shown.
    pub fn links(&self, panel: NodeId) -> Vec<(NodeId, usize, Location)> {
        self.panel_content(panel)
            .into_iter()
            .filter(|id| self.is_visible(*id))
            .filter_map(|id| self.table(id).map(|table| (id, table)))
            .flat_map(|(id, table)| {
                table
                    .rows
                    .iter()
                    .enumerate()
                    .filter_map(move |(row, r)| r.link.clone().map(|link| (id, row, link)))
            })
            .collect()
    }

    pub fn scroll_panel(&mut self, panel: NodeId, delta: isize) {
        let max = self.panel_height(panel).saturating_sub(self.viewport_height);
        if let Some(p) = self.panel_mut(panel) {
            p.scroll_top = p.scroll_top.saturating_add_signed(delta).min(max);
        }
    }
}
