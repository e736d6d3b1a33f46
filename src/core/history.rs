//! Native navigation history.
//!
//! This is the host-side stack of `(state, location)` entries that back and
//! forward move through. Only the navigation controller talks to it.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::protocol::Location;

/// Per-document-load state copied into every history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PersistentState {
    /// Server clock minus local clock.
    pub server_time_offset_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationEntry {
    pub persistent_state: PersistentState,
    /// `<random prefix>-<counter>`; `None` for the entry created by `init`.
    pub view_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryEvent {
    /// The current entry changed through back/forward; carries its state.
    PopState(Option<NavigationEntry>),
    /// The document has to be built again from the current location.
    Reload,
}

pub trait NativeHistory {
    fn state(&self) -> Option<NavigationEntry>;
    fn location(&self) -> Location;
    fn push_state(&mut self, entry: NavigationEntry, location: Location);
    fn replace_state(&mut self, entry: NavigationEntry, location: Location);
    /// Move `delta` entries; the resulting `PopState` is delivered later.
    fn go(&mut self, delta: isize);
    /// Full navigation: a fresh entry without state, then `Reload`.
    fn assign(&mut self, location: Location);
    fn reload(&mut self);
    fn take_events(&mut self) -> Vec<HistoryEvent>;
    /// Serialized form for session persistence, if the history supports it.
    fn export(&self) -> Option<serde_json::Value> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct HistoryRecord {
    state: Option<NavigationEntry>,
    location: Location,
}

/// In-process history, serializable so a session can resume where it was.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryHistory {
    entries: Vec<HistoryRecord>,
    index: usize,
    #[serde(skip)]
    events: VecDeque<HistoryEvent>,
}

impl MemoryHistory {
    pub fn new(location: Location) -> Self {
        Self {
            entries: vec![HistoryRecord {
                state: None,
                location,
            }],
            index: 0,
            events: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Clamp a deserialized history into a usable one.
    pub fn sanitized(mut self) -> Self {
        if self.entries.is_empty() {
            return Self::new(Location::new("/"));
        }
        self.index = self.index.min(self.entries.len() - 1);
        self
    }

    fn current(&self) -> Option<&HistoryRecord> {
        self.entries.get(self.index)
    }
}

impl NativeHistory for MemoryHistory {
    fn state(&self) -> Option<NavigationEntry> {
        self.current().and_then(|record| record.state.clone())
    }

    fn location(&self) -> Location {
        self.current()
            .map(|record| record.location.clone())
            .unwrap_or_default()
    }

    fn push_state(&mut self, entry: NavigationEntry, location: Location) {
        self.entries.truncate(self.index + 1);
        self.entries.push(HistoryRecord {
            state: Some(entry),
            location,
        });
        self.index = self.entries.len() - 1;
    }

    fn replace_state(&mut self, entry: NavigationEntry, location: Location) {
        let record = HistoryRecord {
            state: Some(entry),
            location,
        };
        match self.entries.get_mut(self.index) {
            Some(slot) => *slot = record,
            None => {
                self.entries.push(record);
                self.index = self.entries.len() - 1;
            }
        }
    }

    fn go(&mut self, delta: isize) {
        let Some(target) = self.index.checked_add_signed(delta) else {
            return;
        };
        if delta == 0 {
            self.events.push_back(HistoryEvent::Reload);
            return;
        }
        if target >= self.entries.len() {
            return;
        }
        self.index = target;
        let state = self.state();
        self.events.push_back(HistoryEvent::PopState(state));
    }

    fn assign(&mut self, location: Location) {
        self.entries.truncate(self.index + 1);
        self.entries.push(HistoryRecord {
            state: None,
            location,
        });
        self.index = self.entries.len() - 1;
        self.events.push_back(HistoryEvent::Reload);
    }

    fn reload(&mut self) {
        self.events.push_back(HistoryEvent::Reload);
    }

    fn take_events(&mut self) -> Vec<HistoryEvent> {
        self.events.drain(..).collect()
    }

    fn export(&self) -> Option<serde_json::Value> {
        match serde_json::to_value(self) {
            Ok(value) => Some(value),
            Err(err) => {
                log::warn!("failed to serialize history: {err}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(view_id: &str) -> NavigationEntry {
        NavigationEntry {
            persistent_state: PersistentState::default(),
            view_id: Some(view_id.to_string()),
        }
    }

    #[test]
    fn go_moves_within_bounds_and_reports_state() {
        let mut history = MemoryHistory::new(Location::new("/"));
        history.replace_state(entry("p-0"), Location::new("/"));
        history.push_state(entry("p-1"), Location::new("/p/1"));

        history.go(-1);
        assert_eq!(history.take_events(), vec![HistoryEvent::PopState(Some(entry("p-0")))]);
        assert_eq!(history.location(), Location::new("/"));

        history.go(-1);
        assert!(history.take_events().is_empty());

        history.go(1);
        assert_eq!(history.location(), Location::new("/p/1"));
    }

    #[test]
    fn push_drops_forward_entries() {
        let mut history = MemoryHistory::new(Location::new("/"));
        history.push_state(entry("a"), Location::new("/a"));
        history.push_state(entry("b"), Location::new("/b"));
        history.go(-1);
        history.push_state(entry("c"), Location::new("/c"));
        assert_eq!(history.len(), 3);
        history.go(1);
        assert!(history.take_events().iter().all(|e| *e != HistoryEvent::PopState(Some(entry("b")))));
    }

    #[test]
    fn assign_starts_a_stateless_entry() {
        let mut history = MemoryHistory::new(Location::new("/"));
        history.assign(Location::new("/jobs"));
        assert_eq!(history.state(), None);
        assert_eq!(history.take_events(), vec![HistoryEvent::Reload]);
    }

    #[test]
    fn survives_serialization() {
        let mut history = MemoryHistory::new(Location::parse("/users#Admins"));
        history.replace_state(entry("x-0"), Location::parse("/users#Admins"));
        let json = serde_json::to_string(&history).unwrap();
        let back: MemoryHistory = serde_json::from_str::<MemoryHistory>(&json).unwrap().sanitized();
        assert_eq!(back, history);
    }
}
