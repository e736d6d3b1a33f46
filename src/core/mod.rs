/// UI-independent part of the client.
///
/// The document tree, navigation, paginated listers, log tails and the
/// request plumbing live here; the terminal front end only renders the
/// document and forwards keys.
pub mod bus;
pub mod clock;
pub mod colorize;
pub mod decoder;
pub mod document;
pub mod history;
pub mod lister;
pub mod location_state;
pub mod log_stream;
pub mod navigation;
pub mod persistence;
pub mod request;
pub mod runtime;
pub mod tab_menu;
pub mod task_manager;
pub mod transport;

pub use bus::{Bus, Completion};
pub use document::{Document, NodeId, NodeKind, PanelKind};
pub use history::{MemoryHistory, NativeHistory, PersistentState};
pub use runtime::{ApiResponse, Kit, KitConfig, Session};
pub use tab_menu::TabMenuBuilder;
pub use transport::{ScriptedTransport, Transport, UreqTransport};
