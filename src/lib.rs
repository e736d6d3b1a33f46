//! simkit — terminal client for a contest-judging server
//!
//! The crate is split the way the client is layered: `protocol` holds the
//! wire formats, `core` the UI-independent runtime (document tree,
//! navigation history, incremental listers, log tails and request status),
//! `pages` builds the screens on top of it and `tui` draws them with
//! ratatui. The binary glue lives in the hidden `boot` and `cli` modules.

#[doc(hidden)]
pub mod boot;
#[doc(hidden)]
pub mod cli;
pub mod core;
pub mod pages;
pub mod protocol;
#[doc(hidden)]
pub mod tui;

pub use crate::core::{Kit, KitConfig, Session};
pub use crate::protocol::Location;
