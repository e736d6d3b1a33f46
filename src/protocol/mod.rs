//! Wire-level formats shared by the core and the pages: addressable
//! locations, JSON API types, the log line protocol and CSRF cookies.

pub mod api;
pub mod csrf;
pub mod location;
pub mod logs;

pub use location::Location;
pub use logs::{LogChunk, LogStreamKind};
