//! Log endpoint wire format.
//!
//! `POST /api/logs/<stream>[?<offset>]` answers with exactly two lines: the
//! decimal offset of the returned chunk and the chunk itself as hex digit
//! pairs.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LogStreamKind {
    Web,
    WebErr,
    Jobs,
    JobsErr,
}

impl LogStreamKind {
    /// Stream name used in the endpoint path.
    pub fn stream_name(self) -> &'static str {
        match self {
            LogStreamKind::Web => "web",
            LogStreamKind::WebErr => "web_err",
            LogStreamKind::Jobs => "jobs",
            LogStreamKind::JobsErr => "jobs_err",
        }
    }

    pub fn tab_name(self) -> &'static str {
        match self {
            LogStreamKind::Web => "Server (web)",
            LogStreamKind::WebErr => "Server error (web)",
            LogStreamKind::Jobs => "Job server",
            LogStreamKind::JobsErr => "Job server error",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            LogStreamKind::Web => "Server's log",
            LogStreamKind::WebErr => "Server's error log",
            LogStreamKind::Jobs => "Job server's log",
            LogStreamKind::JobsErr => "Job server's error log",
        }
    }

    /// The web server log is noisy, so it is not refreshed automatically.
    pub fn auto_refresh_by_default(self) -> bool {
        self != LogStreamKind::Web
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogChunk {
    pub offset: u64,
    pub hex: String,
}

impl LogChunk {
    pub fn parse(body: &str) -> Result<Self> {
        let (offset, hex) = body
            .split_once('\n')
            .ok_or_else(|| anyhow!("log response has no line break"))?;
        let offset = offset
            .trim()
            .parse::<u64>()
            .with_context(|| format!("invalid log offset {offset:?}"))?;
        let hex = hex.trim_end_matches(['\n', '\r']).to_string();
        Ok(Self { offset, hex })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn parses_offset_and_hex() {
        let chunk = LogChunk::parse("100\n48690a\n").unwrap();
        assert_eq!(chunk.offset, 100);
        assert_eq!(chunk.hex, "48690a");
    }

    #[test]
    fn rejects_missing_line_break() {
        assert!(LogChunk::parse("100").is_err());
        assert!(LogChunk::parse("abc\n00").is_err());
    }

    #[test]
    fn stream_names_match_endpoint_paths() {
        let names: Vec<_> = LogStreamKind::iter().map(|k| k.stream_name()).collect();
        assert_eq!(names, vec!["web", "web_err", "jobs", "jobs_err"]);
        for kind in LogStreamKind::iter() {
            assert_eq!(kind.as_ref(), kind.stream_name());
        }
    }
}
