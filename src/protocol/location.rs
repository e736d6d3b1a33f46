//! Addressable locations
//!
//! A location is the canonical resource path followed by an optional chain of
//! `#`-prefixed, percent-encoded tokens. Nested tab menus consume the tokens
//! left to right, so `/problems#All%20problems#Public` reopens the "Public"
//! sub-tab of the "All problems" tab.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Characters left untouched by `encodeURIComponent`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Location {
    pub path: String,
    pub tokens: Vec<String>,
}

impl Location {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            tokens: Vec::new(),
        }
    }

    /// Parse `path#tok#tok`. An empty fragment yields no tokens.
    pub fn parse(raw: &str) -> Self {
        let (path, fragment) = match raw.find('#') {
            Some(pos) => (&raw[..pos], &raw[pos + 1..]),
            None => (raw, ""),
        };
        let tokens = if fragment.is_empty() {
            Vec::new()
        } else {
            fragment.split('#').map(decode_token).collect()
        };
        Self {
            path: path.to_string(),
            tokens,
        }
    }

    pub fn with_tokens(&self, tokens: Vec<String>) -> Self {
        Self {
            path: self.path.clone(),
            tokens,
        }
    }

    /// Encoded fragment including the leading `#` of every token.
    pub fn fragment(&self) -> String {
        let mut out = String::new();
        for token in &self.tokens {
            out.push('#');
            out.push_str(&utf8_percent_encode(token, COMPONENT).to_string());
        }
        out
    }

    /// Path segments without the empty leading one, e.g. `/p/12` -> `["p", "12"]`.
    pub fn segments(&self) -> Vec<&str> {
        self.path.split('/').filter(|s| !s.is_empty()).collect()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.path, self.fragment())
    }
}

impl From<&str> for Location {
    fn from(raw: &str) -> Self {
        Location::parse(raw)
    }
}

fn decode_token(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_path_and_tokens() {
        let loc = Location::parse("/problems#All%20problems#Public");
        assert_eq!(loc.path, "/problems");
        assert_eq!(loc.tokens, vec!["All problems", "Public"]);
    }

    #[test]
    fn empty_fragment_has_no_tokens() {
        assert!(Location::parse("/jobs#").tokens.is_empty());
        assert!(Location::parse("/jobs").tokens.is_empty());
    }

    #[test]
    fn display_encodes_like_encode_uri_component() {
        let loc = Location {
            path: "/logs".to_string(),
            tokens: vec!["Server (web)".to_string(), "a#b/c".to_string()],
        };
        assert_eq!(loc.to_string(), "/logs#Server%20(web)#a%23b%2Fc");
        assert_eq!(Location::parse(&loc.to_string()), loc);
    }

    #[test]
    fn segments_skip_empty_parts() {
        assert_eq!(Location::new("/jobs/17").segments(), vec!["jobs", "17"]);
        assert!(Location::new("/").segments().is_empty());
    }
}
