//! Live tail of one server log.
//!
//! The first fetch returns the newest chunk. Scrolling up fetches older
//! chunks that are prepended; a periodic poll fetches the newest chunk again
//! and, when the log moved on, starts over from it. One request at a time.

use std::time::{Duration, Instant};

use crate::core::{
    colorize::{colorize, Markup},
    decoder::HexUtf8Decoder,
    document::{LogView, NodeId},
    request::{RequestError, RequestId},
};
use crate::protocol::{api::url_api_logs, LogChunk, LogStreamKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchDirection {
    Older,
    Newest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogPhase {
    Idle,
    Fetching {
        request: RequestId,
        direction: FetchDirection,
    },
    Failed,
    ShutDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStep {
    /// The poll found nothing new.
    Unchanged,
    /// New text was rendered. `fetch_older` asks for another older chunk
    /// because the view still cannot be scrolled up.
    Rendered { fetch_older: bool },
}

#[derive(Debug, Clone)]
pub struct LogStream {
    kind: LogStreamKind,
    region: NodeId,
    /// Offset of the oldest chunk received.
    offset: Option<u64>,
    /// Offset of the newest chunk received.
    first_offset: Option<u64>,
    decoder: HexUtf8Decoder,
    phase: LogPhase,
    colorize_window: usize,
    last_poll: Option<Instant>,
}

impl LogStream {
    pub fn new(kind: LogStreamKind, region: NodeId, colorize_window: usize) -> Self {
        Self {
            kind,
            region,
            offset: None,
            first_offset: None,
            decoder: HexUtf8Decoder::new(),
            phase: LogPhase::Idle,
            colorize_window,
            last_poll: None,
        }
    }

    pub fn kind(&self) -> LogStreamKind {
        self.kind
    }

    pub fn region(&self) -> NodeId {
        self.region
    }

    pub fn phase(&self) -> LogPhase {
        self.phase
    }

    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    pub fn first_offset(&self) -> Option<u64> {
        self.first_offset
    }

    /// URL of the next older chunk. Nothing is older than offset 0.
    pub fn older_url(&self) -> Option<String> {
        if self.phase != LogPhase::Idle || self.offset == Some(0) {
            return None;
        }
        Some(url_api_logs(self.kind.stream_name(), self.offset))
    }

    pub fn newest_url(&self) -> Option<String> {
        (self.phase == LogPhase::Idle).then(|| url_api_logs(self.kind.stream_name(), None))
    }

    pub fn begin(&mut self, request: RequestId, direction: FetchDirection) {
        if self.phase == LogPhase::Idle {
            self.phase = LogPhase::Fetching { request, direction };
        }
    }

    pub fn accept(&mut self, view: &mut LogView, body: &str) -> Result<LogStep, RequestError> {
        let direction = match self.phase {
            LogPhase::Fetching { direction, .. } => direction,
            _ => FetchDirection::Older,
        };
        let chunk = LogChunk::parse(body).map_err(|err| {
            log::error!("{} log: {err:#}", self.kind.stream_name());
            self.phase = LogPhase::Failed;
            RequestError::Parse
        })?;

        if direction == FetchDirection::Newest && Some(chunk.offset) == self.first_offset {
            self.phase = LogPhase::Idle;
            return Ok(LogStep::Unchanged);
        }
        self.process_data(view, chunk, direction)
    }

    fn process_data(
        &mut self,
        view: &mut LogView,
        chunk: LogChunk,
        direction: FetchDirection,
    ) -> Result<LogStep, RequestError> {
        match self.first_offset {
            None => self.first_offset = Some(chunk.offset),
            Some(first) => {
                // A newer start means fresh content; a poll landing anywhere
                // else than the recorded start means the file was replaced.
                let moved = chunk.offset > first
                    || (direction == FetchDirection::Newest && chunk.offset != first);
                if moved {
                    log::info!(
                        "{} log moved from {first} to {}, starting over",
                        self.kind.stream_name(),
                        chunk.offset
                    );
                    self.first_offset = Some(chunk.offset);
                    self.decoder = HexUtf8Decoder::new();
                    view.markup.clear();
                    view.scroll_top = 0;
                }
            }
        }
        self.offset = Some(chunk.offset);

        let text = self.decoder.feed(&chunk.hex).map_err(|err| {
            log::error!("{} log: {err}", self.kind.stream_name());
            self.phase = LogPhase::Failed;
            RequestError::Parse
        })?;

        let prev_height = view.content_lines();
        let bottom_dist = prev_height.saturating_sub(view.scroll_top);

        let window = text.chars().count() + self.colorize_window;
        let mut tokens = Vec::with_capacity(view.markup.len() + 1);
        tokens.push(Markup::Text(text));
        tokens.append(&mut view.markup);
        view.markup = colorize(&tokens, window);

        let curr_height = view.content_lines();
        view.scroll_top = curr_height.saturating_sub(bottom_dist).min(view.max_scroll());
        self.phase = LogPhase::Idle;

        let fetch_older = chunk.offset > 0
            && (view.viewport_height >= curr_height || prev_height == curr_height);
        Ok(LogStep::Rendered { fetch_older })
    }

    pub fn fail(&mut self) {
        if self.phase != LogPhase::ShutDown {
            self.phase = LogPhase::Failed;
        }
    }

    /// `Failed -> Idle`, so the caller can fetch older again.
    pub fn retry(&mut self) -> bool {
        if self.phase == LogPhase::Failed {
            self.phase = LogPhase::Idle;
            true
        } else {
            false
        }
    }

    pub fn shut_down(&mut self) {
        self.phase = LogPhase::ShutDown;
    }

    /// True once per `interval`; the first call only starts the clock.
    pub fn poll_due(&mut self, now: Instant, interval: Duration) -> bool {
        match self.last_poll {
            None => {
                self.last_poll = Some(now);
                false
            }
            Some(last) if now.saturating_duration_since(last) >= interval => {
                self.last_poll = Some(now);
                true
            }
            Some(_) => false,
        }
    }
}
