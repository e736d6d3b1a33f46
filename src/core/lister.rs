//! Paginated lists that grow as the operator scrolls.
//!
//! A lister owns one table region and fetches `query_url + suffix` pages
//! into it. The suffix is an opaque cursor produced by the renderer from the
//! last item received (e.g. `/id</3`); the lister only glues it on.

use serde::de::DeserializeOwned;

use crate::core::{
    document::{Document, NodeId, Table},
    request::{RequestError, RequestId},
};
use crate::protocol::api::ListPage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListerPhase {
    Idle,
    Fetching(RequestId),
    /// Last fetch failed; waits for an explicit retry.
    Failed,
    /// Everything was fetched or the region went away. Final.
    ShutDown,
}

/// Turns list items into table rows.
pub trait PageRenderer {
    type Item: DeserializeOwned;

    /// Called once with the first page, even when it is empty, so an empty
    /// list can say so.
    fn first_page(&mut self, table: &mut Table, items: &[Self::Item]);

    /// Called for every later non-empty page.
    fn next_page(&mut self, table: &mut Table, items: &[Self::Item]);

    /// Cursor for the page following `last`.
    fn query_suffix_after(&self, last: &Self::Item) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    MayBeMore,
    Exhausted,
}

/// Object-safe face of a [`Lister`], so listers of different item types can
/// be driven side by side.
pub trait ListerDriver {
    fn region(&self) -> NodeId;
    fn phase(&self) -> ListerPhase;
    /// URL of the next page, only while idle.
    fn next_url(&self) -> Option<String>;
    fn begin(&mut self, request: RequestId);
    fn accept(&mut self, doc: &mut Document, body: &str) -> Result<PageOutcome, RequestError>;
    fn fail(&mut self);
    /// `Failed -> Idle`; false in any other phase.
    fn retry(&mut self) -> bool;
    fn shut_down(&mut self);
}

pub struct Lister<R: PageRenderer> {
    renderer: R,
    region: NodeId,
    query_url: String,
    next_query_suffix: String,
    phase: ListerPhase,
    first_fetch: bool,
}

impl<R: PageRenderer> Lister<R> {
    pub fn new(renderer: R, region: NodeId, query_url: impl Into<String>) -> Self {
        Self::with_suffix(renderer, region, query_url, "")
    }

    pub fn with_suffix(
        renderer: R,
        region: NodeId,
        query_url: impl Into<String>,
        initial_suffix: &str,
    ) -> Self {
        Self {
            renderer,
            region,
            query_url: query_url.into(),
            next_query_suffix: initial_suffix.to_string(),
            phase: ListerPhase::Idle,
            first_fetch: true,
        }
    }

    pub fn next_query_suffix(&self) -> &str {
        &self.next_query_suffix
    }
}

impl<R: PageRenderer> ListerDriver for Lister<R> {
    fn region(&self) -> NodeId {
        self.region
    }

    fn phase(&self) -> ListerPhase {
        self.phase
    }

    fn next_url(&self) -> Option<String> {
        (self.phase == ListerPhase::Idle).then(|| format!("{}{}", self.query_url, self.next_query_suffix))
    }

    fn begin(&mut self, request: RequestId) {
        if self.phase == ListerPhase::Idle {
            self.phase = ListerPhase::Fetching(request);
        }
    }

    fn accept(&mut self, doc: &mut Document, body: &str) -> Result<PageOutcome, RequestError> {
        let page: ListPage<R::Item> = serde_json::from_str(body).map_err(|err| {
            log::error!("{}: bad list page: {err}", self.query_url);
            self.phase = ListerPhase::Failed;
            RequestError::Parse
        })?;

        let Some(table) = doc.table_mut(self.region) else {
            self.phase = ListerPhase::ShutDown;
            return Ok(PageOutcome::Exhausted);
        };
        if self.first_fetch {
            self.first_fetch = false;
            self.renderer.first_page(table, &page.list);
        } else if !page.list.is_empty() {
            self.renderer.next_page(table, &page.list);
        }
        if let Some(last) = page.list.last() {
            self.next_query_suffix = self.renderer.query_suffix_after(last);
        }

        if page.may_be_more {
            self.phase = ListerPhase::Idle;
            Ok(PageOutcome::MayBeMore)
        } else {
            log::debug!("{}: no more pages", self.query_url);
            self.phase = ListerPhase::ShutDown;
            Ok(PageOutcome::Exhausted)
        }
    }

    fn fail(&mut self) {
        if self.phase != ListerPhase::ShutDown {
            self.phase = ListerPhase::Failed;
        }
    }

    fn retry(&mut self) -> bool {
        if self.phase == ListerPhase::Failed {
            self.phase = ListerPhase::Idle;
            true
        } else {
            false
        }
    }

    fn shut_down(&mut self) {
        self.phase = ListerPhase::ShutDown;
    }
}
