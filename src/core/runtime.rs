//! The kit: one single-threaded owner of the document, the navigation
//! controller and every component that fetches into the document.
//!
//! Nothing here blocks. Requests go out through the [`Transport`], their
//! completions come back over the bus and are applied by [`Kit::pump`],
//! together with history events and follow-up work that was deferred instead
//! of being run recursively.

use std::{
    collections::{HashMap, VecDeque},
    rc::Rc,
    time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};

use crate::core::{
    bus::{Bus, Completion},
    clock::ServerClock,
    document::{Document, LogView, NodeId, NodeKind},
    history::{HistoryEvent, NativeHistory, PersistentState},
    lister::{Lister, ListerDriver, ListerPhase, PageOutcome, PageRenderer},
    log_stream::{FetchDirection, LogStep, LogStream},
    navigation::{NavOutcome, NavigationController},
    request::{
        classify_response, parse_json, FormBody, HttpResponse, RequestError, RequestId, RequestSpec,
        StatusIndicator, StatusReport, StatusState,
    },
    tab_menu::TabMenuHandlers,
    transport::Transport,
};
use crate::protocol::{api::Capabilities, Location, LogStreamKind};

/// Builds the page for a location.
pub type Router = Rc<dyn Fn(&mut Kit, &Location)>;

/// Handles the parsed JSON of a successful API call.
pub type ApiHandler = Rc<dyn Fn(&mut Kit, ApiResponse, &mut StatusReport)>;

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// Region the request was issued for.
    pub region: NodeId,
    /// `None` for an empty body.
    pub value: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KitConfig {
    /// Sent with every request; the CSRF token is read from it.
    pub cookies: String,
    pub request_timeout: Option<Duration>,
    /// A lister fetches more once its bottom is this many rows below the
    /// viewport bottom or closer.
    pub lister_margin: usize,
    /// A log fetches older output once scrolled this close to its top.
    pub log_scroll_margin: usize,
    pub log_poll_interval: Duration,
    /// Characters past the newest chunk that get re-colorized.
    pub colorize_window: usize,
    pub abort_delay: Duration,
    pub log_viewport_height: usize,
    pub viewport_height: usize,
}

impl Default for KitConfig {
    fn default() -> Self {
        Self {
            cookies: String::new(),
            request_timeout: None,
            lister_margin: 300,
            log_scroll_margin: 300,
            log_poll_interval: Duration::from_millis(2000),
            colorize_window: 2000,
            abort_delay: Duration::from_millis(1500),
            log_viewport_height: 20,
            viewport_height: 24,
        }
    }
}

/// Who is signed in and what the server lets them see.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: Option<u64>,
    pub user_type: Option<String>,
    #[serde(default)]
    pub capabilities: Capabilities,
}

impl Session {
    pub fn is_signed_in(&self) -> bool {
        self.user_id.is_some()
    }

    /// Admins and teachers see owner and update columns.
    pub fn is_staff(&self) -> bool {
        matches!(self.user_type.as_deref(), Some("admin" | "teacher"))
    }
}

#[derive(Clone)]
enum Owner {
    Lister(NodeId),
    Log(NodeId, FetchDirection),
    Api(ApiHandler),
}

struct InFlight {
    spec: RequestSpec,
    owner: Owner,
    parent: NodeId,
    status: NodeId,
}

struct FailedRequest {
    spec: RequestSpec,
    owner: Owner,
    parent: NodeId,
}

/// What a status node reports on. A new request only replaces finished
/// indicators of its own slot, so neighbours sharing a parent keep theirs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatusSlot {
    Region(NodeId),
    Api(NodeId),
}

impl StatusSlot {
    fn of(owner: &Owner, parent: NodeId) -> Self {
        match owner {
            Owner::Lister(region) | Owner::Log(region, _) => Self::Region(*region),
            Owner::Api(_) => Self::Api(parent),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Deferred {
    ListerCheck(NodeId),
    LogFetchOlder(NodeId),
}

pub struct Kit {
    pub(crate) doc: Document,
    pub(crate) nav: NavigationController,
    pub(crate) tab_menus: HashMap<NodeId, TabMenuHandlers>,
    transport: Box<dyn Transport>,
    bus: Bus,
    config: KitConfig,
    session: Session,
    clock: ServerClock,
    router: Router,
    make_default_state: Box<dyn Fn() -> PersistentState>,
    listers: HashMap<NodeId, Box<dyn ListerDriver>>,
    logs: HashMap<NodeId, LogStream>,
    in_flight: HashMap<RequestId, InFlight>,
    failed: HashMap<NodeId, FailedRequest>,
    deferred: VecDeque<Deferred>,
    next_request: RequestId,
    now: Instant,
}

impl Kit {
    pub fn new(
        config: KitConfig,
        session: Session,
        transport: Box<dyn Transport>,
        bus: Bus,
        history: Box<dyn NativeHistory>,
        router: Router,
    ) -> Self {
        let doc = Document::new(config.viewport_height);
        Self {
            doc,
            nav: NavigationController::new(history),
            tab_menus: HashMap::new(),
            transport,
            bus,
            config,
            session,
            clock: ServerClock::default(),
            router,
            make_default_state: Box::new(PersistentState::default),
            listers: HashMap::new(),
            logs: HashMap::new(),
            in_flight: HashMap::new(),
            failed: HashMap::new(),
            deferred: VecDeque::new(),
            next_request: 1,
            now: Instant::now(),
        }
    }

    /// Supplies the persistent state for a history entry that has none.
    pub fn with_default_state(mut self, make: impl Fn() -> PersistentState + 'static) -> Self {
        self.make_default_state = Box::new(make);
        self
    }

    /// Initialize navigation and build the page for the current location.
    pub fn start(&mut self) {
        let make = &self.make_default_state;
        let state = self.nav.init(|| make());
        self.clock = ServerClock::new(state);
        self.route();
    }

    fn route(&mut self) {
        let location = self.nav.location();
        log::info!("building {location}");
        let router = Rc::clone(&self.router);
        router(self, &location);
        self.collect_detached();
    }

    /// Throw the document away and build it again from the current entry.
    fn rebuild(&mut self) {
        for id in self.in_flight.keys().copied().collect::<Vec<_>>() {
            self.transport.abort(id);
        }
        self.in_flight.clear();
        self.failed.clear();
        self.deferred.clear();
        self.listers.clear();
        self.logs.clear();
        self.tab_menus.clear();
        self.doc.clear();
        self.nav.reset_session();
        self.start();
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    pub fn config(&self) -> &KitConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn clock(&self) -> ServerClock {
        self.clock
    }

    pub fn location(&self) -> Location {
        self.nav.location()
    }

    pub fn navigation(&self) -> &NavigationController {
        &self.nav
    }

    pub fn now(&self) -> Instant {
        self.now
    }

    pub fn history_export(&self) -> Option<serde_json::Value> {
        self.nav.history().export()
    }

    pub fn append(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        self.doc.append(Some(parent), kind)
    }

    pub fn heading(&mut self, parent: NodeId, text: impl Into<String>) -> NodeId {
        self.append(parent, NodeKind::Heading(text.into()))
    }

    pub fn paragraph(&mut self, parent: NodeId, text: impl Into<String>) -> NodeId {
        self.append(parent, NodeKind::Paragraph(text.into()))
    }

    pub fn container(&mut self, parent: NodeId) -> NodeId {
        self.append(parent, NodeKind::Container)
    }

    /// Remove everything below `region` and forget the components that
    /// lived there.
    pub fn clear_region(&mut self, region: NodeId) {
        self.doc.clear_children(region);
        self.collect_detached();
    }

    // Navigation

    pub fn open_view(&mut self, title: &str, location: Location) -> NodeId {
        self.nav.open_view(&mut self.doc, title, location)
    }

    pub fn open_modal(&mut self, title: &str) -> Option<NodeId> {
        self.nav.open_modal(&mut self.doc, title)
    }

    pub fn current_view(&self) -> Option<NodeId> {
        self.nav.current_view(&self.doc)
    }

    pub fn close(&mut self, panel: NodeId) {
        self.nav.close(&mut self.doc, panel);
        self.collect_detached();
    }

    pub fn escape(&mut self) {
        self.nav.escape(&mut self.doc);
        self.collect_detached();
    }

    pub fn back(&mut self) {
        self.nav.back();
    }

    pub fn forward(&mut self) {
        self.nav.forward();
    }

    /// Full navigation; the document is rebuilt on the next pump.
    pub fn visit(&mut self, location: Location) {
        self.nav.assign(location);
    }

    pub fn reload(&mut self) {
        self.nav.reload();
    }

    /// Open whatever `location` points at on top of the current view.
    pub fn open_location(&mut self, location: &Location) {
        let router = Rc::clone(&self.router);
        router(self, location);
        self.collect_detached();
    }

    // Event loop

    /// Apply everything that is ready: completions, history events and
    /// deferred work. Returns whether anything happened.
    pub fn pump(&mut self) -> bool {
        let mut any = false;
        loop {
            let mut progressed = false;
            for completion in self.bus.drain() {
                self.on_completion(completion);
                progressed = true;
            }
            for event in self.nav.take_events() {
                self.on_history_event(event);
                progressed = true;
            }
            while let Some(task) = self.deferred.pop_front() {
                self.run_deferred(task);
                progressed = true;
            }
            if !progressed {
                break;
            }
            any = true;
        }
        any
    }

    fn on_history_event(&mut self, event: HistoryEvent) {
        match event {
            HistoryEvent::PopState(state) => {
                if self.nav.on_pop_state(&mut self.doc, state) == NavOutcome::Reload {
                    self.rebuild();
                }
            }
            HistoryEvent::Reload => self.rebuild(),
        }
    }

    fn run_deferred(&mut self, task: Deferred) {
        match task {
            Deferred::ListerCheck(region) => self.check_lister(region),
            Deferred::LogFetchOlder(region) => self.log_fetch_older(region),
        }
    }

    /// Advance time: polls logs that are due.
    pub fn tick(&mut self, now: Instant) {
        self.now = now;
        self.collect_detached();
        let interval = self.config.log_poll_interval;
        let regions: Vec<NodeId> = self.logs.keys().copied().collect();
        for region in regions {
            let due = self
                .logs
                .get_mut(&region)
                .is_some_and(|stream| stream.poll_due(now, interval));
            if !due || !self.doc.is_visible(region) {
                continue;
            }
            let wants_newest = self
                .doc
                .log(region)
                .is_some_and(|view| view.auto_refresh && view.is_scrolled_to_bottom());
            if wants_newest {
                self.log_fetch_newest(region);
            }
        }
    }

    /// Scroll a panel and let the listers inside react.
    pub fn scroll_panel(&mut self, panel: NodeId, delta: isize) {
        self.doc.scroll_panel(panel, delta);
        self.collect_detached();
        let regions: Vec<NodeId> = self
            .listers
            .keys()
            .copied()
            .filter(|region| self.doc.panel_of(*region) == Some(panel))
            .collect();
        for region in regions {
            self.check_lister(region);
        }
    }

    pub fn scroll_log(&mut self, region: NodeId, delta: isize) {
        let Some(view) = self.doc.log_mut(region) else {
            self.logs.remove(&region);
            return;
        };
        view.scroll_top = view.scroll_top.saturating_add_signed(delta).min(view.max_scroll());
        if view.scroll_top <= self.config.log_scroll_margin {
            self.log_fetch_older(region);
        }
    }

    pub fn toggle_auto_refresh(&mut self, region: NodeId) {
        if let Some(view) = self.doc.log_mut(region) {
            view.auto_refresh = !view.auto_refresh;
        }
    }

    pub fn on_resize(&mut self, viewport_height: usize) {
        self.doc.set_viewport_height(viewport_height);
        self.collect_detached();
        let listers: Vec<NodeId> = self.listers.keys().copied().collect();
        for region in listers {
            self.check_lister(region);
        }
        let logs: Vec<NodeId> = self.logs.keys().copied().collect();
        for region in logs {
            let near_top = self
                .doc
                .log(region)
                .is_some_and(|view| view.scroll_top <= self.config.log_scroll_margin);
            if near_top {
                self.log_fetch_older(region);
            }
        }
    }

    /// Drop components whose region left the document.
    fn collect_detached(&mut self) {
        let doc = &self.doc;
        self.listers.retain(|region, lister| {
            let attached = doc.is_attached(*region);
            if !attached {
                lister.shut_down();
                log::debug!("lister at {region:?} detached");
            }
            attached
        });
        self.logs.retain(|region, stream| {
            let attached = doc.is_attached(*region);
            if !attached {
                stream.shut_down();
                log::debug!("{} log detached", stream.kind().stream_name());
            }
            attached
        });
        self.tab_menus.retain(|menu, _| doc.is_attached(*menu));
        self.failed.retain(|status, _| doc.is_attached(*status));
    }

    // Requests

    fn send(&mut self, spec: RequestSpec, parent: NodeId, owner: Owner) -> RequestId {
        let id = self.next_request;
        self.next_request += 1;

        let slot = StatusSlot::of(&owner, parent);
        let previous: Vec<NodeId> = self
            .doc
            .children(parent)
            .iter()
            .copied()
            .filter(|child| {
                let Some(indicator) = self.doc.status(*child) else {
                    return false;
                };
                if indicator.pending_request().is_some() {
                    return false;
                }
                match self.failed.get(child) {
                    Some(failed) => StatusSlot::of(&failed.owner, failed.parent) == slot,
                    None => matches!(slot, StatusSlot::Api(_)),
                }
            })
            .collect();
        for status in previous {
            self.doc.remove(status);
            self.failed.remove(&status);
        }

        let status = self.doc.append(
            Some(parent),
            NodeKind::Status(StatusIndicator::pending(id, self.now)),
        );
        self.transport.send(id, &spec);
        self.in_flight.insert(
            id,
            InFlight {
                spec,
                owner,
                parent,
                status,
            },
        );
        id
    }

    fn on_completion(&mut self, completion: Completion) {
        let Some(request) = self.in_flight.remove(&completion.id) else {
            log::debug!("ignoring completion of unknown request {}", completion.id);
            return;
        };
        let result = classify_response(completion.result);
        match request.owner.clone() {
            Owner::Lister(region) => self.finish_lister(region, request, result),
            Owner::Log(region, _) => self.finish_log(region, request, result),
            Owner::Api(handler) => self.finish_api(handler, request, result),
        }
    }

    fn show_error(&mut self, request: InFlight, err: RequestError) {
        log::warn!("{} {} failed: {err}", request.spec.method, request.spec.url);
        let Some(status) = self.doc.status_mut(request.status) else {
            return;
        };
        status.state = StatusState::Error {
            message: err.to_string(),
        };
        self.failed.insert(
            request.status,
            FailedRequest {
                spec: request.spec,
                owner: request.owner,
                parent: request.parent,
            },
        );
    }

    fn finish_lister(
        &mut self,
        region: NodeId,
        request: InFlight,
        result: Result<HttpResponse, RequestError>,
    ) {
        let Some(mut lister) = self.listers.remove(&region) else {
            self.doc.remove(request.status);
            return;
        };
        if !self.doc.is_attached(region) {
            lister.shut_down();
            self.doc.remove(request.status);
            return;
        }
        match result.and_then(|response| lister.accept(&mut self.doc, &response.body)) {
            Ok(outcome) => {
                self.doc.remove(request.status);
                if outcome == PageOutcome::MayBeMore {
                    self.deferred.push_back(Deferred::ListerCheck(region));
                }
            }
            Err(err) => {
                lister.fail();
                self.show_error(request, err);
            }
        }
        self.listers.insert(region, lister);
    }

    fn finish_log(
        &mut self,
        region: NodeId,
        request: InFlight,
        result: Result<HttpResponse, RequestError>,
    ) {
        let Some(mut stream) = self.logs.remove(&region) else {
            self.doc.remove(request.status);
            return;
        };
        let Some(view) = self.doc.log_mut(region) else {
            stream.shut_down();
            self.doc.remove(request.status);
            return;
        };
        match result.and_then(|response| stream.accept(view, &response.body)) {
            Ok(step) => {
                self.doc.remove(request.status);
                if step == (LogStep::Rendered { fetch_older: true }) {
                    self.deferred.push_back(Deferred::LogFetchOlder(region));
                }
            }
            Err(err) => {
                stream.fail();
                self.show_error(request, err);
            }
        }
        self.logs.insert(region, stream);
    }

    fn finish_api(
        &mut self,
        handler: ApiHandler,
        request: InFlight,
        result: Result<HttpResponse, RequestError>,
    ) {
        if !self.doc.is_attached(request.parent) {
            log::debug!("{} landed for a removed region", request.spec.url);
            return;
        }
        match result.and_then(|response| parse_json(&response)) {
            Ok(value) => {
                let mut report = StatusReport::default();
                handler(
                    self,
                    ApiResponse {
                        region: request.parent,
                        value,
                    },
                    &mut report,
                );
                match report.into_state() {
                    Some(state) => {
                        if let Some(status) = self.doc.status_mut(request.status) {
                            status.state = state;
                        }
                    }
                    None => self.doc.remove(request.status),
                }
                self.collect_detached();
            }
            Err(err) => self.show_error(request, err),
        }
    }

    /// GET JSON from the API, status shown in `region`.
    pub fn get_from_api(
        &mut self,
        region: NodeId,
        url: impl Into<String>,
        handler: impl Fn(&mut Kit, ApiResponse, &mut StatusReport) + 'static,
    ) -> RequestId {
        let spec = RequestSpec::get(url).with_timeout(self.config.request_timeout);
        self.send(spec, region, Owner::Api(Rc::new(handler)))
    }

    /// POST a form to the API with the CSRF token attached.
    pub fn post_to_api(
        &mut self,
        region: NodeId,
        url: impl Into<String>,
        form: FormBody,
        handler: impl Fn(&mut Kit, ApiResponse, &mut StatusReport) + 'static,
    ) -> RequestId {
        let spec = RequestSpec::post(url, form)
            .with_csrf(&self.config.cookies)
            .with_timeout(self.config.request_timeout);
        self.send(spec, region, Owner::Api(Rc::new(handler)))
    }

    /// Retry the request behind a failed status node.
    pub fn retry(&mut self, status: NodeId) -> bool {
        let Some(failed) = self.failed.remove(&status) else {
            return false;
        };
        self.doc.remove(status);
        match failed.owner {
            Owner::Lister(region) => {
                if let Some(lister) = self.listers.get_mut(&region) {
                    lister.retry();
                }
                self.fetch_lister(region);
            }
            Owner::Log(region, direction) => {
                if let Some(stream) = self.logs.get_mut(&region) {
                    stream.retry();
                }
                self.log_fetch(region, direction);
            }
            owner @ Owner::Api(_) => {
                self.send(failed.spec, failed.parent, owner);
            }
        }
        true
    }

    /// Abort the request behind a pending status node, once its abort
    /// control is showing.
    pub fn abort(&mut self, status: NodeId) -> bool {
        let Some(indicator) = self.doc.status(status) else {
            return false;
        };
        if !indicator.abort_visible(self.now, self.config.abort_delay) {
            return false;
        }
        match indicator.pending_request() {
            Some(id) => {
                log::info!("aborting request {id}");
                self.transport.abort(id);
                true
            }
            None => false,
        }
    }

    /// Status nodes inside `panel`, not descending into nested panels.
    pub fn statuses_in(&self, panel: NodeId) -> Vec<NodeId> {
        self.doc
            .panel_content(panel)
            .into_iter()
            .filter(|id| self.doc.status(*id).is_some())
            .collect()
    }

    // Listers

    /// Append a table to `parent` and keep it filled from `query_url`.
    pub fn add_lister<R: PageRenderer + 'static>(
        &mut self,
        parent: NodeId,
        query_url: impl Into<String>,
        renderer: R,
    ) -> NodeId {
        let region = self.append(parent, NodeKind::Table(Default::default()));
        let lister = Lister::new(renderer, region, query_url);
        self.listers.insert(region, Box::new(lister));
        self.check_lister(region);
        region
    }

    pub fn lister_phase(&self, region: NodeId) -> Option<ListerPhase> {
        self.listers.get(&region).map(|lister| lister.phase())
    }

    fn check_lister(&mut self, region: NodeId) {
        if !self.doc.is_attached(region) {
            if let Some(mut lister) = self.listers.remove(&region) {
                lister.shut_down();
            }
            return;
        }
        let idle = self.lister_phase(region) == Some(ListerPhase::Idle);
        if idle && self.doc.is_near_bottom(region, self.config.lister_margin) {
            self.fetch_lister(region);
        }
    }

    fn fetch_lister(&mut self, region: NodeId) {
        let Some(url) = self.listers.get(&region).and_then(|lister| lister.next_url()) else {
            return;
        };
        let parent = self.doc.parent(region).unwrap_or(region);
        let spec = RequestSpec::get(url).with_timeout(self.config.request_timeout);
        let id = self.send(spec, parent, Owner::Lister(region));
        if let Some(lister) = self.listers.get_mut(&region) {
            lister.begin(id);
        }
    }

    // Logs

    /// Append a log view of `kind` to `parent` and start tailing it.
    pub fn add_log_stream(&mut self, parent: NodeId, kind: LogStreamKind) -> NodeId {
        let region = self.append(
            parent,
            NodeKind::Log(LogView {
                title: kind.title().to_string(),
                markup: Vec::new(),
                scroll_top: 0,
                viewport_height: self.config.log_viewport_height,
                auto_refresh: kind.auto_refresh_by_default(),
            }),
        );
        self.logs
            .insert(region, LogStream::new(kind, region, self.config.colorize_window));
        self.log_fetch_older(region);
        region
    }

    pub fn log_stream(&self, region: NodeId) -> Option<&LogStream> {
        self.logs.get(&region)
    }

    fn log_fetch_older(&mut self, region: NodeId) {
        self.log_fetch(region, FetchDirection::Older);
    }

    fn log_fetch_newest(&mut self, region: NodeId) {
        self.log_fetch(region, FetchDirection::Newest);
    }

    fn log_fetch(&mut self, region: NodeId, direction: FetchDirection) {
        if !self.doc.is_attached(region) {
            if let Some(mut stream) = self.logs.remove(&region) {
                stream.shut_down();
            }
            return;
        }
        let url = self.logs.get(&region).and_then(|stream| match direction {
            FetchDirection::Older => stream.older_url(),
            FetchDirection::Newest => stream.newest_url(),
        });
        let Some(url) = url else {
            return;
        };
        let parent = self.doc.parent(region).unwrap_or(region);
        let spec = RequestSpec::post(url, FormBody::new())
            .with_csrf(&self.config.cookies)
            .with_timeout(self.config.request_timeout);
        let id = self.send(spec, parent, Owner::Log(region, direction));
        if let Some(stream) = self.logs.get_mut(&region) {
            stream.begin(id, direction);
        }
    }
}
