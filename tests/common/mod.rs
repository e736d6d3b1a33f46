// Shared harness for the integration tests: a kit wired to a scripted
// transport and an in-memory history, so every request and completion is
// driven explicitly by the test.

#![allow(dead_code)]

use std::rc::Rc;

use simkit::core::{
    request::{RequestId, RequestSpec},
    runtime::Router,
    Bus, Kit, KitConfig, MemoryHistory, ScriptedTransport, Session,
};
use simkit::protocol::Location;

pub fn kit_with(raw: &str, config: KitConfig, router: Router) -> (Kit, ScriptedTransport) {
    let bus = Bus::new();
    let transport = ScriptedTransport::new(bus.completion_tx.clone());
    let mut kit = Kit::new(
        config,
        Session::default(),
        Box::new(transport.clone()),
        bus,
        Box::new(MemoryHistory::new(Location::parse(raw))),
        router,
    );
    kit.start();
    kit.pump();
    (kit, transport)
}

/// Kit running the real pages.
pub fn kit_at(raw: &str) -> (Kit, ScriptedTransport) {
    kit_with(raw, KitConfig::default(), simkit::pages::router())
}

pub fn router(route: impl Fn(&mut Kit, &Location) + 'static) -> Router {
    Rc::new(route)
}

pub fn last(transport: &ScriptedTransport) -> (RequestId, RequestSpec) {
    transport.last().expect("a request was sent")
}

pub fn urls(transport: &ScriptedTransport) -> Vec<String> {
    transport.sent().into_iter().map(|(_, spec)| spec.url).collect()
}

/// Body of a log chunk response.
pub fn log_body(offset: u64, text: &str) -> String {
    let hex: String = text.bytes().map(|b| format!("{b:02x}")).collect();
    format!("{offset}\n{hex}\n")
}
