// Log tails through the logs page, plus the decoding and colouring they
// rely on.

mod common;

use std::time::Duration;

use common::{kit_at, last, log_body, urls};
use simkit::core::{
    colorize::{colorize, plain_text, Markup},
    decoder::HexUtf8Decoder,
    log_stream::LogPhase,
    request::Method,
    Kit, NodeId, ScriptedTransport,
};

fn log_region(kit: &Kit) -> NodeId {
    let view = kit.current_view().unwrap();
    let doc = kit.document();
    doc.panel_content(view)
        .into_iter()
        .find(|id| doc.log(*id).is_some())
        .expect("a log on the page")
}

fn log_text(kit: &Kit, region: NodeId) -> String {
    plain_text(&kit.document().log(region).unwrap().markup)
}

fn hex(text: &str) -> String {
    text.bytes().map(|b| format!("{b:02x}")).collect()
}

/// Job log with "first\n" at offset 0 and "old line\n" at offset 10.
fn loaded_job_log() -> (Kit, ScriptedTransport, NodeId) {
    let (mut kit, transport) = kit_at("/logs");
    let (id, spec) = last(&transport);
    assert_eq!(spec.method, Method::Post);
    assert_eq!(spec.url, "/api/logs/jobs");
    transport.respond(id, &log_body(10, "old line\n"));
    kit.pump();

    let (id, spec) = last(&transport);
    assert_eq!(spec.url, "/api/logs/jobs?10");
    transport.respond(id, &log_body(0, "first\n"));
    kit.pump();

    let region = log_region(&kit);
    assert_eq!(log_text(&kit, region), "first\nold line\n");
    (kit, transport, region)
}

#[test]
fn test_rotated_log_starts_over() {
    let (mut kit, transport, region) = loaded_job_log();
    assert_eq!(kit.log_stream(region).unwrap().first_offset(), Some(10));

    let start = kit.now();
    kit.tick(start);
    kit.tick(start + Duration::from_millis(2000));
    let (id, spec) = last(&transport);
    assert_eq!(spec.url, "/api/logs/jobs");

    transport.respond(id, &log_body(50, "rotated\n"));
    kit.pump();
    assert_eq!(log_text(&kit, region), "rotated\n");
    assert_eq!(kit.log_stream(region).unwrap().first_offset(), Some(50));
    // The fresh log is shorter than the view, so older text is fetched again.
    assert_eq!(last(&transport).1.url, "/api/logs/jobs?50");
}

#[test]
fn test_poll_without_changes_keeps_text() {
    let (mut kit, transport, region) = loaded_job_log();
    let start = kit.now();
    kit.tick(start);
    kit.tick(start + Duration::from_millis(2500));
    let (id, _) = last(&transport);

    transport.respond(id, &log_body(10, "old line\n"));
    kit.pump();
    assert_eq!(log_text(&kit, region), "first\nold line\n");
    assert_eq!(kit.log_stream(region).unwrap().phase(), LogPhase::Idle);
    assert_eq!(transport.sent().len(), 3);
}

#[test]
fn test_no_poll_without_auto_refresh_or_before_interval() {
    let (mut kit, transport, region) = loaded_job_log();
    let start = kit.now();
    kit.tick(start);
    kit.tick(start + Duration::from_millis(500));
    assert_eq!(transport.sent().len(), 2);

    kit.toggle_auto_refresh(region);
    kit.tick(start + Duration::from_millis(5000));
    assert_eq!(transport.sent().len(), 2);
}

#[test]
fn test_web_log_tab_via_location() {
    let (kit, transport) = kit_at("/logs#Server%20(web)");
    assert_eq!(urls(&transport), ["/api/logs/web"]);
    let region = log_region(&kit);
    assert!(!kit.document().log(region).unwrap().auto_refresh);
}

#[test]
fn test_switching_tab_stops_old_stream() {
    let (mut kit, transport, region) = loaded_job_log();
    let view = kit.current_view().unwrap();
    let menu = kit.tab_menus_in(view)[0];
    kit.select_tab(menu, 0);
    assert!(kit.log_stream(region).is_none());
    assert_eq!(last(&transport).1.url, "/api/logs/web");
}

#[test]
fn test_decoder_split_points_do_not_matter() {
    let text = "ok ✓ žluťoučký 😀\nnext\n";
    let encoded = hex(text);
    let mut whole = HexUtf8Decoder::new();
    let expected = whole.feed(&encoded).unwrap();
    assert_eq!(expected, text);

    for first in (0..=encoded.len()).step_by(2) {
        for second in (first..=encoded.len()).step_by(2) {
            let mut decoder = HexUtf8Decoder::new();
            let mut out = String::new();
            for part in [&encoded[..first], &encoded[first..second], &encoded[second..]] {
                out.push_str(&decoder.feed(part).unwrap());
            }
            assert_eq!(out, expected, "split at {first}/{second}");
        }
    }
}

#[test]
fn test_colorize_is_idempotent() {
    let raw = "\u{1b}[1;31merror\u{1b}[m plain \u{1b}[32mok\u{1b}[m\n\u{1b}[33mwarn\n";
    let once = colorize(&[Markup::Text(raw.to_string())], raw.len());
    let twice = colorize(&once, raw.len());
    assert_eq!(once, twice);
    assert_eq!(plain_text(&once), "error plain ok\nwarn\n");
}
