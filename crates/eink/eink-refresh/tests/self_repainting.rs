//! Trace-driven repaints on a self-repainting book surface.

// Test file: unwrap/expect/panic acceptable in test code.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use eink_protocol::Region;
use eink_refresh::{RefreshConfig, RefreshEvent, RefreshManager};
use eink_testing::{DisplayCall, ManualClock, RecordingDisplay};

const W: u32 = 954;
const H: u32 = 1696;

type Engine = RefreshManager<RecordingDisplay, ManualClock>;

fn repainting_engine(config: RefreshConfig) -> (Engine, ManualClock) {
    let clock = ManualClock::new();
    let mut e = RefreshManager::with_config("dedao", RecordingDisplay::new(), clock.clone(), W, H, config);
    e.set_self_repainting(true);
    e.set_book_page(true);
    (e, clock)
}

fn engine() -> (Engine, ManualClock) {
    repainting_engine(RefreshConfig::default())
}

fn note(e: &mut Engine, reason: &str) {
    e.parse_js_events(&format!(r#"[{{"t":"trace","reason":"{reason}"}}]"#));
}

fn scroll_note(e: &mut Engine, delta: i32, click_seq: i64) {
    e.parse_js_events(&format!(
        r#"[{{"t":"trace","reason":"scroll_event","delta":{delta},"clickSeq":{click_seq}}}]"#
    ));
}

fn du() -> DisplayCall {
    DisplayCall::Ui(Region::full_screen(W, H))
}

#[test]
fn dom_and_scroll_records_are_dropped() {
    let (mut e, _) = engine();
    e.parse_js_events(r#"[{"t":"dom","s":500},{"t":"scroll","d":300}]"#);
    assert_eq!(e.queue_len(), 0);
    assert_eq!(e.next_deadline(), None);
    assert_eq!(e.stats().events_pushed, 0);

    e.set_book_page(false);
    e.parse_js_events(r#"[{"t":"dom","s":500}]"#);
    assert_eq!(e.queue_len(), 1);
}

#[test]
fn trace_notes_are_ignored_elsewhere() {
    let clock = ManualClock::new();
    let mut plain = RefreshManager::new("weread", RecordingDisplay::new(), clock.clone(), W, H);
    plain.set_book_page(true);
    note(&mut plain, "content_ready");
    plain.trigger_menu_hidden();
    assert_eq!(plain.display().call_count(), 0);

    let (mut e, _) = engine();
    e.set_book_page(false);
    note(&mut e, "content_ready");
    assert_eq!(e.display().call_count(), 0);
}

#[test]
fn content_ready_repaints_now_and_is_throttled() {
    let (mut e, clock) = engine();
    note(&mut e, "content_ready");
    assert_eq!(e.display().calls(), &[du()]);

    clock.advance_ms(100);
    note(&mut e, "content_ready");
    e.trigger_menu_hidden();
    assert_eq!(e.display().call_count(), 1);
    assert_eq!(e.stats().throttled_repaints, 2);

    clock.advance_ms(150);
    e.trigger_menu_hidden();
    assert_eq!(e.display().call_count(), 2);
    assert_eq!(e.stats().repaints, 2);
    assert_eq!(e.du_count(), 2);
}

#[test]
fn scroll_note_repaints_after_delay_then_every_second() {
    let (mut e, clock) = engine();
    scroll_note(&mut e, 40, 1);
    assert_eq!(e.display().call_count(), 0);
    assert_eq!(e.repaint_series_remaining(), 5);

    clock.advance_ms(49);
    e.poll();
    assert_eq!(e.display().call_count(), 0);
    clock.advance_ms(1);
    e.poll();
    assert_eq!(e.display().calls(), &[du()]);

    // More notes for the same click change nothing.
    scroll_note(&mut e, 80, 1);
    clock.advance_ms(950);
    e.poll();
    assert_eq!(e.display().call_count(), 2);

    for expected in 3..=6 {
        clock.advance_ms(1_000);
        e.poll();
        assert_eq!(e.display().call_count(), expected);
    }
    assert_eq!(e.repaint_series_remaining(), 0);

    clock.advance_ms(5_000);
    e.poll();
    assert_eq!(e.display().call_count(), 6);
    assert!(e.display().calls().iter().all(|c| *c == du()));
}

#[test]
fn upward_scroll_schedules_nothing() {
    let (mut e, _) = engine();
    scroll_note(&mut e, -40, 1);
    assert_eq!(e.next_deadline(), None);
}

#[test]
fn new_click_skips_throttle_once() {
    let (mut e, clock) = engine();
    note(&mut e, "content_ready");
    scroll_note(&mut e, 10, 4);
    clock.advance_ms(50);
    e.poll();
    assert_eq!(e.display().call_count(), 2);

    // Without a click sequence the delayed repaint is throttled.
    let (mut e, clock) = engine();
    note(&mut e, "content_ready");
    e.parse_js_events(r#"[{"t":"trace","reason":"scroll_event","delta":10}]"#);
    clock.advance_ms(50);
    e.poll();
    assert_eq!(e.display().call_count(), 1);
    assert_eq!(e.stats().throttled_repaints, 1);
}

#[test]
fn mutation_and_idle_notes_are_debounced_not_throttled() {
    let (mut e, clock) = engine();
    note(&mut e, "content_ready");

    note(&mut e, "dom_mutation");
    clock.advance_ms(30);
    note(&mut e, "dom_mutation_chapter");
    clock.advance_ms(20);
    e.poll();
    assert_eq!(e.display().call_count(), 1);

    clock.advance_ms(30);
    e.poll();
    assert_eq!(e.display().call_count(), 2);

    note(&mut e, "scroll_idle");
    clock.advance_ms(50);
    e.poll();
    assert_eq!(e.display().call_count(), 3);
    assert_eq!(e.stats().throttled_repaints, 0);
}

#[test]
fn page_turn_cancels_scroll_repaints() {
    let (mut e, clock) = engine();
    scroll_note(&mut e, 40, 1);
    note(&mut e, "scroll_idle");
    e.trigger_page_turn();
    assert_eq!(e.queue_len(), 0);
    assert_eq!(e.repaint_series_remaining(), 0);

    // The idle repaint is not a scroll follow-up.
    clock.advance_ms(5_000);
    e.poll();
    assert_eq!(e.display().calls(), &[du()]);
}

#[test]
fn leaving_book_mode_cancels_everything() {
    let (mut e, clock) = engine();
    scroll_note(&mut e, 40, 1);
    note(&mut e, "dom_mutation");
    e.set_book_page(false);
    assert_eq!(e.next_deadline(), None);

    clock.advance_ms(5_000);
    e.poll();
    assert_eq!(e.display().call_count(), 0);
}

#[test]
fn accumulated_risk_turns_a_repaint_into_full_refresh() {
    let (mut e, clock) = repainting_engine(RefreshConfig {
        ghosting_cleanup_threshold: 0.045,
        ..RefreshConfig::default()
    });
    for _ in 0..5 {
        note(&mut e, "content_ready");
        clock.advance_ms(250);
    }
    assert_eq!(e.display().call_count(), 5);
    assert_eq!(e.display().last_call(), Some(du()));

    note(&mut e, "content_ready");
    assert_eq!(e.display().last_call(), Some(DisplayCall::Full { width: W, height: H }));
    assert_eq!(e.ghosting_risk(), 0.0);
    assert_eq!(e.du_count(), 0);
}

#[test]
fn refresh_counters_do_not_force_cleanup() {
    let (mut e, clock) = engine();
    for _ in 0..12 {
        note(&mut e, "content_ready");
        clock.advance_ms(250);
    }
    assert_eq!(e.du_count(), 12);
    assert!(!e.display().calls().iter().any(DisplayCall::is_full));

    e.trigger_menu();
    assert_eq!(e.display().last_call(), Some(DisplayCall::Partial(Region::full_screen(W, H))));
    assert_eq!(e.stats().forced_cleanups, 0);
}

#[test]
fn last_score_gate_is_relaxed() {
    let (mut e, clock) = engine();
    e.push_event(RefreshEvent::dom_change(50, None));
    clock.advance_ms(200);
    e.poll();
    e.push_event(RefreshEvent::dom_change(40, None));
    clock.advance_ms(200);
    e.poll();

    assert_eq!(e.display().call_count(), 2);
    assert_eq!(e.stats().anti_thrash_skips, 0);
}
