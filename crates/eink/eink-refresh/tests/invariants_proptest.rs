//! Property-based tests for engine bookkeeping.
//!
//! The recorded driver calls are the ground truth: counters and ghosting risk
//! reported by the engine must always agree with what was actually issued.

// Test file: unwrap/expect/panic acceptable in test code.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use eink_refresh::{DirtyRect, EventKind, PolicyMode, RefreshEvent, RefreshManager};
use eink_testing::{DisplayCall, ManualClock, RecordingDisplay};
use proptest::prelude::*;

const W: u32 = 954;
const H: u32 = 1696;

#[derive(Debug, Clone)]
enum Op {
    Push(RefreshEvent),
    Advance(u64),
    SetBook(bool),
    ResetClick,
    Flush,
}

fn rect() -> impl Strategy<Value = Option<DirtyRect>> {
    proptest::option::of((-50i32..1000, -50i32..1800, 0i32..1000, 0i32..1800))
        .prop_map(|r| r.map(|(x, y, w, h)| DirtyRect::new(x, y, w, h)))
}

fn event() -> impl Strategy<Value = RefreshEvent> {
    prop_oneof![
        4 => (0i32..400, rect()).prop_map(|(s, r)| RefreshEvent::dom_change(s, r)),
        3 => (-400i32..400).prop_map(RefreshEvent::scroll),
        1 => Just(RefreshEvent::new(EventKind::PageTurn)),
        1 => Just(RefreshEvent::new(EventKind::LoadFinished)),
        1 => Just(RefreshEvent::new(EventKind::Menu)),
        1 => Just(RefreshEvent::new(EventKind::BurstEnd)),
        1 => Just(RefreshEvent::new(EventKind::ContentReady)),
        1 => Just(RefreshEvent::new(EventKind::Idle)),
    ]
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => event().prop_map(Op::Push),
        3 => (0u64..3_000).prop_map(Op::Advance),
        1 => any::<bool>().prop_map(Op::SetBook),
        1 => Just(Op::ResetClick),
        1 => Just(Op::Flush),
    ]
}

fn apply(e: &mut RefreshManager<RecordingDisplay, ManualClock>, clock: &ManualClock, op: &Op) {
    match op {
        Op::Push(ev) => e.push_event(*ev),
        Op::Advance(ms) => {
            clock.advance_ms(*ms);
            e.poll();
        }
        Op::SetBook(b) => e.set_book_page(*b),
        Op::ResetClick => e.reset_score_threshold(),
        Op::Flush => e.flush(),
    }
}

/// (partial-class, DU) calls issued since the last full refresh, and whether
/// any non-full call happened since then.
fn since_last_full(calls: &[DisplayCall]) -> (u32, u32, bool) {
    let tail = calls
        .iter()
        .rposition(DisplayCall::is_full)
        .map_or(calls, |i| calls.get(i + 1..).unwrap());
    let partial = tail
        .iter()
        .filter(|c| matches!(c, DisplayCall::Partial(_) | DisplayCall::Scroll { .. }))
        .count();
    let du = tail.iter().filter(|c| matches!(c, DisplayCall::Ui(_))).count();
    (partial as u32, du as u32, !tail.is_empty())
}

fn flush_with(policy: PolicyMode, payload: &str) -> Vec<DisplayCall> {
    let clock = ManualClock::new();
    let mut e = RefreshManager::new("prop", RecordingDisplay::new(), clock, W, H);
    e.set_policy(policy);
    e.parse_js_events(payload);
    e.flush();
    e.display().calls().to_vec()
}

fn policy() -> impl Strategy<Value = PolicyMode> {
    prop_oneof![
        Just(PolicyMode::ReadingFirst),
        Just(PolicyMode::InteractionFirst),
        Just(PolicyMode::Balanced),
    ]
}

proptest::proptest! {
    /// Counters and risk always match the calls actually issued.
    #[test]
    fn bookkeeping_matches_issued_calls(ops in proptest::collection::vec(op(), 1..80)) {
        let clock = ManualClock::new();
        let mut e = RefreshManager::new("prop", RecordingDisplay::new(), clock.clone(), W, H);

        for op in &ops {
            apply(&mut e, &clock, op);

            let (partial, du, dirty) = since_last_full(e.display().calls());
            prop_assert_eq!(e.partial_count(), partial);
            prop_assert_eq!(e.du_count(), du);

            prop_assert!(e.ghosting_risk() >= 0.0);
            if dirty {
                prop_assert!(e.ghosting_risk() > 0.0);
            } else {
                prop_assert_eq!(e.ghosting_risk(), 0.0);
            }

            prop_assert_eq!(e.needs_cleanup(), partial >= 10 || du >= 10);
        }
    }

    /// Letting time pass with nothing queued never touches the display.
    #[test]
    fn empty_windows_are_no_ops(steps in proptest::collection::vec(0u64..120_000, 1..20)) {
        let clock = ManualClock::new();
        let mut e = RefreshManager::new("prop", RecordingDisplay::new(), clock.clone(), W, H);
        for ms in steps {
            clock.advance_ms(ms);
            e.poll();
        }
        prop_assert_eq!(e.display().call_count(), 0);
        prop_assert_eq!(e.partial_count(), 0);
        prop_assert_eq!(e.stats().batches_processed, 0);
    }

    /// Two DOM changes in one batch decide like one change with the summed
    /// score.
    #[test]
    fn dom_scores_aggregate(policy in policy(), a in 0i32..300, b in 0i32..300) {
        let split = flush_with(policy, &format!(r#"[{{"t":"dom","s":{a}}},{{"t":"dom","s":{b}}}]"#));
        let summed = flush_with(policy, &format!(r#"[{{"t":"dom","s":{}}}]"#, a + b));
        prop_assert_eq!(split, summed);
    }

    /// Same for scroll deltas.
    #[test]
    fn scroll_deltas_aggregate(policy in policy(), a in -300i32..300, b in -300i32..300) {
        let split = flush_with(policy, &format!(r#"[{{"t":"scroll","d":{a}}},{{"t":"scroll","d":{b}}}]"#));
        let summed = flush_with(policy, &format!(r#"[{{"t":"scroll","d":{}}}]"#, a + b));
        prop_assert_eq!(split, summed);
    }
}
