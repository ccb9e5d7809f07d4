//! Trace-driven repaints
//!
//! Some reading surfaces repaint their own pages (canvas renderers,
//! virtualised chapters) in ways the DOM observer cannot score. On such a
//! surface in book mode, DOM and scroll records are ignored and the page
//! script's trace notes schedule plain full-screen DU refreshes instead:
//!
//! | Note            | Repaint                                               |
//! |-----------------|-------------------------------------------------------|
//! | `scroll_event`  | once per click, after the delay, then a 1 s series    |
//! | `scroll_idle`   | after the delay, re-armed by every note, not throttled |
//! | `dom_mutation*` | after the delay, re-armed by every note, not throttled |
//! | `content_ready` | immediately                                           |
//!
//! Everything else goes through a throttle: a repaint closer than the
//! throttle window to the previous one is dropped. The first scroll repaint
//! of a new click skips the throttle once.

use std::time::Instant;

use crate::config::RepaintConfig;
use crate::engine::deadline_after;
use crate::js_events::{TraceReason, TraceRecord};

/// Why a trace-driven repaint was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepaintReason {
    /// Delayed repaint after a scroll note
    ScrollDelta,
    /// Scrolling stopped
    ScrollIdle,
    /// Book content mutated
    DomMutation,
    /// Content finished rendering
    ContentReady,
    /// Follow-up series after a scroll note
    ScrollSeries,
    /// A menu overlay was hidden
    MenuHidden,
}

impl RepaintReason {
    /// Name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            RepaintReason::ScrollDelta => "scroll_delta",
            RepaintReason::ScrollIdle => "scroll_idle",
            RepaintReason::DomMutation => "dom_mutation",
            RepaintReason::ContentReady => "content_ready",
            RepaintReason::ScrollSeries => "scroll_series",
            RepaintReason::MenuHidden => "menu_hidden",
        }
    }

    /// Reasons that are never throttled.
    pub fn bypasses_throttle(&self) -> bool {
        matches!(self, RepaintReason::ScrollIdle | RepaintReason::DomMutation)
    }
}

/// Pending repaint deadlines and throttle state for one surface.
#[derive(Debug, Default)]
pub(crate) struct RepaintSchedule {
    delayed: Option<Instant>,
    scroll_idle: Option<Instant>,
    mutation: Option<Instant>,
    series: Option<Instant>,
    series_remaining: u32,
    last_click_seq: Option<i64>,
    click_handled: bool,
    bypass_once: bool,
    last_repaint: Option<Instant>,
}

impl RepaintSchedule {
    /// Account for one trace note. Returns a reason to repaint right away.
    pub(crate) fn on_trace(
        &mut self,
        trace: &TraceRecord,
        now: Instant,
        config: &RepaintConfig,
    ) -> Option<RepaintReason> {
        match trace.reason {
            TraceReason::ScrollEvent => {
                if let Some(seq) = trace.click_seq {
                    if self.last_click_seq != Some(seq) {
                        self.last_click_seq = Some(seq);
                        self.click_handled = false;
                        self.bypass_once = true;
                    }
                }
                if trace.delta >= 0 && !self.click_handled {
                    self.delayed = Some(deadline_after(now, config.delay()));
                    self.start_series(now, config);
                    self.click_handled = true;
                }
                None
            }
            TraceReason::ScrollIdle => {
                self.scroll_idle = Some(deadline_after(now, config.delay()));
                None
            }
            TraceReason::DomMutation => {
                self.mutation = Some(deadline_after(now, config.delay()));
                None
            }
            TraceReason::ContentReady => Some(RepaintReason::ContentReady),
            TraceReason::Other => None,
        }
    }

    fn start_series(&mut self, now: Instant, config: &RepaintConfig) {
        self.series_remaining = config.series_repeats;
        self.series = (config.series_repeats > 0)
            .then(|| deadline_after(now, config.series_interval()));
    }

    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        [self.delayed, self.scroll_idle, self.mutation, self.series]
            .into_iter()
            .flatten()
            .min()
    }

    /// Disarm every deadline that has passed and return their reasons.
    pub(crate) fn take_due(&mut self, now: Instant, config: &RepaintConfig) -> Vec<RepaintReason> {
        let mut due = Vec::new();
        if take_if_due(&mut self.delayed, now) {
            due.push(RepaintReason::ScrollDelta);
        }
        if take_if_due(&mut self.scroll_idle, now) {
            due.push(RepaintReason::ScrollIdle);
        }
        if take_if_due(&mut self.mutation, now) {
            due.push(RepaintReason::DomMutation);
        }
        if take_if_due(&mut self.series, now) && self.series_remaining > 0 {
            self.series_remaining = self.series_remaining.saturating_sub(1);
            due.push(RepaintReason::ScrollSeries);
            if self.series_remaining > 0 {
                self.series = Some(deadline_after(now, config.series_interval()));
            }
        }
        due
    }

    /// Throttle check. Records `now` as the last repaint when admitted.
    pub(crate) fn admit(&mut self, reason: RepaintReason, now: Instant, config: &RepaintConfig) -> bool {
        let bypass_once = self.bypass_once && reason == RepaintReason::ScrollDelta;
        if bypass_once {
            self.bypass_once = false;
        }
        let throttled = !reason.bypasses_throttle()
            && !bypass_once
            && self
                .last_repaint
                .is_some_and(|t| now.saturating_duration_since(t) < config.throttle());
        if throttled {
            return false;
        }
        self.last_repaint = Some(now);
        true
    }

    /// Drop the scroll follow-ups (delayed repaint and series).
    pub(crate) fn cancel_scroll_follow_ups(&mut self) {
        self.delayed = None;
        self.series = None;
        self.series_remaining = 0;
    }

    /// Drop every pending deadline.
    pub(crate) fn cancel_all(&mut self) {
        self.cancel_scroll_follow_ups();
        self.scroll_idle = None;
        self.mutation = None;
    }

    pub(crate) fn series_remaining(&self) -> u32 {
        self.series_remaining
    }
}

fn take_if_due(deadline: &mut Option<Instant>, now: Instant) -> bool {
    if deadline.is_some_and(|d| now >= d) {
        *deadline = None;
        true
    } else {
        false
    }
}
