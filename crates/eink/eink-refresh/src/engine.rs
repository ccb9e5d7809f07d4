//! Refresh decision engine
//!
//! Coalesces a noisy stream of [`RefreshEvent`]s into few display refreshes.
//!
//! # Timing model
//!
//! The engine never sleeps and never spawns. It keeps up to three deadlines
//! and the host loop calls [`RefreshManager::poll`] whenever
//! [`RefreshManager::next_deadline`] has passed:
//!
//! | Deadline   | Armed by                          | On expiry                          |
//! |------------|-----------------------------------|------------------------------------|
//! | batch      | first queued event of a batch     | decide + execute the whole queue   |
//! | idle       | every pushed event                | push IDLE if ghosting is high      |
//! | post-click | first refresh after a click reset | one DU sweep, re-armed N times     |
//!
//! Self-repainting surfaces keep a fourth set of deadlines for trace-driven
//! repaints, see [`crate::repaint`].
//!
//! MENU, LOAD_FINISHED, BURST_END and CONTENT_READY process the queue as soon
//! as they are pushed. The batch deadline stays armed and fires later on an
//! empty queue, which is a no-op.
//!
//! # Queue retention
//!
//! The queue is cleared whenever a refresh is dispatched. A skipped batch is
//! dropped on browsing surfaces. On book surfaces it is folded into a single
//! carry-over event, so the next batch is judged on the accumulated score
//! while the queue stays bounded.

use std::time::{Duration, Instant};

use eink_protocol::{Clock, DisplayProtocol, MonotonicClock, Region};

use crate::config::RefreshConfig;
use crate::event::{DirtyRect, EventKind, RefreshEvent};
use crate::js_events::{self, PageRecord};
use crate::policy::{PolicyMode, WaveformChoice};
use crate::repaint::{RepaintReason, RepaintSchedule};
use crate::stats::RefreshStats;

/// Maximum supplemental refreshes honoured per click.
const MAX_CLICK_REFRESHES: u8 = 2;

/// Aggregate view of one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Sum of DOM change scores
    pub total_score: i32,
    /// Sum of signed scroll deltas
    pub total_scroll: i32,
    /// At least one DOM change is queued
    pub has_dom: bool,
    kinds: u8,
}

impl BatchSummary {
    /// Summarise `events`.
    pub fn of(events: &[RefreshEvent]) -> Self {
        events.iter().fold(Self::default(), |acc, e| Self {
            total_score: acc.total_score.saturating_add(e.score),
            total_scroll: acc.total_scroll.saturating_add(e.scroll_delta),
            has_dom: acc.has_dom || e.kind == EventKind::DomChange,
            kinds: acc.kinds | e.kind.bit(),
        })
    }

    /// True if an event of `kind` is in the batch.
    pub fn contains(&self, kind: EventKind) -> bool {
        self.kinds & kind.bit() != 0
    }
}

/// Outcome of the reading-policy score gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClickGate {
    /// First refresh after a click, or a supplemental one that earned it.
    Honor,
    /// No click bookkeeping applies; fall through to the score tiers.
    Open,
    /// Vetoed.
    Skip(&'static str),
}

/// Per-surface refresh decision engine.
///
/// Owns a handle to the display (typically a
/// [`SharedDisplay`](eink_protocol::SharedDisplay) clone) and all of the
/// surface's ghosting bookkeeping. Two engines driving the same panel never
/// share risk, counters or queues.
pub struct RefreshManager<D: DisplayProtocol, C: Clock = MonotonicClock> {
    tag: String,
    display: D,
    clock: C,
    config: RefreshConfig,
    width: u32,
    height: u32,

    queue: Vec<RefreshEvent>,
    policy: PolicyMode,
    is_book_page: bool,

    ghosting_risk: f32,
    partial_count: u32,
    du_count: u32,
    last_refresh: Option<Instant>,
    last_full_refresh: Option<Instant>,

    last_refresh_score: i32,
    click_pending: bool,
    click_refresh_count: Option<u8>,

    post_click_enabled: bool,
    post_click_armed: bool,
    post_click_remaining: u32,

    batch_deadline: Option<Instant>,
    idle_deadline: Option<Instant>,
    post_click_deadline: Option<Instant>,

    self_repainting: bool,
    repaint: RepaintSchedule,

    stats: RefreshStats,
}

impl<D: DisplayProtocol, C: Clock> RefreshManager<D, C> {
    /// Engine with the default configuration.
    pub fn new(tag: impl Into<String>, display: D, clock: C, width: u32, height: u32) -> Self {
        Self::with_config(tag, display, clock, width, height, RefreshConfig::default())
    }

    /// Engine with a custom configuration.
    pub fn with_config(
        tag: impl Into<String>,
        display: D,
        clock: C,
        width: u32,
        height: u32,
        config: RefreshConfig,
    ) -> Self {
        Self {
            tag: tag.into(),
            display,
            clock,
            config,
            width,
            height,
            queue: Vec::new(),
            policy: PolicyMode::default(),
            is_book_page: false,
            ghosting_risk: 0.0,
            partial_count: 0,
            du_count: 0,
            last_refresh: None,
            last_full_refresh: None,
            last_refresh_score: 0,
            click_pending: false,
            click_refresh_count: None,
            post_click_enabled: true,
            post_click_armed: false,
            post_click_remaining: 0,
            batch_deadline: None,
            idle_deadline: None,
            post_click_deadline: None,
            self_repainting: false,
            repaint: RepaintSchedule::default(),
            stats: RefreshStats::default(),
        }
    }

    // ── Producer API ──────────────────────────────────────────────────────────

    /// Queue one event.
    ///
    /// Re-arms the idle deadline. Flush kinds process the queue immediately;
    /// anything else arms the batch deadline if it is not already running.
    pub fn push_event(&mut self, event: RefreshEvent) {
        let now = self.clock.now();
        self.queue.push(event);
        RefreshStats::bump(&mut self.stats.events_pushed);
        self.idle_deadline = Some(deadline_after(now, self.config.idle_timeout()));

        tracing::debug!(
            tag = %self.tag,
            kind = event.kind.name(),
            score = event.score,
            scroll = event.scroll_delta,
            region = %RegionLog(event.region),
            queue = self.queue.len(),
            book = self.is_book_page,
            click_pending = self.click_pending,
            click_refreshes = ?self.click_refresh_count,
            last_score = self.last_refresh_score,
            "push event"
        );

        if event.kind.flushes_immediately() {
            self.process_batch();
        } else if self.batch_deadline.is_none() {
            self.batch_deadline = Some(deadline_after(now, self.config.batch_window()));
        }
    }

    /// Parse a page-script payload and queue its events in order.
    ///
    /// A malformed payload is logged and nothing is queued. On a
    /// self-repainting surface in book mode, DOM and scroll records are
    /// dropped and trace notes drive repaints instead.
    pub fn parse_js_events(&mut self, json: &str) {
        match js_events::parse_records(json) {
            Ok(records) => {
                for record in records {
                    self.handle_record(record);
                }
            }
            Err(e) => {
                RefreshStats::bump(&mut self.stats.malformed_payloads);
                tracing::warn!(tag = %self.tag, error = %e, payload = json, "malformed event payload");
            }
        }
    }

    /// Queue a page turn.
    ///
    /// A self-repainting surface in book mode draws the new page itself; the
    /// turn only cancels pending scroll repaints there.
    pub fn trigger_page_turn(&mut self) {
        if self.repaint_active() {
            self.repaint.cancel_scroll_follow_ups();
            tracing::debug!(tag = %self.tag, "page turn: scroll repaints cancelled");
            return;
        }
        self.push_event(EventKind::PageTurn.into());
    }

    /// Queue a load-finished event (flushes immediately).
    pub fn trigger_load_finished(&mut self) {
        self.push_event(EventKind::LoadFinished.into());
    }

    /// Queue a menu open/close (flushes immediately).
    pub fn trigger_menu(&mut self) {
        self.push_event(EventKind::Menu.into());
    }

    /// Queue a burst end (flushes immediately).
    pub fn trigger_burst_end(&mut self) {
        self.push_event(EventKind::BurstEnd.into());
    }

    /// Queue a content-ready event (flushes immediately).
    pub fn trigger_content_ready(&mut self) {
        self.push_event(EventKind::ContentReady.into());
    }

    /// A menu overlay was hidden. Repaints a self-repainting surface in book
    /// mode (throttled); no-op elsewhere.
    pub fn trigger_menu_hidden(&mut self) {
        self.trace_repaint(RepaintReason::MenuHidden);
    }

    /// Mark the surface as book-like or not.
    ///
    /// Book surfaces use [`PolicyMode::ReadingFirst`], others
    /// [`PolicyMode::InteractionFirst`]. Leaving book mode drops all click
    /// bookkeeping and cancels any post-click series.
    pub fn set_book_page(&mut self, is_book: bool) {
        self.is_book_page = is_book;
        self.policy = if is_book {
            PolicyMode::ReadingFirst
        } else {
            PolicyMode::InteractionFirst
        };
        if !is_book {
            self.last_refresh_score = 0;
            self.click_pending = false;
            self.click_refresh_count = None;
            self.post_click_armed = false;
            self.cancel_post_click();
            self.repaint.cancel_all();
        }
        tracing::info!(tag = %self.tag, book = is_book, policy = self.policy.name(), "surface type changed");
    }

    /// Select a policy explicitly.
    pub fn set_policy(&mut self, policy: PolicyMode) {
        self.policy = policy;
    }

    /// Mark the surface as one that repaints its own pages.
    ///
    /// Takes effect while the surface is in book mode: DOM and scroll
    /// records are dropped, trace notes schedule throttled DU repaints, and
    /// the last-score gate and counter-based cleanup are relaxed. Disabling
    /// cancels pending repaints.
    pub fn set_self_repainting(&mut self, enabled: bool) {
        self.self_repainting = enabled;
        if !enabled {
            self.repaint.cancel_all();
        }
        tracing::info!(tag = %self.tag, enabled, "self-repainting surface");
    }

    /// Enable or disable post-click sweeps. Disabling cancels a pending or
    /// running series.
    pub fn set_post_click_enabled(&mut self, enabled: bool) {
        if self.post_click_enabled == enabled {
            return;
        }
        self.post_click_enabled = enabled;
        if !enabled {
            self.post_click_armed = false;
            self.cancel_post_click();
        }
    }

    /// Note an explicit user click or page turn on a book surface.
    ///
    /// Clears the last refresh score, honours the next DOM batch regardless
    /// of score and arms a post-click sweep for the next dispatched refresh.
    /// Ignored on browsing surfaces.
    pub fn reset_score_threshold(&mut self) {
        if !self.is_book_page {
            return;
        }
        self.last_refresh_score = 0;
        self.click_pending = true;
        self.click_refresh_count = Some(0);
        self.post_click_armed = self.post_click_enabled;
        self.cancel_post_click();
        tracing::debug!(tag = %self.tag, "score threshold reset by click");
    }

    // ── Host loop API ─────────────────────────────────────────────────────────

    /// Earliest armed deadline, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        [
            self.batch_deadline,
            self.post_click_deadline,
            self.idle_deadline,
            self.repaint.next_deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// Run everything whose deadline has passed.
    pub fn poll(&mut self) {
        let now = self.clock.now();

        if is_due(self.batch_deadline, now) {
            self.batch_deadline = None;
            self.process_batch();
        }
        if is_due(self.post_click_deadline, now) {
            self.fire_post_click(now);
        }
        if is_due(self.idle_deadline, now) {
            self.idle_deadline = None;
            self.on_idle();
        }
        let repaint = self.config.repaint;
        for reason in self.repaint.take_due(now, &repaint) {
            self.trace_repaint(reason);
        }
    }

    /// Process the queue now without waiting for the batch window.
    pub fn flush(&mut self) {
        self.batch_deadline = None;
        self.process_batch();
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    /// Surface tag used in logs.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Active policy.
    pub fn policy(&self) -> PolicyMode {
        self.policy
    }

    /// Whether the surface is book-like.
    pub fn is_book_page(&self) -> bool {
        self.is_book_page
    }

    /// Whether the surface is marked self-repainting.
    pub fn self_repainting(&self) -> bool {
        self.self_repainting
    }

    /// Repaints left in the scroll follow-up series.
    pub fn repaint_series_remaining(&self) -> u32 {
        self.repaint.series_remaining()
    }

    /// Accumulated ghosting risk since the last full refresh.
    pub fn ghosting_risk(&self) -> f32 {
        self.ghosting_risk
    }

    /// GC16 partial + GL16 refreshes since the last full refresh.
    pub fn partial_count(&self) -> u32 {
        self.partial_count
    }

    /// DU refreshes since the last full refresh.
    pub fn du_count(&self) -> u32 {
        self.du_count
    }

    /// True when either counter has reached its configured maximum.
    pub fn needs_cleanup(&self) -> bool {
        self.partial_count >= self.config.max_partial_before_cleanup
            || self.du_count >= self.config.max_du_before_cleanup
    }

    /// Queued events.
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// DOM score of the last refresh on a book surface.
    pub fn last_refresh_score(&self) -> i32 {
        self.last_refresh_score
    }

    /// A click reset is waiting to honour the next DOM batch.
    pub fn click_pending(&self) -> bool {
        self.click_pending
    }

    /// Refreshes since the last click reset (`None` when not tracking).
    pub fn click_refresh_count(&self) -> Option<u8> {
        self.click_refresh_count
    }

    /// A post-click series will be scheduled by the next refresh.
    pub fn post_click_armed(&self) -> bool {
        self.post_click_armed
    }

    /// Sweeps left in the running post-click series.
    pub fn post_click_remaining(&self) -> u32 {
        self.post_click_remaining
    }

    /// Diagnostics counters.
    pub fn stats(&self) -> &RefreshStats {
        &self.stats
    }

    /// Engine configuration.
    pub fn config(&self) -> &RefreshConfig {
        &self.config
    }

    /// Display handle.
    pub fn display(&self) -> &D {
        &self.display
    }

    /// Mutable display handle.
    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }

    // ── Batch processing ──────────────────────────────────────────────────────

    fn process_batch(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        RefreshStats::bump(&mut self.stats.batches_processed);

        let summary = BatchSummary::of(&self.queue);
        tracing::debug!(
            tag = %self.tag,
            events = self.queue.len(),
            score = summary.total_score,
            scroll = summary.total_scroll,
            has_dom = summary.has_dom,
            book = self.is_book_page,
            policy = self.policy.name(),
            "process batch"
        );

        let choice = self.decide(&summary);
        let region = self.merge_regions();
        tracing::info!(tag = %self.tag, waveform = choice.name(), region = %region, "decision");

        let dispatched = self.execute(choice, region, &summary);
        if dispatched || !self.is_book_page {
            self.queue.clear();
        } else {
            self.carry_over(&summary);
        }
    }

    /// Replace a skipped book-surface batch by one event holding its
    /// aggregate, so the next window sees the same totals and region.
    fn carry_over(&mut self, batch: &BatchSummary) {
        let region = self
            .queue
            .iter()
            .filter_map(|e| e.region)
            .reduce(|acc, r| acc.union(&r));
        self.queue.clear();

        let kind = if batch.has_dom {
            EventKind::DomChange
        } else if batch.total_scroll != 0 {
            EventKind::Scroll
        } else {
            return;
        };
        self.queue.push(RefreshEvent {
            kind,
            score: batch.total_score,
            region,
            scroll_delta: batch.total_scroll,
        });
    }

    /// Pick a waveform for the whole batch.
    ///
    /// High-priority kinds are checked by presence in a fixed order; only if
    /// none is present does the policy score the aggregate.
    fn decide(&mut self, batch: &BatchSummary) -> WaveformChoice {
        if batch.contains(EventKind::PageTurn) {
            return if self.policy == PolicyMode::ReadingFirst {
                WaveformChoice::DU
            } else {
                WaveformChoice::A2
            };
        }
        if batch.contains(EventKind::LoadFinished) {
            let stale = self
                .last_full_refresh
                .map_or(true, |t| self.clock.since(t) > self.config.full_refresh_min_interval());
            return if stale {
                WaveformChoice::GC16Full
            } else {
                WaveformChoice::GC16Partial
            };
        }
        if batch.contains(EventKind::BurstEnd) {
            return if self.ghosting_risk > self.config.burst_full_threshold {
                WaveformChoice::GC16Full
            } else {
                WaveformChoice::GC16Partial
            };
        }
        if batch.contains(EventKind::Menu) {
            return WaveformChoice::GC16Partial;
        }
        if batch.contains(EventKind::Idle) && self.ghosting_risk > self.config.idle_cleanup_threshold {
            return WaveformChoice::GC16Full;
        }
        if batch.contains(EventKind::ContentReady) {
            self.last_refresh_score = 0;
            self.click_pending = false;
            return WaveformChoice::GC16Partial;
        }

        match self.policy {
            PolicyMode::ReadingFirst => self.decide_reading(batch),
            PolicyMode::InteractionFirst => self.decide_interaction(batch),
            PolicyMode::Balanced => self.decide_balanced(batch),
        }
    }

    fn decide_reading(&mut self, batch: &BatchSummary) -> WaveformChoice {
        let metric = batch.total_score.max(batch.total_scroll.saturating_abs());
        let tiers = self.config.reading;

        let mut honored = false;
        if self.is_book_page && batch.has_dom {
            match self.click_gate(batch.total_score) {
                ClickGate::Honor => honored = true,
                ClickGate::Open => {}
                ClickGate::Skip(reason) => {
                    RefreshStats::bump(&mut self.stats.anti_thrash_skips);
                    tracing::debug!(
                        tag = %self.tag,
                        score = batch.total_score,
                        last_score = self.last_refresh_score,
                        reason,
                        "skip refresh"
                    );
                    return WaveformChoice::None;
                }
            }
        }

        if metric > tiers.partial {
            WaveformChoice::GC16Partial
        } else if metric > tiers.du || honored {
            WaveformChoice::DU
        } else {
            tracing::debug!(tag = %self.tag, metric, "skip refresh: below reading threshold");
            WaveformChoice::None
        }
    }

    fn click_gate(&mut self, score: i32) -> ClickGate {
        if self.click_pending {
            self.click_pending = false;
            return ClickGate::Honor;
        }
        match self.click_refresh_count {
            Some(n) if n >= MAX_CLICK_REFRESHES => {
                ClickGate::Skip("click refresh limit reached")
            }
            Some(1) if score <= self.config.supplemental_score_threshold => {
                ClickGate::Skip("supplemental refresh needs a larger score")
            }
            Some(1) => ClickGate::Honor,
            _ if !self.repaint_active()
                && self.last_refresh_score > 0
                && score <= self.last_refresh_score =>
            {
                ClickGate::Skip("score not above last refresh")
            }
            _ => ClickGate::Open,
        }
    }

    fn decide_interaction(&self, batch: &BatchSummary) -> WaveformChoice {
        let tiers = &self.config.interaction;
        if batch.total_scroll > tiers.scroll_du {
            WaveformChoice::DU
        } else if batch.total_score > tiers.gl16 {
            WaveformChoice::GL16
        } else if batch.total_score > tiers.du {
            WaveformChoice::DU
        } else {
            WaveformChoice::None
        }
    }

    fn decide_balanced(&self, batch: &BatchSummary) -> WaveformChoice {
        let tiers = &self.config.balanced;
        if batch.total_scroll > tiers.scroll {
            let scrolling = self
                .last_refresh
                .is_some_and(|t| self.clock.since(t) < self.config.scroll_activity());
            return if scrolling {
                WaveformChoice::A2
            } else {
                WaveformChoice::GL16
            };
        }

        // SAFETY: risk is a small non-negative float; the product is
        // saturated back into i32 by the cast.
        #[allow(clippy::arithmetic_side_effects, clippy::cast_possible_truncation)]
        let adjusted = (batch.total_score as f32 * (1.0 + self.ghosting_risk)) as i32;

        if adjusted > tiers.partial {
            WaveformChoice::GC16Partial
        } else if adjusted > tiers.gl16 {
            WaveformChoice::GL16
        } else if adjusted > tiers.a2 {
            WaveformChoice::A2
        } else {
            WaveformChoice::None
        }
    }

    /// Bounding box of every queued region, padded and clamped to the
    /// screen. Falls back to the full screen when no region is known, when
    /// the result is empty, or when it covers most of the screen anyway.
    fn merge_regions(&self) -> Region {
        let full = Region::full_screen(self.width, self.height);
        let Some(bounds) = self
            .queue
            .iter()
            .filter_map(|e| e.region)
            .reduce(|acc, r| acc.union(&r))
        else {
            return full;
        };

        let screen_w = i32::try_from(self.width).unwrap_or(i32::MAX);
        let screen_h = i32::try_from(self.height).unwrap_or(i32::MAX);
        let pad = self.config.region_padding;

        let left = bounds.x.saturating_sub(pad).max(0);
        let top = bounds.y.saturating_sub(pad).max(0);
        let right = bounds.right().saturating_add(pad).min(screen_w);
        let bottom = bounds.bottom().saturating_add(pad).min(screen_h);
        let to_u32 = |v: i32| u32::try_from(v).unwrap_or(0);
        let region = Region::new(
            to_u32(left),
            to_u32(top),
            to_u32(right.saturating_sub(left)),
            to_u32(bottom.saturating_sub(top)),
        );
        if region.is_empty() || region.covers(self.width, self.height, self.config.full_screen_coverage) {
            return full;
        }
        region
    }

    // ── Execution ─────────────────────────────────────────────────────────────

    fn needs_forced_cleanup(&self) -> bool {
        let risky = self.ghosting_risk >= self.config.ghosting_cleanup_threshold;
        // Only risk counts on self-repainting surfaces.
        if self.repaint_active() {
            return risky;
        }
        risky
            || self.partial_count >= self.config.max_partial_before_cleanup
            || self.du_count >= self.config.max_du_before_cleanup
    }

    /// Dispatch `choice` and update bookkeeping. Returns false for
    /// [`WaveformChoice::None`].
    fn execute(&mut self, choice: WaveformChoice, region: Region, batch: &BatchSummary) -> bool {
        if choice == WaveformChoice::None {
            return false;
        }

        let mut waveform = choice;
        if !waveform.is_full() && self.needs_forced_cleanup() {
            RefreshStats::bump(&mut self.stats.forced_cleanups);
            tracing::info!(
                tag = %self.tag,
                decided = choice.name(),
                risk = self.ghosting_risk,
                partial = self.partial_count,
                du = self.du_count,
                "forcing full refresh to clear ghosting"
            );
            waveform = WaveformChoice::GC16Full;
        }
        // Binary A2 is too harsh on book text.
        if self.is_book_page && waveform == WaveformChoice::A2 {
            waveform = WaveformChoice::DU;
        }

        if self.is_book_page && batch.has_dom && batch.total_score > 0 {
            self.last_refresh_score = batch.total_score;
            if let Some(n) = self.click_refresh_count {
                self.click_refresh_count = Some(n.saturating_add(1).min(MAX_CLICK_REFRESHES));
            }
        }

        self.apply(waveform, region);
        RefreshStats::bump(&mut self.stats.refreshes_dispatched);

        if self.post_click_armed {
            self.schedule_post_click();
        }
        true
    }

    /// Issue the driver call for `waveform` and account for it.
    fn apply(&mut self, waveform: WaveformChoice, region: Region) {
        let now = self.clock.now();
        let (w, h) = (self.width, self.height);
        let full = Region::full_screen(w, h);

        match waveform {
            WaveformChoice::None => return,
            WaveformChoice::GC16Full => {
                self.display.refresh_full(w, h);
                self.partial_count = 0;
                self.du_count = 0;
                self.ghosting_risk = 0.0;
                self.last_full_refresh = Some(now);
            }
            WaveformChoice::GC16Partial => {
                self.display.refresh_partial(region);
                self.partial_count = self.partial_count.saturating_add(1);
            }
            WaveformChoice::GL16 => {
                self.display.refresh_scroll(w, h);
                self.partial_count = self.partial_count.saturating_add(1);
            }
            WaveformChoice::A2 => {
                self.display.refresh_a2(full);
            }
            WaveformChoice::DU => {
                self.display.refresh_ui(full);
                self.du_count = self.du_count.saturating_add(1);
            }
        }
        self.add_risk(waveform.ghosting_increment());
        self.last_refresh = Some(now);

        let shown = if waveform == WaveformChoice::GC16Partial {
            region
        } else {
            full
        };
        tracing::info!(
            tag = %self.tag,
            waveform = waveform.name(),
            region = %shown,
            risk = self.ghosting_risk,
            partial = self.partial_count,
            du = self.du_count,
            "refresh executed"
        );
    }

    // SAFETY: increments are small positive constants; f32 saturates to inf
    // rather than wrapping.
    #[allow(clippy::arithmetic_side_effects)]
    fn add_risk(&mut self, increment: f32) {
        self.ghosting_risk += increment;
    }

    // ── Post-click series ─────────────────────────────────────────────────────

    fn schedule_post_click(&mut self) {
        self.post_click_armed = false;
        if !self.post_click_enabled || self.config.post_click_repeats == 0 {
            return;
        }
        let now = self.clock.now();
        self.post_click_remaining = self.config.post_click_repeats;
        self.post_click_deadline = Some(deadline_after(now, self.config.post_click_interval()));
        tracing::debug!(tag = %self.tag, repeats = self.post_click_remaining, "post-click series scheduled");
    }

    fn fire_post_click(&mut self, now: Instant) {
        self.post_click_deadline = None;
        if !self.post_click_enabled || self.post_click_remaining == 0 {
            self.post_click_remaining = 0;
            return;
        }

        // Series are only armed on book surfaces and die with book mode.
        let waveform = WaveformChoice::DU;
        self.post_click_remaining = self.post_click_remaining.saturating_sub(1);
        RefreshStats::bump(&mut self.stats.post_click_refreshes);
        tracing::debug!(
            tag = %self.tag,
            waveform = waveform.name(),
            remaining = self.post_click_remaining,
            "post-click refresh"
        );
        self.apply(waveform, Region::full_screen(self.width, self.height));

        if self.post_click_remaining > 0 {
            self.post_click_deadline = Some(deadline_after(now, self.config.post_click_interval()));
        }
    }

    fn cancel_post_click(&mut self) {
        if self.post_click_deadline.take().is_some() {
            tracing::debug!(tag = %self.tag, "post-click series cancelled");
        }
        self.post_click_remaining = 0;
    }

    // ── Self-repainting surfaces ──────────────────────────────────────────────

    fn repaint_active(&self) -> bool {
        self.self_repainting && self.is_book_page
    }

    fn handle_record(&mut self, record: PageRecord) {
        match record {
            PageRecord::Event(event) if self.repaint_active() => {
                tracing::trace!(tag = %self.tag, kind = event.kind.name(), "dropped on self-repainting surface");
            }
            PageRecord::Event(event) => self.push_event(event),
            PageRecord::Trace(trace) if self.repaint_active() => {
                let now = self.clock.now();
                let repaint = self.config.repaint;
                if let Some(reason) = self.repaint.on_trace(&trace, now, &repaint) {
                    self.trace_repaint(reason);
                }
            }
            PageRecord::Trace(trace) => {
                tracing::trace!(tag = %self.tag, reason = ?trace.reason, "trace note ignored");
            }
        }
    }

    /// Full-screen DU repaint, or a full refresh once ghosting risk reaches
    /// the cleanup threshold. Throttled per [`RepaintReason`].
    fn trace_repaint(&mut self, reason: RepaintReason) {
        if !self.repaint_active() {
            return;
        }
        let now = self.clock.now();
        let repaint = self.config.repaint;
        if !self.repaint.admit(reason, now, &repaint) {
            RefreshStats::bump(&mut self.stats.throttled_repaints);
            tracing::debug!(tag = %self.tag, reason = reason.name(), "repaint throttled");
            return;
        }

        let waveform = if self.ghosting_risk >= self.config.ghosting_cleanup_threshold {
            WaveformChoice::GC16Full
        } else {
            WaveformChoice::DU
        };
        RefreshStats::bump(&mut self.stats.repaints);
        tracing::debug!(tag = %self.tag, reason = reason.name(), waveform = waveform.name(), "trace repaint");
        self.apply(waveform, Region::full_screen(self.width, self.height));
    }

    // ── Idle ──────────────────────────────────────────────────────────────────

    fn on_idle(&mut self) {
        if self.ghosting_risk > self.config.idle_cleanup_threshold {
            tracing::info!(tag = %self.tag, risk = self.ghosting_risk, "idle with high ghosting risk");
            self.push_event(EventKind::Idle.into());
        }
    }
}

pub(crate) fn deadline_after(now: Instant, delay: Duration) -> Instant {
    now.checked_add(delay).unwrap_or(now)
}

fn is_due(deadline: Option<Instant>, now: Instant) -> bool {
    deadline.is_some_and(|d| now >= d)
}

/// Formats an optional producer region for logs.
struct RegionLog(Option<DirtyRect>);

impl core::fmt::Display for RegionLog {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.0 {
            Some(r) => r.fmt(f),
            None => f.write_str("none"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use eink_testing::{DisplayCall, ManualClock, RecordingDisplay};

    const W: u32 = 954;
    const H: u32 = 1696;

    fn engine() -> (RefreshManager<RecordingDisplay, ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        let engine = RefreshManager::new("test", RecordingDisplay::new(), clock.clone(), W, H);
        (engine, clock)
    }

    fn dom(score: i32, rect: Option<DirtyRect>) -> RefreshEvent {
        RefreshEvent::dom_change(score, rect)
    }

    #[test]
    fn test_summary_aggregates_and_tracks_kinds() {
        let s = BatchSummary::of(&[dom(40, None), RefreshEvent::scroll(30), RefreshEvent::scroll(-50), dom(2, None)]);
        assert_eq!(s.total_score, 42);
        assert_eq!(s.total_scroll, -20);
        assert!(s.has_dom);
        assert!(s.contains(EventKind::Scroll));
        assert!(!s.contains(EventKind::PageTurn));
    }

    #[test]
    fn test_batch_window_is_fixed_from_first_event() {
        let (mut e, clock) = engine();
        e.push_event(dom(200, None));
        let first = e.next_deadline().unwrap();

        clock.advance_ms(150);
        e.push_event(dom(200, None));
        assert_eq!(e.next_deadline(), Some(first));

        e.poll();
        assert_eq!(e.display().call_count(), 0);

        clock.advance_ms(50);
        e.poll();
        assert_eq!(e.display().call_count(), 1);
        assert_eq!(e.queue_len(), 0);
    }

    #[test]
    fn test_flush_kind_does_not_disarm_batch_deadline() {
        let (mut e, clock) = engine();
        e.push_event(dom(5, None));
        e.trigger_menu();
        assert_eq!(e.display().call_count(), 1);
        assert_eq!(e.queue_len(), 0);

        clock.advance_ms(200);
        e.poll();
        assert_eq!(e.display().call_count(), 1);
    }

    #[test]
    fn test_merge_pads_and_clamps() {
        let (mut e, _) = engine();
        e.queue.push(dom(1, Some(DirtyRect::new(5, 100, 100, 50))));
        e.queue.push(dom(1, Some(DirtyRect::new(50, 300, 100, 20))));
        assert_eq!(e.merge_regions(), Region::new(0, 90, 160, 240));
    }

    #[test]
    fn test_merge_falls_back_to_full_screen() {
        let (mut e, _) = engine();
        assert_eq!(e.merge_regions(), Region::full_screen(W, H));

        e.queue.push(dom(1, Some(DirtyRect::new(0, 0, 800, 1400))));
        assert_eq!(e.merge_regions(), Region::full_screen(W, H));

        e.queue.clear();
        e.queue.push(dom(1, Some(DirtyRect::new(2000, 3000, 10, 10))));
        assert_eq!(e.merge_regions(), Region::full_screen(W, H));
    }

    #[test]
    fn test_menu_refreshes_merged_region() {
        let (mut e, _) = engine();
        e.push_event(dom(5, Some(DirtyRect::new(100, 100, 50, 50))));
        e.trigger_menu();
        assert_eq!(
            e.display().last_call(),
            Some(DisplayCall::Partial(Region::new(90, 90, 70, 70)))
        );
        assert_eq!(e.partial_count(), 1);
        assert!((e.ghosting_risk() - 0.02).abs() < 1e-6);
    }

    #[test]
    fn test_book_page_demotes_a2_to_du() {
        let (mut e, _) = engine();
        e.set_book_page(true);
        e.set_policy(PolicyMode::Balanced);
        e.push_event(dom(50, None));
        e.flush();
        assert_eq!(e.display().last_call(), Some(DisplayCall::Ui(Region::full_screen(W, H))));
        assert_eq!(e.du_count(), 1);
    }

    #[test]
    fn test_gl16_goes_through_adaptive_scroll() {
        let (mut e, _) = engine();
        e.set_book_page(false);
        e.push_event(dom(150, None));
        e.flush();
        assert_eq!(
            e.display().last_call(),
            Some(DisplayCall::Scroll { width: W, height: H })
        );
        assert_eq!(e.partial_count(), 1);
    }

    #[test]
    fn test_idle_pushes_event_only_with_high_risk() {
        let (mut e, clock) = engine();
        e.push_event(dom(1, None));
        clock.advance_ms(200);
        e.poll();
        let batches = e.stats().batches_processed;

        clock.advance_ms(60_000);
        e.poll();
        assert_eq!(e.stats().events_pushed, 1);
        assert_eq!(e.stats().batches_processed, batches);
        assert_eq!(e.next_deadline(), None);
    }

    #[test]
    fn test_idle_with_high_risk_requests_full_refresh() {
        let (mut e, clock) = engine();
        e.ghosting_risk = 6.0;
        e.push_event(RefreshEvent::scroll(0));
        clock.advance_ms(200);
        e.poll();
        assert_eq!(e.display().call_count(), 0);

        clock.advance_ms(60_000);
        e.poll();
        assert_eq!(e.queue_len(), 1);

        clock.advance_ms(200);
        e.poll();
        assert_eq!(e.display().last_call(), Some(DisplayCall::Full { width: W, height: H }));
        assert_eq!(e.ghosting_risk(), 0.0);
    }
}
