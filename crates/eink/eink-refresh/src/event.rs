//! Refresh events
//!
//! One [`RefreshEvent`] describes one observed change. Producers build them
//! at the moment of observation; the engine queues them until the next batch
//! is processed and then drops them.

use core::fmt;

/// Kind of change an event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Visible DOM content mutated. Carries a score and usually a region.
    DomChange,
    /// The page scrolled. Carries a signed pixel delta.
    Scroll,
    /// The user turned a page.
    PageTurn,
    /// A page finished loading.
    LoadFinished,
    /// A menu overlay opened or closed.
    Menu,
    /// A burst of rapid changes has ended.
    BurstEnd,
    /// Content finally finished rendering.
    ContentReady,
    /// Nothing happened for a long time.
    Idle,
}

impl EventKind {
    /// Human-readable name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::DomChange => "DOM_CHANGE",
            EventKind::Scroll => "SCROLL",
            EventKind::PageTurn => "PAGE_TURN",
            EventKind::LoadFinished => "LOAD_FINISHED",
            EventKind::Menu => "MENU",
            EventKind::BurstEnd => "BURST_END",
            EventKind::ContentReady => "CONTENT_READY",
            EventKind::Idle => "IDLE",
        }
    }

    pub(crate) fn bit(self) -> u8 {
        match self {
            EventKind::DomChange => 1 << 0,
            EventKind::Scroll => 1 << 1,
            EventKind::PageTurn => 1 << 2,
            EventKind::LoadFinished => 1 << 3,
            EventKind::Menu => 1 << 4,
            EventKind::BurstEnd => 1 << 5,
            EventKind::ContentReady => 1 << 6,
            EventKind::Idle => 1 << 7,
        }
    }

    /// Kinds that process the batch as soon as they are pushed instead of
    /// waiting for the batch window to close.
    pub fn flushes_immediately(&self) -> bool {
        matches!(
            self,
            EventKind::Menu
                | EventKind::LoadFinished
                | EventKind::BurstEnd
                | EventKind::ContentReady
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Screen rectangle in device pixels as reported by producers.
///
/// Signed because page scripts report element boxes that may start above or
/// left of the viewport. Clamping to the screen happens when regions are
/// merged for a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DirtyRect {
    /// Left edge
    pub x: i32,
    /// Top edge
    pub y: i32,
    /// Width
    pub width: i32,
    /// Height
    pub height: i32,
}

impl DirtyRect {
    /// Create a rectangle.
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Right edge (exclusive).
    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    /// Bottom edge (exclusive).
    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    /// Smallest rectangle containing both `self` and `other`.
    pub fn union(&self, other: &DirtyRect) -> DirtyRect {
        let left = self.x.min(other.x);
        let top = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        DirtyRect::new(
            left,
            top,
            right.saturating_sub(left),
            bottom.saturating_sub(top),
        )
    }
}

impl fmt::Display for DirtyRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{} {}x{}", self.x, self.y, self.width, self.height)
    }
}

/// One observed change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshEvent {
    /// What changed
    pub kind: EventKind,
    /// Importance of a DOM change (0 for other kinds)
    pub score: i32,
    /// Affected area; `None` means unknown, treat as full screen
    pub region: Option<DirtyRect>,
    /// Signed scroll distance in pixels (0 for other kinds)
    pub scroll_delta: i32,
}

impl RefreshEvent {
    /// Event of `kind` with no payload.
    pub const fn new(kind: EventKind) -> Self {
        Self {
            kind,
            score: 0,
            region: None,
            scroll_delta: 0,
        }
    }

    /// DOM change with a score and optional bounding region.
    pub const fn dom_change(score: i32, region: Option<DirtyRect>) -> Self {
        Self {
            kind: EventKind::DomChange,
            score,
            region,
            scroll_delta: 0,
        }
    }

    /// Scroll by `delta` pixels.
    pub const fn scroll(delta: i32) -> Self {
        Self {
            kind: EventKind::Scroll,
            score: 0,
            region: None,
            scroll_delta: delta,
        }
    }
}

impl From<EventKind> for RefreshEvent {
    fn from(kind: EventKind) -> Self {
        Self::new(kind)
    }
}
