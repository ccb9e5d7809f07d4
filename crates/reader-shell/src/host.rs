//! Host controller
//!
//! Owns the panel and everything that draws on it: one engine per surface
//! plus the idle cleanup watchdog. All of them run on the caller's thread and
//! share the display through [`SharedDisplay`].

use std::time::Instant;

use eink_protocol::{Clock, DisplayProtocol, FramebufferDisplay, SharedDisplay};
use eink_refresh::{CleanupWatchdog, RefreshManager};

use crate::command::{Action, Command, Surface};
use crate::config::ShellConfig;

/// Full cleanup requested by the user, outside any engine.
pub trait ManualCleanup {
    /// Clear the panel and, where supported, wait until it is visible.
    fn manual_cleanup(&mut self, width: u32, height: u32);
}

impl<C: Clock> ManualCleanup for FramebufferDisplay<C> {
    fn manual_cleanup(&mut self, width: u32, height: u32) {
        self.refresh_cleanup_and_wait(width, height);
    }
}

/// Whether the loop should keep going after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep reading commands
    Continue,
    /// Shut down
    Quit,
}

/// Two surfaces on one panel.
pub struct Host<D: DisplayProtocol, C: Clock + Clone> {
    display: SharedDisplay<D>,
    weread: RefreshManager<SharedDisplay<D>, C>,
    dedao: RefreshManager<SharedDisplay<D>, C>,
    watchdog: CleanupWatchdog<C>,
    width: u32,
    height: u32,
}

impl<D: DisplayProtocol + ManualCleanup, C: Clock + Clone> Host<D, C> {
    /// Wire both surfaces to `display`.
    ///
    /// Post-click sweeps stay enabled on the web reader only; the e-book
    /// platform repaints on its own after page turns.
    pub fn new(display: D, clock: C, config: &ShellConfig) -> Self {
        let display = SharedDisplay::new(display);
        let (w, h) = (config.width, config.height);

        let weread = RefreshManager::with_config(
            Surface::Weread.tag(),
            display.clone(),
            clock.clone(),
            w,
            h,
            config.refresh.clone(),
        );
        let mut dedao = RefreshManager::with_config(
            Surface::Dedao.tag(),
            display.clone(),
            clock.clone(),
            w,
            h,
            config.refresh.clone(),
        );
        dedao.set_post_click_enabled(false);
        dedao.set_self_repainting(true);

        Self {
            display,
            weread,
            dedao,
            watchdog: CleanupWatchdog::new(clock, config.cleanup_delay(), w, h),
            width: w,
            height: h,
        }
    }

    /// Apply one command.
    pub fn handle(&mut self, command: Command) -> Flow {
        self.watchdog.note_activity();
        match command {
            Command::Quit => return Flow::Quit,
            Command::Cleanup => self.manual_cleanup(),
            Command::Surface(surface, action) => self.dispatch(surface, action),
        }
        Flow::Continue
    }

    /// Parse and apply one input line. Unparseable lines are logged and
    /// ignored.
    pub fn handle_line(&mut self, line: &str) -> Flow {
        match line.parse::<Command>() {
            Ok(command) => self.handle(command),
            Err(e) => {
                tracing::warn!(error = %e, line, "ignoring command");
                Flow::Continue
            }
        }
    }

    /// Earliest deadline across engines and the watchdog.
    pub fn next_deadline(&self) -> Option<Instant> {
        [
            self.weread.next_deadline(),
            self.dedao.next_deadline(),
            self.watchdog.next_deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// Run everything that is due.
    pub fn poll(&mut self) {
        self.weread.poll();
        self.dedao.poll();
        let mut display = self.display.clone();
        self.watchdog.poll(&mut display);
    }

    /// Engine for `surface`.
    pub fn engine(&self, surface: Surface) -> &RefreshManager<SharedDisplay<D>, C> {
        match surface {
            Surface::Weread => &self.weread,
            Surface::Dedao => &self.dedao,
        }
    }

    /// Shared display handle.
    pub fn display(&self) -> &SharedDisplay<D> {
        &self.display
    }

    fn engine_mut(&mut self, surface: Surface) -> &mut RefreshManager<SharedDisplay<D>, C> {
        match surface {
            Surface::Weread => &mut self.weread,
            Surface::Dedao => &mut self.dedao,
        }
    }

    fn dispatch(&mut self, surface: Surface, action: Action) {
        let engine = self.engine_mut(surface);
        match action {
            Action::Events(json) => engine.parse_js_events(&json),
            Action::PageTurn => engine.trigger_page_turn(),
            Action::LoadFinished => engine.trigger_load_finished(),
            Action::Menu => engine.trigger_menu(),
            Action::BurstEnd => engine.trigger_burst_end(),
            Action::ContentReady => engine.trigger_content_ready(),
            Action::MenuHidden => engine.trigger_menu_hidden(),
            Action::Click => engine.reset_score_threshold(),
            Action::Book(is_book) => engine.set_book_page(is_book),
            Action::Policy(policy) => engine.set_policy(policy),
            Action::Stats => tracing::info!(
                tag = engine.tag(),
                stats = %engine.stats(),
                risk = engine.ghosting_risk(),
                partial = engine.partial_count(),
                du = engine.du_count(),
                queue = engine.queue_len(),
                "stats"
            ),
        }
    }

    fn manual_cleanup(&mut self) {
        let (w, h) = (self.width, self.height);
        tracing::info!("manual full refresh");
        if self.display.with_mut(|d| d.manual_cleanup(w, h)).is_none() {
            tracing::warn!("display busy, manual cleanup dropped");
        }
    }
}
