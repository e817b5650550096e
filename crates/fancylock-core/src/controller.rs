//! Lock session orchestration
//!
//! All session state is mutated from one place: the controller's event loop.
//! Key presses from the display adapter and finished verifications from the
//! blocking worker arrive on the same channel, so transitions never
//! interleave.
//!
//! ```text
//! Unlocked --lock--> Locked --Enter--> Authenticating --ok--> Unlocked
//!                      ^                    |
//!                      |                    +--rejected--> Locked
//!                      |                    +--3rd rejection--> LockedOut
//!                      +-------lockout expired----------------- LockedOut
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Span};
use zeroize::Zeroizing;

use crate::auth::{classify, AuthOutcome, AuthResult, Authenticator};
use crate::config::LockConfig;
use crate::credential::SecureCredentialBuffer;
use crate::display::{DisplayAdapter, MonitorGeometry};
use crate::error::{LockError, Result};
use crate::events::{self, EventReceiver, EventSender, KeyCode, KeyEvent, SessionEvent};
use crate::hooks::{run_hook, HookKind};
use crate::lockout::LockoutPolicy;
use crate::media::MediaProcessSupervisor;
use crate::media_control::{MediaBus, MediaBusController, PlayerctlBus};

/// Countdown refresh interval
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(250);

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Input is not captured
    Unlocked,
    /// Waiting for a credential
    Locked,
    /// A verification is in flight; keys are ignored
    Authenticating,
    /// Too many failures; no verification until the lockout expires
    LockedOut,
}

/// Set while a session holds exclusive input anywhere in this process
static SESSION_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Process-wide single-session token, released on drop
#[derive(Debug)]
struct SessionGuard(());

impl SessionGuard {
    fn acquire() -> Result<Self> {
        SESSION_ACTIVE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| SessionGuard(()))
            .map_err(|_| LockError::AlreadyLocked)
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        SESSION_ACTIVE.store(false, Ordering::Release);
    }
}

/// Orchestrates one lock session
pub struct LockSessionController {
    config: LockConfig,
    display: Box<dyn DisplayAdapter>,
    authenticator: Arc<dyn Authenticator>,
    media: Option<MediaProcessSupervisor>,
    media_bus: Option<MediaBusController>,
    credential: SecureCredentialBuffer,
    lockout: LockoutPolicy,
    state: SessionState,
    events_tx: EventSender,
    events_rx: EventReceiver,
    pending_auth: Option<JoinHandle<()>>,
    /// Id of the verification whose result is awaited
    current_attempt: Option<u64>,
    next_attempt: u64,
    exit_requested: bool,
    guard: Option<SessionGuard>,
    tick_interval: Duration,
    span: Span,
}

impl LockSessionController {
    /// Build a controller with the default media supervisor and, when either
    /// media toggle is set, a `playerctl` media bus.
    pub fn new(
        config: LockConfig,
        display: Box<dyn DisplayAdapter>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        let span = info_span!("session");
        let media = MediaProcessSupervisor::new(&config).with_span(info_span!(parent: &span, "media"));
        let media_bus = (config.lock_pause_media || config.unlock_unpause_media).then(|| {
            MediaBusController::with_span(
                Arc::new(PlayerctlBus::default()),
                info_span!(parent: &span, "media_bus"),
            )
        });
        let (events_tx, events_rx) = events::channel();

        Self {
            credential: SecureCredentialBuffer::with_max_len(config.max_credential_len),
            lockout: LockoutPolicy::new(config.lockout.clone(), config.debug_exit),
            config,
            display,
            authenticator,
            media: Some(media),
            media_bus,
            state: SessionState::Unlocked,
            events_tx,
            events_rx,
            pending_auth: None,
            current_attempt: None,
            next_attempt: 0,
            exit_requested: false,
            guard: None,
            tick_interval: DEFAULT_TICK_INTERVAL,
            span,
        }
    }

    /// Replace the media supervisor
    pub fn with_media(mut self, media: MediaProcessSupervisor) -> Self {
        self.media = Some(media.with_span(info_span!(parent: &self.span, "media")));
        self
    }

    /// Lock without background media
    pub fn without_media(mut self) -> Self {
        self.media = None;
        self
    }

    /// Replace the desktop media bus
    pub fn with_media_bus(mut self, bus: Arc<dyn MediaBus>) -> Self {
        self.media_bus = Some(MediaBusController::with_span(
            bus,
            info_span!(parent: &self.span, "media_bus"),
        ));
        self
    }

    /// Log under `span`; the media components log under children of it
    pub fn with_span(mut self, span: Span) -> Self {
        self.media = self
            .media
            .take()
            .map(|media| media.with_span(info_span!(parent: &span, "media")));
        self.span = span;
        self
    }

    /// Countdown refresh interval
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Lock the screen and block until it is unlocked.
    pub async fn lock(&mut self) -> Result<()> {
        self.engage().await?;
        let result = self.run().await;
        self.disengage().await;
        result
    }

    /// Capture input and enter `Locked`.
    ///
    /// Runs the pre-lock hook, pauses desktop media, acquires the display and
    /// starts background media. If the display cannot be acquired nothing is
    /// left paused and the state stays `Unlocked`. Media failures only log.
    pub async fn engage(&mut self) -> Result<()> {
        if self.state != SessionState::Unlocked {
            return Err(LockError::AlreadyLocked);
        }
        let guard = SessionGuard::acquire()?;

        run_hook(HookKind::PreLock, &self.config.pre_lock_command, &self.span).await;

        if self.config.lock_pause_media {
            if let Some(bus) = self.media_bus.as_mut() {
                let paused = bus.pause_all().await;
                debug!(parent: &self.span, "Paused {} desktop media players", paused);
            }
        }

        let detected = match self.display.acquire(self.events_tx.clone()) {
            Ok(monitors) => monitors,
            Err(e) => {
                error!(parent: &self.span, "Failed to capture input: {}", e);
                if let Some(bus) = self.media_bus.as_mut() {
                    bus.resume_all().await;
                }
                return Err(LockError::InputCapture(e));
            }
        };

        self.guard = Some(guard);
        self.exit_requested = false;
        self.credential.clear();
        self.state = SessionState::Locked;
        self.display.render_password_dots(0);
        info!(parent: &self.span, "Screen locked");

        let monitors = self.select_monitors(detected);
        if let Some(media) = self.media.as_mut() {
            match media.start(&monitors) {
                Ok(launched) => debug!(parent: &self.span, "Background media on {} monitors", launched),
                Err(e) => warn!(parent: &self.span, "Continuing without background media: {}", e),
            }
        }

        Ok(())
    }

    /// Configured monitors win over detected ones; one default monitor otherwise
    fn select_monitors(&self, detected: Vec<MonitorGeometry>) -> Vec<MonitorGeometry> {
        if !self.config.monitors.is_empty() {
            self.config.monitors.clone()
        } else if !detected.is_empty() {
            detected
        } else {
            vec![MonitorGeometry::default()]
        }
    }

    /// Serve events until the session unlocks or a debug exit is requested
    pub async fn run(&mut self) -> Result<()> {
        let mut tick = tokio::time::interval(self.tick_interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        while self.is_active() {
            tokio::select! {
                event = self.events_rx.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => break,
                },
                _ = tick.tick() => self.on_tick(Instant::now()),
            }
        }

        Ok(())
    }

    /// Handle the next queued event. Returns false if the channel is closed.
    pub async fn process_next_event(&mut self) -> bool {
        match self.events_rx.recv().await {
            Some(event) => {
                self.handle_event(event).await;
                true
            }
            None => false,
        }
    }

    /// Apply one event to the session
    pub async fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Key(key) => self.handle_key_event(key),
            SessionEvent::AuthCompleted { attempt, result } => {
                self.on_auth_completed(attempt, result).await
            }
        }
    }

    /// Apply one key event.
    ///
    /// During a lockout only the debug exit and the clear key act (Enter is
    /// refused without contacting the authenticator). Otherwise Enter submits,
    /// Backspace erases, Escape clears and printable characters are appended.
    pub fn handle_key_event(&mut self, event: KeyEvent) {
        if !event.pressed {
            return;
        }

        match self.state {
            SessionState::Unlocked => return,
            SessionState::Authenticating => {
                debug!(parent: &self.span, "Ignoring key while verifying");
                return;
            }
            SessionState::Locked | SessionState::LockedOut => {}
        }

        let now = Instant::now();
        if self.state == SessionState::LockedOut && !self.lockout.is_locked_out(now) {
            self.end_lockout();
        }

        if self.config.debug_exit
            && matches!(event.code, KeyCode::Escape | KeyCode::Char('q') | KeyCode::Char('Q'))
        {
            warn!(parent: &self.span, "Debug exit triggered");
            self.credential.clear();
            self.exit_requested = true;
            return;
        }

        if self.state == SessionState::LockedOut {
            match event.code {
                KeyCode::Escape => self.credential.clear(),
                KeyCode::Enter => self.authenticate(now),
                _ => {}
            }
            return;
        }

        match event.code {
            KeyCode::Enter => self.authenticate(now),
            KeyCode::Backspace => {
                self.credential.remove_last();
                self.render_dots();
            }
            KeyCode::Escape => {
                self.credential.clear();
                self.render_dots();
            }
            KeyCode::Char(c) if !c.is_control() => {
                self.credential.push_char(c);
                self.render_dots();
            }
            KeyCode::Char(_) | KeyCode::Other => {}
        }
    }

    /// Submit the buffered credential to the authenticator on a blocking worker
    fn authenticate(&mut self, now: Instant) {
        if self.lockout.is_locked_out(now) {
            self.credential.clear();
            self.state = SessionState::LockedOut;
            self.display.render_denied();
            let remaining = self.lockout.remaining(now);
            self.display.render_lockout_message(remaining);
            info!(parent: &self.span, "Attempt refused, locked out for another {:?}", remaining);
            return;
        }

        let credential = Zeroizing::new(self.credential.expose().to_vec());
        self.credential.clear();
        self.render_dots();
        self.state = SessionState::Authenticating;

        debug!(
            parent: &self.span,
            service = self.authenticator.service(),
            len = credential.len(),
            "Verifying credential"
        );

        let attempt = self.next_attempt;
        self.next_attempt = self.next_attempt.wrapping_add(1);
        self.current_attempt = Some(attempt);

        let authenticator = Arc::clone(&self.authenticator);
        let events = self.events_tx.clone();
        self.pending_auth = Some(tokio::spawn(async move {
            let result = tokio::task::spawn_blocking(move || authenticator.verify(&credential))
                .await
                .unwrap_or_else(|e| AuthResult::failure(format!("Verification task failed: {}", e)));
            let _ = events.send(SessionEvent::AuthCompleted { attempt, result });
        }));
    }

    async fn on_auth_completed(&mut self, attempt: u64, result: AuthResult) {
        if self.current_attempt != Some(attempt) || self.state != SessionState::Authenticating {
            debug!(
                parent: &self.span,
                attempt,
                "Discarding stale verification result in {:?}", self.state
            );
            return;
        }
        self.current_attempt = None;
        self.pending_auth = None;

        debug!(parent: &self.span, reason = %result.message, "Verification finished");
        let now = Instant::now();

        match classify(&result) {
            AuthOutcome::Accepted => {
                info!(parent: &self.span, "Authentication successful");
                self.lockout.reset();
                self.credential.clear();
                self.teardown().await;
            }
            AuthOutcome::Rejected => {
                let outcome = self.lockout.on_failure(now);
                self.display.render_denied();
                if outcome.activated {
                    self.state = SessionState::LockedOut;
                    self.display.render_lockout_message(outcome.duration);
                    warn!(
                        parent: &self.span,
                        "Too many failed attempts, locked out for {:?}", outcome.duration
                    );
                } else {
                    self.state = SessionState::Locked;
                    self.render_dots();
                    info!(
                        parent: &self.span,
                        "Authentication failed, {} attempts before lockout",
                        outcome.remaining_before_lockout
                    );
                }
            }
            AuthOutcome::AccountLocked => {
                let outcome = self.lockout.force_lockout(now);
                self.state = SessionState::LockedOut;
                self.display.render_denied();
                self.display.render_lockout_message(outcome.duration);
                warn!(
                    parent: &self.span,
                    "Account reported locked, locked out for {:?}", outcome.duration
                );
            }
        }
    }

    /// Refresh the countdown and leave `LockedOut` once it expires. In other
    /// locked states the display gets a chance to expire transient feedback.
    fn on_tick(&mut self, now: Instant) {
        match self.state {
            SessionState::LockedOut => {}
            SessionState::Locked | SessionState::Authenticating => {
                self.display.refresh();
                return;
            }
            SessionState::Unlocked => return,
        }

        if self.lockout.is_locked_out(now) {
            let remaining = self.lockout.remaining(now);
            self.display.render_lockout_message(remaining);
        } else {
            self.end_lockout();
        }
    }

    fn end_lockout(&mut self) {
        info!(parent: &self.span, "Lockout expired");
        self.state = SessionState::Locked;
        self.credential.clear();
        self.display.clear_overlay();
        self.display.render_password_dots(0);
    }

    fn render_dots(&mut self) {
        let count = self
            .credential
            .char_count()
            .min(self.config.max_password_dots);
        self.display.render_password_dots(count);
    }

    /// Tear the session down. Idempotent; safe after a cancelled `run`.
    pub async fn disengage(&mut self) {
        self.teardown().await;
    }

    async fn teardown(&mut self) {
        self.credential.clear();
        self.current_attempt = None;
        if let Some(task) = self.pending_auth.take() {
            task.abort();
        }
        if self.guard.is_none() {
            self.state = SessionState::Unlocked;
            return;
        }

        if let Some(media) = self.media.as_mut() {
            media.stop().await;
        }

        self.display.clear_overlay();
        self.display.release();

        // Results and keys queued for this session must not reach the next one
        while self.events_rx.try_recv().is_ok() {}

        if self.config.unlock_unpause_media {
            if let Some(bus) = self.media_bus.as_mut() {
                let resumed = bus.resume_all().await;
                debug!(parent: &self.span, "Resumed {} desktop media players", resumed);
            }
        }

        run_hook(HookKind::PostLock, &self.config.post_lock_command, &self.span).await;

        self.state = SessionState::Unlocked;
        self.guard = None;
        info!(parent: &self.span, "Screen unlocked");
    }

    /// Whether input is still captured and no exit was requested
    pub fn is_active(&self) -> bool {
        self.state != SessionState::Unlocked && !self.exit_requested
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Bytes in the credential buffer
    pub fn credential_len(&self) -> usize {
        self.credential.len()
    }

    /// Failures since the last reset or lockout
    pub fn failed_attempts(&self) -> u32 {
        self.lockout.failed_count()
    }

    /// Time left in the current lockout
    pub fn lockout_remaining(&mut self) -> Duration {
        self.lockout.remaining(Instant::now())
    }

    /// Whether a debug exit ended the session
    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    /// Sender for injecting events (the display adapter gets its own clone)
    pub fn event_sender(&self) -> EventSender {
        self.events_tx.clone()
    }

    pub fn media(&self) -> Option<&MediaProcessSupervisor> {
        self.media.as_ref()
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }
}

impl Drop for LockSessionController {
    fn drop(&mut self) {
        if let Some(task) = self.pending_auth.take() {
            task.abort();
        }
        if self.guard.is_some() {
            self.display.release();
        }
    }
}
