//! Terminal display adapter
//!
//! Takes over the controlling terminal with crossterm (raw mode, alternate
//! screen, hidden cursor) and draws the lock dialogs with ratatui. Keys are
//! read on a dedicated thread and forwarded to the session.

use std::io::{self, Stdout};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossterm::{
    cursor,
    event::{self, Event, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use fancylock_core::{
    DisplayAdapter, DisplayError, EventSender, KeyCode, KeyEvent, MonitorGeometry, SessionEvent,
};
use ratatui::prelude::*;

use crate::screens::{self, LockView};
use crate::theme::Theme;

/// How often the input thread checks for keys and for shutdown
const INPUT_POLL: Duration = Duration::from_millis(100);

struct InputThread {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Lock screen on the controlling terminal
pub struct TerminalDisplay {
    terminal: Option<Terminal<CrosstermBackend<Stdout>>>,
    input: Option<InputThread>,
    view: LockView,
    theme: Theme,
}

impl TerminalDisplay {
    pub fn new() -> Self {
        Self {
            terminal: None,
            input: None,
            view: LockView::default(),
            theme: Theme::default(),
        }
    }

    fn redraw(&mut self) {
        let Some(terminal) = self.terminal.as_mut() else {
            return;
        };
        let view = &self.view;
        let theme = &self.theme;
        if let Err(e) = terminal.draw(|frame| screens::draw(frame, view, theme, Instant::now())) {
            tracing::warn!("Failed to draw lock screen: {}", e);
        }
    }

    fn enter() -> io::Result<Terminal<CrosstermBackend<Stdout>>> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        if let Err(e) = execute!(stdout, EnterAlternateScreen, cursor::Hide) {
            let _ = disable_raw_mode();
            return Err(e);
        }
        let terminal = Terminal::new(CrosstermBackend::new(stdout));
        if terminal.is_err() {
            restore_terminal();
        }
        terminal
    }
}

impl Default for TerminalDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplayAdapter for TerminalDisplay {
    fn acquire(&mut self, events: EventSender) -> Result<Vec<MonitorGeometry>, DisplayError> {
        if self.terminal.is_some() {
            return Ok(Vec::new());
        }

        let mut terminal = Self::enter()
            .map_err(|e| DisplayError::GrabRefused(format!("terminal: {}", e)))?;
        if let Err(e) = terminal.clear() {
            restore_terminal();
            return Err(DisplayError::Io(e));
        }

        let stop = Arc::new(AtomicBool::new(false));
        let handle = match spawn_input(events, stop.clone()) {
            Ok(handle) => handle,
            Err(e) => {
                restore_terminal();
                return Err(DisplayError::MissingResource(format!("input thread: {}", e)));
            }
        };

        self.terminal = Some(terminal);
        self.input = Some(InputThread { stop, handle });
        self.view = LockView::default();
        tracing::debug!("Terminal captured");

        // Monitor layout is left to the config or the default
        Ok(Vec::new())
    }

    fn release(&mut self) {
        if let Some(input) = self.input.take() {
            input.stop.store(true, Ordering::SeqCst);
            if input.handle.join().is_err() {
                tracing::warn!("Input thread panicked");
            }
        }
        if self.terminal.take().is_some() {
            restore_terminal();
            tracing::debug!("Terminal released");
        }
    }

    fn render_password_dots(&mut self, count: usize) {
        self.view.set_dots(count);
        self.redraw();
    }

    fn render_lockout_message(&mut self, remaining: Duration) {
        self.view.set_lockout(remaining);
        self.redraw();
    }

    fn render_denied(&mut self) {
        self.view.deny(Instant::now());
        self.redraw();
    }

    fn clear_overlay(&mut self) {
        self.view.clear();
        self.redraw();
    }

    fn refresh(&mut self) {
        if self.view.expire_denied(Instant::now()) {
            self.redraw();
        }
    }
}

impl Drop for TerminalDisplay {
    fn drop(&mut self) {
        self.release();
    }
}

/// Leave raw mode and the alternate screen, ignoring failures
pub fn restore_terminal() {
    let _ = disable_raw_mode();
    let _ = execute!(io::stdout(), LeaveAlternateScreen, cursor::Show);
}

fn spawn_input(events: EventSender, stop: Arc<AtomicBool>) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("fancylock-input".to_string())
        .spawn(move || {
            while !stop.load(Ordering::SeqCst) {
                match event::poll(INPUT_POLL) {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(e) => {
                        tracing::error!("Terminal input failed: {}", e);
                        break;
                    }
                }
                match event::read() {
                    Ok(Event::Key(key)) => {
                        if events.send(SessionEvent::Key(map_key(key))).is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::error!("Terminal input failed: {}", e);
                        break;
                    }
                }
            }
        })
}

/// Translate a crossterm key into a session key
pub fn map_key(key: event::KeyEvent) -> KeyEvent {
    use event::KeyCode as Term;

    let code = match key.code {
        Term::Enter => KeyCode::Enter,
        Term::Backspace => KeyCode::Backspace,
        Term::Esc => KeyCode::Escape,
        Term::Char(_) if key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) => {
            KeyCode::Other
        }
        Term::Char(c) => KeyCode::Char(c),
        _ => KeyCode::Other,
    };

    match key.kind {
        KeyEventKind::Release => KeyEvent::release(code),
        KeyEventKind::Press | KeyEventKind::Repeat => KeyEvent::press(code),
    }
}
