//! Lock screen drawing
//!
//! Pure functions of [`LockView`], so the terminal adapter only has to keep
//! the view current and redraw.

use std::time::{Duration, Instant};

use fancylock_core::lockout::format_countdown;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Gauge, Paragraph};

use crate::theme::Theme;

/// How long the denial banner stays up
pub const DENIED_BANNER: Duration = Duration::from_secs(2);

/// Everything the lock screen shows
#[derive(Debug, Clone, Default)]
pub struct LockView {
    pub dots: usize,
    pub denied_at: Option<Instant>,
    pub lockout: Option<LockoutView>,
    /// Nothing but the backdrop is drawn
    pub cleared: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct LockoutView {
    pub remaining: Duration,
    pub total: Duration,
}

impl LockView {
    pub fn set_dots(&mut self, count: usize) {
        self.dots = count;
        self.lockout = None;
        self.cleared = false;
    }

    pub fn set_lockout(&mut self, remaining: Duration) {
        let total = match self.lockout {
            Some(current) if current.total >= remaining => current.total,
            _ => remaining,
        };
        self.lockout = Some(LockoutView { remaining, total });
        self.cleared = false;
    }

    pub fn deny(&mut self, now: Instant) {
        self.denied_at = Some(now);
        self.cleared = false;
    }

    pub fn clear(&mut self) {
        *self = Self {
            cleared: true,
            ..Self::default()
        };
    }

    /// Drop an expired denial banner. Returns true if the screen changed.
    pub fn expire_denied(&mut self, now: Instant) -> bool {
        if self.denied_at.is_some() && !self.denied(now) {
            self.denied_at = None;
            return true;
        }
        false
    }

    pub fn denied(&self, now: Instant) -> bool {
        self.denied_at
            .is_some_and(|at| now.saturating_duration_since(at) < DENIED_BANNER)
    }
}

/// Draw the whole lock screen
pub fn draw(frame: &mut Frame, view: &LockView, theme: &Theme, now: Instant) {
    let area = frame.area();
    frame.render_widget(Block::default().style(theme.backdrop()), area);

    if view.cleared {
        return;
    }
    match view.lockout {
        Some(lockout) => draw_lockout(frame, area, lockout, theme),
        None => draw_entry(frame, area, view, theme, now),
    }
}

fn draw_entry(frame: &mut Frame, area: Rect, view: &LockView, theme: &Theme, now: Instant) {
    let dialog = centered_rect_fixed(44, 11, area);

    let block = Block::default()
        .title(" Screen Locked ")
        .title_style(theme.title())
        .borders(Borders::ALL)
        .border_style(theme.border());

    let inner = block.inner(dialog);
    frame.render_widget(block, dialog);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(2), // Prompt
            Constraint::Length(2), // Dots
            Constraint::Length(1), // Denied banner
            Constraint::Min(0),
            Constraint::Length(1), // Help
        ])
        .split(inner);

    let prompt = Paragraph::new("Enter your password to unlock")
        .style(theme.text())
        .alignment(Alignment::Center);
    frame.render_widget(prompt, chunks[0]);

    let dots = Paragraph::new(dot_row(view.dots))
        .style(theme.dot())
        .alignment(Alignment::Center);
    frame.render_widget(dots, chunks[1]);

    if view.denied(now) {
        let banner = Paragraph::new("Access denied")
            .style(theme.danger())
            .alignment(Alignment::Center);
        frame.render_widget(banner, chunks[2]);
    }

    let help = Paragraph::new("[Enter] Unlock    [Esc] Clear")
        .style(theme.text_muted())
        .alignment(Alignment::Center);
    frame.render_widget(help, chunks[4]);
}

fn draw_lockout(frame: &mut Frame, area: Rect, lockout: LockoutView, theme: &Theme) {
    let dialog = centered_rect_fixed(44, 11, area);

    let block = Block::default()
        .title(" Locked Out ")
        .title_style(theme.danger())
        .borders(Borders::ALL)
        .border_style(theme.danger());

    let inner = block.inner(dialog);
    frame.render_widget(block, dialog);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(2), // Message
            Constraint::Length(2), // Countdown
            Constraint::Length(1), // Progress
            Constraint::Min(0),
        ])
        .split(inner);

    let message = Paragraph::new("Too many failed attempts")
        .style(theme.text())
        .alignment(Alignment::Center);
    frame.render_widget(message, chunks[0]);

    let countdown = Paragraph::new(format!("Try again in {}", format_countdown(lockout.remaining)))
        .style(theme.warning())
        .alignment(Alignment::Center);
    frame.render_widget(countdown, chunks[1]);

    let gauge = Gauge::default()
        .gauge_style(theme.progress())
        .ratio(elapsed_ratio(lockout))
        .label("");
    frame.render_widget(gauge, chunks[2]);
}

/// One dot per character, spaced for readability
fn dot_row(count: usize) -> String {
    vec!["●"; count].join(" ")
}

/// Fraction of the lockout already served, in `0.0..=1.0`
fn elapsed_ratio(lockout: LockoutView) -> f64 {
    if lockout.total.is_zero() {
        return 1.0;
    }
    let served = lockout.total.saturating_sub(lockout.remaining);
    (served.as_secs_f64() / lockout.total.as_secs_f64()).clamp(0.0, 1.0)
}

/// Create a fixed-size centered box
fn centered_rect_fixed(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(area.width), height.min(area.height))
}
