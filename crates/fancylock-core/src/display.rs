//! Display adapter contract
//!
//! The core never draws. An adapter grabs input exclusively, forwards key
//! events through the [`EventSender`] it receives in [`DisplayAdapter::acquire`]
//! and executes the render commands below.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::DisplayError;
use crate::events::EventSender;

/// Position and size of one physical output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorGeometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl MonitorGeometry {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

impl Default for MonitorGeometry {
    /// A single 1920x1080 output at the origin
    fn default() -> Self {
        Self::new(0, 0, 1920, 1080)
    }
}

impl fmt::Display for MonitorGeometry {
    /// X11-style geometry: `WxH+X+Y`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// Rendering and input backend consumed by the session controller
pub trait DisplayAdapter: Send {
    /// Grab exclusive input, start forwarding key events and return the
    /// monitors to cover. Failure means the screen must not be locked.
    fn acquire(&mut self, events: EventSender) -> Result<Vec<MonitorGeometry>, DisplayError>;

    /// Stop forwarding input and give the display back. Must be idempotent.
    fn release(&mut self);

    /// Show `count` password dots
    fn render_password_dots(&mut self, count: usize);

    /// Show the lockout countdown
    fn render_lockout_message(&mut self, remaining: Duration);

    /// Brief feedback for a rejected or refused attempt
    fn render_denied(&mut self);

    /// Remove any overlay
    fn clear_overlay(&mut self);

    /// Periodic chance to redraw time-dependent feedback while locked
    fn refresh(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_string() {
        assert_eq!(MonitorGeometry::new(1920, 0, 2560, 1440).to_string(), "2560x1440+1920+0");
        assert_eq!(MonitorGeometry::default().to_string(), "1920x1080+0+0");
    }
}
