//! Lock screen colour palette

use ratatui::style::{Color, Modifier, Style};

/// Colours used by the lock dialogs
pub struct Theme {
    pub accent: Color,
    pub backdrop: Color,

    pub warning: Color,
    pub danger: Color,

    pub border: Color,
    pub text_primary: Color,
    pub text_muted: Color,

    pub progress_filled: Color,
    pub progress_empty: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            accent: Color::Rgb(129, 212, 250),  // #81D4FA
            backdrop: Color::Rgb(18, 18, 18),   // #121212

            warning: Color::Rgb(255, 152, 0), // #FF9800
            danger: Color::Rgb(244, 67, 54),  // #F44336

            border: Color::Rgb(97, 97, 97),          // #616161
            text_primary: Color::Rgb(250, 250, 250), // #FAFAFA
            text_muted: Color::Rgb(117, 117, 117),   // #757575

            progress_filled: Color::Rgb(244, 67, 54),
            progress_empty: Color::Rgb(66, 66, 66),
        }
    }
}

impl Theme {
    pub fn backdrop(&self) -> Style {
        Style::default().bg(self.backdrop)
    }

    pub fn text(&self) -> Style {
        Style::default().fg(self.text_primary)
    }

    pub fn text_muted(&self) -> Style {
        Style::default().fg(self.text_muted)
    }

    pub fn title(&self) -> Style {
        Style::default().fg(self.accent).add_modifier(Modifier::BOLD)
    }

    pub fn border(&self) -> Style {
        Style::default().fg(self.border)
    }

    pub fn warning(&self) -> Style {
        Style::default().fg(self.warning)
    }

    pub fn danger(&self) -> Style {
        Style::default().fg(self.danger).add_modifier(Modifier::BOLD)
    }

    /// Style of an entered password dot
    pub fn dot(&self) -> Style {
        Style::default().fg(self.accent).add_modifier(Modifier::BOLD)
    }

    pub fn progress(&self) -> Style {
        Style::default()
            .fg(self.progress_filled)
            .bg(self.progress_empty)
    }
}
