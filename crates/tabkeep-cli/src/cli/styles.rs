//! Terminal styles shared by the renderers.
//!
//! `console` drops the escape codes on its own when stdout is not a terminal,
//! so callers never branch on that.

use console::Style;

pub fn index() -> Style {
    Style::new().color256(178)
}

pub fn title() -> Style {
    Style::new().bold()
}

pub fn muted() -> Style {
    Style::new().color256(243)
}

pub fn faint() -> Style {
    Style::new().color256(249)
}

pub fn success() -> Style {
    Style::new().green()
}

pub fn warning() -> Style {
    Style::new().yellow().bold()
}

pub fn error() -> Style {
    Style::new().red().bold()
}
