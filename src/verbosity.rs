//! Control over non-critical status output.

use indicatif::{ProgressBar, ProgressStyle};
use lazy_static::lazy_static;
use std::fmt;

lazy_static! {
    /// Progress bar style used when none is specified.
    pub static ref DEFAULT_PROGRESS_STYLE: ProgressStyle = ProgressStyle::default_bar()
        .template("Progress: {bar:40}  {percent}% | ETA: {eta}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
}

/// How much to report while working.
#[derive(Clone)]
pub enum Verbosity {
    /// Print nothing.
    Quiet,
    /// Print status messages.
    Messages,
    /// Print status messages and show a progress bar with the given style.
    Progress(ProgressStyle),
}

impl Verbosity {
    /// Shows a progress bar with the default style.
    pub fn progress() -> Self {
        Self::Progress(DEFAULT_PROGRESS_STYLE.clone())
    }

    /// Whether status messages should be printed.
    pub fn print_messages(&self) -> bool {
        !matches!(self, Self::Quiet)
    }

    /// Creates a progress bar for the given number of items, hidden unless
    /// progress should be shown.
    pub fn create_progress_bar(&self, length: usize) -> ProgressBar {
        match self {
            Self::Progress(style) => ProgressBar::new(length as u64).with_style(style.clone()),
            _ => ProgressBar::hidden(),
        }
    }
}

impl fmt::Debug for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The progress style carries no printable state
        f.write_str(match self {
            Self::Quiet => "Quiet",
            Self::Messages => "Messages",
            Self::Progress(_) => "Progress",
        })
    }
}

impl Default for Verbosity {
    fn default() -> Self {
        Self::Quiet
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn only_progress_shows_bar() {
        assert!(Verbosity::Quiet.create_progress_bar(10).is_hidden());
        assert!(Verbosity::Messages.create_progress_bar(10).is_hidden());
        assert!(!Verbosity::Quiet.print_messages());
        assert!(Verbosity::progress().print_messages());
        assert_eq!(Verbosity::progress().create_progress_bar(10).length(), Some(10));
    }

    #[test]
    fn debug_output_names_variant() {
        assert_eq!(format!("{:?}", Verbosity::Quiet), "Quiet");
        assert_eq!(format!("{:?}", Verbosity::progress()), "Progress");
        assert_eq!(format!("{:?}", Some(Verbosity::Messages)), "Some(Messages)");
    }
}
