//! Progress reporting
//!
//! [`ProgressReporter`] keeps the authoritative [`ProgressState`] for a run and
//! mirrors it onto an `indicatif` bar when drawing is enabled. In step mode it
//! also owns the per-record confirmation pause, suspending the bar while the
//! prompt is on screen.

use crate::core::console::Console;
use crate::domain::Result;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

/// Snapshot of a run's progress
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressState {
    pub total: u64,
    pub completed: u64,
    pub label: String,
}

impl ProgressState {
    /// Completion percentage, 100 for an empty run
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.completed as f64 / self.total as f64 * 100.0
    }
}

/// Where the progress bar is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressDraw {
    /// Draw to stderr
    Stderr,
    /// Track state only
    Hidden,
}

/// Tracks count/advance/finish for one run
pub struct ProgressReporter {
    draw: ProgressDraw,
    state: ProgressState,
    bar: Option<ProgressBar>,
    running: bool,
}

impl ProgressReporter {
    pub fn new(draw: ProgressDraw) -> Self {
        Self {
            draw,
            state: ProgressState::default(),
            bar: None,
            running: false,
        }
    }

    /// Reporter that never draws
    pub fn hidden() -> Self {
        Self::new(ProgressDraw::Hidden)
    }

    /// Begin tracking `total` records. Starting again before `finish` is a
    /// caller bug and is ignored.
    pub fn start(&mut self, total: u64, label: &str) {
        if self.running {
            tracing::warn!(
                total = self.state.total,
                completed = self.state.completed,
                "Progress already started, ignoring second start"
            );
            return;
        }

        self.state = ProgressState {
            total,
            completed: 0,
            label: label.to_string(),
        };
        self.running = true;
        self.bar = match self.draw {
            ProgressDraw::Stderr => Some(make_progress_bar(total, label)),
            ProgressDraw::Hidden => None,
        };
    }

    /// Count one processed record
    pub fn advance(&mut self) {
        if self.state.completed < self.state.total {
            self.state.completed += 1;
        } else {
            tracing::warn!(
                total = self.state.total,
                "Progress advanced past total, source yielded more records than counted"
            );
        }

        if let Some(bar) = &self.bar {
            bar.set_position(self.state.completed);
        }
    }

    /// Stop tracking. Safe to call more than once.
    pub fn finish(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        if let Some(bar) = self.bar.take() {
            bar.finish();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    /// Ask whether to continue, defaulting to yes. The bar is hidden while the
    /// question is on screen.
    pub async fn pause_for_confirmation(
        &mut self,
        console: &mut dyn Console,
        prompt: &str,
    ) -> Result<bool> {
        if let Some(bar) = &self.bar {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        }

        console.new_line();
        console.line(&format!(
            "Processed {} of {} {}",
            self.state.completed, self.state.total, self.state.label
        ));
        let answer = console.confirm(prompt, true).await;

        if let Some(bar) = &self.bar {
            bar.set_draw_target(ProgressDrawTarget::stderr());
        }

        answer
    }
}

fn make_progress_bar(total: u64, label: &str) -> ProgressBar {
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} [{elapsed_precise}] {bar:40} {pos}/{len} {msg} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.set_message(label.to_string());
    bar.set_draw_target(ProgressDrawTarget::stderr_with_hz(12));
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::console::BufferedConsole;

    #[test]
    fn test_start_advance_finish() {
        let mut progress = ProgressReporter::hidden();
        progress.start(3, "user");
        progress.advance();
        progress.advance();

        assert!(progress.is_running());
        assert_eq!(progress.state().completed, 2);
        assert_eq!(progress.state().label, "user");

        progress.finish();
        assert!(!progress.is_running());
        assert_eq!(progress.state().completed, 2);
    }

    #[test]
    fn test_second_start_is_ignored() {
        let mut progress = ProgressReporter::hidden();
        progress.start(2, "user");
        progress.advance();
        progress.start(10, "other");

        assert_eq!(progress.state().total, 2);
        assert_eq!(progress.state().completed, 1);
    }

    #[test]
    fn test_completed_never_exceeds_total() {
        let mut progress = ProgressReporter::hidden();
        progress.start(1, "row");
        progress.advance();
        progress.advance();
        assert_eq!(progress.state().completed, 1);
    }

    #[test]
    fn test_percent() {
        let state = ProgressState {
            total: 4,
            completed: 1,
            label: "row".to_string(),
        };
        assert_eq!(state.percent(), 25.0);
        assert_eq!(ProgressState::default().percent(), 100.0);
    }

    #[tokio::test]
    async fn test_pause_for_confirmation_uses_console() {
        let mut progress = ProgressReporter::hidden();
        progress.start(2, "users");
        progress.advance();

        let mut console = BufferedConsole::new().with_answers([false]);
        let answer = progress
            .pause_for_confirmation(&mut console, "Continue?")
            .await
            .unwrap();

        assert!(!answer);
        assert!(console.contains("Processed 1 of 2 users"));
        assert_eq!(console.questions_asked(), 1);
    }
}
