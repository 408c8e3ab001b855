use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;

/// Raised at a safe point once the user asked to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("update canceled")]
pub struct Canceled;

/// Shared cancellation flag; clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Handle a user interrupt: the first one cancels cooperatively.
    ///
    /// Returns `true` when the token was already canceled, i.e. the user
    /// interrupted twice and the caller should stop waiting.
    pub fn interrupt(&self) -> bool {
        self.0.swap(true, Ordering::SeqCst)
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

const SCALE: u64 = 1000;

/// Progress of one background task: a fraction, two lines of text and the
/// cancellation token checked between providers.
#[derive(Clone)]
pub struct ProgressIndicator {
    token: CancelToken,
    bar: ProgressBar,
}

impl ProgressIndicator {
    /// Terminal spinner bound to `token`.
    pub fn new(token: CancelToken, title: &str) -> Self {
        let bar = ProgressBar::new(SCALE);
        bar.set_style(spinner_style());
        bar.set_message(title.to_string());
        bar.enable_steady_tick(Duration::from_millis(80));
        Self { token, bar }
    }

    /// Indicator that renders nothing.
    pub fn hidden(token: CancelToken) -> Self {
        Self {
            token,
            bar: ProgressBar::hidden(),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_canceled(&self) -> bool {
        self.token.is_canceled()
    }

    pub fn check_canceled(&self) -> Result<(), Canceled> {
        if self.is_canceled() {
            return Err(Canceled);
        }
        Ok(())
    }

    pub fn set_fraction(&self, fraction: f64) {
        let clamped = fraction.clamp(0.0, 1.0);
        self.bar.set_position((clamped * SCALE as f64).round() as u64);
    }

    pub fn fraction(&self) -> f64 {
        self.bar.position() as f64 / SCALE as f64
    }

    pub fn set_text(&self, text: impl Into<String>) {
        self.bar.set_message(text.into());
    }

    pub fn set_text2(&self, text: impl Into<String>) {
        self.bar.set_prefix(text.into());
    }

    pub fn finish(&self, canceled: bool) {
        if canceled {
            self.bar.set_style(err_style());
            self.bar.finish_with_message("update canceled");
        } else {
            self.bar.set_style(ok_style());
            self.bar.finish_and_clear();
        }
    }
}

/// Yellow braille spinner with percentage, primary text and secondary text.
fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("\x1b[33m{spinner}\x1b[0m {percent:>3}% {msg} {prefix:.dim}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⣾", "⣽", "⣻", "⢿", "⡿", "⣟", "⣯", "⣷"])
}

fn ok_style() -> ProgressStyle {
    ProgressStyle::with_template("\x1b[32m✔\x1b[0m {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn err_style() -> ProgressStyle {
    ProgressStyle::with_template("\x1b[31m✘\x1b[0m {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}
