//! Terminal progress for interactive runs.
//!
//! Pretty mode draws `indicatif` spinners on stderr; plain mode prints one
//! line per stage. `Auto` picks pretty only on a TTY whose stdout is not
//! redirected.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::str::FromStr;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

impl FromStr for UiMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(UiMode::Auto),
            "plain" => Ok(UiMode::Plain),
            "pretty" => Ok(UiMode::Pretty),
            other => Err(anyhow::anyhow!(
                "unknown ui mode '{}' (expected auto, plain or pretty)",
                other
            )),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
    disable_pretty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool, disable_pretty: bool) -> Self {
        Self {
            mode,
            is_tty,
            disable_pretty,
        }
    }

    /// Plain output, for tests and non-interactive callers.
    pub fn plain() -> Self {
        Self::new(UiMode::Plain, false, true)
    }

    pub fn is_pretty(&self) -> bool {
        self.is_tty
            && match self.mode {
                UiMode::Pretty => true,
                UiMode::Auto => !self.disable_pretty,
                UiMode::Plain => false,
            }
    }

    pub fn stage(&self, name: &str) -> StageGuard {
        if self.is_pretty() {
            let spinner = spinner("{spinner} {msg}");
            spinner.set_message(format!("{name}…"));
            StageGuard::new(name.to_string(), Some(spinner))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None)
        }
    }

    /// Per-frame progress for a streaming run.
    pub fn stream(&self, name: &str) -> StreamProgress {
        let spinner = if self.is_pretty() {
            let spinner = spinner("{spinner} {prefix} [{elapsed}] frame {pos} {msg}");
            spinner.set_prefix(name.to_string());
            Some(spinner)
        } else {
            eprintln!("==> {}", name);
            None
        };
        StreamProgress {
            name: name.to_string(),
            frames: 0,
            defects: 0,
            start: Instant::now(),
            spinner,
        }
    }

    /// One line of status text on stderr.
    pub fn message(&self, line: &str) {
        eprintln!("{line}");
    }
}

fn spinner(template: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_draw_target(ProgressDrawTarget::stderr());
    spinner.enable_steady_tick(Duration::from_millis(120));
    let style =
        ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_spinner());
    spinner.set_style(style);
    spinner
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
        }
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let message = format!("✔ {} ({})", self.name, format_duration(elapsed));
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

pub struct StreamProgress {
    name: String,
    frames: u64,
    defects: u64,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl StreamProgress {
    pub fn frame(&mut self, defects: usize) {
        self.frames += 1;
        self.defects += defects as u64;
        if let Some(spinner) = &self.spinner {
            spinner.set_position(self.frames);
            spinner.set_message(format!("({defects} defects)"));
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Drop for StreamProgress {
    fn drop(&mut self) {
        let message = format!(
            "✔ {}: {} frames, {} defects ({})",
            self.name,
            self.frames,
            self.defects,
            format_duration(self.start.elapsed())
        );
        if let Some(spinner) = &self.spinner {
            spinner.finish_and_clear();
        }
        eprintln!("{message}");
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
