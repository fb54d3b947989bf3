use std::io::IsTerminal as _;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

/// Logs progress with growing pauses when no terminal is attached.
struct LogBackoff {
    last_logged: Instant,
    iteration: u32,
}

impl LogBackoff {
    fn new(last_logged: Instant) -> Self {
        Self {
            last_logged,
            iteration: 0,
        }
    }

    fn delay(&self) -> Duration {
        // capped at 5<<10 = 5120s, about 1.4h
        Duration::from_secs(5_u64 << self.iteration.min(10))
    }

    fn should_log(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last_logged) > self.delay() {
            self.last_logged = now;
            self.iteration += 1;
            true
        } else {
            false
        }
    }
}

enum MaybeInteractiveProgressBar {
    Interactive(ProgressBar),
    NonInteractive {
        log_backoff: LogBackoff,
        total: u64,
        current: u64,
    },
}

impl MaybeInteractiveProgressBar {
    fn new(total: u64, started_at: Instant) -> Self {
        if std::io::stdout().is_terminal() && std::io::stderr().is_terminal() {
            let bar = ProgressBar::new(total);
            match ProgressStyle::with_template(
                "{elapsed_precise} -> eta: {eta} [{bar:40.cyan/blue} {percent}%] {pos}/{human_len} ({per_sec})",
            ) {
                Ok(style) => bar.set_style(style.progress_chars("█▓▒░ ")),
                Err(e) => warn!("Invalid progress bar template: {e}"),
            }
            Self::Interactive(bar)
        } else {
            Self::NonInteractive {
                log_backoff: LogBackoff::new(started_at),
                total,
                current: 0,
            }
        }
    }
}

/// Progress display of a generation job, fed from
/// [`JobEvent::ProgressUpdated`](crate::job::JobEvent::ProgressUpdated).
pub struct TileProgress {
    bar: MaybeInteractiveProgressBar,
    started_at: Instant,
}

impl TileProgress {
    #[must_use]
    pub fn new(total: u64) -> Self {
        let started_at = Instant::now();
        Self {
            bar: MaybeInteractiveProgressBar::new(total, started_at),
            started_at,
        }
    }

    pub fn set_position(&mut self, done: u64) {
        match &mut self.bar {
            MaybeInteractiveProgressBar::Interactive(bar) => bar.set_position(done),
            MaybeInteractiveProgressBar::NonInteractive {
                log_backoff,
                total,
                current,
            } => {
                *current = done;
                if log_backoff.should_log(Instant::now()) {
                    let percent = done.saturating_mul(100) / (*total).max(1);
                    let elapsed = self.started_at.elapsed();
                    info!("Rendered {done}/{total} ({percent}%) tiles in {elapsed:?}");
                }
            }
        }
    }

    pub fn finish(&self) {
        let done = match &self.bar {
            MaybeInteractiveProgressBar::Interactive(bar) => {
                bar.finish();
                bar.position()
            }
            MaybeInteractiveProgressBar::NonInteractive { current, .. } => *current,
        };
        let elapsed = self.started_at.elapsed();
        info!("Finished rendering {done} tiles in {elapsed:?}");
    }
}
