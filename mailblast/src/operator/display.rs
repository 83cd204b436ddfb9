//! Live progress display.
//!
//! A background task samples the [`ProgressTracker`] on a fixed interval and
//! hands each snapshot to a [`ProgressObserver`]. The dispatch loop never
//! waits on it.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossterm::{
    cursor, queue,
    style::Print,
    terminal::{Clear, ClearType},
};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::warn;

use super::ProgressObserver;
use crate::dispatch::{ProgressTracker, RunCounters};

/// Width of each bar in characters.
const BAR_WIDTH: usize = 40;

/// Handle to the running display task.
pub struct ProgressDisplay {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ProgressDisplay {
    /// Start observing `tracker` every `every` until [`stop`](Self::stop) is called.
    pub fn spawn(
        tracker: Arc<ProgressTracker>,
        total: u64,
        every: Duration,
        observer: Arc<dyn ProgressObserver>,
    ) -> Self {
        let (stop_tx, mut stop_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => observer.observe(tracker.snapshot(), total),
                }
            }

            observer.finish(tracker.snapshot(), total);
        });

        Self {
            stop: Some(stop_tx),
            task,
        }
    }

    /// Render a final frame and wait for the task to exit.
    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Err(e) = (&mut self.task).await {
            warn!(error = %e, "progress_display_failed");
        }
    }
}

/// Four bars on stdout, redrawn in place.
#[derive(Debug, Default)]
pub struct TerminalProgress {
    drawn: Mutex<bool>,
}

impl TerminalProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write one frame, moving back over the previous frame if one was drawn.
    pub fn draw<W: Write>(&self, out: &mut W, counters: RunCounters, total: u64) -> io::Result<()> {
        let mut drawn = match self.drawn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let frame = render_bars(counters, total);
        if *drawn {
            queue!(out, cursor::MoveUp(frame.len() as u16))?;
        }
        for line in &frame {
            queue!(out, Clear(ClearType::CurrentLine), Print(line), Print("\n"))?;
        }
        out.flush()?;

        *drawn = true;
        Ok(())
    }
}

impl ProgressObserver for TerminalProgress {
    fn observe(&self, counters: RunCounters, total: u64) {
        if let Err(e) = self.draw(&mut std::io::stdout().lock(), counters, total) {
            warn!(error = %e, "progress_draw_failed");
        }
    }
}

/// Render the Processed/Sent/Failed/Skipped bars as text lines.
pub fn render_bars(counters: RunCounters, total: u64) -> Vec<String> {
    [
        ("Processed", counters.processed),
        ("Sent", counters.sent),
        ("Failed", counters.failed),
        ("Skipped", counters.skipped),
    ]
    .iter()
    .map(|(task, value)| render_bar(task, *value, total))
    .collect()
}

fn render_bar(task: &str, value: u64, total: u64) -> String {
    let filled = if total == 0 {
        0
    } else {
        ((value.min(total) as u128 * BAR_WIDTH as u128) / total as u128) as usize
    };
    let percent = if total == 0 { 0 } else { value * 100 / total };

    format!(
        "{:<9} [{}{}] {:>3}% | {}/{}",
        task,
        "█".repeat(filled),
        "░".repeat(BAR_WIDTH - filled),
        percent,
        value,
        total
    )
}
