//! Progress reporting and cooperative cancellation
//!
//! A job owns one [`ProgressSink`] and one [`CancelToken`] and hands them to
//! every stage explicitly. Sinks must return immediately: they are called
//! from the decode and resample hot loops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::Sender;
use serde::Serialize;

use crate::error::{ConvertError, Result};

/// Reporting granularity in percent
pub const PROGRESS_STEP_PERCENT: usize = 4;

/// Pipeline stage a progress update refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Decode,
    Resample,
}

/// A single progress notification
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProgressUpdate {
    /// Index of the logger in file-sorted order
    pub logger: usize,
    pub stage: Stage,
    /// Completion in percent (0-100)
    pub percent: u8,
}

/// Receiver of progress notifications
pub trait ProgressSink: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

/// Sink that drops every update
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn report(&self, _update: ProgressUpdate) {}
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        self(update)
    }
}

/// Sink that forwards updates into a channel without blocking
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    sender: Sender<ProgressUpdate>,
}

impl ChannelProgress {
    pub fn new(sender: Sender<ProgressUpdate>) -> Self {
        Self { sender }
    }
}

impl ProgressSink for ChannelProgress {
    fn report(&self, update: ProgressUpdate) {
        // A full or disconnected channel only loses a progress tick.
        let _ = self.sender.try_send(update);
    }
}

/// Turns per-item loop counters into fixed-granularity progress updates
pub struct ProgressTicker<'a> {
    sink: &'a dyn ProgressSink,
    logger: usize,
    stage: Stage,
    total: usize,
    step: usize,
    next: usize,
}

impl<'a> ProgressTicker<'a> {
    pub fn new(sink: &'a dyn ProgressSink, logger: usize, stage: Stage, total: usize) -> Self {
        let step = (total * PROGRESS_STEP_PERCENT / 100).max(1);
        Self {
            sink,
            logger,
            stage,
            total,
            step,
            next: 0,
        }
    }

    /// Record that `done` items are complete
    #[inline]
    pub fn tick(&mut self, done: usize) {
        if done < self.next {
            return;
        }
        self.next = done + self.step;
        self.emit(done);
    }

    /// Report the stage as complete
    pub fn finish(&mut self) {
        self.next = usize::MAX;
        self.emit(self.total);
    }

    fn emit(&self, done: usize) {
        let percent = if self.total == 0 {
            100
        } else {
            ((done.min(self.total) * 100) / self.total) as u8
        };
        self.sink.report(ProgressUpdate {
            logger: self.logger,
            stage: self.stage,
            percent,
        });
    }
}

/// Shared flag checked between logger tasks and between chunked reads
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Fail with [`ConvertError::Cancelled`] once cancellation was requested
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(ConvertError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_ticker_reports_at_fixed_granularity() {
        let seen = Mutex::new(Vec::new());
        let sink = |u: ProgressUpdate| seen.lock().unwrap().push(u.percent);

        let mut ticker = ProgressTicker::new(&sink, 0, Stage::Decode, 1000);
        for i in 0..1000 {
            ticker.tick(i);
        }
        ticker.finish();

        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.first(), Some(&0));
        assert_eq!(seen.last(), Some(&100));
        // 25 ticks at 4% plus the final 100%
        assert_eq!(seen.len(), 26);
    }

    #[test]
    fn test_ticker_small_totals() {
        let count = Mutex::new(0usize);
        let sink = |_: ProgressUpdate| *count.lock().unwrap() += 1;

        let mut ticker = ProgressTicker::new(&sink, 1, Stage::Resample, 3);
        for i in 0..3 {
            ticker.tick(i);
        }
        assert_eq!(*count.lock().unwrap(), 3);
    }

    #[test]
    fn test_channel_progress_never_blocks() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let sink = ChannelProgress::new(tx);
        let update = ProgressUpdate {
            logger: 0,
            stage: Stage::Decode,
            percent: 4,
        };
        sink.report(update);
        sink.report(update);
        assert_eq!(rx.try_iter().count(), 1);
    }

    #[test]
    fn test_cancel_token() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(token.check().is_ok());
        clone.cancel();
        assert!(matches!(token.check(), Err(ConvertError::Cancelled)));
    }
}
