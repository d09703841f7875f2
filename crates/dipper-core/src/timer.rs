//! Timer abstraction for testability.
//!
//! The scheduler never sleeps directly. It asks a [`Timer`] for a stream of
//! ticks, so tests can drive cycles by hand instead of waiting for real time.

use std::pin::Pin;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_stream::Stream;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;

/// Stream of tick instants (the payload carries no information)
pub type TickStream = Pin<Box<dyn Stream<Item = ()> + Send + 'static>>;

/// Source of periodic ticks
///
/// Implementations must yield the first tick immediately. A stream that ends
/// stops the cycle driven by it.
pub trait Timer: Send + Sync {
    /// Ticks every `period`
    fn ticks(&self, period: Duration) -> TickStream;
}

/// Production timer backed by `tokio::time::interval`
///
/// A tick that runs long delays the following ones instead of bursting to
/// catch up.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimer;

impl Timer for TokioTimer {
    fn ticks(&self, period: Duration) -> TickStream {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Box::pin(IntervalStream::new(interval).map(|_| ()))
    }
}
