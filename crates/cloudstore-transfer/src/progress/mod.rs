//! Progress throttling and delivery.
//!
//! Workers publish snapshots through a [`ThrottledReporter`], which rate-limits
//! intermediate snapshots while always delivering the first and the final one.

mod throttle;

pub use throttle::ProgressThrottle;

use cloudstore_core::transfer::{ProgressSnapshot, TransferFailure, TransferReporter};

/// A reporter wrapped with a throttle.
#[derive(Debug)]
pub struct ThrottledReporter<P, T, E> {
    reporter: TransferReporter<P, T, E>,
    throttle: ProgressThrottle,
}

impl<P, T, E> ThrottledReporter<P, T, E>
where
    P: ProgressSnapshot,
    T: Send + 'static,
    E: TransferFailure,
{
    /// Wrap `reporter`.
    pub const fn new(reporter: TransferReporter<P, T, E>, throttle: ProgressThrottle) -> Self {
        Self { reporter, throttle }
    }

    /// Publish a snapshot if the throttle allows it.
    pub fn report(&mut self, snapshot: P) {
        if self.throttle.should_emit() {
            self.reporter.report(snapshot);
        }
    }

    /// Publish a snapshot regardless of the throttle.
    pub fn report_now(&mut self, snapshot: P) {
        self.throttle.reset();
        self.report(snapshot);
    }

    /// Unwrap, for delivering the terminal result.
    pub fn into_inner(self) -> TransferReporter<P, T, E> {
        self.reporter
    }
}
