//! Instrumentation Module
//!
//! Hooks invoked around every cache operation. An [`Instrumenter`] is
//! injected when the cache is built; [`TracingInstrumenter`] is the default.

use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{debug, debug_span, warn, Instrument};

use crate::error::{CacheError, Result};

// == Operation ==
/// Name of an instrumented cache operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Read,
    Write,
    Delete,
    Exist,
    Increment,
    Decrement,
    ReadMulti,
    WriteMulti,
    FetchMulti,
    Clear,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Read => "read",
            Operation::Write => "write",
            Operation::Delete => "delete",
            Operation::Exist => "exist",
            Operation::Increment => "increment",
            Operation::Decrement => "decrement",
            Operation::ReadMulti => "read_multi",
            Operation::WriteMulti => "write_multi",
            Operation::FetchMulti => "fetch_multi",
            Operation::Clear => "clear",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// == Event ==
/// Payload describing one instrumented operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub operation: Operation,
    /// Raw keys as passed by the caller, before namespacing. `clear` carries `*`.
    pub keys: Vec<String>,
}

impl Event {
    pub fn new(operation: Operation, keys: Vec<String>) -> Self {
        Self { operation, keys }
    }

    pub fn single(operation: Operation, key: &str) -> Self {
        Self::new(operation, vec![key.to_string()])
    }
}

/// How an instrumented operation ended.
#[derive(Debug, Clone, Copy)]
pub enum Outcome<'a> {
    Success,
    Failure(&'a CacheError),
    /// The operation was dropped before completing, e.g. by a timeout.
    Cancelled,
}

impl Outcome<'_> {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

// == Instrumenter ==
/// Observer notified before and after each cache operation.
///
/// `finish` is called exactly once per `start`, whether the operation
/// succeeded, failed or was cancelled.
pub trait Instrumenter: Send + Sync {
    fn start(&self, _event: &Event) {}

    fn finish(&self, _event: &Event, _outcome: Outcome<'_>, _elapsed: Duration) {}
}

/// Emits a `tracing` event for every finished operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingInstrumenter;

impl Instrumenter for TracingInstrumenter {
    fn finish(&self, event: &Event, outcome: Outcome<'_>, elapsed: Duration) {
        match outcome {
            Outcome::Success => debug!(
                operation = %event.operation,
                keys = ?event.keys,
                elapsed_us = elapsed.as_micros() as u64,
                "cache operation completed"
            ),
            Outcome::Failure(err) => warn!(
                operation = %event.operation,
                keys = ?event.keys,
                elapsed_us = elapsed.as_micros() as u64,
                error = %err,
                "cache operation failed"
            ),
            Outcome::Cancelled => debug!(
                operation = %event.operation,
                keys = ?event.keys,
                elapsed_us = elapsed.as_micros() as u64,
                "cache operation cancelled"
            ),
        }
    }
}

/// Ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopInstrumenter;

impl Instrumenter for NoopInstrumenter {}

// == Instrument ==
/// An event that has been started and not yet finished.
///
/// Dropping it unfinished reports [`Outcome::Cancelled`].
struct InFlight<'a> {
    instrumenter: &'a dyn Instrumenter,
    event: Event,
    started: Instant,
    finished: bool,
}

impl<'a> InFlight<'a> {
    fn start(instrumenter: &'a dyn Instrumenter, event: Event) -> Self {
        instrumenter.start(&event);
        Self {
            instrumenter,
            event,
            started: Instant::now(),
            finished: false,
        }
    }

    fn finish(mut self, outcome: Outcome<'_>) {
        self.finished = true;
        self.instrumenter
            .finish(&self.event, outcome, self.started.elapsed());
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.instrumenter
                .finish(&self.event, Outcome::Cancelled, self.started.elapsed());
        }
    }
}

/// Runs `operation` inside an instrumentation event and returns its result.
///
/// The operation is awaited exactly once; its result, success or failure, is
/// passed through unchanged after `finish` has seen it. If the returned
/// future is dropped first, `finish` still runs with [`Outcome::Cancelled`].
pub async fn instrument<T, F>(
    instrumenter: &dyn Instrumenter,
    event: Event,
    operation: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let span = debug_span!("cache", operation = event.operation.as_str());
    let in_flight = InFlight::start(instrumenter, event);

    let result = operation.instrument(span).await;

    let outcome = match &result {
        Ok(_) => Outcome::Success,
        Err(err) => Outcome::Failure(err),
    };
    in_flight.finish(outcome);
    result
}
