//! Test doubles for the host capability traits.
//!
//! `MockExecutionSink` records every operation it is asked to run and can
//! be scripted to fail, so runner behavior can be checked without a
//! database.

mod observer;
mod sink;

pub use observer::RecordingObserver;
pub use sink::{ExecutedOperation, MockExecutionSink};

pub use crate::migration::InMemoryVersionStore;
