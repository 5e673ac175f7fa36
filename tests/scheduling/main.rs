//! Dispatch-order tests for the priority queue behind a single busy worker.

mod priority_dispatch;
mod queued_timeouts;
