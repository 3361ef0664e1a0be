//! AWS SQS adapter.

mod queue;

pub use queue::SqsQueue;
