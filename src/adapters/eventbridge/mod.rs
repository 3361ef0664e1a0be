//! AWS EventBridge adapter.

mod publisher;

pub use publisher::EventBridgePublisher;
