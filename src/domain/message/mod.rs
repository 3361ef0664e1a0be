//! Message module - inbound queue messages and their lifecycle.

mod inbound;
mod state;

pub use inbound::{InboundMessage, RawMessage};
pub use state::MessageState;
