//! Outbound message dispatch.
//!
//! Validates requests against registry state, resolves addresses, renders
//! payloads, and forwards exactly one send per call to the live handle.

mod bulk;
mod dispatcher;
mod template;

pub use bulk::{send_rows, BulkConfig, BulkSummary, RowOutcome};
pub use dispatcher::{Dispatcher, MessagePayload, OutboundRequest};
pub use template::render;
