//! Data models for positions and their lifecycle events.

mod event;
mod position;

pub use event::PositionEvent;
pub use position::PositionRecord;
