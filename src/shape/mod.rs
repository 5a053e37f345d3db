//! # Result Shaping
//!
//! Turns persisted entities, with their eagerly loaded relations, into
//! JSON-ready nested objects.

mod selection;
mod shaper;

pub use selection::ColumnSelection;
pub use shaper::ResultShaper;
