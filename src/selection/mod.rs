//! Selection module
//!
//! Chooses which flattened tasks of a work get transferred.

pub mod mode;
pub mod filter;

pub use mode::{display_order, is_hq_audio, map_displayed_indices, parse_index_list, SelectionMode};
pub use filter::SelectionFilter;
