//! Host graphlet toolkit: flow aggregation, the version 3 graphlet edge stream,
//! metadata scanning and DOT rendering.
pub mod graphlet;
