//! Controller layer: respondent input, reducer-like view transitions.

pub mod events;
pub mod reducer;
