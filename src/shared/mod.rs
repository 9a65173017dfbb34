//! Small helpers shared across modules

pub mod duration;
pub mod patterns;

pub use patterns::PatternSet;
