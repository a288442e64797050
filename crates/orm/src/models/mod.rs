//! Entity declarations
//!
//! The blog schema below is the reference model set: a two-level
//! section/category hierarchy, posts with comments and tags, and users who
//! write comments.

pub mod blog;

pub use blog::*;
