//! Primitives shared across the formula graph crates.

pub mod hash;
pub mod lock;
