//! Insertion-ordered collections keyed with `ahash`.
//!
//! Collection passes iterate these maps, so insertion order (rather than
//! hash order) keeps the results reproducible between runs.

pub type RandomState = ahash::RandomState;

pub type IndexMap<K, V> = indexmap::IndexMap<K, V, RandomState>;
pub type IndexSet<T> = indexmap::IndexSet<T, RandomState>;
