//! Collection aliases shared across the workspace.

pub use smallvec::{smallvec, SmallVec};

pub type HashMap<K, V> = hashbrown::HashMap<K, V, foldhash::fast::RandomState>;
pub type HashSet<K> = hashbrown::HashSet<K, foldhash::fast::RandomState>;
