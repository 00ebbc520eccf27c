//! Lookup tables used inside the engine.

#[cfg(not(feature = "std-hash"))]
pub(crate) use hashbrown::{HashMap, HashSet};

#[cfg(feature = "std-hash")]
pub(crate) use std::collections::{HashMap, HashSet};
