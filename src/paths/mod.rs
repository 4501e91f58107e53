//! Helpers for the `/`-delimited absolute paths used as cache keys.

mod split;

pub use split::{ROOT, is_well_formed, join_child, split_parent_and_name};
