//! Filesystem-level views built on top of the metadata store: a lazily expanded
//! tree for display, and populating a store from a seed tree.

mod seeder;
mod tree;

pub use seeder::seed;
pub use tree::TreeNode;
