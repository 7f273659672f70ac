//! B+-Tree index: ordered mapping from a fixed-width key to a set of
//! RIDs, built on the buffer pool's typed pages.

mod cursor;
mod tree;

pub use cursor::{KeyCursor, RidCursor};
pub use tree::BTreeIndex;
