//! Graph Synchronizer: the recursive commit -> tree -> blob -> block
//! traversal that drives clone/pull ([`fetch`]) and push ([`collect`]).

pub mod collect;
pub mod fetch;
pub mod pathfilter;
pub mod session;

pub use collect::collect;
pub use fetch::fetch;
pub use session::{clone_or_pull, push};
