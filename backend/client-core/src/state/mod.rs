//! Central state container: the tree, its mutations and the store actor.

pub mod mutation;
pub mod reducer;
pub mod store;
pub mod tree;

pub use mutation::Mutation;
pub use store::{StateCommand, Store};
pub use tree::AppState;
