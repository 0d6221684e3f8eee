//! Object graph traversal: reachability closure and ancestry checks.
//!
//! Both walks use an explicit work list with a visited set. Commit graphs
//! are acyclic by construction, but the inputs may be adversarial, so the
//! visited set is load-bearing, not an optimization.

mod ancestry;
mod reach;

#[cfg(test)]
mod tests_support;

pub use ancestry::is_fast_forward;
pub use reach::{objects_to_send, reachable};

use vec_store::StoreError;

/// Errors from graph traversal.
#[derive(Debug, thiserror::Error)]
pub enum WalkError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Object(#[from] vec_object::ObjectError),
}
