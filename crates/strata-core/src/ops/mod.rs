mod slice;
mod subview;
mod transpose;

pub use slice::*;
pub use subview::*;
pub use transpose::*;

use std::fmt::Debug;

use crate::{InvariantError, View};

/// # Operation
///
/// A pure metadata transformation from one [View] to another. Nothing is read or written; the
/// result addresses a subset (or a reordering) of the source's cells.
pub trait Operation: Debug {
    /// # Check Invariants
    ///
    /// Structural rules the operands must satisfy against `src`.
    fn check_invariants(&self, src: &View) -> Result<(), InvariantError>;

    /// # Compute View
    ///
    /// Determine the offset, ranges & strides of the resulting view. Only called once the
    /// invariants hold.
    fn compute_view(&self, src: &View) -> View;

    fn apply(&self, src: &View) -> Result<View, InvariantError> {
        self.check_invariants(src)?;
        let dst = self.compute_view(src);
        log::trace!("{:?}: {} -> {}", self, src, dst);
        Ok(dst)
    }
}
