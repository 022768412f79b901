use std::ops::RangeInclusive;

use crate::{BufferType, ElementType};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantError {
    #[error("Rank mismatch. {accepted:?} != {actual}.")]
    RankMismatch {
        accepted: RangeInclusive<usize>,
        actual: usize,
    },
    #[error("Wrong operand arity. Allowed range is {accepted:?}, node has {actual}.")]
    ArityMismatch {
        accepted: RangeInclusive<usize>,
        actual: usize,
    },
    #[error("Axis {axis} is out of range for a view of rank {rank}.")]
    IndexOutOfRange { axis: usize, rank: usize },
    #[error("{dims:?} is not a permutation of 0..{}.", .dims.len())]
    NotAPermutation { dims: Vec<usize> },
    #[error("Alignment {0} is not a positive power of two.")]
    InvalidAlignment(usize),
    #[error("Buffer type {ty} takes {expected} size operand(s), node has {actual}.")]
    RankOrSizeMismatch {
        ty: BufferType,
        expected: usize,
        actual: usize,
    },
    #[error("Range step must be at least 1.")]
    InvalidStep,
    #[error("Vector width {0} is outside 1..={max}.", max = ElementType::MAX_LANES)]
    InvalidLanes(usize),
    #[error("Cannot reinterpret {buffer} cells as {view}.")]
    ElementTypeMismatch {
        buffer: ElementType,
        view: ElementType,
    },
    #[error("View footprint of {footprint} elements exceeds buffer of {capacity}.")]
    ViewExceedsBuffer { footprint: usize, capacity: usize },
    #[error("DType mismatch, expected {expected}, got {actual}.")]
    DTypeMismatch {
        expected: ElementType,
        actual: ElementType,
    },
}

/// # Enforcer
///
/// Enforcer enforces common structural invariants on views and their operands.
pub struct Enforcer;

impl Enforcer {
    pub fn check_rank(actual: usize, expected: usize) -> Result<(), InvariantError> {
        if actual != expected {
            return Err(InvariantError::RankMismatch {
                accepted: expected..=expected,
                actual,
            });
        }
        Ok(())
    }

    pub fn check_arity(actual: usize, expected: usize) -> Result<(), InvariantError> {
        Self::check_arity_range(actual, expected..=expected)
    }

    pub fn check_arity_range(
        actual: usize,
        accepted: RangeInclusive<usize>,
    ) -> Result<(), InvariantError> {
        if !accepted.contains(&actual) {
            return Err(InvariantError::ArityMismatch { accepted, actual });
        }
        Ok(())
    }

    pub fn check_axis(axis: usize, rank: usize) -> Result<(), InvariantError> {
        if axis >= rank {
            return Err(InvariantError::IndexOutOfRange { axis, rank });
        }
        Ok(())
    }

    pub fn check_alignment(alignment: usize) -> Result<(), InvariantError> {
        if !alignment.is_power_of_two() {
            return Err(InvariantError::InvalidAlignment(alignment));
        }
        Ok(())
    }

    /// Every value in `0..dims.len()` must appear exactly once.
    pub fn check_permutation(dims: &[usize]) -> Result<(), InvariantError> {
        let mut seen = vec![false; dims.len()];
        for &d in dims {
            match seen.get_mut(d) {
                Some(slot) if !*slot => *slot = true,
                _ => {
                    return Err(InvariantError::NotAPermutation {
                        dims: dims.to_vec(),
                    })
                }
            }
        }
        Ok(())
    }

    pub fn check_reinterpret(
        buffer: ElementType,
        view: ElementType,
    ) -> Result<(), InvariantError> {
        if !buffer.can_reinterpret_as(&view) {
            return Err(InvariantError::ElementTypeMismatch { buffer, view });
        }
        Ok(())
    }

    pub fn check_dtype(expected: ElementType, actual: ElementType) -> Result<(), InvariantError> {
        if expected != actual {
            return Err(InvariantError::DTypeMismatch { expected, actual });
        }
        Ok(())
    }

    /// A buffer type with a static size forbids a size operand, a dynamic one requires it.
    pub fn check_size_operand(ty: &BufferType, provided: bool) -> Result<(), InvariantError> {
        let expected = usize::from(ty.is_dynamic());
        let actual = usize::from(provided);
        if expected != actual {
            return Err(InvariantError::RankOrSizeMismatch {
                ty: *ty,
                expected,
                actual,
            });
        }
        Ok(())
    }
}
