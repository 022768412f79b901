///Buffers may carry an explicit alignment request, which must be a positive power of two.
///When none is given, a buffer is aligned to its element's natural alignment, raised to the
///heap's configured minimum (see [crate::HeapConfig]).
///
///The `Align` trait provides methods to calculate the padding needed to reach an alignment,
///and to test whether a usize already sits on it.
pub trait Align {
    fn calculate_alignment(&self, alignment: usize) -> usize;
    fn is_aligned_to(&self, alignment: usize) -> bool;
}

impl Align for usize {
    fn calculate_alignment(&self, alignment: usize) -> usize {
        let remainder = self % alignment;
        if remainder == 0 {
            0
        } else {
            alignment - remainder
        }
    }

    fn is_aligned_to(&self, alignment: usize) -> bool {
        self.calculate_alignment(alignment) == 0
    }
}
