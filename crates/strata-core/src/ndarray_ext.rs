use ndarray::{ArrayD, ArrayViewD, IxDyn};

use crate::{Buffer, Heap, Range, TensorDType, View};

/// Conversions between heap views and [ndarray] arrays, for checking view arithmetic against
/// an independent implementation.
pub trait NDArrayExt {
    /// Copies the cells of `view` into an owned array of the view's shape.
    fn to_ndarray<T: TensorDType>(&self, view: &View) -> anyhow::Result<ArrayD<T>>;

    /// Allocates a buffer holding `array` in row-major order, and a dense view over all of it.
    fn from_ndarray<T: TensorDType>(&self, array: ArrayViewD<T>) -> anyhow::Result<(Buffer, View)>;
}

impl NDArrayExt for Heap {
    fn to_ndarray<T: TensorDType>(&self, view: &View) -> anyhow::Result<ArrayD<T>> {
        let data = self.gather::<T>(view)?;
        Ok(ArrayD::from_shape_vec(IxDyn(&view.shape().to_vec()), data)?)
    }

    fn from_ndarray<T: TensorDType>(&self, array: ArrayViewD<T>) -> anyhow::Result<(Buffer, View)> {
        let data = array.iter().copied().collect::<Vec<_>>();
        let buffer = self.from_slice(&data)?;
        let ranges = array.shape().iter().map(|&n| Range::from(0..n)).collect();
        let view = self.view(&buffer, ranges, None)?;
        Ok((buffer, view))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Indexing;
    use ndarray::{s, Array};

    #[test]
    fn views_match_ndarray_slicing() {
        let heap = Heap::default();
        let reference = Array::from_shape_fn((6, 5), |(i, j)| (i * 5 + j) as i32);
        let (_, view) = heap.from_ndarray(reference.view().into_dyn()).unwrap();

        let strided = view
            .slice(&[
                Indexing::Range(Range::new(1, 6, 2).unwrap()),
                Indexing::Range(Range::new(0, 5, 3).unwrap()),
            ])
            .unwrap();
        assert_eq!(
            heap.to_ndarray::<i32>(&strided).unwrap(),
            reference.slice(s![1..6;2, 0..5;3]).into_dyn()
        );

        let transposed = view.transpose(&[1, 0]).unwrap();
        assert_eq!(
            heap.to_ndarray::<i32>(&transposed).unwrap(),
            reference.t().into_dyn()
        );

        let column = view.slice(&[(0..6).into(), 4.into()]).unwrap();
        assert_eq!(
            heap.to_ndarray::<i32>(&column).unwrap(),
            reference.slice(s![.., 4]).into_dyn()
        );
    }

    #[test]
    fn dtype_must_match() {
        let heap = Heap::default();
        let (_, view) = heap
            .from_ndarray(Array::<f32, _>::zeros(IxDyn(&[2, 2])).view())
            .unwrap();
        assert!(heap.to_ndarray::<u32>(&view).is_err());
    }
}
