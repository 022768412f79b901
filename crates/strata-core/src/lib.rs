mod align;
mod config;
mod dtype;
mod enforcer;
#[cfg(feature = "testing")]
mod ndarray_ext;
mod op;
mod ops;
mod permutation;
mod range;
mod region;
mod shape;
mod storage;
mod strides;
mod view;

pub use align::*;
pub use config::*;
pub use dtype::*;
pub use enforcer::*;
#[cfg(feature = "testing")]
pub use ndarray_ext::*;
pub use op::*;
pub use ops::*;
pub use permutation::*;
pub use range::*;
pub use region::*;
pub use shape::*;
pub use storage::*;
pub use strides::*;
pub use view::*;

use smallvec::SmallVec;
pub type RVec<T> = SmallVec<[T; 4]>;
pub type DRVec<T> = SmallVec<[T; 8]>; //Double RVec

//https://github.com/sonos/tract/blob/main/data/src/macros.rs#L2
#[macro_export]
macro_rules! rvec {
    (@one $x:expr) => (1usize);
    ($elem:expr; $n:expr) => ({
        $crate::RVec::from_elem($elem, $n)
    });
    ($($x:expr),*$(,)*) => ({
        let count = 0usize $(+ $crate::rvec![@one $x])*;
        #[allow(unused_mut)]
        let mut vec = $crate::RVec::new();
        if count <= vec.inline_size() {
            $(vec.push($x);)*
            vec
        } else {
            $crate::RVec::from_vec(vec![$($x,)*])
        }
    });
}

#[macro_export]
macro_rules! shape {
    ($($x:expr),*$(,)*) => ({
        use $crate::rvec;
        $crate::Shape::new(rvec![$($x,)*])
    });
}

pub mod prelude {
    pub use crate::{
        rvec, shape, Buffer, BufferType, DType, Element, ElementType, Heap, Indexing, Range,
        Region, View,
    };
}
