use half::{bf16, f16};
use serde::{Deserialize, Serialize};

use crate::{DRVec, InvariantError};

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Default, Hash, Serialize, Deserialize, strum_macros::EnumIter,
)]
pub enum DType {
    F16,
    BF16,
    #[default]
    F32,
    I32,
    U32,
}

impl DType {
    /// Returns the size of the type in bytes.
    pub fn size_of(self) -> usize {
        match self {
            DType::F16 => 2,
            DType::BF16 => 2,
            DType::F32 => 4,
            DType::I32 => 4,
            DType::U32 => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DType::F16 => "f16",
            DType::BF16 => "bf16",
            DType::F32 => "f32",
            DType::I32 => "i32",
            DType::U32 => "u32",
        }
    }
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// # ElementType
///
/// The unit stored in a single buffer cell: a scalar, or a fixed-width vector of scalars.
///
/// A view may read a buffer through a different element type only when both types occupy the
/// same number of bytes, see [ElementType::can_reinterpret_as].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementType {
    dt: DType,
    lanes: u8,
}

impl ElementType {
    pub const MAX_LANES: usize = 16;

    pub const fn scalar(dt: DType) -> Self {
        Self { dt, lanes: 1 }
    }

    pub fn vector(dt: DType, lanes: usize) -> Result<Self, InvariantError> {
        if lanes == 0 || lanes > Self::MAX_LANES {
            return Err(InvariantError::InvalidLanes(lanes));
        }
        Ok(Self {
            dt,
            lanes: lanes as u8,
        })
    }

    pub fn dt(&self) -> DType {
        self.dt
    }

    pub fn lanes(&self) -> usize {
        self.lanes as usize
    }

    pub fn is_scalar(&self) -> bool {
        self.lanes == 1
    }

    /// Size of one cell in bytes.
    pub fn size_of(&self) -> usize {
        self.dt.size_of() * self.lanes()
    }

    /// Natural alignment of one cell, the alignment of its scalar.
    pub fn align_of(&self) -> usize {
        self.dt.size_of()
    }

    /// Bit-cast rule: any two element types of equal byte width are interchangeable.
    pub fn can_reinterpret_as(&self, other: &ElementType) -> bool {
        self.size_of() == other.size_of()
    }
}

impl Default for ElementType {
    fn default() -> Self {
        Self::scalar(DType::default())
    }
}

impl From<DType> for ElementType {
    fn from(dt: DType) -> Self {
        Self::scalar(dt)
    }
}

impl std::fmt::Display for ElementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_scalar() {
            write!(f, "{}", self.dt)
        } else {
            write!(f, "vector<{}x{}>", self.lanes, self.dt)
        }
    }
}

pub trait TensorDType:
    Clone
    + Copy
    + std::fmt::Debug
    + PartialEq
    + 'static
    + num_traits::Zero
    + Send
    + Sync
    + bytemuck::Pod
{
    fn dt() -> DType;

    fn element_type() -> ElementType {
        ElementType::scalar(Self::dt())
    }
}

macro_rules! map_type {
    ($t:ty, $v:ident) => {
        impl TensorDType for $t {
            fn dt() -> DType {
                DType::$v
            }
        }
    };
}

map_type!(f32, F32);
map_type!(i32, I32);
map_type!(u32, U32);
map_type!(f16, F16);
map_type!(bf16, BF16);

/// # Element
///
/// A dynamically typed cell value, as produced by a load or consumed by a store.
/// Lanes are kept as their little-endian byte image so equality is bitwise.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Element {
    ty: ElementType,
    bytes: DRVec<u8>,
}

impl Element {
    pub fn scalar<T: TensorDType>(value: T) -> Self {
        Self {
            ty: T::element_type(),
            bytes: bytemuck::bytes_of(&value).into(),
        }
    }

    pub fn vector<T: TensorDType>(lanes: &[T]) -> Result<Self, InvariantError> {
        let ty = ElementType::vector(T::dt(), lanes.len())?;
        Ok(Self {
            ty,
            bytes: bytemuck::cast_slice::<T, u8>(lanes).into(),
        })
    }

    pub(crate) fn from_bytes(ty: ElementType, bytes: &[u8]) -> Self {
        assert_eq!(bytes.len(), ty.size_of());
        Self {
            ty,
            bytes: bytes.into(),
        }
    }

    pub fn ty(&self) -> ElementType {
        self.ty
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the scalar value if this is a scalar of type `T`.
    pub fn get<T: TensorDType>(&self) -> Option<T> {
        if self.ty != T::element_type() {
            return None;
        }
        Some(bytemuck::pod_read_unaligned(&self.bytes))
    }

    /// Returns every lane if the lanes are of type `T`.
    pub fn lanes<T: TensorDType>(&self) -> Option<Vec<T>> {
        if self.ty.dt() != T::dt() {
            return None;
        }
        let width = T::dt().size_of();
        Some(
            self.bytes
                .chunks_exact(width)
                .map(bytemuck::pod_read_unaligned)
                .collect(),
        )
    }

    /// Same bytes, read as another element type of identical width.
    pub fn reinterpret(&self, ty: ElementType) -> Result<Self, InvariantError> {
        if !self.ty.can_reinterpret_as(&ty) {
            return Err(InvariantError::ElementTypeMismatch {
                buffer: self.ty,
                view: ty,
            });
        }
        Ok(Self {
            ty,
            bytes: self.bytes.clone(),
        })
    }
}

impl std::fmt::Debug for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn fmt_lanes<T: TensorDType>(e: &Element) -> String {
            format!("{:?}", e.lanes::<T>().unwrap_or_default())
        }
        let lanes = match self.ty.dt() {
            DType::F16 => fmt_lanes::<f16>(self),
            DType::BF16 => fmt_lanes::<bf16>(self),
            DType::F32 => fmt_lanes::<f32>(self),
            DType::I32 => fmt_lanes::<i32>(self),
            DType::U32 => fmt_lanes::<u32>(self),
        };
        write!(f, "{}{}", self.ty, lanes)
    }
}

macro_rules! impl_element_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Element {
                fn from(value: $t) -> Self {
                    Element::scalar(value)
                }
            }
        )*
    };
}

impl_element_from!(f32, i32, u32, f16, bf16);
