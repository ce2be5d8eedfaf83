//! Index width selection.
//!
//! Index arrays are emitted with the narrowest unsigned type able to hold their
//! largest value. Consumers infer stride from byte length, so a wider type than
//! necessary is a format error, not just waste.

use crate::buffer::{ElementType, TypedArray};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexType {
    U8,
    U16,
    U32,
}

impl IndexType {
    pub const fn max_value(self) -> u64 {
        match self {
            IndexType::U8 => u8::MAX as u64,
            IndexType::U16 => u16::MAX as u64,
            IndexType::U32 => u32::MAX as u64,
        }
    }

    /// Smallest type whose maximum is `>= max_index`.
    ///
    /// Values beyond `u32::MAX` saturate to `U32`; callers that can produce
    /// them must check [`IndexType::fits`] first.
    pub const fn select(max_index: u64) -> Self {
        if max_index <= u8::MAX as u64 {
            IndexType::U8
        } else if max_index <= u16::MAX as u64 {
            IndexType::U16
        } else {
            IndexType::U32
        }
    }

    /// Type able to address `count` vertices (largest index `count - 1`).
    pub const fn for_vertex_count(count: usize) -> Self {
        Self::select((count as u64).saturating_sub(1))
    }

    pub const fn fits(self, value: u64) -> bool {
        value <= self.max_value()
    }

    pub const fn element_type(self) -> ElementType {
        match self {
            IndexType::U8 => ElementType::U8,
            IndexType::U16 => ElementType::U16,
            IndexType::U32 => ElementType::U32,
        }
    }
}

/// Unsigned integer buffer whose element width is known at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexBuffer {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl Default for IndexBuffer {
    fn default() -> Self {
        IndexBuffer::U8(Vec::new())
    }
}

impl IndexBuffer {
    /// Packs `values` into the narrowest type that holds their maximum.
    pub fn from_values(values: &[u32]) -> Self {
        Self::with_min_type(values, IndexType::U8)
    }

    /// Packs `values` into `floor` or wider, whichever holds their maximum.
    pub fn with_min_type(values: &[u32], floor: IndexType) -> Self {
        let max = values.iter().copied().max().unwrap_or(0) as u64;
        match IndexType::select(max).max(floor) {
            IndexType::U8 => IndexBuffer::U8(values.iter().map(|&v| v as u8).collect()),
            IndexType::U16 => IndexBuffer::U16(values.iter().map(|&v| v as u16).collect()),
            IndexType::U32 => IndexBuffer::U32(values.to_vec()),
        }
    }

    /// `0, 1, …, count - 1` in the type that addresses `count` vertices.
    pub fn sequential(count: usize) -> Self {
        let values: Vec<u32> = (0..count as u32).collect();
        Self::with_min_type(&values, IndexType::for_vertex_count(count))
    }

    pub fn index_type(&self) -> IndexType {
        match self {
            IndexBuffer::U8(_) => IndexType::U8,
            IndexBuffer::U16(_) => IndexType::U16,
            IndexBuffer::U32(_) => IndexType::U32,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            IndexBuffer::U8(v) => v.len(),
            IndexBuffer::U16(v) => v.len(),
            IndexBuffer::U32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, i: usize) -> Option<u32> {
        match self {
            IndexBuffer::U8(v) => v.get(i).map(|&x| x as u32),
            IndexBuffer::U16(v) => v.get(i).map(|&x| x as u32),
            IndexBuffer::U32(v) => v.get(i).copied(),
        }
    }

    pub fn to_vec(&self) -> Vec<u32> {
        match self {
            IndexBuffer::U8(v) => v.iter().map(|&x| x as u32).collect(),
            IndexBuffer::U16(v) => v.iter().map(|&x| x as u32).collect(),
            IndexBuffer::U32(v) => v.clone(),
        }
    }

    pub fn max_value(&self) -> Option<u32> {
        self.to_vec().into_iter().max()
    }

    /// New buffer of the same type holding `self[order[i]]` at position `i`.
    pub fn gather(&self, order: &[u32]) -> IndexBuffer {
        fn pick<T: Copy>(src: &[T], order: &[u32]) -> Vec<T> {
            order.iter().map(|&i| src[i as usize]).collect()
        }
        match self {
            IndexBuffer::U8(v) => IndexBuffer::U8(pick(v, order)),
            IndexBuffer::U16(v) => IndexBuffer::U16(pick(v, order)),
            IndexBuffer::U32(v) => IndexBuffer::U32(pick(v, order)),
        }
    }

    pub fn into_typed_array(self) -> TypedArray {
        match self {
            IndexBuffer::U8(v) => TypedArray::from_u8(v),
            IndexBuffer::U16(v) => TypedArray::from_u16(&v),
            IndexBuffer::U32(v) => TypedArray::from_u32(&v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{IndexBuffer, IndexType};

    #[test]
    fn select_picks_narrowest_type() {
        assert_eq!(IndexType::select(0), IndexType::U8);
        assert_eq!(IndexType::select(255), IndexType::U8);
        assert_eq!(IndexType::select(256), IndexType::U16);
        assert_eq!(IndexType::select(65535), IndexType::U16);
        assert_eq!(IndexType::select(65536), IndexType::U32);
        assert_eq!(IndexType::select(u64::MAX), IndexType::U32);
    }

    #[test]
    fn vertex_count_boundaries() {
        assert_eq!(IndexType::for_vertex_count(0), IndexType::U8);
        assert_eq!(IndexType::for_vertex_count(256), IndexType::U8);
        assert_eq!(IndexType::for_vertex_count(257), IndexType::U16);
        assert_eq!(IndexType::for_vertex_count(65536), IndexType::U16);
        assert_eq!(IndexType::for_vertex_count(65537), IndexType::U32);
    }

    #[test]
    fn selection_is_stable_and_minimal() {
        for n in [1u64, 17, 255, 256, 300, 65_535, 65_536, 1 << 20] {
            let t = IndexType::select(n);
            assert_eq!(t, IndexType::select(n));
            assert!(t.fits(n));
            let narrower = match t {
                IndexType::U8 => None,
                IndexType::U16 => Some(IndexType::U8),
                IndexType::U32 => Some(IndexType::U16),
            };
            if let Some(narrower) = narrower {
                assert!(!narrower.fits(n));
            }
        }
    }

    #[test]
    fn buffers_respect_floor_and_gather_keeps_type() {
        let b = IndexBuffer::with_min_type(&[1, 2, 3], IndexType::U16);
        assert_eq!(b.index_type(), IndexType::U16);
        let g = b.gather(&[2, 0]);
        assert_eq!(g, IndexBuffer::U16(vec![3, 1]));

        let wide = IndexBuffer::from_values(&[0, 70_000]);
        assert_eq!(wide.index_type(), IndexType::U32);
        assert_eq!(IndexBuffer::sequential(300).index_type(), IndexType::U16);
        assert_eq!(IndexBuffer::sequential(3).to_vec(), vec![0, 1, 2]);
    }
}
