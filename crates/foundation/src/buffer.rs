//! Transferable binary buffers and the fixed-width typed views over them.
//!
//! An [`ArrayBuffer`] is the unit handed across a worker boundary. Its identity
//! is a process-unique [`BufferId`]; clones share both the id and the bytes, so
//! a transfer list can be de-duplicated by id.

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use serde::Serialize;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BufferId(u64);

static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(1);

impl BufferId {
    fn next() -> Self {
        BufferId(NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone)]
pub struct ArrayBuffer {
    id: BufferId,
    bytes: Bytes,
}

impl ArrayBuffer {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            id: BufferId::next(),
            bytes: bytes.into(),
        }
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn same_buffer(&self, other: &ArrayBuffer) -> bool {
        self.id == other.id
    }
}

/// Element type of a [`TypedArray`], named after the typed arrays the GPU
/// upload layer expects.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum ElementType {
    #[serde(rename = "Uint8Array")]
    U8,
    #[serde(rename = "Uint16Array")]
    U16,
    #[serde(rename = "Uint32Array")]
    U32,
    #[serde(rename = "Float32Array")]
    F32,
}

impl ElementType {
    pub const fn byte_width(self) -> usize {
        match self {
            ElementType::U8 => 1,
            ElementType::U16 => 2,
            ElementType::U32 | ElementType::F32 => 4,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ElementType::U8 => "Uint8Array",
            ElementType::U16 => "Uint16Array",
            ElementType::U32 => "Uint32Array",
            ElementType::F32 => "Float32Array",
        }
    }
}

/// Fixed-width numeric view over an [`ArrayBuffer`] (native byte order).
#[derive(Debug, Clone)]
pub struct TypedArray {
    element: ElementType,
    buffer: ArrayBuffer,
}

impl TypedArray {
    pub fn from_u8(values: Vec<u8>) -> Self {
        Self {
            element: ElementType::U8,
            buffer: ArrayBuffer::new(values),
        }
    }

    pub fn from_u16(values: &[u16]) -> Self {
        Self::from_pod(ElementType::U16, bytemuck::cast_slice(values))
    }

    pub fn from_u32(values: &[u32]) -> Self {
        Self::from_pod(ElementType::U32, bytemuck::cast_slice(values))
    }

    pub fn from_f32(values: &[f32]) -> Self {
        Self::from_pod(ElementType::F32, bytemuck::cast_slice(values))
    }

    fn from_pod(element: ElementType, bytes: &[u8]) -> Self {
        Self {
            element,
            buffer: ArrayBuffer::new(Bytes::copy_from_slice(bytes)),
        }
    }

    pub fn element_type(&self) -> ElementType {
        self.element
    }

    pub fn buffer(&self) -> &ArrayBuffer {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.byte_len() / self.element.byte_width()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn byte_len(&self) -> usize {
        self.buffer.byte_len()
    }

    /// Decodes a `Float32Array`. Returns `None` for integer arrays.
    pub fn to_f32_vec(&self) -> Option<Vec<f32>> {
        (self.element == ElementType::F32).then(|| bytemuck::pod_collect_to_vec(self.buffer.as_bytes()))
    }

    /// Decodes an unsigned integer array, widening to `u32`. Returns `None` for float arrays.
    pub fn to_u32_vec(&self) -> Option<Vec<u32>> {
        let bytes = self.buffer.as_bytes();
        match self.element {
            ElementType::U8 => Some(bytes.iter().map(|&b| u32::from(b)).collect()),
            ElementType::U16 => Some(
                bytemuck::pod_collect_to_vec::<u8, u16>(bytes)
                    .into_iter()
                    .map(u32::from)
                    .collect(),
            ),
            ElementType::U32 => Some(bytemuck::pod_collect_to_vec(bytes)),
            ElementType::F32 => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ArrayBuffer, ElementType, TypedArray};

    #[test]
    fn clones_share_identity() {
        let a = ArrayBuffer::new(vec![1u8, 2, 3]);
        let b = a.clone();
        let c = ArrayBuffer::new(vec![1u8, 2, 3]);
        assert!(a.same_buffer(&b));
        assert!(!a.same_buffer(&c));
    }

    #[test]
    fn typed_arrays_decode_their_elements() {
        let f = TypedArray::from_f32(&[1.5, -2.0]);
        assert_eq!(f.element_type(), ElementType::F32);
        assert_eq!(f.len(), 2);
        assert_eq!(f.byte_len(), 8);
        assert_eq!(f.to_f32_vec(), Some(vec![1.5, -2.0]));
        assert_eq!(f.to_u32_vec(), None);

        let u = TypedArray::from_u16(&[7, 65535]);
        assert_eq!(u.to_u32_vec(), Some(vec![7, 65535]));
        assert_eq!(u.element_type().name(), "Uint16Array");
    }

    #[test]
    fn integer_arrays_decode_to_u32() {
        let values = [0, 1, 70_000, u32::MAX];
        let a = TypedArray::from_u32(&values);
        assert_eq!(a.element_type(), ElementType::U32);
        assert_eq!(a.to_u32_vec(), Some(values.to_vec()));
        assert_eq!(a.to_f32_vec(), None);
        assert_eq!(TypedArray::from_u8(vec![3, 255]).to_u32_vec(), Some(vec![3, 255]));
    }
}
