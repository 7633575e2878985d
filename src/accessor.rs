//! Accessor engine: typed-array decode over shared buffer bytes.
//!
//! Decoding honors the view stride, the normalization mapping for integer
//! components, and the sparse overlay. Decoded arrays are interned in a
//! per-pass [`DecodeCache`] so an accessor shared by several primitives is
//! decoded once and every consumer sees the same array object.

use crate::buffer::BufferSet;
use crate::error::{Error, Result};
use crate::json::{self, ComponentType, Type};
use hashbrown::HashMap;
use std::sync::Arc;

/// Tagged storage over the six component types.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedArray {
    I8(Vec<i8>),
    U8(Vec<u8>),
    I16(Vec<i16>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    F32(Vec<f32>),
}

impl TypedArray {
    fn zeroed(component_type: ComponentType, len: usize) -> Self {
        match component_type {
            ComponentType::I8 => TypedArray::I8(vec![0; len]),
            ComponentType::U8 => TypedArray::U8(vec![0; len]),
            ComponentType::I16 => TypedArray::I16(vec![0; len]),
            ComponentType::U16 => TypedArray::U16(vec![0; len]),
            ComponentType::U32 => TypedArray::U32(vec![0; len]),
            ComponentType::F32 => TypedArray::F32(vec![0.0; len]),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TypedArray::I8(v) => v.len(),
            TypedArray::U8(v) => v.len(),
            TypedArray::I16(v) => v.len(),
            TypedArray::U16(v) => v.len(),
            TypedArray::U32(v) => v.len(),
            TypedArray::F32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flat component at `index` widened to f64 (for min/max).
    pub fn get_f64(&self, index: usize) -> f64 {
        match self {
            TypedArray::I8(v) => v[index] as f64,
            TypedArray::U8(v) => v[index] as f64,
            TypedArray::I16(v) => v[index] as f64,
            TypedArray::U16(v) => v[index] as f64,
            TypedArray::U32(v) => v[index] as f64,
            TypedArray::F32(v) => v[index] as f64,
        }
    }

    fn copy_element(&mut self, dims: usize, dst: usize, src: &TypedArray, src_index: usize) {
        macro_rules! copy {
            ($dst:expr, $src:expr) => {
                $dst[dst * dims..(dst + 1) * dims]
                    .copy_from_slice(&$src[src_index * dims..(src_index + 1) * dims])
            };
        }
        match (self, src) {
            (TypedArray::I8(d), TypedArray::I8(s)) => copy!(d, s),
            (TypedArray::U8(d), TypedArray::U8(s)) => copy!(d, s),
            (TypedArray::I16(d), TypedArray::I16(s)) => copy!(d, s),
            (TypedArray::U16(d), TypedArray::U16(s)) => copy!(d, s),
            (TypedArray::U32(d), TypedArray::U32(s)) => copy!(d, s),
            (TypedArray::F32(d), TypedArray::F32(s)) => copy!(d, s),
            _ => {}
        }
    }
}

/// A fully decoded accessor: `count` elements of `dims` components.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub component_type: ComponentType,
    pub dims: usize,
    pub count: usize,
    pub normalized: bool,
    pub data: TypedArray,
}

impl Decoded {
    /// Flattened f32 view, applying the normalization mapping when the
    /// accessor is marked `normalized`:
    /// i8 -> max(v/127, -1), u8 -> v/255, i16 -> max(v/32767, -1),
    /// u16 -> v/65535. Other components are read verbatim.
    pub fn to_f32(&self) -> Vec<f32> {
        match &self.data {
            TypedArray::F32(v) => v.clone(),
            TypedArray::U32(v) => v.iter().map(|&x| x as f32).collect(),
            TypedArray::I8(v) => {
                if self.normalized {
                    v.iter().map(|&x| (x as f32 / 127.0).max(-1.0)).collect()
                } else {
                    v.iter().map(|&x| x as f32).collect()
                }
            }
            TypedArray::U8(v) => {
                if self.normalized {
                    v.iter().map(|&x| x as f32 / 255.0).collect()
                } else {
                    v.iter().map(|&x| x as f32).collect()
                }
            }
            TypedArray::I16(v) => {
                if self.normalized {
                    v.iter().map(|&x| (x as f32 / 32767.0).max(-1.0)).collect()
                } else {
                    v.iter().map(|&x| x as f32).collect()
                }
            }
            TypedArray::U16(v) => {
                if self.normalized {
                    v.iter().map(|&x| x as f32 / 65535.0).collect()
                } else {
                    v.iter().map(|&x| x as f32).collect()
                }
            }
        }
    }

    /// Flattened unsigned view, for index data.
    pub fn to_u32(&self) -> Vec<u32> {
        match &self.data {
            TypedArray::U8(v) => v.iter().map(|&x| x as u32).collect(),
            TypedArray::U16(v) => v.iter().map(|&x| x as u32).collect(),
            TypedArray::U32(v) => v.clone(),
            TypedArray::I8(v) => v.iter().map(|&x| x as u32).collect(),
            TypedArray::I16(v) => v.iter().map(|&x| x as u32).collect(),
            TypedArray::F32(v) => v.iter().map(|&x| x as u32).collect(),
        }
    }

    /// Per-component min/max over all elements, in f64 like the JSON field.
    pub fn min_max(&self) -> (Vec<f64>, Vec<f64>) {
        let mut min = vec![f64::INFINITY; self.dims];
        let mut max = vec![f64::NEG_INFINITY; self.dims];
        for element in 0..self.count {
            for component in 0..self.dims {
                let value = self.data.get_f64(element * self.dims + component);
                min[component] = min[component].min(value);
                max[component] = max[component].max(value);
            }
        }
        (min, max)
    }
}

/// Interning map for one decode pass. Not shared across threads; a fresh
/// pass starts empty.
#[derive(Default)]
pub struct DecodeCache {
    entries: HashMap<usize, Arc<Decoded>>,
}

impl DecodeCache {
    pub fn new() -> Self {
        DecodeCache {
            entries: HashMap::new(),
        }
    }
}

/// Decode accessor `index`, consulting and filling `cache`.
pub fn decode(
    root: &json::Root,
    buffers: &BufferSet,
    index: usize,
    cache: &mut DecodeCache,
) -> Result<Arc<Decoded>> {
    if let Some(hit) = cache.entries.get(&index) {
        return Ok(hit.clone());
    }
    let decoded = Arc::new(decode_uncached(root, buffers, index)?);
    cache.entries.insert(index, decoded.clone());
    Ok(decoded)
}

fn decode_uncached(root: &json::Root, buffers: &BufferSet, index: usize) -> Result<Decoded> {
    let pointer = format!("/accessors/{index}");
    let accessor = root.accessors.get(index).ok_or(Error::BadReference {
        pointer: "/accessors".to_string(),
        index,
        len: root.accessors.len(),
    })?;

    let dims = accessor.type_.components();

    let mut data = match accessor.buffer_view {
        Some(view_index) => read_strided(
            root,
            buffers,
            view_index.value(),
            accessor.byte_offset,
            accessor.component_type,
            dims,
            accessor.count,
            &pointer,
        )?,
        // No backing view: logical content is zero-initialized, then the
        // sparse overlay (if any) fills it in.
        None => TypedArray::zeroed(accessor.component_type, accessor.count * dims),
    };

    if let Some(sparse) = &accessor.sparse {
        apply_sparse(root, buffers, accessor, sparse, dims, &mut data, &pointer)?;
    }

    Ok(Decoded {
        component_type: accessor.component_type,
        dims,
        count: accessor.count,
        normalized: accessor.normalized,
        data,
    })
}

/// Read `count * dims` components out of a view, honoring its stride.
#[allow(clippy::too_many_arguments)]
fn read_strided(
    root: &json::Root,
    buffers: &BufferSet,
    view_index: usize,
    byte_offset: usize,
    component_type: ComponentType,
    dims: usize,
    count: usize,
    pointer: &str,
) -> Result<TypedArray> {
    let view = root.buffer_views.get(view_index).ok_or(Error::BadReference {
        pointer: pointer.to_string(),
        index: view_index,
        len: root.buffer_views.len(),
    })?;

    let component_size = component_type.size();
    let element_size = dims * component_size;
    let stride = view.byte_stride.unwrap_or(element_size);

    if byte_offset % component_size != 0 {
        return Err(Error::BadAlignment {
            pointer: pointer.to_string(),
            offset: byte_offset,
            alignment: component_size,
        });
    }
    if (view.byte_offset + byte_offset) % component_size != 0 {
        return Err(Error::BadAlignment {
            pointer: pointer.to_string(),
            offset: view.byte_offset + byte_offset,
            alignment: component_size,
        });
    }
    if stride < element_size || stride % component_size != 0 {
        return Err(Error::invariant(
            pointer,
            format!("byteStride {stride} is invalid for {element_size}-byte elements"),
        ));
    }

    let bytes = buffers.bytes(view.buffer.value())?;
    let view_end = view.byte_offset + view.byte_length;
    if view_end > bytes.len() {
        return Err(Error::invariant(
            format!("/bufferViews/{view_index}"),
            format!("view ends at {view_end} but buffer has {} bytes", bytes.len()),
        ));
    }
    if count > 0 {
        let last = byte_offset + (count - 1) * stride + element_size;
        if last > view.byte_length {
            return Err(Error::invariant(
                pointer,
                format!(
                    "{count} elements need {last} bytes but the view holds {}",
                    view.byte_length
                ),
            ));
        }
    }

    let base = view.byte_offset + byte_offset;
    let mut out = TypedArray::zeroed(component_type, count * dims);
    for element in 0..count {
        let element_base = base + element * stride;
        for component in 0..dims {
            let at = element_base + component * component_size;
            let flat = element * dims + component;
            match &mut out {
                TypedArray::I8(v) => v[flat] = bytes[at] as i8,
                TypedArray::U8(v) => v[flat] = bytes[at],
                TypedArray::I16(v) => {
                    v[flat] = i16::from_le_bytes([bytes[at], bytes[at + 1]])
                }
                TypedArray::U16(v) => {
                    v[flat] = u16::from_le_bytes([bytes[at], bytes[at + 1]])
                }
                TypedArray::U32(v) => {
                    v[flat] = u32::from_le_bytes([
                        bytes[at],
                        bytes[at + 1],
                        bytes[at + 2],
                        bytes[at + 3],
                    ])
                }
                TypedArray::F32(v) => {
                    v[flat] = f32::from_le_bytes([
                        bytes[at],
                        bytes[at + 1],
                        bytes[at + 2],
                        bytes[at + 3],
                    ])
                }
            }
        }
    }
    Ok(out)
}

fn apply_sparse(
    root: &json::Root,
    buffers: &BufferSet,
    accessor: &json::Accessor,
    sparse: &json::Sparse,
    dims: usize,
    data: &mut TypedArray,
    pointer: &str,
) -> Result<()> {
    let indices = read_strided(
        root,
        buffers,
        sparse.indices.buffer_view.value(),
        sparse.indices.byte_offset,
        sparse.indices.component_type,
        1,
        sparse.count,
        &format!("{pointer}/sparse/indices"),
    )?;
    let indices = Decoded {
        component_type: sparse.indices.component_type,
        dims: 1,
        count: sparse.count,
        normalized: false,
        data: indices,
    }
    .to_u32();

    let values = read_strided(
        root,
        buffers,
        sparse.values.buffer_view.value(),
        sparse.values.byte_offset,
        accessor.component_type,
        dims,
        sparse.count,
        &format!("{pointer}/sparse/values"),
    )?;

    let mut previous: Option<u32> = None;
    for (k, &target) in indices.iter().enumerate() {
        if let Some(prev) = previous {
            if target <= prev {
                return Err(Error::invariant(
                    format!("{pointer}/sparse/indices"),
                    format!("indices not strictly increasing at {k} ({prev} then {target})"),
                ));
            }
        }
        if target as usize >= accessor.count {
            return Err(Error::invariant(
                format!("{pointer}/sparse/indices"),
                format!("index {target} out of range for count {}", accessor.count),
            ));
        }
        previous = Some(target);
        data.copy_element(dims, target as usize, &values, k);
    }
    Ok(())
}

/// Borrowed typed slice handed to the write path.
#[derive(Debug, Clone, Copy)]
pub enum AccessorData<'a> {
    I8(&'a [i8]),
    U8(&'a [u8]),
    I16(&'a [i16]),
    U16(&'a [u16]),
    U32(&'a [u32]),
    F32(&'a [f32]),
}

impl AccessorData<'_> {
    pub fn component_type(&self) -> ComponentType {
        match self {
            AccessorData::I8(_) => ComponentType::I8,
            AccessorData::U8(_) => ComponentType::U8,
            AccessorData::I16(_) => ComponentType::I16,
            AccessorData::U16(_) => ComponentType::U16,
            AccessorData::U32(_) => ComponentType::U32,
            AccessorData::F32(_) => ComponentType::F32,
        }
    }

    pub fn component_count(&self) -> usize {
        match self {
            AccessorData::I8(v) => v.len(),
            AccessorData::U8(v) => v.len(),
            AccessorData::I16(v) => v.len(),
            AccessorData::U16(v) => v.len(),
            AccessorData::U32(v) => v.len(),
            AccessorData::F32(v) => v.len(),
        }
    }

    /// Little-endian byte image, as stored in the output buffer.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        match self {
            AccessorData::U8(v) => v.to_vec(),
            AccessorData::I8(v) => v.iter().map(|&x| x as u8).collect(),
            AccessorData::I16(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            AccessorData::U16(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            AccessorData::U32(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            AccessorData::F32(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        }
    }

    /// Per-component min/max, in f64 like the JSON field.
    pub fn min_max(&self, dims: usize) -> (Vec<f64>, Vec<f64>) {
        let mut min = vec![f64::INFINITY; dims];
        let mut max = vec![f64::NEG_INFINITY; dims];
        let count = self.component_count() / dims.max(1);
        for element in 0..count {
            for component in 0..dims {
                let value = match self {
                    AccessorData::I8(v) => v[element * dims + component] as f64,
                    AccessorData::U8(v) => v[element * dims + component] as f64,
                    AccessorData::I16(v) => v[element * dims + component] as f64,
                    AccessorData::U16(v) => v[element * dims + component] as f64,
                    AccessorData::U32(v) => v[element * dims + component] as f64,
                    AccessorData::F32(v) => v[element * dims + component] as f64,
                };
                min[component] = min[component].min(value);
                max[component] = max[component].max(value);
            }
        }
        (min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json::Index;

    fn root_with_accessor(
        bytes: Vec<u8>,
        accessor: json::Accessor,
        stride: Option<usize>,
    ) -> (json::Root, BufferSet) {
        let mut root = json::Root::default();
        root.buffers.push(json::Buffer {
            uri: None,
            byte_length: bytes.len(),
            name: None,
            extensions: None,
            extras: None,
        });
        root.buffer_views.push(json::View {
            buffer: Index::new(0),
            byte_offset: 0,
            byte_length: bytes.len(),
            byte_stride: stride,
            target: None,
            name: None,
            extensions: None,
            extras: None,
        });
        root.accessors.push(accessor);
        (root, BufferSet::from_vecs(vec![bytes]))
    }

    fn f32_accessor(count: usize, type_: Type) -> json::Accessor {
        json::Accessor {
            buffer_view: Some(Index::new(0)),
            byte_offset: 0,
            component_type: ComponentType::F32,
            normalized: false,
            count,
            type_,
            min: None,
            max: None,
            sparse: None,
            name: None,
            extensions: None,
            extras: None,
        }
    }

    #[test]
    fn test_decode_vec3_f32() {
        let values: Vec<f32> = vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let (root, buffers) = root_with_accessor(bytes, f32_accessor(3, Type::Vec3), None);
        let mut cache = DecodeCache::new();
        let decoded = decode(&root, &buffers, 0, &mut cache).unwrap();
        assert_eq!(decoded.count, 3);
        assert_eq!(decoded.to_f32(), values);
        let (min, max) = decoded.min_max();
        assert_eq!(min, vec![0.0, 0.0, 0.0]);
        assert_eq!(max, vec![1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_decode_is_deterministic_and_cached() {
        let values: Vec<f32> = vec![1.5, -2.5, 3.25];
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let (root, buffers) = root_with_accessor(bytes, f32_accessor(3, Type::Scalar), None);
        let mut cache = DecodeCache::new();
        let first = decode(&root, &buffers, 0, &mut cache).unwrap();
        let second = decode(&root, &buffers, 0, &mut cache).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.to_f32(), second.to_f32());
    }

    #[test]
    fn test_strided_interleaved_read() {
        // Two vertices of (position vec3 f32, pad u32): stride 16.
        let mut bytes = Vec::new();
        for v in 0..2u32 {
            for c in 0..3 {
                bytes.extend_from_slice(&((v * 3 + c) as f32).to_le_bytes());
            }
            bytes.extend_from_slice(&0xDEADBEEFu32.to_le_bytes());
        }
        let (root, buffers) =
            root_with_accessor(bytes, f32_accessor(2, Type::Vec3), Some(16));
        let mut cache = DecodeCache::new();
        let decoded = decode(&root, &buffers, 0, &mut cache).unwrap();
        assert_eq!(decoded.to_f32(), vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_normalization_mappings() {
        let bytes: Vec<u8> = vec![0x80, 0x7F, 0x00, 0xFF]; // i8: -128, 127, 0, -1
        let accessor = json::Accessor {
            component_type: ComponentType::I8,
            normalized: true,
            count: 4,
            type_: Type::Scalar,
            ..f32_accessor(4, Type::Scalar)
        };
        let (root, buffers) = root_with_accessor(bytes, accessor, None);
        let mut cache = DecodeCache::new();
        let decoded = decode(&root, &buffers, 0, &mut cache).unwrap();
        let out = decoded.to_f32();
        assert_eq!(out[0], -1.0); // clamped, not -128/127
        assert_eq!(out[1], 1.0);
        assert_eq!(out[2], 0.0);
        assert!((out[3] + 1.0 / 127.0).abs() < 1e-6);
    }

    #[test]
    fn test_misaligned_offset_rejected() {
        let bytes = vec![0u8; 16];
        let mut accessor = f32_accessor(1, Type::Vec3);
        accessor.byte_offset = 2; // not a multiple of 4
        let (root, buffers) = root_with_accessor(bytes, accessor, None);
        let mut cache = DecodeCache::new();
        assert!(matches!(
            decode(&root, &buffers, 0, &mut cache),
            Err(Error::BadAlignment { .. })
        ));
    }

    #[test]
    fn test_sparse_overlay_on_zero_base() {
        // Accessor with no view: count 5 VEC3 zeros, sparse at [1, 3].
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&3u16.to_le_bytes());
        for v in [[1.0f32, 0.0, 0.0], [0.0, 1.0, 0.0]] {
            for c in v {
                bytes.extend_from_slice(&c.to_le_bytes());
            }
        }
        let mut root = json::Root::default();
        root.buffers.push(json::Buffer {
            uri: None,
            byte_length: bytes.len(),
            name: None,
            extensions: None,
            extras: None,
        });
        root.buffer_views.push(json::View {
            buffer: Index::new(0),
            byte_offset: 0,
            byte_length: 4,
            byte_stride: None,
            target: None,
            name: None,
            extensions: None,
            extras: None,
        });
        root.buffer_views.push(json::View {
            buffer: Index::new(0),
            byte_offset: 4,
            byte_length: 24,
            byte_stride: None,
            target: None,
            name: None,
            extensions: None,
            extras: None,
        });
        root.accessors.push(json::Accessor {
            buffer_view: None,
            byte_offset: 0,
            component_type: ComponentType::F32,
            normalized: false,
            count: 5,
            type_: Type::Vec3,
            min: None,
            max: None,
            sparse: Some(json::Sparse {
                count: 2,
                indices: json::accessor::SparseIndices {
                    buffer_view: Index::new(0),
                    byte_offset: 0,
                    component_type: ComponentType::U16,
                    extensions: None,
                    extras: None,
                },
                values: json::accessor::SparseValues {
                    buffer_view: Index::new(1),
                    byte_offset: 0,
                    extensions: None,
                    extras: None,
                },
                extensions: None,
                extras: None,
            }),
            name: None,
            extensions: None,
            extras: None,
        });
        let buffers = BufferSet::from_vecs(vec![bytes]);
        let mut cache = DecodeCache::new();
        let decoded = decode(&root, &buffers, 0, &mut cache).unwrap();
        assert_eq!(
            decoded.to_f32(),
            vec![
                0.0, 0.0, 0.0, //
                1.0, 0.0, 0.0, //
                0.0, 0.0, 0.0, //
                0.0, 1.0, 0.0, //
                0.0, 0.0, 0.0,
            ]
        );
    }

    #[test]
    fn test_sparse_indices_must_increase() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&3u16.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 8]);
        let mut root = json::Root::default();
        root.buffers.push(json::Buffer {
            uri: None,
            byte_length: bytes.len(),
            name: None,
            extensions: None,
            extras: None,
        });
        root.buffer_views.push(json::View {
            buffer: Index::new(0),
            byte_offset: 0,
            byte_length: 4,
            byte_stride: None,
            target: None,
            name: None,
            extensions: None,
            extras: None,
        });
        root.buffer_views.push(json::View {
            buffer: Index::new(0),
            byte_offset: 4,
            byte_length: 8,
            byte_stride: None,
            target: None,
            name: None,
            extensions: None,
            extras: None,
        });
        root.accessors.push(json::Accessor {
            buffer_view: None,
            byte_offset: 0,
            component_type: ComponentType::F32,
            normalized: false,
            count: 5,
            type_: Type::Scalar,
            min: None,
            max: None,
            sparse: Some(json::Sparse {
                count: 2,
                indices: json::accessor::SparseIndices {
                    buffer_view: Index::new(0),
                    byte_offset: 0,
                    component_type: ComponentType::U16,
                    extensions: None,
                    extras: None,
                },
                values: json::accessor::SparseValues {
                    buffer_view: Index::new(1),
                    byte_offset: 0,
                    extensions: None,
                    extras: None,
                },
                extensions: None,
                extras: None,
            }),
            name: None,
            extensions: None,
            extras: None,
        });
        let buffers = BufferSet::from_vecs(vec![bytes]);
        let mut cache = DecodeCache::new();
        assert!(matches!(
            decode(&root, &buffers, 0, &mut cache),
            Err(Error::InvariantViolated { .. })
        ));
    }
}
