//! Mesh assembler: binds primitive attributes to decoded arrays and
//! expands geometry modes into point/edge/triangle sets.

use crate::accessor::{self, DecodeCache};
use crate::asset::Asset;
use crate::error::{Error, Result};
use crate::json::{self, Index, Mode};
use smallvec::SmallVec;

/// Recognised attribute semantics. Names starting with `_` are carried as
/// [`Semantic::Custom`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Semantic {
    Position,
    Normal,
    Tangent,
    TexCoord(u32),
    Color(u32),
    Joints(u32),
    Weights(u32),
    Custom(String),
}

impl Semantic {
    pub fn parse(name: &str) -> Option<Semantic> {
        match name {
            "POSITION" => Some(Semantic::Position),
            "NORMAL" => Some(Semantic::Normal),
            "TANGENT" => Some(Semantic::Tangent),
            _ => {
                if let Some(set) = name.strip_prefix("TEXCOORD_") {
                    set.parse().ok().map(Semantic::TexCoord)
                } else if let Some(set) = name.strip_prefix("COLOR_") {
                    set.parse().ok().map(Semantic::Color)
                } else if let Some(set) = name.strip_prefix("JOINTS_") {
                    set.parse().ok().map(Semantic::Joints)
                } else if let Some(set) = name.strip_prefix("WEIGHTS_") {
                    set.parse().ok().map(Semantic::Weights)
                } else if name.starts_with('_') {
                    Some(Semantic::Custom(name.to_string()))
                } else {
                    None
                }
            }
        }
    }
}

/// Point/edge/triangle expansion of one primitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Topology {
    pub points: Vec<u32>,
    pub edges: Vec<[u32; 2]>,
    pub triangles: Vec<[u32; 3]>,
}

/// Expand `indices` according to the primitive mode table.
pub fn expand_mode(mode: Mode, indices: &[u32]) -> Topology {
    let mut topology = Topology::default();
    match mode {
        Mode::Points => topology.points = indices.to_vec(),
        Mode::Lines => {
            for pair in indices.chunks_exact(2) {
                topology.edges.push([pair[0], pair[1]]);
            }
        }
        Mode::LineLoop => {
            for window in indices.windows(2) {
                topology.edges.push([window[0], window[1]]);
            }
            if indices.len() > 2 {
                topology
                    .edges
                    .push([indices[indices.len() - 1], indices[0]]);
            }
        }
        Mode::LineStrip => {
            for window in indices.windows(2) {
                topology.edges.push([window[0], window[1]]);
            }
        }
        Mode::Triangles => {
            for triple in indices.chunks_exact(3) {
                topology.triangles.push([triple[0], triple[1], triple[2]]);
            }
        }
        Mode::TriangleStrip => {
            for (i, window) in indices.windows(3).enumerate() {
                // Alternate winding so every triangle keeps the strip's
                // orientation.
                if i % 2 == 0 {
                    topology.triangles.push([window[0], window[1], window[2]]);
                } else {
                    topology.triangles.push([window[0], window[2], window[1]]);
                }
            }
        }
        Mode::TriangleFan => {
            if indices.len() >= 3 {
                for window in indices[1..].windows(2) {
                    topology.triangles.push([indices[0], window[0], window[1]]);
                }
            }
        }
    }
    topology
}

/// One morph target: per-vertex deltas. Only POSITION is required to be
/// meaningful; NORMAL/TANGENT deltas are optional.
#[derive(Debug, Clone, Default)]
pub struct MorphTarget {
    pub positions: Option<Vec<[f32; 3]>>,
    pub normals: Option<Vec<[f32; 3]>>,
    pub tangents: Option<Vec<[f32; 3]>>,
}

/// A primitive decoded into typed arrays. The vertex count is the POSITION
/// count; all other attributes match it.
#[derive(Debug, Clone, Default)]
pub struct PrimitiveData {
    pub positions: Vec<[f32; 3]>,
    pub normals: Option<Vec<[f32; 3]>>,
    pub tangents: Option<Vec<[f32; 4]>>,
    pub tex_coords: Vec<Vec<[f32; 2]>>,
    pub colors: Vec<Vec<[f32; 4]>>,
    /// JOINTS_n sets, in set order. More than one set expresses more than
    /// four influences per vertex.
    pub joints: Vec<Vec<[u16; 4]>>,
    /// WEIGHTS_n sets, matching `joints` set for set.
    pub weights: Vec<Vec<[f32; 4]>>,
    /// Implementation-defined `_*` attributes, flattened f32.
    pub custom: Vec<(String, Vec<f32>)>,
    /// Explicit or implicit (0..N) index list.
    pub indices: Vec<u32>,
    pub material: Option<Index<json::Material>>,
    pub mode: Mode,
    pub topology: Topology,
    pub targets: Vec<MorphTarget>,
}

impl PrimitiveData {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }
}

/// Decode one primitive of one mesh into a [`PrimitiveData`].
pub fn read_primitive(
    asset: &Asset,
    mesh_index: usize,
    primitive_index: usize,
    cache: &mut DecodeCache,
) -> Result<PrimitiveData> {
    let pointer = format!("/meshes/{mesh_index}/primitives/{primitive_index}");
    let mesh = asset.mesh(Index::new(mesh_index as u32))?;
    let primitive = mesh
        .primitives
        .get(primitive_index)
        .ok_or(Error::BadReference {
            pointer: pointer.clone(),
            index: primitive_index,
            len: mesh.primitives.len(),
        })?;

    let position_accessor = primitive
        .attributes
        .get("POSITION")
        .ok_or_else(|| Error::invariant(format!("{pointer}/attributes"), "POSITION is required"))?;
    let positions = read_vec3(asset, *position_accessor, cache)?;
    let vertex_count = positions.len();

    let mut data = PrimitiveData {
        positions,
        material: primitive.material,
        mode: primitive.mode,
        ..PrimitiveData::default()
    };

    // Keyed sets must be decoded in set order.
    let mut tex_sets: SmallVec<[(u32, Index<json::Accessor>); 4]> = SmallVec::new();
    let mut color_sets: SmallVec<[(u32, Index<json::Accessor>); 4]> = SmallVec::new();
    let mut joint_sets: SmallVec<[(u32, Index<json::Accessor>); 4]> = SmallVec::new();
    let mut weight_sets: SmallVec<[(u32, Index<json::Accessor>); 4]> = SmallVec::new();

    for (name, &accessor_index) in &primitive.attributes {
        match Semantic::parse(name) {
            Some(Semantic::Position) => {}
            Some(Semantic::Normal) => {
                data.normals = Some(read_vec3(asset, accessor_index, cache)?)
            }
            Some(Semantic::Tangent) => {
                data.tangents = Some(read_vec4(asset, accessor_index, cache)?)
            }
            Some(Semantic::TexCoord(set)) => tex_sets.push((set, accessor_index)),
            Some(Semantic::Color(set)) => color_sets.push((set, accessor_index)),
            Some(Semantic::Joints(set)) => joint_sets.push((set, accessor_index)),
            Some(Semantic::Weights(set)) => weight_sets.push((set, accessor_index)),
            Some(Semantic::Custom(custom_name)) => {
                let decoded = accessor::decode(
                    &asset.root,
                    &asset.buffers,
                    accessor_index.value(),
                    cache,
                )?;
                data.custom.push((custom_name, decoded.to_f32()));
            }
            None => {
                tracing::warn!(attribute = %name, %pointer, "ignoring unknown attribute");
            }
        }
    }

    tex_sets.sort_by_key(|(set, _)| *set);
    color_sets.sort_by_key(|(set, _)| *set);
    joint_sets.sort_by_key(|(set, _)| *set);
    weight_sets.sort_by_key(|(set, _)| *set);

    for (_, accessor_index) in tex_sets {
        data.tex_coords.push(read_vec2(asset, accessor_index, cache)?);
    }
    for (_, accessor_index) in color_sets {
        data.colors.push(read_color(asset, accessor_index, cache)?);
    }
    for (_, accessor_index) in joint_sets {
        data.joints.push(read_joints(asset, accessor_index, cache)?);
    }
    for (_, accessor_index) in weight_sets {
        data.weights.push(read_vec4(asset, accessor_index, cache)?);
    }

    data.indices = match primitive.indices {
        Some(accessor_index) => {
            let decoded =
                accessor::decode(&asset.root, &asset.buffers, accessor_index.value(), cache)?;
            decoded.to_u32()
        }
        None => (0..vertex_count as u32).collect(),
    };
    data.topology = expand_mode(primitive.mode, &data.indices);

    for (target_index, target) in primitive.targets.iter().enumerate() {
        let mut morph = MorphTarget::default();
        for (name, &accessor_index) in target {
            match name.as_str() {
                "POSITION" => morph.positions = Some(read_vec3(asset, accessor_index, cache)?),
                "NORMAL" => morph.normals = Some(read_vec3(asset, accessor_index, cache)?),
                "TANGENT" => morph.tangents = Some(read_vec3(asset, accessor_index, cache)?),
                _ => {}
            }
        }
        if let Some(deltas) = &morph.positions {
            if deltas.len() != vertex_count {
                return Err(Error::invariant(
                    format!("{pointer}/targets/{target_index}"),
                    format!(
                        "target has {} deltas for {vertex_count} vertices",
                        deltas.len()
                    ),
                ));
            }
        }
        data.targets.push(morph);
    }

    Ok(data)
}

fn read_vec2(
    asset: &Asset,
    index: Index<json::Accessor>,
    cache: &mut DecodeCache,
) -> Result<Vec<[f32; 2]>> {
    let decoded = accessor::decode(&asset.root, &asset.buffers, index.value(), cache)?;
    let flat = decoded.to_f32();
    Ok(flat.chunks_exact(2).map(|c| [c[0], c[1]]).collect())
}

fn read_vec3(
    asset: &Asset,
    index: Index<json::Accessor>,
    cache: &mut DecodeCache,
) -> Result<Vec<[f32; 3]>> {
    let decoded = accessor::decode(&asset.root, &asset.buffers, index.value(), cache)?;
    let flat = decoded.to_f32();
    Ok(flat.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect())
}

fn read_vec4(
    asset: &Asset,
    index: Index<json::Accessor>,
    cache: &mut DecodeCache,
) -> Result<Vec<[f32; 4]>> {
    let decoded = accessor::decode(&asset.root, &asset.buffers, index.value(), cache)?;
    let flat = decoded.to_f32();
    Ok(flat.chunks_exact(4).map(|c| [c[0], c[1], c[2], c[3]]).collect())
}

/// COLOR_n may be VEC3 or VEC4; VEC3 gets alpha 1.
fn read_color(
    asset: &Asset,
    index: Index<json::Accessor>,
    cache: &mut DecodeCache,
) -> Result<Vec<[f32; 4]>> {
    let decoded = accessor::decode(&asset.root, &asset.buffers, index.value(), cache)?;
    let flat = decoded.to_f32();
    Ok(match decoded.dims {
        3 => flat
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2], 1.0])
            .collect(),
        _ => flat
            .chunks_exact(4)
            .map(|c| [c[0], c[1], c[2], c[3]])
            .collect(),
    })
}

fn read_joints(
    asset: &Asset,
    index: Index<json::Accessor>,
    cache: &mut DecodeCache,
) -> Result<Vec<[u16; 4]>> {
    let decoded = accessor::decode(&asset.root, &asset.buffers, index.value(), cache)?;
    let flat = decoded.to_u32();
    Ok(flat
        .chunks_exact(4)
        .map(|c| [c[0] as u16, c[1] as u16, c[2] as u16, c[3] as u16])
        .collect())
}

const NORMAL_MERGE_EPSILON: f32 = 1e-5;

/// Merge vertices whose rounded per-vertex record matches bit-for-bit:
/// position, normal rounded to 1e-5, all joint/weight sets, all morph
/// position deltas. Returns the merged data plus the old-to-new remap.
pub fn dedup_vertices(data: &PrimitiveData) -> (PrimitiveData, Vec<u32>) {
    use hashbrown::HashMap;

    #[derive(PartialEq, Eq, Hash)]
    struct Key {
        position: [u32; 3],
        normal: Option<[i32; 3]>,
        joints: Vec<[u16; 4]>,
        weights: Vec<[u32; 4]>,
        deltas: Vec<[u32; 3]>,
    }

    let round = |v: f32| (v / NORMAL_MERGE_EPSILON).round() as i32;
    let bits3 = |v: &[f32; 3]| [v[0].to_bits(), v[1].to_bits(), v[2].to_bits()];
    let bits4 = |v: &[f32; 4]| [v[0].to_bits(), v[1].to_bits(), v[2].to_bits(), v[3].to_bits()];

    let mut seen: HashMap<Key, u32> = HashMap::new();
    let mut remap = Vec::with_capacity(data.vertex_count());
    let mut kept: Vec<u32> = Vec::new();

    for v in 0..data.vertex_count() {
        let key = Key {
            position: bits3(&data.positions[v]),
            normal: data.normals.as_ref().map(|n| {
                [round(n[v][0]), round(n[v][1]), round(n[v][2])]
            }),
            joints: data.joints.iter().map(|set| set[v]).collect(),
            weights: data.weights.iter().map(|set| bits4(&set[v])).collect(),
            deltas: data
                .targets
                .iter()
                .filter_map(|t| t.positions.as_ref().map(|p| bits3(&p[v])))
                .collect(),
        };
        let next = kept.len() as u32;
        let target = *seen.entry(key).or_insert_with(|| {
            kept.push(v as u32);
            next
        });
        remap.push(target);
    }

    let pick3 = |source: &Vec<[f32; 3]>| kept.iter().map(|&v| source[v as usize]).collect();
    let pick4 =
        |source: &Vec<[f32; 4]>| -> Vec<[f32; 4]> { kept.iter().map(|&v| source[v as usize]).collect() };

    let mut merged = PrimitiveData {
        positions: pick3(&data.positions),
        normals: data.normals.as_ref().map(pick3),
        tangents: data.tangents.as_ref().map(|t| pick4(t)),
        tex_coords: data
            .tex_coords
            .iter()
            .map(|set| kept.iter().map(|&v| set[v as usize]).collect())
            .collect(),
        colors: data.colors.iter().map(|set| pick4(set)).collect(),
        joints: data
            .joints
            .iter()
            .map(|set| kept.iter().map(|&v| set[v as usize]).collect())
            .collect(),
        weights: data.weights.iter().map(|set| pick4(set)).collect(),
        custom: data
            .custom
            .iter()
            .map(|(name, values)| {
                // Flat stream; element width comes from the vertex count.
                let width = if data.vertex_count() > 0 {
                    values.len() / data.vertex_count()
                } else {
                    0
                };
                let picked = kept
                    .iter()
                    .flat_map(|&v| {
                        let base = v as usize * width;
                        values[base..base + width].iter().copied()
                    })
                    .collect();
                (name.clone(), picked)
            })
            .collect(),
        indices: data.indices.iter().map(|&i| remap[i as usize]).collect(),
        material: data.material,
        mode: data.mode,
        topology: Topology::default(),
        targets: data
            .targets
            .iter()
            .map(|target| MorphTarget {
                positions: target.positions.as_ref().map(pick3),
                normals: target.normals.as_ref().map(pick3),
                tangents: target.tangents.as_ref().map(pick3),
            })
            .collect(),
    };
    merged.topology = expand_mode(merged.mode, &merged.indices);
    (merged, remap)
}
