//! Mesh reconstruction.
//!
//! Turns raw wedge buffers into canonical welded meshes. The skinned and
//! static paths share one algorithm: weld every wedge through
//! [`VertexWelder`] keyed on (position, normal), materialize a
//! [`CanonicalVertex`] from each unique vertex's representative wedge, and
//! remap the index buffer through the wedge map.
//!
//! Welding is keyed on the raw quantized bits, so reconstructing from the
//! CPU buffer and from the GPU buffer of the same LOD produces bit-identical
//! canonical output. When a version strips the CPU buffer the GPU buffer is
//! the source; when neither survives, the LOD fails with `MissingGeometry`
//! and the caller carries on with the other LODs.

use glam::Vec3;

use crate::error::{DecodeError, DecodeErrorKind, DecodeResult};
use crate::model::{
    CanonicalMesh, CanonicalVertex, Indices, Influence, MAX_INFLUENCES, MESH_HAS_COLORS,
    MESH_HAS_INFLUENCES, MESH_HAS_NORMALS, MESH_HAS_TANGENTS, MeshSection,
};
use crate::schema::skinned::{RawChunk, RawLod, RawVertex};
use crate::schema::staticmesh::RawStaticLod;
use crate::version::VersionContext;
use crate::weld::VertexWelder;

/// Which buffer a LOD's wedges came from.
///
/// One reconstruction algorithm consumes either variant; the tag only
/// records provenance, never branches the algorithm.
#[derive(Debug, Clone, Copy)]
pub enum VertexSource<'a> {
    Cpu(&'a [RawVertex]),
    Gpu(&'a [RawVertex]),
}

impl<'a> VertexSource<'a> {
    /// Pick the best available source: the CPU (import) buffer when it
    /// survived cooking, the GPU buffer otherwise.
    pub fn pick(lod: &'a RawLod) -> Option<Self> {
        if let Some(cpu) = &lod.cpu_verts {
            Some(VertexSource::Cpu(cpu))
        } else {
            lod.gpu_verts.as_deref().map(VertexSource::Gpu)
        }
    }

    pub fn wedges(&self) -> &'a [RawVertex] {
        match self {
            VertexSource::Cpu(w) | VertexSource::Gpu(w) => w,
        }
    }
}

/// Resolves a wedge's chunk-local bone indices to mesh-global ones.
struct BoneResolver<'a> {
    chunks: &'a [RawChunk],
    ctx: VersionContext,
}

impl BoneResolver<'_> {
    /// Global bone index for `local` of the wedge at `wedge`. With no chunk
    /// table the local index already is global.
    fn resolve(&self, wedge: usize, local: u8) -> DecodeResult<i16> {
        if self.chunks.is_empty() {
            return Ok(i16::from(local));
        }
        let w = wedge as u32;
        let chunk = self
            .chunks
            .iter()
            .find(|c| w >= c.base_vertex && w < c.base_vertex + c.num_verts)
            .ok_or_else(|| self.corrupt(wedge as u64, self.chunks.len() as u64))?;
        let global = chunk
            .bone_map
            .get(usize::from(local))
            .ok_or_else(|| self.corrupt(u64::from(local), chunk.bone_map.len() as u64))?;
        Ok(*global as i16)
    }

    fn corrupt(&self, count: u64, limit: u64) -> DecodeError {
        DecodeError::new(
            DecodeErrorKind::SizeLimitExceeded { count, limit },
            "SkinChunk",
            0,
            self.ctx,
        )
    }
}

fn build_influences(
    wedge: usize,
    raw: &RawVertex,
    bones: &BoneResolver<'_>,
) -> DecodeResult<[Influence; MAX_INFLUENCES]> {
    let mut out = [Influence::NONE; MAX_INFLUENCES];
    let total: u32 = raw.weights.iter().map(|&w| u32::from(w)).sum();
    if total == 0 {
        return Ok(out);
    }
    let mut slot = 0;
    for (i, &w) in raw.weights.iter().enumerate() {
        // zero-weight influences are dropped, never stored
        if w == 0 {
            continue;
        }
        out[slot] = Influence {
            bone: bones.resolve(wedge, raw.bones[i])?,
            weight: f32::from(w) / total as f32,
        };
        slot += 1;
    }
    Ok(out)
}

fn unorm8(b: u8) -> f32 {
    f32::from(b) / 255.0
}

/// Weld a wedge buffer into a canonical mesh. `bones` is `None` on the
/// static path.
fn build_mesh(
    wedges: &[RawVertex],
    raw_indices: &[u32],
    sections: Vec<MeshSection>,
    uv_channels: usize,
    has_color: bool,
    bounds_min: Vec3,
    bounds_max: Vec3,
    bones: Option<BoneResolver<'_>>,
    ctx: VersionContext,
) -> DecodeResult<CanonicalMesh> {
    let mut welder = VertexWelder::new(bounds_min, bounds_max, wedges.len());
    let mut vertices: Vec<CanonicalVertex> = Vec::new();

    for (w, raw) in wedges.iter().enumerate() {
        let vert = welder.add(raw.position, raw.normal, 0);
        if vert == vertices.len() {
            // first wedge of this unique vertex is its representative
            let mut v = CanonicalVertex {
                position: raw.position,
                normal: raw.normal.unpack(),
                tangent: raw.tangent.unpack(),
                handedness: raw.tangent.w_sign(),
                ..CanonicalVertex::default()
            };
            v.uv[..uv_channels].copy_from_slice(&raw.uv[..uv_channels]);
            if has_color {
                v.color = [
                    unorm8(raw.color[0]),
                    unorm8(raw.color[1]),
                    unorm8(raw.color[2]),
                    unorm8(raw.color[3]),
                ];
            }
            if let Some(bones) = &bones {
                v.influences = build_influences(w, raw, bones)?;
            }
            vertices.push(v);
        }
    }

    let wedge_to_vert = welder.wedge_to_vert();
    let mut remapped = Vec::with_capacity(raw_indices.len());
    for &idx in raw_indices {
        let mapped = wedge_to_vert.get(idx as usize).ok_or_else(|| {
            DecodeError::new(
                DecodeErrorKind::SizeLimitExceeded {
                    count: u64::from(idx),
                    limit: wedges.len() as u64,
                },
                "IndexBuffer",
                0,
                ctx,
            )
        })?;
        remapped.push(*mapped);
    }

    let mut flags = MESH_HAS_NORMALS | MESH_HAS_TANGENTS;
    if has_color {
        flags |= MESH_HAS_COLORS;
    }
    if bones.is_some() {
        flags |= MESH_HAS_INFLUENCES;
    }

    Ok(CanonicalMesh {
        indices: Indices::from_wedges(&remapped, vertices.len()),
        vertices,
        sections,
        uv_channels: uv_channels as u32,
        flags,
    })
}

/// Reconstruct one skinned LOD. Fails with `MissingGeometry` when neither
/// vertex buffer survived; the caller keeps decoding the remaining LODs.
pub fn rebuild_skinned_lod(
    lod: &RawLod,
    lod_index: usize,
    bounds_min: Vec3,
    bounds_max: Vec3,
    ctx: VersionContext,
) -> DecodeResult<CanonicalMesh> {
    let source = VertexSource::pick(lod).ok_or_else(|| {
        DecodeError::new(
            DecodeErrorKind::MissingGeometry { lod: lod_index },
            "LodModel",
            0,
            ctx,
        )
    })?;

    let sections = lod
        .sections
        .iter()
        .map(|s| MeshSection {
            material_index: u32::from(s.material_index),
            first_index: s.first_index,
            num_faces: s.num_faces,
        })
        .collect();

    build_mesh(
        source.wedges(),
        &lod.indices,
        sections,
        lod.uv_channels,
        lod.has_color,
        bounds_min,
        bounds_max,
        Some(BoneResolver {
            chunks: &lod.chunks,
            ctx,
        }),
        ctx,
    )
}

/// Reconstruct one static LOD.
pub fn rebuild_static_lod(
    lod: &RawStaticLod,
    bounds_min: Vec3,
    bounds_max: Vec3,
    ctx: VersionContext,
) -> DecodeResult<CanonicalMesh> {
    let sections = lod
        .sections
        .iter()
        .map(|s| MeshSection {
            material_index: u32::from(s.material_index),
            first_index: s.first_index,
            num_faces: s.num_faces,
        })
        .collect();

    build_mesh(
        &lod.wedges,
        &lod.indices,
        sections,
        lod.uv_channels,
        lod.has_color,
        bounds_min,
        bounds_max,
        None,
        ctx,
    )
}
