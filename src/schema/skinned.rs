//! Skinned-mesh raw structures.
//!
//! Per-version layouts for the skeletal mesh object: LOD models, material
//! sections, skin chunks with their local bone maps, and the CPU/GPU vertex
//! buffers. Output is transient [`RawLod`] data, consumed and discarded by
//! the mesh reconstructor.
//!
//! The legacy format kept the active UV-channel count in process-global
//! state while deserializing vertex buffers. Here it is read once per LOD
//! and threaded explicitly through every buffer reader.

use glam::{Vec2, Vec3};

use crate::cursor::ByteCursor;
use crate::error::{DecodeErrorKind, DecodeResult};
use crate::model::MAX_UV_CHANNELS;
use crate::quant::PackedNormal;
use crate::schema::skeleton::{RawSkeleton, read_skeleton};
use crate::schema::{LayoutRule, rule, select};
use crate::version::TitleId;

/// Where the skeleton of a skinned mesh lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkeletonRefLayout {
    /// Bone array serialized inside the mesh object.
    Inline,
    /// Name of an externally stored skeleton object (empty = none).
    External,
}

const SKELETON_REF_RULES: &[LayoutRule<SkeletonRefLayout>] = &[
    rule(
        "external skeleton object",
        |c| c.format >= 340,
        SkeletonRefLayout::External,
    ),
    rule("inline skeleton", |_| true, SkeletonRefLayout::Inline),
];

/// Section record layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionLayout {
    /// material, first index, face count.
    Basic,
    /// Basic plus the owning chunk's index.
    WithChunkIndex,
}

const SECTION_RULES: &[LayoutRule<SectionLayout>] = &[
    rule(
        "skybreak shipped the chunk index early",
        |c| c.title == TitleId::Skybreak && c.format >= 292,
        SectionLayout::WithChunkIndex,
    ),
    rule(
        "mainline chunk index",
        |c| c.format >= 300,
        SectionLayout::WithChunkIndex,
    ),
    rule("legacy section", |_| true, SectionLayout::Basic),
];

/// Index buffer layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexLayout {
    /// Always 16-bit entries.
    Narrow,
    /// Leading width byte: 0 = 16-bit entries, 1 = 32-bit.
    WidthFlag,
}

pub(crate) const INDEX_RULES: &[LayoutRule<IndexLayout>] = &[
    rule(
        "irontide kept 16-bit indices past mainline 310",
        |c| c.title == TitleId::IronTide && c.vendor < 23,
        IndexLayout::Narrow,
    ),
    rule("width flag", |c| c.format >= 310, IndexLayout::WidthFlag),
    rule("legacy 16-bit", |_| true, IndexLayout::Narrow),
];

/// Which vertex buffers a LOD serializes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexDataLayout {
    /// CPU (import) buffer only.
    CpuOnly,
    /// CPU buffer followed by the GPU buffer, both always present.
    CpuPlusGpu,
    /// Presence flags byte, then CPU and/or GPU buffer. Cooked archives
    /// strip the CPU buffer here.
    Flagged,
}

const VERTEX_DATA_RULES: &[LayoutRule<VertexDataLayout>] = &[
    rule(
        "duskfall shipped the GPU buffer at 265 and never adopted stripping",
        |c| c.title == TitleId::Duskfall && c.format >= 265,
        VertexDataLayout::CpuPlusGpu,
    ),
    rule(
        "stripped-buffer flags",
        |c| c.format >= 320,
        VertexDataLayout::Flagged,
    ),
    rule(
        "mainline GPU buffer",
        |c| c.format >= 280,
        VertexDataLayout::CpuPlusGpu,
    ),
    rule("CPU buffer only", |_| true, VertexDataLayout::CpuOnly),
];

/// Whether CPU vertices carry a color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuColorLayout {
    NoColor,
    Color,
}

pub(crate) const CPU_COLOR_RULES: &[LayoutRule<CpuColorLayout>] = &[
    rule("vertex color", |c| c.format >= 336, CpuColorLayout::Color),
    rule("no vertex color", |_| true, CpuColorLayout::NoColor),
];

/// How many (bone, weight) pairs a vertex serializes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfluenceWidth {
    Four,
    Eight,
}

impl InfluenceWidth {
    pub fn count(self) -> usize {
        match self {
            InfluenceWidth::Four => 4,
            InfluenceWidth::Eight => 8,
        }
    }
}

const INFLUENCE_RULES: &[LayoutRule<InfluenceWidth>] = &[
    rule(
        "eight influences",
        |c| c.format >= 344,
        InfluenceWidth::Eight,
    ),
    rule("four influences", |_| true, InfluenceWidth::Four),
];

/// GPU buffer UV precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuUvMode {
    /// Always binary16 UVs, no header byte.
    AlwaysHalf,
    /// Header byte selects half (0) or full (1) precision.
    HeaderFlag,
}

const GPU_UV_RULES: &[LayoutRule<GpuUvMode>] = &[
    rule("full-UV header flag", |c| c.format >= 300, GpuUvMode::HeaderFlag),
    rule("half UVs", |_| true, GpuUvMode::AlwaysHalf),
];

/// One material section of a LOD.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSection {
    pub material_index: u16,
    pub first_index: u32,
    pub num_faces: u32,
    pub chunk_index: u16,
}

/// One skin chunk: a contiguous wedge range with a local bone map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChunk {
    /// First wedge of the chunk in the linear vertex buffer.
    pub base_vertex: u32,
    pub num_verts: u32,
    /// Chunk-local bone index -> mesh-global bone index.
    pub bone_map: Vec<u16>,
}

/// One wedge as stored on disk, already widened to a per-version-independent
/// shape. Transient: consumed by the mesh reconstructor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawVertex {
    pub position: Vec3,
    pub normal: PackedNormal,
    pub tangent: PackedNormal,
    pub uv: [Vec2; MAX_UV_CHANNELS],
    pub color: [u8; 4],
    /// Chunk-local bone indices; slot used when its weight is non-zero.
    pub bones: [u8; 8],
    /// unorm8 weights, 0 = unused slot.
    pub weights: [u8; 8],
}

impl Default for RawVertex {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            normal: PackedNormal::default(),
            tangent: PackedNormal::default(),
            uv: [Vec2::ZERO; MAX_UV_CHANNELS],
            color: [255; 4],
            bones: [0; 8],
            weights: [0; 8],
        }
    }
}

/// One LOD worth of raw data.
#[derive(Debug, Clone, PartialEq)]
pub struct RawLod {
    pub uv_channels: usize,
    pub has_color: bool,
    pub sections: Vec<RawSection>,
    /// Wedge indices, three per face.
    pub indices: Vec<u32>,
    pub chunks: Vec<RawChunk>,
    /// CPU (import) wedges, when not stripped.
    pub cpu_verts: Option<Vec<RawVertex>>,
    /// GPU wedges, when the version serializes them.
    pub gpu_verts: Option<Vec<RawVertex>>,
}

/// The whole skinned-mesh object.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSkinnedMesh {
    pub name: String,
    pub bounds_min: Vec3,
    pub bounds_max: Vec3,
    pub skeleton: Option<RawSkeleton>,
    /// Name of the external skeleton object, for split assets.
    pub skeleton_ref: Option<String>,
    pub lods: Vec<RawLod>,
}

fn read_vec3(cur: &mut ByteCursor<'_>) -> DecodeResult<Vec3> {
    Ok(Vec3::new(cur.read_f32()?, cur.read_f32()?, cur.read_f32()?))
}

fn read_section(cur: &mut ByteCursor<'_>, layout: SectionLayout) -> DecodeResult<RawSection> {
    let material_index = cur.read_u16()?;
    let first_index = cur.read_u32()?;
    let num_faces = cur.read_u32()?;
    let chunk_index = match layout {
        SectionLayout::Basic => 0,
        SectionLayout::WithChunkIndex => cur.read_u16()?,
    };
    Ok(RawSection {
        material_index,
        first_index,
        num_faces,
        chunk_index,
    })
}

pub(crate) fn read_indices(cur: &mut ByteCursor<'_>, layout: IndexLayout) -> DecodeResult<Vec<u32>> {
    let wide = match layout {
        IndexLayout::Narrow => false,
        IndexLayout::WidthFlag => match cur.read_u8()? {
            0 => false,
            1 => true,
            tag => {
                return Err(cur.error(DecodeErrorKind::MalformedQuantizedData { tag }));
            }
        },
    };
    let count = cur.read_count()?;
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        out.push(if wide {
            cur.read_u32()?
        } else {
            u32::from(cur.read_u16()?)
        });
    }
    Ok(out)
}

fn read_chunk(cur: &mut ByteCursor<'_>) -> DecodeResult<RawChunk> {
    let base_vertex = cur.read_u32()?;
    let num_verts = cur.read_u32()?;
    let map_len = cur.read_count()?;
    let mut bone_map = Vec::with_capacity(map_len);
    for _ in 0..map_len {
        bone_map.push(cur.read_u16()?);
    }
    Ok(RawChunk {
        base_vertex,
        num_verts,
        bone_map,
    })
}

fn read_influences(
    cur: &mut ByteCursor<'_>,
    width: InfluenceWidth,
    vert: &mut RawVertex,
) -> DecodeResult<()> {
    for slot in 0..width.count() {
        vert.bones[slot] = cur.read_u8()?;
        vert.weights[slot] = cur.read_u8()?;
    }
    Ok(())
}

fn read_cpu_buffer(
    cur: &mut ByteCursor<'_>,
    uv_channels: usize,
    color: CpuColorLayout,
    width: InfluenceWidth,
) -> DecodeResult<Vec<RawVertex>> {
    let prev = cur.enter("CpuVertexBuffer");
    let count = cur.read_count()?;
    let mut verts = Vec::with_capacity(count);
    for _ in 0..count {
        let mut v = RawVertex::default();
        v.position = read_vec3(cur)?;
        v.normal = PackedNormal(cur.read_u32()?);
        v.tangent = PackedNormal(cur.read_u32()?);
        for ch in 0..uv_channels {
            v.uv[ch] = Vec2::new(cur.read_f32()?, cur.read_f32()?);
        }
        if color == CpuColorLayout::Color {
            let b = cur.read_bytes(4)?;
            v.color = [b[0], b[1], b[2], b[3]];
        }
        read_influences(cur, width, &mut v)?;
        verts.push(v);
    }
    cur.leave(prev);
    Ok(verts)
}

fn read_gpu_buffer(
    cur: &mut ByteCursor<'_>,
    uv_channels: usize,
    width: InfluenceWidth,
    uv_mode: GpuUvMode,
) -> DecodeResult<Vec<RawVertex>> {
    let prev = cur.enter("GpuVertexBuffer");
    let full_uv = match uv_mode {
        GpuUvMode::AlwaysHalf => false,
        GpuUvMode::HeaderFlag => cur.read_u8()? != 0,
    };
    let count = cur.read_count()?;
    let mut verts = Vec::with_capacity(count);
    for _ in 0..count {
        let mut v = RawVertex::default();
        v.normal = PackedNormal(cur.read_u32()?);
        v.tangent = PackedNormal(cur.read_u32()?);
        read_influences(cur, width, &mut v)?;
        v.position = read_vec3(cur)?;
        for ch in 0..uv_channels {
            v.uv[ch] = if full_uv {
                Vec2::new(cur.read_f32()?, cur.read_f32()?)
            } else {
                Vec2::new(cur.read_f16()?, cur.read_f16()?)
            };
        }
        verts.push(v);
    }
    cur.leave(prev);
    Ok(verts)
}

fn read_lod(cur: &mut ByteCursor<'_>) -> DecodeResult<RawLod> {
    let prev = cur.enter("LodModel");

    let at = cur.tell();
    let uv_channels = cur.read_u32()? as usize;
    if uv_channels == 0 || uv_channels > MAX_UV_CHANNELS {
        return Err(crate::error::DecodeError::new(
            DecodeErrorKind::SizeLimitExceeded {
                count: uv_channels as u64,
                limit: MAX_UV_CHANNELS as u64,
            },
            "LodModel",
            at,
            cur.ctx(),
        ));
    }

    let section_layout = select("Section", SECTION_RULES, cur)?;
    let section_count = cur.read_count()?;
    let mut sections = Vec::with_capacity(section_count);
    for _ in 0..section_count {
        sections.push(read_section(cur, section_layout)?);
    }

    let index_layout = select("IndexBuffer", INDEX_RULES, cur)?;
    let indices = read_indices(cur, index_layout)?;

    let chunk_count = cur.read_count()?;
    let mut chunks = Vec::with_capacity(chunk_count);
    for _ in 0..chunk_count {
        chunks.push(read_chunk(cur)?);
    }

    let color_layout = select("CpuVertex", CPU_COLOR_RULES, cur)?;
    let influence_width = select("Influences", INFLUENCE_RULES, cur)?;
    let uv_mode = select("GpuVertex", GPU_UV_RULES, cur)?;
    let data_layout = select("VertexData", VERTEX_DATA_RULES, cur)?;

    let (cpu_verts, gpu_verts) = match data_layout {
        VertexDataLayout::CpuOnly => {
            let cpu = read_cpu_buffer(cur, uv_channels, color_layout, influence_width)?;
            (Some(cpu), None)
        }
        VertexDataLayout::CpuPlusGpu => {
            let cpu = read_cpu_buffer(cur, uv_channels, color_layout, influence_width)?;
            let gpu = read_gpu_buffer(cur, uv_channels, influence_width, uv_mode)?;
            (Some(cpu), Some(gpu))
        }
        VertexDataLayout::Flagged => {
            let flags = cur.read_u8()?;
            let cpu = if flags & 1 != 0 {
                Some(read_cpu_buffer(cur, uv_channels, color_layout, influence_width)?)
            } else {
                None
            };
            let gpu = if flags & 2 != 0 {
                Some(read_gpu_buffer(cur, uv_channels, influence_width, uv_mode)?)
            } else {
                None
            };
            (cpu, gpu)
        }
    };

    cur.leave(prev);
    Ok(RawLod {
        uv_channels,
        has_color: color_layout == CpuColorLayout::Color,
        sections,
        indices,
        chunks,
        cpu_verts,
        gpu_verts,
    })
}

/// Read a skinned-mesh object.
pub fn read_skinned_mesh(cur: &mut ByteCursor<'_>) -> DecodeResult<RawSkinnedMesh> {
    let prev = cur.enter("SkinnedMesh");

    let name = cur.read_string()?;
    let bounds_min = read_vec3(cur)?;
    let bounds_max = read_vec3(cur)?;

    let (skeleton, skeleton_ref) = match select("SkeletonRef", SKELETON_REF_RULES, cur)? {
        SkeletonRefLayout::Inline => (Some(read_skeleton(cur)?), None),
        SkeletonRefLayout::External => {
            let name = cur.read_string()?;
            (None, if name.is_empty() { None } else { Some(name) })
        }
    };

    let lod_count = cur.read_count()?;
    let mut lods = Vec::with_capacity(lod_count);
    for _ in 0..lod_count {
        lods.push(read_lod(cur)?);
    }

    cur.leave(prev);
    Ok(RawSkinnedMesh {
        name,
        bounds_min,
        bounds_max,
        skeleton,
        skeleton_ref,
        lods,
    })
}
