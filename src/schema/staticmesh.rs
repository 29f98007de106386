//! Static-mesh raw structures.
//!
//! The rigid-geometry counterpart of the skinned path: no skeleton, no skin
//! chunks, one wedge stream per LOD serialized as parallel component
//! streams over a single wedge count. Index buffers and the vertex-color
//! cutoff share the skinned-mesh rule tables.

use glam::{Vec2, Vec3};

use crate::cursor::ByteCursor;
use crate::error::{DecodeError, DecodeErrorKind, DecodeResult};
use crate::model::MAX_UV_CHANNELS;
use crate::quant::PackedNormal;
use crate::schema::skinned::{CPU_COLOR_RULES, CpuColorLayout, INDEX_RULES, RawVertex, read_indices};
use crate::schema::{LayoutRule, rule, select};

/// Static-mesh UV stream precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaticUvMode {
    /// Always f32 pairs, no header byte.
    AlwaysFloat,
    /// Header byte selects half (0) or full (1) precision.
    HeaderFlag,
}

const STATIC_UV_RULES: &[LayoutRule<StaticUvMode>] = &[
    rule("UV precision flag", |c| c.format >= 300, StaticUvMode::HeaderFlag),
    rule("float UVs", |_| true, StaticUvMode::AlwaysFloat),
];

/// One material section of a static LOD.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawStaticSection {
    pub material_index: u16,
    pub first_index: u32,
    pub num_faces: u32,
}

/// One static LOD: a wedge stream plus indices.
#[derive(Debug, Clone, PartialEq)]
pub struct RawStaticLod {
    pub uv_channels: usize,
    pub has_color: bool,
    pub sections: Vec<RawStaticSection>,
    /// Wedges with the skinning slots left at their defaults.
    pub wedges: Vec<RawVertex>,
    pub indices: Vec<u32>,
}

/// The whole static-mesh object.
#[derive(Debug, Clone, PartialEq)]
pub struct RawStaticMesh {
    pub name: String,
    pub bounds_min: Vec3,
    pub bounds_max: Vec3,
    pub lods: Vec<RawStaticLod>,
}

fn read_vec3(cur: &mut ByteCursor<'_>) -> DecodeResult<Vec3> {
    Ok(Vec3::new(cur.read_f32()?, cur.read_f32()?, cur.read_f32()?))
}

fn read_static_lod(cur: &mut ByteCursor<'_>) -> DecodeResult<RawStaticLod> {
    let prev = cur.enter("StaticLodModel");

    let at = cur.tell();
    let uv_channels = cur.read_u32()? as usize;
    if uv_channels == 0 || uv_channels > MAX_UV_CHANNELS {
        return Err(DecodeError::new(
            DecodeErrorKind::SizeLimitExceeded {
                count: uv_channels as u64,
                limit: MAX_UV_CHANNELS as u64,
            },
            "StaticLodModel",
            at,
            cur.ctx(),
        ));
    }

    let section_count = cur.read_count()?;
    let mut sections = Vec::with_capacity(section_count);
    for _ in 0..section_count {
        sections.push(RawStaticSection {
            material_index: cur.read_u16()?,
            first_index: cur.read_u32()?,
            num_faces: cur.read_u32()?,
        });
    }

    let uv_mode = select("StaticUv", STATIC_UV_RULES, cur)?;
    let color_layout = select("StaticColor", CPU_COLOR_RULES, cur)?;

    let num_wedges = cur.read_count()?;
    let mut wedges = vec![RawVertex::default(); num_wedges];

    // parallel component streams over one wedge count
    for w in &mut wedges {
        w.position = read_vec3(cur)?;
    }
    for w in &mut wedges {
        w.normal = PackedNormal(cur.read_u32()?);
        w.tangent = PackedNormal(cur.read_u32()?);
    }

    let half_uv = match uv_mode {
        StaticUvMode::AlwaysFloat => false,
        StaticUvMode::HeaderFlag => cur.read_u8()? == 0,
    };
    for w in &mut wedges {
        for ch in 0..uv_channels {
            w.uv[ch] = if half_uv {
                Vec2::new(cur.read_f16()?, cur.read_f16()?)
            } else {
                Vec2::new(cur.read_f32()?, cur.read_f32()?)
            };
        }
    }

    let mut has_color = false;
    if color_layout == CpuColorLayout::Color {
        has_color = cur.read_u8()? != 0;
        if has_color {
            for w in &mut wedges {
                let b = cur.read_bytes(4)?;
                w.color = [b[0], b[1], b[2], b[3]];
            }
        }
    }

    let index_layout = select("IndexBuffer", INDEX_RULES, cur)?;
    let indices = read_indices(cur, index_layout)?;

    cur.leave(prev);
    Ok(RawStaticLod {
        uv_channels,
        has_color,
        sections,
        wedges,
        indices,
    })
}

/// Read a static-mesh object.
pub fn read_static_mesh(cur: &mut ByteCursor<'_>) -> DecodeResult<RawStaticMesh> {
    let prev = cur.enter("StaticMesh");

    let name = cur.read_string()?;
    let bounds_min = read_vec3(cur)?;
    let bounds_max = read_vec3(cur)?;

    let lod_count = cur.read_count()?;
    let mut lods = Vec::with_capacity(lod_count);
    for _ in 0..lod_count {
        lods.push(read_static_lod(cur)?);
    }

    cur.leave(prev);
    Ok(RawStaticMesh {
        name,
        bounds_min,
        bounds_max,
        lods,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::VersionContext;

    fn push_str(buf: &mut Vec<u8>, s: &str) {
        buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
        buf.extend_from_slice(s.as_bytes());
    }

    fn push_f32s(buf: &mut Vec<u8>, vals: &[f32]) {
        for v in vals {
            buf.extend_from_slice(&v.to_le_bytes());
        }
    }

    fn tri_mesh_bytes(format_300_plus: bool) -> Vec<u8> {
        let mut buf = Vec::new();
        push_str(&mut buf, "rock");
        push_f32s(&mut buf, &[0.0, 0.0, 0.0]); // bounds min
        push_f32s(&mut buf, &[1.0, 1.0, 1.0]); // bounds max
        buf.extend_from_slice(&1u32.to_le_bytes()); // lod count

        buf.extend_from_slice(&1u32.to_le_bytes()); // uv channels
        buf.extend_from_slice(&1u32.to_le_bytes()); // section count
        buf.extend_from_slice(&0u16.to_le_bytes()); // material
        buf.extend_from_slice(&0u32.to_le_bytes()); // first index
        buf.extend_from_slice(&1u32.to_le_bytes()); // faces

        buf.extend_from_slice(&3u32.to_le_bytes()); // wedge count
        push_f32s(&mut buf, &[0.0, 0.0, 0.0]);
        push_f32s(&mut buf, &[1.0, 0.0, 0.0]);
        push_f32s(&mut buf, &[0.0, 1.0, 0.0]);
        for _ in 0..3 {
            buf.extend_from_slice(&0x0080_80FFu32.to_le_bytes()); // normal
            buf.extend_from_slice(&0xFF80_FF80u32.to_le_bytes()); // tangent
        }
        if format_300_plus {
            buf.push(1); // full-precision UVs
        }
        for i in 0..3 {
            push_f32s(&mut buf, &[i as f32 * 0.5, 0.25]);
        }

        buf.extend_from_slice(&3u32.to_le_bytes()); // index count
        for i in 0..3u16 {
            buf.extend_from_slice(&i.to_le_bytes());
        }
        buf
    }

    #[test]
    fn test_read_static_mesh_legacy() {
        let buf = tri_mesh_bytes(false);
        let mut cur = ByteCursor::new(&buf, VersionContext::mainline(250));
        let mesh = read_static_mesh(&mut cur).unwrap();
        assert_eq!(mesh.name, "rock");
        let lod = &mesh.lods[0];
        assert_eq!(lod.wedges.len(), 3);
        assert_eq!(lod.indices, vec![0, 1, 2]);
        assert_eq!(lod.wedges[1].position, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(lod.wedges[2].uv[0], Vec2::new(1.0, 0.25));
        assert!(!lod.has_color);
    }

    #[test]
    fn test_read_static_mesh_with_uv_flag() {
        let buf = tri_mesh_bytes(true);
        // 300..335: UV flag present, color cutoff not reached
        let mut cur = ByteCursor::new(&buf, VersionContext::mainline(300));
        let mesh = read_static_mesh(&mut cur).unwrap();
        assert_eq!(mesh.lods[0].wedges[1].uv[0], Vec2::new(0.5, 0.25));
    }

    #[test]
    fn test_static_uv_channel_ceiling() {
        let mut buf = Vec::new();
        push_str(&mut buf, "bad");
        push_f32s(&mut buf, &[0.0; 6]);
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(&5u32.to_le_bytes()); // uv channels over the cap
        let mut cur = ByteCursor::new(&buf, VersionContext::mainline(250));
        let err = read_static_mesh(&mut cur).unwrap_err();
        assert!(matches!(err.kind, DecodeErrorKind::SizeLimitExceeded { .. }));
    }
}
