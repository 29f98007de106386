//! Canonical asset model.
//!
//! The version-independent mesh/skeleton/animation representation this crate
//! produces. Exporters and the viewer consume these types and nothing else;
//! version-specific raw structures never leave [`crate::schema`].
//!
//! Canonical types outlive the decode that produced them and hold no
//! borrows into the source archive.

use glam::{Quat, Vec2, Vec3};
use hashbrown::HashMap;

/// Most influences a canonical vertex can carry.
pub const MAX_INFLUENCES: usize = 8;

/// Most UV channels a canonical vertex can carry.
pub const MAX_UV_CHANNELS: usize = 4;

/// Sentinel bone index terminating an influence list shorter than
/// [`MAX_INFLUENCES`].
pub const NO_BONE: i16 = -1;

/// Presence flag: vertices carry meaningful normals.
pub const MESH_HAS_NORMALS: u8 = 1;
/// Presence flag: vertices carry tangents and a handedness sign.
pub const MESH_HAS_TANGENTS: u8 = 2;
/// Presence flag: vertices carry colors.
pub const MESH_HAS_COLORS: u8 = 4;
/// Presence flag: vertices carry bone influences (skeletal mesh).
pub const MESH_HAS_INFLUENCES: u8 = 8;

/// One (bone, weight) pair of a skinned vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Influence {
    /// Mesh-global bone index, [`NO_BONE`] for an unused slot.
    pub bone: i16,
    pub weight: f32,
}

impl Influence {
    pub const NONE: Self = Self {
        bone: NO_BONE,
        weight: 0.0,
    };
}

/// A shared (welded) vertex in canonical space.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalVertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub tangent: Vec3,
    /// Binormal handedness sign (+1 / -1), meaningful when the mesh has
    /// tangents.
    pub handedness: f32,
    pub uv: [Vec2; MAX_UV_CHANNELS],
    /// RGBA, meaningful when the mesh has colors.
    pub color: [f32; 4],
    /// Sentinel-terminated influence list; weights of the used slots sum
    /// to 1.0. Zero-weight influences are never stored.
    pub influences: [Influence; MAX_INFLUENCES],
}

impl Default for CanonicalVertex {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            normal: Vec3::Z,
            tangent: Vec3::X,
            handedness: 1.0,
            uv: [Vec2::ZERO; MAX_UV_CHANNELS],
            color: [1.0; 4],
            influences: [Influence::NONE; MAX_INFLUENCES],
        }
    }
}

impl CanonicalVertex {
    /// Number of used influence slots.
    pub fn influence_count(&self) -> usize {
        self.influences
            .iter()
            .take_while(|i| i.bone != NO_BONE)
            .count()
    }
}

/// Index buffer, 16- or 32-bit depending on how many unique vertices the
/// mesh ended up with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Indices {
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl Indices {
    /// Choose the width from the vertex count: u16 whenever every index
    /// fits, independent of what width the source buffer used.
    pub fn from_wedges(indices: &[u32], num_verts: usize) -> Self {
        if num_verts <= usize::from(u16::MAX) + 1 {
            Indices::U16(indices.iter().map(|&i| i as u16).collect())
        } else {
            Indices::U32(indices.to_vec())
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Indices::U16(v) => v.len(),
            Indices::U32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, i: usize) -> u32 {
        match self {
            Indices::U16(v) => u32::from(v[i]),
            Indices::U32(v) => v[i],
        }
    }
}

/// A contiguous run of faces sharing one material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshSection {
    /// Material slot referenced by this section.
    pub material_index: u32,
    /// First entry in the index buffer.
    pub first_index: u32,
    /// Number of triangles.
    pub num_faces: u32,
}

/// One LOD of a mesh in canonical form.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalMesh {
    pub vertices: Vec<CanonicalVertex>,
    pub indices: Indices,
    /// Sections in draw order.
    pub sections: Vec<MeshSection>,
    /// How many UV channels of each vertex are meaningful.
    pub uv_channels: u32,
    /// `MESH_HAS_*` presence flags.
    pub flags: u8,
}

impl CanonicalMesh {
    pub fn has(&self, flag: u8) -> bool {
        self.flags & flag != 0
    }
}

/// One bone of a canonical skeleton, in parent-local space.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalBone {
    pub name: String,
    /// Index of the parent bone; -1 for the root.
    pub parent: i32,
    pub position: Vec3,
    /// Unit quaternion, already in canonical handedness.
    pub orientation: Quat,
    /// Per-bone scale where the source format stored one.
    pub scale: Option<Vec3>,
}

/// Bone hierarchy in parent-before-child order.
///
/// Invariants, enforced at reconstruction: exactly one root, at index 0,
/// and `parent < own index` for every other bone.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CanonicalSkeleton {
    pub bones: Vec<CanonicalBone>,
}

impl CanonicalSkeleton {
    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|b| b.name == name)
    }

    /// Resolve an animation set's bone-name table against this skeleton.
    /// `None` entries are names the skeleton does not have; their tracks are
    /// simply unbound.
    pub fn bind_names(&self, names: &[String]) -> Vec<Option<usize>> {
        let index: HashMap<&str, usize> = self
            .bones
            .iter()
            .enumerate()
            .map(|(i, b)| (b.name.as_str(), i))
            .collect();
        names.iter().map(|n| index.get(n.as_str()).copied()).collect()
    }
}

/// Decoded key data for one bone of one sequence.
///
/// Every bone has at least one key in each channel. Empty time arrays mean
/// uniform key spacing across the sequence's frame count; when present, a
/// time array is monotonic and exactly as long as its key array.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnimTrack {
    pub key_pos: Vec<Vec3>,
    pub key_quat: Vec<Quat>,
    pub key_scale: Vec<Vec3>,
    pub pos_time: Vec<f32>,
    pub quat_time: Vec<f32>,
    pub scale_time: Vec<f32>,
}

/// One named animation sequence: a track per bone.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimSequence {
    pub name: String,
    pub num_frames: u32,
    /// Playback rate in frames per second.
    pub rate: f32,
    /// One track per entry of the owning set's bone-name table.
    pub tracks: Vec<AnimTrack>,
}

/// A named group of sequences sharing one bone-name table.
///
/// Tracks bind to skeleton bones by name, so a set can animate any skeleton
/// whose bone names match.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnimSet {
    pub name: String,
    pub bone_names: Vec<String>,
    pub sequences: Vec<AnimSequence>,
}
