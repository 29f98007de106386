//! Wedge welding.
//!
//! A *wedge* is a per-triangle-corner vertex instance; source buffers store
//! one wedge per index-buffer entry, so identical corners appear many times.
//! [`VertexWelder`] maps each (position, normal, extra key) triple to a
//! stable shared-vertex id using a spatial hash: the bucket index is derived
//! from the position normalized against the mesh bounding box, and each
//! bucket holds a chain of unique-vertex indices through a parallel `next`
//! array.
//!
//! Comparison is exact: same bits in, same id out. That content-addressed
//! guarantee is what lets CPU- and GPU-sourced reconstructions of the same
//! mesh agree bit-identically.
//!
//! One welder instance serves one mesh LOD and is discarded once that LOD's
//! canonical mesh is built.

use glam::Vec3;

use crate::quant::PackedNormal;

const NO_VERT: i32 = -1;

/// Spatial-hash vertex dedup for one mesh LOD.
#[derive(Debug)]
pub struct VertexWelder {
    points: Vec<Vec3>,
    normals: Vec<u32>,
    extras: Vec<u32>,
    wedge_to_vert: Vec<u32>,
    vert_to_wedge: Vec<u32>,
    mins: Vec3,
    extents: Vec3,
    buckets: Vec<i32>,
    next: Vec<i32>,
}

impl VertexWelder {
    /// Prepare a welder for a LOD whose positions fall inside
    /// `[bounds_min, bounds_max]`, expecting roughly `expected_wedges`
    /// insertions. Bucket count scales with the expected load so chains stay
    /// short on large meshes.
    pub fn new(bounds_min: Vec3, bounds_max: Vec3, expected_wedges: usize) -> Self {
        // +1 per axis avoids zero divides on degenerate bounds
        let extents = (bounds_max - bounds_min) + Vec3::ONE;
        let bucket_count = expected_wedges.next_power_of_two().clamp(1024, 1 << 20);
        Self {
            points: Vec::with_capacity(expected_wedges),
            normals: Vec::with_capacity(expected_wedges),
            extras: Vec::with_capacity(expected_wedges),
            wedge_to_vert: Vec::with_capacity(expected_wedges),
            vert_to_wedge: Vec::new(),
            mins: bounds_min,
            extents,
            buckets: vec![NO_VERT; bucket_count],
            next: Vec::with_capacity(expected_wedges),
        }
    }

    /// Compute bounds from a position stream and prepare a welder over them.
    pub fn from_positions<'a, I>(positions: I, expected_wedges: usize) -> Self
    where
        I: IntoIterator<Item = &'a Vec3>,
    {
        let mut mins = Vec3::splat(f32::MAX);
        let mut maxs = Vec3::splat(f32::MIN);
        let mut any = false;
        for p in positions {
            mins = mins.min(*p);
            maxs = maxs.max(*p);
            any = true;
        }
        if !any {
            mins = Vec3::ZERO;
            maxs = Vec3::ZERO;
        }
        Self::new(mins, maxs, expected_wedges)
    }

    fn bucket_of(&self, pos: Vec3) -> usize {
        let n = self.buckets.len();
        // sum of normalized axes lands in 0..3; spread by 16 for better
        // distribution inside the bucket array
        let t = (pos.x - self.mins.x) / self.extents.x
            + (pos.y - self.mins.y) / self.extents.y
            + (pos.z - self.mins.z) / self.extents.z;
        let h = (t * (n as f32 / 3.0 * 16.0)).floor() as i64;
        h.rem_euclid(n as i64) as usize
    }

    /// Insert the next wedge. Returns the shared-vertex id: an existing id
    /// when an identical (position, normal, extra) was seen before, a fresh
    /// one otherwise.
    ///
    /// The normal is compared with its handedness byte masked off, so
    /// mirrored tangent bases still weld.
    pub fn add(&mut self, pos: Vec3, normal: PackedNormal, extra: u32) -> usize {
        let norm_bits = normal.xyz_bits();
        let bucket = self.bucket_of(pos);

        let mut found = NO_VERT;
        let mut at = self.buckets[bucket];
        while at >= 0 {
            let i = at as usize;
            if self.points[i] == pos && self.normals[i] == norm_bits && self.extras[i] == extra {
                found = at;
                break;
            }
            at = self.next[i];
        }

        let vert = if found >= 0 {
            found as usize
        } else {
            let i = self.points.len();
            self.points.push(pos);
            self.normals.push(norm_bits);
            self.extras.push(extra);
            self.next.push(self.buckets[bucket]);
            self.buckets[bucket] = i as i32;
            // first wedge producing a vertex is its representative
            self.vert_to_wedge.push(self.wedge_to_vert.len() as u32);
            i
        };

        self.wedge_to_vert.push(vert as u32);
        vert
    }

    /// Number of unique vertices produced so far.
    pub fn num_verts(&self) -> usize {
        self.points.len()
    }

    /// Number of wedges inserted so far.
    pub fn num_wedges(&self) -> usize {
        self.wedge_to_vert.len()
    }

    /// Shared-vertex id for each inserted wedge, in insertion order.
    pub fn wedge_to_vert(&self) -> &[u32] {
        &self.wedge_to_vert
    }

    /// Representative wedge for each unique vertex (the first wedge that
    /// produced it).
    pub fn vert_to_wedge(&self) -> &[u32] {
        &self.vert_to_wedge
    }

    /// Position of a unique vertex.
    pub fn point(&self, vert: usize) -> Vec3 {
        self.points[vert]
    }
}
