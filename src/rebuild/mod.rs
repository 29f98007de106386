//! Canonical reconstruction.
//!
//! The second half of the decode pipeline: raw structures from
//! [`crate::schema`] go in, canonical assets come out. Each entry point is a
//! pure function of (bytes, version context); nothing here consults global
//! state, so callers may run any number of decodes concurrently over
//! disjoint buffers.

pub mod animation;
pub mod mesh;
pub mod skeleton;

use crate::cursor::ByteCursor;
use crate::error::DecodeResult;
use crate::model::{AnimSet, CanonicalMesh, CanonicalSkeleton};
use crate::schema::{anim, skeleton as skeleton_schema, skinned, staticmesh};
use crate::version::VersionContext;

/// A fully reconstructed skinned mesh.
///
/// LODs reconstruct independently: a LOD whose vertex data was stripped
/// carries its `MissingGeometry` error in place while the others decode
/// normally.
#[derive(Debug)]
pub struct SkinnedModel {
    pub name: String,
    pub skeleton: Option<CanonicalSkeleton>,
    /// Name of an externally stored skeleton object, when the asset is
    /// split; resolution is the loader's job.
    pub skeleton_ref: Option<String>,
    pub lods: Vec<DecodeResult<CanonicalMesh>>,
}

/// A fully reconstructed static mesh.
#[derive(Debug)]
pub struct StaticModel {
    pub name: String,
    pub lods: Vec<CanonicalMesh>,
}

/// Decode a skinned-mesh object from its bytes.
pub fn decode_skinned_mesh(bytes: &[u8], ctx: VersionContext) -> DecodeResult<SkinnedModel> {
    let mut cur = ByteCursor::new(bytes, ctx);
    let raw = skinned::read_skinned_mesh(&mut cur)?;

    let skel = match &raw.skeleton {
        Some(s) => Some(skeleton::rebuild_skeleton(s, ctx)?),
        None => None,
    };

    let lods = raw
        .lods
        .iter()
        .enumerate()
        .map(|(i, lod)| mesh::rebuild_skinned_lod(lod, i, raw.bounds_min, raw.bounds_max, ctx))
        .collect();

    Ok(SkinnedModel {
        name: raw.name,
        skeleton: skel,
        skeleton_ref: raw.skeleton_ref,
        lods,
    })
}

/// Decode a static-mesh object from its bytes.
pub fn decode_static_mesh(bytes: &[u8], ctx: VersionContext) -> DecodeResult<StaticModel> {
    let mut cur = ByteCursor::new(bytes, ctx);
    let raw = staticmesh::read_static_mesh(&mut cur)?;

    let mut lods = Vec::with_capacity(raw.lods.len());
    for lod in &raw.lods {
        lods.push(mesh::rebuild_static_lod(
            lod,
            raw.bounds_min,
            raw.bounds_max,
            ctx,
        )?);
    }

    Ok(StaticModel {
        name: raw.name,
        lods,
    })
}

/// Decode a standalone skeleton object from its bytes.
pub fn decode_skeleton(bytes: &[u8], ctx: VersionContext) -> DecodeResult<CanonicalSkeleton> {
    let mut cur = ByteCursor::new(bytes, ctx);
    let raw = skeleton_schema::read_skeleton(&mut cur)?;
    skeleton::rebuild_skeleton(&raw, ctx)
}

/// Decode an animation-set object from its bytes.
pub fn decode_anim_set(bytes: &[u8], ctx: VersionContext) -> DecodeResult<AnimSet> {
    let mut cur = ByteCursor::new(bytes, ctx);
    let raw = anim::read_anim_set(&mut cur)?;
    animation::rebuild_anim_set(&raw, ctx)
}
