//! Skeleton raw structures.
//!
//! Bone arrays as serialized: reference-pose transform per bone in
//! parent-local space, in the source handedness. Orientation conjugation and
//! hierarchy validation happen in the skeleton reconstructor, not here.

use glam::{Quat, Vec3};

use crate::cursor::ByteCursor;
use crate::error::DecodeResult;
use crate::quant::quat_fixed48;
use crate::schema::{LayoutRule, rule, select};
use crate::version::TitleId;

/// How a bone's orientation is serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoneQuatLayout {
    /// Four f32 components, W stored.
    Float4,
    /// Three 16-bit fixed-point components, W reconstructed.
    Fixed48,
}

const BONE_QUAT_RULES: &[LayoutRule<BoneQuatLayout>] = &[
    rule(
        "fixed48 bone orientations",
        |c| c.format >= 330,
        BoneQuatLayout::Fixed48,
    ),
    rule("float orientations", |_| true, BoneQuatLayout::Float4),
];

/// Whether bones carry a scale, and where it sits relative to the
/// orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoneScaleLayout {
    NoScale,
    /// Scale after the orientation.
    ScaleAfter,
    /// Scale between position and orientation. Hollowpoint shipped the
    /// field in this order and kept it.
    ScaleBefore,
}

const BONE_SCALE_RULES: &[LayoutRule<BoneScaleLayout>] = &[
    rule(
        "hollowpoint scale-before-orientation",
        |c| c.title == TitleId::Hollowpoint && c.format >= 355,
        BoneScaleLayout::ScaleBefore,
    ),
    rule(
        "mainline per-bone scale",
        |c| c.format >= 370,
        BoneScaleLayout::ScaleAfter,
    ),
    rule("no bone scale", |_| true, BoneScaleLayout::NoScale),
];

/// One bone as stored on disk, orientation not yet conjugated.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBone {
    pub name: String,
    /// Parent bone index; -1 for the root.
    pub parent: i32,
    pub position: Vec3,
    pub orientation: Quat,
    pub scale: Option<Vec3>,
}

/// Bone array in serialized order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawSkeleton {
    pub bones: Vec<RawBone>,
}

fn read_vec3(cur: &mut ByteCursor<'_>) -> DecodeResult<Vec3> {
    Ok(Vec3::new(cur.read_f32()?, cur.read_f32()?, cur.read_f32()?))
}

fn read_quat(cur: &mut ByteCursor<'_>, layout: BoneQuatLayout) -> DecodeResult<Quat> {
    match layout {
        BoneQuatLayout::Float4 => Ok(Quat::from_xyzw(
            cur.read_f32()?,
            cur.read_f32()?,
            cur.read_f32()?,
            cur.read_f32()?,
        )),
        BoneQuatLayout::Fixed48 => {
            let raw = [cur.read_u16()?, cur.read_u16()?, cur.read_u16()?];
            Ok(quat_fixed48(raw))
        }
    }
}

fn read_bone(
    cur: &mut ByteCursor<'_>,
    quat_layout: BoneQuatLayout,
    scale_layout: BoneScaleLayout,
) -> DecodeResult<RawBone> {
    let name = cur.read_string()?;
    let parent = cur.read_i32()?;
    let position = read_vec3(cur)?;

    let mut scale = None;
    if scale_layout == BoneScaleLayout::ScaleBefore {
        scale = Some(read_vec3(cur)?);
    }
    let orientation = read_quat(cur, quat_layout)?;
    if scale_layout == BoneScaleLayout::ScaleAfter {
        scale = Some(read_vec3(cur)?);
    }

    Ok(RawBone {
        name,
        parent,
        position,
        orientation,
        scale,
    })
}

/// Read a serialized bone array.
pub fn read_skeleton(cur: &mut ByteCursor<'_>) -> DecodeResult<RawSkeleton> {
    let prev = cur.enter("Skeleton");

    let quat_layout = select("BoneQuat", BONE_QUAT_RULES, cur)?;
    let scale_layout = select("BoneScale", BONE_SCALE_RULES, cur)?;

    let count = cur.read_count()?;
    let mut bones = Vec::with_capacity(count);
    for _ in 0..count {
        bones.push(read_bone(cur, quat_layout, scale_layout)?);
    }

    cur.leave(prev);
    Ok(RawSkeleton { bones })
}
