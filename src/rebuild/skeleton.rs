//! Skeleton reconstruction.
//!
//! Validates the serialized bone array's hierarchy and moves it into the
//! canonical handedness. The canonical space and the source space disagree
//! in one fixed way, so every non-root bone's orientation is conjugated.
//! This is a uniform property of the format family, not a per-title case;
//! rotation animation tracks get the same correction so pose and animation
//! share one convention.

use crate::error::{DecodeError, DecodeErrorKind, DecodeResult};
use crate::model::{CanonicalBone, CanonicalSkeleton};
use crate::schema::skeleton::RawSkeleton;
use crate::version::VersionContext;

/// Build a canonical skeleton from a serialized bone array.
///
/// The hierarchy must be parent-before-child with exactly one root at
/// index 0; anything else is a layout mismatch and fails with
/// `UnsupportedVariant` rather than producing a skeleton downstream code
/// cannot walk.
pub fn rebuild_skeleton(raw: &RawSkeleton, ctx: VersionContext) -> DecodeResult<CanonicalSkeleton> {
    let reject = || {
        DecodeError::new(DecodeErrorKind::UnsupportedVariant, "Skeleton", 0, ctx)
    };

    let mut bones = Vec::with_capacity(raw.bones.len());
    for (i, raw_bone) in raw.bones.iter().enumerate() {
        if i == 0 {
            if raw_bone.parent != -1 {
                return Err(reject());
            }
        } else if raw_bone.parent < 0 || raw_bone.parent as usize >= i {
            return Err(reject());
        }

        let orientation = if i == 0 {
            raw_bone.orientation
        } else {
            raw_bone.orientation.conjugate()
        };

        bones.push(CanonicalBone {
            name: raw_bone.name.clone(),
            parent: raw_bone.parent,
            position: raw_bone.position,
            orientation,
            scale: raw_bone.scale,
        });
    }

    Ok(CanonicalSkeleton { bones })
}
