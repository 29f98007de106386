//! Decode error taxonomy.
//!
//! Every failure aborts reconstruction of the current asset only and carries
//! enough context for diagnosis: the name of the structure being read, the
//! byte offset the cursor had reached, and the archive's [`VersionContext`].
//! Batch callers treat each asset's failure independently; nothing ever
//! substitutes default geometry for an unparseable structure.

use thiserror::Error;

use crate::version::VersionContext;

/// Sanity ceiling for any declared count or size field.
///
/// A corrupted length field must not drive an unbounded allocation; anything
/// above this is reported as [`DecodeErrorKind::SizeLimitExceeded`]. Real
/// assets top out orders of magnitude below this.
pub const MAX_SANE_COUNT: u64 = 0x0400_0000; // 64M elements

/// What went wrong, without location context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeErrorKind {
    /// A read ran past the end of the buffer.
    #[error("truncated: wanted {wanted} bytes, {remaining} remaining")]
    Truncated { wanted: usize, remaining: usize },

    /// The version context declares the structure must exist, but no layout
    /// rule matched. The dispatcher fails loudly rather than guessing.
    #[error("no layout rule matches this version")]
    UnsupportedVariant,

    /// No usable vertex source (neither CPU nor GPU buffer) for a LOD.
    #[error("no vertex source for LOD {lod}")]
    MissingGeometry { lod: usize },

    /// An encoding-tag value outside its declared domain. Structurally this
    /// cannot happen in a well-formed archive, so the input is treated as
    /// corrupt or hostile.
    #[error("encoding tag {tag:#x} outside declared domain")]
    MalformedQuantizedData { tag: u8 },

    /// A declared count or size exceeds [`MAX_SANE_COUNT`].
    #[error("declared count {count} exceeds sanity ceiling {limit}")]
    SizeLimitExceeded { count: u64, limit: u64 },
}

/// A decode failure with its location.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind} while reading {structure} at offset {offset:#x} ({ctx})")]
pub struct DecodeError {
    pub kind: DecodeErrorKind,
    /// Name of the structure being decoded when the failure occurred.
    pub structure: &'static str,
    /// Cursor position at the point of failure.
    pub offset: usize,
    /// Version context of the archive.
    pub ctx: VersionContext,
}

impl DecodeError {
    pub fn new(
        kind: DecodeErrorKind,
        structure: &'static str,
        offset: usize,
        ctx: VersionContext,
    ) -> Self {
        Self {
            kind,
            structure,
            offset,
            ctx,
        }
    }

    /// Rename the structure on an error bubbling up from a helper that did
    /// not know what it was reading on behalf of.
    #[must_use]
    pub fn in_structure(mut self, structure: &'static str) -> Self {
        self.structure = structure;
        self
    }
}

pub type DecodeResult<T> = Result<T, DecodeError>;

/// Check a declared element count against the sanity ceiling.
pub fn check_count(
    count: u64,
    structure: &'static str,
    offset: usize,
    ctx: VersionContext,
) -> DecodeResult<()> {
    if count > MAX_SANE_COUNT {
        return Err(DecodeError::new(
            DecodeErrorKind::SizeLimitExceeded {
                count,
                limit: MAX_SANE_COUNT,
            },
            structure,
            offset,
            ctx,
        ));
    }
    Ok(())
}
