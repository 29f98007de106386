//! Versioned structure layouts and their dispatch.
//!
//! A decade of engine releases and per-title forks means the byte layout of
//! every structure depends on the full [`VersionContext`]. Rather than
//! scattering version conditionals through the readers, each structure type
//! gets an ordered table of guarded rules: the first rule whose predicate
//! accepts the context decides the layout.
//!
//! First-match-wins ordering is load-bearing. Title forks diverge from the
//! mainline lineage and sometimes re-converge, so a title rule can both
//! unlock a layout *earlier* than the mainline range and hold an obsolete
//! layout *later*. Title rules are therefore tabled above the mainline range
//! rules they shadow, and the two lineages are never collapsed into a single
//! comparison. Where discovered precedence looks accidental it is preserved
//! anyway; reordering a table is a compatibility break, not a cleanup.
//!
//! A structure the declared format version says must exist, with no matching
//! rule, fails loudly with `UnsupportedVariant`; presence of optional fields
//! is always decided by a guard, never inferred from already-read data.

pub mod anim;
pub mod skeleton;
pub mod skinned;
pub mod staticmesh;

use log::debug;

use crate::cursor::ByteCursor;
use crate::error::{DecodeErrorKind, DecodeResult};
use crate::version::VersionContext;

/// One guarded layout alternative for a structure type.
pub struct LayoutRule<L> {
    /// Short description of the lineage this rule covers, for tracing.
    pub why: &'static str,
    pub guard: fn(&VersionContext) -> bool,
    pub layout: L,
}

/// Shorthand for building rule tables as consts.
pub const fn rule<L>(
    why: &'static str,
    guard: fn(&VersionContext) -> bool,
    layout: L,
) -> LayoutRule<L> {
    LayoutRule { why, guard, layout }
}

/// Select a layout for `structure` under the cursor's version context.
///
/// Rules are evaluated top-to-bottom; the first match wins. No match is an
/// `UnsupportedVariant` error at the cursor's current offset.
pub fn select<L: Copy>(
    structure: &'static str,
    rules: &[LayoutRule<L>],
    cur: &ByteCursor<'_>,
) -> DecodeResult<L> {
    let ctx = cur.ctx();
    for r in rules {
        if (r.guard)(&ctx) {
            debug!("{structure}: {} ({ctx})", r.why);
            return Ok(r.layout);
        }
    }
    Err(cur.error(DecodeErrorKind::UnsupportedVariant).in_structure(structure))
}
