//! Archive version identification.
//!
//! Every Vesper archive carries three independent version axes that jointly
//! determine the byte layout of every serialized structure:
//!
//! - **format**: the engine serialization version, bumped on mainline
//!   releases over roughly a decade of the format family.
//! - **vendor**: the licensee fork version. Studios branched the engine and
//!   bumped this axis independently of mainline.
//! - **title**: which shipped title wrote the archive. Title forks can both
//!   adopt mainline layouts early and hold obsolete layouts late, so the
//!   title axis is never collapsed into a format-version comparison.
//!
//! A [`VersionContext`] is built once when an archive is opened and is the
//! sole version input to every decode call. Decode functions never consult
//! ambient state for version information.

use std::fmt;

/// Identifies which title wrote an archive.
///
/// `Mainline` covers archives written by stock engine tooling. Everything
/// else is a per-title fork with its own layout quirks, handled by guard
/// rules in [`crate::schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TitleId {
    /// Stock engine tooling, no title-specific deviations.
    #[default]
    Mainline,
    /// Skybreak: adopted the section chunk-index field before mainline.
    Skybreak,
    /// Iron Tide: kept 16-bit index buffers long after mainline moved on.
    IronTide,
    /// Duskfall: shipped the GPU vertex buffer ahead of mainline 280.
    Duskfall,
    /// Hollowpoint: reordered the skeleton scale field.
    Hollowpoint,
}

impl fmt::Display for TitleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TitleId::Mainline => "mainline",
            TitleId::Skybreak => "skybreak",
            TitleId::IronTide => "irontide",
            TitleId::Duskfall => "duskfall",
            TitleId::Hollowpoint => "hollowpoint",
        };
        f.write_str(name)
    }
}

/// Byte order of an archive, detected once at open from the header magic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Endian {
    #[default]
    Little,
    Big,
}

/// The immutable (format, vendor, title) triple attached to a decode session.
///
/// Copied freely; 8 bytes. Every conditional branch in the schema dispatcher
/// is a pure function of this value, which makes layout selection
/// deterministic and repeatable for a given archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VersionContext {
    /// Engine serialization version (mainline lineage).
    pub format: u16,
    /// Licensee fork version (vendor lineage).
    pub vendor: u16,
    /// Which title wrote the archive.
    pub title: TitleId,
    /// Archive byte order.
    pub endian: Endian,
}

impl VersionContext {
    /// Context for a stock little-endian archive of the given format version.
    pub fn mainline(format: u16) -> Self {
        Self {
            format,
            vendor: 0,
            title: TitleId::Mainline,
            endian: Endian::Little,
        }
    }

    /// Context for a title fork.
    pub fn titled(format: u16, vendor: u16, title: TitleId) -> Self {
        Self {
            format,
            vendor,
            title,
            endian: Endian::Little,
        }
    }

    /// Same context with big-endian byte order (console archives).
    pub fn big_endian(mut self) -> Self {
        self.endian = Endian::Big;
        self
    }
}

impl fmt::Display for VersionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}/{} {}", self.format, self.vendor, self.title)
    }
}
