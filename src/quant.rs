//! Quantized value decoding.
//!
//! Pure functions turning packed binary encodings into floating-point
//! vectors and quaternions. Which encoding applies to a given run of keys is
//! decided by the surrounding structure layout (see [`crate::schema`]); the
//! functions here only ever see a tag that is already validated, plus the
//! raw bits and, for interval codes, an externally supplied (min, range)
//! pair.
//!
//! Fixed-point codes use half-integer midpoints so the full raw range maps
//! exactly onto [-1, 1]:
//!
//! ```text
//! 16 bit: v / 32767.5 - 1
//! 11 bit: v / 1023.5  - 1
//! 10 bit: v /  511.5  - 1
//! ```
//!
//! Quaternion codes drop W; it is reconstructed as
//! `w = sqrt(max(0, 1 - x² - y² - z²))`. The sign of W is never stored.

use glam::{Quat, Vec3};
use half::f16;

/// Closed set of packing schemes used by the format family.
///
/// The discriminants are the on-disk tag values carried in per-track stream
/// headers. Anything else is corrupt input, rejected at the header, so the
/// decode functions themselves are total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EncodingTag {
    /// Three uncompressed f32 components (quaternions: W dropped).
    Float3 = 0,
    /// 16 bits per axis, symmetric fixed point.
    Fixed48 = 1,
    /// 11/11/10 bits packed into one u32, interval coded against an
    /// external (min, range) pair.
    IntervalFixed32 = 2,
    /// 11/11/10 bits packed into one u32, symmetric fixed point.
    Fixed32 = 3,
    /// Three binary16 components.
    Half = 4,
    /// No bits consumed; decodes to a fixed neutral value.
    Identity = 5,
}

impl EncodingTag {
    /// Map an on-disk tag value. Returns the raw value on failure so the
    /// caller can report `MalformedQuantizedData`.
    pub fn from_raw(raw: u8) -> Result<Self, u8> {
        Ok(match raw {
            0 => Self::Float3,
            1 => Self::Fixed48,
            2 => Self::IntervalFixed32,
            3 => Self::Fixed32,
            4 => Self::Half,
            5 => Self::Identity,
            other => return Err(other),
        })
    }

    /// Bytes consumed per key by this encoding.
    pub fn key_size(self) -> usize {
        match self {
            Self::Float3 => 12,
            Self::Fixed48 | Self::Half => 6,
            Self::IntervalFixed32 | Self::Fixed32 => 4,
            Self::Identity => 0,
        }
    }

    /// Whether keys of this encoding need an external (min, range) pair.
    pub fn needs_interval(self) -> bool {
        self == Self::IntervalFixed32
    }
}

/// Dequantize a 16-bit symmetric fixed-point value into [-1, 1].
#[inline]
pub fn unpack_fixed16(v: u16) -> f32 {
    f32::from(v) / 32767.5 - 1.0
}

/// Dequantize an 11-bit symmetric fixed-point value into [-1, 1].
#[inline]
pub fn unpack_fixed11(v: u32) -> f32 {
    (v & 0x7FF) as f32 / 1023.5 - 1.0
}

/// Dequantize a 10-bit symmetric fixed-point value into [-1, 1].
#[inline]
pub fn unpack_fixed10(v: u32) -> f32 {
    (v & 0x3FF) as f32 / 511.5 - 1.0
}

/// Widen a binary16 bit pattern to f32.
#[inline]
pub fn unpack_half(bits: u16) -> f32 {
    f16::from_bits(bits).to_f32()
}

/// Reconstruct the dropped W component of a unit quaternion.
///
/// `wsq` can dip below zero from quantization error; the max() keeps the
/// sqrt defined (the original data hits exactly this case at wsq == -0.0).
#[inline]
pub fn reconstruct_w(x: f32, y: f32, z: f32) -> f32 {
    (1.0 - (x * x + y * y + z * z)).max(0.0).sqrt()
}

/// Decode a Fixed48 vector: three 16-bit axes in [-1, 1].
#[inline]
pub fn vec3_fixed48(raw: [u16; 3]) -> Vec3 {
    Vec3::new(
        unpack_fixed16(raw[0]),
        unpack_fixed16(raw[1]),
        unpack_fixed16(raw[2]),
    )
}

/// Decode a Fixed48 quaternion (W dropped).
#[inline]
pub fn quat_fixed48(raw: [u16; 3]) -> Quat {
    let v = vec3_fixed48(raw);
    Quat::from_xyzw(v.x, v.y, v.z, reconstruct_w(v.x, v.y, v.z))
}

/// Decode a Fixed32 vector: X in bits 21..32, Y in 10..21, Z in 0..10.
#[inline]
pub fn vec3_fixed32(word: u32) -> Vec3 {
    Vec3::new(
        unpack_fixed11(word >> 21),
        unpack_fixed11(word >> 10),
        unpack_fixed10(word),
    )
}

/// Decode a Fixed32 quaternion (W dropped).
#[inline]
pub fn quat_fixed32(word: u32) -> Quat {
    let v = vec3_fixed32(word);
    Quat::from_xyzw(v.x, v.y, v.z, reconstruct_w(v.x, v.y, v.z))
}

/// Map an N-bit unsigned value linearly into [min, min + range].
#[inline]
fn interval_component(raw: u32, max_raw: u32, min: f32, range: f32) -> f32 {
    min + range * (raw as f32 / max_raw as f32)
}

/// Decode an IntervalFixed32 vector against a per-key-run (min, range).
///
/// Each component lands in [min, min + range]; range may be zero, in which
/// case every key decodes to min exactly.
#[inline]
pub fn vec3_interval32(word: u32, min: Vec3, range: Vec3) -> Vec3 {
    Vec3::new(
        interval_component((word >> 21) & 0x7FF, 0x7FF, min.x, range.x),
        interval_component((word >> 10) & 0x7FF, 0x7FF, min.y, range.y),
        interval_component(word & 0x3FF, 0x3FF, min.z, range.z),
    )
}

/// Decode an IntervalFixed32 quaternion (W dropped).
#[inline]
pub fn quat_interval32(word: u32, min: Vec3, range: Vec3) -> Quat {
    let v = vec3_interval32(word, min, range);
    Quat::from_xyzw(v.x, v.y, v.z, reconstruct_w(v.x, v.y, v.z))
}

/// Byte-per-component packed normal with a handedness sign in the top byte.
///
/// Bits 0..24 hold X/Y/Z as unsigned bytes (`b / 127.5 - 1`); bits 24..32
/// hold a W byte whose sign carries the tangent-basis handedness. Vertex
/// welding compares normals with W masked off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(transparent)]
pub struct PackedNormal(pub u32);

impl PackedNormal {
    /// The XYZ payload with the handedness byte cleared.
    #[inline]
    pub fn xyz_bits(self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// Unpack the direction (not renormalized; quantization error stays).
    #[inline]
    pub fn unpack(self) -> Vec3 {
        Vec3::new(
            (self.0 & 0xFF) as f32 / 127.5 - 1.0,
            ((self.0 >> 8) & 0xFF) as f32 / 127.5 - 1.0,
            ((self.0 >> 16) & 0xFF) as f32 / 127.5 - 1.0,
        )
    }

    /// Handedness sign from the W byte: -1.0 when W decodes negative.
    #[inline]
    pub fn w_sign(self) -> f32 {
        let w = (self.0 >> 24) as f32 / 127.5 - 1.0;
        if w < 0.0 { -1.0 } else { 1.0 }
    }
}
