//! Animation reconstruction.
//!
//! Decodes the compressed key blobs captured by [`crate::schema::anim`]
//! into canonical tracks. Per-track sub-streams open with one packed info
//! word:
//!
//! ```text
//! bits 28..32  encoding tag
//! bits 24..28  component mask (bit 3: explicit time array follows;
//!              bits 0..2: which axes carry (min, range) pairs when the
//!              tag is interval-coded)
//! bits  0..24  key count
//! ```
//!
//! Time arrays store one byte per key below 256 frames and two otherwise,
//! are skipped entirely for single-key streams, and the cursor re-aligns to
//! a 4-byte boundary after reading one. A table offset of -1 means "not
//! present" and decodes to exactly one neutral key, so every bone always
//! has at least one key per channel.
//!
//! Rotation tracks of non-root bones are conjugated, matching the skeleton
//! reconstructor's handedness correction.

use glam::{Quat, Vec3};

use crate::cursor::ByteCursor;
use crate::error::{DecodeError, DecodeErrorKind, DecodeResult};
use crate::model::{AnimSequence, AnimSet, AnimTrack};
use crate::quant::{
    EncodingTag, quat_fixed32, quat_fixed48, quat_interval32, reconstruct_w, vec3_fixed32,
    vec3_fixed48, vec3_interval32,
};
use crate::schema::anim::{NO_STREAM, RawAnimSet, RawSequence, RawTrackTable};
use crate::version::VersionContext;

/// Key channel being decoded; fixes the neutral value for absent streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Pos,
    Rot,
    Scale,
}

impl Channel {
    fn neutral_vec3(self) -> Vec3 {
        match self {
            Channel::Pos => Vec3::ZERO,
            Channel::Scale => Vec3::ONE,
            Channel::Rot => Vec3::ZERO,
        }
    }
}

struct StreamHeader {
    tag: EncodingTag,
    count: usize,
    has_times: bool,
    min: Vec3,
    range: Vec3,
}

fn read_header(cur: &mut ByteCursor<'_>) -> DecodeResult<StreamHeader> {
    let at = cur.tell();
    let info = cur.read_u32()?;
    let tag_raw = (info >> 28) as u8;
    let mask = ((info >> 24) & 0xF) as u8;
    let count = (info & 0x00FF_FFFF) as usize;

    let tag = EncodingTag::from_raw(tag_raw).map_err(|tag| {
        DecodeError::new(
            DecodeErrorKind::MalformedQuantizedData { tag },
            "TrackStream",
            at,
            cur.ctx(),
        )
    })?;

    let mut min = Vec3::ZERO;
    let mut range = Vec3::ZERO;
    if tag.needs_interval() {
        // only axes flagged in the mask carry a (min, range) pair; the
        // rest stay pinned at zero
        for axis in 0..3 {
            if mask & (1 << axis) != 0 {
                let lo = cur.read_f32()?;
                let r = cur.read_f32()?;
                match axis {
                    0 => (min.x, range.x) = (lo, r),
                    1 => (min.y, range.y) = (lo, r),
                    _ => (min.z, range.z) = (lo, r),
                }
            }
        }
    }

    Ok(StreamHeader {
        tag,
        count,
        has_times: mask & 8 != 0,
        min,
        range,
    })
}

fn read_key_vec3(cur: &mut ByteCursor<'_>, h: &StreamHeader, ch: Channel) -> DecodeResult<Vec3> {
    Ok(match h.tag {
        EncodingTag::Float3 => Vec3::new(cur.read_f32()?, cur.read_f32()?, cur.read_f32()?),
        EncodingTag::Fixed48 => {
            vec3_fixed48([cur.read_u16()?, cur.read_u16()?, cur.read_u16()?])
        }
        EncodingTag::Fixed32 => vec3_fixed32(cur.read_u32()?),
        EncodingTag::IntervalFixed32 => vec3_interval32(cur.read_u32()?, h.min, h.range),
        EncodingTag::Half => Vec3::new(cur.read_f16()?, cur.read_f16()?, cur.read_f16()?),
        EncodingTag::Identity => ch.neutral_vec3(),
    })
}

fn read_key_quat(cur: &mut ByteCursor<'_>, h: &StreamHeader) -> DecodeResult<Quat> {
    Ok(match h.tag {
        EncodingTag::Float3 => {
            let (x, y, z) = (cur.read_f32()?, cur.read_f32()?, cur.read_f32()?);
            Quat::from_xyzw(x, y, z, reconstruct_w(x, y, z))
        }
        EncodingTag::Fixed48 => {
            quat_fixed48([cur.read_u16()?, cur.read_u16()?, cur.read_u16()?])
        }
        EncodingTag::Fixed32 => quat_fixed32(cur.read_u32()?),
        EncodingTag::IntervalFixed32 => quat_interval32(cur.read_u32()?, h.min, h.range),
        EncodingTag::Half => {
            let (x, y, z) = (cur.read_f16()?, cur.read_f16()?, cur.read_f16()?);
            Quat::from_xyzw(x, y, z, reconstruct_w(x, y, z))
        }
        EncodingTag::Identity => Quat::IDENTITY,
    })
}

/// Read the explicit time array trailing a multi-key stream, when present.
fn read_times(
    cur: &mut ByteCursor<'_>,
    h: &StreamHeader,
    num_frames: u32,
) -> DecodeResult<Vec<f32>> {
    if h.count <= 1 || !h.has_times {
        return Ok(Vec::new());
    }
    let mut times = Vec::with_capacity(h.count);
    for _ in 0..h.count {
        let t = if num_frames < 256 {
            f32::from(cur.read_u8()?)
        } else {
            f32::from(cur.read_u16()?)
        };
        times.push(t);
    }
    cur.align4()?;
    Ok(times)
}

fn decode_vec3_stream(
    blob: &mut ByteCursor<'_>,
    offset: i32,
    num_frames: u32,
    ch: Channel,
) -> DecodeResult<(Vec<Vec3>, Vec<f32>)> {
    if offset == NO_STREAM {
        return Ok((vec![ch.neutral_vec3()], Vec::new()));
    }
    blob.seek(offset as u32 as usize)?;
    let h = read_header(blob)?;
    if h.count == 0 || h.tag == EncodingTag::Identity {
        return Ok((vec![ch.neutral_vec3()], Vec::new()));
    }
    let mut keys = Vec::with_capacity(h.count);
    for _ in 0..h.count {
        keys.push(read_key_vec3(blob, &h, ch)?);
    }
    let times = read_times(blob, &h, num_frames)?;
    Ok((keys, times))
}

fn decode_quat_stream(
    blob: &mut ByteCursor<'_>,
    offset: i32,
    num_frames: u32,
    conjugate: bool,
) -> DecodeResult<(Vec<Quat>, Vec<f32>)> {
    if offset == NO_STREAM {
        return Ok((vec![Quat::IDENTITY], Vec::new()));
    }
    blob.seek(offset as u32 as usize)?;
    let h = read_header(blob)?;
    if h.count == 0 || h.tag == EncodingTag::Identity {
        return Ok((vec![Quat::IDENTITY], Vec::new()));
    }
    let mut keys = Vec::with_capacity(h.count);
    for _ in 0..h.count {
        let q = read_key_quat(blob, &h)?;
        keys.push(if conjugate { q.conjugate() } else { q });
    }
    let times = read_times(blob, &h, num_frames)?;
    Ok((keys, times))
}

/// Decode one shared-format sub-stream: tag and count come from the
/// sequence table, interval pairs always cover all three axes, timing is
/// implicit.
fn decode_shared_vec3(
    blob: &mut ByteCursor<'_>,
    offset: i32,
    count: u32,
    tag: EncodingTag,
    ch: Channel,
) -> DecodeResult<Vec<Vec3>> {
    if offset == NO_STREAM || count == 0 || tag == EncodingTag::Identity {
        return Ok(vec![ch.neutral_vec3()]);
    }
    blob.seek(offset as u32 as usize)?;
    let mut h = StreamHeader {
        tag,
        count: count as usize,
        has_times: false,
        min: Vec3::ZERO,
        range: Vec3::ZERO,
    };
    if tag.needs_interval() {
        h.min = Vec3::new(blob.read_f32()?, blob.read_f32()?, blob.read_f32()?);
        h.range = Vec3::new(blob.read_f32()?, blob.read_f32()?, blob.read_f32()?);
    }
    let mut keys = Vec::with_capacity(h.count);
    for _ in 0..h.count {
        keys.push(read_key_vec3(blob, &h, ch)?);
    }
    Ok(keys)
}

fn decode_shared_quat(
    blob: &mut ByteCursor<'_>,
    offset: i32,
    count: u32,
    tag: EncodingTag,
    conjugate: bool,
) -> DecodeResult<Vec<Quat>> {
    if offset == NO_STREAM || count == 0 || tag == EncodingTag::Identity {
        return Ok(vec![Quat::IDENTITY]);
    }
    blob.seek(offset as u32 as usize)?;
    let mut h = StreamHeader {
        tag,
        count: count as usize,
        has_times: false,
        min: Vec3::ZERO,
        range: Vec3::ZERO,
    };
    if tag.needs_interval() {
        h.min = Vec3::new(blob.read_f32()?, blob.read_f32()?, blob.read_f32()?);
        h.range = Vec3::new(blob.read_f32()?, blob.read_f32()?, blob.read_f32()?);
    }
    let mut keys = Vec::with_capacity(h.count);
    for _ in 0..h.count {
        let q = read_key_quat(blob, &h)?;
        keys.push(if conjugate { q.conjugate() } else { q });
    }
    Ok(keys)
}

fn shared_tag(raw: u8, ctx: VersionContext) -> DecodeResult<EncodingTag> {
    EncodingTag::from_raw(raw).map_err(|tag| {
        DecodeError::new(
            DecodeErrorKind::MalformedQuantizedData { tag },
            "AnimSequence",
            0,
            ctx,
        )
    })
}

/// Decode all tracks of one sequence. The table must cover exactly the
/// owning set's bone count, one track per bone.
pub fn rebuild_sequence(
    raw: &RawSequence,
    num_bones: usize,
    ctx: VersionContext,
) -> DecodeResult<AnimSequence> {
    if raw.table.num_tracks() != num_bones {
        return Err(DecodeError::new(
            DecodeErrorKind::UnsupportedVariant,
            "AnimSequence",
            0,
            ctx,
        ));
    }

    let mut blob = ByteCursor::new(&raw.blob, ctx);
    blob.enter("TrackStream");
    let mut tracks = Vec::with_capacity(num_bones);

    match &raw.table {
        RawTrackTable::PerTrack { offsets } => {
            for (bone, off) in offsets.iter().enumerate() {
                let conjugate = bone != 0;
                let (key_pos, pos_time) =
                    decode_vec3_stream(&mut blob, off.pos, raw.num_frames, Channel::Pos)?;
                let (key_quat, quat_time) =
                    decode_quat_stream(&mut blob, off.rot, raw.num_frames, conjugate)?;
                let (key_scale, scale_time) = match off.scale {
                    Some(s) => decode_vec3_stream(&mut blob, s, raw.num_frames, Channel::Scale)?,
                    None => (vec![Vec3::ONE], Vec::new()),
                };
                tracks.push(AnimTrack {
                    key_pos,
                    key_quat,
                    key_scale,
                    pos_time,
                    quat_time,
                    scale_time,
                });
            }
        }
        RawTrackTable::Shared {
            pos_tag,
            rot_tag,
            tracks: entries,
        } => {
            let pos_tag = shared_tag(*pos_tag, ctx)?;
            let rot_tag = shared_tag(*rot_tag, ctx)?;
            for (bone, e) in entries.iter().enumerate() {
                let conjugate = bone != 0;
                let key_pos =
                    decode_shared_vec3(&mut blob, e.pos_offset, e.pos_count, pos_tag, Channel::Pos)?;
                let key_quat =
                    decode_shared_quat(&mut blob, e.rot_offset, e.rot_count, rot_tag, conjugate)?;
                tracks.push(AnimTrack {
                    key_pos,
                    key_quat,
                    key_scale: vec![Vec3::ONE],
                    pos_time: Vec::new(),
                    quat_time: Vec::new(),
                    scale_time: Vec::new(),
                });
            }
        }
    }

    Ok(AnimSequence {
        name: raw.name.clone(),
        num_frames: raw.num_frames,
        rate: raw.rate,
        tracks,
    })
}

/// Decode a whole animation set.
pub fn rebuild_anim_set(raw: &RawAnimSet, ctx: VersionContext) -> DecodeResult<AnimSet> {
    let mut sequences = Vec::with_capacity(raw.sequences.len());
    for seq in &raw.sequences {
        sequences.push(rebuild_sequence(seq, raw.bone_names.len(), ctx)?);
    }
    Ok(AnimSet {
        name: raw.name.clone(),
        bone_names: raw.bone_names.clone(),
        sequences,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::anim::RawTrackOffsets;

    fn ctx() -> VersionContext {
        VersionContext::mainline(360)
    }

    fn info(tag: EncodingTag, mask: u8, count: u32) -> u32 {
        ((tag as u32) << 28) | (u32::from(mask) << 24) | (count & 0x00FF_FFFF)
    }

    fn per_track_seq(
        name: &str,
        num_frames: u32,
        offsets: Vec<RawTrackOffsets>,
        blob: Vec<u8>,
    ) -> RawSequence {
        RawSequence {
            name: name.into(),
            num_frames,
            rate: 30.0,
            table: RawTrackTable::PerTrack { offsets },
            blob,
        }
    }

    #[test]
    fn test_single_key_has_empty_time_array() {
        // one Float3 translation key; the time-array bit is set but a
        // single-key stream never stores one
        let mut blob = Vec::new();
        blob.extend_from_slice(&info(EncodingTag::Float3, 8, 1).to_le_bytes());
        for v in [1.0f32, 2.0, 3.0] {
            blob.extend_from_slice(&v.to_le_bytes());
        }
        let seq = per_track_seq(
            "t",
            30,
            vec![RawTrackOffsets {
                pos: 0,
                rot: NO_STREAM,
                scale: None,
            }],
            blob,
        );
        let out = rebuild_sequence(&seq, 1, ctx()).unwrap();
        let track = &out.tracks[0];
        assert_eq!(track.key_pos, vec![Vec3::new(1.0, 2.0, 3.0)]);
        assert!(track.pos_time.is_empty());
    }

    #[test]
    fn test_sentinel_offset_yields_one_neutral_key() {
        let seq = per_track_seq(
            "t",
            10,
            vec![RawTrackOffsets {
                pos: NO_STREAM,
                rot: NO_STREAM,
                scale: Some(NO_STREAM),
            }],
            Vec::new(),
        );
        let out = rebuild_sequence(&seq, 1, ctx()).unwrap();
        let track = &out.tracks[0];
        assert_eq!(track.key_pos, vec![Vec3::ZERO]);
        assert_eq!(track.key_quat, vec![Quat::IDENTITY]);
        assert_eq!(track.key_scale, vec![Vec3::ONE]);
        assert!(track.pos_time.is_empty() && track.quat_time.is_empty());
    }

    #[test]
    fn test_rotation_conjugated_for_non_root_bones() {
        // same Fixed48 rotation stream for three bones
        let mut blob = Vec::new();
        blob.extend_from_slice(&info(EncodingTag::Fixed48, 0, 1).to_le_bytes());
        // a clearly non-neutral raw pattern
        for raw in [49151u16, 32767, 32767] {
            blob.extend_from_slice(&raw.to_le_bytes());
        }
        let off = |_: usize| RawTrackOffsets {
            pos: NO_STREAM,
            rot: 0,
            scale: None,
        };
        let seq = per_track_seq("t", 10, vec![off(0), off(1), off(2)], blob);
        let out = rebuild_sequence(&seq, 3, ctx()).unwrap();

        let root = out.tracks[0].key_quat[0];
        assert!(root.x > 0.0);
        for bone in 1..3 {
            assert_eq!(out.tracks[bone].key_quat[0], root.conjugate());
        }
    }

    #[test]
    fn test_time_array_u8_and_alignment() {
        // three Fixed32 keys with explicit u8 times, then a second stream
        // placed at the aligned offset
        let mut blob = Vec::new();
        blob.extend_from_slice(&info(EncodingTag::Fixed32, 8, 3).to_le_bytes());
        for _ in 0..3 {
            blob.extend_from_slice(&((1023u32 << 21) | (1023 << 10) | 511).to_le_bytes());
        }
        blob.extend_from_slice(&[0, 5, 9]); // times
        blob.push(0); // alignment pad up to 20
        assert_eq!(blob.len() % 4, 0);
        let rot_off = blob.len() as i32;
        blob.extend_from_slice(&info(EncodingTag::Fixed48, 0, 1).to_le_bytes());
        for _ in 0..3 {
            blob.extend_from_slice(&32767u16.to_le_bytes());
        }

        let seq = per_track_seq(
            "t",
            100,
            vec![RawTrackOffsets {
                pos: 0,
                rot: rot_off,
                scale: None,
            }],
            blob,
        );
        let out = rebuild_sequence(&seq, 1, ctx()).unwrap();
        let track = &out.tracks[0];
        assert_eq!(track.key_pos.len(), 3);
        assert_eq!(track.pos_time, vec![0.0, 5.0, 9.0]);
        assert_eq!(track.key_quat.len(), 1);
    }

    #[test]
    fn test_time_array_u16_above_255_frames() {
        let mut blob = Vec::new();
        blob.extend_from_slice(&info(EncodingTag::Float3, 8, 2).to_le_bytes());
        for v in [0.0f32; 6] {
            blob.extend_from_slice(&v.to_le_bytes());
        }
        blob.extend_from_slice(&300u16.to_le_bytes());
        blob.extend_from_slice(&500u16.to_le_bytes());

        let seq = per_track_seq(
            "t",
            600,
            vec![RawTrackOffsets {
                pos: 0,
                rot: NO_STREAM,
                scale: None,
            }],
            blob,
        );
        let out = rebuild_sequence(&seq, 1, ctx()).unwrap();
        assert_eq!(out.tracks[0].pos_time, vec![300.0, 500.0]);
    }

    #[test]
    fn test_interval_stream_with_partial_mask() {
        // only the X axis carries a (min, range) pair; Y and Z pin to zero
        let mut blob = Vec::new();
        blob.extend_from_slice(&info(EncodingTag::IntervalFixed32, 1, 1).to_le_bytes());
        blob.extend_from_slice(&10.0f32.to_le_bytes()); // min.x
        blob.extend_from_slice(&4.0f32.to_le_bytes()); // range.x
        blob.extend_from_slice(&(0x7FFu32 << 21).to_le_bytes()); // raw x at max

        let seq = per_track_seq(
            "t",
            10,
            vec![RawTrackOffsets {
                pos: 0,
                rot: NO_STREAM,
                scale: None,
            }],
            blob,
        );
        let out = rebuild_sequence(&seq, 1, ctx()).unwrap();
        let key = out.tracks[0].key_pos[0];
        assert_eq!(key, Vec3::new(14.0, 0.0, 0.0));
    }

    #[test]
    fn test_bad_tag_is_malformed() {
        let mut blob = Vec::new();
        blob.extend_from_slice(&info_raw(9, 0, 1).to_le_bytes());
        let seq = per_track_seq(
            "t",
            10,
            vec![RawTrackOffsets {
                pos: 0,
                rot: NO_STREAM,
                scale: None,
            }],
            blob,
        );
        let err = rebuild_sequence(&seq, 1, ctx()).unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::MalformedQuantizedData { tag: 9 });
    }

    fn info_raw(tag: u32, mask: u32, count: u32) -> u32 {
        (tag << 28) | (mask << 24) | count
    }

    #[test]
    fn test_track_count_mismatch_rejected() {
        let seq = per_track_seq("t", 10, Vec::new(), Vec::new());
        let err = rebuild_sequence(&seq, 2, ctx()).unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::UnsupportedVariant);
    }

    #[test]
    fn test_shared_format_sequence() {
        use crate::schema::anim::RawSharedTrack;

        let mut blob = Vec::new();
        // pos stream: two Float3 keys at offset 0
        for v in [0.0f32, 0.0, 0.0, 1.0, 1.0, 1.0] {
            blob.extend_from_slice(&v.to_le_bytes());
        }
        let rot_off = blob.len() as i32;
        // rot stream: one Fixed48 key
        for _ in 0..3 {
            blob.extend_from_slice(&32767u16.to_le_bytes());
        }

        let seq = RawSequence {
            name: "idle".into(),
            num_frames: 2,
            rate: 15.0,
            table: RawTrackTable::Shared {
                pos_tag: EncodingTag::Float3 as u8,
                rot_tag: EncodingTag::Fixed48 as u8,
                tracks: vec![RawSharedTrack {
                    pos_offset: 0,
                    pos_count: 2,
                    rot_offset: rot_off,
                    rot_count: 1,
                }],
            },
            blob,
        };
        let out = rebuild_sequence(&seq, 1, ctx()).unwrap();
        let track = &out.tracks[0];
        assert_eq!(track.key_pos.len(), 2);
        assert_eq!(track.key_pos[1], Vec3::ONE);
        assert_eq!(track.key_quat.len(), 1);
        assert!(track.pos_time.is_empty());
    }
}
