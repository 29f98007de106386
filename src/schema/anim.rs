//! Animation raw structures.
//!
//! An animation set is a named group of sequences sharing one bone-name
//! table. Each sequence carries a compressed key blob plus a per-bone table
//! addressing sub-streams inside it. Two table generations exist:
//!
//! - *Shared format* (older): the sequence header fixes one encoding tag for
//!   all translation tracks and one for all rotation tracks; the per-bone
//!   table stores (offset, key count) pairs into the blob.
//! - *Per track* (format 350+): the per-bone table stores only offsets; each
//!   sub-stream opens with its own info word carrying the tag, key count and
//!   a component mask. From 366 a third offset addresses a scale sub-stream.
//!
//! An offset of -1 means the sub-stream is not present. This module only
//! captures structure; key decoding lives in the animation reconstructor.

use crate::cursor::ByteCursor;
use crate::error::{DecodeErrorKind, DecodeResult};
use crate::schema::{LayoutRule, rule, select};

/// Sentinel offset for an absent sub-stream.
pub const NO_STREAM: i32 = -1;

/// Which generation of track table a sequence uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackTableLayout {
    SharedFormat,
    PerTrack,
    PerTrackWithScale,
}

const TRACK_TABLE_RULES: &[LayoutRule<TrackTableLayout>] = &[
    rule(
        "per-track with scale sub-streams",
        |c| c.format >= 366,
        TrackTableLayout::PerTrackWithScale,
    ),
    rule(
        "per-track compression",
        |c| c.format >= 350,
        TrackTableLayout::PerTrack,
    ),
    rule(
        "sequence-wide shared format",
        |_| true,
        TrackTableLayout::SharedFormat,
    ),
];

/// Shared-format table entry: blob addresses and key counts for one bone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSharedTrack {
    pub pos_offset: i32,
    pub pos_count: u32,
    pub rot_offset: i32,
    pub rot_count: u32,
}

/// Per-track table entry: blob addresses for one bone. Counts live in each
/// sub-stream's info word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawTrackOffsets {
    pub pos: i32,
    pub rot: i32,
    pub scale: Option<i32>,
}

/// The per-bone table of one sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawTrackTable {
    Shared {
        /// Encoding tag raw value for every translation track.
        pos_tag: u8,
        /// Encoding tag raw value for every rotation track.
        rot_tag: u8,
        tracks: Vec<RawSharedTrack>,
    },
    PerTrack { offsets: Vec<RawTrackOffsets> },
}

impl RawTrackTable {
    pub fn num_tracks(&self) -> usize {
        match self {
            RawTrackTable::Shared { tracks, .. } => tracks.len(),
            RawTrackTable::PerTrack { offsets } => offsets.len(),
        }
    }
}

/// One sequence: header, per-bone table, compressed key blob.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSequence {
    pub name: String,
    pub num_frames: u32,
    pub rate: f32,
    pub table: RawTrackTable,
    pub blob: Vec<u8>,
}

/// The whole animation-set object.
#[derive(Debug, Clone, PartialEq)]
pub struct RawAnimSet {
    pub name: String,
    pub bone_names: Vec<String>,
    pub sequences: Vec<RawSequence>,
}

fn read_shared_table(cur: &mut ByteCursor<'_>) -> DecodeResult<RawTrackTable> {
    let pos_tag = cur.read_u8()?;
    let rot_tag = cur.read_u8()?;
    let count = cur.read_count()?;
    let mut tracks = Vec::with_capacity(count);
    for _ in 0..count {
        tracks.push(RawSharedTrack {
            pos_offset: cur.read_i32()?,
            pos_count: cur.read_u32()?,
            rot_offset: cur.read_i32()?,
            rot_count: cur.read_u32()?,
        });
    }
    Ok(RawTrackTable::Shared {
        pos_tag,
        rot_tag,
        tracks,
    })
}

fn read_per_track_table(cur: &mut ByteCursor<'_>, with_scale: bool) -> DecodeResult<RawTrackTable> {
    let count = cur.read_count()?;
    let mut offsets = Vec::with_capacity(count);
    for _ in 0..count {
        let pos = cur.read_i32()?;
        let rot = cur.read_i32()?;
        let scale = if with_scale { Some(cur.read_i32()?) } else { None };
        offsets.push(RawTrackOffsets { pos, rot, scale });
    }
    Ok(RawTrackTable::PerTrack { offsets })
}

fn read_sequence(cur: &mut ByteCursor<'_>) -> DecodeResult<RawSequence> {
    let prev = cur.enter("AnimSequence");

    let name = cur.read_string()?;
    let num_frames = cur.read_u32()?;
    let rate = cur.read_f32()?;
    if num_frames == 0 {
        // a sequence cannot be empty; treat as corrupt
        return Err(cur.error(DecodeErrorKind::MalformedQuantizedData { tag: 0 }));
    }

    let table = match select("TrackTable", TRACK_TABLE_RULES, cur)? {
        TrackTableLayout::SharedFormat => read_shared_table(cur)?,
        TrackTableLayout::PerTrack => read_per_track_table(cur, false)?,
        TrackTableLayout::PerTrackWithScale => read_per_track_table(cur, true)?,
    };

    let blob_len = cur.read_count()?;
    let blob = cur.read_bytes(blob_len)?.to_vec();

    cur.leave(prev);
    Ok(RawSequence {
        name,
        num_frames,
        rate,
        table,
        blob,
    })
}

/// Read an animation-set object.
pub fn read_anim_set(cur: &mut ByteCursor<'_>) -> DecodeResult<RawAnimSet> {
    let prev = cur.enter("AnimSet");

    let name = cur.read_string()?;
    let bone_count = cur.read_count()?;
    let mut bone_names = Vec::with_capacity(bone_count);
    for _ in 0..bone_count {
        bone_names.push(cur.read_string()?);
    }

    let seq_count = cur.read_count()?;
    let mut sequences = Vec::with_capacity(seq_count);
    for _ in 0..seq_count {
        sequences.push(read_sequence(cur)?);
    }

    cur.leave(prev);
    Ok(RawAnimSet {
        name,
        bone_names,
        sequences,
    })
}
