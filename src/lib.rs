//! Version-independent decoder core for the Vesper asset-archive family
//!
//! A decade of engine releases and per-title forks left meshes, skeletons
//! and animations serialized in dozens of incompatible byte layouts. This
//! crate decodes any of them into one canonical in-memory representation
//! for exporters and viewers to consume.
//!
//! # Modules
//!
//! - [`version`] - The three-axis version key every layout decision hangs off
//! - [`cursor`] - Bounds-checked, endian-aware byte cursor
//! - [`error`] - Decode error taxonomy
//! - [`schema`] - Versioned raw structure layouts and their dispatch
//! - [`quant`] - Quantized vector/quaternion codecs
//! - [`weld`] - Wedge welding into shared vertices
//! - [`model`] - Canonical mesh/skeleton/animation types
//! - [`rebuild`] - Raw-to-canonical reconstruction
//! - [`batch`] - Parallel decoding of independent assets
//!
//! Decoding is a pure function of (bytes, [`VersionContext`]); no global
//! state is consulted anywhere in the pipeline.

pub mod batch;
pub mod cursor;
pub mod error;
pub mod model;
pub mod quant;
pub mod rebuild;
pub mod schema;
pub mod version;
pub mod weld;

pub use batch::{AssetJob, BatchResult, DecodedAsset, ObjectClass, decode_batch};
pub use cursor::ByteCursor;
pub use error::{DecodeError, DecodeErrorKind, DecodeResult, MAX_SANE_COUNT};
pub use model::{
    AnimSequence, AnimSet, AnimTrack, CanonicalBone, CanonicalMesh, CanonicalSkeleton,
    CanonicalVertex, Indices, Influence, MAX_INFLUENCES, MAX_UV_CHANNELS, MESH_HAS_COLORS,
    MESH_HAS_INFLUENCES, MESH_HAS_NORMALS, MESH_HAS_TANGENTS, MeshSection, NO_BONE,
};
pub use rebuild::{
    SkinnedModel, StaticModel, decode_anim_set, decode_skeleton, decode_skinned_mesh,
    decode_static_mesh,
};
pub use version::{Endian, TitleId, VersionContext};
pub use weld::VertexWelder;
