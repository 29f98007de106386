//! Batch decoding.
//!
//! Decoding is a pure function of (bytes, version context), so a batch of
//! assets fans out over a bounded worker pool with no locking on the decode
//! path. The pool reserves one logical core for the submitting thread.
//! Results come back in submission order; a failed asset is logged and
//! reported in place, never aborting the rest of the batch. Aborting a
//! batch means not submitting one; in-flight jobs always run to completion.

use std::thread;

use log::warn;
use rayon::prelude::*;

use crate::error::DecodeResult;
use crate::model::AnimSet;
use crate::rebuild::{self, SkinnedModel, StaticModel};
use crate::version::VersionContext;

/// What kind of object a job's bytes hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectClass {
    SkinnedMesh,
    StaticMesh,
    AnimSet,
}

/// One asset to decode: its bytes, already resident, and the version
/// context of the archive they came from.
#[derive(Debug)]
pub struct AssetJob {
    pub name: String,
    pub class: ObjectClass,
    pub bytes: Vec<u8>,
    pub ctx: VersionContext,
}

/// A successfully decoded asset.
#[derive(Debug)]
pub enum DecodedAsset {
    SkinnedMesh(SkinnedModel),
    StaticMesh(StaticModel),
    AnimSet(AnimSet),
}

/// Outcome of one job, in submission order.
#[derive(Debug)]
pub struct BatchResult {
    pub name: String,
    pub result: DecodeResult<DecodedAsset>,
}

fn decode_one(job: &AssetJob) -> DecodeResult<DecodedAsset> {
    match job.class {
        ObjectClass::SkinnedMesh => {
            rebuild::decode_skinned_mesh(&job.bytes, job.ctx).map(DecodedAsset::SkinnedMesh)
        }
        ObjectClass::StaticMesh => {
            rebuild::decode_static_mesh(&job.bytes, job.ctx).map(DecodedAsset::StaticMesh)
        }
        ObjectClass::AnimSet => {
            rebuild::decode_anim_set(&job.bytes, job.ctx).map(DecodedAsset::AnimSet)
        }
    }
}

/// Worker count: logical cores minus the submitting thread, at least one.
fn worker_count() -> usize {
    thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1).max(1))
        .unwrap_or(1)
}

/// Decode a batch of independent assets.
///
/// Blocks until every job finished (the collect is the completion fence).
/// Each failure is isolated to its own job and logged.
pub fn decode_batch(jobs: &[AssetJob]) -> Vec<BatchResult> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(worker_count())
        .build();
    let pool = match pool {
        Ok(p) => p,
        Err(err) => {
            // pool construction only fails on resource exhaustion; decode
            // inline rather than dropping the batch
            warn!("worker pool unavailable ({err}), decoding on the calling thread");
            return jobs
                .iter()
                .map(|job| finish(job, decode_one(job)))
                .collect();
        }
    };

    pool.install(|| {
        jobs.par_iter()
            .map(|job| finish(job, decode_one(job)))
            .collect()
    })
}

fn finish(job: &AssetJob, result: DecodeResult<DecodedAsset>) -> BatchResult {
    if let Err(err) = &result {
        warn!("skipping {}: {err}", job.name);
    }
    BatchResult {
        name: job.name.clone(),
        result,
    }
}
