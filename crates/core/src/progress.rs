//! Progress estimation for in-flight visualizations.
//!
//! The inference provider reports no percentage, so progress is estimated
//! from the stage and the provider status. Estimates only grow while a
//! stage is running and stay below [`COMPLETE`] until a terminal state.

use crate::job::{JobKind, JobStatus};

/// Progress of a finished visualization.
pub const COMPLETE: u8 = 100;

/// Progress recorded when the face-swap stage is entered (or restarted).
pub const FACE_SWAP_TRANSITION: u8 = 50;

/// Progress recorded when the base stage is (re)started.
pub const BASE_START: u8 = 15;

const BASE_PROCESSING: u8 = 30;
const BASE_STEP: u8 = 5;
/// Base ceiling when a face swap still follows.
const BASE_CEILING_BEFORE_SWAP: u8 = 45;
const FACE_SWAP_PROCESSING: u8 = 60;
const FACE_SWAP_STEP: u8 = 3;
const RUNNING_CEILING: u8 = 95;

/// Floor, per-poll increment and ceiling for one running stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Band {
    starting: u8,
    processing: u8,
    step: u8,
    ceiling: u8,
}

fn band(kind: JobKind, face_swap_planned: bool) -> Band {
    match kind {
        JobKind::BaseGeneration => Band {
            starting: BASE_START,
            processing: BASE_PROCESSING,
            step: BASE_STEP,
            ceiling: if face_swap_planned {
                BASE_CEILING_BEFORE_SWAP
            } else {
                RUNNING_CEILING
            },
        },
        JobKind::FaceSwap => Band {
            starting: FACE_SWAP_TRANSITION,
            processing: FACE_SWAP_PROCESSING,
            step: FACE_SWAP_STEP,
            ceiling: RUNNING_CEILING,
        },
    }
}

/// Estimate progress for a non-terminal poll.
///
/// `previous` is the last recorded progress for the visualization. The
/// result is never lower than `previous` (clamped to the stage ceiling) and
/// never reaches [`COMPLETE`].
pub fn estimate(kind: JobKind, status: JobStatus, previous: u8, face_swap_planned: bool) -> u8 {
    let band = band(kind, face_swap_planned);
    let previous = previous.min(band.ceiling);

    let proposed = match status {
        JobStatus::Starting => band.starting,
        JobStatus::Processing => previous
            .saturating_add(band.step)
            .max(band.processing),
        _ => previous,
    };

    proposed.max(previous).min(band.ceiling)
}

/// Progress to record after a stuck job of the given kind is restarted.
pub fn restart_floor(kind: JobKind) -> u8 {
    match kind {
        JobKind::BaseGeneration => BASE_START,
        JobKind::FaceSwap => FACE_SWAP_TRANSITION,
    }
}
