//! Decomposes logical transfers into instrument-executable sub-transfers.
//!
//! Naive chunking (take max-volume chunks, leave the rest) can end a
//! request with a dribble below the instrument's reliable minimum, which
//! quietly degrades accuracy. Instead every request is cut into equal
//! chunks, with only the rounding remainder landing on the last chunk, and
//! the result is re-validated before anything is emitted.

use crate::domain::model::{Constraints, SubTransfer, TransferRequest};
use crate::utils::error::{PlanError, Result};

/// Sum of emitted volumes must match the request within this.
pub const SUM_TOLERANCE_UL: f64 = 0.01;

fn unsplittable(req: &TransferRequest, reason: impl Into<String>) -> PlanError {
    PlanError::UnsplittableVolume {
        sample: req.sample_id.clone(),
        volume_ul: req.volume_ul,
        reason: reason.into(),
    }
}

fn sub(req: &TransferRequest, seq: usize, volume_ul: f64) -> SubTransfer {
    SubTransfer {
        sample_id: req.sample_id.clone(),
        source_labware: req.source_labware.clone(),
        source_well: req.source_well,
        dest_labware: req.dest_labware.clone(),
        dest_well: req.dest_well,
        volume_ul,
        seq,
        kind: req.kind,
    }
}

/// Split one request into an ordered run of sub-transfers, each within
/// [min, max]. Zero-volume requests dissolve into nothing.
pub fn split(req: &TransferRequest, constraints: &Constraints) -> Result<Vec<SubTransfer>> {
    let min = constraints.min_pipette_vol_ul;
    let max = constraints.max_transfer_vol_ul;
    let vol = req.volume_ul;

    if vol.abs() < f64::EPSILON {
        return Ok(Vec::new());
    }
    if vol < 0.0 || !vol.is_finite() {
        return Err(unsplittable(req, "volume is not a valid number"));
    }
    if vol < min - 1e-9 {
        return Err(unsplittable(
            req,
            format!("below the {min} ul instrument minimum"),
        ));
    }
    if vol > constraints.max_request_vol_ul + 1e-9 {
        return Err(unsplittable(
            req,
            format!(
                "exceeds the {} ul per-destination ceiling",
                constraints.max_request_vol_ul
            ),
        ));
    }

    if vol <= max + 1e-9 {
        return Ok(vec![sub(req, 0, vol)]);
    }

    // Fewest equal chunks that fit under max, then grow the count until the
    // equal size clears min as well.
    let mut n = (vol / max).ceil() as usize;
    let n_bound = (vol / min).floor() as usize;
    while vol / (n as f64) < min {
        n += 1;
        if n > n_bound {
            return Err(unsplittable(
                req,
                format!("no chunk count satisfies [{min}, {max}] ul"),
            ));
        }
    }

    // All chunks equal except the last, which absorbs the rounding
    // remainder so verification against the requested total stays trivial.
    let chunk = constraints.round_vol(vol / n as f64);
    let last = constraints.round_vol(vol - chunk * (n - 1) as f64);

    let in_bounds = |v: f64| v >= min - 1e-9 && v <= max + 1e-9;
    if !in_bounds(chunk) || !in_bounds(last) {
        return Err(unsplittable(
            req,
            format!("rounded chunks ({chunk} ul / {last} ul) leave [{min}, {max}] ul"),
        ));
    }

    let mut out: Vec<SubTransfer> = (0..n - 1).map(|i| sub(req, i, chunk)).collect();
    out.push(sub(req, n - 1, last));

    let total: f64 = out.iter().map(|s| s.volume_ul).sum();
    if (total - vol).abs() > SUM_TOLERANCE_UL {
        return Err(unsplittable(
            req,
            format!("split volumes sum to {total} ul, expected {vol} ul"),
        ));
    }

    Ok(out)
}
