//! Binary search over encoder quality toward a target byte size.

use crate::constants::{
    DEFAULT_MAX_QUALITY, DEFAULT_MIN_QUALITY, DEFAULT_TARGET_SIZE, MAX_SEARCH_ITERATIONS,
    TOLERANCE,
};
use crate::error::{CompressionError, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchParams {
    /// Target size in bytes
    pub target: u64,
    pub min_quality: u8,
    pub max_quality: u8,
    pub max_iterations: u32,
    /// Fraction of `target`: the search stops early inside
    /// `[target * (1 - tolerance), target]`, and anything up to
    /// `target * (1 + tolerance)` is reported as within target.
    pub tolerance: f64,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            target: DEFAULT_TARGET_SIZE,
            min_quality: DEFAULT_MIN_QUALITY,
            max_quality: DEFAULT_MAX_QUALITY,
            max_iterations: MAX_SEARCH_ITERATIONS,
            tolerance: TOLERANCE,
        }
    }
}

impl SearchParams {
    pub fn new(target: u64, min_quality: u8, max_quality: u8) -> Self {
        Self {
            target,
            min_quality,
            max_quality,
            ..Self::default()
        }
    }

    /// Largest size still reported as within target.
    pub fn upper_bound(&self) -> u64 {
        (self.target as f64 * (1.0 + self.tolerance)).floor() as u64
    }

    /// A fitting candidate at or above this size ends the search.
    pub fn good_enough(&self) -> u64 {
        (self.target as f64 * (1.0 - self.tolerance)).ceil() as u64
    }
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub quality: u8,
    pub bytes: Vec<u8>,
    /// Number of encodes performed, including a final fallback encode
    pub iterations: u32,
    pub within_target: bool,
}

impl SearchOutcome {
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

struct Candidate {
    quality: u8,
    bytes: Vec<u8>,
}

/// Bisect `[min_quality, max_quality]` for the highest quality whose encode
/// fits `target`.
///
/// `encode` is called with a quality and returns the encoded bytes. A failed
/// encode is treated as oversize. When nothing fits, the smallest encode
/// seen (normally the one at `min_quality`) is returned with `within_target`
/// computed against the tolerance window. Only a search where no encode
/// succeeded at all is an error.
pub fn search_quality<F>(params: &SearchParams, mut encode: F) -> Result<SearchOutcome>
where
    F: FnMut(u8) -> Result<Vec<u8>>,
{
    let mut low = params.min_quality;
    let mut high = params.max_quality;
    let mut iterations = 0u32;
    let mut best_fit: Option<Candidate> = None;
    let mut smallest_over: Option<Candidate> = None;
    let mut min_tried = false;

    while low <= high && iterations < params.max_iterations {
        let mid = low + (high - low) / 2;
        iterations += 1;
        min_tried |= mid == params.min_quality;

        let bytes = match encode(mid) {
            Ok(bytes) => bytes,
            Err(e) => {
                crate::warn!("Encode failed at quality {}: {}", mid, e);
                if mid == params.min_quality {
                    break;
                }
                high = mid - 1;
                continue;
            }
        };
        let size = bytes.len() as u64;
        crate::verbose!("quality {:>3} -> {} bytes (target {})", mid, size, params.target);

        if size <= params.target {
            let done = size >= params.good_enough();
            if best_fit.as_ref().map_or(true, |b| mid > b.quality) {
                best_fit = Some(Candidate { quality: mid, bytes });
            }
            if done || mid == u8::MAX {
                break;
            }
            low = mid + 1;
        } else {
            keep_smaller(&mut smallest_over, Candidate { quality: mid, bytes });
            if mid == params.min_quality {
                break;
            }
            high = mid - 1;
        }
    }

    if let Some(best) = best_fit {
        return Ok(finish(params, best, iterations));
    }

    // Nothing fit: fall back to the smallest setting.
    if !min_tried {
        iterations += 1;
        match encode(params.min_quality) {
            Ok(bytes) => keep_smaller(
                &mut smallest_over,
                Candidate {
                    quality: params.min_quality,
                    bytes,
                },
            ),
            Err(e) => crate::warn!("Encode failed at quality {}: {}", params.min_quality, e),
        }
    }

    smallest_over
        .map(|candidate| finish(params, candidate, iterations))
        .ok_or(CompressionError::EncodingFailed(
            params.min_quality,
            params.max_quality,
        ))
}

fn keep_smaller(slot: &mut Option<Candidate>, candidate: Candidate) {
    let smaller = slot
        .as_ref()
        .map_or(true, |current| candidate.bytes.len() <= current.bytes.len());
    if smaller {
        *slot = Some(candidate);
    }
}

fn finish(params: &SearchParams, candidate: Candidate, iterations: u32) -> SearchOutcome {
    let within_target = candidate.bytes.len() as u64 <= params.upper_bound();
    SearchOutcome {
        quality: candidate.quality,
        bytes: candidate.bytes,
        iterations,
        within_target,
    }
}
