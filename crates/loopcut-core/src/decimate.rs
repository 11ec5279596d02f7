// Temporal decimation: collapse near-duplicate adjacent frames subject to a
// minimum inter-frame interval (§4.5).

use crate::model::{DecodedFrame, DecimationPolicy};

/// Per-channel RGB similarity, ignoring alpha. `1.0` means identical,
/// `0.0` means maximally different or length-mismatched.
///
/// ```
/// use loopcut_core::decimate::similarity;
/// let a = vec![0u8, 0, 0, 255, 0, 0, 0, 255];
/// assert_eq!(similarity(&a, &a), 1.0);
/// assert_eq!(similarity(&a, &a[..4]), 0.0);
/// ```
pub fn similarity(a: &[u8], b: &[u8]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return if a.is_empty() && b.is_empty() { 1.0 } else { 0.0 };
    }
    let pixels = a.len() / 4;
    if pixels == 0 {
        return 0.0;
    }
    let mut sum_diff: u64 = 0;
    for (pa, pb) in a.chunks_exact(4).zip(b.chunks_exact(4)) {
        sum_diff += (pa[0] as i32 - pb[0] as i32).unsigned_abs() as u64;
        sum_diff += (pa[1] as i32 - pb[1] as i32).unsigned_abs() as u64;
        sum_diff += (pa[2] as i32 - pb[2] as i32).unsigned_abs() as u64;
    }
    let denom = (pixels as f64) * 765.0;
    let sim = 1.0 - (sum_diff as f64) / denom;
    sim.clamp(0.0, 1.0) as f32
}

/// Collapses `frames` per the §4.5 algorithm. Never drops the first or last
/// frame; preserves order; returns the input unchanged when decimation is
/// disabled or there is nothing to drop.
pub fn decimate(frames: &[DecodedFrame], policy: &DecimationPolicy) -> Vec<DecodedFrame> {
    if !policy.enabled || frames.is_empty() {
        return frames.to_vec();
    }
    let mut selected: Vec<DecodedFrame> = vec![frames[0].clone()];
    let mut last_kept = &frames[0];
    for f in &frames[1..] {
        let sim = similarity(&last_kept.bitmap, &f.bitmap);
        if f.delay_ms < policy.min_interval_ms && sim > policy.similarity_threshold {
            continue;
        }
        selected.push(f.clone());
        last_kept = selected.last().unwrap();
    }
    let last_input = frames.last().unwrap();
    if selected.last().map(|f| f.index) != Some(last_input.index) {
        selected.push(last_input.clone());
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(index: u32, delay_ms: u32, bitmap: Vec<u8>) -> DecodedFrame {
        DecodedFrame { index, delay_ms, is_key_frame: index == 0, bitmap }
    }

    fn px(r: u8, g: u8, b: u8) -> Vec<u8> {
        vec![r, g, b, 255]
    }

    #[test]
    fn similarity_identical_is_one() {
        let a = px(10, 20, 30);
        assert_eq!(similarity(&a, &a), 1.0);
    }

    #[test]
    fn similarity_unequal_length_is_zero() {
        let a = px(10, 20, 30);
        let b = vec![0u8; 8];
        assert_eq!(similarity(&a, &b), 0.0);
    }

    #[test]
    fn decimator_passthrough_when_disabled() {
        let frames = vec![frame(0, 5, px(1, 1, 1)), frame(1, 5, px(1, 1, 1))];
        let policy = DecimationPolicy { enabled: false, min_interval_ms: 10, similarity_threshold: 0.9 };
        let out = decimate(&frames, &policy);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn decimator_never_drops_first_or_last() {
        let frames: Vec<_> = (0..5).map(|i| frame(i, 5, px(1, 1, 1))).collect();
        let policy = DecimationPolicy { enabled: true, min_interval_ms: 10, similarity_threshold: 0.9 };
        let out = decimate(&frames, &policy);
        assert_eq!(out.first().unwrap().index, 0);
        assert_eq!(out.last().unwrap().index, 4);
        assert!(out.len() <= frames.len());
    }

    #[test]
    fn decimator_drops_near_duplicate_below_interval() {
        // mirrors §8 scenario 2: red, green, green(dup), blue at 5ms delays
        let frames = vec![
            frame(0, 5, px(255, 0, 0)),
            frame(1, 5, px(0, 255, 0)),
            frame(2, 5, px(0, 255, 0)),
            frame(3, 5, px(0, 0, 255)),
        ];
        let policy = DecimationPolicy { enabled: true, min_interval_ms: 10, similarity_threshold: 0.9 };
        let out = decimate(&frames, &policy);
        let indices: Vec<u32> = out.iter().map(|f| f.index).collect();
        assert_eq!(indices, vec![0, 1, 3]);
    }

    #[test]
    fn single_frame_passthrough() {
        let frames = vec![frame(0, 5, px(1, 2, 3))];
        let policy = DecimationPolicy { enabled: true, min_interval_ms: 10, similarity_threshold: 0.9 };
        let out = decimate(&frames, &policy);
        assert_eq!(out.len(), 1);
    }
}
