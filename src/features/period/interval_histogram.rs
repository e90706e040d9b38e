//! Inter-onset interval histogram
//!
//! Each interval between consecutive onsets is converted to an instantaneous
//! BPM and rounded to the nearest histogram bin. The fullest bin wins.

use std::collections::BTreeMap;

/// Convert onset frame indices to times in milliseconds
pub fn onset_times_ms(onsets: &[usize], hop_size: usize, sample_rate: u32) -> Vec<f64> {
    let ms_per_frame = hop_size as f64 / sample_rate as f64 * 1000.0;
    onsets.iter().map(|&i| i as f64 * ms_per_frame).collect()
}

/// Intervals between consecutive times
pub fn intervals(times: &[f64]) -> Vec<f64> {
    times.windows(2).map(|pair| pair[1] - pair[0]).collect()
}

/// Most common BPM bin over a set of inter-onset intervals (ms)
///
/// Bins are `round(bpm / bin_width) * bin_width`. Bins are visited in
/// ascending BPM order and the count must be strictly greater to replace the
/// current best, so ties go to the slowest bin. Non-positive intervals are
/// skipped; `None` when nothing is left.
///
/// # Example
///
/// ```
/// use cadence_dsp::features::period::dominant_bpm;
///
/// // Three 500 ms gaps and one 400 ms gap
/// let bpm = dominant_bpm(&[500.0, 500.0, 400.0, 500.0], 5.0);
/// assert_eq!(bpm, Some(120.0));
/// ```
pub fn dominant_bpm(intervals_ms: &[f64], bin_width: f32) -> Option<f32> {
    let bin_width = bin_width as f64;
    let mut histogram: BTreeMap<i64, usize> = BTreeMap::new();
    for &interval in intervals_ms {
        if !(interval > 0.0) {
            continue;
        }
        let bpm = 60_000.0 / interval;
        let bin = (bpm / bin_width).round() as i64;
        *histogram.entry(bin).or_insert(0) += 1;
    }

    let mut best: Option<(i64, usize)> = None;
    for (&bin, &count) in &histogram {
        match best {
            Some((_, best_count)) if count <= best_count => {}
            _ => best = Some((bin, count)),
        }
    }

    best.map(|(bin, count)| {
        let bpm = (bin as f64 * bin_width) as f32;
        log::debug!("Dominant BPM bin {:.1} ({} of {} intervals)", bpm, count, intervals_ms.len());
        bpm
    })
}

/// Fold an octave error back towards `[min_bpm, max_bpm]`
///
/// Doubles a value below `min_bpm` or halves one above `max_bpm` once, then
/// clamps into the range.
pub fn correct_octave(bpm: f32, min_bpm: f32, max_bpm: f32) -> f32 {
    let corrected = if bpm < min_bpm {
        bpm * 2.0
    } else if bpm > max_bpm {
        bpm / 2.0
    } else {
        bpm
    };
    corrected.clamp(min_bpm, max_bpm)
}
