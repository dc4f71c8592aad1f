use std::collections::HashSet;

use tracing::info;

use crate::error::{LuckyStackError, Result};
use crate::pipeline::config::SelectionConfig;
use crate::quality::QualityRecord;

/// Frames kept for alignment and stacking.
#[derive(Clone, Debug, PartialEq)]
pub struct Selection {
    /// Selected frame indices, ascending.
    pub indices: Vec<usize>,
    /// Best-ranked frame; used as the alignment reference.
    pub best: usize,
}

/// `clamp(round(total * keep), min, max)`, never more than `total`.
pub fn target_count(total: usize, config: &SelectionConfig) -> usize {
    let wanted = (total as f64 * config.keep_percentage as f64).round() as usize;
    wanted
        .max(config.min_frames)
        .min(config.max_frames)
        .min(total)
}

/// Record positions sorted best first; equal scores keep ascending frame order.
pub fn rank(records: &[QualityRecord]) -> Vec<&QualityRecord> {
    let mut ranked: Vec<&QualityRecord> = records.iter().collect();
    ranked.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(a.frame_index.cmp(&b.frame_index))
    });
    ranked
}

/// Pick the frames to stack.
///
/// With a temporal window, the ranking is first walked taking only the best
/// frame of each not-yet-represented window until half the target is
/// reached; the rest is filled in rank order.
pub fn select_frames(records: &[QualityRecord], config: &SelectionConfig) -> Result<Selection> {
    if records.is_empty() {
        return Err(LuckyStackError::InsufficientFrames {
            usable: 0,
            required: config.min_frames.max(1),
        });
    }

    let ranked = rank(records);
    let count = target_count(records.len(), config);
    let best = ranked[0].frame_index;

    let mut chosen: Vec<usize> = Vec::with_capacity(count);
    let mut taken: HashSet<usize> = HashSet::with_capacity(count);

    if let Some(window) = config.temporal_window.filter(|&w| w > 0) {
        let spread_target = count.div_ceil(2);
        let mut windows_seen: HashSet<usize> = HashSet::new();
        for r in &ranked {
            if chosen.len() >= spread_target {
                break;
            }
            if windows_seen.insert(r.frame_index / window) {
                chosen.push(r.frame_index);
                taken.insert(r.frame_index);
            }
        }
    }

    for r in &ranked {
        if chosen.len() >= count {
            break;
        }
        if taken.insert(r.frame_index) {
            chosen.push(r.frame_index);
        }
    }

    chosen.sort_unstable();
    info!(
        total = records.len(),
        selected = chosen.len(),
        best,
        "Frames selected"
    );
    Ok(Selection {
        indices: chosen,
        best,
    })
}
