//! Signal combination: reduces per-indicator vote columns into one
//! combined buy/sell/neutral sequence, and evaluates the latest combined
//! signal for live sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use crate::error::EngineError;
use crate::indicators::{IndicatorFrame, IndicatorKind, IndicatorSpec};
use crate::types::Bar;

/// Mean-vote cutoff: the combined vote is non-neutral only when the mean
/// of the per-indicator votes clears this magnitude.
const MEAN_VOTE_THRESHOLD: f64 = 0.5;

/// A discrete trade signal with the indicator state that produced it.
#[derive(Debug, Clone)]
pub struct Signal {
    pub timestamp: DateTime<Utc>,
    pub direction: i8,
    pub price: f64,
    pub detail: IndicatorDetail,
}

/// Latest per-indicator state attached to emitted events: each computed
/// indicator's column values and its own vote at the signal bar.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndicatorDetail(pub BTreeMap<String, IndicatorSnapshot>);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub values: BTreeMap<String, f64>,
    pub vote: i8,
}

/// Compute every requested indicator into one frame. An indicator that
/// lacks warm-up data is skipped with a warning; when nothing survives,
/// the first failure is the result.
pub fn compute_frame(
    bars: &[Bar],
    specs: &[IndicatorSpec],
) -> Result<(IndicatorFrame, Vec<IndicatorKind>), EngineError> {
    let mut frame = IndicatorFrame::new(bars);
    let mut active = Vec::with_capacity(specs.len());
    let mut first_failure = None;

    for spec in specs {
        match spec.compute(&mut frame) {
            Ok(()) => active.push(spec.kind),
            Err(e @ EngineError::InsufficientData { .. }) => {
                warn!("skipping {}: {}", spec.kind, e);
                first_failure.get_or_insert(e);
            }
            Err(e) => return Err(e),
        }
    }

    if active.is_empty() {
        return Err(first_failure.unwrap_or(EngineError::NoTradableSignal));
    }
    Ok((frame, active))
}

/// Reduce the active indicators' votes to one combined sequence.
///
/// A single indicator passes through unchanged. For several, each bar's
/// combined vote is the mean of the individual votes, snapped to +1/-1
/// only beyond the 0.5 threshold.
pub fn combine_signals(frame: &IndicatorFrame, active: &[IndicatorKind]) -> Vec<i8> {
    if let [only] = active {
        return frame
            .signal(only.name())
            .map(<[i8]>::to_vec)
            .unwrap_or_else(|| vec![0; frame.len()]);
    }

    let columns: Vec<&[i8]> = active
        .iter()
        .filter_map(|kind| frame.signal(kind.name()))
        .collect();
    let mut combined = vec![0i8; frame.len()];
    if columns.is_empty() {
        return combined;
    }

    for i in 0..frame.len() {
        let mean = columns.iter().map(|c| c[i] as f64).sum::<f64>() / columns.len() as f64;
        combined[i] = if mean > MEAN_VOTE_THRESHOLD {
            1
        } else if mean < -MEAN_VOTE_THRESHOLD {
            -1
        } else {
            0
        };
    }
    combined
}

/// Per-indicator state at one bar index, for event payloads.
pub fn snapshot_at(frame: &IndicatorFrame, active: &[IndicatorKind], index: usize) -> IndicatorDetail {
    let mut detail = BTreeMap::new();
    for kind in active {
        let values = kind
            .columns()
            .iter()
            .filter_map(|name| frame.column(name).map(|col| (name.to_string(), col[index])))
            .collect();
        let vote = frame
            .signal(kind.name())
            .map(|votes| votes[index])
            .unwrap_or(0);
        detail.insert(kind.name().to_string(), IndicatorSnapshot { values, vote });
    }
    IndicatorDetail(detail)
}

/// Evaluate the combined signal at the newest bar of a fetched window.
pub fn evaluate_latest(bars: &[Bar], specs: &[IndicatorSpec]) -> Result<Signal, EngineError> {
    let (frame, active) = compute_frame(bars, specs)?;
    let combined = combine_signals(&frame, &active);
    let last = frame.len() - 1;
    let bar = &frame.bars()[last];
    Ok(Signal {
        timestamp: bar.timestamp,
        direction: combined[last],
        price: bar.close,
        detail: snapshot_at(&frame, &active, last),
    })
}
