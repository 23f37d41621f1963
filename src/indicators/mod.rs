//! Indicator engine: pure transforms over an immutable bar series.
//!
//! Each indicator takes the bar series plus its parameters and augments an
//! [`IndicatorFrame`] with one or more value columns and a per-bar vote
//! column in {-1, 0, +1}. Warm-up values are NaN and never produce votes.
//! The input series is never mutated; the frame owns its own copy.

pub mod bollinger;
pub mod dmi;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;
pub mod supertrend;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::error::EngineError;
use crate::types::Bar;

/// Closed set of supported indicators, resolved at request-parse time.
/// Unknown kind strings fail fast instead of falling through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IndicatorKind {
    Sma,
    Ema,
    Rsi,
    Macd,
    Bollinger,
    SuperTrend,
    Dmi,
}

impl IndicatorKind {
    pub const ALL: [IndicatorKind; 7] = [
        IndicatorKind::Sma,
        IndicatorKind::Ema,
        IndicatorKind::Rsi,
        IndicatorKind::Macd,
        IndicatorKind::Bollinger,
        IndicatorKind::SuperTrend,
        IndicatorKind::Dmi,
    ];

    /// Canonical lowercase name, also used as the frame's signal column key.
    pub fn name(&self) -> &'static str {
        match self {
            IndicatorKind::Sma => "sma",
            IndicatorKind::Ema => "ema",
            IndicatorKind::Rsi => "rsi",
            IndicatorKind::Macd => "macd",
            IndicatorKind::Bollinger => "bollinger",
            IndicatorKind::SuperTrend => "supertrend",
            IndicatorKind::Dmi => "dmi",
        }
    }

    /// Frame column names this kind writes, in display order.
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            IndicatorKind::Sma => &["sma"],
            IndicatorKind::Ema => &["ema"],
            IndicatorKind::Rsi => &["rsi"],
            IndicatorKind::Macd => &["macd", "macd_signal", "macd_hist"],
            IndicatorKind::Bollinger => &["bb_middle", "bb_upper", "bb_lower"],
            IndicatorKind::SuperTrend => &["supertrend"],
            IndicatorKind::Dmi => &["plus_di", "minus_di", "adx"],
        }
    }

    pub fn parse(s: &str) -> Result<Self, EngineError> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.name() == normalized)
            .ok_or_else(|| EngineError::InvalidSpec(format!("unknown indicator kind: {s:?}")))
    }

    /// Default parameters, merged under any user-supplied overrides.
    fn default_params(&self) -> &'static [(&'static str, f64)] {
        match self {
            IndicatorKind::Sma | IndicatorKind::Ema => &[("period", 20.0)],
            IndicatorKind::Rsi => &[("period", 14.0), ("overbought", 70.0), ("oversold", 30.0)],
            IndicatorKind::Macd => &[("fast", 12.0), ("slow", 26.0), ("signal", 9.0)],
            IndicatorKind::Bollinger => &[("period", 20.0), ("stddev", 2.0)],
            IndicatorKind::SuperTrend => &[("period", 10.0), ("multiplier", 3.0)],
            IndicatorKind::Dmi => &[("period", 14.0)],
        }
    }
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unparsed indicator request as it arrives on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawIndicatorSpec {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub params: HashMap<String, f64>,
}

/// A validated indicator configuration. `params` holds the full merged
/// parameter set (defaults plus overrides), so lookups never miss.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSpec {
    pub kind: IndicatorKind,
    params: HashMap<String, f64>,
}

impl IndicatorSpec {
    /// Build a spec with all default parameters.
    pub fn with_defaults(kind: IndicatorKind) -> Self {
        let params = kind
            .default_params()
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect();
        Self { kind, params }
    }

    /// Validate and resolve a raw request. Unknown kinds, unknown parameter
    /// keys, and out-of-range values all fail with `InvalidSpec`.
    pub fn parse(raw: &RawIndicatorSpec) -> Result<Self, EngineError> {
        let kind = IndicatorKind::parse(&raw.kind)?;
        let mut spec = Self::with_defaults(kind);

        for (key, value) in &raw.params {
            if !spec.params.contains_key(key.as_str()) {
                return Err(EngineError::InvalidSpec(format!(
                    "{kind} does not take a {key:?} parameter"
                )));
            }
            if !value.is_finite() {
                return Err(EngineError::InvalidSpec(format!(
                    "{kind} parameter {key:?} must be finite"
                )));
            }
            spec.params.insert(key.clone(), *value);
        }

        spec.validate()?;
        Ok(spec)
    }

    fn validate(&self) -> Result<(), EngineError> {
        for key in ["period", "fast", "slow", "signal"] {
            if let Some(&v) = self.params.get(key) {
                if v < 1.0 || v.fract() != 0.0 {
                    return Err(EngineError::InvalidSpec(format!(
                        "{} parameter {key:?} must be a positive whole number, got {v}",
                        self.kind
                    )));
                }
            }
        }
        match self.kind {
            IndicatorKind::Rsi => {
                let overbought = self.param("overbought");
                let oversold = self.param("oversold");
                if !(0.0..=100.0).contains(&oversold)
                    || !(0.0..=100.0).contains(&overbought)
                    || oversold >= overbought
                {
                    return Err(EngineError::InvalidSpec(format!(
                        "rsi thresholds must satisfy 0 <= oversold < overbought <= 100, \
                         got oversold={oversold} overbought={overbought}"
                    )));
                }
            }
            IndicatorKind::Bollinger => {
                if self.usize_param("period") < 2 {
                    return Err(EngineError::InvalidSpec(
                        "bollinger period must be at least 2".into(),
                    ));
                }
                if self.param("stddev") <= 0.0 {
                    return Err(EngineError::InvalidSpec(
                        "bollinger stddev multiplier must be positive".into(),
                    ));
                }
            }
            IndicatorKind::SuperTrend => {
                if self.param("multiplier") <= 0.0 {
                    return Err(EngineError::InvalidSpec(
                        "supertrend multiplier must be positive".into(),
                    ));
                }
            }
            _ => {}
        }
        Ok(())
    }

    pub fn param(&self, key: &str) -> f64 {
        self.params[key]
    }

    fn usize_param(&self, key: &str) -> usize {
        self.params[key] as usize
    }

    /// Minimum number of bars before this indicator yields any defined
    /// output. Shorter series fail with `InsufficientData`.
    pub fn min_bars(&self) -> usize {
        match self.kind {
            IndicatorKind::Sma | IndicatorKind::Ema | IndicatorKind::Bollinger => {
                self.usize_param("period")
            }
            // RSI and SuperTrend consume one bar forming deltas / true range
            // before their rolling window starts.
            IndicatorKind::Rsi | IndicatorKind::SuperTrend => self.usize_param("period") + 1,
            IndicatorKind::Macd => self
                .usize_param("fast")
                .max(self.usize_param("slow"))
                .max(self.usize_param("signal")),
            // ADX is a rolling mean over DX, which itself needs a full
            // period of smoothed directional movement.
            IndicatorKind::Dmi => self.usize_param("period") * 2,
        }
    }

    /// Compute this indicator's columns and vote column into `frame`.
    pub fn compute(&self, frame: &mut IndicatorFrame) -> Result<(), EngineError> {
        let got = frame.len();
        let needed = self.min_bars();
        if got < needed {
            return Err(EngineError::InsufficientData {
                kind: self.kind,
                needed,
                got,
            });
        }

        match self.kind {
            IndicatorKind::Sma => sma::apply(frame, self.usize_param("period")),
            IndicatorKind::Ema => ema::apply(frame, self.usize_param("period")),
            IndicatorKind::Rsi => rsi::apply(
                frame,
                self.usize_param("period"),
                self.param("overbought"),
                self.param("oversold"),
            ),
            IndicatorKind::Macd => macd::apply(
                frame,
                self.usize_param("fast"),
                self.usize_param("slow"),
                self.usize_param("signal"),
            ),
            IndicatorKind::Bollinger => bollinger::apply(
                frame,
                self.usize_param("period"),
                self.param("stddev"),
            ),
            IndicatorKind::SuperTrend => supertrend::apply(
                frame,
                self.usize_param("period"),
                self.param("multiplier"),
            ),
            IndicatorKind::Dmi => dmi::apply(frame, self.usize_param("period")),
        }
        Ok(())
    }
}

/// Parse and validate a full indicator request list. Duplicate kinds are
/// rejected because columns and votes are keyed by kind.
pub fn parse_specs(raw: &[RawIndicatorSpec]) -> Result<Vec<IndicatorSpec>, EngineError> {
    if raw.is_empty() {
        return Err(EngineError::InvalidSpec(
            "at least one indicator is required".into(),
        ));
    }
    let mut specs: Vec<IndicatorSpec> = Vec::with_capacity(raw.len());
    for r in raw {
        let spec = IndicatorSpec::parse(r)?;
        if specs.iter().any(|s| s.kind == spec.kind) {
            return Err(EngineError::InvalidSpec(format!(
                "indicator {} requested more than once",
                spec.kind
            )));
        }
        specs.push(spec);
    }
    Ok(specs)
}

/// A bar series augmented with indicator value columns and vote columns.
#[derive(Debug, Clone)]
pub struct IndicatorFrame {
    bars: Vec<Bar>,
    columns: BTreeMap<String, Vec<f64>>,
    signals: BTreeMap<String, Vec<i8>>,
}

impl IndicatorFrame {
    pub fn new(bars: &[Bar]) -> Self {
        Self {
            bars: bars.to_vec(),
            columns: BTreeMap::new(),
            signals: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn insert_column(&mut self, name: &str, values: Vec<f64>) {
        debug_assert_eq!(values.len(), self.bars.len());
        self.columns.insert(name.to_string(), values);
    }

    pub fn insert_signal(&mut self, name: &str, votes: Vec<i8>) {
        debug_assert_eq!(votes.len(), self.bars.len());
        self.signals.insert(name.to_string(), votes);
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn signal(&self, name: &str) -> Option<&[i8]> {
        self.signals.get(name).map(Vec::as_slice)
    }
}

/// Rolling arithmetic mean over a full window; the first `period - 1`
/// outputs are NaN, as is any window that still contains NaN inputs.
pub(crate) fn rolling_mean(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 {
        return out;
    }
    for i in (period - 1)..values.len() {
        let window = &values[i + 1 - period..=i];
        if window.iter().all(|v| v.is_finite()) {
            out[i] = window.iter().sum::<f64>() / period as f64;
        }
    }
    out
}

/// Rolling sample standard deviation (ddof = 1), NaN below the window.
pub(crate) fn rolling_std(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period < 2 {
        return out;
    }
    for i in (period - 1)..values.len() {
        let window = &values[i + 1 - period..=i];
        if window.iter().all(|v| v.is_finite()) {
            let mean = window.iter().sum::<f64>() / period as f64;
            let var = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
                / (period - 1) as f64;
            out[i] = var.sqrt();
        }
    }
    out
}

/// Exponential moving average with alpha = 2 / (period + 1), seeded by the
/// first value with no bias correction.
pub(crate) fn ema_series(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    if values.is_empty() {
        return out;
    }
    let alpha = 2.0 / (period as f64 + 1.0);
    let mut prev = values[0];
    out.push(prev);
    for &v in &values[1..] {
        prev = alpha * v + (1.0 - alpha) * prev;
        out.push(prev);
    }
    out
}

/// Crossover votes between two series: +1 where `line` crosses above `base`
/// between consecutive bars, -1 on the symmetric downward cross. Bars where
/// either series is still NaN never vote.
pub(crate) fn cross_signals(line: &[f64], base: &[f64]) -> Vec<i8> {
    let mut out = vec![0i8; line.len()];
    for i in 1..line.len() {
        let (a0, a1) = (line[i - 1], line[i]);
        let (b0, b1) = (base[i - 1], base[i]);
        if !(a0.is_finite() && a1.is_finite() && b0.is_finite() && b1.is_finite()) {
            continue;
        }
        if a0 <= b0 && a1 > b1 {
            out[i] = 1;
        } else if a0 >= b0 && a1 < b1 {
            out[i] = -1;
        }
    }
    out
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use chrono::TimeZone;

    /// Bars with the given closes, one minute apart. Open/high/low collapse
    /// onto the close, which is enough for close-driven indicators.
    pub fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar {
                timestamp: chrono::Utc
                    .timestamp_opt(1_700_000_000 + 60 * i as i64, 0)
                    .unwrap(),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1_000.0,
            })
            .collect()
    }

    pub fn bars_from_ohlc(rows: &[(f64, f64, f64, f64)]) -> Vec<Bar> {
        rows.iter()
            .enumerate()
            .map(|(i, &(open, high, low, close))| Bar {
                timestamp: chrono::Utc
                    .timestamp_opt(1_700_000_000 + 60 * i as i64, 0)
                    .unwrap(),
                open,
                high,
                low,
                close,
                volume: 1_000.0,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(kind: &str, params: &[(&str, f64)]) -> RawIndicatorSpec {
        RawIndicatorSpec {
            kind: kind.to_string(),
            params: params.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        }
    }

    #[test]
    fn parse_known_kinds_case_insensitive() {
        for name in ["sma", "SMA", " Rsi ", "MACD", "SuperTrend", "dmi"] {
            assert!(IndicatorKind::parse(name).is_ok(), "failed for {name}");
        }
    }

    #[test]
    fn parse_unknown_kind_fails_fast() {
        let err = IndicatorSpec::parse(&raw("vwap", &[])).unwrap_err();
        assert!(matches!(err, EngineError::InvalidSpec(_)));
    }

    #[test]
    fn parse_merges_defaults_under_overrides() {
        let spec = IndicatorSpec::parse(&raw("rsi", &[("period", 7.0)])).unwrap();
        assert_eq!(spec.param("period"), 7.0);
        assert_eq!(spec.param("overbought"), 70.0);
        assert_eq!(spec.param("oversold"), 30.0);
    }

    #[test]
    fn parse_rejects_unknown_param_key() {
        let err = IndicatorSpec::parse(&raw("sma", &[("window", 10.0)])).unwrap_err();
        assert!(matches!(err, EngineError::InvalidSpec(_)));
    }

    #[test]
    fn parse_rejects_fractional_period() {
        let err = IndicatorSpec::parse(&raw("sma", &[("period", 2.5)])).unwrap_err();
        assert!(matches!(err, EngineError::InvalidSpec(_)));
    }

    #[test]
    fn parse_rejects_inverted_rsi_thresholds() {
        let err =
            IndicatorSpec::parse(&raw("rsi", &[("overbought", 20.0), ("oversold", 80.0)]))
                .unwrap_err();
        assert!(matches!(err, EngineError::InvalidSpec(_)));
    }

    #[test]
    fn parse_specs_rejects_duplicates_and_empty() {
        assert!(parse_specs(&[]).is_err());
        let err = parse_specs(&[raw("sma", &[]), raw("sma", &[("period", 50.0)])]).unwrap_err();
        assert!(matches!(err, EngineError::InvalidSpec(_)));
    }

    #[test]
    fn rolling_mean_matches_trailing_windows() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        let out = rolling_mean(&values, 3);
        assert!(out[0].is_nan() && out[1].is_nan());
        assert_eq!(out[2], 2.0);
        assert_eq!(out[3], 3.0);
        assert_eq!(out[4], 4.0);
    }

    #[test]
    fn rolling_std_is_sample_deviation() {
        // Sample stddev of [2, 4, 4, 4, 5, 5, 7, 9] over the full window.
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let out = rolling_std(&values, 8);
        let expected = (32.0f64 / 7.0).sqrt();
        assert!((out[7] - expected).abs() < 1e-12);
    }

    #[test]
    fn ema_seeds_from_first_value() {
        let out = ema_series(&[10.0, 20.0], 3);
        assert_eq!(out[0], 10.0);
        // alpha = 0.5 for period 3
        assert!((out[1] - 15.0).abs() < 1e-12);
    }

    #[test]
    fn cross_signals_fire_on_transitions_only() {
        let line = [1.0, 3.0, 3.0, 1.0];
        let base = [2.0, 2.0, 2.0, 2.0];
        assert_eq!(cross_signals(&line, &base), vec![0, 1, 0, -1]);
    }

    #[test]
    fn cross_signals_skip_nan_warmup() {
        let line = [f64::NAN, 3.0, 1.0];
        let base = [2.0, 2.0, 2.0];
        assert_eq!(cross_signals(&line, &base), vec![0, 0, -1]);
    }
}
