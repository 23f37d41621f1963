//! SuperTrend: ATR envelope around the bar midpoint with band carry-over.
//! The previous bar's chosen band decides continuation vs flip; a flip is
//! the vote.

use super::{rolling_mean, IndicatorFrame};

pub(super) fn apply(frame: &mut IndicatorFrame, period: usize, multiplier: f64) {
    let bars = frame.bars();
    let n = bars.len();

    let mut tr = vec![0.0; n];
    for i in 0..n {
        let range = bars[i].high - bars[i].low;
        tr[i] = if i == 0 {
            range
        } else {
            let prev_close = bars[i - 1].close;
            range
                .max((bars[i].high - prev_close).abs())
                .max((bars[i].low - prev_close).abs())
        };
    }
    let atr = rolling_mean(&tr, period);

    let mut upper = vec![f64::NAN; n];
    let mut lower = vec![f64::NAN; n];
    for i in 0..n {
        if atr[i].is_finite() {
            let hl2 = (bars[i].high + bars[i].low) / 2.0;
            upper[i] = hl2 + multiplier * atr[i];
            lower[i] = hl2 - multiplier * atr[i];
        }
    }

    // Band carry-over: the upper band only ratchets down while the close
    // stays below it, and symmetrically for the lower band.
    for i in period..n {
        let basic_upper = upper[i];
        let basic_lower = lower[i];
        if bars[i - 1].close <= upper[i - 1] {
            upper[i] = basic_upper.min(upper[i - 1]);
        }
        if bars[i - 1].close >= lower[i - 1] {
            lower[i] = basic_lower.max(lower[i - 1]);
        }
    }

    let mut line = vec![f64::NAN; n];
    let mut direction = vec![0i8; n];
    for i in period..n {
        if bars[i].close <= upper[i] {
            line[i] = upper[i];
            direction[i] = -1;
        } else {
            line[i] = lower[i];
            direction[i] = 1;
        }
    }

    let mut votes = vec![0i8; n];
    for i in (period + 1)..n {
        if direction[i] != 0 && direction[i - 1] != 0 && direction[i] != direction[i - 1] {
            votes[i] = direction[i];
        }
    }

    frame.insert_column("supertrend", line);
    frame.insert_signal("supertrend", votes);
}

#[cfg(test)]
mod tests {
    use super::super::testutil::bars_from_ohlc;
    use super::*;

    fn steady_bars() -> Vec<crate::types::Bar> {
        // Unit-range bars climbing one point per bar, then a crash.
        let closes = [10.0, 11.0, 12.0, 13.0, 14.0, 5.0];
        let rows: Vec<(f64, f64, f64, f64)> =
            closes.iter().map(|&c| (c, c + 1.0, c - 1.0, c)).collect();
        bars_from_ohlc(&rows)
    }

    #[test]
    fn band_ratchets_until_price_breaks_out() {
        let bars = steady_bars();
        let mut frame = IndicatorFrame::new(&bars);
        apply(&mut frame, 2, 1.0);

        let line = frame.column("supertrend").unwrap();
        assert!(line[0].is_nan() && line[1].is_nan());
        // The upper band sticks at 13 while the close grinds up under it.
        assert_eq!(line[2], 13.0);
        assert_eq!(line[3], 13.0);
        // Breakout above 13 flips the line onto the ratcheted lower band.
        assert_eq!(line[4], 12.0);
        // The crash flips it back to a freshly widened upper band.
        assert_eq!(line[5], 11.0);
    }

    #[test]
    fn votes_fire_on_direction_flips_only() {
        let bars = steady_bars();
        let mut frame = IndicatorFrame::new(&bars);
        apply(&mut frame, 2, 1.0);

        assert_eq!(frame.signal("supertrend").unwrap(), &[0, 0, 0, 0, 1, -1]);
    }
}
