//! DMI/ADX: directional movement smoothed over the ATR, with a
//! trend-strength gate. Only the larger, positive directional move counts
//! for a bar; ties leave both sides at zero.

use super::{rolling_mean, IndicatorFrame};

const ADX_TREND_GATE: f64 = 25.0;

pub(super) fn apply(frame: &mut IndicatorFrame, period: usize) {
    let bars = frame.bars();
    let n = bars.len();

    let mut tr = vec![f64::NAN; n];
    let mut plus_dm = vec![f64::NAN; n];
    let mut minus_dm = vec![f64::NAN; n];
    for i in 1..n {
        let prev_close = bars[i - 1].close;
        tr[i] = (bars[i].high - bars[i].low)
            .max((bars[i].high - prev_close).abs())
            .max((bars[i].low - prev_close).abs());

        let up_move = bars[i].high - bars[i - 1].high;
        let down_move = bars[i - 1].low - bars[i].low;
        plus_dm[i] = if up_move > 0.0 && up_move > down_move {
            up_move
        } else {
            0.0
        };
        minus_dm[i] = if down_move > 0.0 && down_move > up_move {
            down_move
        } else {
            0.0
        };
    }

    let atr = rolling_mean(&tr, period);
    let plus_avg = rolling_mean(&plus_dm, period);
    let minus_avg = rolling_mean(&minus_dm, period);

    let mut plus_di = vec![f64::NAN; n];
    let mut minus_di = vec![f64::NAN; n];
    let mut dx = vec![f64::NAN; n];
    for i in 0..n {
        if !(atr[i].is_finite() && atr[i] > 0.0) {
            continue;
        }
        plus_di[i] = plus_avg[i] / atr[i] * 100.0;
        minus_di[i] = minus_avg[i] / atr[i] * 100.0;
        let sum = plus_di[i] + minus_di[i];
        dx[i] = if sum == 0.0 {
            0.0
        } else {
            (plus_di[i] - minus_di[i]).abs() / sum * 100.0
        };
    }
    let adx = rolling_mean(&dx, period);

    let mut votes = vec![0i8; n];
    for i in 0..n {
        if !(plus_di[i].is_finite() && minus_di[i].is_finite() && adx[i].is_finite()) {
            continue;
        }
        if adx[i] > ADX_TREND_GATE {
            if plus_di[i] > minus_di[i] {
                votes[i] = 1;
            } else if minus_di[i] > plus_di[i] {
                votes[i] = -1;
            }
        }
    }

    frame.insert_column("plus_di", plus_di);
    frame.insert_column("minus_di", minus_di);
    frame.insert_column("adx", adx);
    frame.insert_signal("dmi", votes);
}

#[cfg(test)]
mod tests {
    use super::super::testutil::bars_from_ohlc;
    use super::*;

    fn trending_bars(up: bool, n: usize) -> Vec<crate::types::Bar> {
        let rows: Vec<(f64, f64, f64, f64)> = (0..n)
            .map(|i| {
                let step = if up { 2.0 * i as f64 } else { -2.0 * i as f64 };
                let low = 100.0 + step;
                (low + 0.5, low + 1.0, low, low + 0.5)
            })
            .collect();
        bars_from_ohlc(&rows)
    }

    #[test]
    fn steady_uptrend_votes_buy_after_warmup() {
        let bars = trending_bars(true, 8);
        let mut frame = IndicatorFrame::new(&bars);
        apply(&mut frame, 3);

        let plus_di = frame.column("plus_di").unwrap();
        let minus_di = frame.column("minus_di").unwrap();
        let adx = frame.column("adx").unwrap();
        let votes = frame.signal("dmi").unwrap();

        // +DM is the full 2-point step, -DM never registers.
        assert!((plus_di[3] - 80.0).abs() < 1e-9);
        assert_eq!(minus_di[3], 0.0);
        assert!(adx[4].is_nan(), "ADX needs a full window of DX values");
        assert_eq!(adx[5], 100.0);
        assert_eq!(&votes[..6], &[0, 0, 0, 0, 0, 1]);
        assert!(votes[6..].iter().all(|&v| v == 1));
    }

    #[test]
    fn steady_downtrend_votes_sell() {
        let bars = trending_bars(false, 8);
        let mut frame = IndicatorFrame::new(&bars);
        apply(&mut frame, 3);

        let votes = frame.signal("dmi").unwrap();
        assert!(votes[5..].iter().all(|&v| v == -1), "votes were {votes:?}");
    }

    #[test]
    fn tie_between_directional_moves_counts_for_neither() {
        // Range expands symmetrically: up-move equals down-move each bar.
        let rows: Vec<(f64, f64, f64, f64)> = (0..8)
            .map(|i| {
                let w = i as f64;
                (100.0, 101.0 + w, 99.0 - w, 100.0)
            })
            .collect();
        let bars = bars_from_ohlc(&rows);
        let mut frame = IndicatorFrame::new(&bars);
        apply(&mut frame, 3);

        let plus_di = frame.column("plus_di").unwrap();
        let minus_di = frame.column("minus_di").unwrap();
        assert_eq!(plus_di[5], 0.0);
        assert_eq!(minus_di[5], 0.0);
        // +DI + -DI == 0 must resolve DX to 0, not NaN.
        let adx = frame.column("adx").unwrap();
        assert_eq!(adx[5], 0.0);
        assert!(frame.signal("dmi").unwrap().iter().all(|&v| v == 0));
    }
}
