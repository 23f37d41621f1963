//! Relative Strength Index from rolling-mean gains and losses.
//!
//! Average gain/loss are plain rolling means of the positive/negative close
//! deltas over `period` bars. When the average loss is exactly zero the
//! division is skipped: RSI is 100 (pure gains) or 50 (flat window), never
//! NaN or infinite.

use super::{rolling_mean, IndicatorFrame};

pub(super) fn apply(frame: &mut IndicatorFrame, period: usize, overbought: f64, oversold: f64) {
    let closes = frame.closes();
    let n = closes.len();

    let mut gains = vec![f64::NAN; n];
    let mut losses = vec![f64::NAN; n];
    for i in 1..n {
        let delta = closes[i] - closes[i - 1];
        gains[i] = delta.max(0.0);
        losses[i] = (-delta).max(0.0);
    }

    let avg_gain = rolling_mean(&gains, period);
    let avg_loss = rolling_mean(&losses, period);

    let mut rsi = vec![f64::NAN; n];
    for i in 0..n {
        let (g, l) = (avg_gain[i], avg_loss[i]);
        if !g.is_finite() || !l.is_finite() {
            continue;
        }
        rsi[i] = if l == 0.0 {
            if g == 0.0 {
                50.0
            } else {
                100.0
            }
        } else {
            100.0 - 100.0 / (1.0 + g / l)
        };
    }

    let mut votes = vec![0i8; n];
    for i in 1..n {
        let (r0, r1) = (rsi[i - 1], rsi[i]);
        if !(r0.is_finite() && r1.is_finite()) {
            continue;
        }
        if r0 <= oversold && r1 > oversold {
            votes[i] = 1;
        } else if r0 >= overbought && r1 < overbought {
            votes[i] = -1;
        }
    }

    frame.insert_column("rsi", rsi);
    frame.insert_signal("rsi", votes);
}
