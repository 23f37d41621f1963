//! MACD: difference of two close EMAs plus a smoothed signal line.
//! Votes fire on the MACD line crossing its signal line.

use super::{cross_signals, ema_series, IndicatorFrame};

pub(super) fn apply(frame: &mut IndicatorFrame, fast: usize, slow: usize, signal: usize) {
    let closes = frame.closes();
    let n = closes.len();
    let warmup = fast.max(slow).max(signal);

    let fast_ema = ema_series(&closes, fast);
    let slow_ema = ema_series(&closes, slow);
    let mut line: Vec<f64> = fast_ema
        .iter()
        .zip(&slow_ema)
        .map(|(f, s)| f - s)
        .collect();
    let mut signal_line = ema_series(&line, signal);
    let mut hist: Vec<f64> = line
        .iter()
        .zip(&signal_line)
        .map(|(m, s)| m - s)
        .collect();

    for i in 0..warmup.saturating_sub(1).min(n) {
        line[i] = f64::NAN;
        signal_line[i] = f64::NAN;
        hist[i] = f64::NAN;
    }

    let votes = cross_signals(&line, &signal_line);
    frame.insert_column("macd", line);
    frame.insert_column("macd_signal", signal_line);
    frame.insert_column("macd_hist", hist);
    frame.insert_signal("macd", votes);
}
