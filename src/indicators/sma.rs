//! Simple moving average with a price-crossover vote.

use super::{cross_signals, rolling_mean, IndicatorFrame};

pub(super) fn apply(frame: &mut IndicatorFrame, period: usize) {
    let closes = frame.closes();
    let sma = rolling_mean(&closes, period);
    let votes = cross_signals(&closes, &sma);
    frame.insert_column("sma", sma);
    frame.insert_signal("sma", votes);
}
