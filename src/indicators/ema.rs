//! Exponential moving average, seeded by the first close (no bias
//! correction), with the same price-crossover vote as the SMA.

use super::{cross_signals, ema_series, IndicatorFrame};

pub(super) fn apply(frame: &mut IndicatorFrame, period: usize) {
    let closes = frame.closes();
    let mut ema = ema_series(&closes, period);
    // The recurrence is defined from the first bar, but the first
    // `period - 1` outputs are still dominated by the seed and masked out
    // like every other warm-up window.
    for v in ema.iter_mut().take(period.saturating_sub(1)) {
        *v = f64::NAN;
    }
    let votes = cross_signals(&closes, &ema);
    frame.insert_column("ema", ema);
    frame.insert_signal("ema", votes);
}

#[cfg(test)]
mod tests {
    use super::super::testutil::bars_from_closes;
    use super::*;

    #[test]
    fn recurrence_matches_hand_computed_values() {
        let closes = [10.0, 13.0, 16.0, 10.0];
        let bars = bars_from_closes(&closes);
        let mut frame = IndicatorFrame::new(&bars);
        apply(&mut frame, 3); // alpha = 0.5

        let ema = frame.column("ema").unwrap();
        assert!(ema[0].is_nan() && ema[1].is_nan());
        // Seeded 10 -> 11.5 -> 13.75 -> 11.875
        assert!((ema[2] - 13.75).abs() < 1e-12);
        assert!((ema[3] - 11.875).abs() < 1e-12);
    }

    #[test]
    fn sell_vote_when_close_drops_through_ema() {
        let closes = [10.0, 13.0, 16.0, 10.0];
        let bars = bars_from_closes(&closes);
        let mut frame = IndicatorFrame::new(&bars);
        apply(&mut frame, 3);

        let votes = frame.signal("ema").unwrap();
        // Index 3: close 10 < ema 11.875 after close 16 > ema 13.75.
        assert_eq!(votes[3], -1);
        assert_eq!(votes[0], 0);
    }
}
