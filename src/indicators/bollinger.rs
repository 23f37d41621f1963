//! Bollinger Bands: SMA middle band, sample-stddev envelope. Votes fire
//! when the close re-enters the envelope after an excursion.

use super::{cross_signals, rolling_mean, rolling_std, IndicatorFrame};

pub(super) fn apply(frame: &mut IndicatorFrame, period: usize, stddev: f64) {
    let closes = frame.closes();
    let middle = rolling_mean(&closes, period);
    let std = rolling_std(&closes, period);

    let upper: Vec<f64> = middle
        .iter()
        .zip(&std)
        .map(|(m, s)| m + stddev * s)
        .collect();
    let lower: Vec<f64> = middle
        .iter()
        .zip(&std)
        .map(|(m, s)| m - stddev * s)
        .collect();

    // Buy on re-entry above the lower band, sell on re-entry below the
    // upper band; the opposite leg of each crossover is ignored.
    let lower_cross = cross_signals(&closes, &lower);
    let upper_cross = cross_signals(&closes, &upper);
    let votes: Vec<i8> = lower_cross
        .iter()
        .zip(&upper_cross)
        .map(|(&lo, &up)| {
            if lo == 1 {
                1
            } else if up == -1 {
                -1
            } else {
                0
            }
        })
        .collect();

    frame.insert_column("bb_middle", middle);
    frame.insert_column("bb_upper", upper);
    frame.insert_column("bb_lower", lower);
    frame.insert_signal("bollinger", votes);
}

#[cfg(test)]
mod tests {
    use super::super::testutil::bars_from_closes;
    use super::*;

    #[test]
    fn band_width_matches_sample_deviation() {
        let bars = bars_from_closes(&[10.0, 10.0, 10.0, 4.0, 16.0]);
        let mut frame = IndicatorFrame::new(&bars);
        apply(&mut frame, 3, 2.0);

        let upper = frame.column("bb_upper").unwrap();
        let lower = frame.column("bb_lower").unwrap();
        assert!(upper[1].is_nan() && lower[1].is_nan());

        // Window [10, 10, 4]: mean 8, sample stddev sqrt(12).
        let expected_half_width = 2.0 * 12.0f64.sqrt();
        assert!((upper[3] - (8.0 + expected_half_width)).abs() < 1e-9);
        assert!((lower[3] - (8.0 - expected_half_width)).abs() < 1e-9);
    }

    #[test]
    fn reentry_votes() {
        let bars = bars_from_closes(&[10.0, 10.0, 10.0, 4.0, 16.0]);
        let mut frame = IndicatorFrame::new(&bars);
        apply(&mut frame, 3, 1.0);

        let votes = frame.signal("bollinger").unwrap();
        // Bar 3 drops back under the upper band after touching it.
        assert_eq!(votes[3], -1);
        // Bar 4 recovers from under the lower band back inside.
        assert_eq!(votes[4], 1);
    }
}
