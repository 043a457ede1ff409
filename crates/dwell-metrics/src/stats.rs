//! Small numeric helpers shared by the reducers

/// Round to one decimal place
#[inline]
#[must_use]
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// `numerator / denominator` rounded to one decimal, 0.0 on an empty denominator
#[inline]
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn ratio(numerator: i64, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        round1(numerator as f64 / denominator as f64)
    }
}

/// `part / whole * 100` rounded to one decimal, 0.0 when `whole` is zero
#[inline]
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn percent(part: i64, whole: i64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        round1(part as f64 / whole as f64 * 100.0)
    }
}

/// Median of an ascending slice, taking the lower middle on even lengths
#[inline]
#[must_use]
pub fn lower_median(sorted: &[i64]) -> Option<i64> {
    if sorted.is_empty() {
        None
    } else {
        Some(sorted[(sorted.len() - 1) / 2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round1_behaviour() {
        assert_eq!(round1(33.333), 33.3);
        assert_eq!(round1(66.66), 66.7);
        assert_eq!(round1(12.0), 12.0);
    }

    #[test]
    fn ratio_and_percent_guard_zero() {
        assert_eq!(ratio(10, 0), 0.0);
        assert_eq!(ratio(10, 4), 2.5);
        assert_eq!(percent(3, 0), 0.0);
        assert_eq!(percent(30, 100), 30.0);
    }

    #[test]
    fn lower_median_picks_lower_middle() {
        assert_eq!(lower_median(&[]), None);
        assert_eq!(lower_median(&[4]), Some(4));
        assert_eq!(lower_median(&[1, 3, 8, 20]), Some(3));
        assert_eq!(lower_median(&[1, 3, 8]), Some(3));
    }
}
