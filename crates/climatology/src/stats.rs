//! Finite-value statistics over grid values.
//!
//! NaN cells are missing data and are excluded from every statistic here.
//! All functions return `None` when no finite value exists.

/// Minimum and maximum over finite values.
pub fn finite_min_max(values: &[f32]) -> Option<(f32, f32)> {
    let mut it = values.iter().copied().filter(|v| v.is_finite());
    let first = it.next()?;
    let (mut min, mut max) = (first, first);
    for v in it {
        if v < min {
            min = v;
        }
        if v > max {
            max = v;
        }
    }
    Some((min, max))
}

/// Arithmetic mean over finite values.
pub fn finite_mean(values: &[f32]) -> Option<f32> {
    let mut sum = 0.0f64;
    let mut count = 0usize;
    for v in values.iter().filter(|v| v.is_finite()) {
        sum += *v as f64;
        count += 1;
    }
    if count == 0 {
        None
    } else {
        Some((sum / count as f64) as f32)
    }
}

/// Percentile over finite values, `p` in 0..=100, linear interpolation
/// between order statistics.
pub fn percentile(values: &[f32], p: f64) -> Option<f32> {
    let mut finite: Vec<f32> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    finite.sort_by(|a, b| a.partial_cmp(b).expect("finite values compare"));

    let p = p.clamp(0.0, 100.0);
    let rank = p / 100.0 * (finite.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return Some(finite[lo]);
    }
    let frac = (rank - lo as f64) as f32;
    Some(finite[lo] + (finite[hi] - finite[lo]) * frac)
}

/// Largest absolute finite value. Used to center diverging color scales
/// at zero.
pub fn max_abs(values: &[f32]) -> Option<f32> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .map(f32::abs)
        .fold(None, |acc, v| match acc {
            Some(m) if m >= v => Some(m),
            _ => Some(v),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_max_ignores_nan() {
        let v = [f32::NAN, 3.0, -1.0, 7.0];
        assert_eq!(finite_min_max(&v), Some((-1.0, 7.0)));
        assert_eq!(finite_min_max(&[f32::NAN]), None);
    }

    #[test]
    fn test_mean_ignores_nan() {
        let v = [1.0, f32::NAN, 3.0];
        assert_eq!(finite_mean(&v), Some(2.0));
        assert_eq!(finite_mean(&[]), None);
    }

    #[test]
    fn test_percentile_interpolates() {
        let v = [0.0, 1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&v, 0.0), Some(0.0));
        assert_eq!(percentile(&v, 100.0), Some(4.0));
        assert_eq!(percentile(&v, 50.0), Some(2.0));
        assert_eq!(percentile(&v, 25.0), Some(1.0));
        // between order statistics
        let p = percentile(&[0.0, 1.0], 75.0).unwrap();
        assert!((p - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_percentile_with_nan() {
        let v = [f32::NAN, 10.0, 20.0, f32::NAN, 30.0];
        assert_eq!(percentile(&v, 50.0), Some(20.0));
    }

    #[test]
    fn test_max_abs() {
        assert_eq!(max_abs(&[-3.0, 2.0, f32::NAN]), Some(3.0));
        assert_eq!(max_abs(&[f32::NAN]), None);
    }
}
