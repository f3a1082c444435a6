//! Robust summary statistics and the library-complexity estimate.

/// Scales a median absolute deviation to a normal-consistent standard deviation.
pub const MAD_FACTOR: f64 = 1.4826;

const COMPLEXITY_LIMIT: f64 = 1e9;

///
/// True median: the mean of the two central values for even-sized input.
/// `None` for empty input.
///
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Median absolute deviation around `center`, scaled by [`MAD_FACTOR`].
pub fn mad(values: &[f64], center: f64) -> Option<f64> {
    let deviations: Vec<f64> = values.iter().map(|v| (v - center).abs()).collect();
    median(&deviations).map(|m| m * MAD_FACTOR)
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let mean = mean(values)?;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

///
/// Nearest-rank percentile of already sorted values; `p` is a fraction.
///
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = ((p * sorted.len() as f64).ceil() as usize).clamp(1, sorted.len());
    Some(sorted[rank - 1])
}

fn complexity_residual(x: f64, total: f64, unique: f64) -> f64 {
    x * (1.0 - (-total / x).exp()) - unique
}

///
/// Estimate the number of distinct molecules in the library from the
/// Lander-Waterman saturation model: the `x` for which
/// `x * (1 - exp(-N / x))` best matches the observed unique count, where `N`
/// is unique plus duplicate fragments.
///
/// The residual increases with `x`, so the root is found by bisection over
/// `[unique, 1e9)`. Returns `None` when there are no duplicates, since the
/// model then has no finite solution.
///
pub fn library_complexity(unique: u64, duplicates: u64) -> Option<u64> {
    if duplicates == 0 || unique == 0 {
        return None;
    }
    let total = (unique + duplicates) as f64;
    let target = unique as f64;
    let residual = |x: u64| complexity_residual(x as f64, total, target);

    let mut lo = unique;
    let mut hi = COMPLEXITY_LIMIT as u64 - 1;
    if residual(hi) < 0.0 {
        return Some(hi);
    }
    // invariant: residual(lo) <= 0 < residual(hi) unless lo is already the root
    while hi - lo > 1 {
        let mid = lo + (hi - lo) / 2;
        if residual(mid) <= 0.0 {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    if residual(hi).abs() < residual(lo).abs() {
        Some(hi)
    } else {
        Some(lo)
    }
}
