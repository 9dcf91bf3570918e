//! Descriptive statistics over slices of finite `f64` values.
//!
//! Every function returns `None` when the input is too small for the
//! statistic to be defined.

use std::cmp::Ordering;

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample variance (n - 1 denominator)
pub fn variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|x| (x - m).powi(2)).sum();
    Some(ss / (values.len() - 1) as f64)
}

pub fn std_dev(values: &[f64]) -> Option<f64> {
    variance(values).map(f64::sqrt)
}

/// Sort a copy of the values ascending
pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    sorted
}

/// Quantile of already sorted values, with linear interpolation between ranks
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64))
}

pub fn median(values: &[f64]) -> Option<f64> {
    quantile_sorted(&sorted(values), 0.5)
}

fn central_moment(values: &[f64], m: f64, order: i32) -> f64 {
    values.iter().map(|x| (x - m).powi(order)).sum::<f64>() / values.len() as f64
}

/// Adjusted Fisher-Pearson skewness
pub fn skewness(values: &[f64]) -> Option<f64> {
    let n = values.len() as f64;
    if values.len() < 3 {
        return None;
    }
    let m = mean(values)?;
    let m2 = central_moment(values, m, 2);
    if m2 == 0.0 {
        return Some(0.0);
    }
    let g1 = central_moment(values, m, 3) / m2.powf(1.5);
    Some(g1 * (n * (n - 1.0)).sqrt() / (n - 2.0))
}

/// Bias-corrected excess kurtosis
pub fn kurtosis(values: &[f64]) -> Option<f64> {
    let n = values.len() as f64;
    if values.len() < 4 {
        return None;
    }
    let m = mean(values)?;
    let m2 = central_moment(values, m, 2);
    if m2 == 0.0 {
        return Some(0.0);
    }
    let g2 = central_moment(values, m, 4) / m2.powi(2) - 3.0;
    Some(((n + 1.0) * g2 + 6.0) * (n - 1.0) / ((n - 2.0) * (n - 3.0)))
}

/// Median absolute deviation from the median
pub fn median_abs_deviation(values: &[f64]) -> Option<f64> {
    let med = median(values)?;
    let deviations: Vec<f64> = values.iter().map(|x| (x - med).abs()).collect();
    median(&deviations)
}

/// Pearson correlation of paired observations
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let mx = mean(xs)?;
    let my = mean(ys)?;
    let mut cov = 0.0;
    let mut vx = 0.0;
    let mut vy = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        cov += (x - mx) * (y - my);
        vx += (x - mx).powi(2);
        vy += (y - my).powi(2);
    }
    if vx == 0.0 || vy == 0.0 {
        return None;
    }
    Some((cov / (vx.sqrt() * vy.sqrt())).clamp(-1.0, 1.0))
}

/// Ranks starting at 1, ties sharing their average rank
pub fn ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(Ordering::Equal));

    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        let rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = rank;
        }
        i = j + 1;
    }
    ranks
}

/// Spearman rank correlation of paired observations
pub fn spearman(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() {
        return None;
    }
    pearson(&ranks(xs), &ranks(ys))
}

/// Direction of a series in its original order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Monotonicity {
    StrictlyIncreasing,
    Increasing,
    StrictlyDecreasing,
    Decreasing,
    NotMonotonic,
}

impl Monotonicity {
    pub fn label(&self) -> &'static str {
        match self {
            Monotonicity::StrictlyIncreasing => "Strictly increasing",
            Monotonicity::Increasing => "Increasing",
            Monotonicity::StrictlyDecreasing => "Strictly decreasing",
            Monotonicity::Decreasing => "Decreasing",
            Monotonicity::NotMonotonic => "Not monotonic",
        }
    }
}

pub fn monotonicity(values: &[f64]) -> Monotonicity {
    if values.len() < 2 {
        return Monotonicity::NotMonotonic;
    }
    let pairs = || values.windows(2);
    if pairs().all(|w| w[1] > w[0]) {
        Monotonicity::StrictlyIncreasing
    } else if pairs().all(|w| w[1] >= w[0]) && values[values.len() - 1] != values[0] {
        Monotonicity::Increasing
    } else if pairs().all(|w| w[1] < w[0]) {
        Monotonicity::StrictlyDecreasing
    } else if pairs().all(|w| w[1] <= w[0]) && values[values.len() - 1] != values[0] {
        Monotonicity::Decreasing
    } else {
        Monotonicity::NotMonotonic
    }
}

/// One histogram bucket, `[start, end)` except for the last which is closed
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Bin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

/// Equal-width histogram with a Sturges bin count capped at `max_bins`
pub fn histogram(values: &[f64], max_bins: usize) -> Vec<Bin> {
    if values.is_empty() {
        return Vec::new();
    }
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if min == max {
        return vec![Bin {
            start: min,
            end: max,
            count: values.len(),
        }];
    }

    let sturges = (values.len() as f64).log2().ceil() as usize + 1;
    let n_bins = sturges.clamp(1, max_bins.max(1));
    let n = n_bins as f64;
    // a span wider than f64::MAX is measured piecewise so bin edges stay finite
    let width = if (max - min).is_finite() {
        (max - min) / n
    } else {
        max / n - min / n
    };

    let mut bins: Vec<Bin> = (0..n_bins)
        .map(|i| Bin {
            start: min + width * i as f64,
            end: if i + 1 == n_bins {
                max
            } else {
                min + width * (i + 1) as f64
            },
            count: 0,
        })
        .collect();
    for v in values {
        let offset = if (v - min).is_finite() {
            (v - min) / width
        } else {
            v / width - min / width
        };
        let idx = (offset as usize).min(n_bins - 1);
        bins[idx].count += 1;
    }
    bins
}
