// Binning of a numeric column into discrete map classes

use std::fmt;

pub const NATURAL_BREAKS_CLASSES: usize = 9;
pub const QUANTILE_CLASSES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    NaturalBreaks,
    Quantiles,
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheme::NaturalBreaks => f.write_str("natural breaks"),
            Scheme::Quantiles => f.write_str("quantiles"),
        }
    }
}

/// Class assignment for one column.
///
/// `bins` holds the inclusive upper bound of each class in ascending order;
/// value `v` falls in the first class whose bound is `>= v`. Missing values
/// have no class.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub scheme: Scheme,
    pub min: f64,
    pub bins: Vec<f64>,
    pub classes: Vec<Option<usize>>,
}

impl Classification {
    fn new(scheme: Scheme, bins: Vec<f64>, values: &[Option<f64>], min: f64) -> Self {
        let classes = values
            .iter()
            .map(|v| v.filter(|x| x.is_finite()).map(|x| class_of(&bins, x)))
            .collect();
        Classification {
            scheme,
            min,
            bins,
            classes,
        }
    }

    pub fn k(&self) -> usize {
        self.bins.len()
    }

    /// Human readable class ranges, e.g. `[4.00, 12.00]`, `(12.00, 20.00]`.
    pub fn legend_labels(&self) -> Vec<String> {
        let mut lower = self.min;
        self.bins
            .iter()
            .enumerate()
            .map(|(i, &upper)| {
                let label = if i == 0 {
                    format!("[{lower:.2}, {upper:.2}]")
                } else {
                    format!("({lower:.2}, {upper:.2}]")
                };
                lower = upper;
                label
            })
            .collect()
    }

    /// Count of values in each class.
    pub fn counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.k()];
        for class in self.classes.iter().flatten() {
            counts[*class] += 1;
        }
        counts
    }
}

fn class_of(bins: &[f64], value: f64) -> usize {
    bins.partition_point(|&b| b < value).min(bins.len().saturating_sub(1))
}

fn finite_sorted(values: &[Option<f64>]) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().flatten().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

/// Optimal (Fisher-Jenks) natural breaks into at most `k` classes.
///
/// The partition minimises the total within-class squared deviation. It is
/// computed over the distinct values weighted by their frequency, so the cost
/// grows with the number of distinct values rather than the number of rows.
/// Returns `None` when there is no finite value to classify.
pub fn natural_breaks(values: &[Option<f64>], k: usize) -> Option<Classification> {
    let sorted = finite_sorted(values);
    let min = *sorted.first()?;

    let mut distinct: Vec<f64> = Vec::new();
    let mut weights: Vec<f64> = Vec::new();
    for v in sorted {
        if distinct.last() == Some(&v) {
            if let Some(w) = weights.last_mut() {
                *w += 1.0;
            }
        } else {
            distinct.push(v);
            weights.push(1.0);
        }
    }

    let k = k.clamp(1, distinct.len());
    let ends = fisher_jenks(&distinct, &weights, k);
    let bins = ends.into_iter().map(|end| distinct[end - 1]).collect();
    Some(Classification::new(Scheme::NaturalBreaks, bins, values, min))
}

/// Returns the exclusive end index of each of the `k` classes over `x`.
fn fisher_jenks(x: &[f64], w: &[f64], k: usize) -> Vec<usize> {
    let m = x.len();

    // Prefix sums of weight, weighted value and weighted square
    let mut sw = vec![0.0; m + 1];
    let mut swx = vec![0.0; m + 1];
    let mut swx2 = vec![0.0; m + 1];
    for i in 0..m {
        sw[i + 1] = sw[i] + w[i];
        swx[i + 1] = swx[i] + w[i] * x[i];
        swx2[i + 1] = swx2[i] + w[i] * x[i] * x[i];
    }
    let ssd = |a: usize, b: usize| {
        let n = sw[b] - sw[a];
        let s = swx[b] - swx[a];
        ((swx2[b] - swx2[a]) - s * s / n).max(0.0)
    };

    // cost[c][j]: best cost of splitting x[..j] into c + 1 classes
    let mut cost = vec![vec![f64::INFINITY; m + 1]; k];
    let mut split = vec![vec![0usize; m + 1]; k];
    for j in 1..=m {
        cost[0][j] = ssd(0, j);
    }
    for c in 1..k {
        for j in (c + 1)..=m {
            for i in c..j {
                let candidate = cost[c - 1][i] + ssd(i, j);
                if candidate < cost[c][j] {
                    cost[c][j] = candidate;
                    split[c][j] = i;
                }
            }
        }
    }

    let mut ends = vec![0; k];
    let mut end = m;
    for c in (0..k).rev() {
        ends[c] = end;
        end = split[c][end];
    }
    ends
}

/// Quantile binning into at most `k` classes.
///
/// Upper bounds are the linear-interpolated percentiles at `1/k, 2/k, .., 1`;
/// coinciding bounds collapse, so heavily tied data yields fewer classes.
pub fn quantiles(values: &[Option<f64>], k: usize) -> Option<Classification> {
    let sorted = finite_sorted(values);
    let min = *sorted.first()?;
    let k = k.max(1);

    let mut bins: Vec<f64> = (1..=k).map(|i| percentile(&sorted, i as f64 / k as f64)).collect();
    bins.dedup();
    Some(Classification::new(Scheme::Quantiles, bins, values, min))
}

fn percentile(sorted_data: &[f64], p: f64) -> f64 {
    let n = sorted_data.len();
    if n == 0 { return 0.0; }
    if n == 1 { return sorted_data[0]; }

    let rank = p * (n - 1) as f64;
    let lower_idx = rank.floor() as usize;
    let upper_idx = rank.ceil() as usize;

    if lower_idx == upper_idx {
        sorted_data[lower_idx]
    } else {
        let weight = rank - lower_idx as f64;
        sorted_data[lower_idx] * (1.0 - weight) + sorted_data[upper_idx] * weight
    }
}
