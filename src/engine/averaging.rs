//! Collapsing repeated reads of one segment into a single read.

use log::debug;
use num_complex::Complex64;

/// Drop the `truncate` passes farthest from the per-point centroid, then
/// average the survivors.
///
/// `passes[p][k]` is pass `p`'s value at point `k`. Truncation is decided per
/// point, so different points may discard different passes. Ties in distance
/// keep the lower pass index. When fewer than one pass would survive the
/// truncation is skipped and all passes are averaged.
pub fn reduce(passes: &[Vec<Complex64>], truncate: usize) -> Vec<Complex64> {
    let Some(first) = passes.first() else {
        return Vec::new();
    };
    let count = passes.len();
    let keep = if truncate > 0 && count > truncate {
        count - truncate
    } else {
        if truncate > 0 {
            debug!("Not truncating {} of {} passes", truncate, count);
        }
        count
    };

    let mut column: Vec<(usize, Complex64)> = Vec::with_capacity(count);
    (0..first.len())
        .map(|k| {
            column.clear();
            column.extend(passes.iter().enumerate().filter_map(|(p, pass)| pass.get(k).map(|&v| (p, v))));
            if keep < column.len() {
                let centroid = mean(column.iter().map(|&(_, v)| v));
                column.sort_by(|a, b| {
                    let da = (a.1 - centroid).norm();
                    let db = (b.1 - centroid).norm();
                    da.total_cmp(&db).then(a.0.cmp(&b.0))
                });
                column.truncate(keep);
            }
            mean(column.iter().map(|&(_, v)| v))
        })
        .collect()
}

fn mean(values: impl Iterator<Item = Complex64>) -> Complex64 {
    let (sum, n) = values.fold((Complex64::new(0.0, 0.0), 0usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 {
        sum
    } else {
        sum / n as f64
    }
}
