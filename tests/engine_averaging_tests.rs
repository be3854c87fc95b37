use num_complex::Complex64;
use vnasweep::engine::reduce;

fn passes() -> Vec<Vec<Complex64>> {
    vec![
        vec![Complex64::new(0.10, 0.02), Complex64::new(-0.30, 0.40), Complex64::new(0.0, 0.0)],
        vec![Complex64::new(0.13, 0.01), Complex64::new(-0.31, 0.45), Complex64::new(0.5, 0.5)],
        vec![Complex64::new(0.90, -0.20), Complex64::new(-0.29, 0.41), Complex64::new(0.1, 0.0)],
        vec![Complex64::new(0.11, 0.03), Complex64::new(-0.70, 0.10), Complex64::new(0.0, 0.12)],
    ]
}

#[test]
fn test_output_length_matches_pass_length() {
    let passes = passes();
    for truncate in 0..passes.len() {
        assert_eq!(reduce(&passes, truncate).len(), 3);
    }
}

#[test]
fn test_zero_truncate_is_pointwise_mean() {
    let passes = passes();
    let out = reduce(&passes, 0);
    for k in 0..3 {
        let mean = passes.iter().map(|p| p[k]).sum::<Complex64>() / passes.len() as f64;
        assert!((out[k] - mean).norm() < 1e-12);
    }
}

#[test]
fn test_permutation_invariant() {
    let passes = passes();
    let mut reversed = passes.clone();
    reversed.reverse();
    let mut rotated = passes.clone();
    rotated.rotate_left(1);

    for truncate in 0..passes.len() {
        let expected = reduce(&passes, truncate);
        for other in [&reversed, &rotated] {
            let out = reduce(other, truncate);
            for (a, b) in out.iter().zip(&expected) {
                assert!((a - b).norm() < 1e-12, "truncate {}: {} != {}", truncate, a, b);
            }
        }
    }
}

#[test]
fn test_outlier_is_removed() {
    let passes = passes();
    let out = reduce(&passes, 1);
    // pass 2 is the outlier at point 0
    let expected = (passes[0][0] + passes[1][0] + passes[3][0]) / 3.0;
    assert!((out[0] - expected).norm() < 1e-12);
}

#[test]
fn test_reduce_is_deterministic() {
    let passes = passes();
    assert_eq!(reduce(&passes, 2), reduce(&passes, 2));
}
