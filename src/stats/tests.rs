use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::*;
use crate::dynmatrix::{DynMatrix, DynVector};
use crate::error::FactorError;
use crate::linalg::LinalgError;
use crate::sparse::CooMatrix;

// ======================== Helpers ========================

/// (d−1)×d Helmert contrasts with shuffled columns. Rows are orthonormal and
/// orthogonal to the ones vector, like a balance basis over a random tree.
fn balance_basis(d: usize, rng: &mut ChaCha8Rng) -> DynMatrix<f64> {
    let mut perm: Vec<usize> = (0..d).collect();
    perm.shuffle(rng);
    let mut psi = DynMatrix::zeros(d - 1, d);
    for i in 0..d - 1 {
        let c = 1.0 / (((i + 1) * (i + 2)) as f64).sqrt();
        for &j in &perm[..=i] {
            psi[(i, j)] = c;
        }
        psi[(i, perm[i + 1])] = -((i + 1) as f64) * c;
    }
    psi
}

/// d×d orthogonal matrix: the Helmert contrasts plus the normalized ones row.
fn square_basis(d: usize) -> DynMatrix<f64> {
    let mut psi = DynMatrix::zeros(d, d);
    for i in 0..d - 1 {
        let c = 1.0 / (((i + 1) * (i + 2)) as f64).sqrt();
        for j in 0..=i {
            psi[(i, j)] = c;
        }
        psi[(i, i + 1)] = -((i + 1) as f64) * c;
    }
    for j in 0..d {
        psi[(d - 1, j)] = 1.0 / (d as f64).sqrt();
    }
    psi
}

/// 1/p for a random probability vector p bounded away from zero.
fn inverse_probabilities(d: usize, rng: &mut ChaCha8Rng) -> Vec<f64> {
    let p: Vec<f64> = (0..d).map(|_| rng.gen_range(0.1..1.0)).collect();
    let total: f64 = p.iter().sum();
    p.iter().map(|&x| total / x).collect()
}

fn gaussian_matrix(nrows: usize, ncols: usize, rng: &mut ChaCha8Rng) -> DynMatrix<f64> {
    let normal = rand_distr::StandardNormal;
    DynMatrix::from_vec(
        nrows,
        ncols,
        (0..nrows * ncols).map(|_| rng.sample::<f64, _>(normal)).collect(),
    )
}

fn uniform_vector(k: usize, rng: &mut ChaCha8Rng) -> DynVector<f64> {
    DynVector::from_vec((0..k).map(|_| rng.gen_range(0.1..1.0)).collect())
}

fn assert_allclose(got: &DynMatrix<f64>, expected: &DynMatrix<f64>, atol: f64, rtol: f64) {
    assert_eq!(got.shape(), expected.shape());
    for i in 0..got.nrows() {
        for j in 0..got.ncols() {
            let (g, e) = (got[(i, j)], expected[(i, j)]);
            assert!(
                (g - e).abs() <= atol + rtol * e.abs(),
                "({}, {}): {} vs {}",
                i,
                j,
                g,
                e
            );
        }
    }
}

/// Column means and unbiased covariance of the rows of `draws`.
fn sample_moments(draws: &DynMatrix<f64>) -> (Vec<f64>, DynMatrix<f64>) {
    let (s, m) = draws.shape();
    let mean: Vec<f64> = (0..m)
        .map(|j| (0..s).map(|r| draws[(r, j)]).sum::<f64>() / s as f64)
        .collect();
    let mut cov = DynMatrix::zeros(m, m);
    for r in 0..s {
        for j in 0..m {
            let dj = draws[(r, j)] - mean[j];
            for i in j..m {
                cov[(i, j)] += (draws[(r, i)] - mean[i]) * dj;
            }
        }
    }
    for j in 0..m {
        for i in j..m {
            let v = cov[(i, j)] / (s - 1) as f64;
            cov[(i, j)] = v;
            cov[(j, i)] = v;
        }
    }
    (mean, cov)
}

/// Every coordinate within five standard errors of `expected`.
fn assert_mean_near(mean: &[f64], expected: f64, cov: &DynMatrix<f64>, draws: usize) {
    for (j, &mj) in mean.iter().enumerate() {
        let std_err = (cov[(j, j)] / draws as f64).sqrt();
        assert!((mj - expected).abs() < 5.0 * std_err, "mean[{}] = {}", j, mj);
    }
}

fn dense_log_det(a: &DynMatrix<f64>) -> f64 {
    a.det().unwrap().ln()
}

fn dense_mode() -> FactorSettings {
    FactorSettings::default().with_precision_mode(PrecisionMode::Dense)
}

// ======================== FactorNormal ========================

#[test]
fn covariance_is_square_symmetric_positive_definite() {
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    let d = 100;
    let psi = balance_basis(d, &mut rng);
    let w = inverse_probabilities(d, &mut rng);
    let dist = FactorNormal::<f64>::new(DynVector::zeros(d - 1), psi, w, 200.0).unwrap();

    let cov = dist.covariance_matrix();
    assert_eq!(cov.shape(), (d - 1, d - 1));
    assert!(cov.is_symmetric(0.0));
    assert!(cov.cholesky().is_ok());
    assert_eq!(dist.dim(), d - 1);
    assert_eq!(dist.noise_dim(), d);
}

#[test]
fn covariance_matches_explicit_product() {
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let d = 8;
    let psi = balance_basis(d, &mut rng);
    let w = inverse_probabilities(d, &mut rng);
    let n = 30.0;
    let dist = FactorNormal::<f64>::new(DynVector::zeros(d - 1), psi.clone(), w.clone(), n).unwrap();

    let scaled: Vec<f64> = w.iter().map(|x| x / n).collect();
    let expected = &(&psi * &DynMatrix::from_diag(&scaled)) * &psi.transpose();
    assert!(dist.covariance_matrix().max_abs_diff(&expected) < 1e-12);
}

#[test]
fn approximate_precision_close_for_large_d() {
    let mut rng = ChaCha8Rng::seed_from_u64(2);
    let d = 100;
    let psi = balance_basis(d, &mut rng);
    let w = inverse_probabilities(d, &mut rng);
    let dist = FactorNormal::<f64>::new(DynVector::zeros(d - 1), psi, w, 200.0).unwrap();

    let exact = dist.covariance_matrix().inverse().unwrap();
    let approx = dist.precision_matrix().unwrap();
    assert!(approx.is_symmetric(0.0));
    assert_allclose(&approx, &exact, 1.0 / (d as f64).sqrt(), 1.0);
}

#[test]
fn approximate_precision_error_shrinks_with_d() {
    let error_at = |d: usize| {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let psi = balance_basis(d, &mut rng);
        let w = inverse_probabilities(d, &mut rng);
        let dist = FactorNormal::<f64>::new(DynVector::zeros(d - 1), psi, w, 200.0).unwrap();
        let exact = dist.covariance_matrix().inverse().unwrap();
        dist.precision_matrix().unwrap().max_abs_diff(&exact)
    };
    assert!(error_at(100) < error_at(20));
}

#[test]
fn approximate_precision_exact_for_square_basis() {
    let mut rng = ChaCha8Rng::seed_from_u64(4);
    let d = 6;
    let w = inverse_probabilities(d, &mut rng);
    let dist = FactorNormal::<f64>::new(DynVector::zeros(d), square_basis(d), w, 10.0).unwrap();

    let exact = dist.covariance_matrix().cholesky().unwrap().inverse();
    assert!(dist.precision_matrix().unwrap().max_abs_diff(&exact) < 1e-9);
}

#[test]
fn dense_mode_precision_is_inverse() {
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let d = 30;
    let psi = balance_basis(d, &mut rng);
    let w = inverse_probabilities(d, &mut rng);
    let dist =
        FactorNormal::<f64>::with_settings(DynVector::zeros(d - 1), psi, w, 50.0, dense_mode()).unwrap();

    let prec = dist.precision_matrix().unwrap();
    let id = &dist.covariance_matrix() * &prec;
    assert!(id.max_abs_diff(&DynMatrix::eye(d - 1)) < 1e-9);
    assert_eq!(dist.settings().precision_mode, PrecisionMode::Dense);
}

#[test]
fn log_det_matches_dense_determinant() {
    let mut rng = ChaCha8Rng::seed_from_u64(6);
    let d = 30;
    let psi = balance_basis(d, &mut rng);
    let w = inverse_probabilities(d, &mut rng);
    let dist = FactorNormal::<f64>::new(DynVector::zeros(d - 1), psi, w, 50.0).unwrap();

    let expected = dense_log_det(&dist.covariance_matrix());
    assert!((dist.log_det().unwrap() - expected).abs() < 1e-9);
}

#[test]
fn log_prob_matches_dense_reference() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let d = 12;
    let psi = balance_basis(d, &mut rng);
    let w = inverse_probabilities(d, &mut rng);
    let loc = DynVector::from_vec((0..d - 1).map(|i| i as f64 * 0.1).collect());
    let dist = FactorNormal::<f64>::with_settings(loc.clone(), psi, w, 20.0, dense_mode()).unwrap();

    let values = gaussian_matrix(5, d - 1, &mut rng);
    let got = dist.log_prob(&values).unwrap();

    let cov = dist.covariance_matrix();
    let prec = cov.inverse().unwrap();
    let log_det = dense_log_det(&cov);
    let m = (d - 1) as f64;
    for (r, &lp) in got.iter().enumerate() {
        let diff = DynVector::from_vec((0..d - 1).map(|j| values[(r, j)] - loc[j]).collect());
        let quad = diff.dot(&(&prec * &diff));
        let expected = -0.5 * (m * (2.0 * core::f64::consts::PI).ln() + log_det + quad);
        assert!((lp - expected).abs() < 1e-8, "row {}: {} vs {}", r, lp, expected);
    }

    let one = dist.log_prob_one(&values.row(2)).unwrap();
    assert!((one - got[2]).abs() < 1e-12);
}

#[test]
fn log_prob_peaks_at_mean() {
    let mut rng = ChaCha8Rng::seed_from_u64(8);
    let d = 6;
    let w = inverse_probabilities(d, &mut rng);
    let loc = DynVector::fill(d, 1.0);
    let dist = FactorNormal::<f64>::new(loc.clone(), square_basis(d), w, 10.0).unwrap();

    let at_mean = dist.log_prob_one(&loc).unwrap();
    let away = dist.log_prob_one(&DynVector::fill(d, 1.5)).unwrap();
    assert!(at_mean > away);
    let expected = super::gaussian_log_density(0.0, dist.log_det().unwrap(), d);
    assert!((at_mean - expected).abs() < 1e-12);
}

#[test]
fn entropy_closed_form() {
    let mut rng = ChaCha8Rng::seed_from_u64(9);
    let d = 10;
    let psi = balance_basis(d, &mut rng);
    let w = inverse_probabilities(d, &mut rng);
    let dist = FactorNormal::<f64>::new(DynVector::zeros(d - 1), psi, w, 20.0).unwrap();

    let m = (d - 1) as f64;
    let expected =
        0.5 * (m * (1.0 + (2.0 * core::f64::consts::PI).ln()) + dense_log_det(&dist.covariance_matrix()));
    assert!((dist.entropy().unwrap() - expected).abs() < 1e-9);
}

#[test]
fn rsample_moments() {
    let mut rng = ChaCha8Rng::seed_from_u64(10);
    let d = 12;
    let psi = balance_basis(d, &mut rng);
    let w = inverse_probabilities(d, &mut rng);
    let dist = FactorNormal::<f64>::new(DynVector::fill(d - 1, 1.0), psi, w, 20.0).unwrap();

    let draws = dist.rsample(&[10_000], rng).into_matrix();
    assert_eq!(draws.shape(), (10_000, d - 1));
    let (mean, cov) = sample_moments(&draws);
    assert_mean_near(&mean, 1.0, &dist.covariance_matrix(), draws.nrows());
    assert_allclose(&cov, &dist.covariance_matrix(), 0.5, 0.1);
}

#[test]
fn rsample_restart_replays_draws() {
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let d = 5;
    let psi = balance_basis(d, &mut rng);
    let w = inverse_probabilities(d, &mut rng);
    let dist = FactorNormal::<f64>::new(DynVector::zeros(d - 1), psi, w, 10.0).unwrap();

    let mut samples = dist.rsample(&[2, 3], rng);
    assert_eq!(samples.len(), 6);
    assert_eq!(samples.sample_shape(), &[2, 3]);
    assert_eq!(samples.output_shape(), vec![2, 3, d - 1]);

    let snapshot = samples.clone();
    let first: Vec<DynVector<f64>> = samples.by_ref().take(4).collect();
    assert_eq!(samples.len(), 2);
    samples.restart();
    let second: Vec<DynVector<f64>> = samples.collect();
    assert_eq!(second.len(), 6);
    assert_eq!(&second[..4], &first[..]);
    assert_eq!(snapshot.collect::<Vec<_>>(), second);
}

#[test]
fn empty_sample_shape_axis_yields_nothing() {
    let mut rng = ChaCha8Rng::seed_from_u64(12);
    let psi = balance_basis(4, &mut rng);
    let dist = FactorNormal::<f64>::new(DynVector::zeros(3), psi, vec![1.0; 4], 1.0).unwrap();
    let draws = dist.rsample(&[3, 0], rng).into_matrix();
    assert_eq!(draws.shape(), (0, 3));
}

#[test]
fn reparameterize_is_affine_in_noise() {
    let d = 4;
    let loc = DynVector::from_slice(&[1.0, -2.0, 0.5, 3.0]);
    let w = vec![1.0, 4.0, 9.0, 16.0];
    let dist = FactorNormal::<f64>::new(loc.clone(), DynMatrix::eye(d), w, 1.0).unwrap();

    assert_eq!(dist.reparameterize(&[0.0; 4]).unwrap(), loc);
    let x = dist.reparameterize(&[1.0, 1.0, -1.0, 0.5]).unwrap();
    assert_eq!(x.as_slice(), &[2.0, 0.0, -2.5, 5.0]);
    assert_eq!(
        dist.reparameterize(&[0.0; 3]).unwrap_err(),
        FactorError::shape("reparameterization noise", 4, 3)
    );
}

#[test]
fn sparse_basis_input_matches_dense() {
    let mut rng = ChaCha8Rng::seed_from_u64(13);
    let d = 7;
    let psi = balance_basis(d, &mut rng);
    let (mut rows, mut cols, mut vals) = (Vec::new(), Vec::new(), Vec::new());
    for i in 0..d - 1 {
        for j in 0..d {
            if psi[(i, j)] != 0.0 {
                rows.push(i);
                cols.push(j);
                vals.push(psi[(i, j)]);
            }
        }
    }
    let coo = CooMatrix::new(rows, cols, vals, (d - 1, d)).unwrap();
    let w = inverse_probabilities(d, &mut rng);

    let from_coo = FactorNormal::<f64>::new(DynVector::zeros(d - 1), &coo, w.clone(), 15.0).unwrap();
    let from_dense = FactorNormal::<f64>::new(DynVector::zeros(d - 1), psi, w, 15.0).unwrap();
    assert_eq!(from_coo, from_dense);
}

#[test]
fn single_precision_support() {
    let h = core::f32::consts::FRAC_1_SQRT_2;
    let basis = DynMatrix::from_rows(1, 2, &[h, -h]);
    let dist = FactorNormal::new(DynVector::from_slice(&[0.0_f32]), basis, vec![2.0_f32, 2.0], 4.0_f32)
        .unwrap();
    assert!((dist.covariance_matrix()[(0, 0)] - 0.5).abs() < 1e-6);
    let draws = dist.rsample(&[4], ChaCha8Rng::seed_from_u64(0)).into_matrix();
    assert_eq!(draws.shape(), (4, 1));
}

// ======================== Weights and normalizers ========================

#[test]
fn one_row_batch_equals_vector() {
    let mut rng = ChaCha8Rng::seed_from_u64(14);
    let d = 9;
    let psi = balance_basis(d, &mut rng);
    let w = inverse_probabilities(d, &mut rng);
    let batch = DynMatrix::from_vec(1, d, w.clone());

    let single = FactorNormal::<f64>::new(DynVector::zeros(d - 1), psi.clone(), w, 25.0).unwrap();
    let batched = FactorNormal::<f64>::new(DynVector::zeros(d - 1), psi, batch, 25.0).unwrap();
    assert_eq!(single.diag_scale(), batched.diag_scale());
    assert_eq!(single.covariance_matrix(), batched.covariance_matrix());
}

#[test]
fn per_row_normalizer_averages_rows() {
    let psi = DynMatrix::eye(3);
    let weights = DynMatrix::from_rows(2, 3, &[2.0, 4.0, 6.0, 1.0, 1.0, 3.0]);
    let dist = FactorNormal::<f64>::new(DynVector::zeros(3), psi, weights, vec![2.0, 0.5]).unwrap();
    // ((2, 4, 6) / 2 + (1, 1, 3) / 0.5) / 2
    let s = dist.diag_scale();
    assert!((s[0] - 1.5).abs() < 1e-15);
    assert!((s[1] - 2.0).abs() < 1e-15);
    assert!((s[2] - 4.5).abs() < 1e-15);
}

#[test]
fn normalizer_domain() {
    let psi = DynMatrix::<f64>::eye(2);
    for n in [0.0, -1.0, f64::NAN, f64::INFINITY] {
        let err = FactorNormal::<f64>::new(DynVector::zeros(2), psi.clone(), vec![1.0, 1.0], n).unwrap_err();
        assert_eq!(err, FactorError::DomainViolation("normalizer must be positive and finite"));
    }
}

// ======================== Construction errors ========================

#[test]
fn construction_shape_errors() {
    let psi = DynMatrix::<f64>::zeros(2, 4);
    assert_eq!(
        FactorNormal::<f64>::new(DynVector::zeros(3), psi.clone(), vec![1.0; 4], 1.0).unwrap_err(),
        FactorError::shape("loc length (basis rows)", 2, 3)
    );
    assert_eq!(
        FactorNormal::<f64>::new(DynVector::zeros(2), psi.clone(), vec![1.0; 3], 1.0).unwrap_err(),
        FactorError::shape("weights length (basis columns)", 4, 3)
    );
    assert_eq!(
        FactorNormal::<f64>::new(DynVector::zeros(2), psi, DynMatrix::zeros(2, 5), 1.0).unwrap_err(),
        FactorError::shape("weights columns (basis columns)", 4, 5)
    );
    assert_eq!(
        FactorNormal::<f64>::new(DynVector::zeros(3), DynMatrix::zeros(3, 2), vec![1.0; 2], 1.0)
            .unwrap_err(),
        FactorError::shape("basis columns (at least rows)", 3, 2)
    );
    assert_eq!(
        FactorNormal::<f64>::new(DynVector::zeros(2), DynMatrix::eye(2), DynMatrix::zeros(3, 2), vec![1.0])
            .unwrap_err(),
        FactorError::shape("per-row normalizer length", 3, 1)
    );
}

#[test]
fn construction_domain_errors() {
    assert_eq!(
        FactorNormal::<f64>::new(DynVector::zeros(0), DynMatrix::zeros(0, 0), vec![], 1.0).unwrap_err(),
        FactorError::DomainViolation("basis must be non-empty")
    );
    assert_eq!(
        FactorNormal::<f64>::new(DynVector::zeros(2), DynMatrix::eye(2), DynMatrix::zeros(0, 2), 1.0)
            .unwrap_err(),
        FactorError::DomainViolation("weight batch must be non-empty")
    );
}

#[test]
fn query_shape_errors() {
    let dist = FactorNormal::<f64>::new(DynVector::zeros(3), DynMatrix::eye(3), vec![1.0; 3], 1.0).unwrap();
    assert_eq!(
        dist.log_prob(&DynMatrix::zeros(2, 4)).unwrap_err(),
        FactorError::shape("log_prob value width", 3, 4)
    );
    assert_eq!(
        dist.log_prob_one(&DynVector::zeros(2)).unwrap_err(),
        FactorError::shape("log_prob value width", 3, 2)
    );
}

#[test]
fn zero_weight_is_numerical_instability() {
    let dist = FactorNormal::<f64>::with_settings(
        DynVector::zeros(2),
        DynMatrix::eye(2),
        vec![1.0, 0.0],
        1.0,
        dense_mode(),
    )
    .unwrap();
    let expected = FactorError::NumericalInstability {
        context: "precision_matrix",
        source: LinalgError::NotPositiveDefinite,
    };
    assert_eq!(dist.precision_matrix().unwrap_err(), expected);
    assert!(matches!(
        dist.log_det().unwrap_err(),
        FactorError::NumericalInstability { context: "log_det", .. }
    ));
}

#[test]
fn zero_weight_rejected_by_approximate_precision() {
    let mut rng = ChaCha8Rng::seed_from_u64(9);
    let psi = balance_basis(5, &mut rng);
    let dist =
        FactorNormal::<f64>::new(DynVector::zeros(4), psi, vec![2.0, 2.0, 2.0, 2.0, 0.0], 1.0).unwrap();
    let expected = FactorError::DomainViolation("approximate precision needs positive finite weights");

    assert_eq!(dist.precision_matrix().unwrap_err(), expected);
    assert_eq!(dist.approximate_precision().unwrap_err(), expected);
    // The covariance itself is still positive definite.
    assert!(dist.log_det().unwrap().is_finite());
    let off_mean = DynMatrix::from_rows(1, 4, &[0.1; 4]);
    assert_eq!(dist.log_prob(&off_mean).unwrap_err(), expected);
}

#[test]
fn non_finite_value_is_numerical_instability() {
    let dist = FactorNormal::<f64>::new(DynVector::zeros(3), DynMatrix::eye(3), vec![1.0; 3], 1.0).unwrap();
    let values = DynMatrix::from_rows(2, 3, &[0.0, 0.0, 0.0, f64::NAN, 1.0, 0.0]);
    assert_eq!(
        dist.log_prob(&values).unwrap_err(),
        FactorError::NumericalInstability {
            context: "log_prob",
            source: LinalgError::NonFinite,
        }
    );
}

// ======================== FactorSumNormal ========================

fn sum_fixture(
    d: usize,
    k: usize,
    n: f64,
    settings: FactorSettings,
    seed: u64,
) -> (FactorSumNormal<f64>, ChaCha8Rng) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let psi = balance_basis(d, &mut rng);
    let w = inverse_probabilities(d, &mut rng);
    let lw = gaussian_matrix(d - 1, k, &mut rng);
    let ld = uniform_vector(k, &mut rng);
    let dist =
        FactorSumNormal::<f64>::with_settings(DynVector::fill(d - 1, 1.0), psi, w, lw, ld, n, settings)
            .unwrap();
    (dist, rng)
}

#[test]
fn sum_covariance_adds_low_rank_term() {
    let (dist, _) = sum_fixture(10, 3, 20.0, FactorSettings::default(), 20);
    let expected = &dist.base().covariance_matrix()
        + &dist
            .low_rank_factors()
            .weighted_gram(dist.low_rank_weights().as_slice());
    assert_eq!(dist.covariance_matrix(), expected);
    assert_eq!(dist.rank(), 3);
    assert_eq!(dist.noise_dim(), 13);
}

#[test]
fn sum_dense_precision_and_log_det_exact() {
    let (dist, _) = sum_fixture(20, 4, 50.0, dense_mode(), 21);
    let cov = dist.covariance_matrix();
    let exact = cov.inverse().unwrap();
    assert!(dist.precision_matrix().unwrap().max_abs_diff(&exact) < 1e-8);
    assert!((dist.log_det().unwrap() - dense_log_det(&cov)).abs() < 1e-8);
}

#[test]
fn sum_log_prob_matches_dense_reference() {
    let (dist, mut rng) = sum_fixture(12, 3, 20.0, dense_mode(), 26);
    let values = gaussian_matrix(4, 11, &mut rng);
    let got = dist.log_prob(&values).unwrap();

    let cov = dist.covariance_matrix();
    let prec = cov.inverse().unwrap();
    let log_det = dense_log_det(&cov);
    for (r, &lp) in got.iter().enumerate() {
        let diff = DynVector::from_vec((0..11).map(|j| values[(r, j)] - 1.0).collect());
        let quad = diff.dot(&(&prec * &diff));
        let expected = -0.5 * (11.0 * (2.0 * core::f64::consts::PI).ln() + log_det + quad);
        assert!((lp - expected).abs() < 1e-8, "row {}: {} vs {}", r, lp, expected);
    }
    let one = dist.log_prob_one(&values.row(1)).unwrap();
    assert!((one - got[1]).abs() < 1e-12);
}

#[test]
fn sum_approximate_precision_close_for_large_d() {
    let (dist, _) = sum_fixture(100, 4, 200.0, FactorSettings::default(), 22);
    let cov = dist.covariance_matrix();
    let exact = cov.inverse().unwrap();
    assert_allclose(&dist.precision_matrix().unwrap(), &exact, 0.1, 1.0);
    assert!((dist.log_det().unwrap() - cov.cholesky().unwrap().ln_det()).abs() < 0.1);
}

#[test]
fn sum_entropy_closed_form() {
    let (dist, _) = sum_fixture(12, 2, 20.0, dense_mode(), 23);
    let m = 11.0;
    let expected = 0.5
        * (m * (1.0 + (2.0 * core::f64::consts::PI).ln()) + dense_log_det(&dist.covariance_matrix()));
    assert!((dist.entropy().unwrap() - expected).abs() < 1e-8);
}

#[test]
fn sum_rsample_moments() {
    let (dist, rng) = sum_fixture(12, 3, 20.0, FactorSettings::default(), 24);
    let draws = dist.rsample(&[10_000], rng).into_matrix();
    let (mean, cov) = sample_moments(&draws);
    assert_mean_near(&mean, 1.0, &dist.covariance_matrix(), draws.nrows());
    assert_allclose(&cov, &dist.covariance_matrix(), 0.5, 0.1);
}

#[test]
fn zero_rank_reduces_to_factor_normal() {
    let mut rng = ChaCha8Rng::seed_from_u64(25);
    let d = 15;
    let psi = balance_basis(d, &mut rng);
    let w = inverse_probabilities(d, &mut rng);
    let base = FactorNormal::<f64>::new(DynVector::fill(d - 1, 0.5), psi, w, 40.0).unwrap();
    let sum = FactorSumNormal::<f64>::from_base(base.clone(), DynMatrix::zeros(d - 1, 0), DynVector::zeros(0))
        .unwrap();

    assert_eq!(sum.covariance_matrix(), base.covariance_matrix());
    assert_eq!(sum.precision_matrix().unwrap(), base.precision_matrix().unwrap());
    assert_eq!(sum.log_det().unwrap(), base.log_det().unwrap());
    assert_eq!(sum.entropy().unwrap(), base.entropy().unwrap());
    assert_eq!(sum.noise_dim(), base.noise_dim());

    let values = gaussian_matrix(3, d - 1, &mut rng);
    assert_eq!(sum.log_prob(&values).unwrap(), base.log_prob(&values).unwrap());
    let seed = ChaCha8Rng::seed_from_u64(26);
    assert_eq!(
        sum.rsample(&[5], seed.clone()).into_matrix(),
        base.rsample(&[5], seed).into_matrix()
    );
}

#[test]
fn sum_batched_weights() {
    let mut rng = ChaCha8Rng::seed_from_u64(27);
    let (d, k, rows) = (10, 4, 50);
    let psi = balance_basis(d, &mut rng);
    let weights = DynMatrix::from_vec(
        rows,
        d,
        (0..rows * d).map(|_| 1.0 / rng.gen_range(0.1..1.0)).collect(),
    );
    let lw = gaussian_matrix(d - 1, k, &mut rng);
    let ld = uniform_vector(k, &mut rng);

    let dist = FactorSumNormal::<f64>::new(DynVector::zeros(d - 1), psi, weights, lw, ld, 50.0).unwrap();
    let cov = dist.covariance_matrix();
    assert_eq!(cov.shape(), (d - 1, d - 1));
    assert!(cov.cholesky().is_ok());
}

#[test]
fn sum_construction_shape_errors() {
    let psi = DynMatrix::<f64>::eye(3);
    assert_eq!(
        FactorSumNormal::<f64>::new(
            DynVector::zeros(3),
            psi.clone(),
            vec![1.0; 3],
            DynMatrix::zeros(2, 2),
            DynVector::fill(2, 1.0),
            1.0,
        )
        .unwrap_err(),
        FactorError::shape("low-rank factor rows", 3, 2)
    );
    assert_eq!(
        FactorSumNormal::<f64>::new(
            DynVector::zeros(3),
            psi.clone(),
            vec![1.0; 3],
            DynMatrix::zeros(3, 2),
            DynVector::fill(3, 1.0),
            1.0,
        )
        .unwrap_err(),
        FactorError::shape("low-rank weights length (factor columns)", 2, 3)
    );
    assert_eq!(
        FactorSumNormal::<f64>::new(
            DynVector::zeros(2),
            psi,
            vec![1.0; 3],
            DynMatrix::zeros(3, 2),
            DynVector::fill(2, 1.0),
            1.0,
        )
        .unwrap_err(),
        FactorError::shape("loc length (basis rows)", 3, 2)
    );
}

#[test]
fn sum_reparameterize_uses_both_factors() {
    let dist = FactorSumNormal::<f64>::new(
        DynVector::zeros(2),
        DynMatrix::<f64>::eye(2),
        vec![4.0, 1.0],
        DynMatrix::from_rows(2, 1, &[1.0, 2.0]),
        DynVector::from_slice(&[9.0]),
        1.0,
    )
    .unwrap();
    // (2·1, 1·0) + 3·1·(1, 2)
    let x = dist.reparameterize(&[1.0, 0.0, 1.0]).unwrap();
    assert_eq!(x.as_slice(), &[5.0, 6.0]);
    assert!(dist.reparameterize(&[1.0, 0.0]).is_err());
}
