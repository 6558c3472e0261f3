//! Closed-form evaluation of one leaf's decoupoly implicit function.
//!
//! The function is a sum over `R` terms. Each term projects the query
//! point onto the term's basis vector and feeds the projection through a
//! degree-`K` polynomial. Polynomials and their derivatives are evaluated
//! by Horner's scheme, so no power table is materialized and the error
//! growth stays bounded at high degree.

pub use super::*;

/// `|v|_min`
///
/// Lower clamp of basis vector norms, guarding the projection against
/// degenerate geometry.
pub const BASIS_NORM_MIN: f32 = 1e-8;

/// `O_max`
///
/// Upper clamp of per-sample opacities. Keeping opacities strictly below
/// one bounds the compositing weights of the backward pass.
pub const OPACITY_MAX: f32 = 0.99;

/// Returns the implicit value and its gradient with respect to the query
/// point.
///
/// The record shape is `[R * 3 + R * K + C]`.
pub fn evaluate(
    record: &[f32],
    point: [f32; 3],
) -> (f32, [f32; 3]) {
    debug_assert_eq!(record.len(), LEAF_RECORD_SIZE);

    let mut value = 0.0f32;
    let mut point_grad = [0.0f32; 3];

    for rank in 0..DECOUPOLY_RANK {
        // v_r
        let basis = &record[rank * 3..rank * 3 + 3];
        // [K]
        let coefficients = &record
            [DECOUPOLY_V_SIZE + rank * DECOUPOLY_DEGREE..]
            [..DECOUPOLY_DEGREE];

        let norm = (basis[0] * basis[0]
            + basis[1] * basis[1]
            + basis[2] * basis[2])
            .sqrt()
            .max(BASIS_NORM_MIN);

        // s_r <- <v_r, p> / |v_r|
        let projection = (basis[0] * point[0]
            + basis[1] * point[1]
            + basis[2] * point[2])
            / norm;

        let (term, term_derivative) =
            polynomial(coefficients, projection);

        value += term;
        for axis in 0..3 {
            point_grad[axis] += term_derivative * basis[axis] / norm;
        }
    }

    (value, point_grad)
}

/// Accumulates `value_grad * d value / d record` into `record_grad` for
/// every basis and coefficient element.
///
/// Both shapes are `[R * 3 + R * K + C]`; the appearance block is not
/// touched, it has no influence on the implicit value.
pub fn evaluate_record_grad(
    record: &[f32],
    point: [f32; 3],
    value_grad: f32,
    record_grad: &mut [f32],
) {
    debug_assert_eq!(record.len(), LEAF_RECORD_SIZE);
    debug_assert_eq!(record_grad.len(), LEAF_RECORD_SIZE);

    for rank in 0..DECOUPOLY_RANK {
        let basis = &record[rank * 3..rank * 3 + 3];
        let coefficients = &record
            [DECOUPOLY_V_SIZE + rank * DECOUPOLY_DEGREE..]
            [..DECOUPOLY_DEGREE];

        let norm_raw = (basis[0] * basis[0]
            + basis[1] * basis[1]
            + basis[2] * basis[2])
            .sqrt();
        let clamped = norm_raw < BASIS_NORM_MIN;
        let norm = norm_raw.max(BASIS_NORM_MIN);

        let projection = (basis[0] * point[0]
            + basis[1] * point[1]
            + basis[2] * point[2])
            / norm;

        let (_, term_derivative) = polynomial(coefficients, projection);

        // d value / d g_rk <- s_r ^ k
        let offset = DECOUPOLY_V_SIZE + rank * DECOUPOLY_DEGREE;
        let mut projection_power = 1.0;
        for degree in 0..DECOUPOLY_DEGREE {
            record_grad[offset + degree] += value_grad * projection_power;
            projection_power *= projection;
        }

        // d value / d v_r <- f_r'(s_r) * (p - s_r * v_r / |v_r|) / |v_r|
        //
        // The second term vanishes while the norm clamp is active.
        for axis in 0..3 {
            let mut projection_grad = point[axis] / norm;
            if !clamped {
                projection_grad -= projection * basis[axis] / (norm * norm);
            }
            record_grad[rank * 3 + axis] +=
                value_grad * term_derivative * projection_grad;
        }
    }
}

/// `alpha <- O_max * sigmoid(value)`
#[inline]
pub fn opacity(value: f32) -> f32 {
    OPACITY_MAX / (1.0 + (-value).exp())
}

/// `d alpha / d value`
#[inline]
pub fn opacity_value_derivative(value: f32) -> f32 {
    let sigmoid = 1.0 / (1.0 + (-value).exp());
    OPACITY_MAX * sigmoid * (1.0 - sigmoid)
}

/// Horner evaluation of the polynomial and its derivative at `x`.
///
/// The coefficients are in ascending degree order.
#[inline]
fn polynomial(
    coefficients: &[f32],
    x: f32,
) -> (f32, f32) {
    let degree = coefficients.len();

    let mut value = coefficients[degree - 1];
    for index in (0..degree - 1).rev() {
        value = value * x + coefficients[index];
    }

    let mut derivative = coefficients[degree - 1] * (degree - 1) as f32;
    for index in (1..degree - 1).rev() {
        derivative = derivative * x + coefficients[index] * index as f32;
    }

    (value, derivative)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn random_record(seed: u64) -> Vec<f32> {
        use rand::{rngs::StdRng, Rng, SeedableRng};
        use rand_distr::StandardNormal;

        let mut rng = StdRng::seed_from_u64(seed);
        (0..LEAF_RECORD_SIZE)
            .map(|_| rng.sample::<f32, _>(StandardNormal) * 0.5)
            .collect()
    }

    #[test]
    fn zero_coefficients() {
        let mut record = vec![0.0; LEAF_RECORD_SIZE];
        // Nonzero bases alone contribute nothing.
        record[..DECOUPOLY_V_SIZE]
            .iter_mut()
            .enumerate()
            .for_each(|(index, value)| *value = index as f32 + 1.0);

        let (value, point_grad) = evaluate(&record, [0.3, -0.7, 0.1]);
        assert_eq!(value, 0.0);
        assert_eq!(point_grad, [0.0; 3]);

        let mut record_grad = vec![0.0; LEAF_RECORD_SIZE];
        evaluate_record_grad(&record, [0.3, -0.7, 0.1], 1.0, &mut record_grad);
        assert_eq!(record_grad[..DECOUPOLY_V_SIZE], vec![0.0; DECOUPOLY_V_SIZE]);
    }

    #[test]
    fn linear_single_term() {
        // One unit basis along +x and f(s) = 2 + 3 s. At p = (0.5, y, z)
        // the projection is 0.5, the value 3.5, and the point gradient
        // (3, 0, 0).
        let mut record = vec![0.0; LEAF_RECORD_SIZE];
        record[0] = 1.0;
        record[DECOUPOLY_V_SIZE] = 2.0;
        record[DECOUPOLY_V_SIZE + 1] = 3.0;

        let (value, point_grad) = evaluate(&record, [0.5, -0.25, 0.75]);
        assert!((value - 3.5).abs() < 1e-6);
        assert!((point_grad[0] - 3.0).abs() < 1e-6);
        assert!(point_grad[1].abs() < 1e-6);
        assert!(point_grad[2].abs() < 1e-6);

        let mut record_grad = vec![0.0; LEAF_RECORD_SIZE];
        evaluate_record_grad(&record, [0.5, -0.25, 0.75], 1.0, &mut record_grad);

        // d value / d g_00 = 1, d value / d g_01 = s = 0.5
        assert!((record_grad[DECOUPOLY_V_SIZE] - 1.0).abs() < 1e-6);
        assert!((record_grad[DECOUPOLY_V_SIZE + 1] - 0.5).abs() < 1e-6);

        // d value / d v_0 = f'(s) * (p - s * v) / |v| = 3 * (0, -0.25, 0.75)
        assert!(record_grad[0].abs() < 1e-5);
        assert!((record_grad[1] + 0.75).abs() < 1e-5);
        assert!((record_grad[2] - 2.25).abs() < 1e-5);
    }

    #[test]
    fn record_grad_matches_finite_differences() {
        let record = random_record(7);
        let point = [0.4, -0.2, 0.6];
        let delta = 1e-3;

        let mut record_grad = vec![0.0; LEAF_RECORD_SIZE];
        evaluate_record_grad(&record, point, 1.0, &mut record_grad);

        for index in 0..DECOUPOLY_V_SIZE + DECOUPOLY_G_SIZE {
            let mut shifted = record.to_owned();
            shifted[index] += delta;
            let (value_up, _) = evaluate(&shifted, point);
            shifted[index] -= 2.0 * delta;
            let (value_down, _) = evaluate(&shifted, point);

            let estimate = (value_up - value_down) / (2.0 * delta);
            let error = (record_grad[index] - estimate).abs();
            assert!(
                error <= 1e-3 * estimate.abs().max(1.0),
                "index {index}: analytic {} vs estimate {estimate}",
                record_grad[index],
            );
        }
    }

    #[test]
    fn point_grad_matches_finite_differences() {
        let record = random_record(11);
        let point = [0.1, 0.3, -0.5];
        let delta = 1e-3;

        let (_, point_grad) = evaluate(&record, point);

        for axis in 0..3 {
            let mut shifted = point;
            shifted[axis] += delta;
            let (value_up, _) = evaluate(&record, shifted);
            shifted[axis] -= 2.0 * delta;
            let (value_down, _) = evaluate(&record, shifted);

            let estimate = (value_up - value_down) / (2.0 * delta);
            let error = (point_grad[axis] - estimate).abs();
            assert!(error <= 1e-3 * estimate.abs().max(1.0));
        }
    }

    #[test]
    fn opacity_bounds() {
        assert!((opacity(0.0) - OPACITY_MAX / 2.0).abs() < 1e-6);
        assert!(opacity(100.0) <= OPACITY_MAX);
        assert!(opacity(-100.0) >= 0.0);

        // Derivative peaks at zero and matches finite differences there.
        let delta = 1e-3;
        let estimate = (opacity(delta) - opacity(-delta)) / (2.0 * delta);
        assert!((opacity_value_derivative(0.0) - estimate).abs() < 1e-4);
    }
}
