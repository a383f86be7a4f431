//! Central finite differences over parameter vectors.

use crate::error::Result;

/// Step used when no other is given.
pub const DEFAULT_STEP: f64 = 0.01;

/// Approximate the gradient of `f` at `parameters`.
///
/// Component `i` is `(f(p + h e_i) - f(p - h e_i)) / 2h`. The first error
/// returned by `f` aborts the computation.
pub fn central_difference<F>(mut f: F, parameters: &[f64], step: f64) -> Result<Vec<f64>>
where
    F: FnMut(&[f64]) -> Result<f64>,
{
    let mut probe = parameters.to_vec();
    let mut gradient = Vec::with_capacity(parameters.len());
    for i in 0..parameters.len() {
        probe[i] = parameters[i] + step;
        let plus = f(&probe)?;
        probe[i] = parameters[i] - step;
        let minus = f(&probe)?;
        probe[i] = parameters[i];
        gradient.push((plus - minus) / (2.0 * step));
    }
    Ok(gradient)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MetricError;

    #[test]
    fn test_quadratic_gradient() {
        let f = |p: &[f64]| Ok(p[0] * p[0] + 3.0 * p[1]);
        let gradient = central_difference(f, &[2.0, -1.0], DEFAULT_STEP).unwrap();
        assert!((gradient[0] - 4.0).abs() < 1e-10);
        assert!((gradient[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn test_error_propagates() {
        let f = |p: &[f64]| {
            if p[0] > 0.0 {
                Err(MetricError::numeric_anomaly("positive"))
            } else {
                Ok(0.0)
            }
        };
        assert!(central_difference(f, &[0.0], DEFAULT_STEP).is_err());
    }
}
