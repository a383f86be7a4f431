//! Centered B-spline kernels and per-axis weight tables.
//!
//! `bspline(order, u)` is the centered basis function of the given order,
//! supported on `|u| < (order + 1) / 2`. The weight helpers evaluate the
//! `order + 1` basis functions that are non-zero at a continuous grid
//! coordinate.

/// Highest supported spline order.
pub const MAX_SPLINE_ORDER: usize = 3;

/// Zero-order (box-car) kernel. Half weight on the boundary.
pub fn zero_order(u: f64) -> f64 {
    let a = u.abs();
    if a < 0.5 {
        1.0
    } else if a == 0.5 {
        0.5
    } else {
        0.0
    }
}

/// Cubic B-spline kernel.
pub fn cubic(u: f64) -> f64 {
    let a = u.abs();
    if a < 1.0 {
        (4.0 - 6.0 * a * a + 3.0 * a * a * a) / 6.0
    } else if a < 2.0 {
        let t = 2.0 - a;
        t * t * t / 6.0
    } else {
        0.0
    }
}

/// Derivative of the cubic B-spline kernel.
pub fn cubic_derivative(u: f64) -> f64 {
    let a = u.abs();
    if a < 1.0 {
        u * (1.5 * a - 2.0)
    } else if a < 2.0 {
        let t = 2.0 - a;
        -0.5 * t * t * u.signum()
    } else {
        0.0
    }
}

/// Centered B-spline of order 0 to 3.
///
/// # Panics
/// If `order > MAX_SPLINE_ORDER`.
pub fn bspline(order: usize, u: f64) -> f64 {
    let a = u.abs();
    match order {
        0 => zero_order(u),
        1 => (1.0 - a).max(0.0),
        2 => {
            if a < 0.5 {
                0.75 - a * a
            } else if a < 1.5 {
                let t = 1.5 - a;
                0.5 * t * t
            } else {
                0.0
            }
        }
        3 => cubic(u),
        _ => panic!("Unsupported spline order {order}"),
    }
}

/// Derivative of the centered B-spline of order 1 to 3.
///
/// The zero-order kernel has no useful derivative and yields zero.
pub fn bspline_derivative(order: usize, u: f64) -> f64 {
    let a = u.abs();
    match order {
        0 => 0.0,
        1 => {
            if a < 1.0 && a > 0.0 {
                -u.signum()
            } else {
                0.0
            }
        }
        2 => {
            if a < 0.5 {
                -2.0 * u
            } else if a < 1.5 {
                -(1.5 - a) * u.signum()
            } else {
                0.0
            }
        }
        3 => cubic_derivative(u),
        _ => panic!("Unsupported spline order {order}"),
    }
}

/// First grid index of the `order + 1` wide support around `x`.
pub fn support_start(order: usize, x: f64) -> isize {
    (x - (order as f64 - 1.0) / 2.0).floor() as isize
}

/// Fill `out[k] = bspline(order, x - (start + k))` for `k in 0..=order`.
///
/// Returns the support start index.
pub fn weights(order: usize, x: f64, out: &mut [f64]) -> isize {
    let start = support_start(order, x);
    for (k, w) in out.iter_mut().take(order + 1).enumerate() {
        *w = bspline(order, x - (start + k as isize) as f64);
    }
    start
}

/// Like [`weights`] but for the kernel derivative with respect to `x`.
pub fn derivative_weights(order: usize, x: f64, out: &mut [f64]) -> isize {
    let start = support_start(order, x);
    for (k, w) in out.iter_mut().take(order + 1).enumerate() {
        *w = bspline_derivative(order, x - (start + k as isize) as f64);
    }
    start
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weights_partition_unity() {
        for order in 1..=MAX_SPLINE_ORDER {
            for &x in &[0.0, 0.25, 2.5, 7.9, 3.0] {
                let mut w = [0.0; 4];
                weights(order, x, &mut w);
                let sum: f64 = w[..=order].iter().sum();
                assert!((sum - 1.0).abs() < 1e-12, "order {order} x {x} sum {sum}");
            }
        }
    }

    #[test]
    fn test_derivative_weights_sum_to_zero() {
        for order in 2..=MAX_SPLINE_ORDER {
            let mut w = [0.0; 4];
            derivative_weights(order, 4.3, &mut w);
            let sum: f64 = w[..=order].iter().sum();
            assert!(sum.abs() < 1e-12);
        }
    }

    #[test]
    fn test_cubic_values() {
        assert!((cubic(0.0) - 2.0 / 3.0).abs() < 1e-15);
        assert!((cubic(1.0) - 1.0 / 6.0).abs() < 1e-15);
        assert_eq!(cubic(2.0), 0.0);
        assert_eq!(cubic(-2.5), 0.0);
    }

    #[test]
    fn test_cubic_derivative_matches_difference_quotient() {
        let h = 1e-6;
        for &u in &[-1.7, -0.6, 0.3, 1.2, 1.9] {
            let numeric = (cubic(u + h) - cubic(u - h)) / (2.0 * h);
            assert!((numeric - cubic_derivative(u)).abs() < 1e-6, "u = {u}");
        }
    }

    #[test]
    fn test_support_start() {
        assert_eq!(support_start(3, 2.3), 1);
        assert_eq!(support_start(1, 2.3), 2);
        assert_eq!(support_start(2, 2.3), 1);
        assert_eq!(support_start(0, 2.3), 2);
        assert_eq!(support_start(0, 2.7), 3);
    }

    #[test]
    fn test_zero_order_boundary() {
        assert_eq!(zero_order(0.0), 1.0);
        assert_eq!(zero_order(0.5), 0.5);
        assert_eq!(zero_order(-0.75), 0.0);
    }
}
