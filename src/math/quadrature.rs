use crate::{
    fXX,
    math::{T, abs},
};

/// Nodes of the five-point Gauss-Legendre rule on `[-1, 1]`.
static GL5_NODES: [f64; 5] = [
    -0.906_179_845_938_664,
    -0.538_469_310_105_683_1,
    0.0,
    0.538_469_310_105_683_1,
    0.906_179_845_938_664,
];

/// Weights of the five-point Gauss-Legendre rule on `[-1, 1]`.
static GL5_WEIGHTS: [f64; 5] = [
    0.236_926_885_056_189_1,
    0.478_628_670_499_366_5,
    0.568_888_888_888_888_9,
    0.478_628_670_499_366_5,
    0.236_926_885_056_189_1,
];

/// Integrates `func` over `range` with an adaptive five-point Gauss-Legendre rule.
///
/// An interval is bisected until the estimate of both halves agrees with the estimate of the
/// whole interval within `tolerance`, or until `max_depth` bisections have been made. The
/// tolerance is halved on every bisection so that the total error stays bounded by `tolerance`.
pub fn gauss_legendre<T, F>(func: F, range: (T, T), tolerance: T, max_depth: usize) -> T
where
    T: fXX,
    F: Fn(T) -> T,
{
    let (minv, maxv) = range;

    if minv == maxv {
        return T::zero();
    }

    let whole = gl5_panel(&func, minv, maxv);

    bisect(&func, minv, maxv, whole, tolerance, max_depth)
}

fn bisect<T, F>(func: &F, minv: T, maxv: T, whole: T, tolerance: T, depth: usize) -> T
where
    T: fXX,
    F: Fn(T) -> T,
{
    let midv = (minv + maxv) / T!(2.0);

    let left = gl5_panel(func, minv, midv);
    let right = gl5_panel(func, midv, maxv);

    if (depth == 0) || (abs!(left + right - whole) <= tolerance) {
        return left + right;
    }

    bisect(func, minv, midv, left, tolerance / T!(2.0), depth - 1)
        + bisect(func, midv, maxv, right, tolerance / T!(2.0), depth - 1)
}

fn gl5_panel<T, F>(func: &F, minv: T, maxv: T) -> T
where
    T: fXX,
    F: Fn(T) -> T,
{
    let half_width = (maxv - minv) / T!(2.0);
    let center = (maxv + minv) / T!(2.0);

    GL5_NODES
        .iter()
        .zip(GL5_WEIGHTS.iter())
        .map(|(node, weight)| T!(*weight) * func(center + half_width * T!(*node)))
        .sum::<T>()
        * half_width
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::relative_eq;

    #[test]
    fn test_gauss_legendre_polynomial() {
        // Exact for polynomials up to degree nine on a single panel.
        let value = gauss_legendre(|x: f64| x.powi(9) - 3.0 * x.powi(2), (0.0, 2.0), 1e-12, 20);

        assert!(relative_eq!(value, 102.4 - 8.0, max_relative = 1e-12));
    }

    #[test]
    fn test_gauss_legendre_jump() {
        // A density with a jump at the upper end point is integrated without evaluating it.
        let step = |x: f64| if x >= 10.0 { 0.0 } else { 1.0 / (x * 10.0f64.ln()) };

        let value = gauss_legendre(step, (1.0, 10.0), 1e-12, 40);

        assert!(relative_eq!(value, 1.0, max_relative = 1e-9));
    }

    #[test]
    fn test_gauss_legendre_empty() {
        assert!(gauss_legendre(|x: f32| x, (1.0, 1.0), 1e-6, 10) == 0.0);
    }
}
