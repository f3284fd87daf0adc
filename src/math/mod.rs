//! Numerical helper functions and routines.
//!
//! # Quadrature
//!
//! [`gauss_legendre`] integrates a scalar function over a finite interval with an adaptive,
//! bisecting five-point Gauss-Legendre rule. The rule is open, i.e. it never evaluates the
//! integrand at the interval end points, so integrands with a jump at the boundary of their
//! support (every piecewise density) are handled gracefully. It is used by the
//! moment methods of [`ContinuousDistribution`](crate::prodef::ContinuousDistribution); the
//! probability functions themselves are always derived in closed form.

mod quadrature;

pub use quadrature::gauss_legendre;

/// A shorthand for converting constants to type `T`.
macro_rules! T {
    ($value: expr) => {
        T::from_f64($value).unwrap()
    };
}

macro_rules! abs {
    ($value: expr) => {
        num_traits::Float::abs($value)
    };
}

macro_rules! exp {
    ($value: expr) => {
        num_traits::Float::exp($value)
    };
}

macro_rules! ln {
    ($value: expr) => {
        num_traits::Float::ln($value)
    };
}

macro_rules! powf {
    ($value: expr, $float: expr) => {
        num_traits::Float::powf($value, $float)
    };
}

macro_rules! powi {
    ($value: expr, $integer: expr) => {
        num_traits::Float::powi($value, $integer)
    };
}

macro_rules! sqrt {
    ($value: expr) => {
        num_traits::Float::sqrt($value)
    };
}

pub(crate) use T;
pub(crate) use abs;
pub(crate) use exp;
pub(crate) use ln;
pub(crate) use powf;
pub(crate) use powi;
pub(crate) use sqrt;
