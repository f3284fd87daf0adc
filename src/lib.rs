#![doc = include_str!("../README.md")]
#![deny(missing_docs)]

pub mod math;
pub mod prodef;
pub mod symbolic;

use nalgebra::{RealField, Scalar};
use num_traits::{AsPrimitive, Float, FromPrimitive, float::TotalOrder};
use prodef::ProDeFError;
use std::{
    fmt::{Debug, Display},
    iter::Sum,
};
use symbolic::SymbolicError;
use thiserror::Error;

/// Generic container type for errors.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum MassFnError<T> {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json5 error: {0}")]
    Json(#[from] serde_json5::Error),
    #[error("probability density error: {0}")]
    ProDeF(#[from] ProDeFError<T>),
    #[error("symbolic error: {0}")]
    Symbolic(#[from] SymbolicError),
}

/// A trait that describes a generic floating point numbers within the **massfn** crate. In
/// practical terms this trait is only used for the f32/f64 types.
#[allow(non_camel_case_types)]
pub trait fXX:
    'static
    + AsPrimitive<usize>
    + Copy
    + Debug
    + Default
    + Display
    + Float
    + FromPrimitive
    + RealField
    + Scalar
    + Send
    + Sum
    + for<'x> Sum<&'x Self>
    + Sync
    + TotalOrder
{
}

impl fXX for f32 {}
impl fXX for f64 {}
