//! Symbolic expressions over a single real variable.
//!
//! This module contains the closed-form machinery that [`MassFunction1D`](crate::prodef::MassFunction1D)
//! is built on. It is not a general computer algebra system, it covers exactly what is required to
//! normalize, integrate and invert typical mass functions (power laws, broken sums of power laws,
//! exponentials and logarithms of linear arguments):
//! - [`Expr`] An expression tree with exact rational numbers and [`Symbol`]s.
//! - [`simplify`] & [`expand`] Bring expressions into a canonical form.
//! - [`integrate`] & [`integrate_definite`] Closed-form antiderivatives.
//! - [`solve`] Closed-form solutions of single variable equations.
//! - [`Piecewise`] Expressions with explicit boundary conditions.
//! - [`CompiledFn`] Numeric closures compiled from expressions, the only objects that are used at
//!   evaluation time.
//!
//! Expressions can be parsed from strings with a Python-like syntax:
//! ```
//! # use massfn::symbolic::{Expr, Symbol, integrate};
//! let salpeter = "m**-2.35".parse::<Expr>().unwrap();
//! let antiderivative = integrate(&salpeter, &Symbol::mass()).unwrap();
//!
//! assert_eq!(antiderivative.to_string(), "(-20/27)*m**(-27/20)");
//! ```

mod compile;
mod expr;
mod integrate;
mod parser;
mod piecewise;
mod simplify;
mod solve;

pub use compile::CompiledFn;
pub use expr::{Expr, Symbol};
pub use integrate::{integrate, integrate_definite};
pub use piecewise::{Condition, Piecewise, Relation};
pub use simplify::{expand, polynomial_coeffs, simplify};
pub use solve::solve;

use thiserror::Error;

/// Errors associated with the [`symbolic`](crate::symbolic) module.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum SymbolicError {
    #[error("cannot isolate {var} in {equation} = 0")]
    NoClosedForm { equation: String, var: String },
    #[error("equation {0} = 0 has no admissible solution")]
    NoSolution(String),
    #[error("cannot integrate {expr} with respect to {var} in closed form")]
    NotIntegrable { expr: String, var: String },
    #[error("expression {0} does not evaluate to a number")]
    NotNumeric(String),
    #[error("failed to parse expression at position {position}: {msg}")]
    Parse { msg: String, position: usize },
    #[error("unbound symbol {0}")]
    UnboundSymbol(String),
}
