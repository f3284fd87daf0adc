use crate::{
    fXX,
    math::{T, exp, ln, powf, powi},
    symbolic::{Expr, Piecewise, Relation, Symbol, SymbolicError},
};
use std::{fmt, sync::Arc};

/// A numeric closure `T -> T` compiled from a symbolic expression in a single variable.
///
/// All subexpressions that do not depend on the variable are evaluated once at compile time.
/// Powers with an exponent like `1/3` are real valued roots, also for negative bases.
#[derive(Clone)]
pub struct CompiledFn<T>(Arc<dyn Fn(T) -> T + Send + Sync>);

impl<T> fmt::Debug for CompiledFn<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CompiledFn").finish_non_exhaustive()
    }
}

impl<T> CompiledFn<T>
where
    T: fXX,
{
    /// Evaluate the function at `x`.
    pub fn call(&self, x: T) -> T {
        (self.0)(x)
    }

    /// Compile a piecewise expression as function of `var`.
    ///
    /// All conditions must compare `var` against numeric bounds. Conditions never hold for a
    /// NaN argument, which therefore evaluates to the fallback value.
    ///
    /// Fails with [`SymbolicError::UnboundSymbol`] if any other symbol remains, and with
    /// [`SymbolicError::NotNumeric`] if a constant is not finite in `T`.
    pub fn from_piecewise(piecewise: &Piecewise, var: &Symbol) -> Result<Self, SymbolicError> {
        let branches = piecewise
            .branches
            .iter()
            .map(|(condition, value)| {
                if &condition.var != var {
                    return Err(SymbolicError::UnboundSymbol(condition.var.to_string()));
                }

                Ok((
                    condition.relation,
                    T!(condition.bound.evalf()?),
                    Node::<T>::compile(value, var)?,
                ))
            })
            .collect::<Result<Vec<(Relation, T, Node<T>)>, SymbolicError>>()?;

        let otherwise = Node::<T>::compile(&piecewise.otherwise, var)?;

        Ok(Self(Arc::new(move |x| {
            branches
                .iter()
                .find(|(relation, bound, _)| relation.holds(x, *bound))
                .map(|(_, _, node)| node.eval(x))
                .unwrap_or_else(|| otherwise.eval(x))
        })))
    }
}

/// Evaluation tree of a [`CompiledFn`].
enum Node<T> {
    Add(Vec<Node<T>>),
    Const(T),
    Exp(Box<Node<T>>),
    Ln(Box<Node<T>>),
    Mul(Vec<Node<T>>),
    Powf(Box<Node<T>>, Box<Node<T>>),
    Powi(Box<Node<T>>, i32),
    RealPow(Box<Node<T>>, T, bool),
    Var,
}

impl<T> Node<T>
where
    T: fXX,
{
    fn compile(expr: &Expr, var: &Symbol) -> Result<Self, SymbolicError> {
        if !expr.depends_on(var) {
            if let Some(symbol) = expr.free_symbols().into_iter().next() {
                return Err(SymbolicError::UnboundSymbol(symbol.to_string()));
            }

            if let Expr::NaN = expr {
                return Ok(Node::Const(num_traits::Float::nan()));
            }

            let value = T!(expr.evalf()?);

            if !num_traits::Float::is_finite(value) {
                return Err(SymbolicError::NotNumeric(expr.to_string()));
            }

            return Ok(Node::Const(value));
        }

        Ok(match expr {
            Expr::Sym(_) => Node::Var,
            Expr::Add(args) => Node::Add(
                args.iter()
                    .map(|arg| Self::compile(arg, var))
                    .collect::<Result<Vec<Node<T>>, SymbolicError>>()?,
            ),
            Expr::Mul(args) => Node::Mul(
                args.iter()
                    .map(|arg| Self::compile(arg, var))
                    .collect::<Result<Vec<Node<T>>, SymbolicError>>()?,
            ),
            Expr::Pow(base, exponent) => match (exponent.as_i32(), exponent.odd_root()) {
                (Some(integer), _) => Node::Powi(Box::new(Self::compile(base, var)?), integer),
                (None, Some(odd)) => Node::RealPow(
                    Box::new(Self::compile(base, var)?),
                    T!(exponent.evalf()?),
                    odd,
                ),
                (None, None) => Node::Powf(
                    Box::new(Self::compile(base, var)?),
                    Box::new(Self::compile(exponent, var)?),
                ),
            },
            Expr::Exp(arg) => Node::Exp(Box::new(Self::compile(arg, var)?)),
            Expr::Ln(arg) => Node::Ln(Box::new(Self::compile(arg, var)?)),
            Expr::Num(_) | Expr::NaN => unreachable!("constants do not depend on {}", var),
        })
    }

    fn eval(&self, x: T) -> T {
        match self {
            Node::Add(args) => args.iter().map(|arg| arg.eval(x)).sum(),
            Node::Const(value) => *value,
            Node::Exp(arg) => exp!(arg.eval(x)),
            Node::Ln(arg) => ln!(arg.eval(x)),
            Node::Mul(args) => args.iter().fold(T::one(), |acc, arg| acc * arg.eval(x)),
            Node::Powf(base, exponent) => powf!(base.eval(x), exponent.eval(x)),
            Node::Powi(base, integer) => powi!(base.eval(x), *integer),
            Node::RealPow(base, exponent, odd) => {
                let base = base.eval(x);

                match base < T::zero() {
                    true if *odd => -powf!(-base, *exponent),
                    true => powf!(-base, *exponent),
                    false => powf!(base, *exponent),
                }
            }
            Node::Var => x,
        }
    }
}
