use crate::symbolic::{Expr, Symbol};
use derive_more::Display;
use std::fmt;

/// A strict or non-strict inequality.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum Relation {
    #[display("<")]
    Lt,
    #[display("<=")]
    Le,
    #[display(">")]
    Gt,
    #[display(">=")]
    Ge,
}

impl Relation {
    /// Returns `true` if `lhs <relation> rhs` holds.
    ///
    /// Comparisons with NaN never hold.
    pub fn holds<T>(&self, lhs: T, rhs: T) -> bool
    where
        T: PartialOrd,
    {
        match self {
            Relation::Lt => lhs < rhs,
            Relation::Le => lhs <= rhs,
            Relation::Gt => lhs > rhs,
            Relation::Ge => lhs >= rhs,
        }
    }
}

/// A condition of the form `var <relation> bound`.
#[derive(Clone, Debug, Display, PartialEq)]
#[display("{var} {relation} {bound}")]
pub struct Condition {
    /// The variable on the left hand side.
    pub var: Symbol,

    /// The comparison.
    pub relation: Relation,

    /// The right hand side, which must not depend on `var`.
    pub bound: Expr,
}

impl Condition {
    /// Create the condition `var >= bound`.
    pub fn ge(var: Symbol, bound: Expr) -> Self {
        Self {
            var,
            relation: Relation::Ge,
            bound,
        }
    }

    /// Create the condition `var > bound`.
    pub fn gt(var: Symbol, bound: Expr) -> Self {
        Self {
            var,
            relation: Relation::Gt,
            bound,
        }
    }

    /// Create the condition `var <= bound`.
    pub fn le(var: Symbol, bound: Expr) -> Self {
        Self {
            var,
            relation: Relation::Le,
            bound,
        }
    }

    /// Create the condition `var < bound`.
    pub fn lt(var: Symbol, bound: Expr) -> Self {
        Self {
            var,
            relation: Relation::Lt,
            bound,
        }
    }
}

/// A piecewise expression.
///
/// The branches are tested in order and the value of the first branch whose condition holds is
/// taken, [`Piecewise::otherwise`] applies if no condition holds.
#[derive(Clone, Debug, PartialEq)]
pub struct Piecewise {
    /// Conditional branches as `(condition, value)` pairs.
    pub branches: Vec<(Condition, Expr)>,

    /// Fallback value.
    pub otherwise: Expr,
}

impl Piecewise {
    /// Create a new [`Piecewise`] expression without conditional branches.
    pub fn new(otherwise: Expr) -> Self {
        Self {
            branches: Vec::new(),
            otherwise,
        }
    }

    /// Append the branch `value if condition`.
    pub fn with_branch(mut self, condition: Condition, value: Expr) -> Self {
        self.branches.push((condition, value));
        self
    }

    /// Apply [`Expr::substitute_all`] to all conditions and values.
    pub fn substitute_all(&self, subs: &[(Symbol, Expr)]) -> Self {
        Self {
            branches: self
                .branches
                .iter()
                .map(|(condition, value)| {
                    (
                        Condition {
                            var: condition.var.clone(),
                            relation: condition.relation,
                            bound: condition.bound.substitute_all(subs),
                        },
                        value.substitute_all(subs),
                    )
                })
                .collect(),
            otherwise: self.otherwise.substitute_all(subs),
        }
    }
}

impl fmt::Display for Piecewise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Piecewise(")?;

        for (condition, value) in self.branches.iter() {
            write!(f, "({}, {}), ", value, condition)?;
        }

        write!(f, "({}, True))", self.otherwise)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn density() -> Piecewise {
        let m = Symbol::mass();

        Piecewise::new(Expr::parse("1/m").unwrap())
            .with_branch(Condition::lt(m.clone(), Expr::from(Symbol::mmin())), Expr::zero())
            .with_branch(Condition::ge(m, Expr::from(Symbol::mmax())), Expr::zero())
    }

    #[test]
    fn test_piecewise_display() {
        assert!(
            density().to_string()
                == "Piecewise((0, m < mmin), (0, m >= mmax), (m**(-1), True))"
        );
    }

    #[test]
    fn test_piecewise_substitute() {
        let pw = density().substitute_all(&[
            (Symbol::mmin(), Expr::integer(1)),
            (Symbol::mmax(), Expr::integer(10)),
        ]);

        assert!(pw.branches[0].0.bound == Expr::integer(1));
        assert!(pw.branches[1].0.bound == Expr::integer(10));
        assert!(pw.branches.iter().all(|(condition, _)| condition.var == Symbol::mass()));
        assert!(pw.otherwise == density().otherwise);
        assert!(
            pw.to_string() == "Piecewise((0, m < 1), (0, m >= 10), (m**(-1), True))"
        );
    }

    #[test]
    fn test_relation_nan() {
        assert!(!Relation::Lt.holds(f64::NAN, 0.0));
        assert!(!Relation::Ge.holds(f64::NAN, 0.0));
        assert!(Relation::Le.holds(1.0, 1.0));
        assert!(!Relation::Gt.holds(1.0, 1.0));
    }
}
