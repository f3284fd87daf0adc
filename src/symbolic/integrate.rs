use crate::symbolic::{
    Expr, Symbol, SymbolicError,
    simplify::{expand, polynomial_coeffs, simplify},
};

/// Computes an antiderivative of `expr` with respect to `var` (without integration constant).
///
/// Supported integrands are sums and constant multiples of
/// - `var^n` for any `n` independent of `var` (`ln(var)` for `n = -1`),
/// - `(a var + b)^n`, `exp(a var + b)`, `c^(a var + b)` and `ln(a var + b)`,
/// - products of the above that expand into such sums.
///
/// Anything else fails with [`SymbolicError::NotIntegrable`].
pub fn integrate(expr: &Expr, var: &Symbol) -> Result<Expr, SymbolicError> {
    let expr = simplify(expr);

    Ok(simplify(&antiderivative(&expr, var)?))
}

/// Computes the definite integral of `expr` with respect to `var` from `lower` to `upper`.
///
/// The bounds may be arbitrary expressions, including `var` itself.
pub fn integrate_definite(
    expr: &Expr,
    var: &Symbol,
    lower: &Expr,
    upper: &Expr,
) -> Result<Expr, SymbolicError> {
    let antiderivative = integrate(expr, var)?;

    Ok(simplify(
        &(antiderivative.substitute(var, upper) - antiderivative.substitute(var, lower)),
    ))
}

fn antiderivative(expr: &Expr, var: &Symbol) -> Result<Expr, SymbolicError> {
    let not_integrable = || SymbolicError::NotIntegrable {
        expr: expr.to_string(),
        var: var.to_string(),
    };

    if !expr.depends_on(var) {
        return Ok(expr.clone() * Expr::from(var.clone()));
    }

    match expr {
        Expr::Sym(_) => Ok(Expr::from(var.clone()).pow(Expr::integer(2)) / Expr::integer(2)),
        Expr::Add(terms) => Ok(Expr::Add(
            terms
                .iter()
                .map(|term| antiderivative(term, var))
                .collect::<Result<Vec<Expr>, SymbolicError>>()?,
        )),
        Expr::Mul(factors) => {
            let (dependent, constant): (Vec<&Expr>, Vec<&Expr>) =
                factors.iter().partition(|factor| factor.depends_on(var));

            let constant = Expr::Mul(constant.into_iter().cloned().collect());

            match dependent.as_slice() {
                [factor] => Ok(constant * antiderivative(factor, var)?),
                _ => {
                    let expanded = expand(expr);

                    match expanded {
                        Expr::Add(_) => antiderivative(&expanded, var),
                        _ => Err(not_integrable()),
                    }
                }
            }
        }
        Expr::Pow(base, exponent) if !exponent.depends_on(var) => {
            let (slope, _) = linear_coeffs(base, var).ok_or_else(not_integrable)?;

            match exponent.as_i32() == Some(-1) {
                true => Ok(base.as_ref().clone().ln() / slope),
                false => {
                    let raised = simplify(&(exponent.as_ref().clone() + Expr::one()));

                    Ok(base.as_ref().clone().pow(raised.clone()) / (slope * raised))
                }
            }
        }
        Expr::Pow(base, exponent) if !base.depends_on(var) => {
            let (slope, _) = linear_coeffs(exponent, var).ok_or_else(not_integrable)?;

            Ok(expr.clone() / (slope * base.as_ref().clone().ln()))
        }
        Expr::Pow(base, exponent) => match exponent.as_i32() {
            Some(power) if power > 1 => {
                let expanded = expand(&base.as_ref().clone().pow(Expr::integer(power as i64)));

                match expanded {
                    Expr::Add(_) => antiderivative(&expanded, var),
                    _ => Err(not_integrable()),
                }
            }
            _ => Err(not_integrable()),
        },
        Expr::Exp(arg) => {
            let (slope, _) = linear_coeffs(arg, var).ok_or_else(not_integrable)?;

            Ok(expr.clone() / slope)
        }
        Expr::Ln(arg) => {
            let (slope, _) = linear_coeffs(arg, var).ok_or_else(not_integrable)?;

            Ok((arg.as_ref().clone() * expr.clone() - arg.as_ref().clone()) / slope)
        }
        Expr::Num(_) | Expr::NaN => unreachable!("constants do not depend on {}", var),
    }
}

/// Returns `(a, b)` if `expr = a var + b` with `a != 0`.
fn linear_coeffs(expr: &Expr, var: &Symbol) -> Option<(Expr, Expr)> {
    let coeffs = polynomial_coeffs(expr, var)?;

    match coeffs.as_slice() {
        [intercept, slope] => Some((slope.clone(), intercept.clone())),
        _ => None,
    }
}
