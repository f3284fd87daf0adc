use crate::symbolic::{
    Expr, Symbol, SymbolicError,
    simplify::{expand, polynomial_coeffs, simplify},
};

/// Solves `lhs = rhs` for `var` and returns all closed-form solution branches.
///
/// Polynomials of degree one and two are solved directly, anything else is inverted by
/// peeling off the operations that wrap the single occurrence of `var`. An even power
/// yields two branches unless its base is known to be positive.
///
/// Returns an empty vector if the equation does not depend on `var`, and
/// [`SymbolicError::NoClosedForm`] if `var` cannot be isolated.
pub fn solve(lhs: &Expr, rhs: &Expr, var: &Symbol) -> Result<Vec<Expr>, SymbolicError> {
    let equation = simplify(&(lhs.clone() - rhs.clone()));

    if !equation.depends_on(var) {
        return Ok(Vec::new());
    }

    let no_closed_form = || SymbolicError::NoClosedForm {
        equation: equation.to_string(),
        var: var.to_string(),
    };

    if let Some(roots) = solve_polynomial(&equation, var) {
        return Ok(roots);
    }

    let solutions = isolate(&equation, Expr::zero(), var).ok_or_else(no_closed_form)?;

    Ok(solutions.iter().map(simplify).collect())
}

/// Solves `equation = 0` if it is a polynomial of degree one or two in `var`.
fn solve_polynomial(equation: &Expr, var: &Symbol) -> Option<Vec<Expr>> {
    let coeffs = polynomial_coeffs(equation, var)?;

    match coeffs.as_slice() {
        [c0, c1] => Some(vec![simplify(&(-c0.clone() / c1.clone()))]),
        [c0, c1, c2] => {
            let discriminant = c1.clone().pow(Expr::integer(2))
                - Expr::integer(4) * c2.clone() * c0.clone();
            let root = discriminant.sqrt();
            let denom = Expr::integer(2) * c2.clone();

            Some(vec![
                simplify(&((-c1.clone() + root.clone()) / denom.clone())),
                simplify(&((-c1.clone() - root) / denom)),
            ])
        }
        _ => None,
    }
}

/// Inverts `target = rhs` where `target` depends on `var` and `rhs` does not.
fn isolate(target: &Expr, rhs: Expr, var: &Symbol) -> Option<Vec<Expr>> {
    match target {
        Expr::Sym(symbol) if symbol == var => Some(vec![rhs]),
        Expr::Add(terms) => {
            let (dependent, constant): (Vec<&Expr>, Vec<&Expr>) =
                terms.iter().partition(|term| term.depends_on(var));

            let rhs = rhs - Expr::Add(constant.into_iter().cloned().collect());

            match dependent.as_slice() {
                [term] => isolate(term, simplify(&rhs), var),
                _ => solve_polynomial(&simplify(&(target.clone() - rhs)), var),
            }
        }
        Expr::Mul(factors) => {
            let (dependent, constant): (Vec<&Expr>, Vec<&Expr>) =
                factors.iter().partition(|factor| factor.depends_on(var));

            let rhs = rhs / Expr::Mul(constant.into_iter().cloned().collect());

            match dependent.as_slice() {
                [factor] => isolate(factor, simplify(&rhs), var),
                _ => solve_polynomial(&expand(&(target.clone() - rhs)), var),
            }
        }
        Expr::Pow(base, exponent) if !exponent.depends_on(var) => {
            let inverse = simplify(&(Expr::one() / exponent.as_ref().clone()));
            let root = simplify(&rhs.pow(inverse));

            let branches = match exponent.as_i32() {
                Some(power) if power % 2 == 0 && !base.is_positive() => {
                    vec![root.clone(), simplify(&-root)]
                }
                _ => vec![root],
            };

            let mut solutions = Vec::new();

            for branch in branches {
                solutions.extend(isolate(base, branch, var)?);
            }

            Some(solutions)
        }
        Expr::Pow(base, exponent) if !base.depends_on(var) => isolate(
            exponent,
            simplify(&(rhs.ln() / base.as_ref().clone().ln())),
            var,
        ),
        Expr::Exp(arg) => isolate(arg, simplify(&rhs.ln()), var),
        Expr::Ln(arg) => isolate(arg, simplify(&rhs.exp()), var),
        _ => None,
    }
}
