use crate::symbolic::{Expr, Symbol};
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};
use std::collections::BTreeMap;

/// Upper limit for the number of bottom-up simplification passes.
const MAX_PASSES: usize = 32;

/// Largest integer exponent that is folded into an exact number.
const MAX_EXACT_EXPONENT: i32 = 64;

/// Largest integer power of a sum that is expanded by [`expand`].
const MAX_EXPANDED_POWER: i32 = 6;

/// Brings an expression into canonical form.
///
/// Numbers are folded exactly, sums and products are flattened and sorted, like terms and like
/// bases are collected. The power and logarithm identities `(x^a)^b = x^(ab)`, `(xy)^a = x^a y^a`
/// and `ln(x^a) = a ln(x)` are only applied to arguments that are known to be positive.
pub fn simplify(expr: &Expr) -> Expr {
    let mut current = expr.clone();

    for _ in 0..MAX_PASSES {
        let next = simplify_pass(&current);

        if next == current {
            break;
        }

        current = next;
    }

    current
}

/// Distributes products over sums and expands small positive integer powers of sums.
///
/// Negative powers of sums (i.e. denominators) are left untouched.
pub fn expand(expr: &Expr) -> Expr {
    simplify(&distribute(&simplify(expr)))
}

fn distribute(expr: &Expr) -> Expr {
    match expr {
        Expr::Add(args) => Expr::Add(args.iter().flat_map(|arg| terms_of(distribute(arg))).collect()),
        Expr::Mul(args) => distribute_product(args.iter().map(distribute).collect()),
        Expr::Pow(base, exponent) => match (base.as_ref(), exponent.as_i32()) {
            (Expr::Add(_), Some(power)) if (2..=MAX_EXPANDED_POWER).contains(&power) => {
                distribute_product(vec![distribute(base); power as usize])
            }
            _ => expr.clone(),
        },
        _ => expr.clone(),
    }
}

fn distribute_product(factors: Vec<Expr>) -> Expr {
    let mut products: Vec<Vec<Expr>> = vec![Vec::new()];

    for factor in factors {
        let terms = terms_of(factor);
        let mut next = Vec::with_capacity(products.len() * terms.len());

        for product in products.iter() {
            for term in terms.iter() {
                let mut product = product.clone();

                product.push(term.clone());
                next.push(product);
            }
        }

        products = next;
    }

    Expr::Add(products.into_iter().map(Expr::Mul).collect())
}

/// Returns the (flattened) terms of a sum, or the expression itself.
fn terms_of(expr: Expr) -> Vec<Expr> {
    match expr {
        Expr::Add(terms) => terms.into_iter().flat_map(terms_of).collect(),
        other => vec![other],
    }
}

/// Returns the coefficients `c_k` of `expr = c_0 + c_1 var + c_2 var^2 + ...`, or `None` if
/// `expr` is not a polynomial in `var`.
///
/// The coefficients may be arbitrary expressions that do not contain `var`.
pub fn polynomial_coeffs(expr: &Expr, var: &Symbol) -> Option<Vec<Expr>> {
    let terms = match expand(expr) {
        Expr::Add(terms) => terms,
        other => vec![other],
    };

    let mut coeffs: Vec<Vec<Expr>> = Vec::new();

    for term in terms {
        let factors = match term {
            Expr::Mul(factors) => factors,
            other => vec![other],
        };

        let mut degree = 0;
        let mut coeff = Vec::new();

        for factor in factors {
            if !factor.depends_on(var) {
                coeff.push(factor);
                continue;
            }

            match &factor {
                Expr::Sym(symbol) if symbol == var => degree += 1,
                Expr::Pow(base, exponent) if base.as_ref() == &Expr::Sym(var.clone()) => {
                    match exponent.as_i32() {
                        Some(power) if power > 0 => degree += power as usize,
                        _ => return None,
                    }
                }
                _ => return None,
            }
        }

        if coeffs.len() <= degree {
            coeffs.resize(degree + 1, Vec::new());
        }

        coeffs[degree].push(Expr::Mul(coeff));
    }

    let mut coeffs = coeffs
        .into_iter()
        .map(|terms| simplify(&Expr::Add(terms)))
        .collect::<Vec<Expr>>();

    while coeffs.last().is_some_and(|coeff| coeff.is_zero()) {
        coeffs.pop();
    }

    Some(coeffs)
}

fn simplify_pass(expr: &Expr) -> Expr {
    match expr {
        Expr::Num(_) | Expr::Sym(_) | Expr::NaN => expr.clone(),
        Expr::Add(args) => simplify_add(args.iter().map(simplify_pass).collect()),
        Expr::Mul(args) => simplify_mul(args.iter().map(simplify_pass).collect()),
        Expr::Pow(base, exponent) => simplify_pow(simplify_pass(base), simplify_pass(exponent)),
        Expr::Exp(arg) => simplify_exp(simplify_pass(arg)),
        Expr::Ln(arg) => simplify_ln(simplify_pass(arg)),
    }
}

/// Splits a term into its numeric coefficient and the remaining product.
fn split_coeff(term: Expr) -> (BigRational, Expr) {
    match term {
        Expr::Mul(mut factors) if matches!(factors.first(), Some(Expr::Num(_))) => {
            let coeff = match factors.remove(0) {
                Expr::Num(value) => value,
                _ => unreachable!(),
            };

            match factors.len() {
                0 => (coeff, Expr::one()),
                1 => (coeff, factors.remove(0)),
                _ => (coeff, Expr::Mul(factors)),
            }
        }
        other => (BigRational::one(), other),
    }
}

fn simplify_add(args: Vec<Expr>) -> Expr {
    let mut constant = BigRational::zero();
    let mut terms: BTreeMap<Expr, BigRational> = BTreeMap::new();

    let mut stack = args;

    while let Some(arg) = stack.pop() {
        match arg {
            Expr::NaN => return Expr::NaN,
            Expr::Num(value) => constant += value,
            Expr::Add(inner) => stack.extend(inner),
            other => {
                let (coeff, rest) = split_coeff(other);

                *terms.entry(rest).or_insert_with(BigRational::zero) += coeff;
            }
        }
    }

    let mut out = Vec::new();

    if !constant.is_zero() {
        out.push(Expr::Num(constant));
    }

    for (rest, coeff) in terms {
        if coeff.is_zero() {
            continue;
        }

        match coeff.is_one() {
            true => out.push(rest),
            false => out.push(simplify_mul(vec![Expr::Num(coeff), rest])),
        }
    }

    out.sort();

    match out.len() {
        0 => Expr::zero(),
        1 => out.remove(0),
        _ => Expr::Add(out),
    }
}

fn simplify_mul(args: Vec<Expr>) -> Expr {
    let mut coeff = BigRational::one();
    let mut powers: BTreeMap<Expr, Vec<Expr>> = BTreeMap::new();
    let mut exp_args = Vec::new();

    let mut stack = args;

    while let Some(arg) = stack.pop() {
        match arg {
            Expr::NaN => return Expr::NaN,
            Expr::Num(value) => coeff *= value,
            Expr::Mul(inner) => stack.extend(inner),
            Expr::Exp(arg) => exp_args.push(*arg),
            Expr::Pow(base, exponent) => powers.entry(*base).or_default().push(*exponent),
            other => powers.entry(other).or_default().push(Expr::one()),
        }
    }

    if coeff.is_zero() {
        return Expr::zero();
    }

    let mut factors = Vec::new();

    let mut push_factor = |factor: Expr, coeff: &mut BigRational| match factor {
        Expr::Num(value) => *coeff *= value,
        Expr::Mul(inner) => inner.into_iter().for_each(|inner| match inner {
            Expr::Num(value) => *coeff *= value,
            other => factors.push(other),
        }),
        other => factors.push(other),
    };

    for (base, exponents) in powers {
        push_factor(simplify_pow(base, simplify_add(exponents)), &mut coeff);
    }

    if !exp_args.is_empty() {
        push_factor(simplify_exp(simplify_add(exp_args)), &mut coeff);
    }

    if coeff.is_zero() {
        return Expr::zero();
    }

    if !coeff.is_one() {
        factors.push(Expr::Num(coeff));
    }

    factors.sort();

    match factors.len() {
        0 => Expr::one(),
        1 => factors.remove(0),
        _ => Expr::Mul(factors),
    }
}

fn simplify_pow(base: Expr, exponent: Expr) -> Expr {
    if matches!(base, Expr::NaN) || matches!(exponent, Expr::NaN) {
        return Expr::NaN;
    }

    if exponent.is_zero() || base.is_one() {
        return Expr::one();
    }

    if exponent.is_one() {
        return base;
    }

    let integer = exponent.as_i32();

    match base {
        Expr::Num(value) => match integer {
            Some(power)
                if (power.abs() <= MAX_EXACT_EXPONENT) && !(value.is_zero() && power < 0) =>
            {
                Expr::Num(value.pow(power))
            }
            _ if value.is_zero() && exponent.as_rational().is_some_and(|e| e.is_positive()) => {
                Expr::zero()
            }
            _ if value.is_positive() => match exponent
                .as_rational()
                .and_then(|exponent| exact_root(&value, exponent))
            {
                Some(root) => Expr::Num(root),
                None => Expr::Pow(Box::new(Expr::Num(value)), Box::new(exponent)),
            },
            _ if value.is_negative() => match (
                exponent.odd_root(),
                exponent
                    .as_rational()
                    .and_then(|exponent| exact_root(&-value.clone(), exponent)),
            ) {
                (Some(true), Some(root)) => Expr::Num(-root),
                (Some(false), Some(root)) => Expr::Num(root),
                _ => Expr::Pow(Box::new(Expr::Num(value)), Box::new(exponent)),
            },
            _ => Expr::Pow(Box::new(Expr::Num(value)), Box::new(exponent)),
        },
        Expr::Pow(inner, inner_exponent) if integer.is_some() || inner.is_positive() => {
            simplify_pow(*inner, simplify_mul(vec![*inner_exponent, exponent]))
        }
        Expr::Mul(factors)
            if integer.is_some() || factors.iter().all(|factor| factor.is_positive()) =>
        {
            simplify_mul(
                factors
                    .into_iter()
                    .map(|factor| simplify_pow(factor, exponent.clone()))
                    .collect(),
            )
        }
        Expr::Exp(arg) => simplify_exp(simplify_mul(vec![*arg, exponent])),
        other => Expr::Pow(Box::new(other), Box::new(exponent)),
    }
}

/// Returns `value^exponent` if the result is rational, e.g. `4^(-1/2) = 1/2`.
fn exact_root(value: &BigRational, exponent: &BigRational) -> Option<BigRational> {
    let degree = exponent.denom().to_u32().filter(|degree| *degree <= 64)?;
    let power = exponent
        .numer()
        .to_i32()
        .filter(|power| power.abs() <= MAX_EXACT_EXPONENT)?;

    let numer = value.numer().nth_root(degree);
    let denom = value.denom().nth_root(degree);

    match (&numer.pow(degree) == value.numer()) && (&denom.pow(degree) == value.denom()) {
        true => Some(BigRational::new(numer, denom).pow(power)),
        false => None,
    }
}

fn simplify_exp(arg: Expr) -> Expr {
    match arg {
        Expr::NaN => Expr::NaN,
        _ if arg.is_zero() => Expr::one(),
        Expr::Ln(inner) => *inner,
        Expr::Mul(_) => match ln_factor(&arg) {
            Some((inner, coeff)) => simplify_pow(inner, coeff),
            None => Expr::Exp(Box::new(arg)),
        },
        Expr::Add(terms) => {
            let mut factors = Vec::new();
            let mut rest = Vec::new();

            for term in terms {
                match ln_factor(&term) {
                    Some((inner, coeff)) => factors.push(simplify_pow(inner, coeff)),
                    None => rest.push(term),
                }
            }

            if factors.is_empty() {
                return Expr::Exp(Box::new(simplify_add(rest)));
            }

            match rest.is_empty() {
                true => simplify_mul(factors),
                false => {
                    factors.push(Expr::Exp(Box::new(simplify_add(rest))));
                    simplify_mul(factors)
                }
            }
        }
        other => Expr::Exp(Box::new(other)),
    }
}

/// Matches `c * ln(x)` and returns `(x, c)`.
fn ln_factor(term: &Expr) -> Option<(Expr, Expr)> {
    match term {
        Expr::Ln(inner) => Some((*inner.clone(), Expr::one())),
        Expr::Mul(factors) => {
            let mut logs = factors
                .iter()
                .enumerate()
                .filter(|(_, factor)| matches!(factor, Expr::Ln(_)));

            match (logs.next(), logs.next()) {
                (Some((idx, Expr::Ln(inner))), None) => {
                    let rest = factors
                        .iter()
                        .enumerate()
                        .filter(|(jdx, _)| *jdx != idx)
                        .map(|(_, factor)| factor.clone())
                        .collect::<Vec<Expr>>();

                    Some((*inner.clone(), simplify_mul(rest)))
                }
                _ => None,
            }
        }
        _ => None,
    }
}

fn simplify_ln(arg: Expr) -> Expr {
    match arg {
        Expr::NaN => Expr::NaN,
        _ if arg.is_one() => Expr::zero(),
        Expr::Exp(inner) => *inner,
        Expr::Num(value) if value.is_positive() && !value.is_integer() => {
            let numer = Expr::Num(BigRational::from_integer(value.numer().clone()));
            let denom = Expr::Num(BigRational::from_integer(value.denom().clone()));

            simplify_add(vec![
                simplify_ln(numer),
                simplify_mul(vec![Expr::integer(-1), simplify_ln(denom)]),
            ])
        }
        Expr::Pow(base, exponent) if base.is_positive() => {
            simplify_mul(vec![*exponent, simplify_ln(*base)])
        }
        Expr::Mul(factors) if factors.iter().all(|factor| factor.is_positive()) => {
            simplify_add(factors.into_iter().map(simplify_ln).collect())
        }
        other => Expr::Ln(Box::new(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m() -> Expr {
        Expr::from(Symbol::mass())
    }

    #[test]
    fn test_simplify_numbers() {
        let expr = Expr::rational(1, 2) + Expr::rational(1, 3) * Expr::integer(3);

        assert!(simplify(&expr) == Expr::rational(3, 2));
        assert!(simplify(&(Expr::integer(2).pow(Expr::integer(-3)))) == Expr::rational(1, 8));
        assert!(simplify(&(Expr::integer(0) * Expr::NaN)) == Expr::NaN);
        assert!(simplify(&(Expr::integer(0) * m())) == Expr::zero());
        assert!(simplify(&(Expr::rational(9, 4).pow(Expr::rational(-3, 2)))) == Expr::rational(8, 27));
        assert!(simplify(&(Expr::integer(2).sqrt())) == Expr::integer(2).sqrt());
        assert!(simplify(&(Expr::integer(-8).pow(Expr::rational(1, 3)))) == Expr::integer(-2));
        assert!(simplify(&(Expr::integer(-8).pow(Expr::rational(-2, 3)))) == Expr::rational(1, 4));
        assert!(simplify(&(Expr::integer(-4).sqrt())) == Expr::integer(-4).sqrt());
    }

    #[test]
    fn test_simplify_like_terms() {
        let expr = m() + m() * Expr::integer(2) - m().pow(Expr::integer(2)) + m() * m();

        assert!(simplify(&expr) == simplify(&(Expr::integer(3) * m())));

        let expr = m().pow(Expr::rational(-47, 20)) * m() / m().pow(Expr::integer(2));

        assert!(simplify(&expr) == m().pow(Expr::rational(-67, 20)));
    }

    #[test]
    fn test_simplify_positive_identities() {
        let expr = m().pow(Expr::integer(4)).pow(Expr::rational(1, 2));

        assert!(simplify(&expr) == m().pow(Expr::integer(2)));

        let expr = (Expr::integer(3) * m()).pow(Expr::rational(1, 2));

        assert!(
            simplify(&expr) == simplify(&(Expr::integer(3).sqrt() * m().pow(Expr::rational(1, 2))))
        );

        // q is not assumed to be positive.
        let q = Expr::from(Symbol::quantile());
        let expr = q.clone().pow(Expr::integer(2)).pow(Expr::rational(1, 2));

        assert!(simplify(&expr) == expr);
    }

    #[test]
    fn test_simplify_exp_ln() {
        assert!(simplify(&m().ln().exp()) == m());
        assert!(simplify(&m().exp().ln()) == m());
        assert!(simplify(&Expr::one().ln()) == Expr::zero());
        assert!(
            simplify(&(m().pow(Expr::rational(-27, 20)).ln()))
                == simplify(&(Expr::rational(-27, 20) * m().ln()))
        );
        assert!(
            simplify(&((Expr::integer(2) * Expr::integer(10).ln()).exp())) == Expr::integer(100)
        );
        assert!(simplify(&(Expr::rational(1, 10).ln())) == simplify(&-Expr::integer(10).ln()));

        let q = Expr::from(Symbol::quantile());
        let expr = (q.clone() * Expr::integer(10).ln() + Expr::integer(2).ln()).exp();

        assert!(
            simplify(&expr) == simplify(&(Expr::integer(2) * Expr::integer(10).pow(q.clone())))
        );
    }

    #[test]
    fn test_expand() {
        let expr = (m() + Expr::one()).pow(Expr::integer(2));
        let expanded = expand(&expr);

        assert!(
            expanded
                == simplify(&(m().pow(Expr::integer(2)) + Expr::integer(2) * m() + Expr::one()))
        );
    }

    #[test]
    fn test_polynomial_coeffs() {
        let mmin = Expr::from(Symbol::mmin());
        let expr = m() * (m() + mmin.clone()) - Expr::integer(3);
        let coeffs = polynomial_coeffs(&expr, &Symbol::mass()).unwrap();

        assert!(coeffs.len() == 3);
        assert!(coeffs[0] == Expr::integer(-3));
        assert!(coeffs[1] == mmin);
        assert!(coeffs[2] == Expr::one());

        assert!(polynomial_coeffs(&m().ln(), &Symbol::mass()).is_none());
        assert!(polynomial_coeffs(&m().pow(Expr::rational(1, 2)), &Symbol::mass()).is_none());
    }
}
