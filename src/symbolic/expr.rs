use crate::{fXX, symbolic::SymbolicError};
use derive_more::Display;
use itertools::Itertools;
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};
use std::{
    collections::BTreeSet,
    fmt::{self, Formatter},
    ops::{Add, Div, Mul, Neg, Sub},
};

/// A named symbol with an optional positivity assumption.
///
/// Positivity enables the power and logarithm identities of
/// [`simplify`](crate::symbolic::simplify) that only hold for positive real arguments.
#[derive(Clone, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[display("{name}")]
pub struct Symbol {
    name: String,
    positive: bool,
}

impl Symbol {
    /// Create a new [`Symbol`].
    pub fn new(name: impl Into<String>, positive: bool) -> Self {
        Self {
            name: name.into(),
            positive,
        }
    }

    /// Create a symbol from its name, with the positivity assumption of the well-known symbols
    /// `m`, `mmin` and `mmax`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "m" => Self::mass(),
            "mmin" => Self::mmin(),
            "mmax" => Self::mmax(),
            _ => Self::new(name, false),
        }
    }

    /// Returns `true` if the symbol is assumed to be strictly positive.
    pub fn is_positive(&self) -> bool {
        self.positive
    }

    /// The mass symbol `m`.
    pub fn mass() -> Self {
        Self::new("m", true)
    }

    /// The upper mass bound symbol `mmax`.
    pub fn mmax() -> Self {
        Self::new("mmax", true)
    }

    /// The lower mass bound symbol `mmin`.
    pub fn mmin() -> Self {
        Self::new("mmin", true)
    }

    /// The name of the symbol.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The probability symbol `q` of quantile functions.
    pub fn quantile() -> Self {
        Self::new("q", false)
    }
}

/// A symbolic expression.
///
/// Subtraction is represented as addition of a term multiplied by `-1`, division as
/// multiplication with a power of `-1`. The operator implementations build unsimplified trees,
/// use [`simplify`](crate::symbolic::simplify) to bring them into canonical form.
#[allow(missing_docs)]
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Expr {
    Num(BigRational),
    Sym(Symbol),
    Add(Vec<Expr>),
    Mul(Vec<Expr>),
    Pow(Box<Expr>, Box<Expr>),
    Exp(Box<Expr>),
    Ln(Box<Expr>),
    NaN,
}

impl Expr {
    /// Returns a reference to the exact value, if `self` is a number.
    pub fn as_rational(&self) -> Option<&BigRational> {
        match self {
            Expr::Num(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the value as `i32`, if `self` is an integer number that fits.
    pub fn as_i32(&self) -> Option<i32> {
        self.as_rational()
            .filter(|value| value.is_integer())
            .and_then(|value| value.to_integer().to_i32())
    }

    /// Returns `Some(odd)` if `self` is a fraction with an odd denominator, where `odd` is the
    /// parity of the numerator.
    ///
    /// Powers with such exponents are real for negative bases, `(-8)**(1/3) = -2` and
    /// `(-8)**(2/3) = 4`.
    pub fn odd_root(&self) -> Option<bool> {
        let value = self.as_rational().filter(|value| !value.is_integer())?;
        let two = BigInt::from(2);

        match (value.denom() % &two).is_zero() {
            true => None,
            false => Some(!(value.numer() % &two).is_zero()),
        }
    }

    /// Returns `true` if `self` contains the symbol `var`.
    pub fn depends_on(&self, var: &Symbol) -> bool {
        match self {
            Expr::Num(_) | Expr::NaN => false,
            Expr::Sym(symbol) => symbol == var,
            Expr::Add(args) | Expr::Mul(args) => args.iter().any(|arg| arg.depends_on(var)),
            Expr::Pow(base, exponent) => base.depends_on(var) || exponent.depends_on(var),
            Expr::Exp(arg) | Expr::Ln(arg) => arg.depends_on(var),
        }
    }

    /// Evaluates a closed-form expression as `f64`.
    ///
    /// Fails if the expression still contains a symbol.
    pub fn evalf(&self) -> Result<f64, SymbolicError> {
        Ok(match self {
            Expr::Num(value) => value
                .to_f64()
                .ok_or_else(|| SymbolicError::NotNumeric(self.to_string()))?,
            Expr::Sym(symbol) => return Err(SymbolicError::UnboundSymbol(symbol.to_string())),
            Expr::Add(args) => args
                .iter()
                .map(|arg| arg.evalf())
                .sum::<Result<f64, SymbolicError>>()?,
            Expr::Mul(args) => args
                .iter()
                .map(|arg| arg.evalf())
                .product::<Result<f64, SymbolicError>>()?,
            Expr::Pow(base, exponent) => match (exponent.as_i32(), exponent.odd_root()) {
                (Some(integer), _) => base.evalf()?.powi(integer),
                (None, Some(odd)) => {
                    let (base, exponent) = (base.evalf()?, exponent.evalf()?);

                    match base < 0.0 {
                        true if odd => -(-base).powf(exponent),
                        true => (-base).powf(exponent),
                        false => base.powf(exponent),
                    }
                }
                (None, None) => base.evalf()?.powf(exponent.evalf()?),
            },
            Expr::Exp(arg) => arg.evalf()?.exp(),
            Expr::Ln(arg) => arg.evalf()?.ln(),
            Expr::NaN => f64::NAN,
        })
    }

    /// Returns `exp(self)`.
    pub fn exp(self) -> Expr {
        Expr::Exp(Box::new(self))
    }

    /// Create an exact number from a floating point value.
    ///
    /// The shortest decimal representation that round-trips to `value` is converted exactly,
    /// e.g. `0.1` becomes `1/10` and not the nearest binary fraction.
    pub fn from_float<T>(value: T) -> Result<Expr, SymbolicError>
    where
        T: fXX,
    {
        if !num_traits::Float::is_finite(value) {
            return Err(SymbolicError::NotNumeric(value.to_string()));
        }

        parse_decimal(&value.to_string())
            .map(Expr::Num)
            .ok_or_else(|| SymbolicError::NotNumeric(value.to_string()))
    }

    /// Returns the set of all symbols in `self`.
    pub fn free_symbols(&self) -> BTreeSet<Symbol> {
        let mut symbols = BTreeSet::new();

        self.collect_symbols(&mut symbols);

        symbols
    }

    fn collect_symbols(&self, symbols: &mut BTreeSet<Symbol>) {
        match self {
            Expr::Num(_) | Expr::NaN => (),
            Expr::Sym(symbol) => {
                symbols.insert(symbol.clone());
            }
            Expr::Add(args) | Expr::Mul(args) => {
                args.iter().for_each(|arg| arg.collect_symbols(symbols))
            }
            Expr::Pow(base, exponent) => {
                base.collect_symbols(symbols);
                exponent.collect_symbols(symbols);
            }
            Expr::Exp(arg) | Expr::Ln(arg) => arg.collect_symbols(symbols),
        }
    }

    /// Create an integer number.
    pub fn integer(value: i64) -> Expr {
        Expr::Num(BigRational::from_integer(BigInt::from(value)))
    }

    /// Returns `true` if `self` is the number one.
    pub fn is_one(&self) -> bool {
        self.as_rational().is_some_and(|value| value.is_one())
    }

    /// Returns `true` if `self` is known to be strictly positive under the positivity
    /// assumptions of its symbols.
    pub fn is_positive(&self) -> bool {
        match self {
            Expr::Num(value) => value.is_positive(),
            Expr::Sym(symbol) => symbol.is_positive(),
            Expr::Add(args) | Expr::Mul(args) => args.iter().all(|arg| arg.is_positive()),
            Expr::Pow(base, _) => base.is_positive(),
            Expr::Exp(_) => true,
            Expr::Ln(arg) => arg
                .as_rational()
                .is_some_and(|value| value > &BigRational::one()),
            Expr::NaN => false,
        }
    }

    /// Returns `true` if `self` is the number zero.
    pub fn is_zero(&self) -> bool {
        self.as_rational().is_some_and(|value| value.is_zero())
    }

    /// Returns `ln(self)`.
    pub fn ln(self) -> Expr {
        Expr::Ln(Box::new(self))
    }

    /// Returns the number one.
    pub fn one() -> Expr {
        Expr::Num(BigRational::one())
    }

    /// Parse and simplify an expression, see [`FromStr`](std::str::FromStr) for the syntax.
    pub fn parse(source: &str) -> Result<Expr, SymbolicError> {
        source.parse()
    }

    /// Returns `self ** exponent`.
    pub fn pow(self, exponent: Expr) -> Expr {
        Expr::Pow(Box::new(self), Box::new(exponent))
    }

    /// Create an exact rational number `numer / denom`.
    ///
    /// # Panics
    ///
    /// Panics if `denom` is zero.
    pub fn rational(numer: i64, denom: i64) -> Expr {
        Expr::Num(BigRational::new(BigInt::from(numer), BigInt::from(denom)))
    }

    /// Returns `sqrt(self)`.
    pub fn sqrt(self) -> Expr {
        self.pow(Expr::rational(1, 2))
    }

    /// Replace every occurrence of the symbol `var` with `value`.
    pub fn substitute(&self, var: &Symbol, value: &Expr) -> Expr {
        match self {
            Expr::Num(_) | Expr::NaN => self.clone(),
            Expr::Sym(symbol) => match symbol == var {
                true => value.clone(),
                false => self.clone(),
            },
            Expr::Add(args) => Expr::Add(args.iter().map(|a| a.substitute(var, value)).collect()),
            Expr::Mul(args) => Expr::Mul(args.iter().map(|a| a.substitute(var, value)).collect()),
            Expr::Pow(base, exponent) => {
                base.substitute(var, value)
                    .pow(exponent.substitute(var, value))
            }
            Expr::Exp(arg) => arg.substitute(var, value).exp(),
            Expr::Ln(arg) => arg.substitute(var, value).ln(),
        }
    }

    /// Apply [`substitute`](`Expr::substitute`) for each symbol / value pair.
    pub fn substitute_all(&self, subs: &[(Symbol, Expr)]) -> Expr {
        subs.iter()
            .fold(self.clone(), |expr, (var, value)| expr.substitute(var, value))
    }

    /// Returns the number zero.
    pub fn zero() -> Expr {
        Expr::Num(BigRational::zero())
    }
}

/// Converts a decimal literal such as `-2.35`, `100` or `1.5e-3` into an exact rational.
pub(crate) fn parse_decimal(literal: &str) -> Option<BigRational> {
    let (negative, literal) = match literal.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, literal),
    };

    let (mantissa, exponent) = match literal.find(['e', 'E']) {
        Some(idx) => (&literal[..idx], literal[idx + 1..].parse::<i32>().ok()?),
        None => (literal, 0),
    };

    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));

    if (int_part.is_empty() && frac_part.is_empty())
        || !int_part
            .chars()
            .chain(frac_part.chars())
            .all(|c| c.is_ascii_digit())
    {
        return None;
    }

    let numer = format!("{int_part}{frac_part}").parse::<BigInt>().ok()?;
    let scale = exponent.checked_sub(i32::try_from(frac_part.len()).ok()?)?;
    let ten = BigInt::from(10);

    let value = match scale >= 0 {
        true => BigRational::from_integer(numer * ten.pow(scale.unsigned_abs())),
        false => BigRational::new(numer, ten.pow(scale.unsigned_abs())),
    };

    Some(match negative {
        true => -value,
        false => value,
    })
}

impl From<Symbol> for Expr {
    fn from(symbol: Symbol) -> Self {
        Expr::Sym(symbol)
    }
}

impl From<i64> for Expr {
    fn from(value: i64) -> Self {
        Expr::integer(value)
    }
}

impl Add for Expr {
    type Output = Expr;

    fn add(self, rhs: Expr) -> Expr {
        Expr::Add(vec![self, rhs])
    }
}

impl Div for Expr {
    type Output = Expr;

    fn div(self, rhs: Expr) -> Expr {
        Expr::Mul(vec![self, rhs.pow(Expr::integer(-1))])
    }
}

impl Mul for Expr {
    type Output = Expr;

    fn mul(self, rhs: Expr) -> Expr {
        Expr::Mul(vec![self, rhs])
    }
}

impl Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::Mul(vec![Expr::integer(-1), self])
    }
}

impl Sub for Expr {
    type Output = Expr;

    fn sub(self, rhs: Expr) -> Expr {
        Expr::Add(vec![self, -rhs])
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Num(value) => match value.is_integer() && !value.is_negative() {
                true => write!(f, "{}", value),
                false => write!(f, "({})", value),
            },
            Expr::Sym(symbol) => write!(f, "{}", symbol),
            Expr::Add(args) => write!(f, "({})", args.iter().join(" + ")),
            Expr::Mul(args) => {
                for (idx, arg) in args.iter().enumerate() {
                    if idx > 0 {
                        write!(f, "*")?;
                    }

                    match arg {
                        Expr::Mul(_) => write!(f, "({})", arg)?,
                        _ => write!(f, "{}", arg)?,
                    }
                }

                Ok(())
            }
            Expr::Pow(base, exponent) => {
                fmt_atom(base, f)?;
                write!(f, "**")?;
                fmt_atom(exponent, f)
            }
            Expr::Exp(arg) => write!(f, "exp({})", arg),
            Expr::Ln(arg) => write!(f, "log({})", arg),
            Expr::NaN => write!(f, "nan"),
        }
    }
}

/// Writes an expression that binds at least as tight as a power.
fn fmt_atom(expr: &Expr, f: &mut Formatter<'_>) -> fmt::Result {
    match expr {
        Expr::Mul(_) | Expr::Pow(_, _) => write!(f, "({})", expr),
        _ => write!(f, "{}", expr),
    }
}
