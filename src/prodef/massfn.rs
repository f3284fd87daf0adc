use crate::{
    MassFnError, fXX,
    math::T,
    prodef::{ContinuousDistribution, DistributionConfig, ProDeFError},
    symbolic::{
        CompiledFn, Condition, Expr, Piecewise, Symbol, SymbolicError, integrate_definite,
        simplify, solve,
    },
};
use log::{debug, trace, warn};
use rand::Rng;
use rand_distr::{Distribution, Open01, uniform::SampleUniform};
use serde::{Deserialize, Serialize};
use std::{fs, io::Write, path::Path, time::Instant};

/// Probabilities at which every quantile branch must lie within the support.
const QUANTILE_PROBES: [(i64, i64); 5] = [(1, 20), (1, 4), (1, 2), (3, 4), (19, 20)];

/// A continuous distribution derived from an unnormalized mass function `f(m)` with support
/// `[mmin, mmax)`.
///
/// The normalization, the cumulative distribution and its inverse are derived in closed form
/// when the distribution is created and compiled into numeric closures, the symbolic
/// expressions are not used for evaluation. The formula is a function of the symbol `m` and may
/// also depend on the bound symbols `mmin` and `mmax`, e.g. the two part power law
/// `(m/mmin)**-1.3`. All symbols are assumed to be positive.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(
    try_from = "MassFunctionSpec<T>",
    into = "MassFunctionSpec<T>",
    bound(
        serialize = "T: fXX + Serialize",
        deserialize = "T: fXX + Deserialize<'de>"
    )
)]
pub struct MassFunction1D<T>
where
    T: fXX,
{
    cdf: CompiledFn<T>,
    config: DistributionConfig<T>,
    formula: Expr,
    mmax: Expr,
    mmin: Expr,
    normalization: T,
    pdf: CompiledFn<T>,
    ppf: CompiledFn<T>,
    range: (T, T),
}

impl<T> MassFunction1D<T>
where
    T: fXX,
{
    /// Create a new [`MassFunction1D`] with the default [`DistributionConfig`].
    pub fn new(formula: Expr, range: (T, T)) -> Result<Self, MassFnError<T>> {
        Self::with_config(formula, range, DistributionConfig::default())
    }

    /// Create a new [`MassFunction1D`].
    ///
    /// Fails if the range is not a finite and positive interval, if the formula contains any
    /// symbol other than `m`, `mmin` and `mmax`, or if the normalization, the cumulative
    /// distribution or its inverse have no closed form.
    pub fn with_config(
        formula: Expr,
        range: (T, T),
        config: DistributionConfig<T>,
    ) -> Result<Self, MassFnError<T>> {
        let start = Instant::now();

        let (minv, maxv) = range;

        if !num_traits::Float::is_finite(minv)
            || !num_traits::Float::is_finite(maxv)
            || (minv <= T::zero())
            || (minv >= maxv)
        {
            return Err(ProDeFError::InvalidRange {
                name: "MassFunction1D",
                maxv,
                minv,
            }
            .into());
        }

        config.validate()?;

        let (m, q) = (Symbol::mass(), Symbol::quantile());
        let (mmin_sym, mmax_sym) = (Symbol::mmin(), Symbol::mmax());

        if let Some(symbol) = formula
            .free_symbols()
            .into_iter()
            .find(|symbol| ![&m, &mmin_sym, &mmax_sym].contains(&symbol))
        {
            return Err(SymbolicError::UnboundSymbol(symbol.to_string()).into());
        }

        let formula = simplify(&formula);

        let mmin = Expr::from_float(minv)?;
        let mmax = Expr::from_float(maxv)?;

        let bounds = [
            (mmin_sym.clone(), mmin.clone()),
            (mmax_sym.clone(), mmax.clone()),
        ];

        // Normalization, kept symbolic in the bounds.
        let norm_expr = integrate_definite(
            &formula,
            &m,
            &Expr::from(mmin_sym.clone()),
            &Expr::from(mmax_sym.clone()),
        )?;

        trace!("MassFunction1D: normalization = {}", norm_expr);

        let norm_value = simplify(&norm_expr.substitute_all(&bounds)).evalf()?;
        let normalization = T!(norm_value);

        if !norm_value.is_finite()
            || (norm_value <= 0.0)
            || !num_traits::Float::is_finite(normalization)
            || (normalization <= T::zero())
        {
            return Err(ProDeFError::InvalidNormalization(normalization).into());
        }

        // Density.
        let pdf_expr = simplify(&(formula.clone() / norm_expr));

        trace!("MassFunction1D: pdf = {}", pdf_expr);

        let pdf = CompiledFn::from_piecewise(
            &Piecewise::new(pdf_expr.clone())
                .with_branch(
                    Condition::lt(m.clone(), Expr::from(mmin_sym.clone())),
                    Expr::zero(),
                )
                .with_branch(
                    Condition::ge(m.clone(), Expr::from(mmax_sym.clone())),
                    Expr::zero(),
                )
                .substitute_all(&bounds),
            &m,
        )?;

        // Cumulative distribution.
        let cdf_expr = integrate_definite(
            &pdf_expr,
            &m,
            &Expr::from(mmin_sym.clone()),
            &Expr::from(m.clone()),
        )?;

        trace!("MassFunction1D: cdf = {}", cdf_expr);

        let cdf = CompiledFn::from_piecewise(
            &Piecewise::new(cdf_expr.clone())
                .with_branch(
                    Condition::lt(m.clone(), Expr::from(mmin_sym.clone())),
                    Expr::zero(),
                )
                .with_branch(
                    Condition::ge(m.clone(), Expr::from(mmax_sym.clone())),
                    Expr::one(),
                )
                .substitute_all(&bounds),
            &m,
        )?;

        // Quantile function.
        let branches = solve(&Expr::from(q.clone()), &cdf_expr, &m)?;

        let selected =
            select_quantile_branch(&branches, &bounds, (mmin.evalf()?, mmax.evalf()?));

        let ppf_expr = match selected {
            Some(idx) => {
                if branches.len() > 1 {
                    warn!(
                        "MassFunction1D: selected branch {} of {} quantile functions",
                        idx + 1,
                        branches.len()
                    );
                }

                branches[idx].clone()
            }
            None => {
                return Err(SymbolicError::NoSolution(format!("{} - ({})", q, cdf_expr)).into());
            }
        };

        trace!("MassFunction1D: ppf = {}", ppf_expr);

        let ppf = CompiledFn::from_piecewise(
            &Piecewise::new(ppf_expr)
                .with_branch(Condition::lt(q.clone(), Expr::zero()), Expr::NaN)
                .with_branch(Condition::gt(q.clone(), Expr::one()), Expr::NaN)
                .with_branch(Condition::le(q.clone(), Expr::zero()), Expr::from(mmin_sym))
                .with_branch(Condition::ge(q.clone(), Expr::one()), Expr::from(mmax_sym))
                .substitute_all(&bounds),
            &q,
        )?;

        debug!(
            "MassFunction1D: derived {} on [{}, {}] with normalization {:.6e} in {:.3} sec",
            formula,
            minv,
            maxv,
            norm_value,
            start.elapsed().as_millis() as f64 / 1e3
        );

        Ok(Self {
            cdf,
            config,
            formula,
            mmax,
            mmin,
            normalization,
            pdf,
            ppf,
            range,
        })
    }

    /// Returns the (simplified) unnormalized formula.
    pub fn formula(&self) -> &Expr {
        &self.formula
    }

    /// Create a new [`MassFunction1D`] from a JSON5 file containing a [`MassFunctionSpec`].
    pub fn from_file<L>(path: L) -> Result<Self, MassFnError<T>>
    where
        T: for<'x> Deserialize<'x>,
        L: AsRef<Path>,
    {
        let spec = serde_json5::from_str::<MassFunctionSpec<T>>(&fs::read_to_string(path)?)?;

        Self::try_from(spec)
    }

    /// Returns the exact upper bound.
    pub fn mmax(&self) -> &Expr {
        &self.mmax
    }

    /// Returns the exact lower bound.
    pub fn mmin(&self) -> &Expr {
        &self.mmin
    }

    /// Returns the display name, if any.
    pub fn name(&self) -> Option<&str> {
        self.config.name.as_deref()
    }

    /// Returns the integral of the unnormalized formula over the support.
    pub fn normalization(&self) -> T {
        self.normalization
    }

    /// Returns the numeric support `(mmin, mmax)` of the standardized distribution.
    pub fn range(&self) -> (T, T) {
        self.range
    }

    /// Serialize the distribution to a JSON5 file.
    pub fn save<L>(&self, path: L) -> Result<(), MassFnError<T>>
    where
        T: Serialize,
        L: AsRef<Path>,
    {
        let mut file = fs::File::create(path)?;

        file.write_all(serde_json5::to_string(&MassFunctionSpec::from(self.clone()))?.as_bytes())?;

        Ok(())
    }
}

impl<T> ContinuousDistribution<T> for MassFunction1D<T>
where
    T: fXX + SampleUniform,
{
    fn cdf_std(&self, y: T) -> T {
        self.cdf.call(y)
    }

    fn config(&self) -> &DistributionConfig<T> {
        &self.config
    }

    fn pdf_std(&self, y: T) -> T {
        self.pdf.call(y)
    }

    fn ppf_std(&self, q: T) -> T {
        let (minv, maxv) = self.range;
        let value = self.ppf.call(q);

        // Cancellation close to q = 0 or q = 1 can leave the support.
        if value < minv {
            minv
        } else if value > maxv {
            maxv
        } else {
            value
        }
    }

    fn support_std(&self) -> (T, T) {
        self.range
    }
}

impl<T> Distribution<T> for MassFunction1D<T>
where
    T: fXX + SampleUniform,
    Open01: Distribution<T>,
{
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> T {
        self.ppf(rng.sample(Open01))
    }
}

/// Returns the index of the first quantile branch that is finite and within `[lower, upper]` at
/// all [`QUANTILE_PROBES`].
fn select_quantile_branch(
    branches: &[Expr],
    bounds: &[(Symbol, Expr)],
    (lower, upper): (f64, f64),
) -> Option<usize> {
    let q = Symbol::quantile();
    let slack = 1e-9 * (upper - lower);

    branches.iter().position(|branch| {
        let branch = branch.substitute_all(bounds);

        QUANTILE_PROBES.iter().all(|(numer, denom)| {
            simplify(&branch.substitute(&q, &Expr::rational(*numer, *denom)))
                .evalf()
                .is_ok_and(|value| {
                    value.is_finite() && (lower - slack <= value) && (value <= upper + slack)
                })
        })
    })
}

/// The serializable description of a [`MassFunction1D`].
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct MassFunctionSpec<T>
where
    T: fXX,
{
    /// The unnormalized formula, see [`Expr`] for the syntax.
    pub formula: String,

    /// The support `(mmin, mmax)`.
    pub range: (T, T),

    /// The forwarded distribution configuration.
    #[serde(default)]
    pub config: DistributionConfig<T>,
}

impl<T> From<MassFunction1D<T>> for MassFunctionSpec<T>
where
    T: fXX,
{
    fn from(massfn: MassFunction1D<T>) -> Self {
        Self {
            formula: massfn.formula.to_string(),
            range: massfn.range,
            config: massfn.config,
        }
    }
}

impl<T> TryFrom<MassFunctionSpec<T>> for MassFunction1D<T>
where
    T: fXX,
{
    type Error = MassFnError<T>;

    fn try_from(spec: MassFunctionSpec<T>) -> Result<Self, Self::Error> {
        Self::with_config(Expr::parse(&spec.formula)?, spec.range, spec.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::gauss_legendre;
    use approx::{relative_eq, ulps_eq};
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn reciprocal() -> MassFunction1D<f64> {
        MassFunction1D::new(Expr::parse("1/m").unwrap(), (1.0, 10.0)).unwrap()
    }

    #[test]
    fn test_reciprocal() {
        let massfn = reciprocal();
        let ln10 = 10.0f64.ln();

        assert!(ulps_eq!(massfn.normalization(), ln10));
        assert!(ulps_eq!(massfn.pdf(5.0), 1.0 / (5.0 * ln10)));
        assert!(massfn.cdf(1.0) == 0.0);
        assert!(massfn.cdf(10.0) == 1.0);
        assert!(ulps_eq!(massfn.cdf(10.0f64.sqrt()), 0.5, max_ulps = 4));
        assert!(ulps_eq!(massfn.ppf(0.5), 10.0f64.sqrt(), max_ulps = 4));
        assert!(ulps_eq!(massfn.ppf(0.0), 1.0, max_ulps = 4));
        assert!(relative_eq!(massfn.ppf(1.0), 10.0, max_relative = 1e-14));
    }

    #[test]
    fn test_support_boundaries() {
        let massfn = reciprocal();

        assert!(massfn.pdf(0.999) == 0.0);
        assert!(massfn.pdf(10.0) == 0.0);
        assert!(massfn.pdf(1.0) > 0.0);
        assert!(massfn.cdf(0.5) == 0.0);
        assert!(massfn.cdf(11.0) == 1.0);
        assert!(massfn.ppf(-0.1).is_nan());
        assert!(massfn.ppf(1.1).is_nan());
    }

    #[test]
    fn test_bound_symbols() {
        // A power law normalized to unity at the lower bound.
        let massfn =
            MassFunction1D::<f64>::new(Expr::parse("(m / mmin)**-2").unwrap(), (2.0, 4.0))
                .unwrap();

        // ∫ 4/m² dm over [2, 4] = 1
        assert!(ulps_eq!(massfn.normalization(), 1.0, max_ulps = 4));
        assert!(ulps_eq!(massfn.pdf(3.0), 4.0 / 9.0, max_ulps = 4));
        assert!(relative_eq!(massfn.cdf(massfn.ppf(0.3)), 0.3, max_relative = 1e-12));
    }

    #[test]
    fn test_quadratic_branch() {
        // The cdf of a linear density is quadratic, only one root lies inside the support.
        let massfn = MassFunction1D::<f64>::new(Expr::parse("m").unwrap(), (1.0, 3.0)).unwrap();

        assert!(ulps_eq!(massfn.normalization(), 4.0));
        assert!(ulps_eq!(massfn.cdf(2.0), 3.0 / 8.0));
        assert!(ulps_eq!(massfn.ppf(3.0 / 8.0), 2.0, max_ulps = 4));
    }

    #[test]
    fn test_decreasing_linear() {
        // Both roots of the quadratic cdf are real, only m = 4 - sqrt(9 - 8q) lies in [1, 3].
        let massfn =
            MassFunction1D::<f64>::new(Expr::parse("4 - m").unwrap(), (1.0, 3.0)).unwrap();

        assert!(ulps_eq!(massfn.normalization(), 4.0, max_ulps = 4));

        for q in [0.01_f64, 0.3, 0.5, 0.8, 0.99] {
            let expected: f64 = 4.0 - (9.0 - 8.0 * q).sqrt();

            assert!(relative_eq!(massfn.ppf(q), expected, max_relative = 1e-12));
        }
    }

    #[test]
    fn test_odd_power_quantile() {
        // cdf = ((m - 2)**3 + 1) / 2, the inverse needs the real cube root for q < 1/2.
        let massfn =
            MassFunction1D::<f64>::new(Expr::parse("(m - 2)**2").unwrap(), (1.0, 3.0)).unwrap();

        for q in [0.0_f64, 0.1, 0.25, 0.5, 0.75, 0.9, 1.0] {
            let expected = 2.0 + (2.0 * q - 1.0).cbrt();

            assert!(
                relative_eq!(massfn.ppf(q), expected, epsilon = 1e-12, max_relative = 1e-12),
                "{}",
                q
            );
        }

        let samples = massfn.sample_n(1000, None).unwrap();

        assert!(samples.iter().all(|x| (1.0..=3.0).contains(x)));
        assert!(samples.iter().any(|x| *x < 2.0));
    }

    #[test]
    fn test_select_quantile_branch() {
        fn branches(sources: &[&str]) -> Vec<Expr> {
            sources
                .iter()
                .map(|source| Expr::parse(source).unwrap())
                .collect()
        }

        // The first branch is negative, the second one maps (0, 1) onto (1, 2).
        assert!(
            select_quantile_branch(&branches(&["-1 - q", "1 + q"]), &[], (1.0, 2.0)) == Some(1)
        );

        assert!(select_quantile_branch(&branches(&["-1 - q"]), &[], (1.0, 2.0)).is_none());
        assert!(select_quantile_branch(&[], &[], (1.0, 2.0)).is_none());

        // Within the support at q = 1/2 but undefined below.
        assert!(
            select_quantile_branch(&branches(&["1 + sqrt(2*q - 1)"]), &[], (1.0, 3.0)).is_none()
        );

        // Bound symbols are substituted before probing.
        let bounds = [
            (Symbol::mmin(), Expr::integer(1)),
            (Symbol::mmax(), Expr::integer(2)),
        ];

        assert!(
            select_quantile_branch(
                &branches(&["mmax + q", "mmin + q*(mmax - mmin)"]),
                &bounds,
                (1.0, 2.0)
            ) == Some(1)
        );
    }

    #[test]
    fn test_exponential() {
        let massfn =
            MassFunction1D::<f32>::new(Expr::parse("exp(-m/2)").unwrap(), (0.5, 8.0)).unwrap();

        let expected = 2.0 * ((-0.25f32).exp() - (-4.0f32).exp());

        assert!(relative_eq!(massfn.normalization(), expected, max_relative = 1e-6));

        for q in [0.1f32, 0.5, 0.9] {
            assert!(relative_eq!(massfn.cdf(massfn.ppf(q)), q, max_relative = 1e-5));
        }
    }

    #[test]
    fn test_pdf_integral() {
        let massfn =
            MassFunction1D::<f64>::new(Expr::parse("m**-2.35").unwrap(), (0.5, 100.0)).unwrap();

        let integral = gauss_legendre(|x| massfn.pdf(x), massfn.support(), 1e-12, 24);

        assert!(relative_eq!(integral, 1.0, max_relative = 1e-9));
    }

    #[test]
    fn test_invalid_inputs() {
        for range in [(0.0, 1.0), (-1.0, 1.0), (2.0, 1.0), (1.0, 1.0), (1.0, f64::INFINITY)] {
            assert!(matches!(
                MassFunction1D::new(Expr::parse("1/m").unwrap(), range),
                Err(MassFnError::ProDeF(ProDeFError::InvalidRange { .. }))
            ));
        }

        assert!(matches!(
            MassFunction1D::<f64>::new(Expr::parse("m**alpha").unwrap(), (1.0, 2.0)),
            Err(MassFnError::Symbolic(SymbolicError::UnboundSymbol(_)))
        ));

        assert!(matches!(
            MassFunction1D::<f64>::new(Expr::parse("1 + exp(m)").unwrap(), (1.0, 2.0)),
            Err(MassFnError::Symbolic(SymbolicError::NoClosedForm { .. }))
        ));

        assert!(matches!(
            MassFunction1D::<f64>::new(Expr::parse("m*exp(m)").unwrap(), (1.0, 2.0)),
            Err(MassFnError::Symbolic(SymbolicError::NotIntegrable { .. }))
        ));

        assert!(matches!(
            MassFunction1D::<f64>::new(Expr::parse("-m").unwrap(), (1.0, 2.0)),
            Err(MassFnError::ProDeF(ProDeFError::InvalidNormalization(_)))
        ));

        // The normalization overflows in single precision only.
        assert!(MassFunction1D::<f64>::new(Expr::parse("m**40").unwrap(), (1.0, 10.0)).is_ok());
        assert!(matches!(
            MassFunction1D::<f32>::new(Expr::parse("m**40").unwrap(), (1.0, 10.0)),
            Err(MassFnError::ProDeF(ProDeFError::InvalidNormalization(_)))
        ));
    }

    #[test]
    fn test_distribution_sample() {
        let massfn = reciprocal();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);

        let samples = (&massfn).sample_iter(&mut rng).take(1000).collect::<Vec<f64>>();

        assert!(samples.iter().all(|x| (1.0..10.0).contains(x)));
    }

    #[test]
    fn test_serde() {
        let massfn = MassFunction1D::<f64>::with_config(
            Expr::parse("m**-2.35").unwrap(),
            (0.5, 100.0),
            DistributionConfig {
                name: Some(String::from("salpeter")),
                ..Default::default()
            },
        )
        .unwrap();

        let json = serde_json5::to_string(&massfn).unwrap();
        let copy = serde_json5::from_str::<MassFunction1D<f64>>(&json).unwrap();

        assert!(copy.name() == Some("salpeter"));
        assert!(copy.formula() == massfn.formula());
        assert!(copy.pdf(2.0) == massfn.pdf(2.0));

        let spec = serde_json5::from_str::<MassFunctionSpec<f64>>(
            "{ formula: '1/m', range: [1.0, 10.0], config: { loc: 1.0 } }",
        )
        .unwrap();

        let massfn = MassFunction1D::try_from(spec).unwrap();

        assert!(massfn.support() == (2.0, 11.0));
        assert!(massfn.config().scale == 1.0);
    }
}
