//! Probability density functions (PDFs).
//!
//! All densities implement the [`ContinuousDistribution`] trait, which provides the generic
//! behaviour of a continuous distribution (sampling, moments, intervals, fitting) on top of three
//! primitives: the standardized density, cumulative and quantile functions.
//!
//! The only density in this crate is [`MassFunction1D`], a distribution that is derived
//! analytically from an unnormalized mass function:
//! ```
//! # use massfn::{prodef::{ContinuousDistribution, MassFunction1D}, symbolic::Expr};
//! let salpeter = MassFunction1D::<f64>::new(Expr::parse("m**-2.35").unwrap(), (0.5, 100.0)).unwrap();
//!
//! assert!(salpeter.pdf(0.25) == 0.0);
//! assert!((salpeter.cdf(salpeter.ppf(0.3)) - 0.3).abs() < 1e-12);
//! ```
//!
//! Location and scale shifts (`x = loc + scale * y`) as well as the default random seed are
//! configured with a [`DistributionConfig`].

mod massfn;

pub use massfn::{MassFunction1D, MassFunctionSpec};

use crate::{
    fXX,
    math::{T, gauss_legendre, ln, powi, sqrt},
};
use derive_builder::Builder;
use log::debug;
use nalgebra::DVector;
use rand::{Rng, SeedableRng};
use rand_distr::{Uniform, uniform::SampleUniform};
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, time::Instant};
use thiserror::Error;

/// Maximum bisection depth of the adaptive quadrature used for moments.
const QUAD_MAX_DEPTH: usize = 16;

/// Errors associated with the [`prodef`](crate::prodef) module.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum ProDeFError<T> {
    #[error("invalid configuration: {msg}")]
    InvalidConfig { msg: &'static str },
    #[error("invalid normalization constant {0}")]
    InvalidNormalization(T),
    #[error("invalid range {name} [{minv} - {maxv}]")]
    InvalidRange {
        name: &'static str,
        maxv: T,
        minv: T,
    },
    #[error("failed to create sampler: {0}")]
    Sampling(#[from] rand_distr::uniform::Error),
}

/// Configuration that is shared by all continuous distributions.
#[derive(Builder, Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct DistributionConfig<T>
where
    T: fXX,
{
    /// Optional display name.
    #[builder(default, setter(into, strip_option))]
    pub name: Option<String>,

    /// Location shift.
    #[builder(default = T::zero())]
    pub loc: T,

    /// Scale factor, must be positive.
    #[builder(default = T::one())]
    pub scale: T,

    /// Default random seed for [`ContinuousDistribution::sample_n`].
    #[builder(default = 42)]
    pub rseed: u64,
}

impl<T> DistributionConfig<T>
where
    T: fXX,
{
    /// Check that the location is finite and the scale is positive and finite.
    pub fn validate(&self) -> Result<(), ProDeFError<T>> {
        if !num_traits::Float::is_finite(self.loc) {
            return Err(ProDeFError::InvalidConfig {
                msg: "location must be finite",
            });
        }

        if !num_traits::Float::is_finite(self.scale) || (self.scale <= T::zero()) {
            return Err(ProDeFError::InvalidConfig {
                msg: "scale must be positive and finite",
            });
        }

        Ok(())
    }
}

impl<T> Default for DistributionConfig<T>
where
    T: fXX,
{
    fn default() -> Self {
        Self {
            name: None,
            loc: T::zero(),
            scale: T::one(),
            rseed: 42,
        }
    }
}

/// A trait that must be implemented for any univariate continuous distribution.
///
/// Implementors provide the standardized functions (`loc = 0`, `scale = 1`), all other methods
/// apply the location and scale of [`ContinuousDistribution::config`].
pub trait ContinuousDistribution<T>: Debug
where
    T: fXX + SampleUniform,
    Self: Send + Sync,
{
    /// Chunk size for parallel sampling.
    const RCS: usize = 512;

    /// Standardized cumulative distribution function.
    fn cdf_std(&self, y: T) -> T;

    /// Returns a reference to the distribution configuration.
    fn config(&self) -> &DistributionConfig<T>;

    /// Standardized probability density function.
    fn pdf_std(&self, y: T) -> T;

    /// Standardized percent point (quantile) function.
    fn ppf_std(&self, q: T) -> T;

    /// Support of the standardized distribution.
    fn support_std(&self) -> (T, T);

    /// Cumulative distribution function.
    fn cdf(&self, x: T) -> T {
        self.cdf_std(self.standardize(x))
    }

    /// Evaluate [`ContinuousDistribution::cdf`] for each element.
    fn cdf_array(&self, xs: &DVector<T>) -> DVector<T> {
        xs.map(|x| self.cdf(x))
    }

    /// Draw a single sample by inverse transform sampling.
    fn draw_sample(&self, rng: &mut impl Rng) -> Result<T, ProDeFError<T>> {
        let uniform = Uniform::new(T::zero(), T::one())?;

        Ok(self.ppf(rng.sample(uniform)))
    }

    /// Differential entropy.
    fn entropy(&self) -> T {
        let integrand = |y: T| {
            let density = self.pdf_std(y);

            match density > T::zero() {
                true => -density * ln!(density),
                false => T::zero(),
            }
        };

        gauss_legendre(
            integrand,
            self.support_std(),
            quad_tolerance::<T>(),
            QUAD_MAX_DEPTH,
        ) + ln!(self.config().scale)
    }

    /// Expectation value of `func` with respect to the distribution.
    fn expect<F>(&self, func: F) -> T
    where
        F: Fn(T) -> T,
    {
        let config = self.config();

        self.expect_std(|y| func(config.loc + config.scale * y))
    }

    /// Expectation value of `func` with respect to the standardized distribution.
    fn expect_std<F>(&self, func: F) -> T
    where
        F: Fn(T) -> T,
    {
        gauss_legendre(
            |y| func(y) * self.pdf_std(y),
            self.support_std(),
            quad_tolerance::<T>(),
            QUAD_MAX_DEPTH,
        )
    }

    /// Estimate location and scale from `data` by matching the first two moments.
    fn fit_loc_scale(&self, data: &DVector<T>) -> (T, T) {
        let size = T::from_usize(data.len()).unwrap();

        let data_mean = data.iter().sum::<T>() / size;
        let data_var = data.iter().map(|x| powi!(*x - data_mean, 2)).sum::<T>() / size;

        let mean_std = self.expect_std(|y| y);
        let std_std = sqrt!(self.expect_std(|y| powi!(y - mean_std, 2)));

        let scale = sqrt!(data_var) / std_std;

        (data_mean - scale * mean_std, scale)
    }

    /// Confidence interval with equal areas around the median.
    fn interval(&self, confidence: T) -> (T, T) {
        let alpha = (T::one() - confidence) / T!(2.0);

        (self.ppf(alpha), self.ppf(T::one() - alpha))
    }

    /// Inverse survival function.
    fn isf(&self, q: T) -> T {
        self.ppf(T::one() - q)
    }

    /// Logarithm of the cumulative distribution function.
    fn logcdf(&self, x: T) -> T {
        ln!(self.cdf(x))
    }

    /// Logarithm of the probability density function.
    fn logpdf(&self, x: T) -> T {
        ln!(self.pdf(x))
    }

    /// Mean.
    fn mean(&self) -> T {
        self.expect(|x| x)
    }

    /// Median.
    fn median(&self) -> T {
        self.ppf(T!(0.5))
    }

    /// Non-central moment of order `order`.
    fn moment(&self, order: i32) -> T {
        self.expect(|x| powi!(x, order))
    }

    /// Negative log-likelihood of `data`.
    fn nnlf(&self, data: &DVector<T>) -> T {
        -data.iter().map(|x| self.logpdf(*x)).sum::<T>()
    }

    /// Probability density function.
    fn pdf(&self, x: T) -> T {
        self.pdf_std(self.standardize(x)) / self.config().scale
    }

    /// Evaluate [`ContinuousDistribution::pdf`] for each element.
    fn pdf_array(&self, xs: &DVector<T>) -> DVector<T> {
        xs.map(|x| self.pdf(x))
    }

    /// Percent point (quantile) function.
    fn ppf(&self, q: T) -> T {
        let config = self.config();

        config.loc + config.scale * self.ppf_std(q)
    }

    /// Evaluate [`ContinuousDistribution::ppf`] for each element.
    fn ppf_array(&self, qs: &DVector<T>) -> DVector<T> {
        qs.map(|q| self.ppf(q))
    }

    /// Draw `size` samples sequentially, using `rseed` or the configured seed.
    fn sample_n(&self, size: usize, rseed: Option<u64>) -> Result<DVector<T>, ProDeFError<T>> {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(rseed.unwrap_or(self.config().rseed));

        Ok(DVector::from_vec(
            (0..size)
                .map(|_| self.draw_sample(&mut rng))
                .collect::<Result<Vec<T>, ProDeFError<T>>>()?,
        ))
    }

    /// Draw `size` samples in parallel.
    ///
    /// Each chunk of [`ContinuousDistribution::RCS`] samples uses its own random number generator
    /// that is seeded from `rseed` and the chunk index, the result is therefore independent of the
    /// thread scheduling.
    fn sample_ensbl(&self, size: usize, rseed: u64) -> Result<DVector<T>, ProDeFError<T>> {
        let start = Instant::now();

        let mut samples = DVector::<T>::zeros(size);

        samples
            .as_mut_slice()
            .par_chunks_mut(Self::RCS)
            .enumerate()
            .try_for_each(|(cdx, chunk)| {
                let mut rng = Xoshiro256PlusPlus::seed_from_u64(rseed + (cdx * 17) as u64);

                chunk.iter_mut().try_for_each(|value| {
                    *value = self.draw_sample(&mut rng)?;

                    Ok::<(), ProDeFError<T>>(())
                })
            })?;

        debug!(
            "sample_ensbl: {:2.2}M samples in {:.2} sec",
            size as f64 / 1e6,
            start.elapsed().as_millis() as f64 / 1e3
        );

        Ok(samples)
    }

    /// Survival function.
    fn sf(&self, x: T) -> T {
        T::one() - self.cdf(x)
    }

    /// Map `x` onto the standardized distribution.
    fn standardize(&self, x: T) -> T {
        let config = self.config();

        (x - config.loc) / config.scale
    }

    /// Standard deviation.
    fn std(&self) -> T {
        sqrt!(self.var())
    }

    /// Support of the distribution.
    fn support(&self) -> (T, T) {
        let config = self.config();
        let (minv, maxv) = self.support_std();

        (config.loc + config.scale * minv, config.loc + config.scale * maxv)
    }

    /// Variance.
    fn var(&self) -> T {
        let mean = self.mean();

        self.expect(|x| powi!(x - mean, 2))
    }
}

/// Absolute tolerance of the moment quadrature.
fn quad_tolerance<T>() -> T
where
    T: fXX,
{
    sqrt!(<T as num_traits::Float>::epsilon()) * T!(1e-2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{relative_eq, ulps_eq};

    /// The uniform distribution on `[0, 1)`.
    #[derive(Debug, Default)]
    struct UnitUniform {
        config: DistributionConfig<f64>,
    }

    impl ContinuousDistribution<f64> for UnitUniform {
        fn cdf_std(&self, y: f64) -> f64 {
            y.clamp(0.0, 1.0)
        }

        fn config(&self) -> &DistributionConfig<f64> {
            &self.config
        }

        fn pdf_std(&self, y: f64) -> f64 {
            match (0.0..1.0).contains(&y) {
                true => 1.0,
                false => 0.0,
            }
        }

        fn ppf_std(&self, q: f64) -> f64 {
            match (0.0..=1.0).contains(&q) {
                true => q,
                false => f64::NAN,
            }
        }

        fn support_std(&self) -> (f64, f64) {
            (0.0, 1.0)
        }
    }

    #[test]
    fn test_config_builder() {
        let config = DistributionConfigBuilder::<f64>::default()
            .name("uniform")
            .scale(2.0)
            .build()
            .unwrap();

        assert!(config.name.as_deref() == Some("uniform"));
        assert!(config.loc == 0.0);
        assert!(config.rseed == 42);
        assert!(config.validate().is_ok());

        let config = DistributionConfigBuilder::<f32>::default()
            .scale(-1.0)
            .build()
            .unwrap();

        assert!(matches!(
            config.validate(),
            Err(ProDeFError::InvalidConfig { .. })
        ));

        let config = serde_json5::from_str::<DistributionConfig<f64>>("{ loc: 1.5 }").unwrap();

        assert!(config.loc == 1.5);
        assert!(config.scale == 1.0);
    }

    #[test]
    fn test_loc_scale() {
        let uniform = UnitUniform {
            config: DistributionConfigBuilder::default()
                .loc(2.0)
                .scale(4.0)
                .build()
                .unwrap(),
        };

        assert!(uniform.support() == (2.0, 6.0));
        assert!(uniform.pdf(3.0) == 0.25);
        assert!(uniform.pdf(1.0) == 0.0);
        assert!(uniform.cdf(5.0) == 0.75);
        assert!(uniform.sf(5.0) == 0.25);
        assert!(uniform.ppf(0.5) == 4.0);
        assert!(uniform.isf(0.25) == 5.0);
        assert!(uniform.median() == 4.0);
        assert!(uniform.interval(0.5) == (3.0, 5.0));
        assert!(uniform.ppf(1.5).is_nan());
    }

    #[test]
    fn test_moments() {
        let uniform = UnitUniform::default();

        assert!(relative_eq!(uniform.mean(), 0.5, max_relative = 1e-12));
        assert!(relative_eq!(uniform.var(), 1.0 / 12.0, max_relative = 1e-10));
        assert!(relative_eq!(uniform.moment(3), 0.25, max_relative = 1e-12));
        assert!(ulps_eq!(uniform.entropy(), 0.0));
    }

    #[test]
    fn test_sampling() {
        let uniform = UnitUniform::default();

        let samples = uniform.sample_n(1000, None).unwrap();

        assert!(samples == uniform.sample_n(1000, Some(42)).unwrap());
        assert!(samples.iter().all(|x| (0.0..1.0).contains(x)));
        assert!(relative_eq!(samples.mean(), 0.5, epsilon = 0.05));

        let ensbl = uniform.sample_ensbl(4096, 7).unwrap();

        assert!(ensbl == uniform.sample_ensbl(4096, 7).unwrap());
        assert!(ensbl.iter().all(|x| (0.0..1.0).contains(x)));
        assert!(relative_eq!(ensbl.mean(), 0.5, epsilon = 0.02));
    }

    #[test]
    fn test_fit_loc_scale() {
        let uniform = UnitUniform::default();
        let data = uniform.sample_n(20_000, Some(3)).unwrap().map(|x| 3.0 + 2.0 * x);

        let (loc, scale) = uniform.fit_loc_scale(&data);

        assert!(relative_eq!(loc, 3.0, epsilon = 0.05));
        assert!(relative_eq!(scale, 2.0, epsilon = 0.05));

        assert!(uniform.nnlf(&DVector::from_vec(vec![0.1, 0.5])) == 0.0);
        assert!(uniform.nnlf(&DVector::from_vec(vec![0.1, 1.5])).is_infinite());
    }
}
