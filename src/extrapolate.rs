//! Year extrapolation of calibrated area weights.
//!
//! The base year gets the area weights times the weights-file scale; every later year
//! multiplies that base by the cumulative population growth since the first year. All
//! records grow alike and nothing is re-optimized.

use std::ops::RangeInclusive;

use anyhow::{Result, ensure};
use ndarray::{Array1, ArrayView1};

use crate::{config::HorizonConfig, data::PopulationForecast};

/// Lazy sequence of `(year, weights)` over a horizon. Each item is computed from the
/// previous cumulative growth; the sequence cannot be restarted.
#[derive(Debug)]
pub struct YearExtrapolator<'a> {
    base: Array1<f64>,
    forecast: &'a PopulationForecast,
    years: RangeInclusive<i32>,
    first_year: i32,
    cumulative_growth: f64,
}

impl<'a> YearExtrapolator<'a> {
    pub fn new(area_weights: ArrayView1<f64>, forecast: &'a PopulationForecast, horizon: &HorizonConfig) -> Self {
        Self {
            base: &area_weights * horizon.weight_file_scale,
            forecast,
            years: horizon.years(),
            first_year: horizon.first_year,
            cumulative_growth: 1.0,
        }
    }
}

impl Iterator for YearExtrapolator<'_> {
    type Item = Result<(i32, Array1<f64>)>;

    fn next(&mut self) -> Option<Self::Item> {
        let year = self.years.next()?;
        if year > self.first_year {
            match self.forecast.growth(year) {
                Ok(growth) => self.cumulative_growth *= growth,
                Err(err) => {
                    // a gap in the forecast ends the sequence
                    self.years = 1..=0;
                    return Some(Err(err));
                }
            }
        }
        Some(Ok((year, &self.base * self.cumulative_growth)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) { self.years.size_hint() }
}

/// Weights for every year of the horizon, in year order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct YearlyWeights {
    years: Vec<i32>,
    weights: Vec<Array1<f64>>,
}

impl YearlyWeights {
    /// Extrapolate `area_weights` across the horizon, failing if the forecast does not
    /// cover it.
    pub fn extrapolate(area_weights: ArrayView1<f64>, forecast: &PopulationForecast, horizon: &HorizonConfig) -> Result<Self> {
        horizon.validate()?;
        ensure!(horizon.first_year == horizon.last_year || forecast.population(horizon.first_year).is_ok(),
            "[extrapolate] population forecast lacks the first year {}", horizon.first_year);
        YearExtrapolator::new(area_weights, forecast, horizon).collect()
    }

    /// Weights-file header for `year`.
    pub fn column_name(year: i32) -> String { format!("WT{year}") }

    #[inline] pub fn len(&self) -> usize { self.years.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.years.is_empty() }

    #[inline] pub fn years(&self) -> &[i32] { &self.years }

    pub fn get(&self, year: i32) -> Option<ArrayView1<'_, f64>> {
        self.years.iter().position(|&y| y == year).map(|i| self.weights[i].view())
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, &Array1<f64>)> + '_ {
        self.years.iter().copied().zip(&self.weights)
    }
}

impl FromIterator<(i32, Array1<f64>)> for YearlyWeights {
    fn from_iter<I: IntoIterator<Item = (i32, Array1<f64>)>>(iter: I) -> Self {
        let (years, weights) = iter.into_iter().unzip();
        Self { years, weights }
    }
}
