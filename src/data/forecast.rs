use std::collections::BTreeMap;

use anyhow::{Result, anyhow, ensure};

/// National population forecast, year -> population.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PopulationForecast {
    by_year: BTreeMap<i32, f64>,
}

impl PopulationForecast {
    pub fn new(by_year: BTreeMap<i32, f64>) -> Result<Self> {
        for (year, pop) in &by_year {
            ensure!(pop.is_finite() && *pop > 0.0,
                "[data::forecast] population for {year} must be positive, got {pop}");
        }
        Ok(Self { by_year })
    }

    /// Population in `year`.
    pub fn population(&self, year: i32) -> Result<f64> {
        self.by_year.get(&year).copied()
            .ok_or_else(|| anyhow!("[data::forecast] no population forecast for {year}"))
    }

    /// Ratio of population in `year` to population in the previous year.
    pub fn growth(&self, year: i32) -> Result<f64> {
        Ok(self.population(year)? / self.population(year - 1)?)
    }

    /// Years covered by the forecast, in order.
    pub fn years(&self) -> impl Iterator<Item = i32> + '_ { self.by_year.keys().copied() }
}

impl FromIterator<(i32, f64)> for PopulationForecast {
    fn from_iter<I: IntoIterator<Item = (i32, f64)>>(iter: I) -> Self {
        Self { by_year: iter.into_iter().collect() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn growth_ratios() {
        let pop = PopulationForecast::from_iter([(2021, 100.0), (2022, 110.0), (2023, 121.0)]);
        assert!((pop.growth(2022).unwrap() - 1.1).abs() < 1e-12);
        assert!((pop.growth(2023).unwrap() - 1.1).abs() < 1e-12);
        assert!(pop.growth(2021).is_err());
        assert_eq!(pop.years().collect::<Vec<_>>(), vec![2021, 2022, 2023]);
    }

    #[test]
    fn rejects_non_positive_population() {
        assert!(PopulationForecast::new(BTreeMap::from([(2021, 0.0)])).is_err());
    }
}
