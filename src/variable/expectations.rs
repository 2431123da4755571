//! Simulated-data expectation descriptors.
//!
//! Pure-data parameters for the external simulation engine used on dry
//! runs: date ranges, rates, incidences, numeric distributions and
//! categorical ratios. The crate only validates and serializes them; no
//! sampling happens here.

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StudyDefError};

/// A date bound, either a literal day or the run date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateBound {
    /// A fixed calendar day
    Date(NaiveDate),
    /// The day the simulation runs
    Today,
}

/// Bounds on simulated dates
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DateExpectation {
    /// Earliest simulated date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub earliest: Option<DateBound>,
    /// Latest simulated date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest: Option<DateBound>,
}

/// Shape of simulated event rates over time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rate {
    /// Every simulated patient has a value
    Universal,
    /// Uniform over the date range
    Uniform,
    /// Exponentially increasing over the date range
    ExponentialIncrease,
}

/// Distribution of simulated integer values
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntDistribution {
    /// Normal distribution
    Normal {
        /// Mean of the distribution
        mean: f64,
        /// Standard deviation of the distribution
        stddev: f64,
    },
    /// The national age distribution
    PopulationAges,
}

/// Distribution of simulated floating-point values
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FloatDistribution {
    /// Normal distribution
    Normal {
        /// Mean of the distribution
        mean: f64,
        /// Standard deviation of the distribution
        stddev: f64,
    },
}

/// Ratios of simulated categorical values; must sum to one
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryRatios(pub IndexMap<String, f64>);

impl CategoryRatios {
    /// Build ratios from label/proportion pairs
    #[must_use]
    pub fn from_pairs<const N: usize>(pairs: [(&str, f64); N]) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(label, ratio)| (label.to_string(), ratio))
                .collect(),
        )
    }

    /// Check the ratios sum to one
    pub fn validate(&self, owner: &str) -> Result<()> {
        let sum: f64 = self.0.values().sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(StudyDefError::InvalidExpectations {
                name: owner.to_string(),
                reason: format!("category ratios sum to {sum}, expected 1"),
            });
        }
        Ok(())
    }
}

/// Simulated-data descriptor attached to a variable or a whole study
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Expectations {
    /// Bounds on simulated dates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateExpectation>,
    /// Shape of simulated event rates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<Rate>,
    /// Proportion of simulated patients with a value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incidence: Option<f64>,
    /// Distribution of simulated integer values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub int: Option<IntDistribution>,
    /// Distribution of simulated floating-point values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub float: Option<FloatDistribution>,
    /// Ratios of simulated categorical values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<CategoryRatios>,
}

impl Expectations {
    /// An empty descriptor
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound simulated dates from below
    #[must_use]
    pub fn date_earliest(mut self, date: NaiveDate) -> Self {
        let expectation = self.date.get_or_insert_with(DateExpectation::default);
        expectation.earliest = Some(DateBound::Date(date));
        self
    }

    /// Bound simulated dates from above
    #[must_use]
    pub fn date_latest(mut self, date: NaiveDate) -> Self {
        let expectation = self.date.get_or_insert_with(DateExpectation::default);
        expectation.latest = Some(DateBound::Date(date));
        self
    }

    /// Bound simulated dates on both sides
    #[must_use]
    pub fn date_between(self, earliest: NaiveDate, latest: NaiveDate) -> Self {
        self.date_earliest(earliest).date_latest(latest)
    }

    /// Bound simulated dates between a fixed day and the run date
    #[must_use]
    pub fn date_until_today(mut self, earliest: NaiveDate) -> Self {
        self.date = Some(DateExpectation {
            earliest: Some(DateBound::Date(earliest)),
            latest: Some(DateBound::Today),
        });
        self
    }

    /// Set the simulated rate shape
    #[must_use]
    pub fn rate(mut self, rate: Rate) -> Self {
        self.rate = Some(rate);
        self
    }

    /// Set the simulated incidence
    #[must_use]
    pub fn incidence(mut self, incidence: f64) -> Self {
        self.incidence = Some(incidence);
        self
    }

    /// Simulate integers from a normal distribution
    #[must_use]
    pub fn int_normal(mut self, mean: f64, stddev: f64) -> Self {
        self.int = Some(IntDistribution::Normal { mean, stddev });
        self
    }

    /// Simulate ages from the national age distribution
    #[must_use]
    pub fn int_population_ages(mut self) -> Self {
        self.int = Some(IntDistribution::PopulationAges);
        self
    }

    /// Simulate floats from a normal distribution
    #[must_use]
    pub fn float_normal(mut self, mean: f64, stddev: f64) -> Self {
        self.float = Some(FloatDistribution::Normal { mean, stddev });
        self
    }

    /// Simulate categories with the given ratios
    #[must_use]
    pub fn category_ratios<const N: usize>(mut self, pairs: [(&str, f64); N]) -> Self {
        self.category = Some(CategoryRatios::from_pairs(pairs));
        self
    }

    /// Check the descriptor is internally consistent
    pub fn validate(&self, owner: &str) -> Result<()> {
        if let Some(incidence) = self.incidence {
            if !(0.0..=1.0).contains(&incidence) {
                return Err(StudyDefError::InvalidExpectations {
                    name: owner.to_string(),
                    reason: format!("incidence {incidence} is outside [0, 1]"),
                });
            }
        }
        if let Some(category) = &self.category {
            category.validate(owner)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_ratios_must_sum_to_one() {
        let good = Expectations::new().category_ratios([("M", 0.49), ("F", 0.51)]);
        assert!(good.validate("sex").is_ok());

        let bad = Expectations::new().category_ratios([("M", 0.49), ("F", 0.52)]);
        assert!(matches!(
            bad.validate("sex"),
            Err(StudyDefError::InvalidExpectations { name, .. }) if name == "sex"
        ));
    }

    #[test]
    fn incidence_outside_unit_interval_is_rejected() {
        let bad = Expectations::new().incidence(1.2);
        assert!(bad.validate("af").is_err());
    }

    #[test]
    fn date_bounds_compose() {
        let e = Expectations::new().date_between(
            NaiveDate::from_ymd_opt(2019, 11, 1).unwrap(),
            NaiveDate::from_ymd_opt(2020, 2, 29).unwrap(),
        );
        let date = e.date.unwrap();
        assert_eq!(
            date.earliest,
            Some(DateBound::Date(NaiveDate::from_ymd_opt(2019, 11, 1).unwrap()))
        );
        assert_eq!(
            date.latest,
            Some(DateBound::Date(NaiveDate::from_ymd_opt(2020, 2, 29).unwrap()))
        );
    }
}
