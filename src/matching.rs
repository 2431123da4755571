//! Case-control matching configuration.
//!
//! The matching algorithm itself runs in an external matcher; this module
//! only assembles and validates the request handed to it: input cohorts,
//! the control-to-case ratio, the per-variable matching rules, the
//! closest-match tie-break, and the index-date alignment policy.

use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StudyDefError};
use crate::study::StudyDefinition;

/// How one variable must agree between a case and a candidate control.
///
/// Serialized the way the matcher reads it: the string `"category"` for an
/// exact category match, or a bare integer tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRule {
    /// Values must be in the same category
    Category,
    /// Numeric values may differ by at most the tolerance
    Tolerance(u32),
}

impl Serialize for MatchRule {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Category => serializer.serialize_str("category"),
            Self::Tolerance(tolerance) => serializer.serialize_u32(*tolerance),
        }
    }
}

impl<'de> Deserialize<'de> for MatchRule {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        use serde::de::Error;
        match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::String(s) if s == "category" => Ok(Self::Category),
            serde_json::Value::Number(n) => n
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .map(Self::Tolerance)
                .ok_or_else(|| D::Error::custom("tolerance out of range")),
            other => Err(D::Error::custom(format!("invalid match rule: {other}"))),
        }
    }
}

/// How a matched control's index date relates to its case's
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexDatePolicy {
    /// The control's index date is replaced by the case's, with no offset
    #[serde(rename = "no_offset")]
    ReplaceWithCaseNoOffset,
}

/// A complete matching request for the external matcher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingRequest {
    /// Input file holding the case cohort
    pub case_csv: String,
    /// Input file holding the candidate control pool
    pub match_csv: String,
    /// Maximum number of controls matched to each case
    pub matches_per_case: u32,
    /// Minimum number of controls for a case to be kept
    pub min_matches_per_case: u32,
    /// Per-variable matching rules
    pub match_variables: IndexMap<String, MatchRule>,
    /// Variables used to pick the closest candidates when more qualify
    /// than are needed
    pub closest_match_variables: Vec<String>,
    /// Column holding each record's index date
    pub index_date_variable: String,
    /// How control index dates are aligned to their case's
    #[serde(rename = "replace_match_index_date_with_case")]
    pub index_date_policy: IndexDatePolicy,
    /// Suffix of the matcher's output files
    pub output_suffix: String,
}

impl MatchingRequest {
    /// Start building a matching request
    #[must_use]
    pub fn builder(case_csv: &str, match_csv: &str) -> MatchingRequestBuilder {
        MatchingRequestBuilder {
            request: Self {
                case_csv: case_csv.to_string(),
                match_csv: match_csv.to_string(),
                matches_per_case: 1,
                min_matches_per_case: 1,
                match_variables: IndexMap::new(),
                closest_match_variables: Vec::new(),
                index_date_variable: "indexdate".to_string(),
                index_date_policy: IndexDatePolicy::ReplaceWithCaseNoOffset,
                output_suffix: String::new(),
            },
        }
    }

    /// Check the request is internally consistent
    pub fn validate(&self) -> Result<()> {
        if self.min_matches_per_case > self.matches_per_case {
            return Err(self.invalid(format!(
                "min_matches_per_case ({}) exceeds matches_per_case ({})",
                self.min_matches_per_case, self.matches_per_case
            )));
        }
        if self.match_variables.is_empty() {
            return Err(self.invalid("no match variables".to_string()));
        }
        for name in &self.closest_match_variables {
            if !self.match_variables.contains_key(name) {
                return Err(self.invalid(format!(
                    "closest-match variable '{name}' is not a match variable"
                )));
            }
        }
        Ok(())
    }

    /// Check every matching variable is computed by both the case cohort
    /// and the candidate-pool cohort
    pub fn validate_against(
        &self,
        cases: &StudyDefinition,
        candidates: &StudyDefinition,
    ) -> Result<()> {
        self.validate()?;
        for name in self
            .match_variables
            .keys()
            .chain(self.closest_match_variables.iter())
            .unique()
        {
            for cohort in [cases, candidates] {
                if !cohort.has_variable(name) {
                    return Err(self.invalid(format!(
                        "match variable '{name}' is not computed by cohort '{}'",
                        cohort.name()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Serialize the request for the external matcher
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn invalid(&self, reason: String) -> StudyDefError {
        StudyDefError::InvalidMatching {
            name: self.output_suffix.clone(),
            reason,
        }
    }
}

/// Builder assembling a matching request
#[derive(Debug, Clone)]
pub struct MatchingRequestBuilder {
    request: MatchingRequest,
}

impl MatchingRequestBuilder {
    /// Set the maximum number of controls per case
    #[must_use]
    pub const fn matches_per_case(mut self, matches: u32) -> Self {
        self.request.matches_per_case = matches;
        self
    }

    /// Set the minimum number of controls for a case to be kept
    #[must_use]
    pub const fn min_matches_per_case(mut self, matches: u32) -> Self {
        self.request.min_matches_per_case = matches;
        self
    }

    /// Add a matching variable and its rule
    #[must_use]
    pub fn match_variable(mut self, name: &str, rule: MatchRule) -> Self {
        self.request.match_variables.insert(name.to_string(), rule);
        self
    }

    /// Break ties by closeness on a variable
    #[must_use]
    pub fn closest_match_on(mut self, name: &str) -> Self {
        self.request.closest_match_variables.push(name.to_string());
        self
    }

    /// Set the column holding each record's index date
    #[must_use]
    pub fn index_date_variable(mut self, name: &str) -> Self {
        self.request.index_date_variable = name.to_string();
        self
    }

    /// Set the output file suffix
    #[must_use]
    pub fn output_suffix(mut self, suffix: &str) -> Self {
        self.request.output_suffix = suffix.to_string();
        self
    }

    /// Validate and produce the request
    pub fn build(self) -> Result<MatchingRequest> {
        self.request.validate()?;
        Ok(self.request)
    }
}

/// The study's matching step: ten controls per case from the general
/// population, matched exactly on sex and practice and within a year of
/// age, with the closest age winning ties and control index dates taken
/// from the case
pub fn af_general_population_matching() -> Result<MatchingRequest> {
    MatchingRequest::builder("input_af_oac", "input_general_population")
        .matches_per_case(10)
        .min_matches_per_case(1)
        .match_variable("sex", MatchRule::Category)
        .match_variable("age", MatchRule::Tolerance(1))
        .match_variable("practice_id", MatchRule::Category)
        .closest_match_on("age")
        .index_date_variable("indexdate")
        .output_suffix("_af_gen_pop")
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn study_matching_request_is_valid() {
        let request = af_general_population_matching().unwrap();
        assert_eq!(request.matches_per_case, 10);
        assert_eq!(request.min_matches_per_case, 1);
        assert!(request.min_matches_per_case <= request.matches_per_case);
        assert_eq!(request.match_variables.get("age"), Some(&MatchRule::Tolerance(1)));
        assert_eq!(request.closest_match_variables, vec!["age"]);
        assert_eq!(request.output_suffix, "_af_gen_pop");
    }

    #[test]
    fn minimum_above_maximum_is_rejected() {
        let result = MatchingRequest::builder("cases", "controls")
            .matches_per_case(2)
            .min_matches_per_case(5)
            .match_variable("sex", MatchRule::Category)
            .build();
        assert!(matches!(result, Err(StudyDefError::InvalidMatching { .. })));
    }

    #[test]
    fn closest_match_variable_must_be_a_match_variable() {
        let result = MatchingRequest::builder("cases", "controls")
            .match_variable("sex", MatchRule::Category)
            .closest_match_on("age")
            .build();
        assert!(matches!(
            result,
            Err(StudyDefError::InvalidMatching { reason, .. }) if reason.contains("age")
        ));
    }

    #[test]
    fn empty_match_variable_set_is_rejected() {
        let result = MatchingRequest::builder("cases", "controls").build();
        assert!(matches!(result, Err(StudyDefError::InvalidMatching { .. })));
    }
}
