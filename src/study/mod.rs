//! Study specifications.
//!
//! A study definition pairs a population predicate with the full variable
//! set and the default simulated-data expectations. Building one validates
//! the whole specification: duplicate names, unresolved references in
//! predicates and categorization rules, and inconsistent expectation
//! descriptors are all fatal before anything is handed to the extraction
//! engine.

mod anchors;
pub mod atrial_fibrillation;
pub mod common_variables;
pub mod flow_chart;
pub mod general_population;

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StudyDefError};
use crate::expr::{Expr, Value, VariableContext};
use crate::patient::Patient;
use crate::variable::{CARE_HOME_ATTRIBUTES, Derivation, Expectations, Variable};

pub use anchors::StudyAnchors;
pub use common_variables::common_variables;

/// The rule deciding cohort membership
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Population {
    /// Every patient is included; gating variables are reported, not applied
    All,
    /// Patients satisfying a boolean expression are included
    Satisfying {
        /// The inclusion predicate
        predicate: Expr,
        /// Local variables the predicate may reference, in addition to the
        /// study's variable set
        inputs: IndexMap<String, Variable>,
    },
}

impl Population {
    /// A population predicate with no local variables
    #[must_use]
    pub fn satisfying(predicate: Expr) -> Self {
        Self::Satisfying {
            predicate,
            inputs: IndexMap::new(),
        }
    }

    /// A population predicate with local variables
    #[must_use]
    pub fn satisfying_with(predicate: Expr, inputs: IndexMap<String, Variable>) -> Self {
        Self::Satisfying { predicate, inputs }
    }
}

/// A complete per-cohort specification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyDefinition {
    /// Name of the cohort
    name: String,
    /// Study-wide simulated-data defaults
    default_expectations: Expectations,
    /// The population rule
    population: Population,
    /// The variable set, in declaration order
    variables: IndexMap<String, Variable>,
}

/// One patient's computed row: every variable plus the population verdict
#[derive(Debug, Clone)]
pub struct PatientRow {
    /// Computed variable values, in declaration order
    pub values: IndexMap<String, Value>,
    /// Whether the patient satisfies the population rule
    pub in_population: bool,
}

impl StudyDefinition {
    /// Start building a study definition
    #[must_use]
    pub fn builder(name: &str) -> StudyDefinitionBuilder {
        StudyDefinitionBuilder {
            name: name.to_string(),
            default_expectations: Expectations::new(),
            population: Population::All,
            variables: Vec::new(),
        }
    }

    /// Name of the cohort
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The population rule
    #[must_use]
    pub const fn population(&self) -> &Population {
        &self.population
    }

    /// Study-wide simulated-data defaults
    #[must_use]
    pub const fn default_expectations(&self) -> &Expectations {
        &self.default_expectations
    }

    /// The variable set, in declaration order
    #[must_use]
    pub const fn variables(&self) -> &IndexMap<String, Variable> {
        &self.variables
    }

    /// Whether a name resolves to a variable (study set or population-local)
    #[must_use]
    pub fn has_variable(&self, name: &str) -> bool {
        if self.variables.contains_key(name) {
            return true;
        }
        match &self.population {
            Population::Satisfying { inputs, .. } => inputs.contains_key(name),
            Population::All => false,
        }
    }

    /// Names the population predicate gates on (empty when the population
    /// is unconditional)
    #[must_use]
    pub fn gating_variables(&self) -> HashSet<String> {
        match &self.population {
            Population::All => HashSet::new(),
            Population::Satisfying { predicate, .. } => predicate.required_variables(),
        }
    }

    /// Compute every variable and the population verdict for one patient.
    ///
    /// Variables are evaluated in declaration order, so composite
    /// derivations may reference anything declared before them.
    pub fn evaluate(&self, patient: &Patient) -> Result<PatientRow> {
        let mut ctx = VariableContext::new();
        for (name, variable) in &self.variables {
            let value = variable.evaluate(patient, &ctx)?;
            ctx.insert(name, value);
        }
        let in_population = match &self.population {
            Population::All => true,
            Population::Satisfying { predicate, inputs } => {
                let mut scoped = ctx.clone();
                for (name, variable) in inputs {
                    let value = variable.evaluate(patient, &scoped)?;
                    scoped.insert(name, value);
                }
                predicate.evaluate(&scoped)?
            }
        };
        Ok(PatientRow {
            values: ctx.into_values(),
            in_population,
        })
    }

    /// Serialize the whole specification for the extraction engine
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn validate(&self) -> Result<()> {
        self.default_expectations.validate(&self.name)?;
        let mut defined: HashSet<String> = HashSet::new();
        for (name, variable) in &self.variables {
            self.validate_variable(name, variable, &defined)?;
            defined.insert(name.clone());
        }
        if let Population::Satisfying { predicate, inputs } = &self.population {
            for (name, variable) in inputs {
                self.validate_variable(name, variable, &defined)?;
                defined.insert(name.clone());
            }
            let referenced_by = format!("{} population", self.name);
            for name in predicate.required_variables() {
                if !defined.contains(&name) {
                    return Err(StudyDefError::UndefinedVariable {
                        name,
                        referenced_by,
                    });
                }
            }
        }
        Ok(())
    }

    fn validate_variable(
        &self,
        name: &str,
        variable: &Variable,
        defined: &HashSet<String>,
    ) -> Result<()> {
        if let Some(expectations) = &variable.expectations {
            expectations.validate(name)?;
        }
        match &variable.derivation {
            Derivation::CategorisedAs { rules, inputs } => {
                let visible = self.validate_inputs(name, inputs, defined)?;
                for referenced in rules.required_variables() {
                    if !visible.contains(&referenced) {
                        return Err(StudyDefError::UndefinedVariable {
                            name: referenced,
                            referenced_by: name.to_string(),
                        });
                    }
                }
            }
            Derivation::Satisfying { predicate, inputs } => {
                let visible = self.validate_inputs(name, inputs, defined)?;
                for referenced in predicate.required_variables() {
                    if !visible.contains(&referenced) {
                        return Err(StudyDefError::UndefinedVariable {
                            name: referenced,
                            referenced_by: name.to_string(),
                        });
                    }
                }
            }
            Derivation::CareHomeStatusAsOf { rules, .. } => {
                for referenced in rules.required_variables() {
                    if !CARE_HOME_ATTRIBUTES.contains(&referenced.as_str()) {
                        return Err(StudyDefError::UndefinedVariable {
                            name: referenced,
                            referenced_by: name.to_string(),
                        });
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn validate_inputs(
        &self,
        owner: &str,
        inputs: &IndexMap<String, Variable>,
        defined: &HashSet<String>,
    ) -> Result<HashSet<String>> {
        let mut visible = defined.clone();
        for (name, variable) in inputs {
            self.validate_variable(&format!("{owner}.{name}"), variable, &visible)?;
            visible.insert(name.clone());
        }
        Ok(visible)
    }
}

/// Builder assembling a study definition before validation
#[derive(Debug)]
pub struct StudyDefinitionBuilder {
    name: String,
    default_expectations: Expectations,
    population: Population,
    variables: Vec<(String, Variable)>,
}

impl StudyDefinitionBuilder {
    /// Set the study-wide simulated-data defaults
    #[must_use]
    pub fn default_expectations(mut self, expectations: Expectations) -> Self {
        self.default_expectations = expectations;
        self
    }

    /// Set the population rule
    #[must_use]
    pub fn population(mut self, population: Population) -> Self {
        self.population = population;
        self
    }

    /// Declare one variable
    #[must_use]
    pub fn variable(mut self, name: &str, variable: Variable) -> Self {
        self.variables.push((name.to_string(), variable));
        self
    }

    /// Declare a block of variables, preserving their order
    #[must_use]
    pub fn variables(mut self, block: IndexMap<String, Variable>) -> Self {
        self.variables.extend(block);
        self
    }

    /// Validate and produce the study definition
    pub fn build(self) -> Result<StudyDefinition> {
        let mut variables = IndexMap::with_capacity(self.variables.len());
        for (name, variable) in self.variables {
            if variables.insert(name.clone(), variable).is_some() {
                return Err(StudyDefError::DuplicateVariable {
                    name,
                    study: self.name,
                });
            }
        }
        let definition = StudyDefinition {
            name: self.name,
            default_expectations: self.default_expectations,
            population: self.population,
            variables,
        };
        definition.validate()?;
        log::debug!(
            "built study definition '{}' with {} variables",
            definition.name,
            definition.variables.len()
        );
        Ok(definition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    use crate::variable::TimeWindow;

    fn age_variable() -> Variable {
        Variable::new(Derivation::AgeAsOf {
            on: NaiveDate::from_ymd_opt(2020, 3, 1).unwrap(),
        })
    }

    #[test]
    fn duplicate_variable_names_are_fatal() {
        let result = StudyDefinition::builder("cohort")
            .variable("age", age_variable())
            .variable("age", age_variable())
            .build();
        assert!(matches!(
            result,
            Err(StudyDefError::DuplicateVariable { name, .. }) if name == "age"
        ));
    }

    #[test]
    fn population_referencing_an_undefined_variable_is_fatal() {
        let result = StudyDefinition::builder("cohort")
            .variable("age", age_variable())
            .population(Population::satisfying(Expr::var("registration_history")))
            .build();
        assert!(matches!(
            result,
            Err(StudyDefError::UndefinedVariable { name, .. }) if name == "registration_history"
        ));
    }

    #[test]
    fn population_local_inputs_satisfy_references() {
        let mut inputs = IndexMap::new();
        inputs.insert(
            "registration_history".to_string(),
            Variable::new(Derivation::RegisteredWithOnePracticeBetween {
                start: NaiveDate::from_ymd_opt(2019, 2, 28).unwrap(),
                end: NaiveDate::from_ymd_opt(2020, 2, 29).unwrap(),
            }),
        );
        let result = StudyDefinition::builder("cohort")
            .variable("age", age_variable())
            .population(Population::satisfying_with(
                Expr::var("registration_history"),
                inputs,
            ))
            .build();
        assert!(result.is_ok());
    }

    #[test]
    fn satisfying_variable_may_only_reference_earlier_names() {
        let forward_reference = StudyDefinition::builder("cohort")
            .variable(
                "flu_vaccine",
                Variable::new(Derivation::Satisfying {
                    predicate: Expr::var("flu_vaccine_med"),
                    inputs: IndexMap::new(),
                }),
            )
            .variable(
                "flu_vaccine_med",
                Variable::new(Derivation::ConsultationCount {
                    window: TimeWindow::Unbounded,
                }),
            )
            .build();
        assert!(matches!(
            forward_reference,
            Err(StudyDefError::UndefinedVariable { name, .. }) if name == "flu_vaccine_med"
        ));
    }

    #[test]
    fn invalid_category_ratios_fail_the_build() {
        let variable = age_variable()
            .with_expectations(Expectations::new().category_ratios([("a", 0.5), ("b", 0.6)]));
        let result = StudyDefinition::builder("cohort").variable("age", variable).build();
        assert!(matches!(
            result,
            Err(StudyDefError::InvalidExpectations { name, .. }) if name == "age"
        ));
    }
}
