//! The atrial fibrillation cohort.

use chrono::NaiveDate;
use indexmap::IndexMap;

use crate::codelists::StudyCodelists;
use crate::error::Result;
use crate::expr::{Expr, Literal};
use crate::study::{
    common_variables, Population, StudyAnchors, StudyDefinition,
};
use crate::variable::{Derivation, Expectations, Rate, Variable};

/// Continuous registration with one practice over the baseline year
#[must_use]
pub fn registration_history(anchors: &StudyAnchors) -> Variable {
    Variable::new(Derivation::RegisteredWithOnePracticeBetween {
        start: anchors.registration_start(),
        end: anchors.baseline_end(),
    })
}

/// Patients with an atrial fibrillation diagnosis on or before the index
/// date, continuously registered over baseline, aged 18 to 110, with a
/// positive deprivation index
pub fn atrial_fibrillation_cohort(
    codelists: &StudyCodelists,
    anchors: &StudyAnchors,
) -> Result<StudyDefinition> {
    let predicate = Expr::And(vec![
        Expr::var("registration_history"),
        Expr::var("af"),
        Expr::GtEq("age".to_string(), Literal::Int(18)),
        Expr::LtEq("age".to_string(), Literal::Int(110)),
        Expr::Gt("imd".to_string(), Literal::Int(0)),
    ]);
    let mut inputs = IndexMap::new();
    inputs.insert("registration_history".to_string(), registration_history(anchors));

    StudyDefinition::builder("af")
        .default_expectations(
            Expectations::new()
                .date_until_today(NaiveDate::from_ymd_opt(1900, 1, 1).unwrap())
                .rate(Rate::ExponentialIncrease)
                .incidence(0.7),
        )
        .population(Population::satisfying_with(predicate, inputs))
        .variables(common_variables(codelists, anchors)?)
        .build()
}
