//! The general-population comparator cohort.

use chrono::NaiveDate;
use indexmap::IndexMap;

use crate::codelists::StudyCodelists;
use crate::error::Result;
use crate::expr::{Expr, Literal};
use crate::study::atrial_fibrillation::registration_history;
use crate::study::{common_variables, Population, StudyAnchors, StudyDefinition};
use crate::variable::{Expectations, Rate};

/// The general-population predicate: registration, age, sex and
/// deprivation constraints, at least one consultation in the prior year,
/// and no atrial fibrillation diagnosis or anticoagulant exposure
#[must_use]
pub fn general_population_predicate() -> Expr {
    Expr::And(vec![
        Expr::var("registration_history"),
        Expr::GtEq("age".to_string(), Literal::Int(18)),
        Expr::LtEq("age".to_string(), Literal::Int(110)),
        Expr::Or(vec![Expr::eq_str("sex", "M"), Expr::eq_str("sex", "F")]),
        Expr::Gt("imd".to_string(), Literal::Int(0)),
        Expr::Gt("gp_consult_count".to_string(), Literal::Int(0)),
        Expr::Not(Box::new(Expr::Or(vec![
            Expr::var("af"),
            Expr::var("lmwh_last_four_months"),
            Expr::var("warfarin_last_four_months"),
            Expr::var("doac_last_four_months"),
        ]))),
    ])
}

/// Consulting adults with no atrial fibrillation diagnosis and no
/// anticoagulant exposure over the four months before the index date
pub fn general_population_cohort(
    codelists: &StudyCodelists,
    anchors: &StudyAnchors,
) -> Result<StudyDefinition> {
    let mut inputs = IndexMap::new();
    inputs.insert("registration_history".to_string(), registration_history(anchors));

    StudyDefinition::builder("general_population")
        .default_expectations(
            Expectations::new()
                .date_until_today(NaiveDate::from_ymd_opt(1900, 1, 1).unwrap())
                .rate(Rate::ExponentialIncrease)
                .incidence(0.7),
        )
        .population(Population::satisfying_with(general_population_predicate(), inputs))
        .variables(common_variables(codelists, anchors)?)
        .build()
}
