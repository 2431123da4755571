//! Attrition flow-chart specifications.
//!
//! Each cohort has a flow-chart variant whose population is unconditional:
//! every gating variable of the full cohort is still computed, but as a
//! reportable column rather than an inclusion filter, so the attrition at
//! each successive filter stage can be tabulated downstream. The gating
//! variables are pulled from the shared library to guarantee they carry
//! the same derivations as the full cohort.

use indexmap::IndexMap;

use crate::codelists::StudyCodelists;
use crate::error::{Result, StudyDefError};
use crate::study::atrial_fibrillation::registration_history;
use crate::study::{common_variables, Population, StudyAnchors, StudyDefinition};
use crate::variable::{Expectations, Rate, Variable};

/// Gating variables of the atrial fibrillation cohort, reported over all
/// patients
pub fn af_population_flow_chart(
    codelists: &StudyCodelists,
    anchors: &StudyAnchors,
) -> Result<StudyDefinition> {
    flow_chart(
        "af_population_flow_chart",
        codelists,
        anchors,
        &["af", "age", "imd"],
    )
}

/// Gating variables of the general-population cohort, reported over all
/// patients
pub fn general_population_flow_chart(
    codelists: &StudyCodelists,
    anchors: &StudyAnchors,
) -> Result<StudyDefinition> {
    flow_chart(
        "general_population_flow_chart",
        codelists,
        anchors,
        &[
            "age",
            "sex",
            "imd",
            "gp_consult_count",
            "af",
            "lmwh_last_four_months",
            "warfarin_last_four_months",
            "doac_last_four_months",
        ],
    )
}

fn flow_chart(
    name: &str,
    codelists: &StudyCodelists,
    anchors: &StudyAnchors,
    gating: &[&str],
) -> Result<StudyDefinition> {
    let common = common_variables(codelists, anchors)?;
    let mut variables = IndexMap::new();
    variables.insert(
        "registration_history".to_string(),
        registration_history(anchors).with_expectations(Expectations::new().incidence(0.9)),
    );
    for gate in gating {
        let variable: &Variable =
            common
                .get(*gate)
                .ok_or_else(|| StudyDefError::UndefinedVariable {
                    name: (*gate).to_string(),
                    referenced_by: name.to_string(),
                })?;
        variables.insert((*gate).to_string(), variable.clone());
    }

    StudyDefinition::builder(name)
        .default_expectations(
            Expectations::new()
                .date_until_today(chrono::NaiveDate::from_ymd_opt(1900, 1, 1).unwrap())
                .rate(Rate::Uniform)
                .incidence(0.5),
        )
        .population(Population::All)
        .variables(variables)
        .build()
}
