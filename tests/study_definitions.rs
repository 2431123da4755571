//! End-to-end checks of the four study specifications: structural
//! consistency, population semantics over synthetic patients, and the
//! flow-chart/full-cohort correspondence.

use std::collections::HashSet;

use cohort_def::testing;
use cohort_def::{
    af_population_flow_chart, atrial_fibrillation_cohort, general_population_cohort,
    general_population_flow_chart, Population, StudyDefinition, Value,
};

fn all_studies() -> Vec<StudyDefinition> {
    let codelists = testing::study_codelists();
    let anchors = testing::anchors();
    vec![
        atrial_fibrillation_cohort(&codelists, &anchors).unwrap(),
        general_population_cohort(&codelists, &anchors).unwrap(),
        af_population_flow_chart(&codelists, &anchors).unwrap(),
        general_population_flow_chart(&codelists, &anchors).unwrap(),
    ]
}

#[test]
fn every_specification_builds_and_resolves_its_references() {
    // Building runs full validation: duplicate names, predicate and rule
    // references, expectation descriptors.
    let studies = all_studies();
    assert_eq!(studies.len(), 4);
    for study in &studies {
        for name in study.gating_variables() {
            assert!(
                study.has_variable(&name),
                "{}: unresolved gating variable {name}",
                study.name()
            );
        }
    }
}

#[test]
fn full_cohorts_share_the_common_variable_block() {
    let studies = all_studies();
    let af_names: HashSet<_> = studies[0].variables().keys().cloned().collect();
    let gp_names: HashSet<_> = studies[1].variables().keys().cloned().collect();
    assert_eq!(af_names, gp_names);
    assert_eq!(studies[0].variables().len(), 90);
}

#[test]
fn af_case_is_included_only_in_the_af_cohort() {
    let studies = all_studies();
    let case = testing::af_case();

    let af_row = studies[0].evaluate(&case).unwrap();
    assert!(af_row.in_population);
    assert!(matches!(af_row.values.get("af"), Some(Value::Date(_))));

    // The general-population predicate requires the absence of the AF
    // cohort's core exposure criteria.
    let gp_row = studies[1].evaluate(&case).unwrap();
    assert!(!gp_row.in_population);
}

#[test]
fn consulting_control_is_included_only_in_the_general_population() {
    let studies = all_studies();
    let control = testing::general_population_control();

    let af_row = studies[0].evaluate(&control).unwrap();
    assert!(!af_row.in_population);
    assert_eq!(af_row.values.get("af"), Some(&Value::Missing));

    let gp_row = studies[1].evaluate(&control).unwrap();
    assert!(gp_row.in_population);
    assert_eq!(gp_row.values.get("gp_consult_count"), Some(&Value::Int(2)));
}

#[test]
fn anticoagulant_exposure_excludes_a_control_from_the_general_population() {
    let studies = all_studies();
    let mut control = testing::general_population_control();
    control.medication_issues.push(cohort_def::patient::CodedEvent::new(
        "428383001",
        testing::date(2020, 1, 15),
    ));

    let gp_row = studies[1].evaluate(&control).unwrap();
    assert!(matches!(
        gp_row.values.get("doac_last_four_months"),
        Some(Value::Date(_))
    ));
    assert!(!gp_row.in_population);
}

#[test]
fn flow_charts_accept_all_patients() {
    let studies = all_studies();
    for flow in &studies[2..] {
        assert!(matches!(flow.population(), Population::All));
        let case = testing::af_case();
        let control = testing::general_population_control();
        assert!(flow.evaluate(&case).unwrap().in_population);
        assert!(flow.evaluate(&control).unwrap().in_population);
    }
}

#[test]
fn flow_charts_compute_exactly_the_gating_variables_of_their_cohort() {
    let studies = all_studies();
    for (full, flow) in [(&studies[0], &studies[2]), (&studies[1], &studies[3])] {
        assert!(matches!(full.population(), Population::Satisfying { .. }));
        let gating = full.gating_variables();
        let reported: HashSet<String> = flow.variables().keys().cloned().collect();
        assert_eq!(reported, gating, "{} vs {}", full.name(), flow.name());
    }
}

#[test]
fn flow_chart_gating_variables_carry_the_same_derivations() {
    let studies = all_studies();
    for (full, flow) in [(&studies[0], &studies[2]), (&studies[1], &studies[3])] {
        for (name, variable) in flow.variables() {
            let counterpart = match full.variables().get(name) {
                Some(v) => v.clone(),
                // Population-local variables live on the predicate, not in
                // the study's variable set.
                None => match full.population() {
                    Population::Satisfying { inputs, .. } => inputs[name].clone(),
                    Population::All => unreachable!(),
                },
            };
            let left = serde_json::to_value(&variable.derivation).unwrap();
            let right = serde_json::to_value(&counterpart.derivation).unwrap();
            assert_eq!(left, right, "{}: derivation of {name} diverged", flow.name());
        }
    }
}

#[test]
fn specifications_serialize_for_the_extraction_engine() {
    let studies = all_studies();
    let json = studies[0].to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["name"], "af");
    // The specification is consumed wholesale, codes included.
    let af_codes = &value["variables"]["af"]["derivation"]["clinical_events"]["codes"]["codes"];
    assert!(af_codes.as_array().unwrap().iter().any(|c| c == "X202R"));
}

#[test]
fn evaluated_rows_report_every_variable_in_declaration_order() {
    let studies = all_studies();
    let row = studies[0].evaluate(&testing::af_case()).unwrap();
    let row_names: Vec<_> = row.values.keys().cloned().collect();
    let declared: Vec<_> = studies[0].variables().keys().cloned().collect();
    assert_eq!(row_names, declared);
}
