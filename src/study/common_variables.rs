//! The shared variable library.
//!
//! Demographics, comorbidities, exposures and outcomes reused by every
//! cohort in the study. Each study spreads this block into its own variable
//! set and may override entries by redeclaring the same name.

use indexmap::IndexMap;

use crate::codelist::Codelist;
use crate::codelists::StudyCodelists;
use crate::error::Result;
use crate::expr::Expr;
use crate::study::StudyAnchors;
use crate::variable::{
    AdmissionProduct, CategoryRule, CategoryRules, CodedEventQuery, DeathProduct, Derivation,
    EventProduct, Expectations, MatchSelection, PracticeAttribute, Rate, TestOutcome, TimeWindow,
    Variable,
};

/// Labels of the monthly follow-up exposure windows, March through
/// September of the index year
pub const FOLLOW_UP_MONTH_LABELS: [&str; 7] = ["march", "apr", "may", "jun", "jul", "aug", "sep"];

/// Build the shared variable block for a given registry and set of anchors
pub fn common_variables(
    codelists: &StudyCodelists,
    anchors: &StudyAnchors,
) -> Result<IndexMap<String, Variable>> {
    let index_date = anchors.index_date;
    let baseline_end = anchors.baseline_end();
    let lookback = (anchors.lookback_start(), baseline_end);
    let exposure = anchors.exposure_window();
    let flu_season = anchors.flu_season();

    // Condition history: earliest (or latest) diagnosis on record at baseline
    let condition = |codes: &Codelist, select: MatchSelection| {
        let query = CodedEventQuery::new(codes.clone())
            .on_or_before(baseline_end)
            .returning(EventProduct::Date)
            .month_resolution();
        let query = match select {
            MatchSelection::LastInPeriod => query.last_match(),
            _ => query.first_match(),
        };
        Variable::clinical_events(query)
            .with_expectations(Expectations::new().date_latest(baseline_end))
    };
    let first_condition =
        |codes: &Codelist| condition(codes, MatchSelection::FirstInPeriod);
    let last_condition = |codes: &Codelist| condition(codes, MatchSelection::LastInPeriod);

    // Medication use over the four-month exposure window
    let exposure_medication = |codes: &Codelist| {
        Variable::medications(
            CodedEventQuery::new(codes.clone())
                .between(exposure.0, exposure.1)
                .last_match()
                .returning(EventProduct::Date)
                .month_resolution(),
        )
        .with_expectations(Expectations::new().date_between(exposure.0, exposure.1))
    };

    // Certified cause of death on or after the index date
    let cause_of_death = |codes: Codelist| {
        Variable::new(Derivation::CauseOfDeath {
            codes,
            window: TimeWindow::OnOrAfter(index_date),
            underlying_only: true,
            returning: DeathProduct::DateOfDeath,
        })
        .with_expectations(Expectations::new().date_earliest(index_date).incidence(0.95))
    };

    let mut vars: IndexMap<String, Variable> = IndexMap::new();

    vars.insert(
        "dereg_date".into(),
        Variable::new(Derivation::DeregistrationDate {
            on_or_before: anchors.deregistration_cutoff(),
        })
        .with_expectations(Expectations::new().date_earliest(index_date)),
    );

    // Inclusion criteria
    vars.insert(
        "af".into(),
        Variable::clinical_events(
            CodedEventQuery::new(codelists.atrial_fibrillation.clone())
                .on_or_before(index_date)
                .first_match()
                .returning(EventProduct::Date)
                .month_resolution(),
        )
        .with_expectations(Expectations::new().date_latest(index_date)),
    );
    // Exclusion criteria
    vars.insert(
        "valvular_AF".into(),
        Variable::clinical_events(
            CodedEventQuery::new(codelists.valvular_af.clone())
                .on_or_before(baseline_end)
                .first_match()
                .returning(EventProduct::Date)
                .month_resolution(),
        )
        .with_expectations(Expectations::new().date_latest(baseline_end)),
    );
    vars.insert(
        "antiphospholipid_syndrome".into(),
        Variable::clinical_events(
            CodedEventQuery::new(codelists.antiphospholipid_syndrome.clone())
                .on_or_before(baseline_end)
                .first_match()
                .returning(EventProduct::Date)
                .month_resolution(),
        )
        .with_expectations(Expectations::new().date_latest(baseline_end)),
    );

    // Outcomes
    vars.insert(
        "died_ons_covid_flag_any".into(),
        Variable::new(Derivation::CauseOfDeath {
            codes: codelists.covid_identification.clone(),
            window: TimeWindow::OnOrAfter(index_date),
            underlying_only: false,
            returning: DeathProduct::BinaryFlag,
        })
        .with_expectations(Expectations::new().date_earliest(index_date)),
    );
    vars.insert(
        "died_ons_covid_flag_underlying".into(),
        Variable::new(Derivation::CauseOfDeath {
            codes: codelists.covid_identification.clone(),
            window: TimeWindow::OnOrAfter(index_date),
            underlying_only: true,
            returning: DeathProduct::BinaryFlag,
        })
        .with_expectations(Expectations::new().date_earliest(index_date)),
    );
    vars.insert(
        "died_date_ons".into(),
        Variable::new(Derivation::DateOfDeath {
            window: TimeWindow::OnOrAfter(index_date),
        })
        .with_expectations(Expectations::new().date_earliest(index_date)),
    );
    vars.insert(
        "first_tested_for_covid".into(),
        Variable::new(Derivation::PathogenTest {
            pathogen: "SARS-CoV-2".into(),
            result: TestOutcome::Any,
            window: TimeWindow::OnOrAfter(index_date),
            select: MatchSelection::FirstInPeriod,
        })
        .with_expectations(
            Expectations::new()
                .date_earliest(index_date)
                .rate(Rate::ExponentialIncrease),
        ),
    );
    vars.insert(
        "first_positive_test_date".into(),
        Variable::new(Derivation::PathogenTest {
            pathogen: "SARS-CoV-2".into(),
            result: TestOutcome::Positive,
            window: TimeWindow::OnOrAfter(index_date),
            select: MatchSelection::FirstInPeriod,
        })
        .with_expectations(
            Expectations::new()
                .date_earliest(index_date)
                .rate(Rate::ExponentialIncrease),
        ),
    );
    vars.insert(
        "covid_admission_date".into(),
        Variable::new(Derivation::HospitalAdmission {
            diagnoses: Some(codelists.covid_identification.clone()),
            window: TimeWindow::OnOrAfter(index_date),
            select: MatchSelection::FirstInPeriod,
            returning: AdmissionProduct::DateAdmitted,
        })
        .with_expectations(Expectations::new().date_earliest(index_date).incidence(0.95)),
    );
    vars.insert(
        "covid_admission_primary_dx".into(),
        Variable::new(Derivation::HospitalAdmission {
            diagnoses: Some(codelists.covid_identification.clone()),
            window: TimeWindow::OnOrAfter(index_date),
            select: MatchSelection::FirstInPeriod,
            returning: AdmissionProduct::PrimaryDiagnosis,
        })
        .with_expectations(
            Expectations::new()
                .date_earliest(index_date)
                .incidence(0.95)
                .category_ratios([("U071", 0.5), ("U072", 0.5)]),
        ),
    );

    // Other outcomes for causes of death
    vars.insert(
        "mi_date_ons".into(),
        cause_of_death(codelists.mi_ons.filter_by_category(&["1"])?),
    );
    vars.insert(
        "stroke_date_ons".into(),
        cause_of_death(codelists.stroke_ons.filter_by_category(&["ischaemic"])?),
    );
    vars.insert("vte_date_ons".into(), cause_of_death(codelists.vte_ons.clone()));
    vars.insert(
        "gi_bleed_date_ons".into(),
        cause_of_death(codelists.gi_bleed_ons.clone()),
    );
    vars.insert(
        "intracranial_bleed_date_ons".into(),
        cause_of_death(codelists.stroke_ons.filter_by_category(&["haemorrhagic"])?),
    );

    // Anticoagulant exposure over the four months before the index date
    vars.insert("lmwh_last_four_months".into(), exposure_medication(&codelists.lmwh));
    vars.insert(
        "warfarin_last_four_months".into(),
        Variable::medications(
            CodedEventQuery::new(codelists.warfarin.clone())
                .between(exposure.0, exposure.1)
                .last_match()
                .returning(EventProduct::Date),
        )
        .with_expectations(Expectations::new().date_between(exposure.0, exposure.1)),
    );
    vars.insert(
        "doac_last_four_months".into(),
        Variable::medications(
            CodedEventQuery::new(codelists.doac.clone())
                .between(exposure.0, exposure.1)
                .last_match()
                .returning(EventProduct::Date),
        )
        .with_expectations(Expectations::new().date_between(exposure.0, exposure.1)),
    );

    // Time-updated oral anticoagulant exposure over the follow-up months
    for (offset, label) in FOLLOW_UP_MONTH_LABELS.iter().enumerate() {
        let (start, end) = anchors.follow_up_month(offset as u32);
        for (drug, codes) in [("warfarin", &codelists.warfarin), ("doac", &codelists.doac)] {
            vars.insert(
                format!("{drug}_{label}_first"),
                Variable::medications(
                    CodedEventQuery::new((*codes).clone())
                        .between(start, end)
                        .first_match()
                        .returning(EventProduct::Date),
                )
                .with_expectations(Expectations::new().date_between(start, end)),
            );
        }
        for (drug, codes) in [("warfarin", &codelists.warfarin), ("doac", &codelists.doac)] {
            vars.insert(
                format!("{drug}_{label}_last"),
                Variable::medications(
                    CodedEventQuery::new((*codes).clone())
                        .between(start, end)
                        .last_match()
                        .returning(EventProduct::Date),
                )
                .with_expectations(Expectations::new().date_between(start, end)),
            );
        }
    }

    // Covariates
    vars.insert(
        "age".into(),
        Variable::new(Derivation::AgeAsOf { on: index_date }).with_expectations(
            Expectations::new().rate(Rate::Universal).int_population_ages(),
        ),
    );
    vars.insert(
        "sex".into(),
        Variable::new(Derivation::Sex).with_expectations(
            Expectations::new()
                .rate(Rate::Universal)
                .category_ratios([("M", 0.49), ("F", 0.51)]),
        ),
    );
    vars.insert(
        "bmi".into(),
        Variable::new(Derivation::MostRecentBmi {
            on_or_after: anchors.bmi_floor(),
            minimum_age_at_measurement: 16,
        })
        .with_expectations(Expectations::new().incidence(0.6).float_normal(35.0, 10.0)),
    );
    vars.insert(
        "stp".into(),
        Variable::new(Derivation::PracticeAsOf {
            on: baseline_end,
            returning: PracticeAttribute::StpCode,
        })
        .with_expectations(
            Expectations::new()
                .rate(Rate::Universal)
                .category_ratios([("STP1", 0.5), ("STP2", 0.5)]),
        ),
    );
    vars.insert(
        "msoa".into(),
        Variable::new(Derivation::PracticeAsOf {
            on: baseline_end,
            returning: PracticeAttribute::MsoaCode,
        })
        .with_expectations(
            Expectations::new()
                .rate(Rate::Universal)
                .category_ratios([("MSOA1", 0.5), ("MSOA2", 0.5)]),
        ),
    );
    vars.insert(
        "practice_id".into(),
        Variable::new(Derivation::PracticeAsOf {
            on: index_date,
            returning: PracticeAttribute::PseudoId,
        })
        .with_expectations(Expectations::new().int_normal(1000.0, 100.0).incidence(1.0)),
    );
    vars.insert(
        "care_home_type".into(),
        Variable::new(Derivation::CareHomeStatusAsOf {
            on: index_date,
            rules: care_home_rules(),
        })
        .with_expectations(
            Expectations::new().rate(Rate::Universal).category_ratios([
                ("PC", 0.01),
                ("PN", 0.01),
                ("PS", 0.01),
                ("U", 0.97),
            ]),
        ),
    );
    vars.insert(
        "imd".into(),
        Variable::new(Derivation::DeprivationIndexAsOf {
            on: baseline_end,
            round_to_nearest: 100,
        })
        .with_expectations(
            Expectations::new()
                .rate(Rate::Universal)
                .category_ratios([("100", 0.1), ("200", 0.2), ("300", 0.7)]),
        ),
    );
    vars.insert(
        "ethnicity".into(),
        Variable::clinical_events(
            CodedEventQuery::new(codelists.ethnicity.clone())
                .last_match()
                .returning(EventProduct::Category),
        )
        .with_expectations(
            Expectations::new()
                .category_ratios([("1", 0.8), ("5", 0.1), ("3", 0.1)])
                .incidence(0.75),
        ),
    );

    // Smoking
    let mut smoking_inputs = IndexMap::new();
    smoking_inputs.insert(
        "most_recent_smoking_code".to_string(),
        Variable::clinical_events(
            CodedEventQuery::new(codelists.clear_smoking.clone())
                .on_or_before(baseline_end)
                .last_match()
                .returning(EventProduct::Category),
        ),
    );
    smoking_inputs.insert(
        "ever_smoked".to_string(),
        Variable::clinical_events(
            CodedEventQuery::new(codelists.clear_smoking.filter_by_category(&["S", "E"])?)
                .on_or_before(baseline_end),
        ),
    );
    vars.insert(
        "smoking_status".into(),
        Variable::new(Derivation::CategorisedAs {
            rules: smoking_rules(),
            inputs: smoking_inputs,
        })
        .with_expectations(Expectations::new().category_ratios([
            ("S", 0.6),
            ("E", 0.1),
            ("N", 0.2),
            ("M", 0.1),
        ])),
    );
    vars.insert(
        "smoking_status_date".into(),
        last_condition(&codelists.clear_smoking),
    );

    vars.insert(
        "hazardous_alcohol".into(),
        last_condition(&codelists.hazardous_alcohol),
    );
    vars.insert("hypertension".into(), first_condition(&codelists.hypertension));
    vars.insert("heart_failure".into(), first_condition(&codelists.heart_failure));
    vars.insert("dementia".into(), first_condition(&codelists.dementia));
    vars.insert("diabetes".into(), first_condition(&codelists.diabetes));
    vars.insert(
        "hba1c_mmol_per_mol".into(),
        Variable::clinical_events(
            CodedEventQuery::new(codelists.hba1c_new.clone())
                .on_or_before(baseline_end)
                .last_match()
                .returning(EventProduct::NumericValue)
                .include_date_of_match()
                .month_resolution(),
        )
        .with_expectations(
            Expectations::new()
                .date_latest(baseline_end)
                .float_normal(40.0, 20.0)
                .incidence(0.95),
        ),
    );
    vars.insert(
        "hba1c_percentage".into(),
        Variable::clinical_events(
            CodedEventQuery::new(codelists.hba1c_old.clone())
                .on_or_before(baseline_end)
                .last_match()
                .returning(EventProduct::NumericValue)
                .include_date_of_match()
                .month_resolution(),
        )
        .with_expectations(
            Expectations::new()
                .date_latest(baseline_end)
                .float_normal(5.0, 2.0)
                .incidence(0.95),
        ),
    );
    vars.insert("copd".into(), first_condition(&codelists.copd));
    vars.insert(
        "other_respiratory".into(),
        first_condition(&codelists.other_respiratory),
    );
    vars.insert(
        "cancer".into(),
        first_condition(&Codelist::combine(
            "cancer",
            &[
                &codelists.lung_cancer,
                &codelists.haem_cancer,
                &codelists.other_cancer,
            ],
        )?),
    );
    vars.insert(
        "permanent_immunodeficiency".into(),
        last_condition(&Codelist::combine(
            "permanent immunodeficiency",
            &[
                &codelists.hiv,
                &codelists.permanent_immunosuppression,
                &codelists.sickle_cell,
                &codelists.organ_transplant,
                &codelists.asplenia,
            ],
        )?),
    );
    vars.insert(
        "aplastic_anaemia".into(),
        Variable::clinical_events(
            CodedEventQuery::new(codelists.aplastic_anaemia.clone())
                .between(lookback.0, lookback.1)
                .last_match()
                .returning(EventProduct::Date)
                .month_resolution(),
        )
        .with_expectations(Expectations::new().date_between(lookback.0, lookback.1)),
    );
    vars.insert(
        "temporary_immunodeficiency".into(),
        Variable::clinical_events(
            CodedEventQuery::new(codelists.temporary_immunosuppression.clone())
                .between(lookback.0, lookback.1)
                .last_match()
                .returning(EventProduct::Date)
                .month_resolution(),
        )
        .with_expectations(Expectations::new().date_between(lookback.0, lookback.1)),
    );

    // Renal function
    let measurement_year = anchors.measurement_year();
    vars.insert(
        "creatinine".into(),
        Variable::clinical_events(
            CodedEventQuery::new(codelists.creatinine.clone())
                .between(measurement_year.0, measurement_year.1)
                .last_match()
                .returning(EventProduct::NumericValue)
                .include_date_of_match()
                .month_resolution(),
        )
        .with_expectations(
            Expectations::new()
                .float_normal(60.0, 30.0)
                .date_between(measurement_year.0, measurement_year.1)
                .incidence(0.95),
        ),
    );
    vars.insert("esrf".into(), last_condition(&codelists.esrf));

    let measurement_decade = anchors.measurement_decade();
    vars.insert(
        "has_bled_score".into(),
        Variable::clinical_events(
            CodedEventQuery::new(codelists.has_bled.clone())
                .between(measurement_decade.0, measurement_decade.1)
                .last_match()
                .returning(EventProduct::NumericValue)
                .include_date_of_match()
                .month_resolution(),
        )
        .with_expectations(
            Expectations::new()
                .float_normal(4.0, 1.0)
                .date_between(measurement_year.0, measurement_year.1)
                .incidence(0.95),
        ),
    );

    vars.insert("stroke".into(), last_condition(&codelists.stroke));
    vars.insert("tia".into(), last_condition(&codelists.tia));
    vars.insert(
        "myocardial_infarct".into(),
        last_condition(&codelists.myocardial_infarction),
    );
    vars.insert(
        "pad".into(),
        last_condition(&codelists.peripheral_arterial_disease),
    );
    vars.insert("vte".into(), last_condition(&codelists.vte));

    // Flu vaccination status
    vars.insert(
        "flu_vaccine_tpp_table".into(),
        Variable::new(Derivation::VaccinationRecord {
            target_disease: "INFLUENZA".into(),
            window: TimeWindow::Between(flu_season.0, flu_season.1),
            select: MatchSelection::FirstInPeriod,
        })
        .with_expectations(Expectations::new().date_between(flu_season.0, flu_season.1)),
    );
    vars.insert(
        "flu_vaccine_med".into(),
        Variable::medications(
            CodedEventQuery::new(codelists.flu_medication.clone())
                .between(flu_season.0, flu_season.1)
                .last_match()
                .returning(EventProduct::Date),
        )
        .with_expectations(Expectations::new().date_between(flu_season.0, flu_season.1)),
    );
    vars.insert(
        "flu_vaccine_clinical".into(),
        Variable::clinical_events(
            CodedEventQuery::new(codelists.flu_clinical_given.clone())
                .ignoring_days_with(codelists.flu_clinical_not_given.clone())
                .between(flu_season.0, flu_season.1)
                .first_match()
                .returning(EventProduct::Date)
                .month_resolution(),
        )
        .with_expectations(Expectations::new().date_between(flu_season.0, flu_season.1)),
    );
    vars.insert(
        "flu_vaccine".into(),
        Variable::new(Derivation::Satisfying {
            predicate: Expr::Or(vec![
                Expr::var("flu_vaccine_tpp_table"),
                Expr::var("flu_vaccine_med"),
                Expr::var("flu_vaccine_clinical"),
            ]),
            inputs: IndexMap::new(),
        }),
    );

    // Service use over the previous year
    vars.insert(
        "ae_attendance_last_year".into(),
        Variable::new(Derivation::EmergencyAttendanceCount {
            window: TimeWindow::Between(lookback.0, lookback.1),
        })
        .with_expectations(
            Expectations::new()
                .int_normal(2.0, 2.0)
                .date_between(lookback.0, lookback.1)
                .incidence(0.3),
        ),
    );
    vars.insert(
        "gp_consult_count".into(),
        Variable::new(Derivation::ConsultationCount {
            window: TimeWindow::Between(lookback.0, lookback.1),
        })
        .with_expectations(
            Expectations::new()
                .int_normal(4.0, 2.0)
                .date_between(lookback.0, lookback.1)
                .incidence(0.7),
        ),
    );
    vars.insert(
        "has_consultation_history".into(),
        Variable::new(Derivation::CompleteConsultationHistoryBetween {
            start: lookback.0,
            end: lookback.1,
        })
        .with_expectations(Expectations::new().incidence(0.9)),
    );

    // Other drug use over the exposure window
    vars.insert("oestrogen".into(), exposure_medication(&codelists.oestrogen));
    vars.insert("antiplatelet".into(), exposure_medication(&codelists.antiplatelet));
    vars.insert("aspirins".into(), exposure_medication(&codelists.aspirin));
    vars.insert("nsaid".into(), exposure_medication(&codelists.nsaid));

    Ok(vars)
}

/// Smoking status: current, ex (including never codes with earlier smoking
/// history), never, missing
fn smoking_rules() -> CategoryRules {
    CategoryRules::new(
        vec![
            CategoryRule::new("S", Expr::eq_str("most_recent_smoking_code", "S")),
            CategoryRule::new(
                "E",
                Expr::Or(vec![
                    Expr::eq_str("most_recent_smoking_code", "E"),
                    Expr::And(vec![
                        Expr::eq_str("most_recent_smoking_code", "N"),
                        Expr::var("ever_smoked"),
                    ]),
                ]),
            ),
            CategoryRule::new(
                "N",
                Expr::And(vec![
                    Expr::eq_str("most_recent_smoking_code", "N"),
                    Expr::Not(Box::new(Expr::var("ever_smoked"))),
                ]),
            ),
        ],
        "M",
    )
}

/// Care-home categories: residential, nursing, unclassified care home,
/// and not in a care home
fn care_home_rules() -> CategoryRules {
    CategoryRules::new(
        vec![
            CategoryRule::new(
                "PC",
                Expr::And(vec![
                    Expr::var("IsPotentialCareHome"),
                    Expr::eq_str("LocationDoesNotRequireNursing", "Y"),
                    Expr::eq_str("LocationRequiresNursing", "N"),
                ]),
            ),
            CategoryRule::new(
                "PN",
                Expr::And(vec![
                    Expr::var("IsPotentialCareHome"),
                    Expr::eq_str("LocationDoesNotRequireNursing", "N"),
                    Expr::eq_str("LocationRequiresNursing", "Y"),
                ]),
            ),
            CategoryRule::new("PS", Expr::var("IsPotentialCareHome")),
        ],
        "U",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn follow_up_exposure_variables_cover_every_month() {
        let codelists = testing::study_codelists();
        let anchors = testing::anchors();
        let vars = common_variables(&codelists, &anchors).unwrap();
        for label in FOLLOW_UP_MONTH_LABELS {
            for drug in ["warfarin", "doac"] {
                assert!(vars.contains_key(&format!("{drug}_{label}_first")));
                assert!(vars.contains_key(&format!("{drug}_{label}_last")));
            }
        }
    }

    #[test]
    fn composite_flu_variable_follows_its_components() {
        let codelists = testing::study_codelists();
        let anchors = testing::anchors();
        let vars = common_variables(&codelists, &anchors).unwrap();
        let names: Vec<_> = vars.keys().map(String::as_str).collect();
        let flu = names.iter().position(|n| *n == "flu_vaccine").unwrap();
        for component in ["flu_vaccine_tpp_table", "flu_vaccine_med", "flu_vaccine_clinical"] {
            let position = names.iter().position(|n| *n == component).unwrap();
            assert!(position < flu);
        }
    }

    #[test]
    fn shared_block_has_a_stable_surface() {
        let codelists = testing::study_codelists();
        let anchors = testing::anchors();
        let vars = common_variables(&codelists, &anchors).unwrap();
        for name in [
            "dereg_date",
            "af",
            "valvular_AF",
            "age",
            "sex",
            "imd",
            "practice_id",
            "smoking_status",
            "care_home_type",
            "gp_consult_count",
            "flu_vaccine",
            "nsaid",
        ] {
            assert!(vars.contains_key(name), "missing shared variable {name}");
        }
    }
}
