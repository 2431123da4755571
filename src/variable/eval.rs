//! Per-patient evaluation of variable derivations.
//!
//! The external extraction engine computes variables at scale; this
//! evaluator reproduces the same semantics for a single synthetic patient
//! record so specifications can be checked before hand-off. Address,
//! practice and care-home attributes are held as a single snapshot on the
//! synthetic record, so as-of dates constrain only the dated domains.

use rustc_hash::FxHashSet;

use crate::error::Result;
use crate::expr::{Value, VariableContext};
use crate::patient::{CodedEvent, Patient};
use crate::variable::{
    AdmissionProduct, CodedEventQuery, DeathProduct, Derivation, EventProduct, MatchSelection,
    PracticeAttribute, TestOutcome, Variable,
};

impl Variable {
    /// Compute this variable's value for one patient.
    ///
    /// `ctx` holds previously computed variables, which composite
    /// derivations may reference.
    pub fn evaluate(&self, patient: &Patient, ctx: &VariableContext) -> Result<Value> {
        self.derivation.evaluate(patient, ctx)
    }
}

impl Derivation {
    /// Compute the derived value for one patient
    pub fn evaluate(&self, patient: &Patient, ctx: &VariableContext) -> Result<Value> {
        match self {
            Self::ClinicalEvents(query) => Ok(coded_event_value(query, &patient.clinical_events)),
            Self::Medications(query) => Ok(coded_event_value(query, &patient.medication_issues)),
            Self::CauseOfDeath {
                codes,
                window,
                underlying_only,
                returning,
            } => {
                let matched = patient.death.as_ref().is_some_and(|death| {
                    window.contains(death.date)
                        && (codes.contains(&death.underlying_cause)
                            || (!underlying_only
                                && death.contributory_causes.iter().any(|c| codes.contains(c))))
                });
                Ok(match returning {
                    DeathProduct::BinaryFlag => Value::Bool(matched),
                    DeathProduct::DateOfDeath => patient
                        .death
                        .as_ref()
                        .filter(|_| matched)
                        .map_or(Value::Missing, |death| Value::Date(death.date)),
                })
            }
            Self::DateOfDeath { window } => Ok(patient
                .death
                .as_ref()
                .filter(|death| window.contains(death.date))
                .map_or(Value::Missing, |death| Value::Date(death.date))),
            Self::PathogenTest {
                pathogen,
                result,
                window,
                select,
            } => {
                let dates = patient
                    .test_results
                    .iter()
                    .filter(|t| {
                        t.pathogen == *pathogen
                            && window.contains(t.date)
                            && match result {
                                TestOutcome::Any => true,
                                TestOutcome::Positive => t.positive,
                            }
                    })
                    .map(|t| t.date);
                Ok(select_date(dates, *select))
            }
            Self::HospitalAdmission {
                diagnoses,
                window,
                select,
                returning,
            } => {
                let matches = patient.admissions.iter().filter(|a| {
                    window.contains(a.admitted_on)
                        && diagnoses.as_ref().is_none_or(|codes| {
                            codes.contains(&a.primary_diagnosis)
                                || a.diagnoses.iter().any(|d| codes.contains(d))
                        })
                });
                let selected = match select {
                    MatchSelection::LastInPeriod => matches.max_by_key(|a| a.admitted_on),
                    _ => matches.min_by_key(|a| a.admitted_on),
                };
                Ok(selected.map_or(Value::Missing, |a| match returning {
                    AdmissionProduct::DateAdmitted => Value::Date(a.admitted_on),
                    AdmissionProduct::PrimaryDiagnosis => Value::Str(a.primary_diagnosis.clone()),
                }))
            }
            Self::AgeAsOf { on } => Ok(Value::Int(patient.age_on(*on))),
            Self::Sex => Ok(Value::Str(patient.sex.code().to_string())),
            Self::MostRecentBmi {
                on_or_after,
                minimum_age_at_measurement,
            } => Ok(patient
                .bmi_measurements
                .iter()
                .filter(|m| {
                    m.date >= *on_or_after
                        && patient.age_on(m.date) >= i64::from(*minimum_age_at_measurement)
                })
                .max_by_key(|m| m.date)
                .map_or(Value::Missing, |m| Value::Float(m.value))),
            Self::PracticeAsOf { on: _, returning } => {
                Ok(patient
                    .practice
                    .as_ref()
                    .map_or(Value::Missing, |practice| match returning {
                        PracticeAttribute::StpCode => Value::Str(practice.stp_code.clone()),
                        PracticeAttribute::MsoaCode => Value::Str(practice.msoa_code.clone()),
                        PracticeAttribute::PseudoId => Value::Int(practice.pseudo_id),
                    }))
            }
            Self::DeprivationIndexAsOf {
                on: _,
                round_to_nearest,
            } => Ok(patient.deprivation_index.map_or(Value::Missing, |imd| {
                Value::Int(round_to(i64::from(imd), i64::from(*round_to_nearest)))
            })),
            Self::CareHomeStatusAsOf { on: _, rules } => {
                let mut scoped = VariableContext::new();
                let care_home = patient.care_home.as_ref();
                scoped.insert(
                    "IsPotentialCareHome",
                    Value::Bool(care_home.is_some_and(|c| c.is_potential_care_home)),
                );
                scoped.insert(
                    "LocationDoesNotRequireNursing",
                    yes_no(care_home.and_then(|c| c.location_does_not_require_nursing)),
                );
                scoped.insert(
                    "LocationRequiresNursing",
                    yes_no(care_home.and_then(|c| c.location_requires_nursing)),
                );
                Ok(Value::Str(rules.assign(&scoped)?.to_string()))
            }
            Self::CategorisedAs { rules, inputs } => {
                let scoped = evaluate_inputs(patient, ctx, inputs)?;
                Ok(Value::Str(rules.assign(&scoped)?.to_string()))
            }
            Self::Satisfying { predicate, inputs } => {
                let scoped = evaluate_inputs(patient, ctx, inputs)?;
                Ok(Value::Bool(predicate.evaluate(&scoped)?))
            }
            Self::ConsultationCount { window } => Ok(Value::Int(
                patient
                    .consultations
                    .iter()
                    .filter(|d| window.contains(**d))
                    .count() as i64,
            )),
            Self::EmergencyAttendanceCount { window } => Ok(Value::Int(
                patient
                    .emergency_attendances
                    .iter()
                    .filter(|d| window.contains(**d))
                    .count() as i64,
            )),
            Self::CompleteConsultationHistoryBetween { .. } => {
                Ok(Value::Bool(patient.complete_consultation_history))
            }
            Self::RegisteredWithOnePracticeBetween { start, end } => Ok(Value::Bool(
                patient.registrations.iter().any(|r| r.covers(*start, *end)),
            )),
            Self::DeregistrationDate { on_or_before } => Ok(patient
                .deregistered_on
                .filter(|d| d <= on_or_before)
                .map_or(Value::Missing, Value::Date)),
            Self::VaccinationRecord {
                target_disease,
                window,
                select,
            } => {
                let dates = patient
                    .vaccinations
                    .iter()
                    .filter(|v| v.target_disease == *target_disease && window.contains(v.date))
                    .map(|v| v.date);
                Ok(select_date(dates, *select))
            }
        }
    }
}

fn evaluate_inputs(
    patient: &Patient,
    ctx: &VariableContext,
    inputs: &indexmap::IndexMap<String, Variable>,
) -> Result<VariableContext> {
    let mut scoped = ctx.clone();
    for (name, variable) in inputs {
        let value = variable.evaluate(patient, &scoped)?;
        scoped.insert(name, value);
    }
    Ok(scoped)
}

fn coded_event_value(query: &CodedEventQuery, events: &[CodedEvent]) -> Value {
    let ignored_days: FxHashSet<_> = query.ignore_days_with.as_ref().map_or_else(
        FxHashSet::default,
        |ignore| {
            events
                .iter()
                .filter(|e| ignore.contains(&e.code))
                .map(|e| e.date)
                .collect()
        },
    );
    let matches = events.iter().filter(|e| {
        query.codes.contains(&e.code)
            && query.window.contains(e.date)
            && !ignored_days.contains(&e.date)
    });
    let selected = match query.select {
        MatchSelection::LastInPeriod => matches.max_by_key(|e| e.date),
        _ => matches.min_by_key(|e| e.date),
    };
    match query.returning {
        EventProduct::BinaryFlag => Value::Bool(selected.is_some()),
        EventProduct::Date => selected.map_or(Value::Missing, |e| Value::Date(e.date)),
        EventProduct::Category => selected
            .and_then(|e| query.codes.category_of(&e.code))
            .map_or(Value::Missing, |c| Value::Str(c.to_string())),
        EventProduct::NumericValue => selected
            .and_then(|e| e.numeric_value)
            .map_or(Value::Missing, Value::Float),
    }
}

fn select_date(dates: impl Iterator<Item = chrono::NaiveDate>, select: MatchSelection) -> Value {
    let selected = match select {
        MatchSelection::LastInPeriod => dates.max(),
        _ => dates.min(),
    };
    selected.map_or(Value::Missing, Value::Date)
}

fn round_to(value: i64, granularity: i64) -> i64 {
    if granularity <= 1 {
        return value;
    }
    (value + granularity / 2) / granularity * granularity
}

fn yes_no(flag: Option<bool>) -> Value {
    flag.map_or(Value::Missing, |b| {
        Value::Str(if b { "Y" } else { "N" }.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use indexmap::IndexMap;

    use crate::codelist::{Codelist, CodingSystem};
    use crate::expr::Expr;
    use crate::patient::Sex;
    use crate::variable::TimeWindow;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn patient_with_events(events: Vec<CodedEvent>) -> Patient {
        let mut patient = Patient::new(1, date(1950, 6, 15), Sex::Female);
        patient.clinical_events = events;
        patient
    }

    fn af_codes() -> Codelist {
        Codelist::new("atrial fibrillation", CodingSystem::Ctv3, ["X202R", "G5730"]).unwrap()
    }

    #[test]
    fn first_match_selects_earliest_in_window() {
        let patient = patient_with_events(vec![
            CodedEvent::new("X202R", date(2018, 5, 1)),
            CodedEvent::new("G5730", date(2016, 2, 1)),
            CodedEvent::new("X202R", date(2020, 6, 1)),
        ]);
        let variable = Variable::clinical_events(
            CodedEventQuery::new(af_codes())
                .on_or_before(date(2020, 3, 1))
                .first_match()
                .returning(EventProduct::Date),
        );
        let value = variable.evaluate(&patient, &VariableContext::new()).unwrap();
        assert_eq!(value, Value::Date(date(2016, 2, 1)));
    }

    #[test]
    fn no_match_in_window_is_missing() {
        let patient = patient_with_events(vec![CodedEvent::new("X202R", date(2020, 6, 1))]);
        let variable = Variable::clinical_events(
            CodedEventQuery::new(af_codes())
                .on_or_before(date(2020, 3, 1))
                .first_match()
                .returning(EventProduct::Date),
        );
        let value = variable.evaluate(&patient, &VariableContext::new()).unwrap();
        assert_eq!(value, Value::Missing);
    }

    #[test]
    fn category_product_uses_the_codelist_mapping() {
        let smoking = Codelist::with_categories(
            "smoking",
            CodingSystem::Ctv3,
            [("137R.", "S"), ("1371.", "N")],
        )
        .unwrap();
        let patient = patient_with_events(vec![
            CodedEvent::new("137R.", date(2010, 1, 1)),
            CodedEvent::new("1371.", date(2019, 1, 1)),
        ]);
        let variable = Variable::clinical_events(
            CodedEventQuery::new(smoking)
                .on_or_before(date(2020, 2, 29))
                .last_match()
                .returning(EventProduct::Category),
        );
        let value = variable.evaluate(&patient, &VariableContext::new()).unwrap();
        assert_eq!(value, Value::Str("N".to_string()));
    }

    #[test]
    fn numeric_product_returns_the_recorded_value() {
        let creatinine = Codelist::new("creatinine", CodingSystem::Ctv3, ["XE2q5"]).unwrap();
        let patient = patient_with_events(vec![
            CodedEvent::with_value("XE2q5", date(2019, 5, 1), 58.0),
            CodedEvent::with_value("XE2q5", date(2019, 11, 1), 64.0),
        ]);
        let variable = Variable::clinical_events(
            CodedEventQuery::new(creatinine)
                .between(date(2019, 2, 28), date(2020, 2, 29))
                .last_match()
                .returning(EventProduct::NumericValue),
        );
        let value = variable.evaluate(&patient, &VariableContext::new()).unwrap();
        assert_eq!(value, Value::Float(64.0));
    }

    #[test]
    fn ignored_days_suppress_matches_on_the_same_day() {
        let given = Codelist::new("flu given", CodingSystem::Ctv3, ["65E.."]).unwrap();
        let not_given = Codelist::new("flu not given", CodingSystem::Ctv3, ["68NE."]).unwrap();
        let patient = patient_with_events(vec![
            CodedEvent::new("65E..", date(2019, 10, 1)),
            CodedEvent::new("68NE.", date(2019, 10, 1)),
            CodedEvent::new("65E..", date(2019, 12, 1)),
        ]);
        let variable = Variable::clinical_events(
            CodedEventQuery::new(given)
                .between(date(2019, 9, 1), date(2020, 2, 29))
                .first_match()
                .returning(EventProduct::Date)
                .ignoring_days_with(not_given),
        );
        let value = variable.evaluate(&patient, &VariableContext::new()).unwrap();
        assert_eq!(value, Value::Date(date(2019, 12, 1)));
    }

    #[test]
    fn deprivation_index_rounds_to_granularity() {
        let mut patient = Patient::new(1, date(1950, 6, 15), Sex::Male);
        patient.deprivation_index = Some(17349);
        let variable = Variable::new(Derivation::DeprivationIndexAsOf {
            on: date(2020, 2, 29),
            round_to_nearest: 100,
        });
        let value = variable.evaluate(&patient, &VariableContext::new()).unwrap();
        assert_eq!(value, Value::Int(17300));
    }

    #[test]
    fn consultation_count_respects_the_window() {
        let mut patient = Patient::new(1, date(1950, 6, 15), Sex::Male);
        patient.consultations = vec![date(2019, 5, 1), date(2019, 8, 12), date(2018, 1, 1)];
        let variable = Variable::new(Derivation::ConsultationCount {
            window: TimeWindow::Between(date(2019, 3, 1), date(2020, 2, 29)),
        });
        let value = variable.evaluate(&patient, &VariableContext::new()).unwrap();
        assert_eq!(value, Value::Int(2));
    }

    #[test]
    fn satisfying_composes_local_inputs_with_outer_context() {
        let warfarin = Codelist::new("warfarin", CodingSystem::Snomed, ["321"]).unwrap();
        let mut patient = Patient::new(1, date(1950, 6, 15), Sex::Male);
        patient.medication_issues = vec![CodedEvent::new("321", date(2019, 12, 1))];

        let mut inputs = IndexMap::new();
        inputs.insert(
            "recent_warfarin".to_string(),
            Variable::medications(
                CodedEventQuery::new(warfarin)
                    .between(date(2019, 11, 1), date(2020, 2, 29))
                    .last_match()
                    .returning(EventProduct::Date),
            ),
        );
        let variable = Variable::new(Derivation::Satisfying {
            predicate: Expr::And(vec![Expr::var("recent_warfarin"), Expr::var("eligible")]),
            inputs,
        });

        let mut ctx = VariableContext::new();
        ctx.insert("eligible", Value::Bool(true));
        let value = variable.evaluate(&patient, &ctx).unwrap();
        assert_eq!(value, Value::Bool(true));
    }
}
