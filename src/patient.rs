//! Synthetic per-patient records.
//!
//! The real study runs against an external record store; this crate never
//! reads patient data. These types exist so a study definition can be
//! exercised end to end against constructed records: the evaluator computes
//! every variable and the population verdict for one `Patient` at a time,
//! which is how specifications are validated and tested before hand-off.

use chrono::{Datelike, NaiveDate};

/// Patient sex as recorded in the primary-care record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sex {
    /// Female
    Female,
    /// Male
    Male,
}

impl Sex {
    /// Single-letter code used in predicates and matching files
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Female => "F",
            Self::Male => "M",
        }
    }
}

/// A dated coded record: a clinical event or a medication issue
#[derive(Debug, Clone)]
pub struct CodedEvent {
    /// The recorded code
    pub code: String,
    /// Date the event was recorded
    pub date: NaiveDate,
    /// Numeric value attached to the event, e.g. a test result
    pub numeric_value: Option<f64>,
}

impl CodedEvent {
    /// A coded event without a numeric value
    #[must_use]
    pub fn new(code: &str, date: NaiveDate) -> Self {
        Self {
            code: code.to_string(),
            date,
            numeric_value: None,
        }
    }

    /// A coded event carrying a numeric value
    #[must_use]
    pub fn with_value(code: &str, date: NaiveDate, value: f64) -> Self {
        Self {
            code: code.to_string(),
            date,
            numeric_value: Some(value),
        }
    }
}

/// A death registration with its certified causes
#[derive(Debug, Clone)]
pub struct DeathRecord {
    /// Date of death
    pub date: NaiveDate,
    /// Underlying cause of death (ICD-10)
    pub underlying_cause: String,
    /// Contributory causes mentioned on the certificate (ICD-10)
    pub contributory_causes: Vec<String>,
}

/// A hospital admission with its diagnosis codes
#[derive(Debug, Clone)]
pub struct Admission {
    /// Date of admission
    pub admitted_on: NaiveDate,
    /// Primary diagnosis (ICD-10)
    pub primary_diagnosis: String,
    /// All coded diagnoses for the spell (ICD-10)
    pub diagnoses: Vec<String>,
}

/// A pathogen test result from the national testing dataset
#[derive(Debug, Clone)]
pub struct PathogenTestResult {
    /// Specimen date
    pub date: NaiveDate,
    /// Pathogen tested for
    pub pathogen: String,
    /// Whether the result was positive
    pub positive: bool,
}

/// A continuous registration episode at one practice
#[derive(Debug, Clone)]
pub struct RegistrationEpisode {
    /// Pseudonymized practice identifier
    pub practice_id: i64,
    /// First day of the episode
    pub start: NaiveDate,
    /// Last day of the episode, if it has ended
    pub end: Option<NaiveDate>,
}

impl RegistrationEpisode {
    /// Whether this episode covers the whole closed interval
    #[must_use]
    pub fn covers(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start <= start && self.end.is_none_or(|episode_end| episode_end >= end)
    }
}

/// Attributes of the registered practice
#[derive(Debug, Clone)]
pub struct PracticeAttributes {
    /// Pseudonymized practice identifier
    pub pseudo_id: i64,
    /// Sustainability and transformation partnership code
    pub stp_code: String,
    /// Middle layer super output area code
    pub msoa_code: String,
}

/// Care-home attributes from the address register
#[derive(Debug, Clone)]
pub struct CareHomeAttributes {
    /// Whether the address is flagged as a potential care home
    pub is_potential_care_home: bool,
    /// Whether the location is recorded as not requiring nursing
    pub location_does_not_require_nursing: Option<bool>,
    /// Whether the location is recorded as requiring nursing
    pub location_requires_nursing: Option<bool>,
}

/// A dated BMI measurement
#[derive(Debug, Clone)]
pub struct BmiMeasurement {
    /// Measurement date
    pub date: NaiveDate,
    /// Body mass index
    pub value: f64,
}

/// A vaccination administration record
#[derive(Debug, Clone)]
pub struct VaccinationRecord {
    /// Administration date
    pub date: NaiveDate,
    /// Target disease of the vaccine
    pub target_disease: String,
}

/// One patient's synthetic record across every consumed data domain
#[derive(Debug, Clone)]
pub struct Patient {
    /// Pseudonymized patient identifier
    pub patient_id: u64,
    /// Date of birth
    pub date_of_birth: NaiveDate,
    /// Recorded sex
    pub sex: Sex,
    /// Coded primary-care clinical events
    pub clinical_events: Vec<CodedEvent>,
    /// Coded medication issues
    pub medication_issues: Vec<CodedEvent>,
    /// Death registration, if the patient has died
    pub death: Option<DeathRecord>,
    /// Hospital admissions
    pub admissions: Vec<Admission>,
    /// Pathogen test results
    pub test_results: Vec<PathogenTestResult>,
    /// Practice registration history
    pub registrations: Vec<RegistrationEpisode>,
    /// Date deregistered from all supported practices, if any
    pub deregistered_on: Option<NaiveDate>,
    /// Attributes of the registered practice
    pub practice: Option<PracticeAttributes>,
    /// Index of multiple deprivation for the patient's address
    pub deprivation_index: Option<u32>,
    /// Care-home attributes of the patient's address
    pub care_home: Option<CareHomeAttributes>,
    /// BMI measurement history
    pub bmi_measurements: Vec<BmiMeasurement>,
    /// GP consultation dates
    pub consultations: Vec<NaiveDate>,
    /// A&E attendance dates
    pub emergency_attendances: Vec<NaiveDate>,
    /// Whether a complete GP consultation history is held for the patient
    pub complete_consultation_history: bool,
    /// Vaccination administration records
    pub vaccinations: Vec<VaccinationRecord>,
}

impl Patient {
    /// Create a patient record with no clinical history
    #[must_use]
    pub fn new(patient_id: u64, date_of_birth: NaiveDate, sex: Sex) -> Self {
        Self {
            patient_id,
            date_of_birth,
            sex,
            clinical_events: Vec::new(),
            medication_issues: Vec::new(),
            death: None,
            admissions: Vec::new(),
            test_results: Vec::new(),
            registrations: Vec::new(),
            deregistered_on: None,
            practice: None,
            deprivation_index: None,
            care_home: None,
            bmi_measurements: Vec::new(),
            consultations: Vec::new(),
            emergency_attendances: Vec::new(),
            complete_consultation_history: false,
            vaccinations: Vec::new(),
        }
    }

    /// Completed years of age on a date
    #[must_use]
    pub fn age_on(&self, date: NaiveDate) -> i64 {
        let mut age = i64::from(date.year() - self.date_of_birth.year());
        if (date.month(), date.day()) < (self.date_of_birth.month(), self.date_of_birth.day()) {
            age -= 1;
        }
        age
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn age_counts_completed_years() {
        let patient = Patient::new(
            1,
            NaiveDate::from_ymd_opt(1950, 6, 15).unwrap(),
            Sex::Female,
        );
        assert_eq!(patient.age_on(NaiveDate::from_ymd_opt(2020, 6, 14).unwrap()), 69);
        assert_eq!(patient.age_on(NaiveDate::from_ymd_opt(2020, 6, 15).unwrap()), 70);
    }

    #[test]
    fn registration_episode_coverage() {
        let episode = RegistrationEpisode {
            practice_id: 42,
            start: NaiveDate::from_ymd_opt(2015, 1, 1).unwrap(),
            end: None,
        };
        assert!(episode.covers(
            NaiveDate::from_ymd_opt(2019, 2, 28).unwrap(),
            NaiveDate::from_ymd_opt(2020, 2, 29).unwrap()
        ));
        let closed = RegistrationEpisode {
            practice_id: 42,
            start: NaiveDate::from_ymd_opt(2019, 6, 1).unwrap(),
            end: Some(NaiveDate::from_ymd_opt(2019, 12, 1).unwrap()),
        };
        assert!(!closed.covers(
            NaiveDate::from_ymd_opt(2019, 2, 28).unwrap(),
            NaiveDate::from_ymd_opt(2020, 2, 29).unwrap()
        ));
    }
}
