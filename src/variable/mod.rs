//! Variable definitions.
//!
//! A variable is a per-patient derived value: a derivation rule over one or
//! more codelists plus temporal constraints, with an optional categorization
//! ruleset and an optional simulated-data expectation descriptor. The
//! derivation kinds form a closed set; each maps onto one retrieval family
//! of the external extraction engine.

pub mod categorise;
mod eval;
pub mod expectations;

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::codelist::Codelist;
use crate::expr::Expr;

pub use categorise::{CategoryRule, CategoryRules};
pub use expectations::{
    CategoryRatios, DateBound, DateExpectation, Expectations, FloatDistribution, IntDistribution,
    Rate,
};

/// Attribute names a care-home categorization rule may reference
pub const CARE_HOME_ATTRIBUTES: [&str; 3] = [
    "IsPotentialCareHome",
    "LocationDoesNotRequireNursing",
    "LocationRequiresNursing",
];

/// Temporal constraint on which records a derivation may match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeWindow {
    /// No temporal constraint
    Unbounded,
    /// Records dated on or before the given day
    OnOrBefore(NaiveDate),
    /// Records dated on or after the given day
    OnOrAfter(NaiveDate),
    /// Records dated within the closed interval
    Between(NaiveDate, NaiveDate),
}

impl TimeWindow {
    /// Whether a record date satisfies the constraint
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        match self {
            Self::Unbounded => true,
            Self::OnOrBefore(end) => date <= *end,
            Self::OnOrAfter(start) => date >= *start,
            Self::Between(start, end) => date >= *start && date <= *end,
        }
    }
}

/// Which matching record a derivation selects when several qualify
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSelection {
    /// Any matching record (used for presence flags)
    Any,
    /// The earliest matching record in the period
    FirstInPeriod,
    /// The latest matching record in the period
    LastInPeriod,
}

/// What a coded-event derivation returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventProduct {
    /// The date of the selected record
    Date,
    /// Whether any record matched
    BinaryFlag,
    /// The codelist category of the selected record's code
    Category,
    /// The numeric value attached to the selected record
    NumericValue,
}

/// Output resolution of a returned date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateFormat {
    /// Full day resolution
    Day,
    /// Truncated to year and month
    Month,
}

/// What a death-certificate derivation returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeathProduct {
    /// Whether any certified cause matched
    BinaryFlag,
    /// The date of death
    DateOfDeath,
}

/// What a hospital-admission derivation returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionProduct {
    /// The admission date
    DateAdmitted,
    /// The primary diagnosis code of the selected admission
    PrimaryDiagnosis,
}

/// Which attribute of the registered practice to return
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PracticeAttribute {
    /// Sustainability and transformation partnership code
    StpCode,
    /// Middle layer super output area code
    MsoaCode,
    /// Pseudonymized practice identifier
    PseudoId,
}

/// Filter on pathogen test results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestOutcome {
    /// Any result
    Any,
    /// Positive results only
    Positive,
}

/// A query over dated coded records (clinical events or medication issues)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodedEventQuery {
    /// Codes that qualify a record
    pub codes: Codelist,
    /// Temporal constraint on record dates
    pub window: TimeWindow,
    /// Which qualifying record to select
    pub select: MatchSelection,
    /// Output shape
    pub returning: EventProduct,
    /// Resolution of a returned date
    pub date_format: DateFormat,
    /// Records on days where any of these codes occur are ignored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore_days_with: Option<Codelist>,
    /// Whether the extraction engine should also emit the match date
    pub include_date_of_match: bool,
}

impl CodedEventQuery {
    /// Query defaults: unbounded window, presence flag, day resolution
    #[must_use]
    pub fn new(codes: Codelist) -> Self {
        Self {
            codes,
            window: TimeWindow::Unbounded,
            select: MatchSelection::Any,
            returning: EventProduct::BinaryFlag,
            date_format: DateFormat::Day,
            ignore_days_with: None,
            include_date_of_match: false,
        }
    }

    /// Constrain to records on or before a day
    #[must_use]
    pub fn on_or_before(mut self, date: NaiveDate) -> Self {
        self.window = TimeWindow::OnOrBefore(date);
        self
    }

    /// Constrain to records on or after a day
    #[must_use]
    pub fn on_or_after(mut self, date: NaiveDate) -> Self {
        self.window = TimeWindow::OnOrAfter(date);
        self
    }

    /// Constrain to records within a closed interval
    #[must_use]
    pub fn between(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.window = TimeWindow::Between(start, end);
        self
    }

    /// Select the earliest qualifying record
    #[must_use]
    pub fn first_match(mut self) -> Self {
        self.select = MatchSelection::FirstInPeriod;
        self
    }

    /// Select the latest qualifying record
    #[must_use]
    pub fn last_match(mut self) -> Self {
        self.select = MatchSelection::LastInPeriod;
        self
    }

    /// Set the output shape
    #[must_use]
    pub fn returning(mut self, product: EventProduct) -> Self {
        self.returning = product;
        self
    }

    /// Truncate a returned date to year and month
    #[must_use]
    pub fn month_resolution(mut self) -> Self {
        self.date_format = DateFormat::Month;
        self
    }

    /// Also emit the date of the selected match
    #[must_use]
    pub fn include_date_of_match(mut self) -> Self {
        self.include_date_of_match = true;
        self
    }

    /// Ignore records on days where any of these codes occur
    #[must_use]
    pub fn ignoring_days_with(mut self, codes: Codelist) -> Self {
        self.ignore_days_with = Some(codes);
        self
    }
}

/// The closed set of derivation kinds a variable may use
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Derivation {
    /// Coded primary-care clinical events
    ClinicalEvents(CodedEventQuery),
    /// Coded medication issues
    Medications(CodedEventQuery),
    /// Codes certified on the death certificate
    CauseOfDeath {
        /// Codes that qualify a certificate
        codes: Codelist,
        /// Constraint on the date of death
        window: TimeWindow,
        /// Match the underlying cause only, not contributory causes
        underlying_only: bool,
        /// Output shape
        returning: DeathProduct,
    },
    /// Death from any cause
    DateOfDeath {
        /// Constraint on the date of death
        window: TimeWindow,
    },
    /// Pathogen test results from the national testing dataset
    PathogenTest {
        /// Pathogen the test must target
        pathogen: String,
        /// Result filter
        result: TestOutcome,
        /// Constraint on specimen dates
        window: TimeWindow,
        /// Which qualifying test to select
        select: MatchSelection,
    },
    /// Hospital admissions, optionally restricted by diagnosis codes
    HospitalAdmission {
        /// Diagnosis codes an admission must carry, if restricted
        diagnoses: Option<Codelist>,
        /// Constraint on admission dates
        window: TimeWindow,
        /// Which qualifying admission to select
        select: MatchSelection,
        /// Output shape
        returning: AdmissionProduct,
    },
    /// Completed years of age on a date
    AgeAsOf {
        /// Reference date
        on: NaiveDate,
    },
    /// Recorded sex
    Sex,
    /// Most recent BMI measurement
    MostRecentBmi {
        /// Earliest measurement date considered
        on_or_after: NaiveDate,
        /// Minimum age at measurement for a value to count
        minimum_age_at_measurement: u32,
    },
    /// Attribute of the practice the patient is registered with
    PracticeAsOf {
        /// Reference date
        on: NaiveDate,
        /// Which attribute to return
        returning: PracticeAttribute,
    },
    /// Index of multiple deprivation of the patient's address
    DeprivationIndexAsOf {
        /// Reference date
        on: NaiveDate,
        /// Rounding granularity applied for disclosure control
        round_to_nearest: u32,
    },
    /// Care-home status categorized from address-register attributes
    CareHomeStatusAsOf {
        /// Reference date
        on: NaiveDate,
        /// Ordered first-match-wins categorization rules
        rules: CategoryRules,
    },
    /// Categorization over named sub-variables
    CategorisedAs {
        /// Ordered first-match-wins categorization rules
        rules: CategoryRules,
        /// Sub-variables the rules may reference, computed first
        inputs: IndexMap<String, Variable>,
    },
    /// Boolean composition of an expression over other variables
    Satisfying {
        /// The boolean expression
        predicate: Expr,
        /// Local sub-variables the expression may reference
        inputs: IndexMap<String, Variable>,
    },
    /// Number of GP consultations in a period
    ConsultationCount {
        /// Constraint on consultation dates
        window: TimeWindow,
    },
    /// Number of A&E attendances in a period
    EmergencyAttendanceCount {
        /// Constraint on attendance dates
        window: TimeWindow,
    },
    /// Whether a complete GP consultation history is held over an interval
    CompleteConsultationHistoryBetween {
        /// First day of the interval
        start: NaiveDate,
        /// Last day of the interval
        end: NaiveDate,
    },
    /// Continuous registration with one practice over an interval
    RegisteredWithOnePracticeBetween {
        /// First day of the interval
        start: NaiveDate,
        /// Last day of the interval
        end: NaiveDate,
    },
    /// Date deregistered from all supported practices
    DeregistrationDate {
        /// Latest deregistration date considered
        on_or_before: NaiveDate,
    },
    /// Vaccination administration records for a target disease
    VaccinationRecord {
        /// Target disease to match
        target_disease: String,
        /// Constraint on administration dates
        window: TimeWindow,
        /// Which qualifying record to select
        select: MatchSelection,
    },
}

/// A named derived value: derivation rule plus expectation descriptor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variable {
    /// How the value is derived
    pub derivation: Derivation,
    /// Simulated-data descriptor for dry runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expectations: Option<Expectations>,
}

impl Variable {
    /// A variable with no expectation descriptor
    #[must_use]
    pub fn new(derivation: Derivation) -> Self {
        Self {
            derivation,
            expectations: None,
        }
    }

    /// A clinical-events variable
    #[must_use]
    pub fn clinical_events(query: CodedEventQuery) -> Self {
        Self::new(Derivation::ClinicalEvents(query))
    }

    /// A medication-issues variable
    #[must_use]
    pub fn medications(query: CodedEventQuery) -> Self {
        Self::new(Derivation::Medications(query))
    }

    /// Attach a simulated-data expectation descriptor
    #[must_use]
    pub fn with_expectations(mut self, expectations: Expectations) -> Self {
        self.expectations = Some(expectations);
        self
    }
}
