//! Calendar anchors for a study.
//!
//! Every time-windowed derivation in the study hangs off a single index
//! date. Deriving the other anchors from it here, rather than repeating
//! date literals at each declaration site, keeps the windows consistent if
//! the index date ever moves.

use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// The study's fixed calendar anchors, all derived from one index date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyAnchors {
    /// The study index date
    pub index_date: NaiveDate,
}

impl StudyAnchors {
    /// Anchors for a given index date
    #[must_use]
    pub const fn for_index_date(index_date: NaiveDate) -> Self {
        Self { index_date }
    }

    /// Last day of baseline, the day before the index date
    #[must_use]
    pub fn baseline_end(&self) -> NaiveDate {
        self.index_date - Days::new(1)
    }

    /// Start of the continuous-registration window, one year before the
    /// end of baseline
    #[must_use]
    pub fn registration_start(&self) -> NaiveDate {
        self.baseline_end() - Months::new(12)
    }

    /// Start of the one-year lookback used for consultation and attendance
    /// counts
    #[must_use]
    pub fn lookback_start(&self) -> NaiveDate {
        self.index_date - Months::new(12)
    }

    /// The four-month medication exposure window ending at baseline
    #[must_use]
    pub fn exposure_window(&self) -> (NaiveDate, NaiveDate) {
        (self.index_date - Months::new(4), self.baseline_end())
    }

    /// The current influenza season, from six months before the index date
    /// to the end of baseline
    #[must_use]
    pub fn flu_season(&self) -> (NaiveDate, NaiveDate) {
        (self.index_date - Months::new(6), self.baseline_end())
    }

    /// Earliest BMI measurement date considered, ten years before the
    /// index date
    #[must_use]
    pub fn bmi_floor(&self) -> NaiveDate {
        self.index_date - Months::new(120)
    }

    /// The one-year measurement window ending at baseline, used for
    /// creatinine
    #[must_use]
    pub fn measurement_year(&self) -> (NaiveDate, NaiveDate) {
        (self.baseline_end() - Months::new(12), self.baseline_end())
    }

    /// The ten-year window ending at baseline, used for HAS-BLED scores
    #[must_use]
    pub fn measurement_decade(&self) -> (NaiveDate, NaiveDate) {
        (self.baseline_end() - Months::new(120), self.baseline_end())
    }

    /// Latest deregistration date captured, nine months after the index
    /// date
    #[must_use]
    pub fn deregistration_cutoff(&self) -> NaiveDate {
        self.index_date + Months::new(9)
    }

    /// The calendar month starting `offset` months after the index date
    #[must_use]
    pub fn follow_up_month(&self, offset: u32) -> (NaiveDate, NaiveDate) {
        let start = self.index_date + Months::new(offset);
        let end = start + Months::new(1) - Days::new(1);
        (start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchors() -> StudyAnchors {
        StudyAnchors::for_index_date(NaiveDate::from_ymd_opt(2020, 3, 1).unwrap())
    }

    #[test]
    fn derived_anchors_match_the_study_calendar() {
        let a = anchors();
        let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day).unwrap();
        assert_eq!(a.baseline_end(), d(2020, 2, 29));
        assert_eq!(a.registration_start(), d(2019, 2, 28));
        assert_eq!(a.lookback_start(), d(2019, 3, 1));
        assert_eq!(a.exposure_window(), (d(2019, 11, 1), d(2020, 2, 29)));
        assert_eq!(a.flu_season(), (d(2019, 9, 1), d(2020, 2, 29)));
        assert_eq!(a.bmi_floor(), d(2010, 3, 1));
        assert_eq!(a.measurement_year(), (d(2019, 2, 28), d(2020, 2, 29)));
        assert_eq!(a.measurement_decade(), (d(2010, 2, 28), d(2020, 2, 29)));
        assert_eq!(a.deregistration_cutoff(), d(2020, 12, 1));
    }

    #[test]
    fn follow_up_months_span_whole_calendar_months() {
        let a = anchors();
        let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day).unwrap();
        assert_eq!(a.follow_up_month(0), (d(2020, 3, 1), d(2020, 3, 31)));
        assert_eq!(a.follow_up_month(1), (d(2020, 4, 1), d(2020, 4, 30)));
        assert_eq!(a.follow_up_month(6), (d(2020, 9, 1), d(2020, 9, 30)));
    }
}
