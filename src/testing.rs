//! Synthetic fixtures for exercising study definitions.
//!
//! A small in-memory codelist registry and hand-built patient records,
//! enough to evaluate every variable and population predicate without any
//! reference files. Used by the test suites and for dry runs of the
//! specifications.

use chrono::NaiveDate;

use crate::codelist::{Codelist, CodingSystem};
use crate::codelists::StudyCodelists;
use crate::patient::{
    CareHomeAttributes, CodedEvent, Patient, PracticeAttributes, RegistrationEpisode, Sex,
};
use crate::study::StudyAnchors;

/// The study anchors used throughout the fixtures
#[must_use]
pub fn anchors() -> StudyAnchors {
    StudyAnchors::for_index_date(date(2020, 3, 1))
}

/// A calendar day; panics on an invalid date, which is acceptable in
/// fixture code
#[must_use]
pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

fn ctv3(name: &str, codes: &[&str]) -> Codelist {
    Codelist::new(name, CodingSystem::Ctv3, codes.iter().copied()).unwrap()
}

fn snomed(name: &str, codes: &[&str]) -> Codelist {
    Codelist::new(name, CodingSystem::Snomed, codes.iter().copied()).unwrap()
}

fn icd10(name: &str, codes: &[&str]) -> Codelist {
    Codelist::new(name, CodingSystem::Icd10, codes.iter().copied()).unwrap()
}

/// A complete synthetic codelist registry with a handful of codes per list
#[must_use]
pub fn study_codelists() -> StudyCodelists {
    StudyCodelists {
        covid_identification: icd10("covid identification", &["U071", "U072"]),
        ethnicity: Codelist::with_categories(
            "ethnicity",
            CodingSystem::Ctv3,
            [("XaJSe", "1"), ("XaJSg", "3"), ("XaJSj", "5")],
        )
        .unwrap(),
        clear_smoking: Codelist::with_categories(
            "smoking clear",
            CodingSystem::Ctv3,
            [("137R.", "S"), ("137S.", "E"), ("1371.", "N")],
        )
        .unwrap(),
        unclear_smoking: Codelist::with_categories(
            "smoking unclear",
            CodingSystem::Ctv3,
            [("137X.", "S"), ("137c.", "E")],
        )
        .unwrap(),
        hazardous_alcohol: ctv3("hazardous alcohol", &["136S.", "E23.."]),
        heart_failure: ctv3("heart failure", &["G58..", "G580."]),
        hypertension: ctv3("hypertension", &["G20..", "XE0Ub"]),
        diabetes: ctv3("diabetes", &["C10..", "X40J4"]),
        hba1c_new: ctv3("hba1c mmol/mol", &["XaPbt", "Xaeze", "Xaezd"]),
        hba1c_old: ctv3("hba1c percentage", &["X772q", "XaERo", "XaERp"]),
        lung_cancer: ctv3("lung cancer", &["B22z.", "B220."]),
        haem_cancer: ctv3("haematological cancer", &["B627.", "B64.."]),
        other_cancer: ctv3("other cancer", &["B1...", "B490."]),
        aplastic_anaemia: ctv3("aplastic anaemia", &["D2100"]),
        hiv: ctv3("hiv", &["A788."]),
        permanent_immunosuppression: ctv3("permanent immunosuppression", &["Xa9BS"]),
        organ_transplant: ctv3("solid organ transplantation", &["7B00."]),
        asplenia: ctv3("asplenia", &["7J36y"]),
        sickle_cell: ctv3("sickle cell disease", &["D570."]),
        temporary_immunosuppression: ctv3("temporary immunosuppression", &["x00Rt"]),
        stroke: ctv3("stroke", &["G66..", "XE0VE"]),
        tia: ctv3("transient ischaemic attack", &["G65.."]),
        antiphospholipid_syndrome: ctv3("antiphospholipid syndrome", &["Nyu43"]),
        peripheral_arterial_disease: ctv3("peripheral arterial disease", &["G73z."]),
        valvular_af: ctv3("valvular atrial fibrillation", &["G5703"]),
        creatinine: ctv3("creatinine", &["XE2q5"]),
        has_bled: ctv3("has-bled score", &["XaY6z"]),
        esrf: ctv3("end stage renal failure", &["K05..", "XaEGa"]),
        copd: ctv3("copd", &["H3...", "X101i"]),
        other_respiratory: ctv3("other respiratory conditions", &["H5640"]),
        myocardial_infarction: ctv3("myocardial infarction", &["G30..", "X200E"]),
        vte: ctv3("venous thromboembolic disease", &["G801.", "X202z"]),
        atrial_fibrillation: ctv3("atrial fibrillation", &["X202R", "G5730"]),
        dementia: ctv3("dementia", &["E00..", "Xaagi"]),
        flu_medication: snomed("influenza vaccination medication", &["1057371000001101"]),
        flu_clinical_given: ctv3("influenza vaccination given", &["65E..", "XaZfs"]),
        flu_clinical_not_given: ctv3("influenza vaccination not given", &["68NE."]),
        warfarin: snomed("warfarin", &["319735006", "319734005"]),
        doac: snomed("direct acting oral anticoagulants", &["428383001", "700109004"]),
        lmwh: snomed("low molecular weight heparins", &["9510301000001106"]),
        oestrogen: snomed("oestrogen and oestrogen-like drugs", &["9511201000001102"]),
        antiplatelet: snomed("antiplatelets", &["9512401000001104"]),
        aspirin: snomed("aspirin", &["319773006"]),
        nsaid: snomed("oral nsaids", &["329738004"]),
        mi_ons: Codelist::with_categories(
            "cardiovascular causes of death",
            CodingSystem::Icd10,
            [("I21", "1"), ("I22", "1"), ("I50", "0")],
        )
        .unwrap(),
        stroke_ons: Codelist::with_categories(
            "stroke causes of death",
            CodingSystem::Icd10,
            [("I63", "ischaemic"), ("I61", "haemorrhagic")],
        )
        .unwrap(),
        gi_bleed_ons: icd10("gastrointestinal bleeding causes of death", &["K920", "K922"]),
        vte_ons: icd10("venous thromboembolism causes of death", &["I26", "I801"]),
    }
}

fn registered_patient(patient_id: u64, date_of_birth: NaiveDate, sex: Sex) -> Patient {
    let mut patient = Patient::new(patient_id, date_of_birth, sex);
    patient.registrations = vec![RegistrationEpisode {
        practice_id: 1042,
        start: date(2012, 4, 1),
        end: None,
    }];
    patient.practice = Some(PracticeAttributes {
        pseudo_id: 1042,
        stp_code: "STP1".to_string(),
        msoa_code: "MSOA1".to_string(),
    });
    patient.deprivation_index = Some(3200);
    patient.care_home = Some(CareHomeAttributes {
        is_potential_care_home: false,
        location_does_not_require_nursing: None,
        location_requires_nursing: None,
    });
    patient.consultations = vec![date(2019, 5, 14), date(2019, 11, 2)];
    patient.complete_consultation_history = true;
    patient
}

/// A patient satisfying the atrial fibrillation cohort: diagnosed before
/// the index date, on warfarin over the exposure window
#[must_use]
pub fn af_case() -> Patient {
    let mut patient = registered_patient(1, date(1949, 7, 12), Sex::Female);
    patient.clinical_events = vec![
        CodedEvent::new("X202R", date(2018, 9, 3)),
        CodedEvent::new("G20..", date(2014, 2, 10)),
    ];
    patient.medication_issues = vec![
        CodedEvent::new("319735006", date(2019, 12, 18)),
        CodedEvent::new("319735006", date(2020, 2, 11)),
    ];
    patient
}

/// A patient satisfying the general-population cohort: consulting, no
/// atrial fibrillation diagnosis, no anticoagulant exposure
#[must_use]
pub fn general_population_control() -> Patient {
    let mut patient = registered_patient(2, date(1952, 3, 30), Sex::Male);
    patient.clinical_events = vec![CodedEvent::new("G20..", date(2016, 6, 20))];
    patient
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_registry_covers_every_codelist() {
        let codelists = study_codelists();
        assert!(!codelists.atrial_fibrillation.is_empty());
        assert_eq!(codelists.mi_ons.category_of("I21"), Some("1"));
        assert_eq!(codelists.stroke_ons.categories(), vec!["haemorrhagic", "ischaemic"]);
    }

    #[test]
    fn fixture_patients_are_registered_through_baseline() {
        let a = anchors();
        for patient in [af_case(), general_population_control()] {
            assert!(patient
                .registrations
                .iter()
                .any(|r| r.covers(a.registration_start(), a.baseline_end())));
        }
    }
}
