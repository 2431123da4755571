//! The study's codelist registry.
//!
//! Every codelist the variable library draws on, registered against its
//! reference file, coding system and column layout. Loading is all-or-
//! nothing: a missing file or column fails the whole registry.

use std::path::Path;

use crate::codelist::{Codelist, CodelistSource, CodingSystem};
use crate::error::Result;

/// The named codelists used across the study definitions
#[derive(Debug, Clone)]
pub struct StudyCodelists {
    // Outcomes
    /// COVID-19 identification (ICD-10)
    pub covid_identification: Codelist,
    // Demographics
    /// Ethnicity, categorized into six groups
    pub ethnicity: Codelist,
    // Smoking
    /// Smoking status codes with clear current/ex/never categories
    pub clear_smoking: Codelist,
    /// Smoking status codes whose category is unclear
    pub unclear_smoking: Codelist,
    /// Hazardous alcohol use
    pub hazardous_alcohol: Codelist,
    // Clinical conditions
    /// Heart failure
    pub heart_failure: Codelist,
    /// Hypertension
    pub hypertension: Codelist,
    /// Diabetes
    pub diabetes: Codelist,
    /// HbA1c measurements in mmol/mol
    pub hba1c_new: Codelist,
    /// HbA1c measurements as a percentage
    pub hba1c_old: Codelist,
    /// Lung cancer
    pub lung_cancer: Codelist,
    /// Haematological cancer
    pub haem_cancer: Codelist,
    /// Cancer excluding lung and haematological
    pub other_cancer: Codelist,
    /// Aplastic anaemia
    pub aplastic_anaemia: Codelist,
    /// HIV
    pub hiv: Codelist,
    /// Permanent immunosuppression
    pub permanent_immunosuppression: Codelist,
    /// Solid organ transplantation
    pub organ_transplant: Codelist,
    /// Asplenia
    pub asplenia: Codelist,
    /// Sickle cell disease
    pub sickle_cell: Codelist,
    /// Temporary immunosuppression
    pub temporary_immunosuppression: Codelist,
    /// Stroke
    pub stroke: Codelist,
    /// Transient ischaemic attack
    pub tia: Codelist,
    /// Antiphospholipid syndrome
    pub antiphospholipid_syndrome: Codelist,
    /// Peripheral arterial disease
    pub peripheral_arterial_disease: Codelist,
    /// Valvular atrial fibrillation
    pub valvular_af: Codelist,
    /// Creatinine measurements
    pub creatinine: Codelist,
    /// HAS-BLED score records
    pub has_bled: Codelist,
    /// End stage renal failure including dialysis and transplant
    pub esrf: Codelist,
    /// Current COPD
    pub copd: Codelist,
    /// Other respiratory conditions
    pub other_respiratory: Codelist,
    /// Myocardial infarction
    pub myocardial_infarction: Codelist,
    /// Venous thromboembolic disease
    pub vte: Codelist,
    /// Atrial fibrillation clinical finding
    pub atrial_fibrillation: Codelist,
    /// Dementia
    pub dementia: Codelist,
    // Vaccination
    /// Influenza vaccination medication codes
    pub flu_medication: Codelist,
    /// Influenza vaccination clinical codes, vaccine given
    pub flu_clinical_given: Codelist,
    /// Influenza vaccination clinical codes, vaccine not given
    pub flu_clinical_not_given: Codelist,
    // Medications
    /// Warfarin
    pub warfarin: Codelist,
    /// Direct acting oral anticoagulants
    pub doac: Codelist,
    /// Low molecular weight heparins
    pub lmwh: Codelist,
    /// Oestrogen and oestrogen-like drugs
    pub oestrogen: Codelist,
    /// Antiplatelets
    pub antiplatelet: Codelist,
    /// Aspirin
    pub aspirin: Codelist,
    /// Oral NSAIDs
    pub nsaid: Codelist,
    // Secondary-care death certificate codelists
    /// Cardiovascular causes of death, categorized by MI flag
    pub mi_ons: Codelist,
    /// Stroke causes of death, categorized by type
    pub stroke_ons: Codelist,
    /// Gastrointestinal bleeding causes of death
    pub gi_bleed_ons: Codelist,
    /// Venous thromboembolism causes of death
    pub vte_ons: Codelist,
}

impl StudyCodelists {
    /// Load every registered codelist from a reference directory.
    ///
    /// Fails fast on the first missing file or column; no partial registry
    /// is ever produced.
    pub fn load(dir: &Path) -> Result<Self> {
        log::info!("loading study codelists from {}", dir.display());

        let ctv3 = CodingSystem::Ctv3;
        let snomed = CodingSystem::Snomed;
        let icd10 = CodingSystem::Icd10;

        Ok(Self {
            covid_identification: CodelistSource::new(
                "covid identification",
                "opensafely-covid-identification.csv",
                icd10,
                "icd10_code",
            )
            .load(dir)?,
            ethnicity: CodelistSource::new("ethnicity", "opensafely-ethnicity.csv", ctv3, "Code")
                .with_category_column("Grouping_6")
                .load(dir)?,
            clear_smoking: CodelistSource::new(
                "smoking clear",
                "opensafely-smoking-clear.csv",
                ctv3,
                "CTV3Code",
            )
            .with_category_column("Category")
            .load(dir)?,
            unclear_smoking: CodelistSource::new(
                "smoking unclear",
                "opensafely-smoking-unclear.csv",
                ctv3,
                "CTV3Code",
            )
            .with_category_column("Category")
            .load(dir)?,
            hazardous_alcohol: CodelistSource::new(
                "hazardous alcohol",
                "opensafely-hazardous-alcohol-drinking.csv",
                ctv3,
                "code",
            )
            .load(dir)?,
            heart_failure: CodelistSource::new(
                "heart failure",
                "opensafely-heart-failure.csv",
                ctv3,
                "CTV3ID",
            )
            .load(dir)?,
            hypertension: CodelistSource::new(
                "hypertension",
                "opensafely-hypertension.csv",
                ctv3,
                "CTV3ID",
            )
            .load(dir)?,
            diabetes: CodelistSource::new("diabetes", "opensafely-diabetes.csv", ctv3, "CTV3ID")
                .load(dir)?,
            hba1c_new: Codelist::new("hba1c mmol/mol", ctv3, ["XaPbt", "Xaeze", "Xaezd"])?,
            hba1c_old: Codelist::new("hba1c percentage", ctv3, ["X772q", "XaERo", "XaERp"])?,
            lung_cancer: CodelistSource::new(
                "lung cancer",
                "opensafely-lung-cancer.csv",
                ctv3,
                "CTV3ID",
            )
            .load(dir)?,
            haem_cancer: CodelistSource::new(
                "haematological cancer",
                "opensafely-haematological-cancer.csv",
                ctv3,
                "CTV3ID",
            )
            .load(dir)?,
            other_cancer: CodelistSource::new(
                "other cancer",
                "opensafely-cancer-excluding-lung-and-haematological.csv",
                ctv3,
                "CTV3ID",
            )
            .load(dir)?,
            aplastic_anaemia: CodelistSource::new(
                "aplastic anaemia",
                "opensafely-aplastic-anaemia.csv",
                ctv3,
                "CTV3ID",
            )
            .load(dir)?,
            hiv: CodelistSource::new("hiv", "opensafely-hiv.csv", ctv3, "CTV3ID").load(dir)?,
            permanent_immunosuppression: CodelistSource::new(
                "permanent immunosuppression",
                "opensafely-permanent-immunosuppression.csv",
                ctv3,
                "CTV3ID",
            )
            .load(dir)?,
            organ_transplant: CodelistSource::new(
                "solid organ transplantation",
                "opensafely-solid-organ-transplantation.csv",
                ctv3,
                "CTV3ID",
            )
            .load(dir)?,
            asplenia: CodelistSource::new("asplenia", "opensafely-asplenia.csv", ctv3, "CTV3ID")
                .load(dir)?,
            sickle_cell: CodelistSource::new(
                "sickle cell disease",
                "opensafely-sickle-cell-disease.csv",
                ctv3,
                "CTV3ID",
            )
            .load(dir)?,
            temporary_immunosuppression: CodelistSource::new(
                "temporary immunosuppression",
                "opensafely-temporary-immunosuppression.csv",
                ctv3,
                "CTV3ID",
            )
            .load(dir)?,
            stroke: CodelistSource::new("stroke", "opensafely-stroke-updated.csv", ctv3, "CTV3ID")
                .load(dir)?,
            tia: CodelistSource::new(
                "transient ischaemic attack",
                "opensafely-transient-ischaemic-attack.csv",
                ctv3,
                "code",
            )
            .load(dir)?,
            antiphospholipid_syndrome: CodelistSource::new(
                "antiphospholipid syndrome",
                "opensafely-antiphospholipid-syndrome.csv",
                ctv3,
                "code",
            )
            .load(dir)?,
            peripheral_arterial_disease: CodelistSource::new(
                "peripheral arterial disease",
                "opensafely-peripheral-arterial-disease.csv",
                ctv3,
                "code",
            )
            .load(dir)?,
            valvular_af: CodelistSource::new(
                "valvular atrial fibrillation",
                "opensafely-valvular-atrial-fibrillation.csv",
                ctv3,
                "code",
            )
            .load(dir)?,
            creatinine: Codelist::new("creatinine", ctv3, ["XE2q5"])?,
            has_bled: Codelist::new("has-bled score", ctv3, ["XaY6z"])?,
            // An imperfect source list, kept as is for consistency until
            // https://github.com/ebmdatalab/opencodelists/issues/39 is resolved.
            esrf: CodelistSource::new(
                "end stage renal failure",
                "opensafely-chronic-kidney-disease.csv",
                ctv3,
                "CTV3ID",
            )
            .load(dir)?,
            copd: CodelistSource::new("copd", "opensafely-current-copd.csv", ctv3, "CTV3ID")
                .load(dir)?,
            other_respiratory: CodelistSource::new(
                "other respiratory conditions",
                "opensafely-other-respiratory-conditions.csv",
                ctv3,
                "CTV3ID",
            )
            .load(dir)?,
            myocardial_infarction: CodelistSource::new(
                "myocardial infarction",
                "opensafely-myocardial-infarction.csv",
                ctv3,
                "CTV3ID",
            )
            .load(dir)?,
            vte: CodelistSource::new(
                "venous thromboembolic disease",
                "opensafely-venous-thromboembolic-disease.csv",
                ctv3,
                "CTV3Code",
            )
            .load(dir)?,
            atrial_fibrillation: CodelistSource::new(
                "atrial fibrillation",
                "opensafely-atrial-fibrillation-clinical-finding.csv",
                ctv3,
                "CTV3Code",
            )
            .load(dir)?,
            dementia: CodelistSource::new(
                "dementia",
                "opensafely-dementia-complete.csv",
                ctv3,
                "code",
            )
            .load(dir)?,
            flu_medication: CodelistSource::new(
                "influenza vaccination medication",
                "opensafely-influenza-vaccination.csv",
                snomed,
                "snomed_id",
            )
            .load(dir)?,
            flu_clinical_given: CodelistSource::new(
                "influenza vaccination given",
                "opensafely-influenza-vaccination-clinical-codes-given.csv",
                ctv3,
                "CTV3ID",
            )
            .load(dir)?,
            flu_clinical_not_given: CodelistSource::new(
                "influenza vaccination not given",
                "opensafely-influenza-vaccination-clinical-codes-not-given.csv",
                ctv3,
                "CTV3ID",
            )
            .load(dir)?,
            warfarin: CodelistSource::new("warfarin", "opensafely-warfarin.csv", snomed, "id")
                .load(dir)?,
            doac: CodelistSource::new(
                "direct acting oral anticoagulants",
                "opensafely-direct-acting-oral-anticoagulants-doac.csv",
                snomed,
                "id",
            )
            .load(dir)?,
            lmwh: CodelistSource::new(
                "low molecular weight heparins",
                "opensafely-low-molecular-weight-heparins-dmd.csv",
                snomed,
                "dmd_id",
            )
            .load(dir)?,
            oestrogen: CodelistSource::new(
                "oestrogen and oestrogen-like drugs",
                "opensafely-oestrogen-and-oestrogen-like-drugs.csv",
                snomed,
                "dmd_id",
            )
            .load(dir)?,
            antiplatelet: CodelistSource::new(
                "antiplatelets",
                "opensafely-antiplatelets.csv",
                snomed,
                "dmd_id",
            )
            .load(dir)?,
            aspirin: CodelistSource::new("aspirin", "opensafely-aspirin.csv", snomed, "id")
                .load(dir)?,
            nsaid: CodelistSource::new("oral nsaids", "opensafely-nsaids-oral.csv", snomed, "snomed_id")
                .load(dir)?,
            mi_ons: CodelistSource::new(
                "cardiovascular causes of death",
                "opensafely-cardiovascular-secondary-care.csv",
                icd10,
                "icd",
            )
            .with_category_column("mi")
            .load(dir)?,
            stroke_ons: CodelistSource::new(
                "stroke causes of death",
                "opensafely-stroke-secondary-care.csv",
                icd10,
                "icd",
            )
            .with_category_column("type")
            .load(dir)?,
            gi_bleed_ons: CodelistSource::new(
                "gastrointestinal bleeding causes of death",
                "opensafely-gastrointestinal-bleeding-icd-10.csv",
                icd10,
                "code",
            )
            .load(dir)?,
            vte_ons: CodelistSource::new(
                "venous thromboembolism causes of death",
                "opensafely-venous-thromboembolism-icd-10.csv",
                icd10,
                "code",
            )
            .load(dir)?,
        })
    }
}
