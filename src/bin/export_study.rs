//! Export the study specifications and the matching request as JSON for
//! the external extraction and matching engines.
//!
//! Usage: `export-study [codelist-dir] [output-dir]`, defaulting to
//! `codelists` and `output`.

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;

use cohort_def::{
    af_general_population_matching, af_population_flow_chart, atrial_fibrillation_cohort,
    general_population_cohort, general_population_flow_chart, StudyAnchors, StudyCodelists,
};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let codelist_dir = PathBuf::from(args.next().unwrap_or_else(|| "codelists".to_string()));
    let output_dir = PathBuf::from(args.next().unwrap_or_else(|| "output".to_string()));

    let codelists = StudyCodelists::load(&codelist_dir)
        .with_context(|| format!("loading codelists from {}", codelist_dir.display()))?;
    let anchors = StudyAnchors::for_index_date(
        NaiveDate::from_ymd_opt(2020, 3, 1).expect("valid index date"),
    );

    fs::create_dir_all(&output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;

    let studies = [
        atrial_fibrillation_cohort(&codelists, &anchors)?,
        general_population_cohort(&codelists, &anchors)?,
        af_population_flow_chart(&codelists, &anchors)?,
        general_population_flow_chart(&codelists, &anchors)?,
    ];
    for study in &studies {
        let path = output_dir.join(format!("study_definition_{}.json", study.name()));
        fs::write(&path, study.to_json()?)
            .with_context(|| format!("writing {}", path.display()))?;
        log::info!(
            "wrote {} ({} variables)",
            path.display(),
            study.variables().len()
        );
    }

    let matching = af_general_population_matching()?;
    matching.validate_against(&studies[0], &studies[1])?;
    let path = output_dir.join("matching_af_gen_pop.json");
    fs::write(&path, matching.to_json()?)
        .with_context(|| format!("writing {}", path.display()))?;
    log::info!("wrote {}", path.display());

    Ok(())
}
