//! Loading codelists from tabular reference files.
//!
//! Reference files hold one row per code. Which columns to read is
//! file-specific and supplied by the registration site. A missing file or a
//! missing column is fatal: the registry is either complete or unusable.

use std::path::{Path, PathBuf};

use crate::codelist::{Codelist, CodingSystem};
use crate::error::{Result, StudyDefError};

/// Registration of a CSV-backed codelist: where the reference file lives and
/// which columns carry the codes
#[derive(Debug, Clone)]
pub struct CodelistSource {
    /// Name of the clinical concept being registered
    pub name: String,
    /// Reference file path, relative to the codelist directory
    pub file: PathBuf,
    /// Coding system of the codes in the file
    pub system: CodingSystem,
    /// Column holding the codes
    pub code_column: String,
    /// Optional column holding a category per code
    pub category_column: Option<String>,
}

impl CodelistSource {
    /// Register a plain codelist
    #[must_use]
    pub fn new(name: &str, file: &str, system: CodingSystem, code_column: &str) -> Self {
        Self {
            name: name.to_string(),
            file: PathBuf::from(file),
            system,
            code_column: code_column.to_string(),
            category_column: None,
        }
    }

    /// Register a codelist whose file also carries a category column
    #[must_use]
    pub fn with_category_column(mut self, category_column: &str) -> Self {
        self.category_column = Some(category_column.to_string());
        self
    }

    /// Read the reference file and produce the codelist.
    ///
    /// Fails fast on a missing file, an unreadable row, or an absent column.
    pub fn load(&self, dir: &Path) -> Result<Codelist> {
        let path = dir.join(&self.file);
        if !path.is_file() {
            return Err(StudyDefError::Io {
                path,
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "codelist reference file not found",
                ),
            });
        }
        let mut reader = csv::Reader::from_path(&path).map_err(|source| StudyDefError::Csv {
            path: path.clone(),
            source,
        })?;

        let headers = reader
            .headers()
            .map_err(|source| StudyDefError::Csv {
                path: path.clone(),
                source,
            })?
            .clone();
        let code_idx = column_index(&headers, &self.code_column, &path)?;
        let category_idx = self
            .category_column
            .as_deref()
            .map(|column| column_index(&headers, column, &path))
            .transpose()?;

        let mut entries = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|source| StudyDefError::Csv {
                path: path.clone(),
                source,
            })?;
            let code = record
                .get(code_idx)
                .map(str::trim)
                .unwrap_or_default()
                .to_string();
            if code.is_empty() {
                continue;
            }
            let category = category_idx
                .and_then(|idx| record.get(idx))
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string);
            entries.push((code, category));
        }

        let codelist = Codelist::build(&self.name, self.system, entries)?;
        log::info!(
            "loaded codelist '{}' ({} codes, {}) from {}",
            codelist.name(),
            codelist.len(),
            codelist.system(),
            path.display()
        );
        Ok(codelist)
    }
}

fn column_index(headers: &csv::StringRecord, column: &str, path: &Path) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim() == column)
        .ok_or_else(|| StudyDefError::MissingColumn {
            column: column.to_string(),
            path: path.to_path_buf(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(dir: &Path, file: &str, contents: &str) {
        let mut f = std::fs::File::create(dir.join(file)).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    }

    #[test]
    fn loads_codes_from_named_column() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(
            dir.path(),
            "af.csv",
            "CTV3Code,Description\nX202R,Atrial fibrillation\nG5730,Atrial fibrillation and flutter\n",
        );
        let list = CodelistSource::new("atrial fibrillation", "af.csv", CodingSystem::Ctv3, "CTV3Code")
            .load(dir.path())
            .unwrap();
        assert_eq!(list.codes(), &["X202R", "G5730"]);
        assert_eq!(list.category_of("X202R"), None);
    }

    #[test]
    fn loads_category_column_when_registered() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(
            dir.path(),
            "smoking.csv",
            "CTV3Code,Category\n137R.,S\n137S.,E\n1371.,N\n",
        );
        let list = CodelistSource::new("smoking", "smoking.csv", CodingSystem::Ctv3, "CTV3Code")
            .with_category_column("Category")
            .load(dir.path())
            .unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list.category_of("137S."), Some("E"));
        assert_eq!(list.categories(), vec!["E", "N", "S"]);
    }

    #[test]
    fn missing_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let result = CodelistSource::new("absent", "absent.csv", CodingSystem::Snomed, "id")
            .load(dir.path());
        assert!(matches!(result, Err(StudyDefError::Io { .. })));
    }

    #[test]
    fn missing_column_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path(), "warfarin.csv", "code,term\n123,warfarin 3mg\n");
        let result = CodelistSource::new("warfarin", "warfarin.csv", CodingSystem::Snomed, "id")
            .load(dir.path());
        assert!(matches!(
            result,
            Err(StudyDefError::MissingColumn { column, .. }) if column == "id"
        ));
    }

    #[test]
    fn blank_rows_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path(), "codes.csv", "code\nA1\n\nA2\n");
        let list = CodelistSource::new("codes", "codes.csv", CodingSystem::Ctv3, "code")
            .load(dir.path())
            .unwrap();
        assert_eq!(list.codes(), &["A1", "A2"]);
    }
}
