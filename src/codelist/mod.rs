//! Clinical and medication codelists.
//!
//! A codelist is a named set of codes under a single coding system,
//! optionally partitioned into categories. Codelists are loaded once from a
//! reference file (or declared inline) and are immutable thereafter; every
//! variable derivation is expressed over one or more of them.

pub mod loader;

use itertools::Itertools;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StudyDefError};

pub use loader::CodelistSource;

/// Clinical classification vocabulary a codelist belongs to.
///
/// Codes are only comparable within the same system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodingSystem {
    /// CTV3 primary-care clinical terminology
    Ctv3,
    /// SNOMED CT clinical terminology
    Snomed,
    /// ICD-10 diagnostic classification
    Icd10,
    /// dm+d dictionary of medicines and devices
    DmPlusD,
}

impl std::fmt::Display for CodingSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            Self::Ctv3 => "ctv3",
            Self::Snomed => "snomed",
            Self::Icd10 => "icd10",
            Self::DmPlusD => "dmd",
        };
        write!(f, "{tag}")
    }
}

/// An immutable, named collection of codes under one coding system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Codelist {
    /// Name of the clinical concept the list describes
    name: String,
    /// Coding system every code belongs to
    system: CodingSystem,
    /// Codes, in registration order
    codes: Vec<String>,
    /// Optional code-to-category side mapping; codes absent from the map are
    /// uncategorized
    categories: FxHashMap<String, String>,
}

impl Codelist {
    /// Declare a codelist inline from a list of codes.
    ///
    /// Duplicate codes within one list are fatal, as is an empty list.
    pub fn new<I, S>(name: &str, system: CodingSystem, codes: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::build(name, system, codes.into_iter().map(|c| (c.into(), None)))
    }

    /// Declare a codelist inline with a category for every code
    pub fn with_categories<I, S, C>(name: &str, system: CodingSystem, entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, C)>,
        S: Into<String>,
        C: Into<String>,
    {
        Self::build(
            name,
            system,
            entries.into_iter().map(|(c, cat)| (c.into(), Some(cat.into()))),
        )
    }

    fn build<I>(name: &str, system: CodingSystem, entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, Option<String>)>,
    {
        let mut codes = Vec::new();
        let mut categories = FxHashMap::default();
        let mut seen = FxHashSet::default();
        for (code, category) in entries {
            if !seen.insert(code.clone()) {
                return Err(StudyDefError::DuplicateCode {
                    name: name.to_string(),
                    code,
                });
            }
            if let Some(category) = category {
                categories.insert(code.clone(), category);
            }
            codes.push(code);
        }
        if codes.is_empty() {
            return Err(StudyDefError::EmptyCodelist {
                name: name.to_string(),
            });
        }
        Ok(Self {
            name: name.to_string(),
            system,
            codes,
            categories,
        })
    }

    /// Name of the clinical concept
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Coding system of every code in the list
    #[must_use]
    pub const fn system(&self) -> CodingSystem {
        self.system
    }

    /// The codes, in registration order
    #[must_use]
    pub fn codes(&self) -> &[String] {
        &self.codes
    }

    /// Number of codes in the list
    #[must_use]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Whether the list is empty (never true for a constructed list)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Whether the list contains a code
    #[must_use]
    pub fn contains(&self, code: &str) -> bool {
        self.codes.iter().any(|c| c == code)
    }

    /// Category of a code, if the list categorizes it
    #[must_use]
    pub fn category_of(&self, code: &str) -> Option<&str> {
        self.categories.get(code).map(String::as_str)
    }

    /// Distinct category labels present in the list, sorted
    #[must_use]
    pub fn categories(&self) -> Vec<&str> {
        self.categories
            .values()
            .map(String::as_str)
            .unique()
            .sorted()
            .collect()
    }

    /// Union of several codelists: a code from any of the lists matches.
    ///
    /// All lists must share one coding system. Codes appearing in more than
    /// one list collapse to a single entry; category mappings are merged,
    /// with earlier lists winning on conflict.
    pub fn combine(name: &str, lists: &[&Self]) -> Result<Self> {
        let system = match lists.first() {
            Some(first) => first.system,
            None => {
                return Err(StudyDefError::EmptyCodelist {
                    name: name.to_string(),
                });
            }
        };
        let mut codes = Vec::new();
        let mut categories = FxHashMap::default();
        let mut seen = FxHashSet::default();
        for list in lists {
            if list.system != system {
                return Err(StudyDefError::MixedCodingSystems {
                    left: system.to_string(),
                    right: list.system.to_string(),
                });
            }
            for code in &list.codes {
                if seen.insert(code.clone()) {
                    if let Some(category) = list.category_of(code) {
                        categories.insert(code.clone(), category.to_string());
                    }
                    codes.push(code.clone());
                }
            }
        }
        if codes.is_empty() {
            return Err(StudyDefError::EmptyCodelist {
                name: name.to_string(),
            });
        }
        Ok(Self {
            name: name.to_string(),
            system,
            codes,
            categories,
        })
    }

    /// Restriction of the list to codes whose category is in an allow-list.
    ///
    /// Uncategorized codes never match. The restriction keeps the category
    /// mapping for the codes it retains, so disjoint restrictions can be
    /// recombined into the original list.
    pub fn filter_by_category(&self, include: &[&str]) -> Result<Self> {
        let name = format!("{} [{}]", self.name, include.join(", "));
        let mut codes = Vec::new();
        let mut categories = FxHashMap::default();
        for code in &self.codes {
            if let Some(category) = self.category_of(code) {
                if include.contains(&category) {
                    categories.insert(code.clone(), category.to_string());
                    codes.push(code.clone());
                }
            }
        }
        if codes.is_empty() {
            return Err(StudyDefError::EmptyCodelist { name });
        }
        Ok(Self {
            name,
            system: self.system,
            codes,
            categories,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smoking() -> Codelist {
        Codelist::with_categories(
            "smoking",
            CodingSystem::Ctv3,
            [("137R.", "S"), ("137S.", "E"), ("1371.", "N"), ("137K.", "E")],
        )
        .unwrap()
    }

    #[test]
    fn inline_codelist_preserves_order() {
        let list = Codelist::new("hba1c", CodingSystem::Ctv3, ["XaPbt", "Xaeze", "Xaezd"]).unwrap();
        assert_eq!(list.codes(), &["XaPbt", "Xaeze", "Xaezd"]);
        assert_eq!(list.system(), CodingSystem::Ctv3);
        assert!(list.contains("Xaeze"));
        assert!(!list.contains("X772q"));
    }

    #[test]
    fn duplicate_code_is_fatal() {
        let result = Codelist::new("dup", CodingSystem::Ctv3, ["XaPbt", "XaPbt"]);
        assert!(matches!(
            result,
            Err(StudyDefError::DuplicateCode { code, .. }) if code == "XaPbt"
        ));
    }

    #[test]
    fn empty_codelist_is_fatal() {
        let result = Codelist::new("empty", CodingSystem::Snomed, Vec::<String>::new());
        assert!(matches!(result, Err(StudyDefError::EmptyCodelist { .. })));
    }

    #[test]
    fn category_mapping_is_partial_over_uncategorized_codes() {
        let list = Codelist::with_categories(
            "mixed",
            CodingSystem::Icd10,
            [("I21", "1"), ("I22", "1")],
        )
        .unwrap();
        assert_eq!(list.category_of("I21"), Some("1"));
        assert_eq!(list.category_of("I25"), None);
    }

    #[test]
    fn combine_unions_codes_across_lists() {
        let lung = Codelist::new("lung cancer", CodingSystem::Ctv3, ["B22z.", "B220."]).unwrap();
        let haem = Codelist::new("haem cancer", CodingSystem::Ctv3, ["B627.", "B22z."]).unwrap();
        let combined = Codelist::combine("cancer", &[&lung, &haem]).unwrap();
        assert_eq!(combined.codes(), &["B22z.", "B220.", "B627."]);
    }

    #[test]
    fn combine_rejects_mixed_systems() {
        let ctv3 = Codelist::new("a", CodingSystem::Ctv3, ["X1"]).unwrap();
        let icd = Codelist::new("b", CodingSystem::Icd10, ["I21"]).unwrap();
        assert!(matches!(
            Codelist::combine("ab", &[&ctv3, &icd]),
            Err(StudyDefError::MixedCodingSystems { .. })
        ));
    }

    #[test]
    fn filter_keeps_only_allowed_categories() {
        let filtered = smoking().filter_by_category(&["S", "E"]).unwrap();
        assert_eq!(filtered.codes(), &["137R.", "137S.", "137K."]);
        assert_eq!(filtered.category_of("137S."), Some("E"));
    }

    #[test]
    fn filter_with_no_matching_category_is_fatal() {
        assert!(matches!(
            smoking().filter_by_category(&["X"]),
            Err(StudyDefError::EmptyCodelist { .. })
        ));
    }

    #[test]
    fn disjoint_category_partitions_recombine_to_the_whole() {
        let full = smoking();
        let current = full.filter_by_category(&["S"]).unwrap();
        let rest = full.filter_by_category(&["E", "N"]).unwrap();
        let rebuilt = Codelist::combine("smoking", &[&current, &rest]).unwrap();
        let mut expected: Vec<_> = full.codes().to_vec();
        expected.sort();
        let mut actual: Vec<_> = rebuilt.codes().to_vec();
        actual.sort();
        assert_eq!(actual, expected);
        for code in full.codes() {
            assert_eq!(rebuilt.category_of(code), full.category_of(code));
        }
    }
}
