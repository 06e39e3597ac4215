//! Harmonized vocabularies: race, ethnicity, vital status, sex codes and
//! the file-type value set.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

pub const HISPANIC_OR_LATINO: &str = "Hispanic or Latino";
pub const NOT_REPORTED: &str = "Not Reported";
pub const DEAD: &str = "Dead";

// ── Race ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Race {
    NotAllowedToCollect,
    NativeHawaiianOrOtherPacificIslander,
    NotReported,
    Unknown,
    AmericanIndianOrAlaskaNative,
    Asian,
    BlackOrAfricanAmerican,
    White,
}

impl Race {
    pub const ALL: [Race; 8] = [
        Race::NotAllowedToCollect,
        Race::NativeHawaiianOrOtherPacificIslander,
        Race::NotReported,
        Race::Unknown,
        Race::AmericanIndianOrAlaskaNative,
        Race::Asian,
        Race::BlackOrAfricanAmerican,
        Race::White,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Race::NotAllowedToCollect => "Not allowed to collect",
            Race::NativeHawaiianOrOtherPacificIslander => "Native Hawaiian or other Pacific Islander",
            Race::NotReported => NOT_REPORTED,
            Race::Unknown => "Unknown",
            Race::AmericanIndianOrAlaskaNative => "American Indian or Alaska Native",
            Race::Asian => "Asian",
            Race::BlackOrAfricanAmerican => "Black or African American",
            Race::White => "White",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Race::ALL.into_iter().find(|r| r.as_str() == s)
    }

    pub fn values() -> Vec<&'static str> {
        Race::ALL.iter().map(Race::as_str).collect()
    }
}

// ── Ethnicity ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ethnicity {
    HispanicOrLatino,
    NotReported,
}

impl Ethnicity {
    pub const ALL: [Ethnicity; 2] = [Ethnicity::HispanicOrLatino, Ethnicity::NotReported];

    pub fn as_str(&self) -> &'static str {
        match self {
            Ethnicity::HispanicOrLatino => HISPANIC_OR_LATINO,
            // Lower-case "r" is the published vocabulary spelling.
            Ethnicity::NotReported => "Not reported",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Ethnicity::ALL.into_iter().find(|e| e.as_str() == s)
    }

    pub fn values() -> Vec<&'static str> {
        Ethnicity::ALL.iter().map(Ethnicity::as_str).collect()
    }
}

// ── Vital status ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VitalStatus {
    Alive,
    Dead,
    NotReported,
    Unknown,
}

impl VitalStatus {
    pub const ALL: [VitalStatus; 4] = [
        VitalStatus::Alive,
        VitalStatus::Dead,
        VitalStatus::NotReported,
        VitalStatus::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VitalStatus::Alive => "Alive",
            VitalStatus::Dead => DEAD,
            VitalStatus::NotReported => NOT_REPORTED,
            VitalStatus::Unknown => "Unknown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        VitalStatus::ALL.into_iter().find(|v| v.as_str() == s)
    }
}

// ── Sex ──────────────────────────────────────────────────────────────────────

/// API sex codes and the stored `sex_at_birth` value each one filters on.
pub const SEX_CODES: [(&str, &str); 3] = [("M", "Male"), ("F", "Female"), ("U", NOT_REPORTED)];

/// Fallback code for stored values the normalization table does not know.
pub const UNKNOWN_SEX_CODE: &str = "U";

/// Translate an API sex code to the stored value used in filters.
pub fn sex_code_to_stored(code: &str) -> Option<&'static str> {
    SEX_CODES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, stored)| *stored)
}

// ── File types ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct FileTypesDocument {
    file_types: Vec<String>,
}

/// The enumerated file-type value set.
///
/// Input validation is case-sensitive (`contains`); normalization of stored
/// values is case-insensitive through a lowercase index built once.
#[derive(Debug, Clone, Default)]
pub struct FileTypes {
    values: Vec<String>,
    by_lower: HashMap<String, usize>,
}

impl FileTypes {
    pub fn from_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        let by_lower = values
            .iter()
            .enumerate()
            .map(|(i, v)| (v.to_lowercase(), i))
            .collect();
        Self { values, by_lower }
    }

    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let doc: FileTypesDocument =
            serde_json::from_str(json).context("invalid file type document")?;
        Ok(Self::from_values(doc.file_types))
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json_str(&content)
    }

    /// Exact, case-sensitive membership.
    pub fn contains(&self, value: &str) -> bool {
        self.by_lower
            .get(&value.to_lowercase())
            .is_some_and(|&i| self.values[i] == value)
    }

    /// Map a stored value onto its enumeration member, ignoring case.
    pub fn normalize(&self, stored: &str) -> Option<&str> {
        let key = stored.trim().to_lowercase();
        self.by_lower.get(&key).map(|&i| self.values[i].as_str())
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_race_values_cover_enum() {
        let values = Race::values();
        assert_eq!(values.len(), 8);
        assert!(values.contains(&"Native Hawaiian or other Pacific Islander"));
        assert_eq!(Race::parse("White"), Some(Race::White));
        assert_eq!(Race::parse("white"), None);
        assert_eq!(Race::parse(HISPANIC_OR_LATINO), None);
    }

    #[test]
    fn test_ethnicity_spelling() {
        assert_eq!(Ethnicity::values(), vec!["Hispanic or Latino", "Not reported"]);
        assert_eq!(Ethnicity::parse("Not Reported"), None);
    }

    #[test]
    fn test_sex_codes() {
        assert_eq!(sex_code_to_stored("M"), Some("Male"));
        assert_eq!(sex_code_to_stored("U"), Some("Not Reported"));
        assert_eq!(sex_code_to_stored("Male"), None);
    }

    #[test]
    fn test_file_types_case_rules() {
        let types = FileTypes::from_values(["BAM", "FASTQ", "TSV"]);
        assert!(types.contains("BAM"));
        assert!(!types.contains("bam"));
        assert_eq!(types.normalize("bam"), Some("BAM"));
        assert_eq!(types.normalize(" Fastq "), Some("FASTQ"));
        assert_eq!(types.normalize("docx"), None);
    }

    #[test]
    fn test_file_types_from_json() {
        let types = FileTypes::from_json_str(r#"{"file_types": ["CRAM", "VCF"]}"#).unwrap();
        assert_eq!(types.values(), &["CRAM".to_string(), "VCF".to_string()]);
    }
}
