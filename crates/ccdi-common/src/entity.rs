//! Entity kinds exposed by the federation API.

use serde::{Deserialize, Serialize};

/// The organization every identifier served by this node belongs to.
pub const ORGANIZATION: &str = "CCDI-DCC";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Subject,
    Sample,
    File,
}

impl EntityType {
    pub const ALL: [EntityType; 3] = [EntityType::Subject, EntityType::Sample, EntityType::File];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Subject => "subject",
            EntityType::Sample => "sample",
            EntityType::File => "file",
        }
    }

    /// Name used in error messages ("Subject", "Sample", "File").
    pub fn display_name(&self) -> &'static str {
        match self {
            EntityType::Subject => "Subject",
            EntityType::Sample => "Sample",
            EntityType::File => "File",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "subject" => Some(EntityType::Subject),
            "sample" => Some(EntityType::Sample),
            "file" => Some(EntityType::File),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
