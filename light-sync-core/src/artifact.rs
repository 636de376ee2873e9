//! Artifact data model shared by the collector, the sync engine and the sinks.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Which kind of source unit an artifact is. Each kind carries the remote
/// and SQL vocabulary the server uses for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// An `.html` page, identified by its file stem.
    #[serde(alias = "pages")]
    Page,
    /// A `.java` class implementing the rule interface, identified by its
    /// fully qualified class name.
    #[serde(alias = "rules")]
    Rule,
}

impl ArtifactKind {
    pub fn all() -> &'static [ArtifactKind] {
        &[ArtifactKind::Page, ArtifactKind::Rule]
    }

    /// File extension (without the dot) a source file must have to qualify.
    pub fn extension(self) -> &'static str {
        match self {
            ArtifactKind::Page => "html",
            ArtifactKind::Rule => "java",
        }
    }

    /// Envelope `category` for requests about this kind.
    pub fn category(self) -> &'static str {
        match self {
            ArtifactKind::Page => "page",
            ArtifactKind::Rule => "rule",
        }
    }

    /// Remote operation returning the id→content map.
    pub fn map_operation(self) -> &'static str {
        match self {
            ArtifactKind::Page => "getPageMap",
            ArtifactKind::Rule => "getRuleMap",
        }
    }

    /// Remote operation replacing the content of one id.
    pub fn upsert_operation(self) -> &'static str {
        match self {
            ArtifactKind::Page => "impPage",
            ArtifactKind::Rule => "impRule",
        }
    }

    /// `(id field, content field)` names in the upsert payload.
    pub fn payload_fields(self) -> (&'static str, &'static str) {
        match self {
            ArtifactKind::Page => ("id", "content"),
            ArtifactKind::Rule => ("ruleClass", "sourceCode"),
        }
    }

    /// `(table, id column, content column)` used by the SQL export.
    pub fn sql_table(self) -> (&'static str, &'static str, &'static str) {
        match self {
            ArtifactKind::Page => ("PAGE", "id", "content"),
            ArtifactKind::Rule => ("RULE", "class_name", "source_code"),
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.category())
    }
}

impl std::str::FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "page" | "pages" => Ok(ArtifactKind::Page),
            "rule" | "rules" => Ok(ArtifactKind::Rule),
            other => Err(format!("unknown artifact kind '{other}' (expected page or rule)")),
        }
    }
}

/// A single source unit tracked for synchronisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub id: String,
    pub content: String,
    pub kind: ArtifactKind,
    /// File the artifact was read from; diagnostics only.
    pub path: PathBuf,
}

/// Outcome of one attempted change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum ChangeStatus {
    Applied,
    Failed(String),
    /// Detected but not sent (dry run).
    Planned,
}

/// An artifact whose content differed from the remote snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeRecord {
    pub id: String,
    pub content: String,
    /// SHA-256 hex digest of `content`.
    pub digest: String,
    pub status: ChangeStatus,
}

impl ChangeRecord {
    pub fn new(id: impl Into<String>, content: impl Into<String>, status: ChangeStatus) -> Self {
        let content = content.into();
        Self {
            id: id.into(),
            digest: content_digest(&content),
            content,
            status,
        }
    }

    pub fn is_applied(&self) -> bool {
        self.status == ChangeStatus::Applied
    }
}

/// SHA-256 hex digest of a content body.
pub fn content_digest(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
