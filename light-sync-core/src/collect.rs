//! Source collector: walks source roots and turns qualifying files into
//! [`Artifact`]s.
//!
//! - Pages are `.html` files, identified by file stem.
//! - Rules are `.java` files with an `implements <Interface>` line,
//!   identified by `package.ClassName` (bare class name in the default package).
//!
//! Per-file failures (unreadable, undecodable, malformed `package` line) are
//! logged, recorded in [`Collection::skipped`] and never abort the walk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use encoding_rs::Encoding;
use serde::Deserialize;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::artifact::{Artifact, ArtifactKind};
use crate::error::CollectError;
use crate::java::{parse_package, ImplementsMatcher, PackageError};

pub const DEFAULT_ENCODING: &str = "UTF-8";
pub const DEFAULT_INTERFACE: &str = "Rule";

/// What to do when two files produce the same id in one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Fail the collection with [`CollectError::DuplicateId`].
    Reject,
    /// Keep the artifact seen first, ignore later ones.
    KeepFirst,
    /// Replace the earlier artifact with the later one.
    #[default]
    KeepLast,
}

/// Selects which files become artifacts and how they are read.
#[derive(Debug, Clone)]
pub struct ArtifactPredicate {
    pub kind: ArtifactKind,
    /// WHATWG encoding label, e.g. `UTF-8` or `ISO-8859-1`.
    pub encoding: String,
    /// Interface a rule class must implement. Ignored for pages.
    pub interface: String,
    pub on_duplicate: ConflictPolicy,
}

impl ArtifactPredicate {
    pub fn new(kind: ArtifactKind) -> Self {
        Self {
            kind,
            encoding: DEFAULT_ENCODING.to_string(),
            interface: DEFAULT_INTERFACE.to_string(),
            on_duplicate: ConflictPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Io(String),
    Decode { encoding: String },
    MalformedPackage(PackageError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: SkipReason,
}

/// Result of a collection run.
#[derive(Debug, Default)]
pub struct Collection {
    pub artifacts: Vec<Artifact>,
    pub skipped: Vec<SkippedFile>,
}

/// Recursively collect artifacts of `predicate.kind` from every root.
///
/// Directory entries are visited in file-name order so repeated runs over
/// the same tree produce the same sequence.
pub fn collect(
    roots: &[PathBuf],
    predicate: &ArtifactPredicate,
) -> Result<Collection, CollectError> {
    let encoding = Encoding::for_label(predicate.encoding.as_bytes())
        .ok_or_else(|| CollectError::UnknownEncoding(predicate.encoding.clone()))?;
    let matcher = match predicate.kind {
        ArtifactKind::Rule => Some(ImplementsMatcher::new(&predicate.interface)?),
        ArtifactKind::Page => None,
    };

    let mut collection = Collection::default();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for root in roots {
        info!(root = %root.display(), kind = %predicate.kind, "Collecting artifacts");
        for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().unwrap_or(root.as_path()).to_path_buf();
                    error!(path = %path.display(), error = %e, "Failed to list directory entry");
                    collection.skipped.push(SkippedFile {
                        path,
                        reason: SkipReason::Io(e.to_string()),
                    });
                    continue;
                }
            };
            if !entry.file_type().is_file() || !has_extension(entry.path(), predicate.kind) {
                continue;
            }

            let read = read_artifact(entry.path(), predicate.kind, encoding, matcher.as_ref());
            let artifact = match read {
                Ok(Some(artifact)) => artifact,
                Ok(None) => continue,
                Err(reason) => {
                    error!(
                        path = %entry.path().display(),
                        reason = ?reason,
                        "Skipping unreadable source file"
                    );
                    collection.skipped.push(SkippedFile {
                        path: entry.path().to_path_buf(),
                        reason,
                    });
                    continue;
                }
            };

            insert_artifact(
                &mut collection.artifacts,
                &mut positions,
                artifact,
                predicate.on_duplicate,
            )?;
        }
    }

    info!(
        kind = %predicate.kind,
        artifacts = collection.artifacts.len(),
        skipped = collection.skipped.len(),
        "Collection finished"
    );
    Ok(collection)
}

fn has_extension(path: &Path, kind: ArtifactKind) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(kind.extension())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Read one qualifying file. `Ok(None)` means the file was read but does not
/// pass the structural filter.
fn read_artifact(
    path: &Path,
    kind: ArtifactKind,
    encoding: &'static Encoding,
    matcher: Option<&ImplementsMatcher>,
) -> Result<Option<Artifact>, SkipReason> {
    let bytes = std::fs::read(path).map_err(|e| SkipReason::Io(e.to_string()))?;
    let decoded = encoding
        .decode_without_bom_handling_and_without_replacement(&bytes)
        .ok_or_else(|| SkipReason::Decode {
            encoding: encoding.name().to_string(),
        })?;
    let text = decoded.strip_prefix('\u{FEFF}').unwrap_or(&*decoded);
    let content = join_lines(text);

    let id = match (kind, matcher) {
        (ArtifactKind::Rule, Some(matcher)) => {
            let Some(package) = rule_package(text, matcher)? else {
                debug!(path = %path.display(), "Java source does not implement the interface");
                return Ok(None);
            };
            match package {
                Some(package) => format!("{package}.{}", file_stem(path)),
                None => file_stem(path),
            }
        }
        _ => file_stem(path),
    };

    debug!(path = %path.display(), id = %id, bytes = content.len(), "Collected artifact");
    Ok(Some(Artifact {
        id,
        content,
        kind,
        path: path.to_path_buf(),
    }))
}

/// Scan a Java source once for its package and the implements marker.
///
/// Returns `None` when no line implements the interface, otherwise the
/// package (itself `None` for the default package).
fn rule_package(
    text: &str,
    matcher: &ImplementsMatcher,
) -> Result<Option<Option<String>>, SkipReason> {
    let mut package: Option<String> = None;
    let mut implements = false;

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if package.is_none() {
            package = parse_package(line).map_err(SkipReason::MalformedPackage)?;
        }
        if !implements && matcher.matches(line) {
            implements = true;
        }
        if implements && package.is_some() {
            break;
        }
    }

    Ok(implements.then_some(package))
}

/// Each line of `text` followed by `\n`; `\r\n` endings are normalised.
fn join_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 1);
    for line in text.lines() {
        out.push_str(line);
        out.push('\n');
    }
    out
}

fn insert_artifact(
    artifacts: &mut Vec<Artifact>,
    positions: &mut HashMap<String, usize>,
    artifact: Artifact,
    policy: ConflictPolicy,
) -> Result<(), CollectError> {
    let Some(&index) = positions.get(&artifact.id) else {
        positions.insert(artifact.id.clone(), artifacts.len());
        artifacts.push(artifact);
        return Ok(());
    };

    let existing = &artifacts[index];
    match policy {
        ConflictPolicy::Reject => Err(CollectError::DuplicateId {
            id: artifact.id,
            first: existing.path.clone(),
            second: artifact.path,
        }),
        ConflictPolicy::KeepFirst => {
            warn!(
                id = %artifact.id,
                kept = %existing.path.display(),
                ignored = %artifact.path.display(),
                "Duplicate artifact id, keeping first"
            );
            Ok(())
        }
        ConflictPolicy::KeepLast => {
            warn!(
                id = %artifact.id,
                replaced = %existing.path.display(),
                kept = %artifact.path.display(),
                "Duplicate artifact id, keeping last"
            );
            artifacts[index] = artifact;
            Ok(())
        }
    }
}
