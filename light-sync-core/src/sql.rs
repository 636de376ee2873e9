//! SQL export of applied changes, for deployments that mirror the server's
//! pages and rules into a relational database.
//!
//! One `INSERT` per applied change. Values are quoted with single quotes and
//! embedded quotes are doubled.

use std::fs;
use std::path::Path;

use encoding_rs::Encoding;
use tracing::{info, warn};

use crate::artifact::ArtifactKind;
use crate::error::ExportError;
use crate::synchronise::SyncReport;

/// Double every single quote so `value` can sit inside a SQL string literal.
pub fn escape(value: &str) -> String {
    value.replace('\'', "''")
}

/// Inverse of [`escape`].
pub fn unescape(value: &str) -> String {
    value.replace("''", "'")
}

pub fn insert_statement(kind: ArtifactKind, id: &str, content: &str) -> String {
    let (table, id_column, content_column) = kind.sql_table();
    format!(
        "INSERT INTO {table}({id_column}, {content_column}) VALUES ('{}', '{}');\n",
        escape(id),
        escape(content)
    )
}

/// Statements for every applied change in `report`, in change-log order.
pub fn render(report: &SyncReport) -> String {
    report
        .change_log
        .iter()
        .filter(|record| record.is_applied())
        .map(|record| insert_statement(report.kind, &record.id, &record.content))
        .collect()
}

/// Write [`render`]`(report)` to `path` in the given encoding, creating parent
/// directories. The file is written even when nothing was applied.
///
/// Nothing is written if any applied content cannot be encoded exactly; the
/// error names the first offending id.
///
/// Returns the number of statements written.
pub fn write_sql_file(
    path: &Path,
    report: &SyncReport,
    encoding: &str,
) -> Result<usize, ExportError> {
    let encoding = Encoding::for_label(encoding.as_bytes())
        .ok_or_else(|| ExportError::UnknownEncoding(encoding.to_string()))?;
    if encoding.output_encoding() != encoding {
        return Err(ExportError::DecodeOnlyEncoding(encoding.name().to_string()));
    }

    let mut bytes = Vec::new();
    let mut statements = 0;
    for record in report.change_log.iter().filter(|r| r.is_applied()) {
        let statement = insert_statement(report.kind, &record.id, &record.content);
        let (encoded, _, had_errors) = encoding.encode(&statement);
        if had_errors {
            warn!(id = %record.id, encoding = encoding.name(), "Content is not representable");
            return Err(ExportError::Unmappable {
                id: record.id.clone(),
                encoding: encoding.name().to_string(),
            });
        }
        bytes.extend_from_slice(&encoded);
        statements += 1;
    }

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|source| ExportError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, &bytes).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    info!(path = %path.display(), statements, "Wrote SQL export");
    Ok(statements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{ChangeRecord, ChangeStatus};
    use tempfile::TempDir;

    fn report(kind: ArtifactKind, records: Vec<ChangeRecord>) -> SyncReport {
        SyncReport {
            kind,
            applied: records.iter().filter(|r| r.is_applied()).count(),
            failed: 0,
            unchanged: 0,
            change_log: records,
        }
    }

    #[test]
    fn escape_round_trips_quotes() {
        for raw in ["it's", "''", "a'''b", "no quotes", "'leading", "trailing'"] {
            let escaped = escape(raw);
            assert_eq!(escaped.matches('\'').count() % 2, 0, "{escaped}");
            assert_eq!(unescape(&escaped), raw);
        }
    }

    #[test]
    fn page_and_rule_statements_use_their_tables() {
        assert_eq!(
            insert_statement(ArtifactKind::Page, "home", "<p>Bob's</p>\n"),
            "INSERT INTO PAGE(id, content) VALUES ('home', '<p>Bob''s</p>\n');\n"
        );
        assert_eq!(
            insert_statement(ArtifactKind::Rule, "com.x.Foo", "class Foo {}\n"),
            "INSERT INTO RULE(class_name, source_code) VALUES ('com.x.Foo', 'class Foo {}\n');\n"
        );
    }

    #[test]
    fn only_applied_changes_are_exported() {
        let r = report(
            ArtifactKind::Page,
            vec![
                ChangeRecord::new("a", "A", ChangeStatus::Applied),
                ChangeRecord::new("b", "B", ChangeStatus::Failed("boom".into())),
                ChangeRecord::new("c", "C", ChangeStatus::Planned),
            ],
        );
        let sql = render(&r);
        assert_eq!(sql.lines().count(), 1);
        assert!(sql.contains("('a', 'A')"));
    }

    #[test]
    fn writes_file_with_parent_directories() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("target").join("page.sql");
        let r = report(
            ArtifactKind::Page,
            vec![ChangeRecord::new("a", "café", ChangeStatus::Applied)],
        );

        let written = write_sql_file(&path, &r, "ISO-8859-1").unwrap();
        assert_eq!(written, 1);
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.windows(4).any(|w| w == [b'c', b'a', b'f', 0xE9]));
    }

    #[test]
    fn empty_report_still_produces_a_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("rule.sql");
        let written = write_sql_file(&path, &report(ArtifactKind::Rule, vec![]), "UTF-8").unwrap();
        assert_eq!(written, 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn unrepresentable_content_is_rejected_without_writing() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("page.sql");
        let r = report(
            ArtifactKind::Page,
            vec![
                ChangeRecord::new("a", "plain", ChangeStatus::Applied),
                ChangeRecord::new("b", "\u{3a9} it's", ChangeStatus::Applied),
            ],
        );

        let err = write_sql_file(&path, &r, "ISO-8859-1").unwrap_err();
        match err {
            ExportError::Unmappable { id, encoding } => {
                assert_eq!(id, "b");
                assert_eq!(encoding, "windows-1252");
            }
            other => panic!("expected Unmappable, got {other:?}"),
        }
        assert!(!path.exists());
    }

    #[test]
    fn utf16_output_is_refused() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("page.sql");
        let r = report(
            ArtifactKind::Page,
            vec![ChangeRecord::new("a", "A", ChangeStatus::Applied)],
        );

        let err = write_sql_file(&path, &r, "UTF-16LE").unwrap_err();
        assert!(matches!(err, ExportError::DecodeOnlyEncoding(_)), "{err:?}");
        assert!(!path.exists());
    }
}
