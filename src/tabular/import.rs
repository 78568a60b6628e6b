use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::models::{FeatureName, FeatureRecord};
use crate::utils::numeric::parse_leading_float;
use crate::{log_debug, log_info};

const ENABLE_LOGS: bool = true;

/// Substrings that mark Orange header and metadata rows.
const METADATA_MARKERS: [&str; 4] = ["class", "meta", "feature", "continuous"];

pub const SUPPORTED_EXTENSIONS: [&str; 2] = ["tab", "csv"];

/// A token that did not parse and was stored as `0`.
#[derive(Debug, Clone, PartialEq)]
pub struct CoercedToken {
    pub field: FeatureName,
    pub token: String,
}

/// Outcome of reading the data row of a document.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDocument {
    pub record: FeatureRecord,
    /// 1-based line number of the selected data row.
    pub line_number: usize,
    /// Tokens past the tenth, which are ignored.
    pub extra_tokens: usize,
    pub coerced: Vec<CoercedToken>,
}

/// Parse the first data row of `text`, reporting coerced tokens.
///
/// Returns `None` when no qualifying row exists or the row has fewer than ten
/// tokens. Only the first qualifying row is considered.
pub fn inspect_document(text: &str) -> Option<ParsedDocument> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let (index, line) = text
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .enumerate()
        .find(|(_, line)| is_data_line(line))?;

    let tokens = split_tokens(line);
    if tokens.len() < FeatureName::ALL.len() {
        log_debug!(
            "Data row {} has {} tokens, need {}; leaving record unchanged",
            index + 1,
            tokens.len(),
            FeatureName::ALL.len()
        );
        return None;
    }

    let mut coerced = Vec::new();
    let mut values = [0.0; 10];
    for ((slot, field), token) in values.iter_mut().zip(FeatureName::ALL).zip(&tokens) {
        let parsed = parse_leading_float(token);
        // Zero and unparseable are deliberately indistinguishable in the record.
        if parsed.is_nan() {
            coerced.push(CoercedToken {
                field,
                token: token.to_string(),
            });
            *slot = 0.0;
        } else {
            *slot = parsed;
        }
    }

    Some(ParsedDocument {
        record: FeatureRecord::from_values(values),
        line_number: index + 1,
        extra_tokens: tokens.len() - FeatureName::ALL.len(),
        coerced,
    })
}

pub fn parse_document(text: &str) -> Option<FeatureRecord> {
    inspect_document(text).map(|parsed| parsed.record)
}

/// Wholesale replacement of `current` by the document's record, or `current`
/// itself when the document has no usable row.
pub fn import_into(current: &FeatureRecord, text: &str) -> FeatureRecord {
    match inspect_document(text) {
        Some(parsed) => {
            log_info!(
                "Imported record from line {} ({} coerced tokens, {} ignored)",
                parsed.line_number,
                parsed.coerced.len(),
                parsed.extra_tokens
            );
            parsed.record
        }
        None => *current,
    }
}

pub fn is_supported_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
        .unwrap_or(false)
}

/// Read an uploaded `.tab` / `.csv` document as text.
pub async fn read_document(path: &Path) -> Result<String> {
    if !is_supported_path(path) {
        bail!(
            "unsupported file '{}': expected .tab or .csv",
            path.display()
        );
    }

    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    // Invalid sequences become U+FFFD; the affected tokens then coerce to 0.
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn is_data_line(line: &str) -> bool {
    if line.trim().is_empty() || line.starts_with('#') {
        return false;
    }
    if METADATA_MARKERS.iter().any(|marker| line.contains(marker)) {
        return false;
    }
    !is_column_name_row(&split_tokens(line))
}

/// The names row carries only field names and would otherwise import as zeros.
/// Shorter rows are left to the token-count check, which aborts the import.
fn is_column_name_row(tokens: &[&str]) -> bool {
    if tokens.len() < FeatureName::ALL.len() {
        return false;
    }
    tokens
        .iter()
        .take(FeatureName::ALL.len())
        .all(|token| {
            FeatureName::ALL
                .iter()
                .any(|name| token.eq_ignore_ascii_case(name.as_str()))
        })
}

fn split_tokens(line: &str) -> Vec<&str> {
    line.split([',', '\t']).map(str::trim).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn imports_csv_row_after_header_and_comment() {
        let text = "age,sex,cp,bp,chol,maxhr,exang,oldpeak,ca,thal\n#comment\n63,1,3,145,233,150,0,2.3,0,6\n";
        let record = parse_document(text).expect("data row");

        assert_eq!(
            record,
            FeatureRecord::from_values([63.0, 1.0, 3.0, 145.0, 233.0, 150.0, 0.0, 2.3, 0.0, 6.0])
        );
    }

    #[test]
    fn skips_orange_header_rows() {
        let text = "age\tsex\tcp\tbp\tchol\tmaxhr\texang\toldpeak\tca\tthal\n\
                    continuous\tdiscrete\tdiscrete\tcontinuous\tcontinuous\tcontinuous\tdiscrete\tcontinuous\tdiscrete\tdiscrete\n\
                    feature\tfeature\tfeature\tfeature\tfeature\tfeature\tfeature\tfeature\tfeature\tfeature\n\
                    41\t0\t2\t130\t204\t172\t0\t1.4\t0\t3\n";
        let parsed = inspect_document(text).expect("data row");

        assert_eq!(parsed.line_number, 4);
        assert_eq!(parsed.record.age, 41.0);
        assert_eq!(parsed.record.oldpeak, 1.4);
    }

    #[test]
    fn skips_class_and_meta_rows() {
        let text = "d\td\tclass\nmeta\t\t\n57,0,4,120,354,163,1,0.6,0,3";
        assert_eq!(parse_document(text).unwrap().chol, 354.0);
    }

    #[test]
    fn metadata_only_document_leaves_record_unchanged() {
        let current = FeatureRecord::default().with(FeatureName::Age, 70.0);
        let text = "# exported\ncontinuous\tdiscrete\nfeature\tfeature\n\n";

        assert_eq!(import_into(&current, text), current);
        assert_eq!(import_into(&current, ""), current);
    }

    #[test]
    fn short_row_aborts_without_searching_further() {
        let current = FeatureRecord::default();
        let text = "63,1,3,145\n63,1,3,145,233,150,0,2.3,0,6\n";

        assert!(inspect_document(text).is_none());
        assert_eq!(import_into(&current, text), current);
    }

    #[test]
    fn short_names_row_aborts_import() {
        let current = FeatureRecord::default();
        let text = "age,sex\n63,1,3,145,233,150,0,2.3,0,6\n";

        assert!(inspect_document(text).is_none());
        assert_eq!(import_into(&current, text), current);
    }

    #[tokio::test]
    async fn read_document_decodes_invalid_utf8_lossily() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patient.tab");
        let mut bytes = b"63,1,3,145,233,150,0,2.3,0,".to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe]);
        tokio::fs::write(&path, &bytes).await.unwrap();

        let text = read_document(&path).await.unwrap();
        let parsed = inspect_document(&text).expect("data row");
        assert_eq!(parsed.record.age, 63.0);
        assert_eq!(parsed.record.thal, 0.0);
        assert_eq!(parsed.coerced.len(), 1);
    }

    #[test]
    fn ignores_extra_tokens() {
        let parsed = inspect_document("63,1,3,145,233,150,0,2.3,0,6,1,extra").unwrap();
        assert_eq!(parsed.record.thal, 6.0);
        assert_eq!(parsed.extra_tokens, 2);
    }

    #[test]
    fn coerces_bad_tokens_to_zero() {
        let parsed = inspect_document("63,1,?,145,233,150,0,2.3,0,6").unwrap();

        assert_eq!(parsed.record.cp, 0.0);
        assert_eq!(parsed.record.bp, 145.0);
        assert_eq!(
            parsed.coerced,
            vec![CoercedToken {
                field: FeatureName::Cp,
                token: "?".into()
            }]
        );
    }

    #[test]
    fn mixed_separators_and_padding() {
        let text = "\n\n  63 ,1\t3, 145\t233,150 ,0,2.3,0,6  \r\n\n";
        let parsed = inspect_document(text).unwrap();
        assert_eq!(parsed.line_number, 3);
        assert_eq!(parsed.record.maxhr, 150.0);
        assert_eq!(parsed.record.thal, 6.0);
    }

    #[test]
    fn indented_hash_is_not_a_comment() {
        let parsed = inspect_document("  #63,1,3,145,233,150,0,2.3,0,6").unwrap();
        assert_eq!(parsed.record.age, 0.0);
        assert_eq!(parsed.coerced.len(), 1);
    }

    #[test]
    fn supported_extensions() {
        assert!(is_supported_path(Path::new("patient.tab")));
        assert!(is_supported_path(Path::new("patient.CSV")));
        assert!(!is_supported_path(Path::new("patient.txt")));
        assert!(!is_supported_path(Path::new("patient")));
    }
}
