use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use thiserror::Error;

use crate::config::{FeedFormat, FeedSpec};

/// One entry of a feed, keyed by its identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: String,
    pub title: String,
    /// Configured text fields in configuration order. Absent or empty values are omitted.
    pub fields: Vec<(String, String)>,
}

impl Record {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Records extracted from one body, plus how many rows were dropped.
#[derive(Debug, Default)]
pub struct ParseResult {
    pub records: Vec<Record>,
    /// Rows with no usable content, or duplicate identifiers.
    pub skipped: usize,
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("No value at JSON pointer '{0}'")]
    PointerNotFound(String),
    #[error("Expected a JSON array of record objects")]
    NotAnArray,
    #[error("CSV header has no '{0}' column")]
    MissingColumn(String),
}

const UNTITLED: &str = "Untitled";

/// Parses a feed body according to its configured format and field mapping.
pub fn parse_records(bytes: &[u8], feed: &FeedSpec) -> Result<ParseResult, ParseError> {
    let raw = match feed.format {
        FeedFormat::Json => parse_json(bytes, feed)?,
        FeedFormat::Csv => parse_csv(bytes, feed)?,
    };
    Ok(finish(raw))
}

/// A row before identifier resolution.
struct RawRecord {
    id: Option<String>,
    title: Option<String>,
    fields: Vec<(String, String)>,
}

fn parse_json(bytes: &[u8], feed: &FeedSpec) -> Result<Vec<RawRecord>, ParseError> {
    let root: Value = serde_json::from_slice(bytes)?;

    let target = match feed.records_pointer.as_deref() {
        None | Some("") => &root,
        Some(pointer) => root
            .pointer(pointer)
            .ok_or_else(|| ParseError::PointerNotFound(pointer.to_string()))?,
    };

    let items = target.as_array().ok_or(ParseError::NotAnArray)?;
    if !items.iter().all(Value::is_object) {
        return Err(ParseError::NotAnArray);
    }

    let records = items
        .iter()
        .map(|item| RawRecord {
            id: json_field(item, &feed.id_field),
            title: feed
                .title_field
                .as_deref()
                .and_then(|name| json_field(item, name)),
            fields: feed
                .text_fields
                .iter()
                .filter_map(|name| json_field(item, name).map(|v| (name.clone(), v)))
                .collect(),
        })
        .collect();

    Ok(records)
}

/// Looks up `name` in a JSON object: `/a/b` is a pointer, anything else a top-level key.
fn json_field(item: &Value, name: &str) -> Option<String> {
    let value = if name.starts_with('/') {
        item.pointer(name)
    } else {
        item.get(name)
    }?;

    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    };

    (!text.is_empty()).then_some(text)
}

fn parse_csv(bytes: &[u8], feed: &FeedSpec) -> Result<Vec<RawRecord>, ParseError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let headers = reader.headers()?.clone();
    let column = |name: &str| headers.iter().position(|h| h == name);

    let id_col = column(feed.id_field.as_str())
        .ok_or_else(|| ParseError::MissingColumn(feed.id_field.clone()))?;
    let title_col = feed.title_field.as_deref().and_then(column);
    let field_cols: Vec<(String, Option<usize>)> = feed
        .text_fields
        .iter()
        .map(|name| (name.clone(), column(name.as_str())))
        .collect();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let cell = |idx: Option<usize>| {
            idx.and_then(|i| row.get(i))
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        records.push(RawRecord {
            id: cell(Some(id_col)),
            title: cell(title_col),
            fields: field_cols
                .iter()
                .filter_map(|(name, idx)| cell(*idx).map(|v| (name.clone(), v)))
                .collect(),
        });
    }

    Ok(records)
}

/// Resolves identifiers, drops empty rows and in-body duplicates (first wins).
fn finish(raw: Vec<RawRecord>) -> ParseResult {
    let mut result = ParseResult::default();
    let mut seen = HashSet::new();

    for row in raw {
        let Some(id) = row
            .id
            .or_else(|| fallback_id(row.title.as_deref(), &row.fields))
        else {
            result.skipped += 1;
            continue;
        };

        if !seen.insert(id.clone()) {
            result.skipped += 1;
            continue;
        }

        result.records.push(Record {
            id,
            title: row.title.unwrap_or_else(|| UNTITLED.to_string()),
            fields: row.fields,
        });
    }

    result
}

/// Content hash used when a row has no identifier. `None` for rows with no content at all.
fn fallback_id(title: Option<&str>, fields: &[(String, String)]) -> Option<String> {
    if title.is_none() && fields.is_empty() {
        return None;
    }

    let mut hasher = Sha256::new();
    match title {
        Some(title) => {
            hasher.update(b"T");
            hash_component(&mut hasher, title);
        }
        None => hasher.update(b"-"),
    }
    for (name, value) in fields {
        hash_component(&mut hasher, name);
        hash_component(&mut hasher, value);
    }
    Some(format!("{:x}", hasher.finalize()))
}

/// Length-prefixed, so adjacent components cannot run into each other.
fn hash_component(hasher: &mut Sha256, part: &str) {
    hasher.update((part.len() as u64).to_be_bytes());
    hasher.update(part.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SnapshotMode;
    use pretty_assertions::assert_eq;

    fn feed(format: FeedFormat) -> FeedSpec {
        FeedSpec {
            name: "items".into(),
            url: "https://example.com/items".into(),
            format,
            records_pointer: None,
            id_field: "id".into(),
            title_field: Some("name".into()),
            text_fields: vec!["rarity".into(), "desc".into()],
            snapshot: SnapshotMode::Memory,
            template: None,
        }
    }

    fn ids(result: &ParseResult) -> Vec<&str> {
        result.records.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_json_root_array() {
        let body = br#"[
            {"id": 1, "name": "Sword", "rarity": "rare", "desc": "Sharp"},
            {"id": "2", "name": "Shield"}
        ]"#;
        let result = parse_records(body, &feed(FeedFormat::Json)).unwrap();

        assert_eq!(ids(&result), vec!["1", "2"]);
        assert_eq!(result.skipped, 0);
        assert_eq!(result.records[0].title, "Sword");
        assert_eq!(
            result.records[0].fields,
            vec![
                ("rarity".to_string(), "rare".to_string()),
                ("desc".to_string(), "Sharp".to_string())
            ]
        );
        assert!(result.records[1].fields.is_empty());
    }

    #[test]
    fn test_json_records_pointer() {
        let body = br#"{"meta": {"v": 3}, "data": {"items": [{"id": 7, "name": "Bow"}]}}"#;
        let mut feed = feed(FeedFormat::Json);
        feed.records_pointer = Some("/data/items".into());

        let result = parse_records(body, &feed).unwrap();
        assert_eq!(ids(&result), vec!["7"]);
    }

    #[test]
    fn test_json_pointer_missing() {
        let mut feed = feed(FeedFormat::Json);
        feed.records_pointer = Some("/nope".into());
        let err = parse_records(b"{}", &feed).unwrap_err();
        assert!(matches!(err, ParseError::PointerNotFound(p) if p == "/nope"));
    }

    #[test]
    fn test_json_not_an_array() {
        let err = parse_records(br#"{"id": 1}"#, &feed(FeedFormat::Json)).unwrap_err();
        assert!(matches!(err, ParseError::NotAnArray));
    }

    #[test]
    fn test_json_invalid() {
        let err = parse_records(b"[{", &feed(FeedFormat::Json)).unwrap_err();
        assert!(matches!(err, ParseError::Json(_)));
    }

    #[test]
    fn test_json_nested_field_pointer() {
        let body = br#"[{"meta": {"uid": "abc"}, "name": "Ring", "stats": {"atk": 5}}]"#;
        let mut feed = feed(FeedFormat::Json);
        feed.id_field = "/meta/uid".into();
        feed.text_fields = vec!["stats".into()];

        let result = parse_records(body, &feed).unwrap();
        assert_eq!(ids(&result), vec!["abc"]);
        assert_eq!(result.records[0].field("stats"), Some(r#"{"atk":5}"#));
    }

    #[test]
    fn test_json_null_and_blank_values_absent() {
        let body = br#"[{"id": 1, "name": null, "rarity": "  ", "desc": false}]"#;
        let result = parse_records(body, &feed(FeedFormat::Json)).unwrap();
        let record = &result.records[0];
        assert_eq!(record.title, "Untitled");
        assert_eq!(record.field("rarity"), None);
        assert_eq!(record.field("desc"), Some("false"));
    }

    #[test]
    fn test_missing_id_falls_back_to_content_hash() {
        let body = br#"[{"name": "Sword"}, {"name": "Sword"}, {"other": 1}]"#;
        let result = parse_records(body, &feed(FeedFormat::Json)).unwrap();

        // Identical content hashes to the same id, so the second row is a duplicate;
        // the third has no content at all.
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.skipped, 2);
        assert_eq!(result.records[0].id.len(), 64);
    }

    #[test]
    fn test_content_hash_distinguishes_fields_and_boundaries() {
        let body = br#"[
            {"rarity": "rare"},
            {"desc": "rare"},
            {"name": "a|b"},
            {"name": "a", "rarity": "b"}
        ]"#;
        let result = parse_records(body, &feed(FeedFormat::Json)).unwrap();

        assert_eq!(result.records.len(), 4);
        assert_eq!(result.skipped, 0);
        let unique: HashSet<&str> = ids(&result).into_iter().collect();
        assert_eq!(unique.len(), 4);
    }

    #[test]
    fn test_json_array_of_non_objects_rejected() {
        let err = parse_records(br#"[1, "a", [2]]"#, &feed(FeedFormat::Json)).unwrap_err();
        assert!(matches!(err, ParseError::NotAnArray));

        let mut feed = feed(FeedFormat::Json);
        feed.records_pointer = Some("/tags".into());
        let body = br#"{"tags": ["new", "hot"], "items": [{"id": 1}]}"#;
        let err = parse_records(body, &feed).unwrap_err();
        assert!(matches!(err, ParseError::NotAnArray));
    }

    #[test]
    fn test_json_empty_array_is_not_an_error() {
        let result = parse_records(b"[]", &feed(FeedFormat::Json)).unwrap();
        assert!(result.records.is_empty());
        assert_eq!(result.skipped, 0);
    }

    #[test]
    fn test_duplicate_ids_first_wins() {
        let body = br#"[{"id": 1, "name": "First"}, {"id": 1, "name": "Second"}]"#;
        let result = parse_records(body, &feed(FeedFormat::Json)).unwrap();
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].title, "First");
        assert_eq!(result.skipped, 1);
    }

    #[test]
    fn test_csv_basic() {
        let body = b"id,name,rarity,desc\n1, Sword ,rare,Sharp\n2,Shield,,\n";
        let result = parse_records(body, &feed(FeedFormat::Csv)).unwrap();

        assert_eq!(ids(&result), vec!["1", "2"]);
        assert_eq!(result.records[0].title, "Sword");
        assert_eq!(result.records[0].field("desc"), Some("Sharp"));
        assert!(result.records[1].fields.is_empty());
    }

    #[test]
    fn test_csv_short_rows_tolerated() {
        let body = b"id,name,rarity\n1,Sword\n2\n";
        let result = parse_records(body, &feed(FeedFormat::Csv)).unwrap();
        assert_eq!(ids(&result), vec!["1", "2"]);
        assert_eq!(result.records[1].title, "Untitled");
    }

    #[test]
    fn test_csv_missing_id_column() {
        let body = b"name,rarity\nSword,rare\n";
        let err = parse_records(body, &feed(FeedFormat::Csv)).unwrap_err();
        assert!(matches!(err, ParseError::MissingColumn(c) if c == "id"));
    }

    #[test]
    fn test_csv_unknown_text_field_ignored() {
        let mut feed = feed(FeedFormat::Csv);
        feed.text_fields = vec!["not_a_column".into()];
        let result = parse_records(b"id,name\n1,Sword\n", &feed).unwrap();
        assert!(result.records[0].fields.is_empty());
    }

    #[test]
    fn test_empty_bodies() {
        let result = parse_records(b"[]", &feed(FeedFormat::Json)).unwrap();
        assert!(result.records.is_empty());

        let result = parse_records(b"id,name\n", &feed(FeedFormat::Csv)).unwrap();
        assert!(result.records.is_empty());
    }
}
