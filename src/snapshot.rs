// Snapshot serialization and normalize-on-import

use crate::id::IdGenerator;
use crate::models::{ImportReport, Item};
use eyre::{Context, Result, eyre};
use serde_json::Value;
use std::collections::HashSet;
use std::str::FromStr;
use tracing::{debug, warn};

/// Encoding used when writing the persisted list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PersistFormat {
    #[default]
    Pretty,
    Compact,
}

/// File format for export/import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SnapshotFormat {
    #[default]
    Json,
    Yaml,
}

impl SnapshotFormat {
    /// Conventional file extension, without the dot
    pub fn extension(self) -> &'static str {
        match self {
            SnapshotFormat::Json => "json",
            SnapshotFormat::Yaml => "yaml",
        }
    }
}

impl std::fmt::Display for SnapshotFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl FromStr for SnapshotFormat {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(SnapshotFormat::Json),
            "yaml" | "yml" => Ok(SnapshotFormat::Yaml),
            other => Err(eyre!("Invalid snapshot format: {} (expected json or yaml)", other)),
        }
    }
}

pub fn to_pretty(items: &[Item]) -> Result<String> {
    serde_json::to_string_pretty(items).context("Failed to serialize list")
}

pub fn to_compact(items: &[Item]) -> Result<String> {
    serde_json::to_string(items).context("Failed to serialize list")
}

pub fn to_yaml(items: &[Item]) -> Result<String> {
    serde_yaml::to_string(items).context("Failed to serialize list as YAML")
}

/// Encode `items` in the given format
pub fn encode(items: &[Item], format: SnapshotFormat) -> Result<String> {
    match format {
        SnapshotFormat::Json => to_pretty(items),
        SnapshotFormat::Yaml => to_yaml(items),
    }
}

/// Parse a JSON snapshot into its raw entries
///
/// Fails unless the payload is UTF-8 JSON whose top level is an array.
pub fn parse_snapshot(bytes: &[u8]) -> Result<Vec<Value>> {
    let text = std::str::from_utf8(bytes).context("Snapshot is not valid UTF-8")?;
    let value: Value = serde_json::from_str(text).context("Snapshot is not valid JSON")?;
    into_entries(value)
}

/// Parse a YAML snapshot into its raw entries
pub fn parse_yaml_snapshot(bytes: &[u8]) -> Result<Vec<Value>> {
    let value: Value = serde_yaml::from_slice(bytes).context("Snapshot is not valid YAML")?;
    into_entries(value)
}

/// Parse a snapshot in the given format
pub fn decode(bytes: &[u8], format: SnapshotFormat) -> Result<Vec<Value>> {
    match format {
        SnapshotFormat::Json => parse_snapshot(bytes),
        SnapshotFormat::Yaml => parse_yaml_snapshot(bytes),
    }
}

fn into_entries(value: Value) -> Result<Vec<Value>> {
    match value {
        Value::Array(entries) => Ok(entries),
        other => Err(eyre!(
            "Snapshot must be an array of items, found {}",
            kind_of(&other)
        )),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Turn raw snapshot entries into valid items
///
/// Entries without usable text are dropped. Missing, blank, or repeated ids
/// are replaced with fresh ones that collide with nothing in the result.
pub fn normalize<G: IdGenerator + ?Sized>(entries: Vec<Value>, ids: &mut G) -> (Vec<Item>, ImportReport) {
    let mut report = ImportReport::default();
    let mut taken: HashSet<String> = HashSet::new();
    let mut pending: Vec<(Option<String>, String, bool)> = Vec::with_capacity(entries.len());

    for (index, entry) in entries.iter().enumerate() {
        let Some(text) = entry_text(entry) else {
            warn!(index, "Dropping snapshot entry without text");
            report.dropped += 1;
            continue;
        };

        let completed = entry.get("completed").is_some_and(truthy);
        let id = entry_id(entry).filter(|id| taken.insert(id.clone()));
        pending.push((id, text, completed));
    }

    let items: Vec<Item> = pending
        .into_iter()
        .map(|(id, text, completed)| {
            let id = match id {
                Some(id) => id,
                None => {
                    report.regenerated_ids += 1;
                    fresh_id(ids, &mut taken)
                }
            };
            Item { id, text, completed }
        })
        .collect();

    report.imported = items.len();
    debug!(
        imported = report.imported,
        dropped = report.dropped,
        regenerated = report.regenerated_ids,
        "Normalized snapshot"
    );

    (items, report)
}

/// Draw from `ids` until the result is not in `taken`, then reserve it
pub(crate) fn fresh_id<G: IdGenerator + ?Sized>(ids: &mut G, taken: &mut HashSet<String>) -> String {
    loop {
        let id = ids.next_id();
        if taken.insert(id.clone()) {
            return id;
        }
        warn!(id, "Generated id already in use, drawing again");
    }
}

fn entry_text(entry: &Value) -> Option<String> {
    let text = entry.get("text")?.as_str()?.trim();
    if text.is_empty() { None } else { Some(text.to_string()) }
}

fn entry_id(entry: &Value) -> Option<String> {
    match entry.get("id")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Boolean coercion for loosely typed `completed` values
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::SequentialIdGenerator;
    use serde_json::json;

    fn entries(value: Value) -> Vec<Value> {
        value.as_array().unwrap().clone()
    }

    #[test]
    fn test_pretty_is_multiline_and_compact_is_not() {
        let items = vec![Item::new("a", "Buy milk")];

        let pretty = to_pretty(&items).unwrap();
        assert!(pretty.contains('\n'));
        assert!(pretty.contains("\"text\": \"Buy milk\""));

        let compact = to_compact(&items).unwrap();
        assert!(!compact.contains('\n'));
    }

    #[test]
    fn test_parse_snapshot_rejects_non_array() {
        assert!(parse_snapshot(br#"{"id":"a","text":"x"}"#).is_err());
        assert!(parse_snapshot(b"42").is_err());
        assert!(parse_snapshot(b"null").is_err());

        let err = parse_snapshot(br#""items""#).unwrap_err();
        assert!(err.to_string().contains("a string"));
    }

    #[test]
    fn test_parse_snapshot_rejects_bad_bytes() {
        assert!(parse_snapshot(b"[{").is_err());
        assert!(parse_snapshot(&[0xff, 0xfe, b'[', b']']).is_err());
        assert!(parse_snapshot(b"").is_err());
    }

    #[test]
    fn test_parse_snapshot_accepts_empty_array() {
        assert!(parse_snapshot(b"[]").unwrap().is_empty());
    }

    #[test]
    fn test_normalize_keeps_valid_entries() {
        let mut ids = SequentialIdGenerator::new("gen");
        let (items, report) = normalize(
            entries(json!([
                {"id": "a", "text": "First", "completed": true},
                {"id": "b", "text": "Second", "completed": false}
            ])),
            &mut ids,
        );

        assert_eq!(items, vec![
            Item { id: "a".into(), text: "First".into(), completed: true },
            Item { id: "b".into(), text: "Second".into(), completed: false },
        ]);
        assert_eq!(report, ImportReport { imported: 2, dropped: 0, regenerated_ids: 0 });
    }

    #[test]
    fn test_normalize_drops_entries_without_text() {
        let mut ids = SequentialIdGenerator::new("gen");
        let (items, report) = normalize(
            entries(json!([
                {"id": "a"},
                {"id": "b", "text": "   "},
                {"id": "c", "text": 7},
                "just a string",
                null,
                {"id": "d", "text": "  Kept  "}
            ])),
            &mut ids,
        );

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "d");
        assert_eq!(items[0].text, "Kept");
        assert_eq!(report.dropped, 5);
    }

    #[test]
    fn test_normalize_regenerates_missing_ids() {
        let mut ids = SequentialIdGenerator::new("gen");
        let (items, report) = normalize(
            entries(json!([
                {"text": "no id"},
                {"id": "", "text": "blank id"},
                {"id": null, "text": "null id"},
                {"id": 42, "text": "numeric id"},
                {"id": "x", "text": "first x"},
                {"id": "x", "text": "second x"}
            ])),
            &mut ids,
        );

        let got: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(got, vec!["gen-1", "gen-2", "gen-3", "42", "x", "gen-4"]);
        assert_eq!(report.regenerated_ids, 4);
    }

    #[test]
    fn test_normalize_fresh_ids_avoid_payload_ids() {
        // The generator's first output already appears later in the payload
        let mut ids = SequentialIdGenerator::new("item");
        let (items, _) = normalize(
            entries(json!([
                {"text": "needs id"},
                {"id": "item-1", "text": "explicit"}
            ])),
            &mut ids,
        );

        assert_eq!(items[0].id, "item-2");
        assert_eq!(items[1].id, "item-1");
    }

    #[test]
    fn test_normalize_coerces_completed() {
        let mut ids = SequentialIdGenerator::new("gen");
        let (items, _) = normalize(
            entries(json!([
                {"text": "a", "completed": true},
                {"text": "b", "completed": false},
                {"text": "c", "completed": 1},
                {"text": "d", "completed": 0},
                {"text": "e", "completed": "yes"},
                {"text": "f", "completed": ""},
                {"text": "g", "completed": null},
                {"text": "h"},
                {"text": "i", "completed": []},
                {"text": "j", "completed": {}}
            ])),
            &mut ids,
        );

        let flags: Vec<bool> = items.iter().map(|i| i.completed).collect();
        assert_eq!(flags, vec![true, false, true, false, true, false, false, false, true, true]);
    }

    #[test]
    fn test_yaml_roundtrip_through_normalize() {
        let items = vec![
            Item { id: "a".into(), text: "One".into(), completed: true },
            Item::new("b", "Two"),
        ];

        let yaml = encode(&items, SnapshotFormat::Yaml).unwrap();
        let raw = decode(yaml.as_bytes(), SnapshotFormat::Yaml).unwrap();
        let (back, report) = normalize(raw, &mut SequentialIdGenerator::default());

        assert_eq!(back, items);
        assert_eq!(report.regenerated_ids, 0);
    }

    #[test]
    fn test_yaml_rejects_mapping_top_level() {
        assert!(parse_yaml_snapshot(b"id: a\ntext: x\n").is_err());
    }

    #[test]
    fn test_snapshot_format_parse() {
        assert_eq!("json".parse::<SnapshotFormat>().unwrap(), SnapshotFormat::Json);
        assert_eq!("YML".parse::<SnapshotFormat>().unwrap(), SnapshotFormat::Yaml);
        assert!("toml".parse::<SnapshotFormat>().is_err());
        assert_eq!(SnapshotFormat::Yaml.to_string(), "yaml");
    }
}
