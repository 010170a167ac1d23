// src/storage/models.rs
//! Shapes of the two persisted JSON stores.
//!
//! `filing_dates.json`:    ticker -> year -> [`FilingMetadata`]
//! `company_mentions.json`: ticker -> year -> legacy count map | [`MentionRecord`]
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub type FilingMetadataStore = BTreeMap<String, BTreeMap<String, FilingMetadata>>;

/// Mention store as read back, every year value already normalized.
pub type MentionStore = BTreeMap<String, BTreeMap<String, MentionSource>>;

/// Mention store as written by the extractor (always the current schema).
pub type MentionRecordStore = BTreeMap<String, BTreeMap<String, MentionRecord>>;

/// Mentioned ticker -> count, exactly as the source stated it (may be zero or negative).
pub type MentionCounts = BTreeMap<String, i64>;

/// Metadata extracted from one filing's SEC header. Every field the header
/// lacked stays `None` (serialized as `null`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilingMetadata {
    #[serde(deserialize_with = "lenient_string")]
    pub accession_number: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub filing_type: Option<String>,
    #[serde(deserialize_with = "lenient_section")]
    pub dates: FilingDates,
    #[serde(deserialize_with = "lenient_section")]
    pub company_info: CompanyInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilingDates {
    #[serde(deserialize_with = "lenient_string")]
    pub filed_date: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub period_end: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub acceptance_datetime: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyInfo {
    #[serde(deserialize_with = "lenient_string")]
    pub company_name: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub cik: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub sic_code: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub state_incorporation: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub fiscal_year_end: Option<String>,
}

/// Strings pass through and numbers keep their digits (`20190226`); any
/// other value is stored as null.
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Null => None,
        Value::Number(n) => Some(n.to_string()),
        other => {
            tracing::warn!("Expected a string field, got {}; storing null", type_name(&other));
            None
        }
    })
}

/// A null or malformed sub-object becomes its default rather than failing the store.
fn lenient_section<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => T::default(),
        value @ Value::Object(_) => serde_json::from_value(value).unwrap_or_else(|e| {
            tracing::warn!("Unreadable filing section ({}), treating as empty", e);
            T::default()
        }),
        other => {
            tracing::warn!("Filing section is not an object ({}), treating as empty", type_name(&other));
            T::default()
        }
    })
}

/// Current-schema mention record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MentionRecord {
    pub accession_number: Option<String>,
    pub filing_type: Option<String>,
    pub competitor_mentions: BTreeMap<String, u64>,
    pub dates: FilingDates,
}

/// One year's mention value in either of the two historical layouts.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "Value")]
pub enum MentionSource {
    /// `{"EXPE": 3, "TRIP": 1}`
    Legacy(MentionCounts),
    /// `{"competitor_mentions": {...}, "dates": {...}, ...}`
    Current {
        competitor_mentions: MentionCounts,
        dates: Option<FilingDates>,
    },
}

impl MentionSource {
    pub fn counts(&self) -> &MentionCounts {
        match self {
            MentionSource::Legacy(counts) => counts,
            MentionSource::Current { competitor_mentions, .. } => competitor_mentions,
        }
    }
}

impl From<Value> for MentionSource {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(mut map) => match map.remove("competitor_mentions") {
                Some(inner) => MentionSource::Current {
                    competitor_mentions: counts_from_value(inner),
                    dates: map
                        .remove("dates")
                        .and_then(|d| serde_json::from_value::<FilingDates>(d).ok()),
                },
                None => MentionSource::Legacy(counts_from_map(map)),
            },
            other => {
                tracing::warn!("Mention value is not an object ({}), treating as no mentions", type_name(&other));
                MentionSource::Legacy(MentionCounts::new())
            }
        }
    }
}

fn counts_from_value(value: Value) -> MentionCounts {
    match value {
        Value::Object(map) => counts_from_map(map),
        Value::Null => MentionCounts::new(),
        other => {
            tracing::warn!("competitor_mentions is not an object ({}), treating as empty", type_name(&other));
            MentionCounts::new()
        }
    }
}

fn counts_from_map(map: serde_json::Map<String, Value>) -> MentionCounts {
    map.into_iter()
        .filter_map(|(ticker, raw)| match parse_count(&raw) {
            Some(count) => Some((ticker, count)),
            None => {
                tracing::debug!("Ignoring non-integer mention count for {}: {}", ticker, raw);
                None
            }
        })
        .collect()
}

/// Integers, integral floats and digit strings are counts; anything else is absent.
fn parse_count(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => {
            let s = s.trim();
            if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
                s.parse::<i64>().ok()
            } else {
                None
            }
        }
        _ => None,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn legacy_and_current_shapes_normalize_to_same_counts() {
        let legacy: MentionSource = serde_json::from_value(json!({"EXPE": 3, "TRIP": 0})).unwrap();
        let current: MentionSource = serde_json::from_value(json!({
            "competitor_mentions": {"EXPE": 3, "TRIP": 0},
            "dates": {"filed_date": "2021-02-25", "period_end": "2020-12-31", "acceptance_datetime": null},
            "accession_number": "0001075531-21-000009"
        }))
        .unwrap();

        assert!(matches!(legacy, MentionSource::Legacy(_)));
        match &current {
            MentionSource::Current { dates, .. } => {
                assert_eq!(dates.as_ref().unwrap().filed_date.as_deref(), Some("2021-02-25"));
            }
            other => panic!("expected current schema, got {:?}", other),
        }
        assert_eq!(legacy.counts(), current.counts());
    }

    #[test]
    fn odd_values_resolve_without_error() {
        let store: MentionStore = serde_json::from_value(json!({
            "BKNG": {
                "2019": [],
                "2020": {"competitor_mentions": null},
                "2021": {"EXPE": "4", "TRIP": 2.0, "TRVG": 1.5, "MMYT": "many", "YTRA": null, "TCOM": -2}
            }
        }))
        .unwrap();

        let bkng = &store["BKNG"];
        assert!(bkng["2019"].counts().is_empty());
        assert!(bkng["2020"].counts().is_empty());

        let counts = bkng["2021"].counts();
        assert_eq!(counts.get("EXPE"), Some(&4));
        assert_eq!(counts.get("TRIP"), Some(&2));
        assert_eq!(counts.get("TCOM"), Some(&-2));
        assert!(!counts.contains_key("TRVG"));
        assert!(!counts.contains_key("MMYT"));
        assert!(!counts.contains_key("YTRA"));
    }

    #[test]
    fn filing_metadata_tolerates_missing_sections() {
        let meta: FilingMetadata = serde_json::from_value(json!({
            "accession_number": "0001324424-20-000004",
            "dates": {"filed_date": "2020-02-14"}
        }))
        .unwrap();
        assert_eq!(meta.dates.filed_date.as_deref(), Some("2020-02-14"));
        assert!(meta.dates.period_end.is_none());
        assert_eq!(meta.company_info, CompanyInfo::default());
    }

    #[test]
    fn filing_store_tolerates_odd_field_types() {
        let store: FilingMetadataStore = serde_json::from_value(json!({
            "BKNG": {
                "2019": {"dates": {"filed_date": 20190226, "period_end": ["2018-12-31"]}},
                "2020": {"dates": null, "company_info": null},
                "2021": {"dates": "2021-02-24", "company_info": {"cik": 1075531, "company_name": true}}
            }
        }))
        .unwrap();

        let bkng = &store["BKNG"];
        assert_eq!(bkng["2019"].dates.filed_date.as_deref(), Some("20190226"));
        assert_eq!(bkng["2019"].dates.period_end, None);
        assert_eq!(bkng["2020"].dates, FilingDates::default());
        assert_eq!(bkng["2020"].company_info, CompanyInfo::default());
        assert_eq!(bkng["2021"].dates, FilingDates::default());
        assert_eq!(bkng["2021"].company_info.cik.as_deref(), Some("1075531"));
        assert_eq!(bkng["2021"].company_info.company_name, None);
    }
}
