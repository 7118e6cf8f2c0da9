use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateEntry {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub role: String,
    pub name: Option<String>,
}

/// Classification of one transcript, as returned by the analyze endpoint.
///
/// The backend is loose about shapes (`dates` and `parties` arrive as either
/// arrays or objects, fact values may be null), so decoding goes through
/// a raw `Value` form and normalizes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "RawAnalysis")]
pub struct AnalysisResult {
    pub category: Option<String>,
    pub case_type_key: Option<String>,
    pub urgency: Option<String>,
    pub department: Option<String>,
    pub confidence: Option<f64>,
    pub key_facts: BTreeMap<String, String>,
    pub dates: Vec<DateEntry>,
    pub parties: Vec<Party>,
    pub suggested_actions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checklists: Option<Value>,
}

impl AnalysisResult {
    /// First `limit` facts as `name: value` lines, for compact display.
    pub fn summary_facts(&self, limit: usize) -> Vec<String> {
        self.key_facts
            .iter()
            .take(limit)
            .map(|(k, v)| format!("{k}: {v}"))
            .collect()
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawAnalysis {
    #[serde(default)]
    category: Option<Value>,
    #[serde(default)]
    case_type_key: Option<Value>,
    #[serde(default, alias = "priority", alias = "urgency_level")]
    urgency: Option<Value>,
    #[serde(default)]
    department: Option<Value>,
    #[serde(default)]
    confidence: Option<Value>,
    #[serde(default)]
    key_facts: Option<Value>,
    #[serde(default)]
    dates: Option<Value>,
    #[serde(default)]
    parties: Option<Value>,
    #[serde(default)]
    suggested_actions: Option<Value>,
    #[serde(default)]
    checklists: Option<Value>,
}

impl From<RawAnalysis> for AnalysisResult {
    fn from(raw: RawAnalysis) -> Self {
        Self {
            category: raw.category.as_ref().and_then(scalar_text),
            case_type_key: raw.case_type_key.as_ref().and_then(scalar_text),
            urgency: raw.urgency.as_ref().and_then(scalar_text),
            department: raw.department.as_ref().and_then(scalar_text),
            confidence: raw.confidence.as_ref().and_then(Value::as_f64),
            key_facts: raw.key_facts.map(decode_facts).unwrap_or_default(),
            dates: raw.dates.map(decode_dates).unwrap_or_default(),
            parties: raw.parties.map(decode_parties).unwrap_or_default(),
            suggested_actions: raw.suggested_actions.map(decode_actions).unwrap_or_default(),
            checklists: raw.checklists.filter(|v| !is_empty_value(v)),
        }
    }
}

fn scalar_text(v: &Value) -> Option<String> {
    let s = match v {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

fn is_empty_value(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn first_text(obj: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| obj.get(*k).and_then(scalar_text))
}

fn decode_facts(v: Value) -> BTreeMap<String, String> {
    let Value::Object(map) = v else {
        return BTreeMap::new();
    };
    map.into_iter()
        .filter_map(|(k, v)| scalar_text(&v).map(|v| (k, v)))
        .collect()
}

fn decode_dates(v: Value) -> Vec<DateEntry> {
    match v {
        Value::Object(map) => map
            .into_iter()
            .filter_map(|(label, v)| scalar_text(&v).map(|value| DateEntry { label, value }))
            .collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::Object(obj) => {
                    let value = first_text(obj, &["value", "date", "text"])?;
                    let label = first_text(obj, &["label", "type", "name"])
                        .unwrap_or_else(|| "date".into());
                    Some(DateEntry { label, value })
                }
                other => scalar_text(other).map(|value| DateEntry {
                    label: "date".into(),
                    value,
                }),
            })
            .collect(),
        _ => vec![],
    }
}

fn decode_parties(v: Value) -> Vec<Party> {
    match v {
        Value::Object(map) => map
            .into_iter()
            .flat_map(|(role, v)| match v {
                Value::Array(names) => names
                    .iter()
                    .map(|n| Party {
                        role: role.clone(),
                        name: scalar_text(n),
                    })
                    .collect::<Vec<_>>(),
                other => vec![Party {
                    role,
                    name: scalar_text(&other),
                }],
            })
            .collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::Object(obj) => Some(Party {
                    role: first_text(obj, &["role", "type", "label"])
                        .unwrap_or_else(|| "party".into()),
                    name: first_text(obj, &["name", "text"]),
                }),
                other => scalar_text(other).map(|name| Party {
                    role: "party".into(),
                    name: Some(name),
                }),
            })
            .collect(),
        _ => vec![],
    }
}

fn decode_actions(v: Value) -> Vec<String> {
    let Value::Array(items) = v else {
        return scalar_text(&v).into_iter().collect();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::Object(obj) => first_text(obj, &["title", "action", "description", "name"]),
            other => scalar_text(other),
        })
        .collect()
}
