//! Metadata (`where`) and document-content (`where_document`) filters.
//!
//! Filters are written as JSON objects with exactly one key each:
//!
//! ```json
//! {"$and": [{"category": "news"}, {"year": {"$gte": 2020}}]}
//! {"$contains": "qdrant"}
//! ```
use serde::Deserialize;
use serde_json::{Map, Value};

use super::error::{DocumentStoreError, Result};

/// A metadata value a filter compares against.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Scalar {
    pub fn from_json(value: &Value) -> Option<Scalar> {
        match value {
            Value::String(s) => Some(Scalar::Str(s.clone())),
            Value::Bool(b) => Some(Scalar::Bool(*b)),
            Value::Number(n) => n
                .as_i64()
                .map(Scalar::Int)
                .or_else(|| n.as_f64().map(Scalar::Float)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(i) => Some(*i as f64),
            Scalar::Float(f) => Some(*f),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Scalar::Str(_) => "string",
            Scalar::Int(_) | Scalar::Float(_) => "number",
            Scalar::Bool(_) => "bool",
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Str(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Str(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Comparison {
    Eq(Scalar),
    Ne(Scalar),
    Gt(f64),
    Gte(f64),
    Lt(f64),
    Lte(f64),
    In(Vec<Scalar>),
    Nin(Vec<Scalar>),
}

/// Filter over document metadata.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub enum WhereFilter {
    Field { key: String, comparison: Comparison },
    And(Vec<WhereFilter>),
    Or(Vec<WhereFilter>),
}

impl WhereFilter {
    /// Shorthand for `{"key": value}`.
    pub fn eq(key: impl Into<String>, value: impl Into<Scalar>) -> Self {
        WhereFilter::Field {
            key: key.into(),
            comparison: Comparison::Eq(value.into()),
        }
    }

    pub fn from_json(value: &Value) -> Result<Self> {
        parse_where(value, "where")
    }
}

impl TryFrom<Value> for WhereFilter {
    type Error = DocumentStoreError;

    fn try_from(value: Value) -> Result<Self> {
        WhereFilter::from_json(&value)
    }
}

impl std::str::FromStr for WhereFilter {
    type Err = DocumentStoreError;

    fn from_str(s: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(s)
            .map_err(|e| DocumentStoreError::InvalidFilter(format!("where is not valid JSON: {}", e)))?;
        WhereFilter::from_json(&value)
    }
}

/// Filter over the stored document text.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub enum DocumentFilter {
    Contains(String),
    NotContains(String),
    And(Vec<DocumentFilter>),
    Or(Vec<DocumentFilter>),
}

impl DocumentFilter {
    pub fn from_json(value: &Value) -> Result<Self> {
        parse_where_document(value, "where_document")
    }
}

impl TryFrom<Value> for DocumentFilter {
    type Error = DocumentStoreError;

    fn try_from(value: Value) -> Result<Self> {
        DocumentFilter::from_json(&value)
    }
}

impl std::str::FromStr for DocumentFilter {
    type Err = DocumentStoreError;

    fn from_str(s: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(s).map_err(|e| {
            DocumentStoreError::InvalidFilter(format!("where_document is not valid JSON: {}", e))
        })?;
        DocumentFilter::from_json(&value)
    }
}

fn invalid(message: String) -> DocumentStoreError {
    DocumentStoreError::InvalidFilter(message)
}

fn single_entry<'a>(value: &'a Value, path: &str) -> Result<(&'a String, &'a Value)> {
    let object: &Map<String, Value> = value
        .as_object()
        .ok_or_else(|| invalid(format!("expected an object at {}, got {}", path, value)))?;
    let mut entries = object.iter();
    match (entries.next(), entries.next()) {
        (Some(entry), None) => Ok(entry),
        _ => Err(invalid(format!(
            "expected exactly one operator at {}, got {} keys",
            path,
            object.len()
        ))),
    }
}

fn sub_filters<'a>(value: &'a Value, path: &str) -> Result<&'a Vec<Value>> {
    match value.as_array() {
        Some(list) if !list.is_empty() => Ok(list),
        Some(_) => Err(invalid(format!("{} needs at least one sub-filter", path))),
        None => Err(invalid(format!("{} expects a list, got {}", path, value))),
    }
}

fn parse_where(value: &Value, path: &str) -> Result<WhereFilter> {
    let (key, inner) = single_entry(value, path)?;
    match key.as_str() {
        "$and" | "$or" => {
            let op_path = format!("{}.{}", path, key);
            let mut parsed = sub_filters(inner, &op_path)?
                .iter()
                .enumerate()
                .map(|(i, v)| parse_where(v, &format!("{}[{}]", op_path, i)))
                .collect::<Result<Vec<_>>>()?;
            if parsed.len() == 1 {
                if let Some(only) = parsed.pop() {
                    return Ok(only);
                }
            }
            Ok(if key == "$and" {
                WhereFilter::And(parsed)
            } else {
                WhereFilter::Or(parsed)
            })
        }
        op if op.starts_with('$') => Err(invalid(format!("unknown operator '{}' at {}", op, path))),
        field => Ok(WhereFilter::Field {
            key: field.to_string(),
            comparison: parse_comparison(inner, &format!("{}.{}", path, field))?,
        }),
    }
}

fn parse_comparison(value: &Value, path: &str) -> Result<Comparison> {
    if let Some(scalar) = Scalar::from_json(value) {
        return Ok(Comparison::Eq(scalar));
    }
    let (op, operand) = single_entry(value, path)?;
    let scalar = || {
        Scalar::from_json(operand).ok_or_else(|| {
            invalid(format!("{} at {} expects a string, number or bool", op, path))
        })
    };
    let number = || {
        operand
            .as_f64()
            .ok_or_else(|| invalid(format!("{} at {} expects a number, got {}", op, path, operand)))
    };
    match op.as_str() {
        "$eq" => Ok(Comparison::Eq(scalar()?)),
        "$ne" => Ok(Comparison::Ne(scalar()?)),
        "$gt" => Ok(Comparison::Gt(number()?)),
        "$gte" => Ok(Comparison::Gte(number()?)),
        "$lt" => Ok(Comparison::Lt(number()?)),
        "$lte" => Ok(Comparison::Lte(number()?)),
        "$in" => Ok(Comparison::In(scalar_list(operand, op, path)?)),
        "$nin" => Ok(Comparison::Nin(scalar_list(operand, op, path)?)),
        other => Err(invalid(format!("unknown operator '{}' at {}", other, path))),
    }
}

fn scalar_list(value: &Value, op: &str, path: &str) -> Result<Vec<Scalar>> {
    let list = value
        .as_array()
        .filter(|l| !l.is_empty())
        .ok_or_else(|| invalid(format!("{} at {} expects a non-empty list", op, path)))?;
    let scalars = list
        .iter()
        .map(|v| {
            Scalar::from_json(v)
                .ok_or_else(|| invalid(format!("{} at {} contains a non-scalar value {}", op, path, v)))
        })
        .collect::<Result<Vec<_>>>()?;
    let kind = scalars[0].kind();
    if scalars.iter().any(|s| s.kind() != kind) {
        return Err(invalid(format!("{} at {} mixes value types", op, path)));
    }
    Ok(scalars)
}

fn parse_where_document(value: &Value, path: &str) -> Result<DocumentFilter> {
    let (key, inner) = single_entry(value, path)?;
    let text = || {
        inner
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| invalid(format!("{} at {} expects a string, got {}", key, path, inner)))
    };
    match key.as_str() {
        "$contains" => Ok(DocumentFilter::Contains(text()?)),
        "$not_contains" => Ok(DocumentFilter::NotContains(text()?)),
        "$and" | "$or" => {
            let op_path = format!("{}.{}", path, key);
            let mut parsed = sub_filters(inner, &op_path)?
                .iter()
                .enumerate()
                .map(|(i, v)| parse_where_document(v, &format!("{}[{}]", op_path, i)))
                .collect::<Result<Vec<_>>>()?;
            if parsed.len() == 1 {
                if let Some(only) = parsed.pop() {
                    return Ok(only);
                }
            }
            Ok(if key == "$and" {
                DocumentFilter::And(parsed)
            } else {
                DocumentFilter::Or(parsed)
            })
        }
        other => Err(invalid(format!("unknown operator '{}' at {}", other, path))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn test_bare_value_is_equality() {
        let filter = WhereFilter::from_json(&json!({"category": "news"})).unwrap();
        assert_eq!(filter, WhereFilter::eq("category", "news"));
    }

    #[test]
    fn test_operators_parse() {
        let filter = WhereFilter::from_json(&json!({
            "$and": [
                {"year": {"$gte": 2020}},
                {"lang": {"$in": ["en", "ko"]}},
                {"draft": {"$ne": true}}
            ]
        }))
        .unwrap();
        assert_eq!(
            filter,
            WhereFilter::And(vec![
                WhereFilter::Field {
                    key: "year".into(),
                    comparison: Comparison::Gte(2020.0)
                },
                WhereFilter::Field {
                    key: "lang".into(),
                    comparison: Comparison::In(vec!["en".into(), "ko".into()])
                },
                WhereFilter::Field {
                    key: "draft".into(),
                    comparison: Comparison::Ne(Scalar::Bool(true))
                },
            ])
        );
    }

    #[test]
    fn test_single_element_or_is_unwrapped() {
        let filter = WhereFilter::from_json(&json!({"$or": [{"a": 1}]})).unwrap();
        assert_eq!(filter, WhereFilter::eq("a", 1i64));
    }

    #[test]
    fn test_float_equality_keeps_float() {
        let filter = WhereFilter::from_json(&json!({"ratio": 0.5})).unwrap();
        assert_eq!(filter, WhereFilter::eq("ratio", 0.5));
    }

    #[test]
    fn test_where_rejects_malformed_input() {
        assert_matches!(
            WhereFilter::from_json(&json!({"a": 1, "b": 2})),
            Err(DocumentStoreError::InvalidFilter(msg)) if msg.contains("exactly one operator")
        );
        assert_matches!(
            WhereFilter::from_json(&json!({"a": {"$gt": "x"}})),
            Err(DocumentStoreError::InvalidFilter(msg)) if msg.contains("expects a number")
        );
        assert_matches!(
            WhereFilter::from_json(&json!({"a": {"$in": []}})),
            Err(DocumentStoreError::InvalidFilter(_))
        );
        assert_matches!(
            WhereFilter::from_json(&json!({"a": {"$in": ["x", 1]}})),
            Err(DocumentStoreError::InvalidFilter(msg)) if msg.contains("mixes")
        );
        assert_matches!(
            WhereFilter::from_json(&json!({"$xor": []})),
            Err(DocumentStoreError::InvalidFilter(msg)) if msg.contains("unknown operator")
        );
        assert_matches!(
            WhereFilter::from_json(&json!({"$and": []})),
            Err(DocumentStoreError::InvalidFilter(_))
        );
        assert_matches!(
            WhereFilter::from_json(&json!({"a": null})),
            Err(DocumentStoreError::InvalidFilter(_))
        );
    }

    #[test]
    fn test_where_document_parse() {
        let filter = DocumentFilter::from_json(&json!({
            "$or": [{"$contains": "rust"}, {"$not_contains": "python"}]
        }))
        .unwrap();
        assert_eq!(
            filter,
            DocumentFilter::Or(vec![
                DocumentFilter::Contains("rust".into()),
                DocumentFilter::NotContains("python".into()),
            ])
        );
        assert_matches!(
            DocumentFilter::from_json(&json!({"$contains": 3})),
            Err(DocumentStoreError::InvalidFilter(_))
        );
        assert_matches!(
            DocumentFilter::from_json(&json!({"$regex": "a+"})),
            Err(DocumentStoreError::InvalidFilter(_))
        );
    }

    #[test]
    fn test_from_str_and_deserialize() {
        let parsed: WhereFilter = r#"{"source": "wiki"}"#.parse().unwrap();
        assert_eq!(parsed, WhereFilter::eq("source", "wiki"));

        let deserialized: DocumentFilter = serde_json::from_value(json!({"$contains": "x"})).unwrap();
        assert_eq!(deserialized, DocumentFilter::Contains("x".into()));

        assert!("{not json".parse::<WhereFilter>().is_err());
    }
}
