use serde::{Deserialize, Deserializer};
use serde_json::{Map, Number, Value};

/// Loosely typed record input or payload, keyed by field name.
pub type Loose = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    Flag,
    Reference,
    Tags,
}

/// A canonical (`_c`) field and the bare legacy name accepted in its place.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub canonical: &'static str,
    pub legacy: &'static str,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub const fn new(canonical: &'static str, legacy: &'static str, kind: FieldKind) -> Self {
        Self {
            canonical,
            legacy,
            kind,
        }
    }
}

/// Empty text, tags or references (`""`, reference `0`) that should give way
/// to the other spelling on create. Numbers and flags are never blank.
fn is_blank(kind: FieldKind, value: &Value) -> bool {
    match kind {
        FieldKind::Text | FieldKind::Tags => value.as_str().is_some_and(str::is_empty),
        FieldKind::Reference => reference_id(value).is_none_or(|id| id == 0),
        FieldKind::Number | FieldKind::Flag => false,
    }
}

/// Value for a create payload. The canonical spelling wins over the legacy one;
/// a null counts as absent, and a blank text or reference falls through to the
/// other spelling. A blank value is still sent when neither spelling has more.
pub fn pick_create(input: &Loose, spec: &FieldSpec) -> Option<Value> {
    let present: Vec<&Value> = [spec.canonical, spec.legacy]
        .iter()
        .filter_map(|key| input.get(*key))
        .filter(|value| !value.is_null())
        .collect();
    present
        .iter()
        .find(|value| !is_blank(spec.kind, value))
        .or_else(|| present.first())
        .map(|value| coerce(spec.kind, value))
}

/// Value for an update payload. Only supplied fields are emitted; when both
/// spellings are present the legacy one is applied last and wins. An explicit
/// null is kept so a field can be cleared.
pub fn pick_update(input: &Loose, spec: &FieldSpec) -> Option<Value> {
    let mut picked = None;
    for key in [spec.canonical, spec.legacy] {
        if let Some(value) = input.get(key) {
            picked = Some(coerce(spec.kind, value));
        }
    }
    picked
}

pub fn normalize_create(input: &Loose, specs: &[FieldSpec]) -> Loose {
    specs
        .iter()
        .filter_map(|spec| pick_create(input, spec).map(|v| (spec.canonical.to_string(), v)))
        .collect()
}

pub fn normalize_update(input: &Loose, specs: &[FieldSpec]) -> Loose {
    specs
        .iter()
        .filter_map(|spec| pick_update(input, spec).map(|v| (spec.canonical.to_string(), v)))
        .collect()
}

/// Bring a value into the wire shape the store expects for `kind`.
pub fn coerce(kind: FieldKind, value: &Value) -> Value {
    match kind {
        FieldKind::Text => match value {
            Value::Number(n) => Value::String(n.to_string()),
            Value::Bool(b) => Value::String(b.to_string()),
            other => other.clone(),
        },
        FieldKind::Number => match value {
            Value::Number(_) | Value::Null => value.clone(),
            Value::String(s) => parse_number(s).map(Value::Number).unwrap_or(Value::Null),
            _ => Value::Null,
        },
        FieldKind::Flag => match value {
            Value::Bool(_) | Value::Null => value.clone(),
            other => Value::Bool(truthy(other)),
        },
        FieldKind::Reference => reference_id(value).map(Value::from).unwrap_or(Value::Null),
        FieldKind::Tags => match value {
            Value::Null => Value::Null,
            Value::Array(items) => {
                let tags: Vec<String> = items
                    .iter()
                    .filter_map(|item| match item {
                        Value::String(s) => Some(s.trim().to_string()),
                        Value::Null => None,
                        other => Some(other.to_string()),
                    })
                    .filter(|s| !s.is_empty())
                    .collect();
                Value::String(join_tags(&tags))
            }
            Value::String(s) => Value::String(join_tags(&split_tags(s))),
            other => Value::String(other.to_string()),
        },
    }
}

fn parse_number(s: &str) -> Option<Number> {
    let s = s.trim();
    if let Ok(i) = s.parse::<i64>() {
        return Some(Number::from(i));
    }
    s.parse::<f64>().ok().and_then(Number::from_f64)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Integer id behind a reference field. The store may hand back a bare
/// number, a numeric string, or a lookup object `{"Id": n, "Name": ".."}`.
pub fn reference_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => leading_integer(s),
        Value::Object(map) => map.get("Id").and_then(reference_id),
        _ => None,
    }
}

/// Leading integer of a string, ignoring whatever follows ("12abc" is 12).
fn leading_integer(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, s.strip_prefix('+').unwrap_or(s)),
    };
    let end = digits
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

pub fn split_tags(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn join_tags(tags: &[String]) -> String {
    tags.join(",")
}

// Decoders for record fields. Stored records can carry nulls and loosely
// typed values, so each field type has a lenient reader.

pub fn de_text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

pub fn de_number<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_f64().unwrap_or_default(),
        Value::String(s) => s.trim().parse().unwrap_or_default(),
        _ => 0.0,
    })
}

pub fn de_flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(truthy(&Value::deserialize(d)?))
}

pub fn de_reference<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    Ok(reference_id(&Value::deserialize(d)?))
}

pub fn de_tags<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => split_tags(&s),
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NAME: FieldSpec = FieldSpec::new("name_c", "name", FieldKind::Text);
    const CONTACT_ID: FieldSpec = FieldSpec::new("contactId_c", "contactId", FieldKind::Reference);

    fn loose(value: Value) -> Loose {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn create_prefers_canonical_spelling() {
        let input = loose(json!({"name_c": "Ada", "name": "Legacy"}));
        assert_eq!(pick_create(&input, &NAME), Some(json!("Ada")));
    }

    #[test]
    fn create_falls_back_to_legacy_on_null() {
        let input = loose(json!({"name_c": null, "name": "Legacy"}));
        assert_eq!(pick_create(&input, &NAME), Some(json!("Legacy")));
        assert_eq!(pick_create(&Loose::new(), &NAME), None);
    }

    #[test]
    fn create_falls_back_to_legacy_on_blank() {
        let input = loose(json!({"name_c": "", "name": "Ada", "email_c": "", "email": "a@x"}));
        let payload = normalize_create(
            &input,
            &[NAME, FieldSpec::new("email_c", "email", FieldKind::Text)],
        );
        assert_eq!(payload["name_c"], json!("Ada"));
        assert_eq!(payload["email_c"], json!("a@x"));

        let input = loose(json!({"contactId_c": 0, "contactId": "4"}));
        assert_eq!(pick_create(&input, &CONTACT_ID), Some(json!(4)));

        // Nothing better on offer: the blank value is kept.
        let input = loose(json!({"name_c": ""}));
        assert_eq!(pick_create(&input, &NAME), Some(json!("")));

        // Numbers keep zero even when a legacy value exists.
        let value = FieldSpec::new("value_c", "value", FieldKind::Number);
        let input = loose(json!({"value_c": 0, "value": 50}));
        assert_eq!(pick_create(&input, &value), Some(json!(0)));
    }

    #[test]
    fn update_lets_legacy_override_and_keeps_null() {
        let input = loose(json!({"name_c": "Ada", "name": "Legacy"}));
        assert_eq!(pick_update(&input, &NAME), Some(json!("Legacy")));

        let input = loose(json!({"name_c": null}));
        assert_eq!(pick_update(&input, &NAME), Some(Value::Null));
    }

    #[test]
    fn references_accept_numbers_strings_and_lookups() {
        assert_eq!(reference_id(&json!(7)), Some(7));
        assert_eq!(reference_id(&json!("12")), Some(12));
        assert_eq!(reference_id(&json!("12abc")), Some(12));
        assert_eq!(reference_id(&json!({"Id": 3, "Name": "Ada"})), Some(3));
        assert_eq!(reference_id(&json!("abc")), None);

        let input = loose(json!({"contactId": "42"}));
        assert_eq!(pick_create(&input, &CONTACT_ID), Some(json!(42)));
    }

    #[test]
    fn numbers_and_tags_are_coerced() {
        assert_eq!(coerce(FieldKind::Number, &json!("5000")), json!(5000));
        assert_eq!(coerce(FieldKind::Number, &json!("12.5")), json!(12.5));
        assert_eq!(coerce(FieldKind::Number, &json!("")), Value::Null);
        assert_eq!(
            coerce(FieldKind::Tags, &json!(["vip", " lead ", ""])),
            json!("vip,lead")
        );
        assert_eq!(coerce(FieldKind::Tags, &json!("vip, lead")), json!("vip,lead"));
        assert_eq!(coerce(FieldKind::Flag, &json!("true")), json!(true));
    }
}
