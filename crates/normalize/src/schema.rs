use relief_core::FieldValue;
use serde_json::{Map, Value};

/// How a raw value is coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Integer count; floats are truncated, `"1,234"` parses.
    Count,
    /// Floating point measure.
    Number,
    /// Short categorical label.
    Category,
    /// Free text.
    Text,
}

/// Value used when no candidate yields a usable value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldDefault {
    Zero,
    Unknown,
    Null,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Canonical output name. Always tried before `candidates`.
    pub name: &'static str,
    /// Alternate upstream names in priority order; dotted names walk nested objects.
    pub candidates: &'static [&'static str],
    pub kind: FieldKind,
    pub default: FieldDefault,
}

impl FieldSpec {
    pub const fn count(name: &'static str, candidates: &'static [&'static str]) -> Self {
        Self {
            name,
            candidates,
            kind: FieldKind::Count,
            default: FieldDefault::Zero,
        }
    }

    pub const fn number(name: &'static str, candidates: &'static [&'static str]) -> Self {
        Self {
            name,
            candidates,
            kind: FieldKind::Number,
            default: FieldDefault::Null,
        }
    }

    pub const fn category(name: &'static str, candidates: &'static [&'static str]) -> Self {
        Self {
            name,
            candidates,
            kind: FieldKind::Category,
            default: FieldDefault::Unknown,
        }
    }

    pub const fn text(name: &'static str, candidates: &'static [&'static str]) -> Self {
        Self {
            name,
            candidates,
            kind: FieldKind::Text,
            default: FieldDefault::Null,
        }
    }

    /// Canonical name followed by the declared candidates.
    pub fn lookup_order(&self) -> impl Iterator<Item = &'static str> + '_ {
        std::iter::once(self.name).chain(self.candidates.iter().copied())
    }

    /// First candidate whose value coerces to this field's kind, else the default.
    pub fn resolve(&self, row: &Map<String, Value>) -> FieldValue {
        self.lookup_order()
            .filter_map(|name| lookup(row, name))
            .find_map(|raw| coerce(self.kind, raw))
            .unwrap_or_else(|| self.default_value())
    }

    pub fn default_value(&self) -> FieldValue {
        match (self.default, self.kind) {
            (FieldDefault::Zero, FieldKind::Number) => FieldValue::Float(0.0),
            (FieldDefault::Zero, _) => FieldValue::Integer(0),
            (FieldDefault::Unknown, _) => FieldValue::Text("unknown".to_string()),
            (FieldDefault::Null, _) => FieldValue::Null,
        }
    }
}

/// A dataset category's canonical shape.
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    pub name: &'static str,
    /// Upstream date field names in priority order; `date` is always tried first.
    pub date_fields: &'static [&'static str],
    pub fields: &'static [FieldSpec],
}

impl Schema {
    pub fn date_lookup_order(&self) -> impl Iterator<Item = &'static str> + '_ {
        std::iter::once("date").chain(self.date_fields.iter().copied())
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Look up `name` in `row`: exact key first, then as a dotted path.
/// `null` and blank strings count as absent.
pub(crate) fn lookup<'a>(row: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    let found = match row.get(name) {
        Some(v) => Some(v),
        None if name.contains('.') => {
            let mut parts = name.split('.');
            let first = row.get(parts.next()?)?;
            parts.try_fold(first, |node, key| node.as_object()?.get(key))
        }
        None => None,
    }?;
    match found {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        v => Some(v),
    }
}

fn coerce(kind: FieldKind, raw: &Value) -> Option<FieldValue> {
    match kind {
        FieldKind::Count => coerce_number(raw).map(|n| FieldValue::Integer(n.trunc() as i64)),
        FieldKind::Number => coerce_number(raw).map(FieldValue::Float),
        FieldKind::Category | FieldKind::Text => coerce_text(raw).map(FieldValue::Text),
    }
}

fn coerce_number(raw: &Value) -> Option<f64> {
    let n = match raw {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .chars()
                .filter(|c| *c != ',' && *c != '_' && !c.is_whitespace())
                .collect();
            cleaned.parse::<f64>().ok()?
        }
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn coerce_text(raw: &Value) -> Option<String> {
    match raw {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
