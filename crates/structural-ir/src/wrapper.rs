//! Primitive-wrapping kinds: which types box a primitive, how the boxed
//! value is extracted, and how a box is rebuilt from it.

use crate::error::Result;
use crate::value::{Attributes, Object, Primitive, Property, TypeDescriptor, Value};
use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use std::sync::{Arc, OnceLock};

/// Largest magnitude a timestamp may have, in milliseconds.
const MAX_TIME_MS: f64 = 8.64e15;

/// The fixed set of primitive kinds a type can derive from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WrapperKind {
    Number,
    String,
    Date,
    Boolean,
}

/// A wrapping kind together with the canonical primitive it boxes.
#[derive(Debug, Clone, PartialEq)]
pub struct Wrapped {
    pub kind: WrapperKind,
    pub primitive: Primitive,
}

impl WrapperKind {
    /// Resolution order used when matching a type against the kinds.
    pub const ALL: [WrapperKind; 4] = [
        WrapperKind::Number,
        WrapperKind::String,
        WrapperKind::Date,
        WrapperKind::Boolean,
    ];

    pub fn name(self) -> &'static str {
        match self {
            WrapperKind::Number => "Number",
            WrapperKind::String => "String",
            WrapperKind::Date => "Date",
            WrapperKind::Boolean => "Boolean",
        }
    }

    pub fn from_name(name: &str) -> Option<WrapperKind> {
        WrapperKind::ALL.into_iter().find(|k| k.name() == name)
    }

    /// The built-in type descriptor of this kind.
    pub fn descriptor(self) -> Arc<TypeDescriptor> {
        static DESCRIPTORS: OnceLock<[Arc<TypeDescriptor>; 4]> = OnceLock::new();
        let all = DESCRIPTORS.get_or_init(|| {
            WrapperKind::ALL.map(|k| Arc::new(TypeDescriptor::wrapping(k.name(), k)))
        });
        let idx = WrapperKind::ALL.iter().position(|k| *k == self).unwrap_or(0);
        Arc::clone(&all[idx])
    }

    /// Builds a bare box of this kind around `primitive`, including the own
    /// fields the kind itself contributes. Text boxes expose one read-only
    /// index field per character plus a hidden `length`.
    ///
    /// Indexes and `length` count Unicode scalar values (`char`s), not UTF-16
    /// code units: `"😀"` has one index field and a length of 1.
    pub fn construct(self, primitive: Primitive) -> Object {
        let primitive = self.canonical(primitive);
        let mut fields = IndexMap::new();
        if let Primitive::String(s) = &primitive {
            let mut count = 0usize;
            for (i, ch) in s.chars().enumerate() {
                fields.insert(
                    i.to_string(),
                    Property::new(ch.to_string(), Attributes::new(false, true, false)),
                );
                count += 1;
            }
            fields.insert("length".to_string(), Property::new(count as f64, Attributes::FROZEN));
        }
        Object::from_parts(self.descriptor(), Some(primitive), fields)
    }

    /// The canonical boxed value of `object`: the number for numeric boxes,
    /// the text for text boxes, milliseconds since the epoch for timestamps
    /// and the flag for booleans.
    pub fn extract(self, object: &Object) -> Primitive {
        match object.primitive() {
            Some(p) => self.canonical(p.clone()),
            None => self.default_primitive(),
        }
    }

    /// Converts a constructor argument into this kind's primitive. With no
    /// argument, timestamps default to the current time.
    pub fn coerce_arg(self, arg: Option<&Value>) -> Primitive {
        let Some(arg) = arg else {
            return match self {
                WrapperKind::Date => Primitive::Number(now_ms()),
                _ => self.default_primitive(),
            };
        };
        match to_primitive(arg) {
            Some(Primitive::Null) if self == WrapperKind::Date => Primitive::Number(0.0),
            Some(p) => self.canonical(p),
            None => match self {
                WrapperKind::Number | WrapperKind::Date => Primitive::Number(f64::NAN),
                WrapperKind::String => Primitive::String(display_value(arg)),
                WrapperKind::Boolean => Primitive::Bool(!matches!(arg, Value::Undefined)),
            },
        }
    }

    /// The primitive a box of this kind holds when nothing was given.
    pub(crate) fn default_primitive(self) -> Primitive {
        match self {
            WrapperKind::Number => Primitive::Number(0.0),
            WrapperKind::String => Primitive::String(String::new()),
            WrapperKind::Date => Primitive::Number(f64::NAN),
            WrapperKind::Boolean => Primitive::Bool(false),
        }
    }

    /// Normalizes a primitive into this kind's representation. A `null`
    /// timestamp is the invalid date, as that is how JSON text carries it.
    fn canonical(self, primitive: Primitive) -> Primitive {
        match self {
            WrapperKind::Number => Primitive::Number(to_number(&primitive)),
            WrapperKind::String => Primitive::String(to_text(&primitive)),
            WrapperKind::Date => match primitive {
                Primitive::Null => Primitive::Number(f64::NAN),
                other => Primitive::Number(time_clip(to_number(&other))),
            },
            WrapperKind::Boolean => Primitive::Bool(truthy(&primitive)),
        }
    }

    /// Behavior every box of this kind exposes. `None` when the kind has no
    /// such method.
    pub(crate) fn call_builtin(self, object: &Object, method: &str, args: &[Value]) -> Option<Result<Value>> {
        let primitive = self.extract(object);
        let value = match (self, method) {
            (_, "valueOf") => Value::from(primitive),
            (WrapperKind::Date, "toString" | "toISOString") => Value::String(iso_string(to_number(&primitive))),
            (_, "toString") => Value::String(to_text(&primitive)),
            (WrapperKind::Date, "getTime") => Value::from(primitive),
            (WrapperKind::Number, "toFixed") => {
                let digits = args.first().and_then(Value::as_f64).unwrap_or(0.0).clamp(0.0, 100.0) as usize;
                Value::String(format!("{:.*}", digits, to_number(&primitive)))
            }
            (WrapperKind::String, "charAt") => {
                let idx = args.first().and_then(Value::as_f64).unwrap_or(0.0);
                let ch = if idx >= 0.0 {
                    to_text(&primitive).chars().nth(idx as usize)
                } else {
                    None
                };
                Value::String(ch.map(String::from).unwrap_or_default())
            }
            (WrapperKind::String, "concat") => {
                let mut out = to_text(&primitive);
                for arg in args {
                    out.push_str(&display_value(arg));
                }
                Value::String(out)
            }
            (WrapperKind::String, "toUpperCase") => Value::String(to_text(&primitive).to_uppercase()),
            _ => return None,
        };
        Some(Ok(value))
    }
}

/// Finds the first wrapping kind `class` derives from, in [`WrapperKind::ALL`]
/// order.
pub fn resolve(class: &TypeDescriptor) -> Option<WrapperKind> {
    WrapperKind::ALL.into_iter().find(|k| class.base() == Some(*k))
}

/// Resolves the wrapping kind of `object`'s type and extracts its boxed value.
pub fn resolve_wrapped(object: &Object) -> Option<Wrapped> {
    let kind = resolve(object.class())?;
    Some(Wrapped {
        kind,
        primitive: kind.extract(object),
    })
}

fn to_primitive(value: &Value) -> Option<Primitive> {
    match value {
        Value::Null => Some(Primitive::Null),
        Value::Bool(b) => Some(Primitive::Bool(*b)),
        Value::Number(n) => Some(Primitive::Number(*n)),
        Value::String(s) => Some(Primitive::String(s.clone())),
        Value::Object(o) => o.primitive().cloned(),
        Value::Undefined | Value::Array(_) | Value::Function(_) => None,
    }
}

fn to_number(p: &Primitive) -> f64 {
    match p {
        Primitive::Null => 0.0,
        Primitive::Bool(b) => f64::from(u8::from(*b)),
        Primitive::Number(n) => *n,
        Primitive::String(s) => {
            let t = s.trim();
            if t.is_empty() {
                0.0
            } else {
                t.parse::<f64>().unwrap_or(f64::NAN)
            }
        }
    }
}

fn to_text(p: &Primitive) -> String {
    match p {
        Primitive::Null => "null".to_string(),
        Primitive::Bool(b) => b.to_string(),
        Primitive::Number(n) => number_to_string(*n),
        Primitive::String(s) => s.clone(),
    }
}

fn truthy(p: &Primitive) -> bool {
    match p {
        Primitive::Null => false,
        Primitive::Bool(b) => *b,
        Primitive::Number(n) => *n != 0.0 && !n.is_nan(),
        Primitive::String(s) => !s.is_empty(),
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Undefined => "undefined".to_string(),
        Value::Array(items) => items
            .iter()
            .map(|v| match v {
                Value::Null | Value::Undefined => String::new(),
                other => display_value(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Function(f) => format!("function {}() {{ [native code] }}", f.name()),
        Value::Object(o) => match o.primitive() {
            Some(p) => to_text(p),
            None => "[object Object]".to_string(),
        },
        other => to_primitive(other).map(|p| to_text(&p)).unwrap_or_default(),
    }
}

fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        (if n > 0.0 { "Infinity" } else { "-Infinity" }).to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else {
        n.to_string()
    }
}

fn time_clip(ms: f64) -> f64 {
    if !ms.is_finite() || ms.abs() > MAX_TIME_MS {
        return f64::NAN;
    }
    // Adding zero turns -0 into +0.
    ms.trunc() + 0.0
}

fn now_ms() -> f64 {
    Utc::now().timestamp_millis() as f64
}

fn iso_string(ms: f64) -> String {
    if ms.is_nan() {
        return "Invalid Date".to_string();
    }
    DateTime::from_timestamp_millis(ms as i64)
        .map(|d| d.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| "Invalid Date".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_box_contributes_index_fields_and_length() {
        let boxed = WrapperKind::String.construct(Primitive::String("hey".into()));
        assert_eq!(boxed.field_names().collect::<Vec<_>>(), vec!["0", "1", "2", "length"]);
        assert_eq!(boxed.get("1"), Some(&Value::from("e")));
        assert_eq!(boxed.property("length").unwrap().attributes, Attributes::FROZEN);
        assert_eq!(boxed.keys(), vec!["0", "1", "2"]);
    }

    #[test]
    fn other_boxes_contribute_no_fields() {
        for kind in [WrapperKind::Number, WrapperKind::Date, WrapperKind::Boolean] {
            assert!(kind.construct(Primitive::Number(1.0)).is_empty(), "{kind:?}");
        }
    }

    #[test]
    fn extract_is_canonical() {
        let n = WrapperKind::Number.construct(Primitive::String(" 42 ".into()));
        assert_eq!(WrapperKind::Number.extract(&n), Primitive::Number(42.0));
        let d = WrapperKind::Date.construct(Primitive::Number(1500.7));
        assert_eq!(WrapperKind::Date.extract(&d), Primitive::Number(1500.0));
        let b = WrapperKind::Boolean.construct(Primitive::String(String::new()));
        assert_eq!(WrapperKind::Boolean.extract(&b), Primitive::Bool(false));
    }

    #[test]
    fn null_timestamp_is_invalid_date() {
        let d = WrapperKind::Date.construct(Primitive::Null);
        assert_eq!(d.call("toString", &[]).unwrap(), Value::from("Invalid Date"));
        assert!(d.call("getTime", &[]).unwrap().as_f64().unwrap().is_nan());
    }

    #[test]
    fn resolve_uses_base_kind() {
        let sub = TypeDescriptor::wrapping("Money", WrapperKind::Number);
        assert_eq!(resolve(&sub), Some(WrapperKind::Number));
        assert_eq!(resolve(&TypeDescriptor::new("Plain")), None);
        assert_eq!(resolve(&WrapperKind::Date.descriptor()), Some(WrapperKind::Date));
    }

    #[test]
    fn builtin_behavior() {
        let s = WrapperKind::String.construct(Primitive::String("abc".into()));
        assert_eq!(s.call("valueOf", &[]).unwrap(), Value::from("abc"));
        assert_eq!(s.call("charAt", &[Value::from(1)]).unwrap(), Value::from("b"));
        assert_eq!(s.call("concat", &[Value::from("d"), Value::from(1)]).unwrap(), Value::from("abcd1"));
        assert_eq!(s.call("toUpperCase", &[]).unwrap(), Value::from("ABC"));

        let n = WrapperKind::Number.construct(Primitive::Number(2.5));
        assert_eq!(n.call("toFixed", &[Value::from(2)]).unwrap(), Value::from("2.50"));
        assert_eq!(n.call("toString", &[]).unwrap(), Value::from("2.5"));

        let d = WrapperKind::Date.construct(Primitive::Number(951_782_400_000.0));
        assert_eq!(d.call("toISOString", &[]).unwrap(), Value::from("2000-02-29T00:00:00.000Z"));

        let b = WrapperKind::Boolean.construct(Primitive::Bool(true));
        assert!(b.call("charAt", &[]).is_err());
    }

    #[test]
    fn coerce_arg_follows_constructor_rules() {
        assert_eq!(WrapperKind::Number.coerce_arg(None), Primitive::Number(0.0));
        assert_eq!(WrapperKind::String.coerce_arg(Some(&Value::from(3))), Primitive::String("3".into()));
        assert_eq!(
            WrapperKind::String.coerce_arg(Some(&Value::Undefined)),
            Primitive::String("undefined".into())
        );
        assert_eq!(WrapperKind::Boolean.coerce_arg(Some(&Value::from("x"))), Primitive::Bool(true));
        assert_eq!(WrapperKind::Date.coerce_arg(Some(&Value::Null)), Primitive::Number(0.0));
    }

    #[test]
    fn iso_string_before_epoch() {
        assert_eq!(iso_string(-1.0), "1969-12-31T23:59:59.999Z");
        assert_eq!(iso_string(0.0), "1970-01-01T00:00:00.000Z");
        assert_eq!(iso_string(f64::NAN), "Invalid Date");
    }

    #[test]
    fn date_without_argument_is_now() {
        let before = Utc::now().timestamp_millis() as f64;
        let Primitive::Number(ms) = WrapperKind::Date.coerce_arg(None) else { panic!("expected number") };
        let after = Utc::now().timestamp_millis() as f64;
        assert!(before <= ms && ms <= after);
    }

    #[test]
    fn text_box_indexes_count_chars() {
        let boxed = WrapperKind::String.construct(Primitive::String("a\u{1F600}".into()));
        assert_eq!(boxed.field_names().collect::<Vec<_>>(), vec!["0", "1", "length"]);
        assert_eq!(boxed.get("1"), Some(&Value::from("\u{1F600}")));
        assert_eq!(boxed.get("length"), Some(&Value::Number(2.0)));
    }
}
