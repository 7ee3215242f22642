//! Generic value marshaling into a JSON-compatible tree
//!
//! Converts any value in the canonical configuration type family into a
//! `serde_json::Value` tree with configurable null elision and optional
//! type-tag injection for polymorphic payloads. Dispatch order mirrors the
//! marshaling contract:
//!
//! 1. known-type interception (specialized impls in [`known`]),
//! 2. optional indirection (`Option<T>` dereferences once),
//! 3. scalar values, with Display-based rendering for named scalar types
//!    that opt in via [`marshal_as_display!`](crate::marshal_as_display),
//! 4. aggregate traversal (structs, sequences, maps),
//! 5. fallback: a value with no tree form marshals to *absent*.
//!
//! Absent is distinct from null: an absent value is omitted from its parent
//! container, a null value is present as JSON `null`. Mapping keys are
//! ordered lexicographically because `serde_json::Map` is a `BTreeMap` in
//! this crate (the `preserve_order` feature is deliberately off), so dumps
//! of the same logical object are byte-identical regardless of construction
//! order. The marshaler never mutates its input.

mod known;
mod tag;

pub use known::TYPE_INFO_KEY;
pub use tag::FieldTag;

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use serde_json::{Map, Value};

use crate::types::PayloadRegistry;

/// Flags controlling one marshal pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarshalOptions {
    /// Drop fields that are null by policy instead of emitting `null`.
    pub ignore_null: bool,

    /// Reinsert the payload discriminator under the reserved key.
    pub insert_type_info: bool,
}

impl MarshalOptions {
    /// Options used for inspection dumps: elide nulls, tag payload types.
    pub fn dump() -> Self {
        Self {
            ignore_null: true,
            insert_type_info: true,
        }
    }
}

/// A value that can describe itself as a JSON-compatible tree.
///
/// `as_tree` returns `None` for *absent* (omit from the parent container)
/// and `Some(Value::Null)` for a present null.
pub trait MarshalValue {
    fn as_tree(&self, m: &Marshaler<'_>) -> Option<Value>;

    /// Whether this value counts as null when it appears as a struct field.
    ///
    /// Struct-typed fields are never null; strings are null when empty;
    /// optional values are null when unset.
    fn is_null_field(&self) -> bool {
        false
    }

    /// Whether this value equals its type's zero value, for fields tagged
    /// `omitempty`.
    fn is_empty_value(&self) -> bool {
        false
    }
}

/// One marshal pass: options plus the payload decoder registry.
pub struct Marshaler<'r> {
    opts: MarshalOptions,
    payloads: &'r PayloadRegistry,
}

impl<'r> Marshaler<'r> {
    pub fn new(opts: MarshalOptions, payloads: &'r PayloadRegistry) -> Self {
        Self { opts, payloads }
    }

    pub fn options(&self) -> &MarshalOptions {
        &self.opts
    }

    pub fn payloads(&self) -> &PayloadRegistry {
        self.payloads
    }

    /// Marshal a single value.
    pub fn marshal(&self, value: &dyn MarshalValue) -> Option<Value> {
        value.as_tree(self)
    }

    /// Emit one struct field into `map`, applying the null policy.
    ///
    /// `declared` is the field's declared name, used when `tag` names no
    /// JSON name of its own. `tag` accepts both the protocol-style form
    /// (`"varint,3,opt,json=listenOn"`) and the plain form
    /// (`"listen,omitempty"`); pass `""` to use the declared name.
    pub fn field(
        &self,
        map: &mut Map<String, Value>,
        declared: &str,
        tag: &str,
        value: &dyn MarshalValue,
    ) {
        let tag = FieldTag::parse(declared, tag);
        if self.opts.ignore_null
            && (value.is_null_field() || (tag.omit_empty() && value.is_empty_value()))
        {
            return;
        }
        match value.as_tree(self) {
            Some(tree) => {
                map.insert(tag.name().to_string(), tree);
            }
            None => {
                if !self.opts.ignore_null {
                    map.insert(tag.name().to_string(), Value::Null);
                }
            }
        }
    }
}

/// Marshal a value and render it as the textual dump form.
///
/// Returns `None` when the value has no tree form at all.
pub fn marshal_to_json(
    value: &dyn MarshalValue,
    opts: MarshalOptions,
    payloads: &PayloadRegistry,
) -> Option<String> {
    let m = Marshaler::new(opts, payloads);
    let tree = m.marshal(value)?;
    Some(to_pretty_json(&tree))
}

/// Serialize a tree as UTF-8 JSON with 4-space indentation and a trailing
/// newline. serde_json does not HTML-escape, and map keys are already in
/// lexicographic order.
pub fn to_pretty_json(value: &Value) -> String {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = Serializer::with_formatter(&mut buf, formatter);
    if value.serialize(&mut serializer).is_err() {
        return String::new();
    }
    buf.push(b'\n');
    // Serializer output is always valid UTF-8.
    String::from_utf8_lossy(&buf).into_owned()
}

/// Marshal a named scalar type through its `Display` form instead of the
/// raw scalar, mirroring the custom string rendering step.
#[macro_export]
macro_rules! marshal_as_display {
    ($ty:ty) => {
        impl $crate::marshal::MarshalValue for $ty {
            fn as_tree(
                &self,
                _m: &$crate::marshal::Marshaler<'_>,
            ) -> Option<::serde_json::Value> {
                Some(::serde_json::Value::String(self.to_string()))
            }
        }
    };
}

impl MarshalValue for bool {
    fn as_tree(&self, _m: &Marshaler<'_>) -> Option<Value> {
        Some(Value::Bool(*self))
    }

    fn is_empty_value(&self) -> bool {
        !*self
    }
}

macro_rules! marshal_integer {
    ($($ty:ty),* $(,)?) => {$(
        impl MarshalValue for $ty {
            fn as_tree(&self, _m: &Marshaler<'_>) -> Option<Value> {
                Some(Value::from(*self))
            }

            fn is_empty_value(&self) -> bool {
                *self == 0
            }
        }
    )*};
}

marshal_integer!(i8, i16, i32, i64, u8, u16, u32, u64, isize, usize);

impl MarshalValue for f64 {
    fn as_tree(&self, _m: &Marshaler<'_>) -> Option<Value> {
        // Non-finite numbers have no JSON form and marshal to absent.
        serde_json::Number::from_f64(*self).map(Value::Number)
    }

    fn is_empty_value(&self) -> bool {
        *self == 0.0
    }
}

impl MarshalValue for f32 {
    fn as_tree(&self, m: &Marshaler<'_>) -> Option<Value> {
        f64::from(*self).as_tree(m)
    }

    fn is_empty_value(&self) -> bool {
        *self == 0.0
    }
}

impl MarshalValue for String {
    fn as_tree(&self, _m: &Marshaler<'_>) -> Option<Value> {
        Some(Value::String(self.clone()))
    }

    fn is_null_field(&self) -> bool {
        self.is_empty()
    }

    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<T: MarshalValue> MarshalValue for Option<T> {
    fn as_tree(&self, m: &Marshaler<'_>) -> Option<Value> {
        match self {
            Some(value) => value.as_tree(m),
            None => Some(Value::Null),
        }
    }

    fn is_null_field(&self) -> bool {
        self.is_none()
    }

    fn is_empty_value(&self) -> bool {
        self.is_none()
    }
}

impl<T: MarshalValue> MarshalValue for Vec<T> {
    fn as_tree(&self, m: &Marshaler<'_>) -> Option<Value> {
        // Absent elements are skipped, not emitted as null.
        Some(Value::Array(
            self.iter().filter_map(|item| item.as_tree(m)).collect(),
        ))
    }

    fn is_null_field(&self) -> bool {
        self.is_empty()
    }

    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<K, V> MarshalValue for BTreeMap<K, V>
where
    K: fmt::Display + Ord,
    V: MarshalValue,
{
    fn as_tree(&self, m: &Marshaler<'_>) -> Option<Value> {
        let mut map = Map::new();
        for (key, value) in self {
            match value.as_tree(m) {
                Some(tree) => {
                    map.insert(key.to_string(), tree);
                }
                None => {
                    if !m.options().ignore_null {
                        map.insert(key.to_string(), Value::Null);
                    }
                }
            }
        }
        Some(Value::Object(map))
    }

    fn is_null_field(&self) -> bool {
        self.is_empty()
    }

    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl MarshalValue for Value {
    fn as_tree(&self, _m: &Marshaler<'_>) -> Option<Value> {
        // Raw values pass through verbatim.
        Some(self.clone())
    }

    fn is_null_field(&self) -> bool {
        self.is_null()
    }

    fn is_empty_value(&self) -> bool {
        self.is_null()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn marshaler(payloads: &PayloadRegistry) -> Marshaler<'_> {
        Marshaler::new(MarshalOptions::dump(), payloads)
    }

    #[test]
    fn scalars_marshal_verbatim() {
        let payloads = PayloadRegistry::new();
        let m = marshaler(&payloads);
        assert_eq!(m.marshal(&true), Some(json!(true)));
        assert_eq!(m.marshal(&42u32), Some(json!(42)));
        assert_eq!(m.marshal(&-7i64), Some(json!(-7)));
        assert_eq!(m.marshal(&1.5f64), Some(json!(1.5)));
        assert_eq!(m.marshal(&"hi".to_string()), Some(json!("hi")));
    }

    #[test]
    fn non_finite_float_is_absent() {
        let payloads = PayloadRegistry::new();
        let m = marshaler(&payloads);
        assert_eq!(m.marshal(&f64::NAN), None);
        assert_eq!(m.marshal(&f64::INFINITY), None);
    }

    #[test]
    fn option_dereferences_once() {
        let payloads = PayloadRegistry::new();
        let m = marshaler(&payloads);
        assert_eq!(m.marshal(&Some(3u8)), Some(json!(3)));
        assert_eq!(m.marshal(&Option::<u8>::None), Some(Value::Null));
        assert!(Option::<u8>::None.is_null_field());
    }

    #[test]
    fn map_keys_render_through_display() {
        let payloads = PayloadRegistry::new();
        let m = marshaler(&payloads);
        let mut levels: BTreeMap<u32, String> = BTreeMap::new();
        levels.insert(1, "permissive".to_string());
        levels.insert(0, "strict".to_string());
        assert_eq!(
            m.marshal(&levels),
            Some(json!({"0": "strict", "1": "permissive"}))
        );
    }

    #[test]
    fn raw_value_passes_through() {
        let payloads = PayloadRegistry::new();
        let m = marshaler(&payloads);
        let raw = json!({"servers": ["1.1.1.1", null]});
        assert_eq!(m.marshal(&raw), Some(raw.clone()));
    }

    #[test]
    fn field_applies_null_policy() {
        let payloads = PayloadRegistry::new();
        let m = marshaler(&payloads);
        let mut map = Map::new();
        m.field(&mut map, "tag", "", &String::new());
        m.field(&mut map, "listen", "", &Option::<String>::None);
        m.field(&mut map, "port", "port,omitempty", &0u16);
        m.field(&mut map, "protocol", "", &"socks".to_string());
        assert_eq!(Value::Object(map), json!({"protocol": "socks"}));
    }

    #[test]
    fn field_keeps_nulls_without_elision() {
        let payloads = PayloadRegistry::new();
        let m = Marshaler::new(MarshalOptions::default(), &payloads);
        let mut map = Map::new();
        m.field(&mut map, "tag", "", &String::new());
        m.field(&mut map, "listen", "", &Option::<String>::None);
        assert_eq!(Value::Object(map), json!({"tag": "", "listen": null}));
    }

    #[test]
    fn pretty_json_is_four_space_indented_with_newline() {
        let out = to_pretty_json(&json!({"b": 1, "a": "<&>"}));
        assert_eq!(out, "{\n    \"a\": \"<&>\",\n    \"b\": 1\n}\n");
    }

    #[test]
    fn deterministic_key_order() {
        let payloads = PayloadRegistry::new();
        let m = marshaler(&payloads);

        let mut first: BTreeMap<String, u32> = BTreeMap::new();
        first.insert("zeta".to_string(), 1);
        first.insert("alpha".to_string(), 2);

        let mut second: BTreeMap<String, u32> = BTreeMap::new();
        second.insert("alpha".to_string(), 2);
        second.insert("zeta".to_string(), 1);

        let a = to_pretty_json(&m.marshal(&first).unwrap());
        let b = to_pretty_json(&m.marshal(&second).unwrap());
        assert_eq!(a, b);
    }
}
