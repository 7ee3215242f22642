//! Known-type interception
//!
//! Specialized marshal impls for the domain value types that bypass generic
//! traversal: addresses render as strings, port lists fold into compact
//! notation, and typed payloads are resolved through the registry.

use serde_json::Value;

use super::{Marshaler, MarshalValue};
use crate::types::{Address, PortList, PortRange, TypedPayload};

/// Reserved key under which the payload discriminator is reinserted when
/// type info is requested.
pub const TYPE_INFO_KEY: &str = "_TypedPayload_";

impl MarshalValue for Address {
    fn as_tree(&self, _m: &Marshaler<'_>) -> Option<Value> {
        Some(Value::String(self.to_string()))
    }
}

impl MarshalValue for PortRange {
    fn as_tree(&self, _m: &Marshaler<'_>) -> Option<Value> {
        if self.from == self.to {
            Some(Value::from(self.from))
        } else {
            Some(Value::String(self.to_string()))
        }
    }
}

impl MarshalValue for PortList {
    fn as_tree(&self, _m: &Marshaler<'_>) -> Option<Value> {
        match self.0.as_slice() {
            [] => None,
            [only] if only.from == only.to => Some(Value::from(only.from)),
            _ => Some(Value::String(self.to_string())),
        }
    }

    fn is_null_field(&self) -> bool {
        self.is_empty()
    }

    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl MarshalValue for TypedPayload {
    fn as_tree(&self, m: &Marshaler<'_>) -> Option<Value> {
        // An unregistered discriminator or a failed decode marshals to
        // absent rather than erroring: the dump stays best-effort.
        let decoder = m.payloads().decoder(&self.type_tag)?;
        let inner = decoder(&self.value).ok()?;
        let mut tree = inner.as_tree(m)?;
        if m.options().insert_type_info {
            if let Value::Object(map) = &mut tree {
                map.insert(
                    TYPE_INFO_KEY.to_string(),
                    Value::String(self.type_tag.clone()),
                );
            }
        }
        Some(tree)
    }
}
