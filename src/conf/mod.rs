//! Sample canonical configuration schema
//!
//! The pipeline itself is schema-agnostic: any type implementing
//! [`ConfigModel`] and [`MarshalValue`] can flow through it. This module
//! carries the proxy-server schema the `fluxgate` binary uses, and doubles
//! as the reference implementation of the override rule and the marshal
//! traversal.

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::marshal::{Marshaler, MarshalValue};
use crate::marshal_as_display;
use crate::merge::ConfigModel;
use crate::types::{Address, PayloadError, PayloadRegistry, PortList, TypedPayload};

/// Log severity for the server's own logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    None,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
            Self::None => write!(f, "none"),
        }
    }
}

// LogLevel is a named scalar: it renders through its string form rather
// than as a raw enum variant.
marshal_as_display!(LogLevel);

/// Logging section.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: LogLevel,
    pub path: String,
}

impl MarshalValue for LogConfig {
    fn as_tree(&self, m: &Marshaler<'_>) -> Option<Value> {
        let mut map = Map::new();
        m.field(&mut map, "level", "", &self.level);
        m.field(&mut map, "path", "path,omitempty", &self.path);
        Some(Value::Object(map))
    }
}

/// One listening endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct InboundConfig {
    pub tag: String,
    pub listen: Option<Address>,
    pub port: PortList,
    pub protocol: String,
    pub settings: Option<Value>,
}

impl MarshalValue for InboundConfig {
    fn as_tree(&self, m: &Marshaler<'_>) -> Option<Value> {
        let mut map = Map::new();
        m.field(&mut map, "tag", "", &self.tag);
        m.field(&mut map, "listen", "", &self.listen);
        m.field(&mut map, "port", "", &self.port);
        m.field(&mut map, "protocol", "", &self.protocol);
        m.field(&mut map, "settings", ",omitempty", &self.settings);
        Some(Value::Object(map))
    }
}

/// One upstream connector.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct OutboundConfig {
    pub tag: String,
    pub protocol: String,
    #[serde(rename = "sendThrough")]
    pub send_through: Option<Address>,
    pub settings: Option<Value>,
}

impl MarshalValue for OutboundConfig {
    fn as_tree(&self, m: &Marshaler<'_>) -> Option<Value> {
        let mut map = Map::new();
        m.field(&mut map, "tag", "", &self.tag);
        m.field(&mut map, "protocol", "", &self.protocol);
        m.field(&mut map, "send_through", "json=sendThrough", &self.send_through);
        m.field(&mut map, "settings", ",omitempty", &self.settings);
        Some(Value::Object(map))
    }
}

/// Transport settings carried as a typed payload.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    pub network: String,
    pub security: String,
}

impl TransportSettings {
    /// Discriminator under which this payload type is registered.
    pub const TYPE_TAG: &'static str = "fluxgate.conf.TransportSettings";
}

impl MarshalValue for TransportSettings {
    fn as_tree(&self, m: &Marshaler<'_>) -> Option<Value> {
        let mut map = Map::new();
        m.field(&mut map, "network", "", &self.network);
        m.field(&mut map, "security", "security,omitempty", &self.security);
        Some(Value::Object(map))
    }
}

fn decode_transport(value: &Value) -> Result<Box<dyn MarshalValue>, PayloadError> {
    let settings: TransportSettings = serde_json::from_value(value.clone())?;
    Ok(Box::new(settings))
}

/// Payload registry with every payload type this schema knows about.
pub fn payload_registry() -> PayloadRegistry {
    let mut registry = PayloadRegistry::new();
    // The schema's own table has no duplicate tags.
    let _ = registry.register(TransportSettings::TYPE_TAG, decode_transport);
    registry
}

/// The canonical server configuration: the union of all merged sources.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub log: Option<LogConfig>,
    /// DNS section kept as a raw value; it is resolved by the builder.
    pub dns: Option<Value>,
    pub inbounds: Vec<InboundConfig>,
    pub outbounds: Vec<OutboundConfig>,
    pub transport: Option<TypedPayload>,
    pub metadata: BTreeMap<String, String>,
}

impl ConfigModel for ServerConfig {
    fn override_with(&mut self, later: Self) {
        if later.log.is_some() {
            self.log = later.log;
        }
        if later.dns.is_some() {
            self.dns = later.dns;
        }
        // Lists set in a later source replace the earlier ones wholesale.
        if !later.inbounds.is_empty() {
            self.inbounds = later.inbounds;
        }
        if !later.outbounds.is_empty() {
            self.outbounds = later.outbounds;
        }
        if later.transport.is_some() {
            self.transport = later.transport;
        }
        if !later.metadata.is_empty() {
            self.metadata = later.metadata;
        }
    }
}

impl MarshalValue for ServerConfig {
    fn as_tree(&self, m: &Marshaler<'_>) -> Option<Value> {
        let mut map = Map::new();
        m.field(&mut map, "log", "", &self.log);
        m.field(&mut map, "dns", "", &self.dns);
        m.field(&mut map, "inbounds", "", &self.inbounds);
        m.field(&mut map, "outbounds", "", &self.outbounds);
        m.field(&mut map, "transport", "", &self.transport);
        m.field(&mut map, "metadata", "", &self.metadata);
        Some(Value::Object(map))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marshal::{marshal_to_json, MarshalOptions};
    use crate::types::PortRange;
    use serde_json::json;

    fn sample() -> ServerConfig {
        serde_json::from_value(json!({
            "log": {"level": "warning"},
            "inbounds": [{
                "tag": "socks-in",
                "listen": "127.0.0.1",
                "port": "1080",
                "protocol": "socks"
            }],
            "outbounds": [{
                "tag": "direct",
                "protocol": "freedom"
            }],
            "transport": {
                "type": TransportSettings::TYPE_TAG,
                "value": {"network": "tcp"}
            },
            "metadata": {"region": "eu-west"}
        }))
        .unwrap()
    }

    #[test]
    fn decodes_full_document() {
        let config = sample();
        assert_eq!(config.log.as_ref().unwrap().level, LogLevel::Warning);
        assert_eq!(config.inbounds.len(), 1);
        assert_eq!(
            config.inbounds[0].port,
            PortList(vec![PortRange::single(1080)])
        );
        assert_eq!(
            config.inbounds[0].listen,
            Some(Address::Ip("127.0.0.1".parse().unwrap()))
        );
    }

    #[test]
    fn override_replaces_set_fields_only() {
        let mut base = sample();
        let later: ServerConfig = serde_json::from_value(json!({
            "log": {"level": "debug"},
            "outbounds": [{"tag": "blocked", "protocol": "blackhole"}]
        }))
        .unwrap();

        base.override_with(later);
        assert_eq!(base.log.as_ref().unwrap().level, LogLevel::Debug);
        assert_eq!(base.outbounds.len(), 1);
        assert_eq!(base.outbounds[0].tag, "blocked");
        // Inbounds were unset in the later source and survive untouched.
        assert_eq!(base.inbounds[0].tag, "socks-in");
    }

    #[test]
    fn dump_elides_nulls_and_tags_payloads() {
        let payloads = payload_registry();
        let m = Marshaler::new(MarshalOptions::dump(), &payloads);
        let tree = sample().as_tree(&m).unwrap();

        assert_eq!(
            tree,
            json!({
                "log": {"level": "warning"},
                "inbounds": [{
                    "tag": "socks-in",
                    "listen": "127.0.0.1",
                    "port": 1080,
                    "protocol": "socks"
                }],
                "outbounds": [{
                    "tag": "direct",
                    "protocol": "freedom"
                }],
                "transport": {
                    "network": "tcp",
                    "_TypedPayload_": TransportSettings::TYPE_TAG
                },
                "metadata": {"region": "eu-west"}
            })
        );
    }

    #[test]
    fn null_elision_is_idempotent() {
        let payloads = payload_registry();
        let m = Marshaler::new(MarshalOptions::dump(), &payloads);
        let first = sample().as_tree(&m).unwrap();
        // Re-marshaling the produced tree must not drop further keys.
        let second = m.marshal(&first).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn scalar_fidelity_survives_marshal() {
        let payloads = payload_registry();
        let m = Marshaler::new(MarshalOptions::dump(), &payloads);
        let config = sample();
        let tree = config.as_tree(&m).unwrap();

        assert_eq!(tree["inbounds"][0]["tag"], json!("socks-in"));
        assert_eq!(tree["inbounds"][0]["protocol"], json!("socks"));
        assert_eq!(tree["metadata"]["region"], json!("eu-west"));
    }

    #[test]
    fn dump_output_is_deterministic() {
        let payloads = payload_registry();
        let a = marshal_to_json(&sample(), MarshalOptions::dump(), &payloads).unwrap();
        let b = marshal_to_json(&sample(), MarshalOptions::dump(), &payloads).unwrap();
        assert_eq!(a, b);
        assert!(a.ends_with('\n'));
    }
}
