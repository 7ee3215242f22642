//! Domain value types used inside canonical configuration objects
//!
//! These are the types the marshaler intercepts before generic traversal:
//! addresses render as their canonical string, port lists fold into the
//! compact `80,443-8443` notation, and typed payloads are resolved through
//! the [`PayloadRegistry`].

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::marshal::MarshalValue;

/// An IP address or a domain name.
///
/// Serialized as a single string in both directions; the canonical string
/// form is what reaches the dump output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    Ip(IpAddr),
    Domain(String),
}

impl FromStr for Address {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<IpAddr>() {
            Ok(ip) => Ok(Self::Ip(ip)),
            Err(_) => Ok(Self::Domain(s.to_string())),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ip(ip) => write!(f, "{ip}"),
            Self::Domain(domain) => write!(f, "{domain}"),
        }
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        // Anything that is not an IP literal is a domain.
        Ok(match s.parse::<IpAddr>() {
            Ok(ip) => Address::Ip(ip),
            Err(_) => Address::Domain(s),
        })
    }
}

/// An inclusive port range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    pub from: u16,
    pub to: u16,
}

impl PortRange {
    pub fn single(port: u16) -> Self {
        Self {
            from: port,
            to: port,
        }
    }

    pub fn new(from: u16, to: u16) -> Self {
        Self { from, to }
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.from == self.to {
            write!(f, "{}", self.from)
        } else {
            write!(f, "{}-{}", self.from, self.to)
        }
    }
}

/// Error from parsing port notation.
#[derive(Debug, thiserror::Error)]
#[error("invalid port range '{0}'")]
pub struct PortParseError(String);

impl FromStr for PortRange {
    type Err = PortParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |part: &str| {
            part.trim()
                .parse::<u16>()
                .map_err(|_| PortParseError(s.to_string()))
        };
        match s.split_once('-') {
            Some((from, to)) => Ok(Self::new(parse(from)?, parse(to)?)),
            None => Ok(Self::single(parse(s)?)),
        }
    }
}

/// An ordered collection of port ranges.
///
/// Accepts a bare integer (`8080`), a range string (`"80-443"`), or a
/// comma-joined list (`"80,8000-9000"`) on decode, and folds back into the
/// most compact of those forms on marshal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortList(pub Vec<PortRange>);

impl PortList {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromStr for PortList {
    type Err = PortParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ranges = s
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(str::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self(ranges))
    }
}

impl fmt::Display for PortList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, range) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{range}")?;
        }
        Ok(())
    }
}

impl Serialize for PortList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0.as_slice() {
            [only] if only.from == only.to => serializer.serialize_u16(only.from),
            _ => serializer.collect_str(self),
        }
    }
}

impl<'de> Deserialize<'de> for PortList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PortListVisitor;

        impl<'v> serde::de::Visitor<'v> for PortListVisitor {
            type Value = PortList;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "a port number or a port range string")
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<PortList, E> {
                let port = u16::try_from(v)
                    .map_err(|_| E::custom(format!("port {v} out of range")))?;
                Ok(PortList(vec![PortRange::single(port)]))
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<PortList, E> {
                let port = u16::try_from(v)
                    .map_err(|_| E::custom(format!("port {v} out of range")))?;
                Ok(PortList(vec![PortRange::single(port)]))
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<PortList, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(PortListVisitor)
    }
}

/// A polymorphic value: a type discriminator plus an opaque JSON payload.
///
/// The payload is not interpreted here; the marshaler resolves it through
/// the decoder registered for the discriminator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedPayload {
    /// Discriminator looked up in the [`PayloadRegistry`].
    #[serde(rename = "type")]
    pub type_tag: String,

    /// Opaque encoded payload.
    pub value: serde_json::Value,
}

impl TypedPayload {
    pub fn new(type_tag: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            type_tag: type_tag.into(),
            value,
        }
    }
}

/// Errors from payload registration and decoding.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("payload type '{0}' already registered")]
    Duplicate(String),

    #[error("no payload decoder registered for '{0}'")]
    Unknown(String),

    #[error("failed to decode payload")]
    Decode(#[from] serde_json::Error),
}

/// Decodes an opaque payload into a marshalable value.
pub type PayloadDecoder = fn(&serde_json::Value) -> Result<Box<dyn MarshalValue>, PayloadError>;

/// Registry from payload discriminator to decoder.
///
/// Constructed explicitly and handed to the marshaler; there is no ambient
/// global table.
#[derive(Default)]
pub struct PayloadRegistry {
    decoders: BTreeMap<String, PayloadDecoder>,
}

impl PayloadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a decoder for a discriminator. Duplicates are rejected.
    pub fn register(
        &mut self,
        type_tag: impl Into<String>,
        decoder: PayloadDecoder,
    ) -> Result<(), PayloadError> {
        let type_tag = type_tag.into();
        if self.decoders.contains_key(&type_tag) {
            return Err(PayloadError::Duplicate(type_tag));
        }
        self.decoders.insert(type_tag, decoder);
        Ok(())
    }

    pub fn decoder(&self, type_tag: &str) -> Option<PayloadDecoder> {
        self.decoders.get(type_tag).copied()
    }
}

impl fmt::Debug for PayloadRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayloadRegistry")
            .field("types", &self.decoders.keys().collect::<Vec<_>>())
            .finish()
    }
}
