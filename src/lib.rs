//! Fluxgate configuration pipeline
//!
//! This crate turns a set of heterogeneous configuration sources (JSON,
//! YAML, TOML) into one canonical, strongly-typed configuration object, and
//! can project that object back into a deterministic, human-readable JSON
//! dump. The canonical object is consumed by the server runtime, which is
//! built from it through the [`runtime::BuildRuntime`] seam.
//!
//! The pipeline is three stages: [`decode`] turns raw bytes of a declared
//! format into a typed object (YAML and TOML are transcoded to JSON first,
//! so every format shares one decoder and one error-localization path),
//! [`merge`] folds an ordered list of sources into a single object under a
//! later-wins, field-level override rule, and [`marshal`] renders the
//! result as a JSON tree with null elision and type tagging for
//! polymorphic payloads.

pub mod conf;
pub mod decode;
pub mod fetch;
pub mod marshal;
pub mod merge;
pub mod runtime;
pub mod source;
pub mod types;

pub use conf::ServerConfig;
pub use decode::{decode_json, decode_source, DecodeError};
pub use fetch::{Fetch, FetchError, MemoryFetcher, StandardFetcher};
pub use marshal::{
    marshal_to_json, to_pretty_json, FieldTag, MarshalOptions, MarshalValue, Marshaler,
    TYPE_INFO_KEY,
};
pub use merge::{ConfigModel, MergeEngine, MergeError};
pub use runtime::{BuildError, BuildRuntime, RuntimeConfig, ServerBuilder};
pub use source::{ConfigFormat, ConfigSource, FormatRegistry, RegistryError, STDIN_SOURCE};
pub use types::{Address, PayloadRegistry, PortList, PortRange, TypedPayload};
