//! Multi-source merge engine
//!
//! Decodes an ordered list of config sources and folds them into one
//! canonical configuration object. Processing is strictly sequential:
//! sources are fetched, decoded, and folded one at a time, so override
//! order is deterministic and a failing source stops the pipeline before
//! any later source is touched. No partially merged object ever escapes.

use serde::de::DeserializeOwned;
use tracing::info;

use crate::decode::{decode_source, DecodeError};
use crate::fetch::{Fetch, FetchError};
use crate::marshal::{marshal_to_json, MarshalOptions, MarshalValue};
use crate::runtime::{BuildError, BuildRuntime};
use crate::source::ConfigSource;
use crate::types::PayloadRegistry;

/// A canonical configuration object that can be accumulated from sources.
///
/// `override_with` applies the later-wins, field-level override rule: every
/// field explicitly set in `later` replaces the accumulator's field, and a
/// nested aggregate set in `later` replaces the earlier one wholesale.
/// Fields left unset in `later` are untouched. Implementations are written
/// per schema; there is deliberately no recursive merge of nested
/// collections.
pub trait ConfigModel: DeserializeOwned + Default {
    fn override_with(&mut self, later: Self);
}

/// Errors from merging a list of config sources.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("failed to read config source '{name}'")]
    Fetch {
        name: String,
        #[source]
        source: FetchError,
    },

    #[error("failed to decode config source '{name}'")]
    Decode {
        name: String,
        #[source]
        source: DecodeError,
    },

    #[error("failed to marshal merged config")]
    Marshal,

    #[error(transparent)]
    Build(#[from] BuildError),
}

/// Folds config sources into one canonical object.
pub struct MergeEngine<'a> {
    fetcher: &'a dyn Fetch,
    payloads: &'a PayloadRegistry,
}

impl<'a> MergeEngine<'a> {
    pub fn new(fetcher: &'a dyn Fetch, payloads: &'a PayloadRegistry) -> Self {
        Self { fetcher, payloads }
    }

    /// Merge all sources, in order, into a single canonical object.
    ///
    /// The first source replaces the empty accumulator; every later source
    /// is applied through [`ConfigModel::override_with`]. Any fetch or
    /// decode failure aborts the whole merge, wrapped with the failing
    /// source's name.
    pub fn merge<C: ConfigModel>(&self, sources: &[ConfigSource]) -> Result<C, MergeError> {
        let mut merged = C::default();
        for (index, source) in sources.iter().enumerate() {
            info!(source = %source.name, format = %source.format, "reading config source");
            let bytes = self
                .fetcher
                .fetch(&source.name)
                .map_err(|err| MergeError::Fetch {
                    name: source.name.clone(),
                    source: err,
                })?;
            let decoded: C =
                decode_source(source.format, &bytes).map_err(|err| MergeError::Decode {
                    name: source.name.clone(),
                    source: err,
                })?;
            if index == 0 {
                merged = decoded;
            } else {
                merged.override_with(decoded);
            }
        }
        Ok(merged)
    }

    /// Merge, then render the textual dump form: null-elided, type-tagged,
    /// deterministically ordered JSON.
    pub fn dump<C>(&self, sources: &[ConfigSource]) -> Result<String, MergeError>
    where
        C: ConfigModel + MarshalValue,
    {
        let merged: C = self.merge(sources)?;
        marshal_to_json(&merged, MarshalOptions::dump(), self.payloads).ok_or(MergeError::Marshal)
    }

    /// Merge, then hand the canonical object to the external builder.
    pub fn build<C, B>(&self, sources: &[ConfigSource], builder: &B) -> Result<B::Output, MergeError>
    where
        C: ConfigModel,
        B: BuildRuntime<C>,
    {
        let merged: C = self.merge(sources)?;
        builder.build(&merged).map_err(MergeError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::MemoryFetcher;
    use crate::source::{ConfigFormat, ConfigSource};
    use serde::Deserialize;
    use serde_json::Value;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    #[serde(default)]
    struct Doc {
        x: Option<i64>,
        obj: Option<Value>,
    }

    impl ConfigModel for Doc {
        fn override_with(&mut self, later: Self) {
            if later.x.is_some() {
                self.x = later.x;
            }
            if later.obj.is_some() {
                self.obj = later.obj;
            }
        }
    }

    fn source(name: &str) -> ConfigSource {
        ConfigSource::new(name, ConfigFormat::Json)
    }

    #[test]
    fn later_source_wins() {
        let mut fetcher = MemoryFetcher::new();
        fetcher.insert("a.json", r#"{"x": 1}"#);
        fetcher.insert("b.json", r#"{"x": 2}"#);
        let payloads = PayloadRegistry::new();
        let engine = MergeEngine::new(&fetcher, &payloads);

        let merged: Doc = engine.merge(&[source("a.json"), source("b.json")]).unwrap();
        assert_eq!(merged.x, Some(2));

        let merged: Doc = engine.merge(&[source("b.json"), source("a.json")]).unwrap();
        assert_eq!(merged.x, Some(1));
    }

    #[test]
    fn unset_fields_are_untouched() {
        let mut fetcher = MemoryFetcher::new();
        fetcher.insert("a.json", r#"{"x": 1, "obj": {"p": 1}}"#);
        fetcher.insert("b.json", r#"{"x": 2}"#);
        let payloads = PayloadRegistry::new();
        let engine = MergeEngine::new(&fetcher, &payloads);

        let merged: Doc = engine.merge(&[source("a.json"), source("b.json")]).unwrap();
        assert_eq!(merged.x, Some(2));
        assert_eq!(merged.obj, Some(serde_json::json!({"p": 1})));
    }

    #[test]
    fn nested_aggregate_replaced_wholesale() {
        let mut fetcher = MemoryFetcher::new();
        fetcher.insert("a.json", r#"{"obj": {"p": 1, "q": 2}}"#);
        fetcher.insert("b.json", r#"{"obj": {"p": 9}}"#);
        let payloads = PayloadRegistry::new();
        let engine = MergeEngine::new(&fetcher, &payloads);

        let merged: Doc = engine.merge(&[source("a.json"), source("b.json")]).unwrap();
        // Field-level override: q from the earlier source is gone.
        assert_eq!(merged.obj, Some(serde_json::json!({"p": 9})));
    }

    #[test]
    fn merge_fails_fast_and_names_the_source() {
        let mut fetcher = MemoryFetcher::new();
        fetcher.insert("valid.json", r#"{"x": 1}"#);
        fetcher.insert("invalid.json", r#"{"x": }"#);
        fetcher.insert("valid2.json", r#"{"x": 3}"#);
        let payloads = PayloadRegistry::new();
        let engine = MergeEngine::new(&fetcher, &payloads);

        let err = engine
            .merge::<Doc>(&[
                source("valid.json"),
                source("invalid.json"),
                source("valid2.json"),
            ])
            .unwrap_err();
        match err {
            MergeError::Decode { name, .. } => assert_eq!(name, "invalid.json"),
            other => panic!("expected decode error, got {other:?}"),
        }
        // The third source was never fetched.
        assert_eq!(fetcher.fetched(), vec!["valid.json", "invalid.json"]);
    }

    #[test]
    fn empty_source_list_yields_default() {
        let fetcher = MemoryFetcher::new();
        let payloads = PayloadRegistry::new();
        let engine = MergeEngine::new(&fetcher, &payloads);
        let merged: Doc = engine.merge(&[]).unwrap();
        assert_eq!(merged, Doc::default());
    }
}
