//! Config sources and the format registry
//!
//! A [`ConfigSource`] names one raw configuration input (a file path, URL,
//! or `"stdin:"`) together with its declared format. The ordered list of
//! sources handed to the merge engine defines override precedence.
//!
//! The [`FormatRegistry`] maps format names and file extensions to a
//! [`ConfigFormat`]. It is constructed explicitly and passed in rather than
//! living in process-global state, so the pipeline stays testable in
//! isolation.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Source name that resolves to standard input.
pub const STDIN_SOURCE: &str = "stdin:";

/// A configuration input format supported by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigFormat {
    Json,
    Yaml,
    Toml,
}

impl ConfigFormat {
    /// File extensions conventionally associated with this format.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Json => &["json", "jsonc"],
            Self::Yaml => &["yaml", "yml"],
            Self::Toml => &["toml"],
        }
    }
}

impl fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Yaml => write!(f, "yaml"),
            Self::Toml => write!(f, "toml"),
        }
    }
}

/// One raw configuration input with its declared format.
///
/// Immutable once constructed. The merge engine processes sources strictly
/// in list order; later sources override earlier ones field by field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSource {
    /// Path, URL, or `"stdin:"`.
    pub name: String,

    /// Declared format, already resolved through the registry.
    pub format: ConfigFormat,
}

impl ConfigSource {
    /// Create a source with an explicit format.
    pub fn new(name: impl Into<String>, format: ConfigFormat) -> Self {
        Self {
            name: name.into(),
            format,
        }
    }

    /// Create a source whose format is derived from its name.
    ///
    /// `"stdin:"` defaults to JSON; everything else is resolved through the
    /// registry by file extension.
    pub fn from_name(name: impl Into<String>, registry: &FormatRegistry) -> Result<Self, RegistryError> {
        let name = name.into();
        let format = if name == STDIN_SOURCE {
            ConfigFormat::Json
        } else {
            registry
                .for_path(&name)
                .ok_or_else(|| RegistryError::UnknownFormat(name.clone()))?
        };
        Ok(Self { name, format })
    }
}

/// Errors from format registration and lookup.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("format '{0}' already registered")]
    DuplicateName(String),

    #[error("extension '{ext}' already registered to {format}")]
    DuplicateExtension { ext: String, format: ConfigFormat },

    #[error("no decoder registered for '{0}'")]
    UnknownFormat(String),
}

/// Registry mapping format names and file extensions to [`ConfigFormat`].
#[derive(Debug, Clone)]
pub struct FormatRegistry {
    by_name: BTreeMap<String, ConfigFormat>,
    by_ext: BTreeMap<String, ConfigFormat>,
}

impl FormatRegistry {
    /// An empty registry with no formats.
    pub fn empty() -> Self {
        Self {
            by_name: BTreeMap::new(),
            by_ext: BTreeMap::new(),
        }
    }

    /// The standard registry: json/jsonc, yaml/yml, toml.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        for format in [ConfigFormat::Json, ConfigFormat::Yaml, ConfigFormat::Toml] {
            // The standard table has no duplicates.
            let _ = registry.register(&format.to_string(), format.extensions(), format);
        }
        registry
    }

    /// Register a format under a name and a set of file extensions.
    ///
    /// Names and extensions are matched case-insensitively. Registering a
    /// name or extension twice is an error.
    pub fn register(
        &mut self,
        name: &str,
        extensions: &[&str],
        format: ConfigFormat,
    ) -> Result<(), RegistryError> {
        let name = name.to_lowercase();
        if self.by_name.contains_key(&name) {
            return Err(RegistryError::DuplicateName(name));
        }
        for ext in extensions {
            let ext = ext.to_lowercase();
            if let Some(existing) = self.by_ext.get(&ext) {
                return Err(RegistryError::DuplicateExtension {
                    ext,
                    format: *existing,
                });
            }
        }
        for ext in extensions {
            self.by_ext.insert(ext.to_lowercase(), format);
        }
        self.by_name.insert(name, format);
        Ok(())
    }

    /// Look up a format by its registered name (`"json"`, `"yaml"`, ...).
    pub fn by_name(&self, name: &str) -> Option<ConfigFormat> {
        self.by_name.get(&name.to_lowercase()).copied()
    }

    /// Look up a format by file extension, without the leading dot.
    pub fn by_extension(&self, ext: &str) -> Option<ConfigFormat> {
        self.by_ext.get(&ext.to_lowercase()).copied()
    }

    /// Resolve the format for a path from its extension.
    pub fn for_path(&self, path: &str) -> Option<ConfigFormat> {
        let ext = Path::new(path).extension()?.to_str()?;
        self.by_extension(ext)
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
