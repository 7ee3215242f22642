//! Field tag parsing
//!
//! Struct fields describe their JSON name with a small tag string. Two
//! forms are understood:
//!
//! - protocol-style: comma-separated segments where a `json=` segment names
//!   the field (`"varint,3,opt,json=listenOn"`),
//! - plain: the JSON name first, optionally followed by flags
//!   (`"listen,omitempty"`).
//!
//! A `json=` segment always wins over a plain name; when neither names the
//! field, the declared name is used.

/// A parsed field tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldTag<'a> {
    name: &'a str,
    omit_empty: bool,
}

impl<'a> FieldTag<'a> {
    /// Parse `tag`, falling back to `declared` when no name is given.
    pub fn parse(declared: &'a str, tag: &'a str) -> Self {
        let mut json_name = "";
        let mut plain_name = "";
        let mut omit_empty = false;

        for segment in tag.split(',') {
            let segment = segment.trim();
            if segment == "omitempty" {
                omit_empty = true;
            } else if let Some(name) = segment.strip_prefix("json=") {
                if json_name.is_empty() {
                    json_name = name;
                }
            } else if !segment.is_empty() && !segment.contains('=') && plain_name.is_empty() {
                // First bare segment is the plain name; protocol segments
                // like "varint" or "3" only occur alongside a json= name,
                // which takes precedence anyway.
                plain_name = segment;
            }
        }

        let name = if !json_name.is_empty() {
            json_name
        } else if !plain_name.is_empty() {
            plain_name
        } else {
            declared
        };

        Self { name, omit_empty }
    }

    /// The resolved JSON name for the field.
    pub fn name(&self) -> &'a str {
        self.name
    }

    /// Whether the field is omitted when equal to its zero value.
    pub fn omit_empty(&self) -> bool {
        self.omit_empty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tag_uses_declared_name() {
        let tag = FieldTag::parse("listen", "");
        assert_eq!(tag.name(), "listen");
        assert!(!tag.omit_empty());
    }

    #[test]
    fn plain_name_overrides_declared() {
        let tag = FieldTag::parse("listen_on", "listenOn");
        assert_eq!(tag.name(), "listenOn");
    }

    #[test]
    fn plain_name_with_omitempty() {
        let tag = FieldTag::parse("port", "port,omitempty");
        assert_eq!(tag.name(), "port");
        assert!(tag.omit_empty());
    }

    #[test]
    fn json_segment_wins() {
        let tag = FieldTag::parse("listen_on", "varint,3,opt,json=listenOn");
        assert_eq!(tag.name(), "listenOn");
        assert!(!tag.omit_empty());
    }

    #[test]
    fn json_segment_wins_over_plain_name() {
        let tag = FieldTag::parse("x", "plain,json=fromJson,omitempty");
        assert_eq!(tag.name(), "fromJson");
        assert!(tag.omit_empty());
    }

    #[test]
    fn bare_omitempty_uses_declared_name() {
        let tag = FieldTag::parse("settings", ",omitempty");
        assert_eq!(tag.name(), "settings");
        assert!(tag.omit_empty());
    }
}
