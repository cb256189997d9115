//! Ordered multimap for MSRP headers.
//!
//! Header names are unique and kept in insertion order; each name maps to an
//! ordered list of values (a repeated header appends a value). Lookup is by
//! normalised name, so `message-id`, `Message-Id` and `Message-ID` all refer
//! to the same entry.

/// Canonical names of the headers this crate parses structurally.
pub const MESSAGE_ID: &str = "Message-ID";
pub const BYTE_RANGE: &str = "Byte-Range";
pub const STATUS: &str = "Status";
pub const SUCCESS_REPORT: &str = "Success-Report";
pub const FAILURE_REPORT: &str = "Failure-Report";
pub const CONTENT_DISPOSITION: &str = "Content-Disposition";
pub const CONTENT_DESCRIPTION: &str = "Content-Description";
pub const WWW_AUTHENTICATE: &str = "WWW-Authenticate";
pub const AUTHORIZATION: &str = "Authorization";
pub const USE_PATH: &str = "Use-Path";
pub const EXPIRES: &str = "Expires";
pub const MIN_EXPIRES: &str = "Min-Expires";
pub const MAX_EXPIRES: &str = "Max-Expires";

/// Normalise header capitalisation: each dash-separated part is
/// lowercased with an uppercase initial. Two registered headers have
/// irregular capitalisation and are special-cased.
pub fn normalise(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (i, part) in name.split('-').enumerate() {
        if i > 0 {
            out.push('-');
        }
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.extend(chars.flat_map(|c| c.to_lowercase()));
        }
    }

    match out.as_str() {
        "Www-Authenticate" => WWW_AUTHENTICATE.to_string(),
        "Message-Id" => MESSAGE_ID.to_string(),
        _ => out,
    }
}

/// Insertion-ordered header multimap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: Vec<(String, Vec<String>)>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value for `name`, normalising the name first.
    pub fn add(&mut self, name: &str, value: impl Into<String>) {
        let name = normalise(name);
        let value = value.into();
        if let Some((_, values)) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            values.push(value);
        } else {
            self.entries.push((name, vec![value]));
        }
    }

    /// All values for `name`, or an empty slice if absent.
    pub fn values(&self, name: &str) -> &[String] {
        let name = normalise(name);
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_slice())
            .unwrap_or(&[])
    }

    /// First value for `name`, if present.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.values(name).first().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        let name = normalise(name);
        self.entries.iter().any(|(n, _)| *n == name)
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(n, v)| (n.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
