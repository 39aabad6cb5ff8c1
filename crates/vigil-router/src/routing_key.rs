//! Attribute-based routing keys with wildcard pattern equality.
//!
//! A [`RoutingKey`] is a fixed domain string plus an ordered set of
//! `name=value` attribute pairs, optionally flagged as a pattern with a
//! trailing wildcard. Keys are immutable once constructed; insertion order
//! never affects identity because attributes are kept sorted and the
//! canonical string form is computed up front.
//!
//! Two relations exist and must not be confused:
//!
//! - `==` / `Hash`: canonical-form identity, used for interning. Reflexive
//!   and transitive.
//! - [`RoutingKey::matches`]: the pattern relation used for lookup. A
//!   pattern may omit attributes the other key carries (with a wildcard
//!   suffix) and is symmetric in which side is the pattern, but it is not
//!   transitive, so it cannot back `Eq`.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde_json::{Map, Value};
use vigil_core::{ROUTING_DOMAIN, RoutingError};

/// Characters that cannot appear in attribute names.
const NAME_RESERVED: &[char] = &['=', ',', ':', '*'];
/// Characters that cannot appear in attribute values.
const VALUE_RESERVED: &[char] = &['=', ','];

/// An immutable attribute-based routing identifier.
#[derive(Clone, Debug)]
pub struct RoutingKey {
    domain: String,
    attributes: BTreeMap<String, String>,
    is_pattern: bool,
    wildcard_suffix: bool,
    canonical: String,
}

impl RoutingKey {
    /// Build a concrete (non-pattern) key in the default domain.
    ///
    /// # Errors
    ///
    /// [`RoutingError::InvalidRoutingKey`] if the attribute set is empty or
    /// an attribute contains a reserved character.
    pub fn exact(
        attributes: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self, RoutingError> {
        Self::build(ROUTING_DOMAIN, attributes, false, false)
    }

    /// Build a pattern key in the default domain.
    ///
    /// A pattern names the attributes it requires; with `wildcard_suffix`
    /// the matched key may carry any additional attributes. An empty
    /// attribute set is allowed only with the wildcard (a match-anything
    /// key).
    ///
    /// # Errors
    ///
    /// [`RoutingError::InvalidRoutingKey`] if the attribute set is empty
    /// without a wildcard, or an attribute contains a reserved character.
    pub fn pattern(
        attributes: impl IntoIterator<Item = (String, String)>,
        wildcard_suffix: bool,
    ) -> Result<Self, RoutingError> {
        Self::build(ROUTING_DOMAIN, attributes, true, wildcard_suffix)
    }

    /// Build a key from the top-level fields of a JSON object.
    ///
    /// Scalar fields (strings, numbers, booleans) become attributes in
    /// their string form. Fields that cannot participate in routing are
    /// skipped rather than failing the key: nested objects, arrays, nulls,
    /// and names or values containing reserved characters. Free-text
    /// fields such as error messages routinely contain `=` or `,`; they
    /// must not block routing on the remaining attributes. The result is
    /// a concrete key.
    ///
    /// # Errors
    ///
    /// [`RoutingError::InvalidRoutingKey`] if no routable attribute
    /// remains.
    pub fn from_json_attributes(map: &Map<String, Value>) -> Result<Self, RoutingError> {
        let attributes = map.iter().filter_map(|(name, value)| {
            if name.is_empty() || name.contains(NAME_RESERVED) {
                return None;
            }
            let value = attr_string(value)?;
            if value.contains(VALUE_RESERVED) {
                return None;
            }
            Some((name.clone(), value))
        });
        Self::build(ROUTING_DOMAIN, attributes, false, false)
    }

    /// Parse a key from its canonical string form:
    /// `domain:name=value,name=value[,*]`. A trailing `*` segment marks a
    /// wildcard pattern.
    ///
    /// # Errors
    ///
    /// [`RoutingError::InvalidRoutingKey`] on a missing domain separator,
    /// a segment without `=`, or an empty attribute set without `*`.
    pub fn parse(text: &str) -> Result<Self, RoutingError> {
        let (domain, rest) = text.split_once(':').ok_or_else(|| invalid("missing ':' domain separator"))?;
        if domain.is_empty() {
            return Err(invalid("empty domain"));
        }
        let mut attributes = Vec::new();
        let mut wildcard = false;
        for segment in rest.split(',') {
            if segment == "*" {
                wildcard = true;
                continue;
            }
            if segment.is_empty() {
                continue;
            }
            let (name, value) = segment
                .split_once('=')
                .ok_or_else(|| invalid("attribute segment without '='"))?;
            attributes.push((name.to_owned(), value.to_owned()));
        }
        Self::build(domain, attributes, wildcard, wildcard)
    }

    fn build(
        domain: &str,
        attributes: impl IntoIterator<Item = (String, String)>,
        is_pattern: bool,
        wildcard_suffix: bool,
    ) -> Result<Self, RoutingError> {
        let mut sorted = BTreeMap::new();
        for (name, value) in attributes {
            if name.is_empty() || name.contains(NAME_RESERVED) {
                return Err(invalid(format!("reserved character in attribute name {name:?}")));
            }
            if value.contains(VALUE_RESERVED) {
                return Err(invalid(format!(
                    "reserved character in value of attribute {name:?}"
                )));
            }
            let _ = sorted.insert(name, value);
        }
        if sorted.is_empty() && !wildcard_suffix {
            return Err(invalid("empty attribute set"));
        }
        let canonical = canonical_form(domain, &sorted, wildcard_suffix);
        Ok(Self {
            domain: domain.to_owned(),
            attributes: sorted,
            is_pattern: is_pattern || wildcard_suffix,
            wildcard_suffix,
            canonical,
        })
    }

    /// The fixed domain string.
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// The sorted attribute pairs.
    #[must_use]
    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    /// Value of one attribute, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Whether this key is a pattern.
    #[must_use]
    pub fn is_pattern(&self) -> bool {
        self.is_pattern
    }

    /// Whether this pattern permits additional unnamed attributes.
    #[must_use]
    pub fn wildcard_suffix(&self) -> bool {
        self.wildcard_suffix
    }

    /// The canonical string form used for interning and display.
    #[must_use]
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// Pattern-matching equality.
    ///
    /// Concrete vs concrete requires exact attribute-set equality. When
    /// either side is a pattern, every attribute the pattern names must be
    /// present with an equal value in the other key; extra attributes in
    /// the other key are permitted only when the pattern carries the
    /// wildcard suffix. Symmetric in which side is the pattern.
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        if self.domain != other.domain {
            return false;
        }
        match (self.is_pattern, other.is_pattern) {
            (false, false) => self.attributes == other.attributes,
            (true, false) => pattern_covers(self, other),
            (false, true) => pattern_covers(other, self),
            (true, true) => self.canonical == other.canonical,
        }
    }
}

/// Whether `pattern`'s required attributes are satisfied by `concrete`.
fn pattern_covers(pattern: &RoutingKey, concrete: &RoutingKey) -> bool {
    for (name, value) in &pattern.attributes {
        if concrete.attributes.get(name) != Some(value) {
            return false;
        }
    }
    pattern.wildcard_suffix || concrete.attributes.len() == pattern.attributes.len()
}

/// String form of a routable scalar JSON value.
pub(crate) fn attr_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn canonical_form(domain: &str, attributes: &BTreeMap<String, String>, wildcard: bool) -> String {
    let mut out = String::with_capacity(domain.len() + 1 + attributes.len() * 16);
    out.push_str(domain);
    out.push(':');
    let mut first = true;
    for (name, value) in attributes {
        if !first {
            out.push(',');
        }
        out.push_str(name);
        out.push('=');
        out.push_str(value);
        first = false;
    }
    if wildcard {
        if !first {
            out.push(',');
        }
        out.push('*');
    }
    out
}

fn invalid(reason: impl Into<String>) -> RoutingError {
    RoutingError::InvalidRoutingKey {
        reason: reason.into(),
    }
}

impl PartialEq for RoutingKey {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for RoutingKey {}

impl Hash for RoutingKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
