//! Values produced by evaluating manifest expressions.

use crate::name::capitalize_name;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reference to a resource by canonical type and title (`Notify[x]`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceRef {
    /// Canonical (capitalised) type name
    #[serde(rename = "type")]
    pub type_name: String,
    /// Resource title
    pub title: String,
}

impl ResourceRef {
    /// Create a reference, canonicalising the type name
    ///
    /// `Class` references also canonicalise the title, since class titles
    /// are class names.
    #[must_use]
    pub fn new(type_name: &str, title: impl Into<String>) -> Self {
        let type_name = capitalize_name(type_name);
        let title = title.into();
        let title = if type_name == "Class" {
            capitalize_name(&title)
        } else {
            title
        };
        Self { type_name, title }
    }

    /// Reference to an evaluated class
    #[must_use]
    pub fn class(name: &str) -> Self {
        Self::new("Class", name)
    }

    /// Whether this references a class
    #[must_use]
    pub fn is_class(&self) -> bool {
        self.type_name == "Class"
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.type_name, self.title)
    }
}

/// Error parsing a `Type[title]` string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid resource reference: {0}")]
pub struct RefParseError(pub String);

impl FromStr for ResourceRef {
    type Err = RefParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let open = s.find('[').ok_or_else(|| RefParseError(s.to_string()))?;
        if !s.ends_with(']') || open == 0 {
            return Err(RefParseError(s.to_string()));
        }
        let title = s[open + 1..s.len() - 1].trim();
        let title = title
            .strip_prefix(['\'', '"'])
            .and_then(|t| t.strip_suffix(['\'', '"']))
            .unwrap_or(title);
        Ok(Self::new(&s[..open], title))
    }
}

/// An evaluated value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Absent value
    Undef,
    /// Boolean
    Bool(bool),
    /// Integer
    Integer(i64),
    /// String
    String(String),
    /// Ordered list
    Array(Vec<Value>),
    /// Resource reference
    Reference(ResourceRef),
}

impl Value {
    /// Truthiness used by conditionals: `false`, `undef` and `""` are false
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Undef => false,
            Self::Bool(b) => *b,
            Self::String(s) => !s.is_empty(),
            Self::Integer(_) | Self::Array(_) | Self::Reference(_) => true,
        }
    }

    /// Equality used by `==` and `case`: strings compare case-insensitively
    /// and scalars compare by their string form.
    #[must_use]
    pub fn loose_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Array(a), Self::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            (Self::Reference(a), Self::Reference(b)) => a == b,
            (Self::Undef, Self::Undef) => true,
            (Self::Undef, Self::String(s)) | (Self::String(s), Self::Undef) => s.is_empty(),
            (Self::Array(_) | Self::Reference(_), _) | (_, Self::Array(_) | Self::Reference(_)) => {
                false
            }
            (a, b) => a.to_string().eq_ignore_ascii_case(&b.to_string()),
        }
    }

    /// Flatten a value into its elements (arrays nest, scalars yield themselves)
    #[must_use]
    pub fn flatten(&self) -> Vec<&Value> {
        match self {
            Self::Array(items) => items.iter().flat_map(Value::flatten).collect(),
            other => vec![other],
        }
    }

    /// Borrow as a reference, if it is one
    #[must_use]
    pub fn as_reference(&self) -> Option<&ResourceRef> {
        match self {
            Self::Reference(r) => Some(r),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undef => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::String(s) => f.write_str(s),
            Self::Array(items) => {
                let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Self::Reference(r) => write!(f, "{r}"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<ResourceRef> for Value {
    fn from(r: ResourceRef) -> Self {
        Self::Reference(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_ref_canonical() {
        let r = ResourceRef::new("notify", "x");
        assert_eq!(r.to_string(), "Notify[x]");

        let c = ResourceRef::class("experiment::baz");
        assert_eq!(c.to_string(), "Class[Experiment::Baz]");
        assert!(c.is_class());
    }

    #[test]
    fn test_resource_ref_parse() {
        let r: ResourceRef = "Notify[x]".parse().unwrap();
        assert_eq!(r, ResourceRef::new("Notify", "x"));

        let quoted: ResourceRef = "File['/tmp/a']".parse().unwrap();
        assert_eq!(quoted.title, "/tmp/a");

        assert!("Notify".parse::<ResourceRef>().is_err());
        assert!("[x]".parse::<ResourceRef>().is_err());
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Undef.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::from("false").is_truthy());
        assert!(Value::Integer(0).is_truthy());
    }

    #[test]
    fn test_loose_eq() {
        assert!(Value::from("Debian").loose_eq(&Value::from("debian")));
        assert!(Value::Integer(1).loose_eq(&Value::from("1")));
        assert!(Value::Undef.loose_eq(&Value::from("")));
        assert!(!Value::from("a").loose_eq(&Value::Array(vec![Value::from("a")])));
    }

    #[test]
    fn test_flatten() {
        let v = Value::Array(vec![
            Value::from("a"),
            Value::Array(vec![Value::from("b"), Value::from("c")]),
        ]);
        assert_eq!(v.flatten().len(), 3);
    }

    #[test]
    fn test_value_serializes_untagged() {
        let v = Value::Reference(ResourceRef::class("foo"));
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, r#"{"type":"Class","title":"Foo"}"#);
        assert_eq!(serde_json::to_string(&Value::Undef).unwrap(), "null");
    }
}
