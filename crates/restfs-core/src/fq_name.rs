use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Fully-qualified name: a list on the wire, colon-joined for display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FqName(Vec<String>);

impl FqName {
    pub const SEPARATOR: char = ':';

    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    /// Accepts either the wire list form or a colon-joined string.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Array(items) => items
                .iter()
                .map(|v| v.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .map(Self),
            Value::String(s) => Some(s.parse().unwrap_or_default()),
            _ => None,
        }
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Last part (the resource's own name).
    pub fn name(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Name of the owning resource, if any.
    pub fn parent(&self) -> Option<FqName> {
        match self.0.len() {
            0 | 1 => None,
            n => Some(Self(self.0[..n - 1].to_vec())),
        }
    }

    pub fn child(&self, name: &str) -> FqName {
        let mut parts = self.0.clone();
        parts.push(name.to_string());
        Self(parts)
    }

    pub fn to_value(&self) -> Value {
        Value::Array(self.0.iter().cloned().map(Value::String).collect())
    }
}

impl fmt::Display for FqName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(":"))
    }
}

impl FromStr for FqName {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.split(Self::SEPARATOR).map(str::to_string).collect()))
    }
}
