//! Schema version constraints (`<`, `<=`, `=`, `>=`, `>`).

use crate::SchemaError;
use semver::Version;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintOp {
    Lt,
    Le,
    Eq,
    Ge,
    Gt,
}

impl ConstraintOp {
    fn symbol(self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Eq => "=",
            Self::Ge => ">=",
            Self::Gt => ">",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionConstraint {
    pub op: ConstraintOp,
    pub version: Version,
}

impl VersionConstraint {
    pub fn matches(&self, version: &Version) -> bool {
        let ord = version.cmp(&self.version);
        match self.op {
            ConstraintOp::Lt => ord == Ordering::Less,
            ConstraintOp::Le => ord != Ordering::Greater,
            ConstraintOp::Eq => ord == Ordering::Equal,
            ConstraintOp::Ge => ord != Ordering::Less,
            ConstraintOp::Gt => ord == Ordering::Greater,
        }
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.op.symbol(), self.version)
    }
}

impl FromStr for VersionConstraint {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        // Two-character operators first so `<=` is not read as `<` + `=3.0`.
        let (op, rest) = if let Some(rest) = s.strip_prefix("<=") {
            (ConstraintOp::Le, rest)
        } else if let Some(rest) = s.strip_prefix(">=") {
            (ConstraintOp::Ge, rest)
        } else if let Some(rest) = s.strip_prefix('<') {
            (ConstraintOp::Lt, rest)
        } else if let Some(rest) = s.strip_prefix('>') {
            (ConstraintOp::Gt, rest)
        } else if let Some(rest) = s.strip_prefix('=') {
            (ConstraintOp::Eq, rest)
        } else {
            return Err(SchemaError::Invalid(format!(
                "version constraint `{s}` must start with one of <, <=, =, >=, >"
            )));
        };
        Ok(Self {
            op,
            version: parse_version(rest)?,
        })
    }
}

/// Parse a version, accepting the short `3` / `3.1` forms schema files use.
pub fn parse_version(s: &str) -> Result<Version, SchemaError> {
    let s = s.trim();
    let parts = s.split('.').count();
    let padded = match parts {
        1 => format!("{s}.0.0"),
        2 => format!("{s}.0"),
        _ => s.to_string(),
    };
    Version::parse(&padded)
        .map_err(|e| SchemaError::Invalid(format!("bad schema version `{s}`: {e}")))
}
