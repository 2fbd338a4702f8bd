//! Permission rules declared on protected fields and resources.
use std::{fmt::Display, str::FromStr};

use serde::Deserialize;

use crate::FromStrVisitor;

/// A permission rule, as declared by the host on a protected field or resource.
///
/// The textual form is `kind` or `kind:argument`, e.g. `valid` or `scope:orders.read`.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum PermissionRule {
    /// Requires a valid access token carrying the given scope.
    Scope(String),

    /// Requires a valid access token.
    Valid,

    /// A rule kind only understood by host-registered evaluators.
    Custom {
        /// The rule kind.
        kind: String,
        /// Optional rule argument.
        argument: Option<String>,
    },
}

impl PermissionRule {
    /// The kind label of this rule.
    pub fn kind(&self) -> &str {
        match self {
            Self::Scope(_) => "scope",
            Self::Valid => "valid",
            Self::Custom { kind, .. } => kind,
        }
    }
}

impl FromStr for PermissionRule {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, argument) = match s.split_once(':') {
            Some((kind, argument)) => (kind, Some(argument)),
            None => (s, None),
        };

        match (kind, argument) {
            ("", _) => Err("expected a rule kind"),
            ("scope", Some(scope)) if !scope.is_empty() => Ok(Self::Scope(scope.to_string())),
            ("scope", _) => Err("expected `scope:<name>`"),
            ("valid", None) => Ok(Self::Valid),
            ("valid", Some(_)) => Err("`valid` takes no argument"),
            (kind, argument) => Ok(Self::Custom {
                kind: kind.to_string(),
                argument: argument.map(str::to_string),
            }),
        }
    }
}

impl Display for PermissionRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scope(scope) => write!(f, "scope:{scope}"),
            Self::Valid => write!(f, "valid"),
            Self::Custom {
                kind,
                argument: Some(argument),
            } => write!(f, "{kind}:{argument}"),
            Self::Custom {
                kind,
                argument: None,
            } => write!(f, "{kind}"),
        }
    }
}

impl<'de> Deserialize<'de> for PermissionRule {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_str(FromStrVisitor::new("permission rule"))
    }
}
