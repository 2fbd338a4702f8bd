//! Decision values of the authorization engine.

use serde::{Deserialize, Serialize};

/// The value/outcome of a policy engine evaluation.
#[derive(Clone, Copy, Eq, PartialEq, Serialize, Deserialize, Hash, Debug)]
pub enum PolicyValue {
    /// Represents denied access.
    Deny,
    /// Represents allowed access.
    Allow,
}

impl PolicyValue {
    /// Whether self is [Self::Deny],
    pub fn is_deny(self) -> bool {
        matches!(self, Self::Deny)
    }

    /// Whether self is [Self::Allow],
    pub fn is_allow(self) -> bool {
        matches!(self, Self::Allow)
    }
}

impl From<bool> for PolicyValue {
    fn from(value: bool) -> Self {
        match value {
            false => Self::Deny,
            true => Self::Allow,
        }
    }
}

/// The outcome of a single rule evaluator.
///
/// An evaluator that does not handle a rule kind passes with [Outcome::NotApplicable],
/// leaving the decision to the next evaluator.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub enum Outcome {
    /// The evaluator does not handle this rule kind.
    NotApplicable,
    /// The evaluator decided.
    Decided(PolicyValue),
}

impl Outcome {
    /// Shorthand for an allowing decision.
    pub const ALLOW: Self = Self::Decided(PolicyValue::Allow);

    /// Shorthand for a denying decision.
    pub const DENY: Self = Self::Decided(PolicyValue::Deny);

    /// The decided value, if any.
    pub fn value(self) -> Option<PolicyValue> {
        match self {
            Self::NotApplicable => None,
            Self::Decided(value) => Some(value),
        }
    }
}

impl From<bool> for Outcome {
    fn from(value: bool) -> Self {
        Self::Decided(PolicyValue::from(value))
    }
}

impl From<PolicyValue> for Outcome {
    fn from(value: PolicyValue) -> Self {
        Self::Decided(value)
    }
}
