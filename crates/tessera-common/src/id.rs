//! Tessera identifier types
use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

/// Identifier of a user record, assigned by the user repository.
///
/// Serialized as a plain JSON number, which is also how it appears in the `userId` token claim.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Debug)]
#[serde(transparent)]
pub struct UserId(u64);

impl UserId {
    /// Construct a new identifier from an unsigned int.
    pub const fn from_uint(val: u64) -> Self {
        Self(val)
    }

    /// Convert to an unsigned int.
    pub const fn to_uint(self) -> u64 {
        self.0
    }

    /// Read the identifier out of a JSON claim value.
    ///
    /// Only positive integers are accepted; `0` never identifies a user.
    pub fn from_claim(value: &serde_json::Value) -> Option<Self> {
        value.as_u64().filter(|id| *id != 0).map(Self)
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>()
            .map(Self)
            .map_err(|_| "expected a decimal user id")
    }
}

impl From<u64> for UserId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}
