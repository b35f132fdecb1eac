//! Human-readable sequential listing identifiers (`SRV_007`, `PKG_003`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Entity class of a listing. Each class has its own public id sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingKind {
    /// A single bookable service.
    Service,
    /// A bundle of services sold together.
    Package,
}

impl ListingKind {
    /// Every listing kind, in catalog order.
    pub const ALL: [Self; 2] = [Self::Service, Self::Package];

    /// Fixed prefix of the public id sequence.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Service => "SRV",
            Self::Package => "PKG",
        }
    }

    /// Wire name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Service => "service",
            Self::Package => "package",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.prefix() == prefix)
    }
}

impl fmt::Display for ListingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListingKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "service" => Ok(Self::Service),
            "package" => Ok(Self::Package),
            other => Err(format!("unknown listing kind: {other}")),
        }
    }
}

/// Public sequential identifier: `PREFIX_NNN`, numbered from 1.
///
/// Assigned exactly once on first approval and never changed or reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicId {
    kind: ListingKind,
    number: u32,
}

impl PublicId {
    /// Creates the public id with the given sequence number.
    ///
    /// Returns `None` for `0`; sequences start at 1.
    #[must_use]
    pub const fn new(kind: ListingKind, number: u32) -> Option<Self> {
        if number == 0 {
            None
        } else {
            Some(Self { kind, number })
        }
    }

    /// Entity class this id belongs to.
    #[must_use]
    pub const fn kind(&self) -> ListingKind {
        self.kind
    }

    /// Numeric suffix.
    #[must_use]
    pub const fn number(&self) -> u32 {
        self.number
    }
}

impl fmt::Display for PublicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{:03}", self.kind.prefix(), self.number)
    }
}

impl FromStr for PublicId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, digits) = s
            .split_once('_')
            .ok_or_else(|| format!("malformed public id: {s}"))?;
        let kind = ListingKind::from_prefix(prefix)
            .ok_or_else(|| format!("unknown public id prefix: {prefix}"))?;
        if digits.len() < 3 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("malformed public id suffix: {digits}"));
        }
        let number: u32 = digits
            .parse()
            .map_err(|_| format!("public id suffix out of range: {digits}"))?;
        Self::new(kind, number).ok_or_else(|| format!("public id suffix must be positive: {s}"))
    }
}

impl Serialize for PublicId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PublicId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
