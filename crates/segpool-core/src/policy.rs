//! Which end of a free list blocks are taken from and returned to.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::PoolError;

/// One end of a pool list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum End {
    /// The tail.
    #[default]
    Back,
    /// The head.
    Front,
}

impl End {
    /// The other end.
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::Back => Self::Front,
            Self::Front => Self::Back,
        }
    }
}

/// Reuse policy of a free store.
///
/// Correctness does not depend on the policy; it only decides which free
/// block is handed out next. [`ReusePolicy::LIFO`] is the default: it
/// reuses the most recently freed block, which is the one most likely to
/// still be in cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReusePolicy {
    /// End `take_block` pops from.
    pub take: End,
    /// End `return_block` pushes to.
    pub give: End,
}

impl ReusePolicy {
    /// Take and return at the back.
    pub const LIFO: Self = Self {
        take: End::Back,
        give: End::Back,
    };

    /// Take at the front, return at the back.
    pub const FIFO: Self = Self {
        take: End::Front,
        give: End::Back,
    };
}

impl Default for ReusePolicy {
    fn default() -> Self {
        Self::LIFO
    }
}

impl fmt::Display for ReusePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::LIFO => f.write_str("lifo"),
            Self::FIFO => f.write_str("fifo"),
            Self { take, give } => write!(f, "take={take:?},give={give:?}"),
        }
    }
}

impl FromStr for ReusePolicy {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lifo" => Ok(Self::LIFO),
            "fifo" => Ok(Self::FIFO),
            other => Err(PoolError::Config(format!(
                "unknown reuse policy '{other}' (expected lifo or fifo)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_lifo() {
        assert_eq!(ReusePolicy::default(), ReusePolicy::LIFO);
    }

    #[test]
    fn parse_and_display() {
        assert_eq!("LIFO".parse::<ReusePolicy>().unwrap(), ReusePolicy::LIFO);
        assert_eq!(" fifo ".parse::<ReusePolicy>().unwrap(), ReusePolicy::FIFO);
        assert!("stack".parse::<ReusePolicy>().is_err());
        assert_eq!(ReusePolicy::FIFO.to_string(), "fifo");
    }

    #[test]
    fn opposite_end() {
        assert_eq!(End::Back.opposite(), End::Front);
        assert_eq!(End::Front.opposite(), End::Back);
    }
}
