//! Channel identifier value object

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::domain::error::InvalidChannelError;

/// Lowest channel id handed out
pub const MIN_CHANNEL: u16 = 1;

/// Highest channel id handed out
pub const MAX_CHANNEL: u16 = 1000;

/// Logical stream identifier grouping all segments of one recording session.
///
/// Rendered as a zero-padded 4-digit decimal string (`0001` .. `1000`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChannelId(u16);

impl ChannelId {
    /// Create a channel id, validating the range
    pub fn new(value: u16) -> Result<Self, InvalidChannelError> {
        if (MIN_CHANNEL..=MAX_CHANNEL).contains(&value) {
            Ok(Self(value))
        } else {
            Err(InvalidChannelError {
                input: value.to_string(),
            })
        }
    }

    /// Draw a channel uniformly from `[0001, 1000]`
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(rng.gen_range(MIN_CHANNEL..=MAX_CHANNEL))
    }

    /// Draw a channel that differs from `previous`.
    ///
    /// Uniform over the remaining 999 ids when `previous` is set.
    pub fn random_excluding<R: Rng + ?Sized>(previous: Option<ChannelId>, rng: &mut R) -> Self {
        let Some(previous) = previous else {
            return Self::random(rng);
        };
        let drawn = rng.gen_range(MIN_CHANNEL..MAX_CHANNEL);
        if drawn >= previous.0 {
            Self(drawn + 1)
        } else {
            Self(drawn)
        }
    }

    /// Numeric value
    pub const fn value(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.0)
    }
}

impl FromStr for ChannelId {
    type Err = InvalidChannelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || InvalidChannelError {
            input: s.to_string(),
        };

        if trimmed.len() != 4 || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let value: u16 = trimmed.parse().map_err(|_| invalid())?;
        Self::new(value).map_err(|_| invalid())
    }
}

impl TryFrom<String> for ChannelId {
    type Error = InvalidChannelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ChannelId> for String {
    fn from(channel: ChannelId) -> Self {
        channel.to_string()
    }
}
