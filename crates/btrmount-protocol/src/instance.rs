use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Identifier naming one volume entry for the lifetime of its worker.
///
/// Rendered as sixteen lowercase hexadecimal digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceId(u64);

impl InstanceId {
    /// Wraps a raw identifier.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw identifier.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{:016x}", self.0)
    }
}

/// Error returned when an instance identifier is not 1-16 hex digits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid instance identifier '{0}'")]
pub struct InstanceIdParseError(String);

impl FromStr for InstanceId {
    type Err = InstanceIdParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let well_formed = !input.is_empty()
            && input.len() <= 16
            && input.bytes().all(|byte| byte.is_ascii_hexdigit());
        if !well_formed {
            return Err(InstanceIdParseError(input.to_owned()));
        }
        u64::from_str_radix(input, 16)
            .map(Self)
            .map_err(|_| InstanceIdParseError(input.to_owned()))
    }
}

/// Progress of a volume entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeState {
    /// The worker is running but has not reported the filesystem yet.
    Starting,
    /// The worker reported the filesystem UUID.
    Mounted,
}

impl VolumeState {
    /// Wire spelling of the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "Starting",
            Self::Mounted => "Mounted",
        }
    }
}

impl fmt::Display for VolumeState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Error returned for an unrecognised state name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown volume state '{0}'")]
pub struct VolumeStateParseError(String);

impl FromStr for VolumeState {
    type Err = VolumeStateParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input {
            "Starting" => Ok(Self::Starting),
            "Mounted" => Ok(Self::Mounted),
            other => Err(VolumeStateParseError(other.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn instance_id_renders_sixteen_hex_digits() {
        assert_eq!(InstanceId::new(0xbeef).to_string(), "000000000000beef");
        assert_eq!(InstanceId::new(u64::MAX).to_string(), "ffffffffffffffff");
    }

    #[rstest]
    #[case("000000000000BEEF", 0xbeef)]
    #[case("1", 1)]
    fn instance_id_parses_hex(#[case] input: &str, #[case] expected: u64) {
        assert_eq!(input.parse::<InstanceId>(), Ok(InstanceId::new(expected)));
    }

    #[rstest]
    #[case("")]
    #[case("+1")]
    #[case("10000000000000000")]
    #[case("xyz")]
    fn instance_id_rejects_malformed_input(#[case] input: &str) {
        assert!(input.parse::<InstanceId>().is_err());
    }
}
