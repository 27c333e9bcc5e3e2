//! Leveled log sinks that can be bridged across the network.

use std::fmt;

/// Severity of a bridged log record.
///
/// The byte values are the wire encoding and are signed: negative levels are
/// debug detail, positive levels are operator-facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Finest,
    Finer,
    Fine,
    Config,
    Info,
    Warning,
    Severe,
}

impl LogLevel {
    /// Wire byte for this level.
    pub fn to_byte(self) -> i8 {
        match self {
            LogLevel::Finest => -9,
            LogLevel::Finer => -6,
            LogLevel::Fine => -3,
            LogLevel::Config => 0,
            LogLevel::Info => 3,
            LogLevel::Warning => 6,
            LogLevel::Severe => 9,
        }
    }

    /// Decode a wire byte. Unknown values are rejected so a garbled record
    /// does not masquerade as a real level.
    pub fn from_byte(byte: i8) -> Option<LogLevel> {
        match byte {
            -9 => Some(LogLevel::Finest),
            -6 => Some(LogLevel::Finer),
            -3 => Some(LogLevel::Fine),
            0 => Some(LogLevel::Config),
            3 => Some(LogLevel::Info),
            6 => Some(LogLevel::Warning),
            9 => Some(LogLevel::Severe),
            _ => None,
        }
    }

    /// Is this level at least as important as `minimum`?
    pub fn at_least(self, minimum: LogLevel) -> bool {
        self >= minimum
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Finest => "FINEST",
            LogLevel::Finer => "FINER",
            LogLevel::Fine => "FINE",
            LogLevel::Config => "CONFIG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Severe => "SEVERE",
        };
        write!(f, "{}", name)
    }
}

/// A sink for log records. `extended` carries free-form detail such as a
/// rendered backtrace.
pub trait LogTarget: Send + Sync {
    fn log(&self, level: LogLevel, message: &str, extended: Option<&str>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_round_trip() {
        for level in [
            LogLevel::Finest,
            LogLevel::Finer,
            LogLevel::Fine,
            LogLevel::Config,
            LogLevel::Info,
            LogLevel::Warning,
            LogLevel::Severe,
        ] {
            assert_eq!(LogLevel::from_byte(level.to_byte()), Some(level));
        }
        assert_eq!(LogLevel::from_byte(5), None);
    }

    #[test]
    fn test_ordering() {
        assert!(LogLevel::Severe.at_least(LogLevel::Info));
        assert!(LogLevel::Info.at_least(LogLevel::Info));
        assert!(!LogLevel::Fine.at_least(LogLevel::Warning));
    }
}
