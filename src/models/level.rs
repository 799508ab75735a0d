use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Log severity level as exposed to the host
///
/// `Unknown` is only a decode fallback: it is never written back out as a token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub enum Level {
    #[default]
    Unknown,
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LevelError {
    #[error("invalid level {0:?}")]
    Invalid(Level),
}

impl Level {
    /// All levels that have a text token, in severity order
    pub const KNOWN: [Level; 6] = [
        Self::Trace,
        Self::Debug,
        Self::Info,
        Self::Warn,
        Self::Error,
        Self::Fatal,
    ];

    /// Textual form used in display columns and templates (empty for `Unknown`)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "",
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
        }
    }

    /// Decode an uppercase token, falling back to `Unknown`
    pub fn from_token(token: &str) -> Self {
        match token {
            "TRACE" => Self::Trace,
            "DEBUG" => Self::Debug,
            "INFO" => Self::Info,
            "WARN" => Self::Warn,
            "ERROR" => Self::Error,
            "FATAL" => Self::Fatal,
            _ => Self::Unknown,
        }
    }

    /// Encode to an uppercase token
    pub fn to_token(&self) -> Result<&'static str, LevelError> {
        match self {
            Self::Unknown => Err(LevelError::Invalid(*self)),
            known => Ok(known.as_str()),
        }
    }

    pub fn from_service(level: ServiceLevel) -> Self {
        match level {
            ServiceLevel::LevelUnspecified => Self::Unknown,
            ServiceLevel::Trace => Self::Trace,
            ServiceLevel::Debug => Self::Debug,
            ServiceLevel::Info => Self::Info,
            ServiceLevel::Warn => Self::Warn,
            ServiceLevel::Error => Self::Error,
            ServiceLevel::Fatal => Self::Fatal,
        }
    }

    pub fn to_service(self) -> ServiceLevel {
        match self {
            Self::Unknown => ServiceLevel::LevelUnspecified,
            Self::Trace => ServiceLevel::Trace,
            Self::Debug => ServiceLevel::Debug,
            Self::Info => ServiceLevel::Info,
            Self::Warn => ServiceLevel::Warn,
            Self::Error => ServiceLevel::Error,
            Self::Fatal => ServiceLevel::Fatal,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Level {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let token = self.to_token().map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(token)
    }
}

impl<'de> Deserialize<'de> for Level {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let token = String::deserialize(deserializer)?;
        Ok(Self::from_token(&token))
    }
}

/// Severity enumeration of the remote logging service
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ServiceLevel {
    #[default]
    LevelUnspecified,
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl ServiceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LevelUnspecified => "LEVEL_UNSPECIFIED",
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
        }
    }

    fn from_name(name: &str) -> Self {
        match name {
            "TRACE" => Self::Trace,
            "DEBUG" => Self::Debug,
            "INFO" => Self::Info,
            "WARN" => Self::Warn,
            "ERROR" => Self::Error,
            "FATAL" => Self::Fatal,
            _ => Self::LevelUnspecified,
        }
    }

    fn from_number(number: i64) -> Self {
        match number {
            1 => Self::Trace,
            2 => Self::Debug,
            3 => Self::Info,
            4 => Self::Warn,
            5 => Self::Error,
            6 => Self::Fatal,
            _ => Self::LevelUnspecified,
        }
    }
}

impl Serialize for ServiceLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ServiceLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Enum values may arrive as names or as their protobuf numbers.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Name(String),
            Number(i64),
        }

        Ok(match Wire::deserialize(deserializer)? {
            Wire::Name(name) => Self::from_name(&name),
            Wire::Number(number) => Self::from_number(number),
        })
    }
}
