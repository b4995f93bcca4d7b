use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Output formats supported by the daemon's stderr log sink.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per record, for log collectors.
    #[default]
    Json,
    /// Human-readable single line output for a serial console.
    Compact,
}

/// Errors encountered while parsing a [`LogFormat`] from text.
pub type LogFormatParseError = strum::ParseError;
