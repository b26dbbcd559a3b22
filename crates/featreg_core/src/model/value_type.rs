//! Value types a feature or entity column may carry.

use super::validation::SpecValidationError;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Closed set of supported column value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Bytes,
    String,
    Int32,
    Int64,
    Double,
    Float,
    Bool,
    UnixTimestamp,
    BytesList,
    StringList,
    Int32List,
    Int64List,
    DoubleList,
    FloatList,
    BoolList,
    UnixTimestampList,
}

const ALL_VALUE_TYPES: &[ValueType] = &[
    ValueType::Bytes,
    ValueType::String,
    ValueType::Int32,
    ValueType::Int64,
    ValueType::Double,
    ValueType::Float,
    ValueType::Bool,
    ValueType::UnixTimestamp,
    ValueType::BytesList,
    ValueType::StringList,
    ValueType::Int32List,
    ValueType::Int64List,
    ValueType::DoubleList,
    ValueType::FloatList,
    ValueType::BoolList,
    ValueType::UnixTimestampList,
];

impl ValueType {
    pub fn all() -> &'static [ValueType] {
        ALL_VALUE_TYPES
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bytes => "bytes",
            Self::String => "string",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Double => "double",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::UnixTimestamp => "unix_timestamp",
            Self::BytesList => "bytes_list",
            Self::StringList => "string_list",
            Self::Int32List => "int32_list",
            Self::Int64List => "int64_list",
            Self::DoubleList => "double_list",
            Self::FloatList => "float_list",
            Self::BoolList => "bool_list",
            Self::UnixTimestampList => "unix_timestamp_list",
        }
    }

    pub fn is_list(self) -> bool {
        self.as_str().ends_with("_list")
    }
}

impl Display for ValueType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueType {
    type Err = SpecValidationError;

    /// Parses the snake_case name, case-insensitively.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        ALL_VALUE_TYPES
            .iter()
            .copied()
            .find(|candidate| candidate.as_str() == normalized)
            .ok_or_else(|| SpecValidationError::UnknownValueType(value.to_string()))
    }
}
