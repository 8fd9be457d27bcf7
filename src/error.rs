// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! [`GrouperError`] and the crate-wide [`Result`] alias

use std::error::Error;
use std::fmt::{Display, Formatter};

use arrow::datatypes::DataType;
use arrow::error::ArrowError;

/// Result type for operations that could result in a [`GrouperError`]
pub type Result<T, E = GrouperError> = std::result::Result<T, E>;

/// Error raised by the grouping, segmenting and groupings operations
#[derive(Debug)]
pub enum GrouperError {
    /// Batch shape or an argument disagrees with the key schema
    InvalidArgument(String),
    /// A key column's logical type is outside the supported set
    UnsupportedKeyType(DataType),
    /// A batch carried a dictionary that differs from the one bound on
    /// first use
    UnsupportedDictionary(String),
    /// Large-offset binary keys were requested from the row-image path
    UnsupportedLargeOffsets(DataType),
    /// Differing dictionaries across batches would require unification,
    /// which is not implemented
    NotImplementedDictionaryUnification(String),
    /// Misuse of the groupings helpers (null ids or out-of-range ids)
    InvalidIds(String),
    /// Error returned by arrow
    Arrow(ArrowError),
}

impl Display for GrouperError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArgument(msg) => {
                write!(f, "Invalid argument: {msg}")
            }
            Self::UnsupportedKeyType(data_type) => {
                write!(f, "Keys of type {data_type} are not supported")
            }
            Self::UnsupportedDictionary(msg) => {
                write!(f, "Unsupported dictionary: {msg}")
            }
            Self::UnsupportedLargeOffsets(data_type) => {
                write!(
                    f,
                    "Keys of type {data_type} carry 64-bit offsets, which the \
                     row-image path does not support"
                )
            }
            Self::NotImplementedDictionaryUnification(msg) => {
                write!(f, "Unifying differing dictionaries: {msg}")
            }
            Self::InvalidIds(msg) => {
                write!(f, "Invalid group ids: {msg}")
            }
            Self::Arrow(e) => write!(f, "Arrow error: {e}"),
        }
    }
}

impl Error for GrouperError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Arrow(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ArrowError> for GrouperError {
    fn from(e: ArrowError) -> Self {
        Self::Arrow(e)
    }
}

/// Construct an `Err(GrouperError::InvalidArgument)` from a format string
#[macro_export]
macro_rules! invalid_argument_err {
    ($($args:expr),*) => {
        Err($crate::error::GrouperError::InvalidArgument(format!($($args),*)))
    };
}

/// Construct an `Err(GrouperError::InvalidIds)` from a format string
#[macro_export]
macro_rules! invalid_ids_err {
    ($($args:expr),*) => {
        Err($crate::error::GrouperError::InvalidIds(format!($($args),*)))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let e = GrouperError::UnsupportedKeyType(DataType::Duration(
            arrow::datatypes::TimeUnit::Second,
        ));
        assert_eq!(
            e.to_string(),
            "Keys of type Duration(Second) are not supported"
        );

        let e: Result<()> = invalid_argument_err!("expected {} got {}", 2, 3);
        assert_eq!(
            e.unwrap_err().to_string(),
            "Invalid argument: expected 2 got 3"
        );
    }
}
