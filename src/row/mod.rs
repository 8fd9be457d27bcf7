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

//! Row images backed by raw bytes
//!
//! Each key tuple encodes to up to four parts:
//! `[null bit set] [values] [var length data] [padding]`
//!
//! The null bit set is aligned to 1 byte and stores one bit per key
//! column (set = valid). The values region stores fields in key-schema
//! order:
//! - boolean fields as one byte (0 or 1);
//! - fixed-width and dictionary-index fields verbatim, little-endian;
//! - variable-length fields as one 8-byte word packing
//!   `(offset within row) << 32 | length`, with the payload appended to
//!   the var-length region.
//!
//! Rows end on an 8-byte boundary and unwritten bytes are zero, so two
//! key tuples are equal exactly when their row images are byte-equal,
//! and a row image can be relocated with a plain byte copy.

use arrow::datatypes::DataType;
use arrow::util::bit_util::round_upto_power_of_2;

use crate::column::KeyColumnKind;
use crate::error::{GrouperError, Result};

mod reader;
mod table;
mod writer;

pub use reader::decode_columns;
pub use table::RowTable;
pub use writer::{encode_rows, measure_row};

/// Rows are padded with zeros to this boundary
pub(crate) const ROW_ALIGNMENT: usize = std::mem::size_of::<u64>();

/// Fixed per-column placement within a row image.
///
/// Planning happens once per key schema; all encoding, hashing and
/// equality work is driven by the resulting offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowLayout {
    /// Classification of each key column, in schema order
    pub(crate) kinds: Vec<KeyColumnKind>,
    /// Width in bytes of the null bit set
    pub(crate) null_width: usize,
    /// Byte offset of each column's field within the values region,
    /// relative to the row start
    pub(crate) field_offsets: Vec<usize>,
    /// Total width of the values region
    pub(crate) values_width: usize,
    /// Padded row width; the row stride when `is_fixed` returns true
    pub(crate) fixed_row_width: usize,
}

impl RowLayout {
    pub fn try_new(key_types: &[DataType]) -> Result<Self> {
        let kinds = key_types
            .iter()
            .map(KeyColumnKind::try_from_type)
            .collect::<Result<Vec<_>>>()?;
        if let Some(i) = kinds
            .iter()
            .position(|k| *k == KeyColumnKind::LargeVarBinary)
        {
            return Err(GrouperError::UnsupportedLargeOffsets(key_types[i].clone()));
        }

        let null_width = (kinds.len() + 7) / 8;
        let mut field_offsets = Vec::with_capacity(kinds.len());
        let mut offset = null_width;
        for kind in &kinds {
            field_offsets.push(offset);
            offset += kind.slot_width();
        }
        let values_width = offset - null_width;
        let fixed_row_width =
            round_upto_power_of_2(null_width + values_width, ROW_ALIGNMENT);

        Ok(Self {
            kinds,
            null_width,
            field_offsets,
            values_width,
            fixed_row_width,
        })
    }

    /// True when no column is variable-length, i.e. all rows share one width
    pub fn is_fixed(&self) -> bool {
        !self.kinds.iter().any(|k| {
            matches!(
                k,
                KeyColumnKind::VarBinary | KeyColumnKind::LargeVarBinary
            )
        })
    }

    /// Width of the null bit set plus the values region, before padding
    pub fn fixed_part_width(&self) -> usize {
        self.null_width + self.values_width
    }

    pub fn num_columns(&self) -> usize {
        self.kinds.len()
    }
}
