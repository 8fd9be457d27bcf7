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

//! Key column classification, read-only column views and [`KeyBatch`]

use std::sync::Arc;

use arrow::array::{make_array, Array, ArrayData, ArrayRef, UInt32Array};
use arrow::compute::take;
use arrow::datatypes::DataType;
use arrow::util::bit_util;

use crate::error::{GrouperError, Result};
use crate::invalid_argument_err;

/// Classification of a key column's logical type.
///
/// Every supported [`DataType`] maps onto exactly one kind; the kind is
/// all the encoders need to know about a column besides its buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyColumnKind {
    /// Bit-packed values, one byte in the row image
    Boolean,
    /// `byte_width` payload bytes stored verbatim
    Fixed { byte_width: usize },
    /// Raw dictionary indices of `index_width` bytes; value equality is
    /// delegated to the dictionary bound on first use
    Dictionary { index_width: usize },
    /// 32-bit offsets plus payload bytes (`Utf8`, `Binary`)
    VarBinary,
    /// 64-bit offsets (`LargeUtf8`, `LargeBinary`); rejected by the
    /// row-image path
    LargeVarBinary,
    /// No payload; all values compare equal
    Null,
}

impl KeyColumnKind {
    pub fn try_from_type(data_type: &DataType) -> Result<Self> {
        match data_type {
            DataType::Null => Ok(Self::Null),
            DataType::Boolean => Ok(Self::Boolean),
            DataType::Utf8 | DataType::Binary => Ok(Self::VarBinary),
            DataType::LargeUtf8 | DataType::LargeBinary => Ok(Self::LargeVarBinary),
            DataType::FixedSizeBinary(width) => Ok(Self::Fixed {
                byte_width: *width as usize,
            }),
            DataType::Dictionary(index_type, _) => match index_type.primitive_width() {
                Some(index_width) => Ok(Self::Dictionary { index_width }),
                None => Err(GrouperError::UnsupportedKeyType(data_type.clone())),
            },
            other => match other.primitive_width() {
                Some(byte_width) => Ok(Self::Fixed { byte_width }),
                None => Err(GrouperError::UnsupportedKeyType(other.clone())),
            },
        }
    }

    /// Bytes this kind occupies in the values region of a row image
    pub(crate) fn slot_width(&self) -> usize {
        match self {
            Self::Boolean => 1,
            Self::Fixed { byte_width } => *byte_width,
            Self::Dictionary { index_width } => *index_width,
            // one (offset << 32 | len) word
            Self::VarBinary | Self::LargeVarBinary => 8,
            Self::Null => 0,
        }
    }
}

/// One value of a [`KeyBatch`]: a full column or a scalar to be
/// broadcast to the batch length
#[derive(Debug, Clone)]
pub enum KeyValue {
    Array(ArrayRef),
    /// Single-element array standing in for a scalar
    Scalar(ArrayRef),
}

impl KeyValue {
    pub fn data_type(&self) -> &DataType {
        match self {
            Self::Array(a) | Self::Scalar(a) => a.data_type(),
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Self::Scalar(_))
    }

    pub(crate) fn array(&self) -> &ArrayRef {
        match self {
            Self::Array(a) | Self::Scalar(a) => a,
        }
    }
}

/// An ordered set of key columns (or scalars) sharing one logical length
#[derive(Debug, Clone)]
pub struct KeyBatch {
    values: Vec<KeyValue>,
    len: usize,
}

impl KeyBatch {
    pub fn try_new(values: Vec<KeyValue>, len: usize) -> Result<Self> {
        for (i, value) in values.iter().enumerate() {
            match value {
                KeyValue::Array(a) if a.len() != len => {
                    return invalid_argument_err!(
                        "batch value {i} has length {} but the batch length is {len}",
                        a.len()
                    )
                }
                KeyValue::Scalar(a) if a.len() != 1 => {
                    return invalid_argument_err!(
                        "batch scalar {i} must have length 1, got {}",
                        a.len()
                    )
                }
                _ => {}
            }
        }
        Ok(Self { values, len })
    }

    /// Build a batch from equal-length arrays
    pub fn from_arrays(arrays: Vec<ArrayRef>) -> Result<Self> {
        let len = match arrays.first() {
            Some(a) => a.len(),
            None => {
                return invalid_argument_err!(
                    "cannot infer a batch length from zero columns"
                )
            }
        };
        Self::try_new(arrays.into_iter().map(KeyValue::Array).collect(), len)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn num_columns(&self) -> usize {
        self.values.len()
    }

    pub fn values(&self) -> &[KeyValue] {
        &self.values
    }

    /// Logical slice; arrays are sliced, scalars are carried through
    pub fn slice(&self, offset: usize, length: usize) -> Result<Self> {
        if offset + length > self.len {
            return invalid_argument_err!(
                "slice [{offset}, {}) out of bounds for batch of length {}",
                offset + length,
                self.len
            );
        }
        let values = self
            .values
            .iter()
            .map(|v| match v {
                KeyValue::Array(a) => KeyValue::Array(a.slice(offset, length)),
                KeyValue::Scalar(a) => KeyValue::Scalar(Arc::clone(a)),
            })
            .collect();
        Ok(Self { values, len: length })
    }

    /// Check arity and per-column types against a key schema
    pub(crate) fn check_types(&self, key_types: &[DataType]) -> Result<()> {
        if self.values.len() != key_types.len() {
            return invalid_argument_err!(
                "expected batch of {} values but got {}",
                key_types.len(),
                self.values.len()
            );
        }
        for (i, (value, key_type)) in self.values.iter().zip(key_types).enumerate() {
            if value.data_type() != key_type {
                return invalid_argument_err!(
                    "expected batch value {i} of type {key_type} but got {}",
                    value.data_type()
                );
            }
        }
        Ok(())
    }

    /// Materialize every scalar to an array of the batch length.
    ///
    /// This is the only implicit shape coercion the groupers perform; the
    /// gather goes through the `take` kernel.
    pub(crate) fn broadcast_scalars(&self) -> Result<Self> {
        if !self.values.iter().any(KeyValue::is_scalar) {
            return Ok(self.clone());
        }
        let indices = UInt32Array::from(vec![0_u32; self.len]);
        let values = self
            .values
            .iter()
            .map(|v| match v {
                KeyValue::Array(a) => Ok(KeyValue::Array(Arc::clone(a))),
                KeyValue::Scalar(a) => {
                    Ok(KeyValue::Array(take(a.as_ref(), &indices, None)?))
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            values,
            len: self.len,
        })
    }
}

/// Uniform read-only access to one key column.
///
/// Wraps the column's [`ArrayData`] and serves per-row accessors with the
/// logical offset already applied; buffers are never copied.
#[derive(Debug)]
pub struct KeyColumnView {
    kind: KeyColumnKind,
    data: ArrayData,
}

impl KeyColumnView {
    pub fn try_new(array: &ArrayRef) -> Result<Self> {
        let kind = KeyColumnKind::try_from_type(array.data_type())?;
        Ok(Self {
            kind,
            data: array.to_data(),
        })
    }

    pub fn kind(&self) -> KeyColumnKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.len() == 0
    }

    pub fn is_valid(&self, row: usize) -> bool {
        match self.kind {
            KeyColumnKind::Null => false,
            _ => self
                .data
                .nulls()
                .map(|nulls| nulls.is_valid(row))
                .unwrap_or(true),
        }
    }

    pub fn null_count(&self) -> usize {
        match self.kind {
            KeyColumnKind::Null => self.data.len(),
            _ => self.data.null_count(),
        }
    }

    pub fn bool_value(&self, row: usize) -> bool {
        debug_assert_eq!(self.kind, KeyColumnKind::Boolean);
        bit_util::get_bit(self.data.buffers()[0].as_slice(), self.data.offset() + row)
    }

    /// Raw little-endian payload of a fixed-width or dictionary-index field
    pub fn fixed_value(&self, row: usize) -> &[u8] {
        let width = self.kind.slot_width();
        let start = (self.data.offset() + row) * width;
        &self.data.buffers()[0].as_slice()[start..start + width]
    }

    /// Payload bytes of a 32-bit-offset variable-length field
    pub fn var_value(&self, row: usize) -> &[u8] {
        debug_assert_eq!(self.kind, KeyColumnKind::VarBinary);
        let offsets = self.data.buffers()[0].typed_data::<i32>();
        let start = offsets[self.data.offset() + row] as usize;
        let end = offsets[self.data.offset() + row + 1] as usize;
        &self.data.buffers()[1].as_slice()[start..end]
    }

    /// Payload bytes of a 64-bit-offset variable-length field
    pub fn large_var_value(&self, row: usize) -> &[u8] {
        debug_assert_eq!(self.kind, KeyColumnKind::LargeVarBinary);
        let offsets = self.data.buffers()[0].typed_data::<i64>();
        let start = offsets[self.data.offset() + row] as usize;
        let end = offsets[self.data.offset() + row + 1] as usize;
        &self.data.buffers()[1].as_slice()[start..end]
    }

    /// The dictionary values array of a dictionary column
    pub fn dictionary(&self) -> ArrayRef {
        debug_assert!(matches!(self.kind, KeyColumnKind::Dictionary { .. }));
        make_array(self.data.child_data()[0].clone())
    }
}

/// Build views over every column of an already-broadcast batch
pub(crate) fn batch_views(batch: &KeyBatch) -> Result<Vec<KeyColumnView>> {
    batch
        .values()
        .iter()
        .map(|v| {
            debug_assert!(!v.is_scalar());
            KeyColumnView::try_new(v.array())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int32Array, Int64Array, StringArray};

    #[test]
    fn classify_types() {
        assert_eq!(
            KeyColumnKind::try_from_type(&DataType::Int32).unwrap(),
            KeyColumnKind::Fixed { byte_width: 4 }
        );
        assert_eq!(
            KeyColumnKind::try_from_type(&DataType::Utf8).unwrap(),
            KeyColumnKind::VarBinary
        );
        assert_eq!(
            KeyColumnKind::try_from_type(&DataType::Dictionary(
                Box::new(DataType::Int16),
                Box::new(DataType::Utf8),
            ))
            .unwrap(),
            KeyColumnKind::Dictionary { index_width: 2 }
        );
        assert!(matches!(
            KeyColumnKind::try_from_type(&DataType::List(Arc::new(
                arrow::datatypes::Field::new("item", DataType::Int32, true)
            ))),
            Err(GrouperError::UnsupportedKeyType(_))
        ));
    }

    #[test]
    fn batch_validation() {
        let a: ArrayRef = Arc::new(Int32Array::from(vec![1, 2, 3]));
        let b: ArrayRef = Arc::new(Int64Array::from(vec![1, 2]));
        assert!(KeyBatch::from_arrays(vec![a, b]).is_err());
    }

    #[test]
    fn sliced_view_accessors() {
        let a: ArrayRef = Arc::new(Int32Array::from(vec![10, 20, 30, 40]));
        let sliced = a.slice(1, 2);
        let view = KeyColumnView::try_new(&sliced).unwrap();
        assert_eq!(view.len(), 2);
        assert_eq!(view.fixed_value(0), 20_i32.to_le_bytes());
        assert_eq!(view.fixed_value(1), 30_i32.to_le_bytes());

        let s: ArrayRef =
            Arc::new(StringArray::from(vec![Some("ab"), None, Some("cdef")]));
        let view = KeyColumnView::try_new(&s).unwrap();
        assert_eq!(view.var_value(0), b"ab");
        assert!(!view.is_valid(1));
        assert_eq!(view.var_value(2), b"cdef");
    }

    #[test]
    fn scalar_broadcast() {
        let scalar: ArrayRef = Arc::new(Int32Array::from(vec![7]));
        let col: ArrayRef = Arc::new(Int32Array::from(vec![1, 2, 3]));
        let batch = KeyBatch::try_new(
            vec![KeyValue::Array(col), KeyValue::Scalar(scalar)],
            3,
        )
        .unwrap();
        let batch = batch.broadcast_scalars().unwrap();
        let b = batch.values()[1].array();
        let b = b.as_any().downcast_ref::<Int32Array>().unwrap();
        assert_eq!(b.values(), &[7, 7, 7]);
    }
}
