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

//! Columnar row-grouping over [arrow] arrays
//!
//! Given a sequence of batches of key columns, a [`Grouper`] assigns
//! every logical row a dense `u32` group id such that two rows receive
//! the same id exactly when their key tuples are equal (nulls equal
//! nulls). Ids are handed out in strict order of first appearance and
//! stay stable for the grouper's lifetime.
//!
//! Around that core the crate exposes:
//!
//! - lookup-only and populate-only modes ([`Grouper::lookup`],
//!   [`Grouper::populate`]);
//! - [`Grouper::uniques`], materializing the distinct key tuples in
//!   insertion order;
//! - a streaming [`RowSegmenter`] reporting contiguous runs of
//!   equal-keyed rows, with a continuation flag across batches;
//! - [`make_groupings`] / [`apply_groupings`], inverting an id array
//!   into a partitioning of row indices.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use arrow::array::{ArrayRef, Int32Array};
//! use arrow::datatypes::DataType;
//! use row_grouping::{new_grouper, ExecContext, KeyBatch};
//!
//! # fn main() -> row_grouping::Result<()> {
//! let ctx = ExecContext::new();
//! let mut grouper = new_grouper(&[DataType::Int32], &ctx)?;
//! let batch = KeyBatch::from_arrays(vec![
//!     Arc::new(Int32Array::from(vec![3, 1, 3, 1, 2])) as ArrayRef,
//! ])?;
//!
//! let ids = grouper.consume(&batch, 0, None)?;
//! assert_eq!(ids.values(), &[0, 1, 0, 1, 2]);
//! assert_eq!(grouper.num_groups(), 3);
//! # Ok(())
//! # }
//! ```
//!
//! # Implementation selection
//!
//! [`new_grouper`] picks the row-image implementation (key encoder, row
//! table and batched hash table) whenever the key set is non-empty, the
//! host is little-endian and no key column carries 64-bit offsets; the
//! byte-string fallback covers the rest. Both implementations share one
//! key-equality semantics bit for bit.
//!
//! All groupers and segmenters are single-threaded and non-reentrant.

pub mod column;
pub mod error;
mod fallback;
mod grouper;
pub mod groupings;
pub mod map;
pub mod row;
mod segment;

pub use column::{KeyBatch, KeyColumnKind, KeyColumnView, KeyValue};
pub use error::{GrouperError, Result};
pub use grouper::{new_grouper, ExecContext, Grouper};
pub use groupings::{apply_groupings, make_groupings};
pub use map::{KeyStore, RowMap};
pub use row::{RowLayout, RowTable};
pub use segment::{new_segmenter, RowSegmenter, Segment};
