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

//! [`RowTable`]: append-only store of row images

use std::sync::Arc;

use super::RowLayout;

/// Extra tail bytes kept allocated behind both regions so wide vector
/// loads over the final row stay in bounds
pub(crate) const TABLE_PADDING: usize = 64;

/// Append-only sequence of row images indexed `0..num_rows`.
///
/// Fixed layouts address rows as `row_id * fixed_row_width`; variable
/// layouts keep an offsets vector beside the data blob. A row id, once
/// assigned, refers to the same image until [`RowTable::clean`].
#[derive(Debug)]
pub struct RowTable {
    layout: Arc<RowLayout>,
    data: Vec<u8>,
    /// Row start offsets, `num_rows + 1` entries; unused for fixed layouts
    offsets: Vec<usize>,
    num_rows: usize,
}

impl RowTable {
    pub fn new(layout: Arc<RowLayout>) -> Self {
        let offsets = if layout.is_fixed() { vec![] } else { vec![0] };
        Self {
            layout,
            data: Vec::new(),
            offsets,
            num_rows: 0,
        }
    }

    pub fn layout(&self) -> &RowLayout {
        &self.layout
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows == 0
    }

    /// The image of row `row_id`, padding included
    pub fn row(&self, row_id: usize) -> &[u8] {
        debug_assert!(row_id < self.num_rows);
        if self.layout.is_fixed() {
            let width = self.layout.fixed_row_width;
            &self.data[row_id * width..(row_id + 1) * width]
        } else {
            &self.data[self.offsets[row_id]..self.offsets[row_id + 1]]
        }
    }

    /// Append a zeroed row of `width` bytes and return it for filling
    pub(crate) fn push_zeroed(&mut self, width: usize) -> &mut [u8] {
        debug_assert!(
            !self.layout.is_fixed() || width == self.layout.fixed_row_width
        );
        let start = self.data.len();
        self.data.reserve(width + TABLE_PADDING);
        self.data.resize(start + width, 0);
        if !self.layout.is_fixed() {
            self.offsets.push(start + width);
        }
        self.num_rows += 1;
        &mut self.data[start..start + width]
    }

    /// Append `num_rows` rows copied from `other`: the rows listed in
    /// `selection`, or the first `num_rows` rows when `selection` is
    /// `None`. Images are self-contained, so both the fixed region and
    /// the var-length payload move in one copy per row.
    pub fn append_selection_from(
        &mut self,
        other: &RowTable,
        num_rows: usize,
        selection: Option<&[u16]>,
    ) {
        debug_assert_eq!(self.layout.as_ref(), other.layout.as_ref());
        match selection {
            Some(selection) => {
                debug_assert_eq!(selection.len(), num_rows);
                for &row_id in selection {
                    self.append_bytes(other.row(row_id as usize));
                }
            }
            None => {
                debug_assert!(num_rows <= other.num_rows);
                for row_id in 0..num_rows {
                    self.append_bytes(other.row(row_id));
                }
            }
        }
    }

    fn append_bytes(&mut self, image: &[u8]) {
        let start = self.data.len();
        self.data.reserve(image.len() + TABLE_PADDING);
        self.data.extend_from_slice(image);
        if !self.layout.is_fixed() {
            self.offsets.push(start + image.len());
        }
        self.num_rows += 1;
    }

    /// Reset to zero rows without releasing capacity
    pub fn clean(&mut self) {
        self.data.clear();
        self.offsets.truncate(1);
        self.num_rows = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::datatypes::DataType;

    fn layout(types: &[DataType]) -> Arc<RowLayout> {
        Arc::new(RowLayout::try_new(types).unwrap())
    }

    #[test]
    fn fixed_rows_roundtrip() {
        let layout = layout(&[DataType::Int32]);
        let width = layout.fixed_row_width;
        let mut table = RowTable::new(Arc::clone(&layout));
        table.push_zeroed(width)[1] = 0xAA;
        table.push_zeroed(width)[1] = 0xBB;
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.row(0)[1], 0xAA);
        assert_eq!(table.row(1)[1], 0xBB);

        table.clean();
        assert!(table.is_empty());
    }

    #[test]
    fn append_selection() {
        let layout = layout(&[DataType::Utf8]);
        let mut src = RowTable::new(Arc::clone(&layout));
        for (width, fill) in [(16, 1_u8), (24, 2), (16, 3)] {
            src.push_zeroed(width).fill(fill);
        }

        let mut dst = RowTable::new(Arc::clone(&layout));
        dst.append_selection_from(&src, 2, Some(&[2, 0]));
        assert_eq!(dst.num_rows(), 2);
        assert_eq!(dst.row(0), src.row(2));
        assert_eq!(dst.row(1), src.row(0));

        let mut all = RowTable::new(layout);
        all.append_selection_from(&src, 3, None);
        assert_eq!(all.num_rows(), 3);
        assert_eq!(all.row(1), src.row(1));
    }
}
