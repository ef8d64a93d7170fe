use omr_core::PixelRect;
use serde::{Deserialize, Serialize};

use crate::Symbol;

/// How grid positions are read out.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reading {
    /// One digit per column; row `r` reads `r + 1`, the last row reads `0`.
    Digits,
    /// One choice per row; column `k` reads `labels[k]`.
    Choices(Vec<char>),
}

/// Logical bubble grid of a sub-image.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSpec {
    pub columns: usize,
    pub rows: usize,
    pub reading: Reading,
}

impl GridSpec {
    pub fn digits(columns: usize, rows: usize) -> Self {
        Self {
            columns,
            rows,
            reading: Reading::Digits,
        }
    }

    pub fn choices(rows: usize, labels: &[char]) -> Self {
        Self {
            columns: labels.len(),
            rows,
            reading: Reading::Choices(labels.to_vec()),
        }
    }

    /// Number of decoded symbols.
    pub fn positions(&self) -> usize {
        match self.reading {
            Reading::Digits => self.columns,
            Reading::Choices(_) => self.rows,
        }
    }

    /// Cells competing for `position`.
    pub(crate) fn candidates(&self, position: usize) -> Vec<GridCell> {
        match self.reading {
            Reading::Digits => (0..self.rows)
                .map(|row| GridCell::new(position, row))
                .collect(),
            Reading::Choices(_) => (0..self.columns)
                .map(|column| GridCell::new(column, position))
                .collect(),
        }
    }

    /// Position a cell contributes to, and its index among that position's
    /// candidates.
    pub(crate) fn position_of(&self, cell: GridCell) -> (usize, usize) {
        match self.reading {
            Reading::Digits => (cell.column, cell.row),
            Reading::Choices(_) => (cell.row, cell.column),
        }
    }

    /// Symbol of candidate `index` of any position.
    pub fn symbol(&self, index: usize) -> Symbol {
        match &self.reading {
            Reading::Digits if index + 1 == self.rows => Symbol::Digit(0),
            Reading::Digits => Symbol::Digit(((index + 1) % 10) as u8),
            Reading::Choices(labels) => labels
                .get(index)
                .copied()
                .map_or(Symbol::Unresolved, Symbol::Choice),
        }
    }

    pub(crate) fn allows_multiple(&self) -> bool {
        matches!(self.reading, Reading::Choices(_))
    }
}

/// Logical `(column, row)` address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCell {
    pub column: usize,
    pub row: usize,
}

impl GridCell {
    pub const fn new(column: usize, row: usize) -> Self {
        Self { column, row }
    }
}

/// Sub-pixel cell rectangle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellRect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl CellRect {
    pub fn center(&self) -> (f32, f32) {
        (self.x + 0.5 * self.w, self.y + 0.5 * self.h)
    }

    /// Window of `frac` of the cell size centered at the cell center shifted
    /// by `offset` cell sizes.
    pub fn window(&self, frac: f32, offset: [f32; 2]) -> PixelRect {
        let (cx, cy) = self.center();
        let (cx, cy) = (cx + offset[0] * self.w, cy + offset[1] * self.h);
        let (hw, hh) = (0.5 * frac * self.w, 0.5 * frac * self.h);
        let x0 = (cx - hw).round().max(0.0) as usize;
        let y0 = (cy - hh).round().max(0.0) as usize;
        let x1 = (cx + hw).round().max(0.0) as usize;
        let y1 = (cy + hh).round().max(0.0) as usize;
        PixelRect::from_bounds(x0, y0, x1, y1)
    }
}

/// Mapping between sub-image pixels and grid cells.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridGeometry {
    /// Left edge of column 0.
    pub origin_x: f32,
    pub cell_w: f32,
    /// Height of one vertical slot.
    pub slot_h: f32,
    pub columns: usize,
    pub rows: usize,
    pub first_row_slot: usize,
}

impl GridGeometry {
    pub fn new(
        width: usize,
        height: usize,
        origin_x: f32,
        spec: &GridSpec,
        row_slots: usize,
        first_row_slot: usize,
    ) -> Self {
        let columns = spec.columns.max(1);
        let slots = row_slots.max(spec.rows + first_row_slot).max(1);
        Self {
            origin_x,
            cell_w: ((width as f32 - origin_x) / columns as f32).max(1.0),
            slot_h: (height as f32 / slots as f32).max(1.0),
            columns,
            rows: spec.rows,
            first_row_slot,
        }
    }

    pub fn column_of(&self, x: f32) -> Option<usize> {
        let k = ((x - self.origin_x) / self.cell_w).floor();
        (k >= 0.0 && (k as usize) < self.columns).then_some(k as usize)
    }

    pub fn row_of(&self, y: f32) -> Option<usize> {
        let slot = (y / self.slot_h).floor();
        if slot < self.first_row_slot as f32 {
            return None;
        }
        let row = slot as usize - self.first_row_slot;
        (row < self.rows).then_some(row)
    }

    pub fn cell_of(&self, x: f32, y: f32) -> Option<GridCell> {
        Some(GridCell::new(self.column_of(x)?, self.row_of(y)?))
    }

    pub fn cell_rect(&self, cell: GridCell) -> CellRect {
        CellRect {
            x: self.origin_x + cell.column as f32 * self.cell_w,
            y: (cell.row + self.first_row_slot) as f32 * self.slot_h,
            w: self.cell_w,
            h: self.slot_h,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digit_rows_wrap_last_to_zero() {
        let spec = GridSpec::digits(10, 10);
        let text: String = (0..10).map(|r| spec.symbol(r).to_string()).collect();
        assert_eq!(text, "1234567890");
    }

    #[test]
    fn header_slots_shift_rows() {
        let spec = GridSpec::digits(4, 10);
        let g = GridGeometry::new(200, 330, 0.0, &spec, 11, 1);
        assert_eq!(g.row_of(10.0), None);
        assert_eq!(g.row_of(35.0), Some(0));
        assert_eq!(g.row_of(329.0), Some(9));
        assert_eq!(g.column_of(199.0), Some(3));
        assert_eq!(g.column_of(-1.0), None);
    }

    #[test]
    fn choice_positions_are_rows() {
        let spec = GridSpec::choices(15, &['A', 'B', 'C', 'D']);
        assert_eq!(spec.positions(), 15);
        assert_eq!(spec.position_of(GridCell::new(2, 7)), (7, 2));
        assert_eq!(spec.symbol(2), Symbol::Choice('C'));
    }
}
