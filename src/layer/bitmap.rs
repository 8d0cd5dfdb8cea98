// SPDX-License-Identifier: GPL-3.0-or-later

const WORD_BITS: usize = u64::BITS as usize;

#[inline(always)]
pub fn div_round_up(v: usize, denom: usize) -> usize {
    (v + denom - 1)/denom
}

/// The lit columns of one image row. Columns past `width` are never set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Row {
    width: usize,
    words: Vec<u64>,
}

impl Row {
    pub fn new(width: usize) -> Self {
        Self { width, words: vec![0; div_round_up(width, WORD_BITS)] }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn get(&self, x: usize) -> bool {
        x < self.width && self.words[x / WORD_BITS] & (1u64 << (x % WORD_BITS)) != 0
    }

    pub fn set(&mut self, x: usize) {
        self.set_range(x, x);
    }

    /// Sets columns `start..=end`, clipped to the row width.
    pub fn set_range(&mut self, start: usize, end: usize) {
        if self.width == 0 {
            return;
        }
        let end = end.min(self.width - 1);
        if start > end {
            return;
        }

        let (first, last) = (start / WORD_BITS, end / WORD_BITS);
        for w in first..=last {
            let lo = if w == first { start % WORD_BITS } else { 0 };
            let hi = if w == last { end % WORD_BITS } else { WORD_BITS - 1 };
            self.words[w] |= (u64::MAX >> (WORD_BITS - 1 - hi)) & (u64::MAX << lo);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// First lit column at or after `from`.
    pub fn next_set_bit(&self, from: usize) -> Option<usize> {
        let mut w = from / WORD_BITS;
        if w >= self.words.len() {
            return None;
        }
        let mut word = self.words[w] & (u64::MAX << (from % WORD_BITS));
        loop {
            if word != 0 {
                return Some(w * WORD_BITS + word.trailing_zeros() as usize);
            }
            w += 1;
            if w >= self.words.len() {
                return None;
            }
            word = self.words[w];
        }
    }

    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        let mut next = 0;
        core::iter::from_fn(move || {
            let x = self.next_set_bit(next)?;
            next = x + 1;
            Some(x)
        })
    }
}

/// A decoded layer image: lit/unlit pixels, row-major.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Bitmap {
    width: usize,
    rows: Vec<Row>,
}

impl Bitmap {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, rows: vec![Row::new(width); height] }
    }

    pub fn from_rows(width: usize, rows: Vec<Row>) -> Self {
        Self { width, rows }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, y: usize) -> Option<&Row> {
        self.rows.get(y)
    }

    pub fn get(&self, x: usize, y: usize) -> bool {
        self.row(y).map_or(false, |row| row.get(x))
    }

    pub fn set(&mut self, x: usize, y: usize) {
        if let Some(row) = self.rows.get_mut(y) {
            row.set(x);
        }
    }

    pub fn count_ones(&self) -> usize {
        self.rows.iter().map(Row::count_ones).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_range_across_words() {
        let mut row = Row::new(200);
        row.set_range(60, 130);
        assert!(!row.get(59));
        assert!(row.get(60));
        assert!(row.get(64));
        assert!(row.get(130));
        assert!(!row.get(131));
        assert_eq!(row.count_ones(), 71);
    }

    #[test]
    fn test_set_range_is_clipped() {
        let mut row = Row::new(10);
        row.set_range(8, 20);
        assert_eq!(row.iter().collect::<Vec<_>>(), vec![8, 9]);
        // Empty ranges
        row.set_range(5, 4);
        row.set_range(12, 15);
        assert_eq!(row.count_ones(), 2);
    }

    #[test]
    fn test_next_set_bit() {
        let mut row = Row::new(300);
        assert_eq!(row.next_set_bit(0), None);
        row.set(3);
        row.set(250);
        assert_eq!(row.next_set_bit(0), Some(3));
        assert_eq!(row.next_set_bit(3), Some(3));
        assert_eq!(row.next_set_bit(4), Some(250));
        assert_eq!(row.next_set_bit(251), None);
        assert_eq!(row.next_set_bit(1000), None);
    }

    #[test]
    fn test_bitmap_get_out_of_bounds() {
        let mut bitmap = Bitmap::new(4, 2);
        bitmap.set(1, 1);
        bitmap.set(1, 5);
        assert!(bitmap.get(1, 1));
        assert!(!bitmap.get(1, 5));
        assert!(!bitmap.get(9, 1));
        assert_eq!(bitmap.count_ones(), 1);
    }
}
