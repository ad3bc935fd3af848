/// Symmetric `n x n` matrix with an implicit zero diagonal.
///
/// Only the strict lower triangle is stored, indexed by the canonical
/// `(max, min)` ordering of `(row, col)`.
#[derive(Debug, Clone, PartialEq)]
pub struct SymMatrix<T> {
    n: usize,
    data: Vec<T>,
}

impl<T: Copy + Default> SymMatrix<T> {
    pub fn new(n: usize, fill: T) -> Self {
        Self {
            n,
            data: vec![fill; n * n.saturating_sub(1) / 2],
        }
    }

    fn offset(row: usize, col: usize) -> usize {
        let (hi, lo) = if row > col { (row, col) } else { (col, row) };
        hi * (hi - 1) / 2 + lo
    }

    /// Read an element. Panics if out of range.
    pub fn get(&self, row: usize, col: usize) -> T {
        assert!(row < self.n && col < self.n, "index out of range");
        if row == col {
            return T::default();
        }
        self.data[Self::offset(row, col)]
    }

    /// Write an element. Writes to the diagonal are ignored.
    pub fn set(&mut self, row: usize, col: usize, val: T) {
        assert!(row < self.n && col < self.n, "index out of range");
        if row == col {
            return;
        }
        self.data[Self::offset(row, col)] = val;
    }
}
