//! Two-dimensional column-major storage shared by every array-like value

use super::ValueError;

/// Largest element count any array may hold
pub const MAX_ARRAY_ELEMENTS: usize = 1 << 31;

/// `rows * cols`, refused past the element limit
pub fn checked_numel(rows: usize, cols: usize) -> Result<usize, ValueError> {
    rows.checked_mul(cols)
        .filter(|&n| n <= MAX_ARRAY_ELEMENTS)
        .ok_or(ValueError::OutOfMemory)
}

/// Column-major 2-D array
#[derive(Debug, Clone, PartialEq)]
pub struct Array<T> {
    rows: usize,
    cols: usize,
    data: Vec<T>,
}

/// One resolved subscript
#[derive(Debug, Clone, PartialEq)]
pub enum Idx {
    /// `:`, the whole extent
    Colon,
    /// Zero-based positions together with the shape of the index value
    List {
        positions: Vec<usize>,
        rows: usize,
        cols: usize,
    },
}

impl Idx {
    pub fn scalar(position: usize) -> Self {
        Idx::List {
            positions: vec![position],
            rows: 1,
            cols: 1,
        }
    }

    pub fn positions(&self, extent: usize) -> Vec<usize> {
        match self {
            Idx::Colon => (0..extent).collect(),
            Idx::List { positions, .. } => positions.clone(),
        }
    }

    pub fn count(&self, extent: usize) -> usize {
        match self {
            Idx::Colon => extent,
            Idx::List { positions, .. } => positions.len(),
        }
    }

    pub fn is_colon(&self) -> bool {
        matches!(self, Idx::Colon)
    }

    /// Largest one-based position, if any
    fn max_extent(&self) -> Option<usize> {
        match self {
            Idx::Colon => None,
            Idx::List { positions, .. } => positions.iter().max().map(|p| p + 1),
        }
    }

    /// Whether this subscript selects every element of `extent` in order
    fn covers(&self, extent: usize) -> bool {
        match self {
            Idx::Colon => true,
            Idx::List { positions, .. } => {
                let mut seen = vec![false; extent];
                for &p in positions {
                    if p < extent {
                        seen[p] = true;
                    }
                }
                seen.into_iter().all(|s| s)
            }
        }
    }
}

impl<T: Clone> Array<T> {
    pub fn new(rows: usize, cols: usize, data: Vec<T>) -> Self {
        debug_assert_eq!(rows * cols, data.len());
        Array { rows, cols, data }
    }

    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Array {
            rows,
            cols,
            data: vec![value; rows * cols],
        }
    }

    pub fn scalar(value: T) -> Self {
        Array::new(1, 1, vec![value])
    }

    pub fn empty() -> Self {
        Array::new(0, 0, Vec::new())
    }

    pub fn row(data: Vec<T>) -> Self {
        Array::new(1, data.len(), data)
    }

    pub fn column(data: Vec<T>) -> Self {
        Array::new(data.len(), 1, data)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn dims(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_scalar(&self) -> bool {
        self.data.len() == 1
    }

    pub fn is_vector(&self) -> bool {
        (self.rows == 1 || self.cols == 1) && !self.data.is_empty()
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn into_data(self) -> Vec<T> {
        self.data
    }

    pub fn get(&self, linear: usize) -> Option<&T> {
        self.data.get(linear)
    }

    pub fn at(&self, row: usize, col: usize) -> &T {
        &self.data[col * self.rows + row]
    }

    pub fn map<U: Clone>(&self, f: impl Fn(&T) -> U) -> Array<U> {
        Array::new(self.rows, self.cols, self.data.iter().map(f).collect())
    }

    pub fn transpose(&self) -> Array<T> {
        let mut data = Vec::with_capacity(self.data.len());
        for r in 0..self.rows {
            for c in 0..self.cols {
                data.push(self.at(r, c).clone());
            }
        }
        Array::new(self.cols, self.rows, data)
    }

    /// Row `r` as a vector
    pub fn row_values(&self, r: usize) -> Vec<T> {
        (0..self.cols).map(|c| self.at(r, c).clone()).collect()
    }

    /// Column `c` as a contiguous slice
    pub fn column_values(&self, c: usize) -> &[T] {
        &self.data[c * self.rows..(c + 1) * self.rows]
    }

    fn resize(&mut self, rows: usize, cols: usize, fill: &T) {
        if rows == self.rows && cols == self.cols {
            return;
        }
        let mut data = vec![fill.clone(); rows * cols];
        for c in 0..self.cols.min(cols) {
            for r in 0..self.rows.min(rows) {
                data[c * rows + r] = self.data[c * self.rows + r].clone();
            }
        }
        self.rows = rows;
        self.cols = cols;
        self.data = data;
    }

    // ====================================================================
    // Indexing
    // ====================================================================

    pub fn index(&self, idx: &[Idx]) -> Result<Array<T>, ValueError> {
        match idx {
            [] => Ok(self.clone()),
            [one] => self.index_linear(one),
            [r, c] => self.index_2d(r, c),
            [r, c, rest @ ..] => {
                check_trailing_ones(rest)?;
                self.index_2d(r, c)
            }
        }
    }

    fn index_linear(&self, idx: &Idx) -> Result<Array<T>, ValueError> {
        let n = self.numel();
        let positions = idx.positions(n);
        if let Some(&bad) = positions.iter().find(|&&p| p >= n) {
            return Err(ValueError::out_of_bound(format!("({})", bad + 1), n, self.dims()));
        }
        let data: Vec<T> = positions.iter().map(|&p| self.data[p].clone()).collect();
        let len = data.len();
        let (rows, cols) = match idx {
            Idx::Colon => (len, 1),
            Idx::List { rows, cols, .. } => {
                let index_is_vector = *rows == 1 || *cols == 1;
                if index_is_vector && self.rows == 1 && self.cols != 1 {
                    (1, len)
                } else if index_is_vector && self.cols == 1 && self.rows != 1 {
                    (len, 1)
                } else {
                    (*rows, *cols)
                }
            }
        };
        Ok(Array::new(rows, cols, data))
    }

    fn index_2d(&self, ri: &Idx, ci: &Idx) -> Result<Array<T>, ValueError> {
        let rows = ri.positions(self.rows);
        let cols = ci.positions(self.cols);
        if let Some(&bad) = rows.iter().find(|&&r| r >= self.rows) {
            return Err(ValueError::out_of_bound(format!("({},_)", bad + 1), self.rows, self.dims()));
        }
        if let Some(&bad) = cols.iter().find(|&&c| c >= self.cols) {
            return Err(ValueError::out_of_bound(format!("(_,{})", bad + 1), self.cols, self.dims()));
        }
        let mut data = Vec::with_capacity(rows.len() * cols.len());
        for &c in &cols {
            for &r in &rows {
                data.push(self.at(r, c).clone());
            }
        }
        Ok(Array::new(rows.len(), cols.len(), data))
    }

    // ====================================================================
    // Indexed assignment
    // ====================================================================

    /// `A(idx) = rhs`, growing `A` with `fill` where needed
    pub fn assign(&mut self, idx: &[Idx], rhs: &Array<T>, fill: &T) -> Result<(), ValueError> {
        match idx {
            [] => Err(ValueError::general("invalid empty index list")),
            [one] => self.assign_linear(one, rhs, fill),
            [r, c] => self.assign_2d(r, c, rhs, fill),
            [r, c, rest @ ..] => {
                check_trailing_ones(rest)?;
                self.assign_2d(r, c, rhs, fill)
            }
        }
    }

    fn assign_linear(&mut self, idx: &Idx, rhs: &Array<T>, fill: &T) -> Result<(), ValueError> {
        let positions = match idx {
            Idx::Colon if self.is_empty() => (0..rhs.numel()).collect(),
            _ => idx.positions(self.numel()),
        };
        if !rhs.is_scalar() && rhs.numel() != positions.len() {
            return Err(ValueError::nonconformant(
                "=",
                (1, positions.len()),
                rhs.dims(),
            ));
        }

        if let Some(max) = positions.iter().max().map(|p| p + 1) {
            if max > self.numel() {
                if self.numel() == 0 && !(self.cols == 0 && self.rows > 1) {
                    if self.cols == 1 && self.rows == 0 {
                        self.resize(max, 1, fill);
                    } else {
                        self.resize(1, max, fill);
                    }
                } else if self.rows == 1 {
                    self.resize(1, max, fill);
                } else if self.cols == 1 {
                    self.resize(max, 1, fill);
                } else {
                    return Err(ValueError::index(format!(
                        "Octave:index out of bound; value {max} out of bound {}",
                        self.numel()
                    )));
                }
            }
        }

        for (k, &p) in positions.iter().enumerate() {
            let v = if rhs.is_scalar() { &rhs.data[0] } else { &rhs.data[k] };
            self.data[p] = v.clone();
        }
        Ok(())
    }

    fn assign_2d(&mut self, ri: &Idx, ci: &Idx, rhs: &Array<T>, fill: &T) -> Result<(), ValueError> {
        // A colon over an empty dimension takes its extent from the right-hand side
        let row_extent = if ri.is_colon() && self.rows == 0 { rhs.rows } else { self.rows };
        let col_extent = if ci.is_colon() && self.cols == 0 { rhs.cols } else { self.cols };
        let rows = ri.positions(row_extent);
        let cols = ci.positions(col_extent);

        if !rhs.is_scalar() && rhs.numel() != rows.len() * cols.len() {
            return Err(ValueError::nonconformant(
                "=",
                (rows.len(), cols.len()),
                rhs.dims(),
            ));
        }

        let new_rows = self.rows.max(row_extent).max(ri.max_extent().unwrap_or(0));
        let new_cols = self.cols.max(col_extent).max(ci.max_extent().unwrap_or(0));
        self.resize(new_rows, new_cols, fill);

        let mut k = 0;
        for &c in &cols {
            for &r in &rows {
                let v = if rhs.is_scalar() { &rhs.data[0] } else { &rhs.data[k] };
                self.data[c * self.rows + r] = v.clone();
                k += 1;
            }
        }
        Ok(())
    }

    /// `A(idx) = []`
    pub fn delete(&mut self, idx: &[Idx]) -> Result<(), ValueError> {
        match idx {
            [one] => self.delete_linear(one),
            [r, c] => self.delete_2d(r, c),
            _ => Err(ValueError::general(
                "a null assignment can only have one non-colon index",
            )),
        }
    }

    fn delete_linear(&mut self, idx: &Idx) -> Result<(), ValueError> {
        if idx.is_colon() {
            *self = Array::empty();
            return Ok(());
        }
        let n = self.numel();
        let positions = idx.positions(n);
        if let Some(&bad) = positions.iter().find(|&&p| p >= n) {
            return Err(ValueError::out_of_bound(format!("({})", bad + 1), n, self.dims()));
        }
        let mut keep = vec![true; n];
        for p in positions {
            keep[p] = false;
        }
        let data: Vec<T> = self
            .data
            .iter()
            .zip(keep)
            .filter_map(|(v, k)| k.then(|| v.clone()))
            .collect();
        *self = if self.cols == 1 && self.rows != 1 {
            Array::column(data)
        } else {
            Array::row(data)
        };
        Ok(())
    }

    fn delete_2d(&mut self, ri: &Idx, ci: &Idx) -> Result<(), ValueError> {
        if ri.covers(self.rows) {
            let cols = ci.positions(self.cols);
            if let Some(&bad) = cols.iter().find(|&&c| c >= self.cols) {
                return Err(ValueError::out_of_bound(format!("(_,{})", bad + 1), self.cols, self.dims()));
            }
            let keep: Vec<usize> = (0..self.cols).filter(|c| !cols.contains(c)).collect();
            let mut data = Vec::with_capacity(keep.len() * self.rows);
            for &c in &keep {
                data.extend_from_slice(self.column_values(c));
            }
            *self = Array::new(self.rows, keep.len(), data);
            Ok(())
        } else if ci.covers(self.cols) {
            let rows = ri.positions(self.rows);
            if let Some(&bad) = rows.iter().find(|&&r| r >= self.rows) {
                return Err(ValueError::out_of_bound(format!("({},_)", bad + 1), self.rows, self.dims()));
            }
            let keep: Vec<usize> = (0..self.rows).filter(|r| !rows.contains(r)).collect();
            let mut data = Vec::with_capacity(keep.len() * self.cols);
            for c in 0..self.cols {
                for &r in &keep {
                    data.push(self.at(r, c).clone());
                }
            }
            *self = Array::new(keep.len(), self.cols, data);
            Ok(())
        } else {
            Err(ValueError::general(
                "a null assignment can only have one non-colon index",
            ))
        }
    }

    // ====================================================================
    // Concatenation
    // ====================================================================

    /// `[a, b, ...]`; empty parts are skipped
    pub fn hcat(parts: Vec<Array<T>>) -> Result<Array<T>, ValueError> {
        let mut parts: Vec<Array<T>> = parts.into_iter().filter(|p| !p.is_empty()).collect();
        match parts.len() {
            0 => return Ok(Array::empty()),
            1 => return Ok(parts.remove(0)),
            _ => {}
        }
        let rows = parts[0].rows;
        let total: usize = parts.iter().map(|p| p.cols).sum();
        let mut data = Vec::with_capacity(checked_numel(rows, total)?);
        let mut cols = 0;
        for part in &parts {
            if part.rows != rows {
                return Err(ValueError::general(format!(
                    "horizontal dimensions mismatch ({}x{} vs {}x{})",
                    parts[0].rows, parts[0].cols, part.rows, part.cols
                )));
            }
            cols += part.cols;
            data.extend_from_slice(&part.data);
        }
        Ok(Array::new(rows, cols, data))
    }

    /// `[a; b; ...]`; empty parts are skipped
    pub fn vcat(parts: Vec<Array<T>>) -> Result<Array<T>, ValueError> {
        let mut parts: Vec<Array<T>> = parts.into_iter().filter(|p| !p.is_empty()).collect();
        match parts.len() {
            0 => return Ok(Array::empty()),
            1 => return Ok(parts.remove(0)),
            _ => {}
        }
        let cols = parts[0].cols;
        for part in &parts {
            if part.cols != cols {
                return Err(ValueError::general(format!(
                    "vertical dimensions mismatch ({}x{} vs {}x{})",
                    parts[0].rows, parts[0].cols, part.rows, part.cols
                )));
            }
        }
        let rows: usize = parts.iter().map(|p| p.rows).sum();
        let mut data = Vec::with_capacity(checked_numel(rows, cols)?);
        for c in 0..cols {
            for part in &parts {
                data.extend_from_slice(part.column_values(c));
            }
        }
        Ok(Array::new(rows, cols, data))
    }
}

fn check_trailing_ones(rest: &[Idx]) -> Result<(), ValueError> {
    let all_ones = rest.iter().all(|i| match i {
        Idx::Colon => true,
        Idx::List { positions, .. } => positions.iter().all(|&p| p == 0),
    });
    if all_ones {
        Ok(())
    } else {
        Err(ValueError::index("only 2-D indexing is supported"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(positions: &[usize]) -> Idx {
        Idx::List {
            positions: positions.to_vec(),
            rows: 1,
            cols: positions.len(),
        }
    }

    fn m23() -> Array<f64> {
        // [1 2 3; 4 5 6]
        Array::new(2, 3, vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0])
    }

    // ====================================================================
    // Reading
    // ====================================================================

    #[test]
    fn test_linear_index_row_vector_keeps_orientation() {
        let a = Array::row(vec![10.0, 20.0, 30.0]);
        let r = a.index(&[list(&[2, 0])]).unwrap();
        assert_eq!(r.dims(), (1, 2));
        assert_eq!(r.data(), &[30.0, 10.0]);
    }

    #[test]
    fn test_colon_index_gives_column() {
        let r = m23().index(&[Idx::Colon]).unwrap();
        assert_eq!(r.dims(), (6, 1));
    }

    #[test]
    fn test_two_dimensional_index() {
        let r = m23().index(&[Idx::scalar(1), Idx::Colon]).unwrap();
        assert_eq!(r.dims(), (1, 3));
        assert_eq!(r.data(), &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_index_out_of_bound_message() {
        let err = Array::row(vec![1.0, 2.0, 3.0]).index(&[Idx::scalar(4)]).unwrap_err();
        assert_eq!(err.to_string(), "index (5): out of bound 3 (dimensions are 1x3)");
    }

    #[test]
    fn test_transpose() {
        let t = m23().transpose();
        assert_eq!(t.dims(), (3, 2));
        assert_eq!(*t.at(2, 1), 6.0);
    }

    // ====================================================================
    // Writing
    // ====================================================================

    #[test]
    fn test_assign_grows_empty_to_row() {
        let mut a: Array<f64> = Array::empty();
        a.assign(&[Idx::scalar(2)], &Array::scalar(7.0), &0.0).unwrap();
        assert_eq!(a.dims(), (1, 3));
        assert_eq!(a.data(), &[0.0, 0.0, 7.0]);
    }

    #[test]
    fn test_assign_grows_column() {
        let mut a = Array::column(vec![1.0, 2.0]);
        a.assign(&[Idx::scalar(3)], &Array::scalar(4.0), &0.0).unwrap();
        assert_eq!(a.dims(), (4, 1));
    }

    #[test]
    fn test_assign_2d_grows_matrix() {
        let mut a = m23();
        a.assign(&[Idx::scalar(2), Idx::scalar(0)], &Array::scalar(9.0), &0.0).unwrap();
        assert_eq!(a.dims(), (3, 3));
        assert_eq!(*a.at(2, 0), 9.0);
        assert_eq!(*a.at(2, 1), 0.0);
    }

    #[test]
    fn test_assign_nonconformant() {
        let mut a = Array::row(vec![1.0, 2.0, 3.0]);
        let err = a.assign(&[list(&[0, 1])], &Array::row(vec![1.0, 2.0, 3.0]), &0.0);
        assert!(err.is_err());
    }

    #[test]
    fn test_delete_elements_and_columns() {
        let mut a = Array::row(vec![1.0, 2.0, 3.0, 4.0]);
        a.delete(&[list(&[1, 3])]).unwrap();
        assert_eq!(a.data(), &[1.0, 3.0]);

        let mut m = m23();
        m.delete(&[Idx::Colon, Idx::scalar(1)]).unwrap();
        assert_eq!(m.dims(), (2, 2));
        assert_eq!(m.data(), &[1.0, 4.0, 3.0, 6.0]);
    }

    // ====================================================================
    // Concatenation
    // ====================================================================

    #[test]
    fn test_hcat_and_vcat() {
        let h = Array::hcat(vec![Array::row(vec![1.0]), Array::empty(), Array::row(vec![2.0, 3.0])]).unwrap();
        assert_eq!(h.dims(), (1, 3));

        let v = Array::vcat(vec![Array::row(vec![1.0, 2.0]), Array::row(vec![3.0, 4.0])]).unwrap();
        assert_eq!(v.dims(), (2, 2));
        assert_eq!(v.data(), &[1.0, 3.0, 2.0, 4.0]);
    }

    #[test]
    fn test_vcat_mismatch() {
        let err = Array::vcat(vec![Array::row(vec![1.0, 2.0]), Array::row(vec![3.0])]).unwrap_err();
        assert!(err.to_string().contains("vertical dimensions mismatch (1x2 vs 1x1)"));
    }
}
