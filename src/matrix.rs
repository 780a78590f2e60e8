//! A dense, row-major matrix of `f64`.

use std::ops;

use rand::Rng;
use rand_distr::Distribution;

/// An owned 2-dimensional array.
///
/// Element `(r, c)` lives at position `r * cols + c` of the backing buffer. Weight matrices use
/// rows for source neurons and columns for destination neurons.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    /// Create a matrix filled with zeros.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Create a matrix whose elements are drawn from the given distribution.
    pub fn rand<R, D>(rows: usize, cols: usize, rng: &mut R, distribution: D) -> Self
    where
        R: Rng + ?Sized,
        D: Distribution<f64>,
    {
        Self {
            rows,
            cols,
            data: (0..rows * cols).map(|_| distribution.sample(rng)).collect(),
        }
    }

    /// Create a matrix from its elements given in row-major order.
    ///
    /// Returns `None` if the number of elements does not match the shape.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Option<Self> {
        (data.len() == rows * cols).then_some(Self { rows, cols, data })
    }

    /// Return the number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Return the number of columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Return `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Return a row as a slice.
    pub fn row(&self, r: usize) -> &[f64] {
        &self.data[r * self.cols..(r + 1) * self.cols]
    }

    /// Iterate over the elements of a column, top to bottom.
    pub fn column(&self, c: usize) -> impl Iterator<Item = f64> + Clone + '_ {
        self.data.iter().skip(c).step_by(self.cols.max(1)).copied()
    }

    /// Return the elements in row-major order.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Set every element to `value`.
    pub fn fill(&mut self, value: f64) {
        self.data.fill(value);
    }

    /// Add `other` to `self`, element-wise.
    ///
    /// Returns `false` and leaves `self` untouched if the shapes differ.
    pub fn add_assign(&mut self, other: &Self) -> bool {
        if self.shape() != other.shape() {
            return false;
        }
        for (x, y) in self.data.iter_mut().zip(&other.data) {
            *x += y;
        }
        true
    }

    /// Multiply every element by `factor`.
    pub fn scale(&mut self, factor: f64) {
        for x in &mut self.data {
            *x *= factor;
        }
    }

    fn position(&self, (r, c): (usize, usize)) -> usize {
        assert!(
            r < self.rows && c < self.cols,
            "index ({r}, {c}) out of bounds for shape ({}, {})",
            self.rows,
            self.cols
        );
        r * self.cols + c
    }
}

impl ops::Index<(usize, usize)> for Matrix {
    type Output = f64;

    fn index(&self, index: (usize, usize)) -> &Self::Output {
        &self.data[self.position(index)]
    }
}

impl ops::IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, index: (usize, usize)) -> &mut Self::Output {
        let position = self.position(index);
        &mut self.data[position]
    }
}
