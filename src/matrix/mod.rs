use crate::prelude::*;
use std::ops::{Index, IndexMut};

use rand::distributions::{Distribution, Uniform};

pub mod ops;

/// A dense rows×columns container of doubles in row-major order.
#[derive(Debug, PartialEq, Clone)]
pub struct Matrix {
    data: Vec<f64>,
    dim: (usize, usize),
}

impl Matrix {
    /// Creates a zero-initialized matrix.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            data: vec![0.0; rows * cols],
            dim: (rows, cols),
        }
    }

    /// Creates a matrix with every element uniformly random in [-1, 1].
    pub fn random(rows: usize, cols: usize) -> Self {
        let mut res = Self::new(rows, cols);
        res.init_random();
        res
    }

    /// Re-fills every element with a uniformly random value in [-1, 1].
    pub fn init_random(&mut self) {
        let mut rng = rand::thread_rng();
        let die = Uniform::from(-1.0..=1.0);

        for x in &mut self.data {
            *x = die.sample(&mut rng);
        }
    }

    pub fn from_array<const R: usize, const C: usize>(arr: [[f64; C]; R]) -> Self {
        let mut data = Vec::with_capacity(R * C);

        for row in arr {
            for x in row {
                data.push(x);
            }
        }

        Self { data, dim: (R, C) }
    }

    pub fn from_vec(vec: Vec<Vec<f64>>) -> Result<Self> {
        let rows = vec.len();
        let cols = vec.first().map(|row| row.len()).unwrap_or(0);

        let mut data = Vec::new();
        for row in vec {
            if cols != row.len() {
                return Err(Error::DimensionErr);
            }

            for x in row {
                data.push(x);
            }
        }

        Ok(Self {
            data,
            dim: (rows, cols),
        })
    }

    pub fn dim(&self) -> (usize, usize) {
        self.dim
    }

    pub fn rows(&self) -> usize {
        self.dim.0
    }

    pub fn cols(&self) -> usize {
        self.dim.1
    }

    pub fn zero(&mut self) {
        for x in &mut self.data {
            *x = 0.0;
        }
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = f64;
    fn index(&self, (i, j): (usize, usize)) -> &Self::Output {
        &self.data[i * self.cols() + j]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut Self::Output {
        let idx = i * self.cols() + j;
        &mut self.data[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_matrix_from_array() {
        let matrix = Matrix::from_array([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        assert_eq!(matrix[(0, 1)], 2.0);
        assert_eq!(matrix[(1, 2)], 6.0);
        assert_eq!(matrix[(0, 0)], 1.0);
        assert_eq!(matrix[(1, 1)], 5.0);
    }

    #[test]
    fn new_matrix_is_zeroed() {
        let matrix = Matrix::new(3, 4);

        assert_eq!(matrix.dim(), (3, 4));
        for i in 0..3 {
            for j in 0..4 {
                assert_eq!(matrix[(i, j)], 0.0);
            }
        }
    }

    #[test]
    fn matrix_from_vec() {
        let vec = vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]];
        let matrix = Matrix::from_vec(vec).unwrap();

        assert_eq!(matrix[(0, 1)], 2.0);
        assert_eq!(matrix[(1, 2)], 6.0);
    }

    #[test]
    fn matrix_from_vec_err() {
        let vec = vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0]];
        let matrix = Matrix::from_vec(vec);

        assert!(matches!(matrix, Err(Error::DimensionErr)));
    }

    #[test]
    fn random_init_stays_in_range() {
        let matrix = Matrix::random(10, 10);

        for i in 0..10 {
            for j in 0..10 {
                let x = matrix[(i, j)];
                assert!((-1.0..=1.0).contains(&x));
            }
        }
    }
}
