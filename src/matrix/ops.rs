use super::Matrix;
use crate::prelude::*;
use std::io::{Read, Write};

impl Matrix {
    /// Multiplies the matrix by a column vector, producing a vector of
    /// `rows` elements.
    pub fn mul_vec(&self, v: &[f64]) -> Result<Vec<f64>> {
        if v.len() != self.cols() {
            return Err(Error::DimensionErr);
        }

        let mut res = vec![0.0; self.rows()];
        for (i, out) in res.iter_mut().enumerate() {
            for j in 0..self.cols() {
                *out += self[(i, j)] * v[j];
            }
        }
        Ok(res)
    }

    /// Multiplies the transposed matrix by a column vector, producing a
    /// vector of `cols` elements. The matrix itself is left untouched.
    pub fn tmul_vec(&self, v: &[f64]) -> Result<Vec<f64>> {
        if v.len() != self.rows() {
            return Err(Error::DimensionErr);
        }

        let mut res = vec![0.0; self.cols()];
        for (i, out) in res.iter_mut().enumerate() {
            for j in 0..self.rows() {
                *out += self[(j, i)] * v[j];
            }
        }
        Ok(res)
    }

    pub fn row_sum(&self, row: usize) -> f64 {
        (0..self.cols()).map(|j| self[(row, j)]).sum()
    }

    pub fn col_sum(&self, col: usize) -> f64 {
        (0..self.rows()).map(|i| self[(i, col)]).sum()
    }

    /// Writes the elements as sequential little-endian doubles in row-major
    /// order. No header: the reader must already know the dimensions.
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        for x in &self.data {
            w.write_all(&x.to_le_bytes())?;
        }
        Ok(())
    }

    /// Reads `rows * cols` little-endian doubles into an existing matrix,
    /// row-major.
    pub fn read_from<R: Read>(&mut self, r: &mut R) -> Result<()> {
        let mut buf = [0u8; 8];
        for x in &mut self.data {
            r.read_exact(&mut buf)?;
            *x = f64::from_le_bytes(buf);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_vector_product() {
        let m = Matrix::from_array([[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]);

        let res = m.mul_vec(&[1.0, -1.0]).unwrap();
        assert_eq!(res, vec![-1.0, -1.0, -1.0]);
    }

    #[test]
    fn transposed_product() {
        let m = Matrix::from_array([[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]);

        let res = m.tmul_vec(&[1.0, 1.0, 1.0]).unwrap();
        assert_eq!(res, vec![9.0, 12.0]);
    }

    #[test]
    fn product_dimension_errors() {
        let m = Matrix::from_array([[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]);

        assert!(matches!(m.mul_vec(&[1.0, 1.0, 1.0]), Err(Error::DimensionErr)));
        assert!(matches!(m.tmul_vec(&[1.0, 1.0]), Err(Error::DimensionErr)));
    }

    #[test]
    fn row_and_column_sums() {
        let m = Matrix::from_array([[1.0, 2.0], [3.0, 4.0]]);

        assert_eq!(m.row_sum(0), 3.0);
        assert_eq!(m.row_sum(1), 7.0);
        assert_eq!(m.col_sum(0), 4.0);
        assert_eq!(m.col_sum(1), 6.0);
    }

    #[test]
    fn raw_binary_round_trip() {
        let m = Matrix::from_array([[0.25, -1.5, 3.0], [42.0, 0.0, -0.125]]);

        let mut buf = Vec::new();
        m.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), 6 * 8);

        // The caller supplies the dimensions before loading.
        let mut loaded = Matrix::new(2, 3);
        loaded.read_from(&mut buf.as_slice()).unwrap();
        assert_eq!(loaded, m);
    }
}
