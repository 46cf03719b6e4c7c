// ABOUTME: Matrix and vector arithmetic: shape-checked operations,
// determinants via direct formulas or LU, inverses, dot/cross products

use crate::error::TexprError;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: Vec<Vec<f64>>,
}

impl Matrix {
    /// Build from row data; every row must have the same length.
    pub fn new(rows: Vec<Vec<f64>>) -> Result<Self, TexprError> {
        if rows.is_empty() {
            return Err(TexprError::evaluator("matrix must have at least one row"));
        }
        let width = rows[0].len();
        if width == 0 {
            return Err(TexprError::evaluator("matrix rows must not be empty"));
        }
        if rows.iter().any(|r| r.len() != width) {
            return Err(TexprError::evaluator("matrix rows have differing lengths"));
        }
        Ok(Matrix { rows })
    }

    pub fn identity(n: usize) -> Self {
        let rows = (0..n)
            .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
            .collect();
        Matrix { rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn col_count(&self) -> usize {
        self.rows[0].len()
    }

    pub fn is_square(&self) -> bool {
        self.row_count() == self.col_count()
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.rows[row][col]
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    fn shape_check(&self, other: &Matrix, operation: &str) -> Result<(), TexprError> {
        if self.row_count() != other.row_count() || self.col_count() != other.col_count() {
            return Err(TexprError::evaluator(format!(
                "matrix {operation} requires matching shapes, got {}x{} and {}x{}",
                self.row_count(),
                self.col_count(),
                other.row_count(),
                other.col_count()
            )));
        }
        Ok(())
    }

    pub fn add(&self, other: &Matrix) -> Result<Matrix, TexprError> {
        self.shape_check(other, "addition")?;
        let rows = self
            .rows
            .iter()
            .zip(&other.rows)
            .map(|(a, b)| a.iter().zip(b).map(|(x, y)| x + y).collect())
            .collect();
        Ok(Matrix { rows })
    }

    pub fn sub(&self, other: &Matrix) -> Result<Matrix, TexprError> {
        self.shape_check(other, "subtraction")?;
        let rows = self
            .rows
            .iter()
            .zip(&other.rows)
            .map(|(a, b)| a.iter().zip(b).map(|(x, y)| x - y).collect())
            .collect();
        Ok(Matrix { rows })
    }

    pub fn scale(&self, factor: f64) -> Matrix {
        let rows = self
            .rows
            .iter()
            .map(|row| row.iter().map(|x| x * factor).collect())
            .collect();
        Matrix { rows }
    }

    pub fn mul(&self, other: &Matrix) -> Result<Matrix, TexprError> {
        if self.col_count() != other.row_count() {
            return Err(TexprError::evaluator(format!(
                "matrix product requires inner dimensions to match, got {}x{} and {}x{}",
                self.row_count(),
                self.col_count(),
                other.row_count(),
                other.col_count()
            )));
        }
        let inner = self.col_count();
        let rows = (0..self.row_count())
            .map(|i| {
                (0..other.col_count())
                    .map(|j| (0..inner).map(|k| self.rows[i][k] * other.rows[k][j]).sum())
                    .collect()
            })
            .collect();
        Ok(Matrix { rows })
    }

    /// Integer power: repeated multiplication for n >= 0, inverse for -1.
    pub fn pow(&self, exponent: i64) -> Result<Matrix, TexprError> {
        if !self.is_square() {
            return Err(TexprError::evaluator("matrix power requires a square matrix"));
        }
        if exponent == -1 {
            return self.inverse();
        }
        if exponent < 0 {
            return Err(TexprError::evaluator(
                "negative matrix powers other than -1 are not supported",
            ));
        }
        let mut result = Matrix::identity(self.row_count());
        for _ in 0..exponent {
            result = result.mul(self)?;
        }
        Ok(result)
    }

    pub fn trace(&self) -> Result<f64, TexprError> {
        if !self.is_square() {
            return Err(TexprError::evaluator("trace requires a square matrix"));
        }
        Ok((0..self.row_count()).map(|i| self.rows[i][i]).sum())
    }

    /// Determinant: direct formulas through 3x3, LU with partial pivoting
    /// beyond.
    pub fn determinant(&self) -> Result<f64, TexprError> {
        if !self.is_square() {
            return Err(TexprError::evaluator("determinant requires a square matrix"));
        }
        let n = self.row_count();
        let m = &self.rows;
        match n {
            1 => Ok(m[0][0]),
            2 => Ok(m[0][0] * m[1][1] - m[0][1] * m[1][0]),
            3 => Ok(m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
                - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
                + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])),
            _ => self.determinant_lu(),
        }
    }

    fn determinant_lu(&self) -> Result<f64, TexprError> {
        let n = self.row_count();
        let mut work = self.rows.clone();
        let mut det = 1.0;
        for col in 0..n {
            // Partial pivoting: largest magnitude in the column
            let pivot_row = (col..n)
                .max_by(|&a, &b| {
                    work[a][col]
                        .abs()
                        .partial_cmp(&work[b][col].abs())
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .unwrap_or(col);
            if work[pivot_row][col].abs() < 1e-12 {
                return Ok(0.0);
            }
            if pivot_row != col {
                work.swap(pivot_row, col);
                det = -det;
            }
            det *= work[col][col];
            for row in (col + 1)..n {
                let factor = work[row][col] / work[col][col];
                for k in col..n {
                    work[row][k] -= factor * work[col][k];
                }
            }
        }
        Ok(det)
    }

    /// Inverse: adjugate formulas through 3x3, Gauss-Jordan with partial
    /// pivoting beyond. Singular matrices fail.
    pub fn inverse(&self) -> Result<Matrix, TexprError> {
        if !self.is_square() {
            return Err(TexprError::evaluator("inverse requires a square matrix"));
        }
        let det = self.determinant()?;
        if det.abs() < 1e-12 {
            return Err(TexprError::evaluator("matrix is singular and has no inverse"));
        }
        let n = self.row_count();
        if n <= 3 {
            return Ok(self.adjugate()?.scale(1.0 / det));
        }

        let mut work: Vec<Vec<f64>> = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let mut extended = row.clone();
                extended.extend((0..n).map(|j| if i == j { 1.0 } else { 0.0 }));
                extended
            })
            .collect();

        for col in 0..n {
            let pivot_row = (col..n)
                .max_by(|&a, &b| {
                    work[a][col]
                        .abs()
                        .partial_cmp(&work[b][col].abs())
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .unwrap_or(col);
            if work[pivot_row][col].abs() < 1e-12 {
                return Err(TexprError::evaluator("matrix is singular and has no inverse"));
            }
            work.swap(pivot_row, col);
            let pivot = work[col][col];
            for value in work[col].iter_mut() {
                *value /= pivot;
            }
            for row in 0..n {
                if row == col {
                    continue;
                }
                let factor = work[row][col];
                for k in 0..(2 * n) {
                    work[row][k] -= factor * work[col][k];
                }
            }
        }

        let rows = work.into_iter().map(|row| row[n..].to_vec()).collect();
        Ok(Matrix { rows })
    }

    fn adjugate(&self) -> Result<Matrix, TexprError> {
        let n = self.row_count();
        let m = &self.rows;
        let rows = match n {
            1 => vec![vec![1.0]],
            2 => vec![
                vec![m[1][1], -m[0][1]],
                vec![-m[1][0], m[0][0]],
            ],
            3 => {
                let cofactor = |r: usize, c: usize| -> f64 {
                    let sub: Vec<f64> = (0..3)
                        .filter(|&i| i != r)
                        .flat_map(|i| (0..3).filter(|&j| j != c).map(move |j| m[i][j]))
                        .collect();
                    let minor = sub[0] * sub[3] - sub[1] * sub[2];
                    if (r + c) % 2 == 0 {
                        minor
                    } else {
                        -minor
                    }
                };
                // Adjugate is the transposed cofactor matrix
                (0..3)
                    .map(|i| (0..3).map(|j| cofactor(j, i)).collect())
                    .collect()
            }
            _ => {
                return Err(TexprError::evaluator(
                    "adjugate inverse only applies through 3x3",
                ))
            }
        };
        Ok(Matrix { rows })
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|x| x.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .collect();
        write!(f, "[{}]", rendered.join("; "))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vector {
    components: Vec<f64>,
}

impl Vector {
    pub fn new(components: Vec<f64>) -> Result<Self, TexprError> {
        if components.is_empty() {
            return Err(TexprError::evaluator("vector must have at least one component"));
        }
        Ok(Vector { components })
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn components(&self) -> &[f64] {
        &self.components
    }

    fn shape_check(&self, other: &Vector, operation: &str) -> Result<(), TexprError> {
        if self.len() != other.len() {
            return Err(TexprError::evaluator(format!(
                "vector {operation} requires matching dimensions, got {} and {}",
                self.len(),
                other.len()
            )));
        }
        Ok(())
    }

    pub fn add(&self, other: &Vector) -> Result<Vector, TexprError> {
        self.shape_check(other, "addition")?;
        Ok(Vector {
            components: self
                .components
                .iter()
                .zip(&other.components)
                .map(|(a, b)| a + b)
                .collect(),
        })
    }

    pub fn sub(&self, other: &Vector) -> Result<Vector, TexprError> {
        self.shape_check(other, "subtraction")?;
        Ok(Vector {
            components: self
                .components
                .iter()
                .zip(&other.components)
                .map(|(a, b)| a - b)
                .collect(),
        })
    }

    pub fn scale(&self, factor: f64) -> Vector {
        Vector {
            components: self.components.iter().map(|x| x * factor).collect(),
        }
    }

    pub fn dot(&self, other: &Vector) -> Result<f64, TexprError> {
        self.shape_check(other, "dot product")?;
        Ok(self
            .components
            .iter()
            .zip(&other.components)
            .map(|(a, b)| a * b)
            .sum())
    }

    /// Cross product, defined for 3-D vectors only.
    pub fn cross(&self, other: &Vector) -> Result<Vector, TexprError> {
        if self.len() != 3 || other.len() != 3 {
            return Err(TexprError::evaluator(
                "cross product is only defined for 3-dimensional vectors",
            ));
        }
        let a = &self.components;
        let b = &other.components;
        Ok(Vector {
            components: vec![
                a[1] * b[2] - a[2] * b[1],
                a[2] * b[0] - a[0] * b[2],
                a[0] * b[1] - a[1] * b[0],
            ],
        })
    }

    pub fn magnitude(&self) -> f64 {
        self.components.iter().map(|x| x * x).sum::<f64>().sqrt()
    }

    pub fn normalized(&self) -> Result<Vector, TexprError> {
        let magnitude = self.magnitude();
        if magnitude == 0.0 {
            return Err(TexprError::evaluator("cannot normalize the zero vector"));
        }
        Ok(self.scale(1.0 / magnitude))
    }
}

impl fmt::Display for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.components.iter().map(|x| x.to_string()).collect();
        write!(f, "<{}>", rendered.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(rows: Vec<Vec<f64>>) -> Matrix {
        Matrix::new(rows).unwrap()
    }

    #[test]
    fn test_ragged_rows_rejected() {
        assert!(Matrix::new(vec![vec![1.0, 2.0], vec![3.0]]).is_err());
    }

    #[test]
    fn test_determinant_2x2() {
        let m = matrix(vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        assert_eq!(m.determinant().unwrap(), -2.0);
    }

    #[test]
    fn test_determinant_3x3() {
        let m = matrix(vec![
            vec![6.0, 1.0, 1.0],
            vec![4.0, -2.0, 5.0],
            vec![2.0, 8.0, 7.0],
        ]);
        assert!((m.determinant().unwrap() - (-306.0)).abs() < 1e-9);
    }

    #[test]
    fn test_determinant_lu_4x4() {
        // Upper triangular: determinant is the diagonal product
        let m = matrix(vec![
            vec![2.0, 1.0, 0.0, 3.0],
            vec![0.0, 3.0, 4.0, 1.0],
            vec![0.0, 0.0, 5.0, 2.0],
            vec![0.0, 0.0, 0.0, 7.0],
        ]);
        assert!((m.determinant().unwrap() - 210.0).abs() < 1e-9);
    }

    #[test]
    fn test_inverse_round_trip() {
        let m = matrix(vec![vec![4.0, 7.0], vec![2.0, 6.0]]);
        let product = m.mul(&m.inverse().unwrap()).unwrap();
        let identity = Matrix::identity(2);
        for i in 0..2 {
            for j in 0..2 {
                assert!((product.get(i, j) - identity.get(i, j)).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_inverse_4x4_round_trip() {
        let m = matrix(vec![
            vec![1.0, 0.0, 2.0, -1.0],
            vec![3.0, 0.0, 0.0, 5.0],
            vec![2.0, 1.0, 4.0, -3.0],
            vec![1.0, 0.0, 5.0, 0.0],
        ]);
        let product = m.mul(&m.inverse().unwrap()).unwrap();
        for i in 0..4 {
            for j in 0..4 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((product.get(i, j) - expected).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_singular_inverse_fails() {
        let m = matrix(vec![vec![1.0, 2.0], vec![2.0, 4.0]]);
        assert!(m.inverse().is_err());
    }

    #[test]
    fn test_matrix_power() {
        let m = matrix(vec![vec![1.0, 1.0], vec![0.0, 1.0]]);
        let cubed = m.pow(3).unwrap();
        assert_eq!(cubed.get(0, 1), 3.0);
        let zeroth = m.pow(0).unwrap();
        assert_eq!(zeroth, Matrix::identity(2));
    }

    #[test]
    fn test_shape_mismatch() {
        let a = matrix(vec![vec![1.0, 2.0]]);
        let b = matrix(vec![vec![1.0], vec![2.0]]);
        assert!(a.add(&b).is_err());
        assert!(a.mul(&b).is_ok());
    }

    #[test]
    fn test_vector_dot_and_cross() {
        let a = Vector::new(vec![1.0, 2.0, 3.0]).unwrap();
        let b = Vector::new(vec![4.0, 5.0, 6.0]).unwrap();
        assert_eq!(a.dot(&b).unwrap(), 32.0);
        let cross = a.cross(&b).unwrap();
        assert_eq!(cross.components(), &[-3.0, 6.0, -3.0]);
    }

    #[test]
    fn test_cross_requires_three_dimensions() {
        let a = Vector::new(vec![1.0, 2.0]).unwrap();
        let b = Vector::new(vec![3.0, 4.0]).unwrap();
        assert!(a.cross(&b).is_err());
    }

    #[test]
    fn test_magnitude_and_normalize() {
        let v = Vector::new(vec![3.0, 4.0]).unwrap();
        assert_eq!(v.magnitude(), 5.0);
        let unit = v.normalized().unwrap();
        assert!((unit.magnitude() - 1.0).abs() < 1e-12);
        assert!(Vector::new(vec![0.0, 0.0]).unwrap().normalized().is_err());
    }
}
