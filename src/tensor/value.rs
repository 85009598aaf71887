//! value.rs
//! Row-major f64 tensor with numpy-style broadcasting and torch-style printing.

use super::TensorError;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl Tensor {
    pub fn new(shape: Vec<usize>, data: Vec<f64>) -> Result<Self, TensorError> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(TensorError::InvalidShape { shape, len: data.len() });
        }
        Ok(Self { shape, data })
    }

    /// Zero-dimensional tensor.
    pub fn scalar(value: f64) -> Self { Self { shape: Vec::new(), data: vec![value] } }
    pub fn vector(values: Vec<f64>) -> Self { Self { shape: vec![values.len()], data: values } }
    pub fn empty() -> Self { Self::vector(Vec::new()) }

    pub fn matrix(rows: Vec<Vec<f64>>) -> Result<Self, TensorError> {
        let cols = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != cols) {
            return Err(TensorError::RaggedRows);
        }
        let shape = vec![rows.len(), cols];
        Ok(Self { shape, data: rows.into_iter().flatten().collect() })
    }

    pub fn shape(&self) -> &[usize] { &self.shape }
    pub fn data(&self) -> &[f64] { &self.data }
    pub fn numel(&self) -> usize { self.data.len() }
    pub fn sum(&self) -> f64 { self.data.iter().sum() }

    pub fn item(&self) -> Result<f64, TensorError> {
        match self.data.as_slice() {
            [x] => Ok(*x),
            _ => Err(TensorError::NotAScalar { numel: self.data.len() }),
        }
    }

    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self { shape: self.shape.clone(), data: self.data.iter().map(|&x| f(x)).collect() }
    }

    /// Applies `f` elementwise after broadcasting both operands to a common shape.
    pub fn zip_with(&self, other: &Tensor, f: impl Fn(f64, f64) -> f64) -> Result<Self, TensorError> {
        if self.shape == other.shape {
            let data = self.data.iter().zip(&other.data).map(|(&a, &b)| f(a, b)).collect();
            return Ok(Self { shape: self.shape.clone(), data });
        }

        let shape = broadcast_shape(&self.shape, &other.shape).ok_or_else(|| TensorError::ShapeMismatch {
            lhs: self.shape.clone(),
            rhs: other.shape.clone(),
        })?;
        let lhs_strides = broadcast_strides(&self.shape, &shape);
        let rhs_strides = broadcast_strides(&other.shape, &shape);
        let numel: usize = shape.iter().product();

        let mut data = Vec::with_capacity(numel);
        let mut index = vec![0usize; shape.len()];
        for _ in 0..numel {
            let l: usize = index.iter().zip(&lhs_strides).map(|(i, s)| i * s).sum();
            let r: usize = index.iter().zip(&rhs_strides).map(|(i, s)| i * s).sum();
            data.push(f(self.data[l], other.data[r]));

            // Odometer increment over the output shape
            for axis in (0..shape.len()).rev() {
                index[axis] += 1;
                if index[axis] < shape[axis] {
                    break;
                }
                index[axis] = 0;
            }
        }
        Ok(Self { shape, data })
    }

    pub fn add(&self, other: &Tensor) -> Result<Self, TensorError> { self.zip_with(other, |a, b| a + b) }
    pub fn sub(&self, other: &Tensor) -> Result<Self, TensorError> { self.zip_with(other, |a, b| a - b) }
    pub fn mul(&self, other: &Tensor) -> Result<Self, TensorError> { self.zip_with(other, |a, b| a * b) }
    pub fn div(&self, other: &Tensor) -> Result<Self, TensorError> { self.zip_with(other, |a, b| a / b) }

    /// Euclidean distance between two tensors of identical shape.
    pub fn dist(&self, other: &Tensor) -> Result<f64, TensorError> {
        if self.shape != other.shape {
            return Err(TensorError::ShapeMismatch { lhs: self.shape.clone(), rhs: other.shape.clone() });
        }
        let sq: f64 = self.data.iter().zip(&other.data).map(|(a, b)| (a - b) * (a - b)).sum();
        Ok(sq.sqrt())
    }
}

impl From<f64> for Tensor {
    fn from(value: f64) -> Self { Self::scalar(value) }
}

fn broadcast_shape(a: &[usize], b: &[usize]) -> Option<Vec<usize>> {
    let rank = a.len().max(b.len());
    let dim = |s: &[usize], i: usize| if i < rank - s.len() { 1 } else { s[i - (rank - s.len())] };
    (0..rank)
        .map(|i| match (dim(a, i), dim(b, i)) {
            (x, y) if x == y => Some(x),
            (1, y) => Some(y),
            (x, 1) => Some(x),
            _ => None,
        })
        .collect()
}

/// Strides of `shape` viewed through the broadcast `target`; stretched axes get stride 0.
fn broadcast_strides(shape: &[usize], target: &[usize]) -> Vec<usize> {
    let offset = target.len() - shape.len();
    let mut strides = vec![0; target.len()];
    let mut stride = 1;
    for i in (0..shape.len()).rev() {
        if shape[i] != 1 {
            strides[i + offset] = stride;
        }
        stride *= shape[i];
    }
    strides
}

// --- Display ---

fn format_cells(data: &[f64]) -> Vec<String> {
    let integral = data.iter().all(|x| !x.is_finite() || x.fract() == 0.0);
    let cells: Vec<String> = data
        .iter()
        .map(|&x| {
            if x.is_nan() {
                "nan".to_string()
            } else if x.is_infinite() {
                if x > 0.0 { "inf".to_string() } else { "-inf".to_string() }
            } else if integral {
                format!("{:.0}.", x)
            } else {
                format!("{:.4}", x)
            }
        })
        .collect();
    let width = cells.iter().map(String::len).max().unwrap_or(0);
    cells.into_iter().map(|c| format!("{:>width$}", c, width = width)).collect()
}

fn write_block(out: &mut String, shape: &[usize], cells: &[String], depth: usize, rank: usize) {
    out.push('[');
    if shape.len() == 1 {
        out.push_str(&cells.join(", "));
    } else {
        let stride: usize = shape[1..].iter().product();
        for i in 0..shape[0] {
            if i > 0 {
                out.push(',');
                out.push_str(&"\n".repeat(rank - depth - 1));
                // Aligns with the column after "tensor(["
                out.push_str(&" ".repeat(7 + depth + 1));
            }
            write_block(out, &shape[1..], &cells[i * stride..(i + 1) * stride], depth + 1, rank);
        }
    }
    out.push(']');
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cells = format_cells(&self.data);
        let mut body = String::new();
        if self.shape.is_empty() {
            body.push_str(cells.first().map_or("", String::as_str));
        } else {
            write_block(&mut body, &self.shape, &cells, 0, self.shape.len());
        }
        write!(f, "tensor({})", body)
    }
}
