//! set.rs
//! Value-identity for tensors: two tensors are the same key when shape and
//! every element agree bitwise.

use super::Tensor;
use indexmap::IndexMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TensorKey {
    shape: Vec<usize>,
    bits: Vec<u64>,
}

impl TensorKey {
    pub fn of(tensor: &Tensor) -> Self {
        let bits = tensor
            .data()
            .iter()
            .map(|&x| {
                // -0.0 and 0.0 compare equal; fold NaN payloads together
                if x == 0.0 {
                    0.0f64.to_bits()
                } else if x.is_nan() {
                    f64::NAN.to_bits()
                } else {
                    x.to_bits()
                }
            })
            .collect();
        Self { shape: tensor.shape().to_vec(), bits }
    }
}

impl From<&Tensor> for TensorKey {
    fn from(t: &Tensor) -> Self { Self::of(t) }
}

/// Insertion-ordered set of tensors, deduplicated by value.
#[derive(Debug, Clone, Default)]
pub struct SetOfTensors {
    items: IndexMap<TensorKey, Tensor>,
}

impl SetOfTensors {
    pub fn new() -> Self { Self::default() }
    pub fn len(&self) -> usize { self.items.len() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    /// Returns `true` if the value was not already present.
    pub fn insert(&mut self, tensor: Tensor) -> bool {
        let key = TensorKey::of(&tensor);
        if self.items.contains_key(&key) {
            return false;
        }
        self.items.insert(key, tensor);
        true
    }

    pub fn contains(&self, tensor: &Tensor) -> bool { self.items.contains_key(&TensorKey::of(tensor)) }
    pub fn iter(&self) -> impl Iterator<Item = &Tensor> { self.items.values() }
}

impl FromIterator<Tensor> for SetOfTensors {
    fn from_iter<I: IntoIterator<Item = Tensor>>(iter: I) -> Self {
        let mut set = Self::new();
        for t in iter {
            set.insert(t);
        }
        set
    }
}

impl fmt::Display for SetOfTensors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut lines: Vec<String> = self.items.values().map(Tensor::to_string).collect();
        lines.sort();
        write!(f, "{}", lines.join("\n"))
    }
}
