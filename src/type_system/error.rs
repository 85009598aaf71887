//! Defines the error types for the type system module.
use super::lattice::{BmgType, Requirement};
use crate::graph::{ConversionKind, NodeId};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TypeError {
    #[error("Input {slot} of node {consumer:?} has type {found} but {required} is required")]
    Unsatisfiable { consumer: NodeId, slot: usize, found: BmgType, required: Requirement },
    #[error("No conversion produces {target} for input {slot} of node {consumer:?}")]
    NoConversion { consumer: NodeId, slot: usize, target: BmgType },
    #[error("{conversion:?} cannot be applied to a {input} value")]
    IllegalConversion { conversion: ConversionKind, input: BmgType },
    #[error("Constant {value} cannot be represented as {declared}")]
    UnrepresentableConstant { value: String, declared: BmgType },
}
