//! identifier.rs
//! Random-variable identity: a generating function plus hashable arguments.

use super::{World, WorldError};
use crate::distributions::Distribution;
use crate::tensor::Tensor;
use ordered_float::OrderedFloat;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Hashable argument to a random-variable function.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArgValue {
    Bool(bool),
    Int(i64),
    Float(OrderedFloat<f64>),
    Str(String),
}

impl From<bool> for ArgValue {
    fn from(v: bool) -> Self { ArgValue::Bool(v) }
}
impl From<i64> for ArgValue {
    fn from(v: i64) -> Self { ArgValue::Int(v) }
}
impl From<f64> for ArgValue {
    fn from(v: f64) -> Self { ArgValue::Float(OrderedFloat(v)) }
}
impl From<&str> for ArgValue {
    fn from(v: &str) -> Self { ArgValue::Str(v.to_string()) }
}

impl ArgValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ArgValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            ArgValue::Int(i) => Some(*i as f64),
            ArgValue::Float(f) => Some(f.into_inner()),
            ArgValue::Str(_) => None,
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Bool(b) => write!(f, "{}", b),
            ArgValue::Int(i) => write!(f, "{}", i),
            ArgValue::Float(x) => write!(f, "{:?}", x.into_inner()),
            ArgValue::Str(s) => write!(f, "{:?}", s),
        }
    }
}

/// Model code: reads upstream random variables through the `Sampler` and
/// returns the distribution of this one.
pub type GeneratingFn = dyn Fn(&mut Sampler<'_>, &[ArgValue]) -> Result<Distribution, WorldError>;

/// A named random-variable function. Identity is the name.
#[derive(Clone)]
pub struct RandomVariable {
    name: Arc<str>,
    function: Arc<GeneratingFn>,
}

impl RandomVariable {
    pub fn new(
        name: &str,
        function: impl Fn(&mut Sampler<'_>, &[ArgValue]) -> Result<Distribution, WorldError> + 'static,
    ) -> Self {
        Self { name: Arc::from(name), function: Arc::new(function) }
    }

    pub fn name(&self) -> &str { &self.name }

    /// The identity of this function applied to no arguments.
    pub fn id(&self) -> RVIdentifier { self.call(Vec::new()) }

    pub fn with_arg(&self, arg: impl Into<ArgValue>) -> RVIdentifier { self.call(vec![arg.into()]) }

    pub fn call(&self, arguments: Vec<ArgValue>) -> RVIdentifier {
        RVIdentifier { function: self.clone(), arguments: Arc::from(arguments) }
    }
}

impl fmt::Debug for RandomVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "RandomVariable({})", self.name) }
}

/// `(function, arguments)`: the stable key of a `Variable` in the world.
#[derive(Clone)]
pub struct RVIdentifier {
    function: RandomVariable,
    arguments: Arc<[ArgValue]>,
}

impl RVIdentifier {
    pub fn name(&self) -> &str { self.function.name() }
    pub fn arguments(&self) -> &[ArgValue] { &self.arguments }
    pub(crate) fn generating_fn(&self) -> Arc<GeneratingFn> { Arc::clone(&self.function.function) }
}

impl PartialEq for RVIdentifier {
    fn eq(&self, other: &Self) -> bool { self.name() == other.name() && self.arguments == other.arguments }
}

impl Eq for RVIdentifier {}

impl Hash for RVIdentifier {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name().hash(state);
        self.arguments.hash(state);
    }
}

impl fmt::Display for RVIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args: Vec<String> = self.arguments.iter().map(ArgValue::to_string).collect();
        write!(f, "{}({})", self.name(), args.join(", "))
    }
}

impl fmt::Debug for RVIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self) }
}

/// Handle passed to generating functions. Every read registers the variable
/// being read as a parent of the one being generated.
pub struct Sampler<'w> {
    pub(super) world: &'w mut World,
}

impl Sampler<'_> {
    pub fn sample(&mut self, rv: &RVIdentifier) -> Result<Tensor, WorldError> { self.world.update_graph(rv) }

    /// Reads a single-element random variable as a float.
    pub fn value(&mut self, rv: &RVIdentifier) -> Result<f64, WorldError> { Ok(self.sample(rv)?.item()?) }
}
