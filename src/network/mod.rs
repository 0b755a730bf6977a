//! Feed-forward network backends.
//!
//! Two engines implement the same contract: [`MatrixNetwork`] keeps a weight
//! matrix per layer, [`GraphNetwork`] keeps explicit neurons linked by
//! arena indices. Either can be saved and reloaded; both write the same
//! fixed header followed by a topology-ordered weight payload, so the files
//! differ only in payload layout.

pub mod graph;
pub mod matrix;

use std::io::{Read, Write};
use std::path::Path;

use crate::prelude::*;

pub use self::graph::GraphNetwork;
pub use self::matrix::MatrixNetwork;

pub const MIN_HIDDEN_LAYERS: u32 = 1;
pub const MAX_HIDDEN_LAYERS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkKind {
    Matrix,
    Graph,
}

/// Layer-size configuration fixing a network's structure. Immutable once a
/// backend is built from it; changing topology means rebuilding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitConfig {
    pub num_inputs: u32,
    pub num_hidden_layers: u32,
    pub num_hidden: u32,
    pub num_outputs: u32,
    pub kind: NetworkKind,
}

impl InitConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_inputs == 0 || self.num_hidden == 0 || self.num_outputs == 0 {
            return Err(Error::DimensionErr);
        }
        if !(MIN_HIDDEN_LAYERS..=MAX_HIDDEN_LAYERS).contains(&self.num_hidden_layers) {
            return Err(Error::DimensionErr);
        }
        Ok(())
    }
}

/// The shared operation set of the two backends. The orchestrator never
/// assumes a concrete type beyond this contract.
pub trait Network {
    /// Propagates an input through the network, caching per-layer values.
    fn activate(&mut self, input: &[f64]) -> Result<()>;

    /// Backpropagates toward a one-hot target and applies the weight update.
    fn train(&mut self, target: &[f64]) -> Result<()>;

    /// The output-layer activations of the last `activate` call.
    fn output(&self) -> Vec<f64>;

    fn config(&self) -> InitConfig;

    fn save(&self, path: &Path) -> Result<()>;
}

/// Builds a freshly-initialized backend of the configured kind.
pub fn build_network(config: &InitConfig) -> Result<Box<dyn Network>> {
    Ok(match config.kind {
        NetworkKind::Matrix => Box::new(MatrixNetwork::new(config)?),
        NetworkKind::Graph => Box::new(GraphNetwork::new(config)?),
    })
}

/// Loads a saved configuration, re-deriving the topology from its header.
pub fn load_network(path: &Path, kind: NetworkKind) -> Result<Box<dyn Network>> {
    Ok(match kind {
        NetworkKind::Matrix => Box::new(MatrixNetwork::load(path)?),
        NetworkKind::Graph => Box::new(GraphNetwork::load(path)?),
    })
}

pub(crate) fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Derivative of the sigmoid expressed through the already-activated value:
/// `a * (1 - a)` instead of recomputing from the raw sum.
pub(crate) fn sigmoid_prime(a_x: f64) -> f64 {
    a_x * (1.0 - a_x)
}

/// Fixed-size saved-configuration header: four u32 topology fields plus an
/// `is_graph` byte padded to four bytes, all little-endian.
pub(crate) fn write_header<W: Write>(w: &mut W, config: &InitConfig) -> Result<()> {
    for field in [
        config.num_inputs,
        config.num_hidden_layers,
        config.num_hidden,
        config.num_outputs,
    ] {
        w.write_all(&field.to_le_bytes())?;
    }
    let is_graph = matches!(config.kind, NetworkKind::Graph) as u8;
    w.write_all(&[is_graph, 0, 0, 0])?;
    Ok(())
}

pub(crate) fn read_header<R: Read>(r: &mut R) -> Result<InitConfig> {
    let mut word = [0u8; 4];
    let mut fields = [0u32; 4];
    for field in &mut fields {
        r.read_exact(&mut word)?;
        *field = u32::from_le_bytes(word);
    }
    r.read_exact(&mut word)?;

    let config = InitConfig {
        num_inputs: fields[0],
        num_hidden_layers: fields[1],
        num_hidden: fields[2],
        num_outputs: fields[3],
        kind: if word[0] != 0 {
            NetworkKind::Graph
        } else {
            NetworkKind::Matrix
        },
    };
    config.validate()?;
    Ok(config)
}

pub(crate) fn write_weights<W: Write>(w: &mut W, weights: &[f64]) -> Result<()> {
    for x in weights {
        w.write_all(&x.to_le_bytes())?;
    }
    Ok(())
}

pub(crate) fn read_weights<R: Read>(r: &mut R, weights: &mut [f64]) -> Result<()> {
    let mut buf = [0u8; 8];
    for x in weights {
        r.read_exact(&mut buf)?;
        *x = f64::from_le_bytes(buf);
    }
    Ok(())
}
