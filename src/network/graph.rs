use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use log::{debug, warn};
use rand::distributions::{Distribution, Uniform};

use super::{
    read_header, read_weights, sigmoid, write_header, write_weights, InitConfig, Network,
    NetworkKind,
};
use crate::prelude::*;

const LEARNING_RATE: f64 = 0.07;
const MOMENTUM: f64 = 0.0;

/// Arena address of a neuron: (layer, index within the layer).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NeuronRef {
    layer: usize,
    index: usize,
}

/// Downstream edge of a neuron. `slot` is the producer's position in the
/// consumer's input list; it is stored explicitly because the backward
/// weight lookup must never rely on incidental ordering.
#[derive(Debug, Clone, Copy)]
struct Consumer {
    layer: usize,
    index: usize,
    slot: usize,
}

#[derive(Debug, Clone)]
struct Neuron {
    weights: Vec<f64>,
    /// Per-weight update accumulator, carried across steps for momentum.
    deltas: Vec<f64>,
    inputs: Vec<NeuronRef>,
    consumers: Vec<Consumer>,
    sum: f64,
    out: f64,
    dout: f64,
    delta: f64,
}

impl Neuron {
    /// Input-layer neuron: a single identity weight over the raw scalar.
    fn pass_through() -> Self {
        Self {
            weights: vec![1.0],
            deltas: vec![0.0],
            inputs: Vec::new(),
            consumers: Vec::new(),
            sum: 0.0,
            out: 0.0,
            dout: 0.0,
            delta: 0.0,
        }
    }

    /// Neuron fully connected to every neuron of the previous layer, with
    /// uniformly random weights in [-1, 1].
    fn connected(prev_layer: usize, prev_size: usize) -> Self {
        let mut rng = rand::thread_rng();
        let die = Uniform::from(-1.0..=1.0);

        Self {
            weights: (0..prev_size).map(|_| die.sample(&mut rng)).collect(),
            deltas: vec![0.0; prev_size],
            inputs: (0..prev_size)
                .map(|index| NeuronRef {
                    layer: prev_layer,
                    index,
                })
                .collect(),
            consumers: Vec::new(),
            sum: 0.0,
            out: 0.0,
            dout: 0.0,
            delta: 0.0,
        }
    }

    fn activate_from(&mut self, sum: f64) {
        self.sum = sum;
        self.out = sigmoid(self.sum);
        self.dout = self.out * (1.0 - self.out);
    }
}

/// Neuron-graph backpropagation engine, functionally equivalent to
/// [`super::MatrixNetwork`].
///
/// Neurons live in an arena of layers and reference each other by (layer,
/// index) pairs: layer `0` holds the input pass-throughs, layers `1..=L`
/// the hidden neurons, layer `L+1` the outputs. Consumer lists exist only
/// for the backward error flow.
pub struct GraphNetwork {
    num_inputs: usize,
    num_hidden_layers: usize,
    num_hidden: usize,
    num_outputs: usize,
    rate: f64,
    momentum: f64,
    layers: Vec<Vec<Neuron>>,
}

impl GraphNetwork {
    pub fn new(config: &InitConfig) -> Result<Self> {
        config.validate()?;

        let num_inputs = config.num_inputs as usize;
        let num_hidden_layers = config.num_hidden_layers as usize;
        let num_hidden = config.num_hidden as usize;
        let num_outputs = config.num_outputs as usize;

        let mut layers: Vec<Vec<Neuron>> = Vec::with_capacity(num_hidden_layers + 2);
        layers.push((0..num_inputs).map(|_| Neuron::pass_through()).collect());
        for layer in 1..=num_hidden_layers {
            let prev_size = layers[layer - 1].len();
            layers.push(
                (0..num_hidden)
                    .map(|_| Neuron::connected(layer - 1, prev_size))
                    .collect(),
            );
        }
        layers.push(
            (0..num_outputs)
                .map(|_| Neuron::connected(num_hidden_layers, num_hidden))
                .collect(),
        );

        // Wire the reverse consumer lists so every producer knows, in order,
        // each consumer that reads it and the slot it occupies there.
        for layer in 1..layers.len() {
            for index in 0..layers[layer].len() {
                for slot in 0..layers[layer][index].inputs.len() {
                    let upstream = layers[layer][index].inputs[slot];
                    layers[upstream.layer][upstream.index]
                        .consumers
                        .push(Consumer { layer, index, slot });
                }
            }
        }

        Ok(Self {
            num_inputs,
            num_hidden_layers,
            num_hidden,
            num_outputs,
            rate: LEARNING_RATE,
            momentum: MOMENTUM,
            layers,
        })
    }

    /// Overrides the fixed learning rate.
    pub fn with_rate(mut self, rate: f64) -> Self {
        self.rate = rate;
        self
    }

    /// Overrides the momentum factor. The default of 0 leaves the momentum
    /// term in the update formula inert.
    pub fn with_momentum(mut self, momentum: f64) -> Self {
        self.momentum = momentum;
        self
    }

    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        let header = read_header(&mut reader)?;
        if header.kind == NetworkKind::Matrix {
            warn!("loading a graph network from a file flagged as matrix");
        }

        let mut res = Self::new(&header)?;
        for layer in 1..res.layers.len() {
            for neuron in &mut res.layers[layer] {
                read_weights(&mut reader, &mut neuron.weights)?;
            }
        }
        Ok(res)
    }
}

impl Network for GraphNetwork {
    fn activate(&mut self, input: &[f64]) -> Result<()> {
        if input.len() != self.num_inputs {
            return Err(Error::DimensionErr);
        }

        for (neuron, &x) in self.layers[0].iter_mut().zip(input) {
            let sum = neuron.weights[0] * x;
            neuron.activate_from(sum);
        }
        for layer in 1..self.layers.len() {
            let prev: Vec<f64> = self.layers[layer - 1].iter().map(|n| n.out).collect();
            for neuron in &mut self.layers[layer] {
                let mut sum = 0.0;
                for (weight, upstream) in neuron.weights.iter().zip(&neuron.inputs) {
                    sum += weight * prev[upstream.index];
                }
                neuron.activate_from(sum);
            }
        }
        Ok(())
    }

    fn train(&mut self, target: &[f64]) -> Result<()> {
        if target.len() != self.num_outputs {
            return Err(Error::DimensionErr);
        }

        let last = self.layers.len() - 1;
        for (neuron, &t) in self.layers[last].iter_mut().zip(target) {
            neuron.delta = (t - neuron.out) * neuron.dout;
        }
        for layer in (0..last).rev() {
            let (lower, upper) = self.layers.split_at_mut(layer + 1);
            for neuron in lower[layer].iter_mut() {
                let mut delta = 0.0;
                for c in &neuron.consumers {
                    let consumer = &upper[c.layer - layer - 1][c.index];
                    delta += consumer.weights[c.slot] * consumer.delta;
                }
                neuron.delta = delta * neuron.dout;
            }
        }

        // Weight refresh walks output first, then hidden layers high to low.
        // Input pass-throughs keep their identity weight.
        for layer in (1..=last).rev() {
            let prev: Vec<f64> = self.layers[layer - 1].iter().map(|n| n.out).collect();
            let (rate, momentum) = (self.rate, self.momentum);
            for neuron in &mut self.layers[layer] {
                for i in 0..neuron.weights.len() {
                    let upstream = prev[neuron.inputs[i].index];
                    neuron.deltas[i] = neuron.deltas[i] * momentum + rate * neuron.delta * upstream;
                    neuron.weights[i] += neuron.deltas[i];
                }
            }
        }
        Ok(())
    }

    fn output(&self) -> Vec<f64> {
        self.layers[self.layers.len() - 1]
            .iter()
            .map(|n| n.out)
            .collect()
    }

    fn config(&self) -> InitConfig {
        InitConfig {
            num_inputs: self.num_inputs as u32,
            num_hidden_layers: self.num_hidden_layers as u32,
            num_hidden: self.num_hidden as u32,
            num_outputs: self.num_outputs as u32,
            kind: NetworkKind::Graph,
        }
    }

    fn save(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        write_header(&mut writer, &self.config())?;
        // Per-neuron weight vectors flattened in construction order: hidden
        // layers low to high, then the output layer.
        for layer in 1..self.layers.len() {
            for neuron in &self.layers[layer] {
                write_weights(&mut writer, &neuron.weights)?;
            }
        }
        debug!("saved graph network to {path:?}");
        Ok(())
    }
}
