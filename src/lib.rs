//! A letter-recognition MLP training engine.
//!
//! Two interchangeable backpropagation backends — a dense-matrix network and
//! an explicit neuron-graph network — share one behavioral contract behind
//! the [`network::Network`] trait. A streaming [`dataset::DatasetReader`]
//! feeds them normalized pixel samples, and [`model::Model`] owns the whole
//! lifecycle: training and testing loops, the confusion matrix and derived
//! metrics, persistence, and the coarse model state.

pub mod dataset;
pub mod matrix;
pub mod model;
pub mod network;
pub mod prelude;
