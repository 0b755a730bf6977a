//! The training/inference orchestrator.
//!
//! [`Model`] is the single owner of the active network backend, the dataset
//! reader and the accumulated statistics. It drives the training and testing
//! loops, keeps the confusion matrix up to date after every activation, and
//! derives accuracy/precision/recall/F-measure on demand.

use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::dataset::{DatasetReader, Sample};
use crate::matrix::Matrix;
use crate::network::{self, InitConfig, Network, NetworkKind};
use crate::prelude::*;

/// Loops report progress and check for cancellation once per this many
/// samples, besides the phase boundaries.
const PROGRESS_INTERVAL: u64 = 100;

/// Last-evaluated accuracy above which the model counts as learned.
const LEARNED_ACCURACY: f64 = 0.5;

/// Cooperative cancellation handle for the train/test loops.
///
/// Clone it into whatever owns the UI; the loop checks it between samples
/// and never preempts mid-sample.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Training schedule: epochs over the dataset, partitioned into batches.
///
/// A batch here is a partition of one epoch into alternating evaluate/train
/// phases, not a parallel mini-batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LearnConfig {
    pub num_epochs: u32,
    pub num_batches: u32,
}

impl LearnConfig {
    pub fn new(num_epochs: u32, num_batches: u32) -> Self {
        Self {
            num_epochs,
            num_batches,
        }
    }
}

/// Accumulated evaluation statistics.
///
/// Only `count`, `count_success` and the confusion matrix accumulate; the
/// derived metrics are recomputed by [`Model::evaluate_err`] and may be
/// non-finite when no samples were counted.
#[derive(Debug, Clone)]
pub struct ErrorStats {
    pub count: u64,
    pub count_success: u64,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f_measure: f64,
    /// Cell (predicted, actual) counts samples; the total equals `count`.
    pub confusion: Matrix,
    pub elapsed: Duration,
    reset_at: Instant,
}

impl ErrorStats {
    fn new(num_outputs: usize) -> Self {
        Self {
            count: 0,
            count_success: 0,
            accuracy: 0.0,
            precision: 0.0,
            recall: 0.0,
            f_measure: 0.0,
            confusion: Matrix::new(num_outputs, num_outputs),
            elapsed: Duration::ZERO,
            reset_at: Instant::now(),
        }
    }
}

/// Coarse lifecycle state, derived fresh on every query.
///
/// This is a projection of the current fields, not stored truth: it can
/// regress, e.g. after statistics are reset or a harder dataset is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ModelState {
    Empty,
    Initialized,
    DatasetReady,
    Learned,
}

pub struct Model {
    network: Option<Box<dyn Network>>,
    reader: Option<DatasetReader>,
    input: Vec<f64>,
    target: Vec<f64>,
    output: Vec<f64>,
    err: ErrorStats,
    snapshots: Vec<ErrorStats>,
}

impl Model {
    pub fn new() -> Self {
        Self {
            network: None,
            reader: None,
            input: Vec::new(),
            target: Vec::new(),
            output: Vec::new(),
            err: ErrorStats::new(0),
            snapshots: Vec::new(),
        }
    }

    /// Discards any existing backend and builds a fresh one of the
    /// configured kind. Statistics reset, the current sample clears.
    pub fn init_network(&mut self, config: &InitConfig) -> Result<()> {
        self.network = Some(network::build_network(config)?);
        self.input.clear();
        self.target.clear();
        self.output.clear();
        self.reset_err();
        info!(
            "initialized {:?} network: {} inputs, {}x{} hidden, {} outputs",
            config.kind,
            config.num_inputs,
            config.num_hidden_layers,
            config.num_hidden,
            config.num_outputs
        );
        Ok(())
    }

    /// Opens a dataset, reads the first record as the current sample and
    /// activates on it. Returns the pre-scanned sample count.
    pub fn load_dataset(&mut self, path: impl AsRef<Path>) -> Result<u64> {
        let config = self.network.as_ref().ok_or(Error::NoNetwork)?.config();
        let mut reader = DatasetReader::open(path.as_ref(), config.num_outputs as usize)?;
        let sample = reader.read_next()?.ok_or(Error::RewindFailed)?;
        let count = reader.count();

        self.reader = Some(reader);
        self.set_sample(sample);
        self.reset_err();
        self.activate_current()?;

        info!("loaded dataset {:?}: {count} samples", path.as_ref());
        Ok(count)
    }

    /// Reads the next record, wrapping around to the first after the last.
    /// Failing even the rewound read means the dataset is empty or corrupt.
    pub fn advance(&mut self) -> Result<()> {
        let reader = self.reader_mut()?;
        let sample = match reader.read_next()? {
            Some(sample) => sample,
            None => {
                reader.rewind()?;
                reader.read_next()?.ok_or(Error::RewindFailed)?
            }
        };
        self.set_sample(sample);
        self.activate_current()
    }

    /// Trains the backend on the current sample's target, then advances.
    pub fn train_step(&mut self) -> Result<()> {
        let network = self.network.as_mut().ok_or(Error::NoNetwork)?;
        network.train(&self.target)?;
        self.advance()
    }

    /// Runs the training loop.
    ///
    /// With `num_batches == 1` this iterates `num_epochs × sample_count`
    /// steps and snapshots the statistics once per epoch. With more batches
    /// it alternates evaluate and train phases, snapshotting at each
    /// evaluate-phase boundary, for `(num_batches + 1) × sample_count`
    /// steps total.
    ///
    /// The cancellation token is checked every step; a cancelled loop leaves
    /// partial statistics behind. The final 100% progress notification is
    /// emitted even when cancelled before the first step.
    pub fn train_loop<F>(
        &mut self,
        learn: &LearnConfig,
        cancel: &CancelToken,
        mut on_progress: F,
    ) -> Result<()>
    where
        F: FnMut(u32),
    {
        self.reset_err();
        self.snapshots.clear();
        self.activate_current()?;

        let num_images = self.sample_count();
        info!(
            "training: {} epochs, {} batches over {num_images} samples",
            learn.num_epochs, learn.num_batches
        );

        if learn.num_batches <= 1 {
            let max_count = learn.num_epochs as u64 * num_images;
            for i in 0..max_count {
                if cancel.is_cancelled() {
                    break;
                }
                self.train_step()?;
                if i % PROGRESS_INTERVAL == 0 && i > 0 {
                    self.evaluate_err();
                    on_progress((100 * i / max_count) as u32);
                }
                if i % num_images == 0 && i > 0 {
                    self.evaluate_err();
                    debug!(
                        "epoch boundary at step {i}: accuracy {:.3}",
                        self.err.accuracy
                    );
                    self.snapshots.push(self.err.clone());
                    on_progress((100 * i / max_count) as u32);
                    self.reset_err();
                }
            }
            self.evaluate_err();
            self.snapshots.push(self.err.clone());
        } else {
            let max_count = (1 + learn.num_batches as u64) * num_images;
            let eval_phase_len = num_images / learn.num_batches as u64;
            let mut teach_on = false;
            let mut teach_count = 0;
            let mut eval_count = 0;
            for i in 0..max_count {
                if cancel.is_cancelled() {
                    break;
                }
                if teach_on {
                    let network = self.network.as_mut().ok_or(Error::NoNetwork)?;
                    network.train(&self.target)?;
                    teach_count += 1;
                } else {
                    eval_count += 1;
                }
                if eval_count >= eval_phase_len {
                    eval_count = 0;
                    teach_on = true;
                    self.evaluate_err();
                    debug!(
                        "evaluate phase done at step {i}: accuracy {:.3}",
                        self.err.accuracy
                    );
                    self.snapshots.push(self.err.clone());
                    on_progress((100 * i / max_count) as u32);
                    self.reset_err();
                }
                if teach_count >= num_images {
                    teach_count = 0;
                    teach_on = false;
                    self.reset_err();
                }
                self.advance()?;
                if i % PROGRESS_INTERVAL == 0 && i > 0 {
                    self.evaluate_err();
                    on_progress((100 * i / max_count) as u32);
                }
            }
        }

        on_progress(100);
        Ok(())
    }

    /// Activates (without training) over `percent` of the dataset,
    /// evaluating the running statistics every [`PROGRESS_INTERVAL`] steps.
    ///
    /// The final 100% notification fires only when the loop runs to natural
    /// exhaustion; cancellation skips it.
    pub fn test_loop<F>(&mut self, percent: u32, cancel: &CancelToken, mut on_progress: F) -> Result<()>
    where
        F: FnMut(u32),
    {
        let num_test = self.sample_count() * percent as u64 / 100;
        self.reset_err();
        if self.input.is_empty() {
            return Ok(());
        }
        info!("testing over {num_test} samples");
        self.activate_current()?;

        let mut i = 1;
        while i < num_test && !cancel.is_cancelled() {
            self.advance()?;
            if i % PROGRESS_INTERVAL == 0 {
                self.evaluate_err();
                on_progress((100 * i / num_test) as u32);
            }
            i += 1;
        }
        if i == num_test {
            self.evaluate_err();
            on_progress(100);
        }
        Ok(())
    }

    /// Recomputes the derived metrics from the confusion matrix.
    ///
    /// Classes with an empty column (respectively row) are excluded from the
    /// precision (recall) averaging denominator. With nothing counted the
    /// results are non-finite rather than an error.
    pub fn evaluate_err(&mut self) {
        let classes = self.err.confusion.rows();
        let mut precision = 0.0;
        let mut recall = 0.0;
        let mut empty_cols = 0;
        let mut empty_rows = 0;
        for i in 0..classes {
            let col = self.err.confusion.col_sum(i);
            if col > 0.0 {
                precision += self.err.confusion[(i, i)] / col;
            } else {
                empty_cols += 1;
            }
            let row = self.err.confusion.row_sum(i);
            if row > 0.0 {
                recall += self.err.confusion[(i, i)] / row;
            } else {
                empty_rows += 1;
            }
        }

        self.err.precision = precision / (classes - empty_cols) as f64;
        self.err.recall = recall / (classes - empty_rows) as f64;
        self.err.accuracy = self.err.count_success as f64 / self.err.count as f64;
        self.err.f_measure = 2.0 * self.err.precision * self.err.recall
            / (self.err.precision + self.err.recall);
        self.err.elapsed = self.err.reset_at.elapsed();
    }

    /// Zeroes the counters and the confusion matrix, stamping a fresh reset
    /// time. The matrix is sized to the current network's output count.
    pub fn reset_err(&mut self) {
        self.err = ErrorStats::new(self.num_outputs());
    }

    /// Derives the lifecycle state from the current fields.
    pub fn state(&self) -> ModelState {
        let mut res = ModelState::Empty;
        if self.network.is_some() {
            res = ModelState::Initialized;
        }
        if !self.input.is_empty() {
            res = ModelState::DatasetReady;
        }
        if self.err.accuracy > LEARNED_ACCURACY {
            res = ModelState::Learned;
        }
        res
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.network
            .as_ref()
            .ok_or(Error::NoNetwork)?
            .save(path.as_ref())
    }

    /// Replaces the backend with one rebuilt from a saved configuration,
    /// trusting the caller's kind hint for the payload layout.
    pub fn load_configuration(&mut self, path: impl AsRef<Path>, kind: NetworkKind) -> Result<()> {
        self.network = Some(network::load_network(path.as_ref(), kind)?);
        self.reset_err();
        Ok(())
    }

    /// Discards the backend, the dataset and the current sample, returning
    /// the model to its empty state.
    pub fn reset_configuration(&mut self) {
        self.network = None;
        self.reader = None;
        self.input.clear();
        self.target.clear();
        self.output.clear();
        self.reset_err();
    }

    /// Activates on an externally supplied sample, e.g. a hand-drawn bitmap
    /// resampled to the input size. The dataset target is cleared so the
    /// external activation never counts into the confusion matrix.
    pub fn set_external_input(&mut self, pixels: Vec<f64>) -> Result<()> {
        self.input = pixels;
        self.target.clear();
        self.activate_current()
    }

    pub fn output(&self) -> &[f64] {
        &self.output
    }

    pub fn current_input(&self) -> &[f64] {
        &self.input
    }

    /// Zero-based class index of the current sample, if one is loaded.
    pub fn current_label(&self) -> Option<usize> {
        if self.target.is_empty() {
            None
        } else {
            Some(argmax(&self.target))
        }
    }

    pub fn stats(&self) -> &ErrorStats {
        &self.err
    }

    /// Statistics snapshots recorded at epoch/phase boundaries of the last
    /// training loop.
    pub fn snapshots(&self) -> &[ErrorStats] {
        &self.snapshots
    }

    pub fn sample_count(&self) -> u64 {
        self.reader.as_ref().map(|r| r.count()).unwrap_or(0)
    }

    pub fn config(&self) -> Option<InitConfig> {
        self.network.as_ref().map(|n| n.config())
    }

    fn num_outputs(&self) -> usize {
        self.network
            .as_ref()
            .map(|n| n.config().num_outputs as usize)
            .unwrap_or(0)
    }

    fn reader_mut(&mut self) -> Result<&mut DatasetReader> {
        self.reader.as_mut().ok_or_else(|| {
            Error::Io(io::Error::new(io::ErrorKind::NotFound, "no dataset loaded"))
        })
    }

    fn set_sample(&mut self, sample: Sample) {
        self.input = sample.input;
        self.target = sample.target;
        normalize_input(&mut self.input);
    }

    /// Runs the backend on the current input and folds the result into the
    /// running statistics.
    fn activate_current(&mut self) -> Result<()> {
        let network = self.network.as_mut().ok_or(Error::NoNetwork)?;
        network.activate(&self.input)?;
        self.output = network.output();
        self.update_err_data();
        Ok(())
    }

    fn update_err_data(&mut self) {
        if self.target.is_empty() {
            return;
        }
        self.err.count += 1;
        let actual = argmax(&self.target);
        let predicted = argmax(&self.output);
        if actual == predicted {
            self.err.count_success += 1;
        }
        self.err.confusion[(predicted, actual)] += 1.0;
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

/// Index of the first greatest element.
fn argmax(values: &[f64]) -> usize {
    let mut res = 0;
    for (i, &x) in values.iter().enumerate() {
        if x > values[res] {
            res = i;
        }
    }
    res
}

/// Min-max rescales the input in place. A constant vector maps to all
/// zeros; there is no division by zero.
fn normalize_input(input: &mut [f64]) {
    let max = input.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let min = input.iter().cloned().fold(f64::INFINITY, f64::min);
    if max > min {
        for x in input {
            *x = (*x - min) / (max - min);
        }
    } else {
        for x in input {
            *x = 0.0;
        }
    }
}
