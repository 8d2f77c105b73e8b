//! Layered tanh feed-forward controllers for blobsim agents.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Every freshly drawn weight and bias falls in `[-INIT_SPAN, INIT_SPAN)`.
const INIT_SPAN: f32 = 0.2;

fn init_value<R: Rng>(rng: &mut R) -> f32 {
    rng.random::<f32>() * (2.0 * INIT_SPAN) - INIT_SPAN
}

/// One dense layer: `outputs x inputs` weights in row-major order plus a
/// bias per output node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Layer {
    inputs: usize,
    outputs: usize,
    weights: Vec<f32>,
    biases: Vec<f32>,
}

impl Layer {
    fn random<R: Rng>(inputs: usize, outputs: usize, rng: &mut R) -> Self {
        let mut weights = Vec::with_capacity(inputs * outputs);
        for _ in 0..inputs * outputs {
            weights.push(init_value(rng));
        }
        let mut biases = Vec::with_capacity(outputs);
        for _ in 0..outputs {
            biases.push(init_value(rng));
        }
        Self {
            inputs,
            outputs,
            weights,
            biases,
        }
    }

    fn forward(&self, inputs: &[f32]) -> Vec<f32> {
        let mut activations = Vec::with_capacity(self.outputs);
        for node in 0..self.outputs {
            let row_start = node * self.inputs;
            let row = &self.weights[row_start..row_start + self.inputs];
            let mut sum = self.biases[node];
            for (weight, input) in row.iter().zip(inputs) {
                sum += weight * input;
            }
            activations.push(sum.tanh());
        }
        activations
    }
}

/// Stateless layered network squashing every computed layer through `tanh`.
///
/// Weights are the unit of heredity between agents; biases always stay with
/// the individual that drew them at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeuralController {
    layers: Vec<Layer>,
}

impl NeuralController {
    /// Build a randomly initialized controller over the given layer sizes,
    /// input width first and output width last.
    #[must_use]
    pub fn random<R: Rng>(layer_sizes: &[usize], rng: &mut R) -> Self {
        let mut layers = Vec::with_capacity(layer_sizes.len().saturating_sub(1));
        for pair in layer_sizes.windows(2) {
            layers.push(Layer::random(pair[0], pair[1], rng));
        }
        Self { layers }
    }

    /// Number of values the controller expects as input.
    #[must_use]
    pub fn input_len(&self) -> usize {
        self.layers.first().map_or(0, |layer| layer.inputs)
    }

    /// Number of values one forward pass produces.
    #[must_use]
    pub fn output_len(&self) -> usize {
        self.layers.last().map_or(0, |layer| layer.outputs)
    }

    /// Evaluate the network. Inputs beyond the first layer's width are
    /// ignored; missing inputs contribute nothing to the weighted sums.
    #[must_use]
    pub fn forward(&self, inputs: &[f32]) -> Vec<f32> {
        let mut activations = inputs.to_vec();
        for layer in &self.layers {
            activations = layer.forward(&activations);
        }
        activations
    }

    /// Replace every weight with the parent's value plus a uniform
    /// perturbation in `[-rate / 2, rate / 2)`. Biases are left untouched,
    /// so a clone keeps the fresh biases drawn at its own construction.
    pub fn inherit_weights<R: Rng>(&mut self, parent: &Self, mutation_rate: f32, rng: &mut R) {
        for (layer, parent_layer) in self.layers.iter_mut().zip(&parent.layers) {
            for (weight, parent_weight) in layer.weights.iter_mut().zip(&parent_layer.weights) {
                *weight = parent_weight + (rng.random::<f32>() - 0.5) * mutation_rate;
            }
        }
    }
}
