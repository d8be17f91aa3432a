//! Feed-forward network with hard threshold activation, plus the uniform
//! random mutation operator that is the entire learning mechanism: clone the
//! best network by descriptor, mutate the clones in place, drive again.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::{error::Error, fmt};

/// Output arity of a control network: forward, left, right, backward.
pub const CONTROL_OUTPUTS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    /// An input vector's length does not match a layer's input size. The call
    /// is rejected; nothing is silently truncated or padded.
    InvalidInputSize {
        layer: usize,
        expected: usize,
        actual: usize,
    },
    /// Topology must name at least an input and an output size.
    TopologyTooShort { actual: usize },
    /// Every layer size in a topology must be positive.
    ZeroLayerSize { layer: usize },
    /// Deserialization found shapes that cannot form a valid network. Nothing
    /// is partially built.
    Malformed(DescriptorError),
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::InvalidInputSize {
                layer,
                expected,
                actual,
            } => write!(
                f,
                "layer {layer} expected {expected} inputs, got {actual}"
            ),
            NetworkError::TopologyTooShort { actual } => write!(
                f,
                "topology needs at least 2 sizes (input and output), got {actual}"
            ),
            NetworkError::ZeroLayerSize { layer } => {
                write!(f, "topology entry {layer} must be positive")
            }
            NetworkError::Malformed(e) => write!(f, "malformed network descriptor: {e}"),
        }
    }
}

impl Error for NetworkError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            NetworkError::Malformed(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DescriptorError> for NetworkError {
    fn from(err: DescriptorError) -> Self {
        NetworkError::Malformed(err)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    NoLayers,
    EmptyWeightMatrix { layer: usize },
    RaggedWeightMatrix { layer: usize },
    EmptyWeightRow { layer: usize },
    BiasLengthMismatch {
        layer: usize,
        expected: usize,
        actual: usize,
    },
    LayerChainMismatch {
        layer: usize,
        expected_inputs: usize,
        actual_inputs: usize,
    },
}

impl fmt::Display for DescriptorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DescriptorError::NoLayers => write!(f, "descriptor has no layers"),
            DescriptorError::EmptyWeightMatrix { layer } => {
                write!(f, "layer {layer} has an empty weight matrix")
            }
            DescriptorError::RaggedWeightMatrix { layer } => {
                write!(f, "layer {layer} has weight rows of unequal length")
            }
            DescriptorError::EmptyWeightRow { layer } => {
                write!(f, "layer {layer} has zero-length weight rows")
            }
            DescriptorError::BiasLengthMismatch {
                layer,
                expected,
                actual,
            } => write!(
                f,
                "layer {layer} has {actual} biases for {expected} outputs"
            ),
            DescriptorError::LayerChainMismatch {
                layer,
                expected_inputs,
                actual_inputs,
            } => write!(
                f,
                "layer {layer} takes {actual_inputs} inputs but the previous layer \
                 produces {expected_inputs} outputs"
            ),
        }
    }
}

impl Error for DescriptorError {}

/// Length mismatch reported by a bare `Layer::evaluate`; the owning network
/// re-tags it with the layer's position in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeMismatch {
    pub expected: usize,
    pub actual: usize,
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// One affine transform plus hard threshold: output j is 1 when the weighted
/// input sum exceeds bias j, else 0. No sigmoid, no clipping; the binary step
/// is the design.
#[derive(Clone, Debug)]
pub struct Layer {
    input_size: usize,
    output_size: usize,
    /// Indexed `[input][output]`.
    weights: Vec<Vec<f32>>,
    biases: Vec<f32>,
    // Introspection caches; no effect on evaluation, excluded from descriptors.
    last_inputs: Vec<f32>,
    last_outputs: Vec<f32>,
}

impl Layer {
    /// Fresh layer with every weight and bias uniform in [-1, 1].
    pub fn random<R: Rng + ?Sized>(input_size: usize, output_size: usize, rng: &mut R) -> Self {
        debug_assert!(input_size > 0 && output_size > 0);
        let weights = (0..input_size)
            .map(|_| {
                (0..output_size)
                    .map(|_| rng.random_range(-1.0f32..=1.0))
                    .collect()
            })
            .collect();
        let biases = (0..output_size)
            .map(|_| rng.random_range(-1.0f32..=1.0))
            .collect();
        Self {
            input_size,
            output_size,
            weights,
            biases,
            last_inputs: Vec::new(),
            last_outputs: Vec::new(),
        }
    }

    /// Shapes must already be validated (descriptor path).
    fn from_parts(weights: Vec<Vec<f32>>, biases: Vec<f32>) -> Self {
        let input_size = weights.len();
        let output_size = biases.len();
        Self {
            input_size,
            output_size,
            weights,
            biases,
            last_inputs: Vec::new(),
            last_outputs: Vec::new(),
        }
    }

    pub fn evaluate(&mut self, inputs: &[f32]) -> Result<&[f32], SizeMismatch> {
        if inputs.len() != self.input_size {
            return Err(SizeMismatch {
                expected: self.input_size,
                actual: inputs.len(),
            });
        }
        self.last_outputs.clear();
        for j in 0..self.output_size {
            let sum: f32 = inputs
                .iter()
                .enumerate()
                .map(|(i, &x)| x * self.weights[i][j])
                .sum();
            self.last_outputs
                .push(if sum > self.biases[j] { 1.0 } else { 0.0 });
        }
        self.last_inputs.clear();
        self.last_inputs.extend_from_slice(inputs);
        Ok(&self.last_outputs)
    }

    fn mutate<R: Rng + ?Sized>(&mut self, rng: &mut R, rate: f32) {
        for row in &mut self.weights {
            for w in row.iter_mut() {
                if rng.random::<f32>() < rate {
                    *w = lerp(*w, rng.random_range(-1.0f32..=1.0), rate);
                }
            }
        }
        for b in &mut self.biases {
            if rng.random::<f32>() < rate {
                *b = lerp(*b, rng.random_range(-1.0f32..=1.0), rate);
            }
        }
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn output_size(&self) -> usize {
        self.output_size
    }

    pub fn weights(&self) -> &[Vec<f32>] {
        &self.weights
    }

    pub fn biases(&self) -> &[f32] {
        &self.biases
    }

    /// Inputs seen by the most recent `evaluate`; empty before the first call.
    pub fn last_inputs(&self) -> &[f32] {
        &self.last_inputs
    }

    pub fn last_outputs(&self) -> &[f32] {
        &self.last_outputs
    }
}

/// Plain value form of a network: weights and biases per layer, nothing else.
/// This is the only wire format; round-tripping it reproduces evaluation
/// exactly (plain floats, no lossy transform).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerDescriptor {
    pub weights: Vec<Vec<f32>>,
    pub biases: Vec<f32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NetworkDescriptor {
    pub layers: Vec<LayerDescriptor>,
}

/// Ordered stack of layers; each layer's output feeds the next layer's input.
#[derive(Clone, Debug)]
pub struct FeedForwardNetwork {
    layers: Vec<Layer>,
}

impl FeedForwardNetwork {
    /// Random network from a topology like `[80, 6, 4]` (sensor rays in,
    /// control channels out).
    pub fn random<R: Rng + ?Sized>(
        topology: &[usize],
        rng: &mut R,
    ) -> Result<Self, NetworkError> {
        if topology.len() < 2 {
            return Err(NetworkError::TopologyTooShort {
                actual: topology.len(),
            });
        }
        if let Some(layer) = topology.iter().position(|&n| n == 0) {
            return Err(NetworkError::ZeroLayerSize { layer });
        }
        let layers = topology
            .windows(2)
            .map(|pair| Layer::random(pair[0], pair[1], rng))
            .collect();
        Ok(Self { layers })
    }

    /// Thread `inputs` through every layer in order. Deterministic for fixed
    /// weights; the only state touched is the per-layer introspection cache.
    pub fn evaluate(&mut self, inputs: &[f32]) -> Result<Vec<f32>, NetworkError> {
        let mut current = inputs.to_vec();
        for (idx, layer) in self.layers.iter_mut().enumerate() {
            let out = layer
                .evaluate(&current)
                .map_err(|e| NetworkError::InvalidInputSize {
                    layer: idx,
                    expected: e.expected,
                    actual: e.actual,
                })?;
            current.clear();
            current.extend_from_slice(out);
        }
        Ok(current)
    }

    /// For every weight and bias independently: with probability `rate`,
    /// replace value `v` with `lerp(v, uniform(-1, 1), rate)`. At rate 1 the
    /// value is fully redrawn; at low rates both the touch probability and the
    /// perturbation magnitude shrink together. The compounding is the mutation
    /// strength knob and is kept as-is.
    pub fn mutate<R: Rng + ?Sized>(&mut self, rng: &mut R, rate: f32) {
        debug_assert!(
            (0.0..=1.0).contains(&rate),
            "mutation rate must lie in [0, 1]"
        );
        for layer in &mut self.layers {
            layer.mutate(rng, rate);
        }
    }

    pub fn input_size(&self) -> usize {
        self.layers[0].input_size
    }

    pub fn output_size(&self) -> usize {
        self.layers[self.layers.len() - 1].output_size
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn to_descriptor(&self) -> NetworkDescriptor {
        NetworkDescriptor {
            layers: self
                .layers
                .iter()
                .map(|layer| LayerDescriptor {
                    weights: layer.weights.clone(),
                    biases: layer.biases.clone(),
                })
                .collect(),
        }
    }

    /// Validate shapes fully before constructing anything.
    pub fn from_descriptor(descriptor: &NetworkDescriptor) -> Result<Self, NetworkError> {
        if descriptor.layers.is_empty() {
            return Err(DescriptorError::NoLayers.into());
        }
        let mut prev_outputs: Option<usize> = None;
        for (idx, layer) in descriptor.layers.iter().enumerate() {
            if layer.weights.is_empty() {
                return Err(DescriptorError::EmptyWeightMatrix { layer: idx }.into());
            }
            let cols = layer.weights[0].len();
            if cols == 0 {
                return Err(DescriptorError::EmptyWeightRow { layer: idx }.into());
            }
            if layer.weights.iter().any(|row| row.len() != cols) {
                return Err(DescriptorError::RaggedWeightMatrix { layer: idx }.into());
            }
            if layer.biases.len() != cols {
                return Err(DescriptorError::BiasLengthMismatch {
                    layer: idx,
                    expected: cols,
                    actual: layer.biases.len(),
                }
                .into());
            }
            if let Some(expected) = prev_outputs {
                if layer.weights.len() != expected {
                    return Err(DescriptorError::LayerChainMismatch {
                        layer: idx,
                        expected_inputs: expected,
                        actual_inputs: layer.weights.len(),
                    }
                    .into());
                }
            }
            prev_outputs = Some(cols);
        }
        let layers = descriptor
            .layers
            .iter()
            .map(|layer| Layer::from_parts(layer.weights.clone(), layer.biases.clone()))
            .collect();
        Ok(Self { layers })
    }
}
