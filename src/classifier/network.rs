//! Dense inference networks with JSON weight persistence.
//!
//! Classifiers are black-box scoring functions over fixed-shape inputs;
//! the concrete layer composition here is an implementation detail behind
//! that contract. Weights load from JSON artifacts; absent artifacts are
//! handled by callers with deterministic seeded initialization.

use super::ClassifierError;
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A single fully connected layer
#[derive(Debug, Clone)]
pub(crate) struct DenseLayer {
    weights: Array2<f32>,
    bias: Array1<f32>,
}

/// Serialized form of a dense layer
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct LayerSpec {
    pub input_dim: usize,
    pub output_dim: usize,
    pub weights: Vec<f32>,
    pub bias: Vec<f32>,
}

impl DenseLayer {
    /// Xavier-uniform initialization from the given generator
    pub fn seeded(rng: &mut StdRng, input_dim: usize, output_dim: usize) -> Self {
        let limit = (6.0 / (input_dim + output_dim) as f32).sqrt();
        let weights =
            Array2::from_shape_fn((output_dim, input_dim), |_| rng.gen_range(-limit..limit));
        let bias = Array1::zeros(output_dim);
        Self { weights, bias }
    }

    pub fn input_dim(&self) -> usize {
        self.weights.ncols()
    }

    pub fn output_dim(&self) -> usize {
        self.weights.nrows()
    }

    pub fn forward(&self, input: &Array1<f32>) -> Array1<f32> {
        self.weights.dot(input) + &self.bias
    }

    pub fn to_spec(&self) -> LayerSpec {
        LayerSpec {
            input_dim: self.input_dim(),
            output_dim: self.output_dim(),
            weights: self.weights.iter().copied().collect(),
            bias: self.bias.to_vec(),
        }
    }

    pub fn from_spec(spec: LayerSpec) -> Result<Self, String> {
        if spec.weights.len() != spec.input_dim * spec.output_dim {
            return Err(format!(
                "weight matrix holds {} values, expected {}x{}",
                spec.weights.len(),
                spec.output_dim,
                spec.input_dim
            ));
        }
        if spec.bias.len() != spec.output_dim {
            return Err(format!(
                "bias holds {} values, expected {}",
                spec.bias.len(),
                spec.output_dim
            ));
        }
        if spec.weights.iter().chain(spec.bias.iter()).any(|v| !v.is_finite()) {
            return Err("non-finite parameter value".to_string());
        }

        let weights = Array2::from_shape_vec((spec.output_dim, spec.input_dim), spec.weights)
            .map_err(|e| e.to_string())?;
        Ok(Self {
            weights,
            bias: Array1::from_vec(spec.bias),
        })
    }
}

/// Rectify in place
pub(crate) fn relu(mut x: Array1<f32>) -> Array1<f32> {
    x.mapv_inplace(|v| v.max(0.0));
    x
}

/// A stack of dense layers with ReLU between them, producing raw logits
#[derive(Debug, Clone)]
pub(crate) struct DenseNet {
    layers: Vec<DenseLayer>,
}

/// Serialized form of a dense network
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct NetworkSpec {
    pub layers: Vec<LayerSpec>,
}

impl DenseNet {
    /// Deterministically initialized network with the given layer widths
    pub fn seeded(dims: &[usize], seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let layers = dims
            .windows(2)
            .map(|pair| DenseLayer::seeded(&mut rng, pair[0], pair[1]))
            .collect();
        Self { layers }
    }

    pub fn input_dim(&self) -> usize {
        self.layers.first().map(DenseLayer::input_dim).unwrap_or(0)
    }

    pub fn output_dim(&self) -> usize {
        self.layers.last().map(DenseLayer::output_dim).unwrap_or(0)
    }

    /// Layer widths, input first
    pub fn dims(&self) -> Vec<usize> {
        let mut dims = vec![self.input_dim()];
        dims.extend(self.layers.iter().map(DenseLayer::output_dim));
        dims
    }

    pub fn forward(&self, input: &Array1<f32>) -> Result<Array1<f32>, ClassifierError> {
        if input.len() != self.input_dim() {
            return Err(ClassifierError::ShapeMismatch {
                expected: self.input_dim(),
                got: input.len(),
            });
        }

        let mut x = input.clone();
        for (i, layer) in self.layers.iter().enumerate() {
            x = layer.forward(&x);
            if i + 1 < self.layers.len() {
                x = relu(x);
            }
        }
        Ok(x)
    }

    pub fn to_spec(&self) -> NetworkSpec {
        NetworkSpec {
            layers: self.layers.iter().map(DenseLayer::to_spec).collect(),
        }
    }

    pub fn from_spec(spec: NetworkSpec) -> Result<Self, String> {
        if spec.layers.is_empty() {
            return Err("network holds no layers".to_string());
        }

        let layers: Vec<DenseLayer> = spec
            .layers
            .into_iter()
            .map(DenseLayer::from_spec)
            .collect::<Result<_, _>>()?;

        for pair in layers.windows(2) {
            if pair[0].output_dim() != pair[1].input_dim() {
                return Err(format!(
                    "layer output {} does not feed layer input {}",
                    pair[0].output_dim(),
                    pair[1].input_dim()
                ));
            }
        }

        Ok(Self { layers })
    }
}

/// Parse a weight artifact, mapping any failure to `CorruptWeights`
pub(crate) fn load_artifact<T: DeserializeOwned>(path: &Path) -> Result<T, ClassifierError> {
    let content = std::fs::read_to_string(path).map_err(|e| ClassifierError::CorruptWeights {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    serde_json::from_str(&content).map_err(|e| ClassifierError::CorruptWeights {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Write a weight artifact as JSON
pub(crate) fn save_artifact<T: Serialize>(path: &Path, value: &T) -> Result<(), ClassifierError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ClassifierError::Persist {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    }
    let content = serde_json::to_string(value).map_err(|e| ClassifierError::Persist {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    std::fs::write(path, content).map_err(|e| ClassifierError::Persist {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_is_deterministic() {
        let a = DenseNet::seeded(&[8, 4, 2], 7);
        let b = DenseNet::seeded(&[8, 4, 2], 7);

        let input = Array1::from_vec((0..8).map(|i| i as f32 / 8.0).collect());
        assert_eq!(a.forward(&input).unwrap(), b.forward(&input).unwrap());
    }

    #[test]
    fn test_different_seeds_differ() {
        let a = DenseNet::seeded(&[8, 4], 1);
        let b = DenseNet::seeded(&[8, 4], 2);

        let input = Array1::from_elem(8, 0.5);
        assert_ne!(a.forward(&input).unwrap(), b.forward(&input).unwrap());
    }

    #[test]
    fn test_forward_shape_mismatch() {
        let net = DenseNet::seeded(&[8, 4], 0);
        let input = Array1::from_elem(5, 0.5);
        assert!(matches!(
            net.forward(&input),
            Err(ClassifierError::ShapeMismatch { expected: 8, got: 5 })
        ));
    }

    #[test]
    fn test_dims() {
        let net = DenseNet::seeded(&[10, 6, 3], 0);
        assert_eq!(net.dims(), vec![10, 6, 3]);
        assert_eq!(net.input_dim(), 10);
        assert_eq!(net.output_dim(), 3);
    }

    #[test]
    fn test_spec_roundtrip() {
        let net = DenseNet::seeded(&[6, 4, 2], 99);
        let restored = DenseNet::from_spec(net.to_spec()).unwrap();

        let input = Array1::from_elem(6, 0.25);
        assert_eq!(net.forward(&input).unwrap(), restored.forward(&input).unwrap());
    }

    #[test]
    fn test_from_spec_rejects_bad_weight_count() {
        let spec = NetworkSpec {
            layers: vec![LayerSpec {
                input_dim: 4,
                output_dim: 2,
                weights: vec![0.0; 7],
                bias: vec![0.0; 2],
            }],
        };
        assert!(DenseNet::from_spec(spec).is_err());
    }

    #[test]
    fn test_from_spec_rejects_mismatched_chain() {
        let make_layer = |i: usize, o: usize| LayerSpec {
            input_dim: i,
            output_dim: o,
            weights: vec![0.0; i * o],
            bias: vec![0.0; o],
        };
        let spec = NetworkSpec {
            layers: vec![make_layer(4, 3), make_layer(2, 1)],
        };
        assert!(DenseNet::from_spec(spec).is_err());
    }

    #[test]
    fn test_from_spec_rejects_non_finite() {
        let spec = NetworkSpec {
            layers: vec![LayerSpec {
                input_dim: 2,
                output_dim: 1,
                weights: vec![0.0, f32::NAN],
                bias: vec![0.0],
            }],
        };
        assert!(DenseNet::from_spec(spec).is_err());
    }

    #[test]
    fn test_artifact_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("net.json");

        let net = DenseNet::seeded(&[5, 3], 11);
        save_artifact(&path, &net.to_spec()).unwrap();

        let spec: NetworkSpec = load_artifact(&path).unwrap();
        let restored = DenseNet::from_spec(spec).unwrap();

        let input = Array1::from_elem(5, 0.1);
        assert_eq!(net.forward(&input).unwrap(), restored.forward(&input).unwrap());
    }

    #[test]
    fn test_load_artifact_corrupt_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("net.json");
        std::fs::write(&path, "{ not valid json").unwrap();

        let result: Result<NetworkSpec, _> = load_artifact(&path);
        assert!(matches!(result, Err(ClassifierError::CorruptWeights { .. })));
    }

    #[test]
    fn test_relu() {
        let x = Array1::from_vec(vec![-1.0, 0.0, 2.0]);
        assert_eq!(relu(x), Array1::from_vec(vec![0.0, 0.0, 2.0]));
    }
}
