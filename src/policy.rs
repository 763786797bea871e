use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::PolicyError;

/// Black-box decision function driven by the population learner.
pub trait Policy {
    /// Maps an observation to an action signal. The caller decides how to threshold it.
    fn evaluate(&self, observation: &[f32]) -> Result<f32, PolicyError>;
}

impl<P: Policy + ?Sized> Policy for Box<P> {
    fn evaluate(&self, observation: &[f32]) -> Result<f32, PolicyError> {
        (**self).evaluate(observation)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GenomeId(pub u64);

impl fmt::Display for GenomeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Fixed-topology network: `inputs -> hidden (tanh) -> 1 (tanh)`, each layer with a bias.
///
/// Raw observations are large (screen coordinates, flap counts), so inputs are multiplied by
/// `input_scale` before the first layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeedForwardGenome {
    inputs: usize,
    hidden: usize,
    #[serde(default = "default_input_scale")]
    input_scale: f32,
    weights: Vec<f32>,
}

fn default_input_scale() -> f32 {
    FeedForwardGenome::DEFAULT_INPUT_SCALE
}

impl FeedForwardGenome {
    pub const DEFAULT_INPUT_SCALE: f32 = 0.01;

    pub fn weight_count(inputs: usize, hidden: usize) -> usize {
        hidden * (inputs + 1) + hidden + 1
    }

    pub fn random<R: Rng>(inputs: usize, hidden: usize, rng: &mut R) -> Self {
        let weights = (0..Self::weight_count(inputs, hidden))
            .map(|_| rng.gen_range(-1.0..=1.0))
            .collect();
        Self {
            inputs,
            hidden,
            input_scale: Self::DEFAULT_INPUT_SCALE,
            weights,
        }
    }

    pub fn from_weights(
        inputs: usize,
        hidden: usize,
        weights: Vec<f32>,
    ) -> Result<Self, PolicyError> {
        let genome = Self {
            inputs,
            hidden,
            input_scale: Self::DEFAULT_INPUT_SCALE,
            weights,
        };
        genome.validate()?;
        Ok(genome)
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        let expected = Self::weight_count(self.inputs, self.hidden);
        if self.weights.len() != expected {
            return Err(PolicyError::MalformedGenome(format!(
                "expected {expected} weights, found {}",
                self.weights.len()
            )));
        }
        if let Some(i) = self.weights.iter().position(|w| !w.is_finite()) {
            return Err(PolicyError::MalformedGenome(format!("weight {i} is not finite")));
        }
        Ok(())
    }

    /// Copy with each weight perturbed by `uniform(-power, power)` with probability `rate`.
    pub fn mutated<R: Rng>(&self, rate: f32, power: f32, rng: &mut R) -> Self {
        let mut child = self.clone();
        for w in child.weights.iter_mut() {
            if rng.r#gen::<f32>() < rate {
                *w += rng.gen_range(-power..=power);
            }
        }
        child
    }
}

impl Policy for FeedForwardGenome {
    fn evaluate(&self, observation: &[f32]) -> Result<f32, PolicyError> {
        // deserialized genomes never went through `from_weights`
        self.validate()?;
        if observation.len() != self.inputs {
            return Err(PolicyError::InputWidth {
                expected: self.inputs,
                actual: observation.len(),
            });
        }
        let stride = self.inputs + 1;
        let (hidden_w, output_w) = self.weights.split_at(self.hidden * stride);

        let mut out = output_w[self.hidden];
        for (h, row) in hidden_w.chunks_exact(stride).enumerate() {
            let mut acc = row[self.inputs];
            for (w, x) in row.iter().zip(observation) {
                acc += w * x * self.input_scale;
            }
            out += output_w[h] * acc.tanh();
        }
        let signal = out.tanh();
        if signal.is_finite() { Ok(signal) } else { Err(PolicyError::NonFinite) }
    }
}
