//! Scalar transfer and spike primitives
//!
//! Transfer functions map a neuron's weighted input sum to its activation;
//! the spike function mixes that activation with the neuron's previous one,
//! making every neuron a first-order IIR filter with coefficient `p`.
//! Derivatives are carried for training collaborators; the runtime itself
//! only evaluates the forward forms.

const SELU_LAMBDA: f64 = 1.0507009873554805;
const SELU_ALPHA: f64 = 1.6732632423543772;

/// The closed set of transfer functions a neuron may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TransferFunction {
    /// Pass the input sum through unchanged
    #[default]
    Identity,
    /// Logistic sigmoid, `1 / (1 + e^-x)`
    Sigmoid,
    /// Hyperbolic tangent
    Tanh,
    /// Rectified linear unit, `max(0, x)`
    Relu,
    /// Scaled exponential linear unit
    Selu,
}

impl TransferFunction {
    /// Apply the function to `data`.
    pub fn apply(self, data: f64) -> f64 {
        match self {
            Self::Identity => data,
            Self::Sigmoid => 1.0 / (1.0 + (-data).exp()),
            Self::Tanh => data.tanh(),
            Self::Relu => data.max(0.0),
            Self::Selu => {
                if data > 0.0 {
                    SELU_LAMBDA * data
                } else {
                    SELU_LAMBDA * SELU_ALPHA * (data.exp() - 1.0)
                }
            }
        }
    }

    /// Derivative of the function at `data`.
    pub fn derivative(self, data: f64) -> f64 {
        match self {
            Self::Identity => 1.0,
            Self::Sigmoid => {
                let value = self.apply(data);
                value * (1.0 - value)
            }
            Self::Tanh => 1.0 - data.tanh().powi(2),
            Self::Relu => {
                if data > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Selu => {
                if data > 0.0 {
                    SELU_LAMBDA
                } else {
                    SELU_LAMBDA * SELU_ALPHA * data.exp()
                }
            }
        }
    }

    /// Average magnitude of the function's output, consumed by external
    /// weight initializers when scaling initial weights.
    pub fn average_output_range(self) -> f64 {
        match self {
            Self::Sigmoid | Self::Tanh => 1.0,
            Self::Identity | Self::Relu | Self::Selu => 50.0,
        }
    }
}

/// Mix a fresh activation with the previous one: `p·prev + (1−p)·new`.
pub fn spike_value(parameter: f64, new_data: f64, previous_data: f64) -> f64 {
    previous_data * parameter + new_data * (1.0 - parameter)
}

/// Derivative of the spike mix with respect to the fresh activation.
pub fn spike_derivative(parameter: f64) -> f64 {
    1.0 - parameter
}
