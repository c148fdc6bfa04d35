//! Error types for the Voltlab circuit engine.
//!
//! This module provides a unified error type [`EngineError`] covering
//! topology extraction, DC analysis, and transient simulation. All errors
//! are returned as explicit values so the editor can render localized
//! messages; nothing is panicked across the analysis boundary.

use thiserror::Error;

/// Result type alias using [`EngineError`].
pub type Result<T> = std::result::Result<T, EngineError>;

/// Unified error type for all engine operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    // ============ Structural Errors ============
    /// The netlist contains no components at all
    #[error("Circuit is empty - add components before running analysis")]
    EmptyCircuit,

    /// Two or more components but nothing is wired together
    #[error("Circuit has {components} components but no wires - connect them first")]
    NoWires { components: usize },

    /// No ground reference anywhere in the circuit
    #[error("Circuit has no ground component - analysis needs a reference node")]
    MissingGround,

    /// Ground exists but nothing else connects to it
    #[error("Ground is present but not connected to the rest of the circuit")]
    IsolatedGround,

    /// No independent voltage source to drive the circuit
    #[error("Circuit has no voltage source - nothing drives it")]
    NoSource,

    /// A wire endpoint references a port that no component declares
    #[error("Wire '{wire}' references unknown port '{port}' on component '{component}'")]
    UnknownPort {
        wire: String,
        component: String,
        port: String,
    },

    /// A component declares fewer ports than its kind requires
    #[error("Component '{component}' needs {required} ports but has {actual}")]
    MissingPorts {
        component: String,
        required: usize,
        actual: usize,
    },

    // ============ Numeric Errors ============
    /// The assembled matrix has no unique solution
    #[error("{analysis} analysis produced a singular matrix - check for conflicting sources or floating sections")]
    SingularMatrix { analysis: &'static str },

    /// A component value makes its stamp meaningless
    #[error("Component '{component}' has invalid value {value}: {message}")]
    InvalidValue {
        component: String,
        value: f64,
        message: String,
    },

    // ============ Configuration Errors ============
    /// Transient time step must be strictly positive
    #[error("Invalid time step {dt} - must be positive")]
    InvalidTimeStep { dt: f64 },

    /// The transient solver was used after dispose()
    #[error("Transient solver has been disposed - create a new one")]
    SolverDisposed,

    /// step_batch() was called before initialize()
    #[error("Transient solver is not initialized")]
    NotInitialized,
}

impl EngineError {
    /// Create a singular-matrix error tagged with the analysis that hit it.
    pub fn singular(analysis: &'static str) -> Self {
        Self::SingularMatrix { analysis }
    }

    /// Create an invalid-value error.
    pub fn invalid_value(component: impl Into<String>, value: f64, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            component: component.into(),
            value,
            message: message.into(),
        }
    }
}
