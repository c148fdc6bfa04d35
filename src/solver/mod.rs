//! MNA (Modified Nodal Analysis) solver.
//!
//! This module provides the numerical engine for circuit analysis.
//!
//! ## Modified Nodal Analysis
//!
//! MNA assembles a system of equations Ax = z where:
//! - x contains node voltages and branch currents
//! - A is the conductance/coefficient matrix
//! - z is the source vector
//!
//! The matrix structure is:
//! ```text
//! [ G   B ] [ v ]   [ i ]
//! [ C   D ] [ j ] = [ e ]
//! ```
//!
//! where:
//! - G is the conductance matrix (node equations)
//! - B, C connect voltage sources to nodes
//! - D is usually 0 (for ideal voltage sources)
//! - v is the vector of node voltages
//! - j is the vector of branch currents
//! - i is the sum of current sources into each node
//! - e is the vector of voltage source values
//!
//! Elements needing a branch-current unknown: independent sources,
//! inductors, ammeters, and diodes/LEDs held in the ON state.

mod dc;
mod linear;
mod mna;
mod transient;

pub use dc::{analyze_dc, analyze_dc_with_options, AnalysisResult, DcOptions};
pub use linear::{solve, Matrix};
pub use mna::MnaSystem;
pub use transient::{InitReport, StreamingSample, TransientOptions, TransientSolver};

/// Pivot magnitudes below this are treated as singular.
pub const PIVOT_EPSILON: f64 = 1e-12;

/// Maximum diode/LED ON-OFF re-solves per DC analysis.
pub const DEFAULT_DIODE_ITERATION_CAP: usize = 10;

/// Samples per cycle of the fastest AC source when deriving the time step.
pub const DEFAULT_SAMPLES_PER_CYCLE: usize = 100;

/// Time step for circuits with no AC content, in seconds.
pub const DEFAULT_DC_TIME_STEP: f64 = 1e-4;
