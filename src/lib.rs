//! # Voltlab Core
//!
//! The circuit analysis engine behind an interactive schematic editor.
//!
//! This library provides:
//! - Topology extraction: merging wire-connected ports into electrical nodes
//! - Modified Nodal Analysis (MNA) based DC operating-point analysis
//! - An incremental transient solver emitting per-step samples for animation
//! - A combinational boolean evaluator for logic-gate components
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`netlist`] - Editor-facing component/wire types and node topology
//! - [`solver`] - MNA matrix assembly, linear solving, DC and transient analysis
//! - [`logic`] - Digital logic gate evaluation
//!
//! The editor surface (canvas, routing, persistence) is an external
//! collaborator: it hands over a list of components and wires and consumes
//! [`AnalysisResult`](solver::AnalysisResult) maps and
//! [`StreamingSample`](solver::StreamingSample) sequences.
//!
//! ## Circuit Analysis Method
//!
//! DC analysis assembles the MNA system Ax = z once per request and solves
//! it by Gaussian elimination with partial pivoting. Diodes and LEDs use a
//! simplified two-state (ON/OFF) model iterated to a self-consistent
//! assignment rather than full Newton-Raphson.
//!
//! Transient analysis discretizes capacitors and inductors with backward
//! Euler companion models, chosen for unconditional stability, and advances
//! in fixed steps driven by the host's animation clock via
//! [`TransientSolver::step_batch`](solver::TransientSolver::step_batch).

pub mod error;
pub mod logic;
pub mod netlist;
pub mod solver;

// Re-export main types for convenience
pub use error::{EngineError, Result};
pub use netlist::{Component, ComponentKind, PortRef, Topology, Wire};
pub use solver::{analyze_dc, AnalysisResult, TransientSolver};

// WASM bindings
#[cfg(feature = "wasm")]
mod wasm;

#[cfg(feature = "wasm")]
pub use wasm::WasmCircuitEngine;

/// Default forward voltage for a generic silicon diode, in volts.
pub const DEFAULT_DIODE_FORWARD_VOLTAGE: f64 = 0.7;

/// Default forward voltage for an LED with no color or override, in volts.
pub const DEFAULT_LED_FORWARD_VOLTAGE: f64 = 2.0;

/// Voltage threshold separating logic LOW from logic HIGH, in volts.
pub const DEFAULT_LOGIC_THRESHOLD: f64 = 2.5;

/// Voltage a driven logic HIGH output presents to the circuit, in volts.
pub const LOGIC_HIGH_VOLTAGE: f64 = 5.0;
