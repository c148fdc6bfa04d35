//! Editor-facing netlist types and node topology.
//!
//! The schematic editor hands the engine a flat snapshot of components and
//! wires. This module turns that snapshot into electrical nodes: every port
//! starts as its own node and wires merge them via union-find, with ground
//! identified by membership of a [`ComponentKind::Ground`] port.

mod component;
mod topology;

pub use component::{Component, ComponentKind, GateKind, LedColor, PortRef, Waveform, Wire};
pub use topology::{ElectricalNode, Topology};
