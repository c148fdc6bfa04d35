//! WASM bindings for Voltlab Core.
//!
//! This module provides JavaScript-friendly bindings for the schematic
//! editor running in a browser. The netlist crosses the boundary as JSON;
//! results go back the same way.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { WasmCircuitEngine } from 'voltlab_core';
//!
//! await init();
//!
//! const engine = new WasmCircuitEngine(JSON.stringify({ components, wires }));
//! const dc = JSON.parse(engine.analyze_dc());
//!
//! engine.init_transient();
//! const samples = JSON.parse(engine.step_batch(10));
//! ```

use wasm_bindgen::prelude::*;

use crate::logic;
use crate::netlist::{Component, Wire};
use crate::solver::{analyze_dc, TransientOptions, TransientSolver};

/// Initialize panic hook for better error messages in browser console.
#[wasm_bindgen(start)]
pub fn init_panic_hook() {
    console_error_panic_hook::set_once();
}

#[derive(serde::Deserialize)]
struct Netlist {
    components: Vec<Component>,
    wires: Vec<Wire>,
}

/// WASM-compatible circuit analysis engine.
///
/// Holds one netlist snapshot. Editing the schematic means building a new
/// engine; the transient solver inside never sees a stale topology.
#[wasm_bindgen]
pub struct WasmCircuitEngine {
    components: Vec<Component>,
    wires: Vec<Wire>,
    transient: Option<TransientSolver>,
}

#[wasm_bindgen]
impl WasmCircuitEngine {
    /// Create an engine from a JSON netlist: `{ "components": [...], "wires": [...] }`.
    #[wasm_bindgen(constructor)]
    pub fn new(netlist_json: &str) -> Result<WasmCircuitEngine, JsValue> {
        let netlist: Netlist =
            serde_json::from_str(netlist_json).map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(WasmCircuitEngine {
            components: netlist.components,
            wires: netlist.wires,
            transient: None,
        })
    }

    /// Run DC operating-point analysis, returning the result as JSON.
    #[wasm_bindgen]
    pub fn analyze_dc(&self) -> Result<String, JsValue> {
        let result = analyze_dc(&self.components, &self.wires)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        serde_json::to_string(&result).map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Evaluate logic gates, returning gate states and output voltages as JSON.
    #[wasm_bindgen]
    pub fn evaluate_logic(&self) -> Result<String, JsValue> {
        let result = logic::simulate(&self.components, None);
        serde_json::to_string(&result).map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Prepare the transient solver, returning `{ max_frequency, dt }` as JSON.
    #[wasm_bindgen]
    pub fn init_transient(&mut self) -> Result<String, JsValue> {
        let solver =
            TransientSolver::initialize(&self.components, &self.wires, TransientOptions::default())
                .map_err(|e| JsValue::from_str(&e.to_string()))?;
        let report = solver.report();
        self.transient = Some(solver);
        serde_json::to_string(&report).map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Advance the transient solver `n` steps; returns the samples as JSON.
    #[wasm_bindgen]
    pub fn step_batch(&mut self, n: usize) -> Result<String, JsValue> {
        let solver = self
            .transient
            .as_mut()
            .ok_or_else(|| JsValue::from_str(&crate::EngineError::NotInitialized.to_string()))?;
        let samples = solver
            .step_batch(n)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        serde_json::to_string(&samples).map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Simulation time reached by the transient solver, in seconds.
    #[wasm_bindgen(getter)]
    pub fn current_time(&self) -> f64 {
        self.transient
            .as_ref()
            .map(|s| s.current_time())
            .unwrap_or(0.0)
    }

    /// Rewind the transient solver to t=0, keeping the topology.
    #[wasm_bindgen]
    pub fn reset_transient(&mut self) {
        if let Some(solver) = self.transient.as_mut() {
            solver.reset();
        }
    }

    /// Drop the transient solver's buffers.
    #[wasm_bindgen]
    pub fn dispose_transient(&mut self) {
        if let Some(solver) = self.transient.as_mut() {
            solver.dispose();
        }
        self.transient = None;
    }
}

/// Get the library version.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
