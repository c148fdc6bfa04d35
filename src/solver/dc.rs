//! DC operating-point analysis.
//!
//! Topology and stamps are rebuilt from scratch on every request. Diodes
//! and LEDs use a simplified two-state model: ON stamps an ideal voltage
//! source at the forward voltage, OFF contributes nothing. The engine
//! re-solves with flipped assignments until they are self-consistent with
//! the resulting branch currents, or an iteration cap is reached, in which
//! case the last solution is returned with a warning. This is a deliberate
//! bounded fixed-point, not Newton-Raphson.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::netlist::{Component, ComponentKind, Topology, Wire};

use super::mna::{MnaSystem, StampPlan};
use super::DEFAULT_DIODE_ITERATION_CAP;

/// Tunables for DC analysis.
#[derive(Debug, Clone)]
pub struct DcOptions {
    /// Maximum diode/LED ON-OFF re-solves before accepting the last
    /// solution as an approximation.
    pub diode_iteration_cap: usize,
}

impl Default for DcOptions {
    fn default() -> Self {
        Self {
            diode_iteration_cap: DEFAULT_DIODE_ITERATION_CAP,
        }
    }
}

/// Outcome of a successful DC (or single transient-step) solve.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    /// Node id to voltage; the ground node reads 0.0
    pub node_voltages: HashMap<usize, f64>,
    /// Component id to branch current, in amperes
    pub branch_currents: HashMap<String, f64>,
    /// False when the diode state iteration hit its cap
    pub converged: bool,
    /// Human-readable note when `converged` is false
    pub warning: Option<String>,
}

/// Run DC analysis with default options.
pub fn analyze_dc(components: &[Component], wires: &[Wire]) -> Result<AnalysisResult> {
    analyze_dc_with_options(components, wires, &DcOptions::default())
}

/// Run DC analysis.
pub fn analyze_dc_with_options(
    components: &[Component],
    wires: &[Wire],
    options: &DcOptions,
) -> Result<AnalysisResult> {
    let topology = Topology::build(components, wires)?;
    validate_for_analysis(components)?;

    let cap = options.diode_iteration_cap.max(1);
    let mut diode_on = vec![false; components.len()];
    let mut iteration = 0;

    let (plan, sys, x, solved_states, converged) = loop {
        // States this pass is solved under; flips apply to the next pass
        let solved_states = diode_on.clone();
        let plan = StampPlan::build(components, &topology, &diode_on)?;
        let mut sys = MnaSystem::new(topology.num_unknowns, plan.num_branches);
        stamp_dc(components, &plan, &mut sys)?;
        let x = sys.solve("DC")?;

        let flips = update_diode_states(components, &plan, &sys, &x, &mut diode_on);
        iteration += 1;
        debug!(iteration, flips, "DC diode pass");

        if flips == 0 {
            break (plan, sys, x, solved_states, true);
        }
        if iteration >= cap {
            break (plan, sys, x, solved_states, false);
        }
    };

    let warning = if converged {
        None
    } else {
        warn!(
            cap = options.diode_iteration_cap,
            "diode state iteration hit its cap; returning last solution"
        );
        Some(format!(
            "Diode/LED on-off states did not settle within {} re-solves; \
             the last solution is an approximation of the simplified two-state model",
            options.diode_iteration_cap
        ))
    };

    let node_voltages = collect_node_voltages(&topology, &x);
    let branch_currents = derive_branch_currents(components, &plan, &sys, &x, &solved_states);

    Ok(AnalysisResult {
        node_voltages,
        branch_currents,
        converged,
        warning,
    })
}

/// Fail-fast checks performed before any matrix is assembled.
pub(super) fn validate_for_analysis(components: &[Component]) -> Result<()> {
    if !components.iter().any(|c| c.kind.is_source()) {
        return Err(EngineError::NoSource);
    }
    for comp in components {
        match comp.kind {
            ComponentKind::Resistor { resistance } if resistance <= 0.0 => {
                return Err(EngineError::invalid_value(
                    &comp.id,
                    resistance,
                    "resistance must be positive",
                ));
            }
            ComponentKind::Capacitor { capacitance } if capacitance <= 0.0 => {
                return Err(EngineError::invalid_value(
                    &comp.id,
                    capacitance,
                    "capacitance must be positive",
                ));
            }
            ComponentKind::Inductor { inductance } if inductance <= 0.0 => {
                return Err(EngineError::invalid_value(
                    &comp.id,
                    inductance,
                    "inductance must be positive",
                ));
            }
            _ => {}
        }
    }
    Ok(())
}

/// Stamp every component for the DC operating point.
fn stamp_dc(components: &[Component], plan: &StampPlan, sys: &mut MnaSystem) -> Result<()> {
    for stamp in &plan.stamps {
        let comp = &components[stamp.component];
        match &comp.kind {
            ComponentKind::Resistor { .. } | ComponentKind::Switch { .. } => {
                let g = comp.kind.conductance().unwrap_or(0.0);
                sys.stamp_conductance(stamp.n1, stamp.n2, g);
            }

            // Open circuit at DC
            ComponentKind::Capacitor { .. } | ComponentKind::Voltmeter => {}

            // Short circuit at DC: 0V source with an auxiliary current
            ComponentKind::Inductor { .. } | ComponentKind::Ammeter => {
                if let Some(branch) = stamp.branch {
                    sys.stamp_voltage_source(stamp.n1, stamp.n2, branch, 0.0);
                }
            }

            ComponentKind::DcSource { .. } | ComponentKind::AcSource { .. } => {
                let v = comp.kind.dc_voltage().unwrap_or(0.0);
                if let Some(branch) = stamp.branch {
                    sys.stamp_voltage_source(stamp.n1, stamp.n2, branch, v);
                }
            }

            ComponentKind::Diode { .. } | ComponentKind::Led { .. } => {
                // ON: ideal source at the forward voltage. OFF: open.
                if let Some(branch) = stamp.branch {
                    let vf = comp.kind.forward_voltage().unwrap_or(0.0);
                    sys.stamp_voltage_source(stamp.n1, stamp.n2, branch, vf);
                }
            }

            // Reference only / no analog stamp
            ComponentKind::Ground | ComponentKind::Gate { .. } => {}
        }
    }
    Ok(())
}

/// Flip inconsistent diode states; returns the number of flips.
///
/// ON is consistent when the solved branch current flows anode to cathode;
/// OFF is consistent when the across voltage stays below the forward drop.
pub(super) fn update_diode_states(
    components: &[Component],
    plan: &StampPlan,
    sys: &MnaSystem,
    x: &[f64],
    diode_on: &mut [bool],
) -> usize {
    let mut flips = 0;
    for stamp in &plan.stamps {
        let comp = &components[stamp.component];
        if !comp.kind.is_diode_like() {
            continue;
        }
        let vf = comp.kind.forward_voltage().unwrap_or(0.0);
        let on = diode_on[stamp.component];

        let consistent = if on {
            let i = stamp.branch.map(|b| x[sys.branch_row(b)]).unwrap_or(0.0);
            i >= 0.0
        } else {
            let v_across = MnaSystem::voltage(x, stamp.n1) - MnaSystem::voltage(x, stamp.n2);
            v_across < vf
        };

        if !consistent {
            diode_on[stamp.component] = !on;
            flips += 1;
        }
    }
    flips
}

fn collect_node_voltages(topology: &Topology, x: &[f64]) -> HashMap<usize, f64> {
    topology
        .nodes
        .iter()
        .map(|node| (node.id, node.index.map(|i| x[i]).unwrap_or(0.0)))
        .collect()
}

/// Derive per-component branch currents from the solution.
///
/// Two-terminal conductive elements use (V1 - V2) * G; elements with an
/// auxiliary unknown read it directly (port1 -> port2 direction); sources
/// report the current they deliver from the positive terminal.
pub(super) fn derive_branch_currents(
    components: &[Component],
    plan: &StampPlan,
    sys: &MnaSystem,
    x: &[f64],
    diode_on: &[bool],
) -> HashMap<String, f64> {
    let mut currents = HashMap::new();
    for stamp in &plan.stamps {
        let comp = &components[stamp.component];
        let current = match &comp.kind {
            ComponentKind::Resistor { .. } | ComponentKind::Switch { .. } => {
                let v1 = MnaSystem::voltage(x, stamp.n1);
                let v2 = MnaSystem::voltage(x, stamp.n2);
                (v1 - v2) * comp.kind.conductance().unwrap_or(0.0)
            }
            ComponentKind::Capacitor { .. } | ComponentKind::Voltmeter => 0.0,
            ComponentKind::Inductor { .. } | ComponentKind::Ammeter => stamp
                .branch
                .map(|b| x[sys.branch_row(b)])
                .unwrap_or(0.0),
            ComponentKind::DcSource { .. } | ComponentKind::AcSource { .. } => stamp
                .branch
                .map(|b| -x[sys.branch_row(b)])
                .unwrap_or(0.0),
            ComponentKind::Diode { .. } | ComponentKind::Led { .. } => {
                if diode_on[stamp.component] {
                    stamp.branch.map(|b| x[sys.branch_row(b)]).unwrap_or(0.0)
                } else {
                    0.0
                }
            }
            ComponentKind::Ground | ComponentKind::Gate { .. } => continue,
        };
        currents.insert(comp.id.clone(), current);
    }
    currents
}
