//! Three-valued digital logic evaluation.
//!
//! Gates are evaluated independently of the analog solver: each gate reads
//! its inputs (pinned levels from the editor, or analog port voltages
//! thresholded into levels) and produces one output level. `Unknown`
//! propagates strictly: a gate with any unresolved input reports an
//! unresolved output rather than guessing from the inputs it does have.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::netlist::{Component, ComponentKind, GateKind, PortRef};
use crate::{DEFAULT_LOGIC_THRESHOLD, LOGIC_HIGH_VOLTAGE};

/// A digital signal level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicLevel {
    Low,
    High,
    Unknown,
}

impl LogicLevel {
    /// The driven output voltage for this level, if it is resolved.
    pub fn voltage(&self) -> Option<f64> {
        match self {
            LogicLevel::Low => Some(0.0),
            LogicLevel::High => Some(LOGIC_HIGH_VOLTAGE),
            LogicLevel::Unknown => None,
        }
    }
}

/// Threshold an analog voltage into a logic level.
pub fn voltage_to_logic(voltage: f64, threshold: f64) -> LogicLevel {
    if voltage >= threshold {
        LogicLevel::High
    } else {
        LogicLevel::Low
    }
}

/// Evaluate one gate. Any `Unknown` input yields an `Unknown` output.
pub fn evaluate_gate(gate: GateKind, a: LogicLevel, b: LogicLevel) -> LogicLevel {
    use LogicLevel::{High, Low, Unknown};

    if a == Unknown || (gate.input_count() == 2 && b == Unknown) {
        return Unknown;
    }

    match gate {
        GateKind::Not => {
            if a == High {
                Low
            } else {
                High
            }
        }
        GateKind::And => {
            if a == High && b == High {
                High
            } else {
                Low
            }
        }
        GateKind::Or => {
            if a == High || b == High {
                High
            } else {
                Low
            }
        }
        GateKind::Xor => {
            if a != b {
                High
            } else {
                Low
            }
        }
        GateKind::Nand => invert(evaluate_gate(GateKind::And, a, b)),
        GateKind::Nor => invert(evaluate_gate(GateKind::Or, a, b)),
        GateKind::Xnor => invert(evaluate_gate(GateKind::Xor, a, b)),
    }
}

fn invert(level: LogicLevel) -> LogicLevel {
    match level {
        LogicLevel::Low => LogicLevel::High,
        LogicLevel::High => LogicLevel::Low,
        LogicLevel::Unknown => LogicLevel::Unknown,
    }
}

/// Resolved input and output levels of one gate.
#[derive(Debug, Clone, Serialize)]
pub struct GateState {
    pub input_a: LogicLevel,
    /// `Low` placeholder for single-input gates is never reported; NOT
    /// gates carry their sole input in `input_a` and `None` here.
    pub input_b: Option<LogicLevel>,
    pub output: LogicLevel,
}

/// Result of one digital evaluation pass.
#[derive(Debug, Clone, Serialize)]
pub struct DigitalResult {
    /// Gate component id to its resolved state
    pub gate_states: HashMap<String, GateState>,
    /// Output port (as "component:port") to driven voltage; unresolved
    /// outputs are omitted rather than reported as 0
    pub output_voltages: HashMap<String, f64>,
    /// False when a gate declared fewer ports than its kind requires and
    /// had to be skipped
    pub success: bool,
}

/// Evaluate every gate in the component list.
///
/// `port_voltages` supplies analog voltages for gate input ports; a pinned
/// level on the gate itself takes precedence over a measured voltage, and
/// an input with neither stays `Unknown`.
pub fn simulate(
    components: &[Component],
    port_voltages: Option<&HashMap<PortRef, f64>>,
) -> DigitalResult {
    let mut gate_states = HashMap::new();
    let mut output_voltages = HashMap::new();
    let mut success = true;

    for comp in components {
        let &ComponentKind::Gate {
            gate,
            input_a,
            input_b,
        } = &comp.kind
        else {
            continue;
        };

        // The analog path validates port counts in Topology::build; this
        // path never goes through it, so a mid-edit gate with missing
        // ports must be caught here rather than panic on port lookup
        if comp.ports.len() < comp.kind.required_ports() {
            warn!(gate = %comp.id, ports = comp.ports.len(), "gate is missing ports, skipped");
            success = false;
            continue;
        }

        let a = resolve_input(input_a, comp, 0, port_voltages);
        let (b, reported_b) = if gate.input_count() == 2 {
            let b = resolve_input(input_b, comp, 1, port_voltages);
            (b, Some(b))
        } else {
            (LogicLevel::Low, None)
        };

        let output = evaluate_gate(gate, a, b);
        debug!(gate = %comp.id, ?a, ?b, ?output, "gate evaluated");

        if let Some(v) = output.voltage() {
            let out_port = comp.port(gate.input_count());
            output_voltages.insert(out_port.to_string(), v);
        }

        gate_states.insert(
            comp.id.clone(),
            GateState {
                input_a: a,
                input_b: reported_b,
                output,
            },
        );
    }

    DigitalResult {
        gate_states,
        output_voltages,
        success,
    }
}

fn resolve_input(
    pinned: Option<LogicLevel>,
    comp: &Component,
    port_index: usize,
    port_voltages: Option<&HashMap<PortRef, f64>>,
) -> LogicLevel {
    if let Some(level) = pinned {
        return level;
    }
    port_voltages
        .and_then(|voltages| voltages.get(&comp.port(port_index)))
        .map(|&v| voltage_to_logic(v, DEFAULT_LOGIC_THRESHOLD))
        .unwrap_or(LogicLevel::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use LogicLevel::{High, Low, Unknown};

    #[test]
    fn test_two_input_truth_tables() {
        let cases: &[(GateKind, [LogicLevel; 4])] = &[
            (GateKind::And, [Low, Low, Low, High]),
            (GateKind::Or, [Low, High, High, High]),
            (GateKind::Xor, [Low, High, High, Low]),
            (GateKind::Nand, [High, High, High, Low]),
            (GateKind::Nor, [High, Low, Low, Low]),
            (GateKind::Xnor, [High, Low, Low, High]),
        ];
        let inputs = [(Low, Low), (Low, High), (High, Low), (High, High)];

        for (gate, expected) in cases {
            for (i, &(a, b)) in inputs.iter().enumerate() {
                assert_eq!(
                    evaluate_gate(*gate, a, b),
                    expected[i],
                    "{gate:?}({a:?}, {b:?})"
                );
            }
        }
    }

    #[test]
    fn test_not_gate() {
        assert_eq!(evaluate_gate(GateKind::Not, Low, Low), High);
        assert_eq!(evaluate_gate(GateKind::Not, High, Low), Low);
        assert_eq!(evaluate_gate(GateKind::Not, Unknown, Low), Unknown);
        // A NOT gate never reads its second input
        assert_eq!(evaluate_gate(GateKind::Not, High, Unknown), Low);
    }

    #[test]
    fn test_unknown_propagates_strictly() {
        // Even AND with one Low input stays Unknown: the model refuses
        // to resolve a gate it cannot fully observe
        for gate in [
            GateKind::And,
            GateKind::Or,
            GateKind::Xor,
            GateKind::Nand,
            GateKind::Nor,
            GateKind::Xnor,
        ] {
            assert_eq!(evaluate_gate(gate, Unknown, Low), Unknown, "{gate:?}");
            assert_eq!(evaluate_gate(gate, High, Unknown), Unknown, "{gate:?}");
            assert_eq!(evaluate_gate(gate, Unknown, Unknown), Unknown, "{gate:?}");
        }
    }

    #[test]
    fn test_voltage_threshold() {
        assert_eq!(voltage_to_logic(5.0, DEFAULT_LOGIC_THRESHOLD), High);
        assert_eq!(voltage_to_logic(2.5, DEFAULT_LOGIC_THRESHOLD), High);
        assert_eq!(voltage_to_logic(2.49, DEFAULT_LOGIC_THRESHOLD), Low);
        assert_eq!(voltage_to_logic(0.0, DEFAULT_LOGIC_THRESHOLD), Low);
    }

    fn gate_component(id: &str, gate: GateKind, a: Option<LogicLevel>, b: Option<LogicLevel>) -> Component {
        let ports: &[&str] = if gate.input_count() == 1 {
            &["in", "out"]
        } else {
            &["a", "b", "out"]
        };
        Component::new(
            id,
            ComponentKind::Gate {
                gate,
                input_a: a,
                input_b: b,
            },
            ports,
        )
    }

    #[test]
    fn test_simulate_pinned_inputs() {
        let components = vec![
            gate_component("U1", GateKind::And, Some(High), Some(High)),
            gate_component("U2", GateKind::Not, Some(High), None),
        ];
        let result = simulate(&components, None);

        assert!(result.success);
        assert_eq!(result.gate_states["U1"].output, High);
        assert_eq!(result.gate_states["U2"].output, Low);
        assert_eq!(result.output_voltages["U1:out"], LOGIC_HIGH_VOLTAGE);
        assert_eq!(result.output_voltages["U2:out"], 0.0);
    }

    #[test]
    fn test_simulate_skips_gate_with_missing_ports() {
        // A gate serialized mid-edit can arrive with no ports declared
        let components = vec![
            Component::new(
                "U1",
                ComponentKind::Gate {
                    gate: GateKind::And,
                    input_a: Some(High),
                    input_b: Some(High),
                },
                &[],
            ),
            gate_component("U2", GateKind::Not, Some(Low), None),
        ];
        let result = simulate(&components, None);

        assert!(!result.success);
        assert!(!result.gate_states.contains_key("U1"));
        // Well-formed gates still evaluate
        assert_eq!(result.gate_states["U2"].output, High);
    }

    #[test]
    fn test_simulate_analog_driven_inputs() {
        let components = vec![gate_component("U1", GateKind::And, None, None)];
        let mut voltages = HashMap::new();
        voltages.insert(PortRef::new("U1", "a"), 5.0);
        voltages.insert(PortRef::new("U1", "b"), 0.3);

        let result = simulate(&components, Some(&voltages));
        let state = &result.gate_states["U1"];
        assert_eq!(state.input_a, High);
        assert_eq!(state.input_b, Some(Low));
        assert_eq!(state.output, Low);
    }

    #[test]
    fn test_simulate_pinned_level_wins_over_voltage() {
        let components = vec![gate_component("U1", GateKind::Or, Some(Low), Some(Low))];
        let mut voltages = HashMap::new();
        voltages.insert(PortRef::new("U1", "a"), 5.0);

        let result = simulate(&components, Some(&voltages));
        assert_eq!(result.gate_states["U1"].output, Low);
    }

    #[test]
    fn test_simulate_unresolved_output_has_no_voltage() {
        let components = vec![gate_component("U1", GateKind::And, Some(High), None)];
        let result = simulate(&components, None);

        assert_eq!(result.gate_states["U1"].output, Unknown);
        assert!(result.output_voltages.is_empty());
        // Unresolved is a valid answer, not a failure
        assert!(result.success);
    }

    #[test]
    fn test_simulate_skips_analog_components() {
        let components = vec![Component::new(
            "R1",
            ComponentKind::Resistor { resistance: 1e3 },
            &["a", "b"],
        )];
        let result = simulate(&components, None);
        assert!(result.gate_states.is_empty());
    }
}
