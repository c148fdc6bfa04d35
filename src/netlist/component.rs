//! Component and wire types supplied by the schematic editor.
//!
//! The core reads no geometry, rotation, or rendering state - only
//! identities, kinds, values, and port lists.

use std::f64::consts::PI;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::logic::LogicLevel;
use crate::{DEFAULT_DIODE_FORWARD_VOLTAGE, DEFAULT_LED_FORWARD_VOLTAGE};

/// Identity of a single component port: component id plus port id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortRef {
    pub component: String,
    pub port: String,
}

impl PortRef {
    pub fn new(component: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            port: port.into(),
        }
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.component, self.port)
    }
}

/// LED color, used to look up a typical forward voltage when the editor
/// does not supply an explicit override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedColor {
    Red,
    Yellow,
    Green,
    Blue,
    White,
}

impl LedColor {
    /// Typical forward voltage for this color, in volts.
    pub fn forward_voltage(&self) -> f64 {
        match self {
            LedColor::Red => 1.8,
            LedColor::Yellow => 2.0,
            LedColor::Green => 2.2,
            LedColor::Blue => 3.3,
            LedColor::White => 3.2,
        }
    }
}

/// Waveform shape for an AC source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    #[default]
    Sine,
    Square,
    Triangle,
    Sawtooth,
}

impl Waveform {
    /// Evaluate the unit waveform at phase angle `theta` (radians).
    pub fn sample(&self, theta: f64) -> f64 {
        // Normalize to [0, 1) cycles
        let cycles = theta / (2.0 * PI);
        let t = cycles - cycles.floor();
        match self {
            Waveform::Sine => theta.sin(),
            Waveform::Square => {
                if t < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Triangle => {
                if t < 0.25 {
                    4.0 * t
                } else if t < 0.75 {
                    2.0 - 4.0 * t
                } else {
                    4.0 * t - 4.0
                }
            }
            Waveform::Sawtooth => 2.0 * t - 1.0,
        }
    }
}

/// Kind of logic gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateKind {
    And,
    Or,
    Not,
    Nand,
    Nor,
    Xor,
    Xnor,
}

impl GateKind {
    /// Number of logic inputs this gate reads.
    pub fn input_count(&self) -> usize {
        match self {
            GateKind::Not => 1,
            _ => 2,
        }
    }
}

/// Component kind, each variant carrying only the fields it needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ComponentKind {
    Resistor {
        resistance: f64,
    },
    Capacitor {
        capacitance: f64,
    },
    Inductor {
        inductance: f64,
    },
    DcSource {
        voltage: f64,
    },
    AcSource {
        amplitude: f64,
        frequency: f64,
        #[serde(default)]
        phase: f64,
        #[serde(default)]
        offset: f64,
        #[serde(default)]
        waveform: Waveform,
    },
    Ground,
    Diode {
        #[serde(default)]
        forward_voltage: Option<f64>,
    },
    Led {
        #[serde(default)]
        color: Option<LedColor>,
        #[serde(default)]
        forward_voltage: Option<f64>,
    },
    Gate {
        gate: GateKind,
        #[serde(default)]
        input_a: Option<LogicLevel>,
        #[serde(default)]
        input_b: Option<LogicLevel>,
    },
    Switch {
        closed: bool,
    },
    Voltmeter,
    Ammeter,
}

impl ComponentKind {
    /// Resistance of a closed switch contact, in ohms.
    pub const SWITCH_R_CLOSED: f64 = 0.01;
    /// Resistance of an open switch contact, in ohms.
    pub const SWITCH_R_OPEN: f64 = 1e9;

    /// How many ports a component of this kind must declare.
    pub fn required_ports(&self) -> usize {
        match self {
            ComponentKind::Ground => 1,
            ComponentKind::Gate { gate, .. } => gate.input_count() + 1,
            _ => 2,
        }
    }

    /// True for independent sources able to drive the circuit.
    pub fn is_source(&self) -> bool {
        matches!(self, ComponentKind::DcSource { .. } | ComponentKind::AcSource { .. })
    }

    /// True for diodes and LEDs, which use the two-state ON/OFF model.
    pub fn is_diode_like(&self) -> bool {
        matches!(self, ComponentKind::Diode { .. } | ComponentKind::Led { .. })
    }

    /// Effective forward voltage for diode-like kinds.
    ///
    /// Precedence: explicit override > LED color table > generic default.
    pub fn forward_voltage(&self) -> Option<f64> {
        match self {
            ComponentKind::Diode { forward_voltage } => {
                Some(forward_voltage.unwrap_or(DEFAULT_DIODE_FORWARD_VOLTAGE))
            }
            ComponentKind::Led {
                color,
                forward_voltage,
            } => Some(
                forward_voltage
                    .or_else(|| color.map(|c| c.forward_voltage()))
                    .unwrap_or(DEFAULT_LED_FORWARD_VOLTAGE),
            ),
            _ => None,
        }
    }

    /// Source voltage at the DC operating point.
    ///
    /// AC sources contribute only their DC offset.
    pub fn dc_voltage(&self) -> Option<f64> {
        match self {
            ComponentKind::DcSource { voltage } => Some(*voltage),
            ComponentKind::AcSource { offset, .. } => Some(*offset),
            _ => None,
        }
    }

    /// Source voltage at simulation time `t` seconds.
    pub fn voltage_at(&self, t: f64) -> Option<f64> {
        match self {
            ComponentKind::DcSource { voltage } => Some(*voltage),
            ComponentKind::AcSource {
                amplitude,
                frequency,
                phase,
                offset,
                waveform,
            } => {
                let theta = 2.0 * PI * frequency * t + phase;
                Some(offset + amplitude * waveform.sample(theta))
            }
            _ => None,
        }
    }

    /// Conductance contributed by purely resistive kinds.
    pub fn conductance(&self) -> Option<f64> {
        match self {
            ComponentKind::Resistor { resistance } => Some(1.0 / resistance.max(1e-12)),
            ComponentKind::Switch { closed } => {
                let r = if *closed {
                    Self::SWITCH_R_CLOSED
                } else {
                    Self::SWITCH_R_OPEN
                };
                Some(1.0 / r)
            }
            _ => None,
        }
    }
}

/// A component in the editor's netlist snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    /// Stable identifier assigned by the editor
    pub id: String,
    #[serde(flatten)]
    pub kind: ComponentKind,
    /// Port identifiers, in the editor's declaration order
    pub ports: Vec<String>,
}

impl Component {
    pub fn new(id: impl Into<String>, kind: ComponentKind, ports: &[&str]) -> Self {
        Self {
            id: id.into(),
            kind,
            ports: ports.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Reference to the n-th declared port.
    pub fn port(&self, index: usize) -> PortRef {
        PortRef::new(self.id.clone(), self.ports[index].clone())
    }
}

/// An undirected wire between exactly two ports. Carries no value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wire {
    pub id: String,
    pub from: PortRef,
    pub to: PortRef,
}

impl Wire {
    pub fn new(id: impl Into<String>, from: PortRef, to: PortRef) -> Self {
        Self {
            id: id.into(),
            from,
            to,
        }
    }
}
