//! Transient analysis with pull-based streaming samples.
//!
//! Capacitors and inductors are discretized with backward-Euler companion
//! models, chosen for unconditional stability over higher-order schemes at
//! the cost of some damping. The solver owns all per-element history
//! (capacitor voltage, inductor current, diode state) and is driven
//! cooperatively by the host's animation clock through [`step_batch`];
//! there are no internal threads or timers.
//!
//! [`step_batch`]: TransientSolver::step_batch

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::netlist::{Component, ComponentKind, Topology, Wire};

use super::dc::{update_diode_states, validate_for_analysis};
use super::mna::{MnaSystem, StampPlan};
use super::{DEFAULT_DC_TIME_STEP, DEFAULT_SAMPLES_PER_CYCLE};

/// Tunables for transient simulation.
#[derive(Debug, Clone)]
pub struct TransientOptions {
    /// Samples per cycle of the fastest AC source when deriving dt
    pub samples_per_cycle: usize,
    /// Time step for circuits with no AC content, in seconds
    pub default_dt: f64,
    /// Explicit time step; skips derivation entirely when set
    pub dt_override: Option<f64>,
}

impl Default for TransientOptions {
    fn default() -> Self {
        Self {
            samples_per_cycle: DEFAULT_SAMPLES_PER_CYCLE,
            default_dt: DEFAULT_DC_TIME_STEP,
            dt_override: None,
        }
    }
}

/// What `initialize` derived from the circuit.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct InitReport {
    /// Highest AC source frequency found, 0.0 for purely DC circuits
    pub max_frequency: f64,
    /// Time step the run will use, in seconds
    pub dt: f64,
}

/// One sample per internal simulation step.
#[derive(Debug, Clone, Serialize)]
pub struct StreamingSample {
    /// Simulation time at the end of the step, in seconds
    pub time: f64,
    /// Component id to branch current, in amperes
    pub branch_currents: HashMap<String, f64>,
}

/// Per-element history carried between steps.
#[derive(Debug, Clone)]
enum ElementState {
    Capacitor { v_prev: f64 },
    Inductor { i_prev: f64 },
    Diode { on: bool },
    Stateless,
}

/// Incremental time-stepping solver for real-time animation.
///
/// One instance serves one simulation session. Topology or parameter
/// changes require discarding the solver and calling
/// [`TransientSolver::initialize`] again; there is no delta-update path.
#[derive(Debug)]
pub struct TransientSolver {
    components: Vec<Component>,
    topology: Topology,
    state: Vec<ElementState>,
    dt: f64,
    time: f64,
    max_frequency: f64,
    disposed: bool,
}

impl TransientSolver {
    /// Build a solver for a fresh component/wire snapshot.
    ///
    /// The time step is derived here, once, from the circuit's dominant
    /// frequency content and is not renegotiated mid-run.
    pub fn initialize(
        components: &[Component],
        wires: &[Wire],
        options: TransientOptions,
    ) -> Result<Self> {
        let topology = Topology::build(components, wires)?;
        validate_for_analysis(components)?;

        let max_frequency = components
            .iter()
            .filter_map(|c| match c.kind {
                ComponentKind::AcSource { frequency, .. } => Some(frequency),
                _ => None,
            })
            .fold(0.0, f64::max);

        let dt = match options.dt_override {
            Some(dt) => dt,
            None if max_frequency > 0.0 => {
                1.0 / (max_frequency * options.samples_per_cycle.max(1) as f64)
            }
            None => options.default_dt,
        };
        if !dt.is_finite() || dt <= 0.0 {
            return Err(EngineError::InvalidTimeStep { dt });
        }

        let state = components.iter().map(|c| initial_state(&c.kind)).collect();

        debug!(max_frequency, dt, "transient solver initialized");

        Ok(Self {
            components: components.to_vec(),
            topology,
            state,
            dt,
            time: 0.0,
            max_frequency,
            disposed: false,
        })
    }

    /// What initialization derived from the circuit.
    pub fn report(&self) -> InitReport {
        InitReport {
            max_frequency: self.max_frequency,
            dt: self.dt,
        }
    }

    /// Simulation time reached so far, in seconds.
    pub fn current_time(&self) -> f64 {
        self.time
    }

    /// The fixed step size, in seconds.
    pub fn time_step(&self) -> f64 {
        self.dt
    }

    /// Advance exactly `n` internal steps, returning one sample per step.
    ///
    /// Callers map simulation time onto display time with their own
    /// time-scale factor and cap `n` to bound per-frame latency.
    pub fn step_batch(&mut self, n: usize) -> Result<Vec<StreamingSample>> {
        if self.disposed {
            return Err(EngineError::SolverDisposed);
        }

        let mut samples = Vec::with_capacity(n);
        for _ in 0..n {
            samples.push(self.step()?);
        }
        Ok(samples)
    }

    /// Zero time and element history, keeping the topology.
    pub fn reset(&mut self) {
        self.time = 0.0;
        for (state, comp) in self.state.iter_mut().zip(&self.components) {
            *state = initial_state(&comp.kind);
        }
    }

    /// Drop internal buffers; any further stepping fails.
    ///
    /// Each step commits its history only after a successful solve, so
    /// there is never an in-flight step to roll back.
    pub fn dispose(&mut self) {
        self.disposed = true;
        self.state = Vec::new();
        self.components = Vec::new();
    }

    /// Run one backward-Euler step.
    ///
    /// Diode states come from the previous step's solution and are stamped
    /// once; the consistency check then updates them for the next step,
    /// keeping the hot path free of nested iteration.
    fn step(&mut self) -> Result<StreamingSample> {
        let t_next = self.time + self.dt;

        let mut diode_on: Vec<bool> = self
            .state
            .iter()
            .map(|s| matches!(s, ElementState::Diode { on: true }))
            .collect();

        let plan = StampPlan::build(&self.components, &self.topology, &diode_on)?;
        let mut sys = MnaSystem::new(self.topology.num_unknowns, plan.num_branches);
        self.stamp_companions(&plan, &mut sys, t_next)?;
        let x = sys.solve("transient")?;

        let branch_currents = self.derive_currents(&plan, &sys, &x);

        // Commit history only after the solve succeeded
        for stamp in &plan.stamps {
            match &mut self.state[stamp.component] {
                ElementState::Capacitor { v_prev } => {
                    *v_prev = MnaSystem::voltage(&x, stamp.n1) - MnaSystem::voltage(&x, stamp.n2);
                }
                ElementState::Inductor { i_prev } => {
                    if let Some(branch) = stamp.branch {
                        *i_prev = x[sys.branch_row(branch)];
                    }
                }
                ElementState::Diode { .. } | ElementState::Stateless => {}
            }
        }

        update_diode_states(&self.components, &plan, &sys, &x, &mut diode_on);
        for (state, &on) in self.state.iter_mut().zip(&diode_on) {
            if let ElementState::Diode { on: stored } = state {
                *stored = on;
            }
        }

        self.time = t_next;

        Ok(StreamingSample {
            time: self.time,
            branch_currents,
        })
    }

    /// Stamp every component for one step at simulation time `t`.
    fn stamp_companions(&self, plan: &StampPlan, sys: &mut MnaSystem, t: f64) -> Result<()> {
        for stamp in &plan.stamps {
            let comp = &self.components[stamp.component];
            match &comp.kind {
                ComponentKind::Resistor { .. } | ComponentKind::Switch { .. } => {
                    let g = comp.kind.conductance().unwrap_or(0.0);
                    sys.stamp_conductance(stamp.n1, stamp.n2, g);
                }

                // Conductance C/dt in parallel with a history current source
                ComponentKind::Capacitor { capacitance } => {
                    let g = capacitance / self.dt;
                    let v_prev = self.capacitor_v_prev(stamp.component);
                    sys.stamp_conductance(stamp.n1, stamp.n2, g);
                    sys.stamp_current_source(stamp.n1, stamp.n2, -(g * v_prev));
                }

                // Series resistance L/dt with a history voltage source
                ComponentKind::Inductor { inductance } => {
                    if let Some(branch) = stamp.branch {
                        let r_eq = inductance / self.dt;
                        let i_prev = self.inductor_i_prev(stamp.component);
                        sys.stamp_voltage_source(stamp.n1, stamp.n2, branch, -r_eq * i_prev);
                        sys.add_branch_resistance(branch, r_eq);
                    }
                }

                ComponentKind::DcSource { .. } | ComponentKind::AcSource { .. } => {
                    let v = comp.kind.voltage_at(t).unwrap_or(0.0);
                    if let Some(branch) = stamp.branch {
                        sys.stamp_voltage_source(stamp.n1, stamp.n2, branch, v);
                    }
                }

                ComponentKind::Diode { .. } | ComponentKind::Led { .. } => {
                    if let Some(branch) = stamp.branch {
                        let vf = comp.kind.forward_voltage().unwrap_or(0.0);
                        sys.stamp_voltage_source(stamp.n1, stamp.n2, branch, vf);
                    }
                }

                ComponentKind::Ammeter => {
                    if let Some(branch) = stamp.branch {
                        sys.stamp_voltage_source(stamp.n1, stamp.n2, branch, 0.0);
                    }
                }

                ComponentKind::Voltmeter
                | ComponentKind::Ground
                | ComponentKind::Gate { .. } => {}
            }
        }
        Ok(())
    }

    /// Branch currents for one step; capacitors use their companion model.
    fn derive_currents(
        &self,
        plan: &StampPlan,
        sys: &MnaSystem,
        x: &[f64],
    ) -> HashMap<String, f64> {
        let mut currents = HashMap::new();
        for stamp in &plan.stamps {
            let comp = &self.components[stamp.component];
            let current = match &comp.kind {
                ComponentKind::Resistor { .. } | ComponentKind::Switch { .. } => {
                    let v1 = MnaSystem::voltage(x, stamp.n1);
                    let v2 = MnaSystem::voltage(x, stamp.n2);
                    (v1 - v2) * comp.kind.conductance().unwrap_or(0.0)
                }
                ComponentKind::Capacitor { capacitance } => {
                    let v = MnaSystem::voltage(x, stamp.n1) - MnaSystem::voltage(x, stamp.n2);
                    (capacitance / self.dt) * (v - self.capacitor_v_prev(stamp.component))
                }
                ComponentKind::Voltmeter => 0.0,
                ComponentKind::Inductor { .. } | ComponentKind::Ammeter => stamp
                    .branch
                    .map(|b| x[sys.branch_row(b)])
                    .unwrap_or(0.0),
                ComponentKind::DcSource { .. } | ComponentKind::AcSource { .. } => stamp
                    .branch
                    .map(|b| -x[sys.branch_row(b)])
                    .unwrap_or(0.0),
                ComponentKind::Diode { .. } | ComponentKind::Led { .. } => {
                    stamp.branch.map(|b| x[sys.branch_row(b)]).unwrap_or(0.0)
                }
                ComponentKind::Ground | ComponentKind::Gate { .. } => continue,
            };
            currents.insert(comp.id.clone(), current);
        }
        currents
    }

    fn capacitor_v_prev(&self, component: usize) -> f64 {
        match self.state[component] {
            ElementState::Capacitor { v_prev } => v_prev,
            _ => 0.0,
        }
    }

    fn inductor_i_prev(&self, component: usize) -> f64 {
        match self.state[component] {
            ElementState::Inductor { i_prev } => i_prev,
            _ => 0.0,
        }
    }
}

fn initial_state(kind: &ComponentKind) -> ElementState {
    match kind {
        ComponentKind::Capacitor { .. } => ElementState::Capacitor { v_prev: 0.0 },
        ComponentKind::Inductor { .. } => ElementState::Inductor { i_prev: 0.0 },
        ComponentKind::Diode { .. } | ComponentKind::Led { .. } => {
            ElementState::Diode { on: false }
        }
        _ => ElementState::Stateless,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlist::PortRef;
    use approx::assert_relative_eq;

    fn resistor(id: &str, r: f64) -> Component {
        Component::new(id, ComponentKind::Resistor { resistance: r }, &["a", "b"])
    }

    fn source(id: &str, v: f64) -> Component {
        Component::new(id, ComponentKind::DcSource { voltage: v }, &["pos", "neg"])
    }

    fn ground(id: &str) -> Component {
        Component::new(id, ComponentKind::Ground, &["gnd"])
    }

    fn wire(id: &str, from: (&str, &str), to: (&str, &str)) -> Wire {
        Wire::new(id, PortRef::new(from.0, from.1), PortRef::new(to.0, to.1))
    }

    /// 5V -> 1k -> 1uF -> ground, a simple RC charge.
    fn rc_circuit() -> (Vec<Component>, Vec<Wire>) {
        let components = vec![
            source("V1", 5.0),
            resistor("R1", 1000.0),
            Component::new("C1", ComponentKind::Capacitor { capacitance: 1e-6 }, &["a", "b"]),
            ground("G1"),
        ];
        let wires = vec![
            wire("w1", ("V1", "pos"), ("R1", "a")),
            wire("w2", ("R1", "b"), ("C1", "a")),
            wire("w3", ("C1", "b"), ("V1", "neg")),
            wire("w4", ("V1", "neg"), ("G1", "gnd")),
        ];
        (components, wires)
    }

    #[test]
    fn test_rc_charges_toward_supply() {
        let (components, wires) = rc_circuit();
        let mut solver =
            TransientSolver::initialize(&components, &wires, TransientOptions::default()).unwrap();

        // tau = 1ms, dt = 0.1ms; 20 tau is effectively steady state
        let samples = solver.step_batch(200).unwrap();
        assert_eq!(samples.len(), 200);

        // Early on the capacitor takes real charging current
        assert!(samples[0].branch_currents["C1"] > 1e-3);
        // At steady state both cap and resistor currents die out
        let last = samples.last().unwrap();
        assert!(last.branch_currents["C1"].abs() < 1e-6);
        assert!(last.branch_currents["R1"].abs() < 1e-6);
    }

    #[test]
    fn test_rl_settles_to_dc_current() {
        // 5V -> 10mH -> 1k -> ground settles to 5mA
        let components = vec![
            source("V1", 5.0),
            Component::new("L1", ComponentKind::Inductor { inductance: 10e-3 }, &["a", "b"]),
            resistor("R1", 1000.0),
            ground("G1"),
        ];
        let wires = vec![
            wire("w1", ("V1", "pos"), ("L1", "a")),
            wire("w2", ("L1", "b"), ("R1", "a")),
            wire("w3", ("R1", "b"), ("V1", "neg")),
            wire("w4", ("V1", "neg"), ("G1", "gnd")),
        ];
        let mut solver =
            TransientSolver::initialize(&components, &wires, TransientOptions::default()).unwrap();

        let samples = solver.step_batch(100).unwrap();
        let last = samples.last().unwrap();
        assert_relative_eq!(last.branch_currents["L1"], 5e-3, epsilon = 1e-6);
        assert_relative_eq!(last.branch_currents["R1"], 5e-3, epsilon = 1e-6);
    }

    #[test]
    fn test_dt_derived_from_ac_frequency() {
        let components = vec![
            Component::new(
                "V1",
                ComponentKind::AcSource {
                    amplitude: 5.0,
                    frequency: 1000.0,
                    phase: 0.0,
                    offset: 0.0,
                    waveform: Default::default(),
                },
                &["pos", "neg"],
            ),
            resistor("R1", 1000.0),
            ground("G1"),
        ];
        let wires = vec![
            wire("w1", ("V1", "pos"), ("R1", "a")),
            wire("w2", ("R1", "b"), ("V1", "neg")),
            wire("w3", ("V1", "neg"), ("G1", "gnd")),
        ];
        let solver =
            TransientSolver::initialize(&components, &wires, TransientOptions::default()).unwrap();

        let report = solver.report();
        assert_relative_eq!(report.max_frequency, 1000.0);
        assert_relative_eq!(report.dt, 1e-5, epsilon = 1e-12);
    }

    #[test]
    fn test_ac_drive_produces_varying_current() {
        let components = vec![
            Component::new(
                "V1",
                ComponentKind::AcSource {
                    amplitude: 5.0,
                    frequency: 1000.0,
                    phase: 0.0,
                    offset: 0.0,
                    waveform: Default::default(),
                },
                &["pos", "neg"],
            ),
            resistor("R1", 1000.0),
            ground("G1"),
        ];
        let wires = vec![
            wire("w1", ("V1", "pos"), ("R1", "a")),
            wire("w2", ("R1", "b"), ("V1", "neg")),
            wire("w3", ("V1", "neg"), ("G1", "gnd")),
        ];
        let mut solver =
            TransientSolver::initialize(&components, &wires, TransientOptions::default()).unwrap();

        // Half a cycle of samples: current follows the sine
        let samples = solver.step_batch(50).unwrap();
        let i_quarter = samples[24].branch_currents["R1"];
        let i_half = samples[49].branch_currents["R1"];
        assert_relative_eq!(i_quarter, 5e-3, epsilon = 1e-4); // sine peak
        assert!(i_half.abs() < 1e-3); // back near zero
    }

    #[test]
    fn test_time_advances_by_dt_per_step() {
        let (components, wires) = rc_circuit();
        let mut solver =
            TransientSolver::initialize(&components, &wires, TransientOptions::default()).unwrap();
        let dt = solver.time_step();

        let samples = solver.step_batch(3).unwrap();
        assert_relative_eq!(samples[0].time, dt, epsilon = 1e-15);
        assert_relative_eq!(samples[2].time, 3.0 * dt, epsilon = 1e-15);
        assert_relative_eq!(solver.current_time(), 3.0 * dt, epsilon = 1e-15);
    }

    #[test]
    fn test_reset_restarts_the_run() {
        let (components, wires) = rc_circuit();
        let mut solver =
            TransientSolver::initialize(&components, &wires, TransientOptions::default()).unwrap();

        let first = solver.step_batch(5).unwrap();
        solver.reset();
        assert_eq!(solver.current_time(), 0.0);

        // Same initial history, same trajectory
        let again = solver.step_batch(5).unwrap();
        for (a, b) in first.iter().zip(&again) {
            assert_relative_eq!(
                a.branch_currents["C1"],
                b.branch_currents["C1"],
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn test_dispose_blocks_stepping() {
        let (components, wires) = rc_circuit();
        let mut solver =
            TransientSolver::initialize(&components, &wires, TransientOptions::default()).unwrap();
        solver.dispose();
        assert_eq!(
            solver.step_batch(1).unwrap_err(),
            EngineError::SolverDisposed
        );
    }

    #[test]
    fn test_invalid_dt_override_rejected() {
        let (components, wires) = rc_circuit();
        let options = TransientOptions {
            dt_override: Some(0.0),
            ..Default::default()
        };
        assert_eq!(
            TransientSolver::initialize(&components, &wires, options).unwrap_err(),
            EngineError::InvalidTimeStep { dt: 0.0 }
        );
    }

    #[test]
    fn test_diode_state_carries_across_steps() {
        // Forward LED behind a resistor: turns on within the first steps
        let components = vec![
            source("V1", 5.0),
            resistor("R1", 100.0),
            Component::new(
                "D1",
                ComponentKind::Led {
                    color: None,
                    forward_voltage: Some(2.0),
                },
                &["anode", "cathode"],
            ),
            ground("G1"),
        ];
        let wires = vec![
            wire("w1", ("V1", "pos"), ("R1", "a")),
            wire("w2", ("R1", "b"), ("D1", "anode")),
            wire("w3", ("D1", "cathode"), ("V1", "neg")),
            wire("w4", ("V1", "neg"), ("G1", "gnd")),
        ];
        let mut solver =
            TransientSolver::initialize(&components, &wires, TransientOptions::default()).unwrap();

        let samples = solver.step_batch(3).unwrap();
        // First step still sees the OFF state from initialization
        assert!(samples[0].branch_currents["D1"].abs() < 1e-12);
        // The state flip from step one conducts from step two onward
        assert_relative_eq!(samples[1].branch_currents["D1"], 30e-3, epsilon = 1e-6);
        assert_relative_eq!(samples[2].branch_currents["D1"], 30e-3, epsilon = 1e-6);
    }
}
