//! MNA system storage, stamp helpers, and per-component stamp planning.

use tracing::trace;

use crate::error::{EngineError, Result};
use crate::netlist::{Component, ComponentKind, Topology};

use super::linear::{self, Matrix};

/// The assembled MNA system Ax = z being built for one solve.
///
/// Rows/columns 0..num_unknowns are node voltages; branch-current rows
/// follow. A node index of `None` means ground and contributes nothing.
#[derive(Debug)]
pub struct MnaSystem {
    /// Coefficient matrix A
    pub a: Matrix,
    /// Source vector z
    pub z: Vec<f64>,
    num_unknowns: usize,
}

impl MnaSystem {
    /// Create a system for `num_unknowns` node voltages plus `num_branches`
    /// auxiliary current variables.
    pub fn new(num_unknowns: usize, num_branches: usize) -> Self {
        let size = num_unknowns + num_branches;
        Self {
            a: Matrix::new(size),
            z: vec![0.0; size],
            num_unknowns,
        }
    }

    /// Absolute row/column of a branch-current variable.
    pub fn branch_row(&self, branch: usize) -> usize {
        self.num_unknowns + branch
    }

    /// Stamp a conductance between two nodes:
    ///   A[n1,n1] += G, A[n2,n2] += G, A[n1,n2] -= G, A[n2,n1] -= G
    pub fn stamp_conductance(&mut self, n1: Option<usize>, n2: Option<usize>, g: f64) {
        if let Some(i) = n1 {
            self.a.add(i, i, g);
        }
        if let Some(j) = n2 {
            self.a.add(j, j, g);
        }
        if let (Some(i), Some(j)) = (n1, n2) {
            self.a.add(i, j, -g);
            self.a.add(j, i, -g);
        }
    }

    /// Stamp an ideal voltage source enforcing V[n+] - V[n-] = E, with its
    /// branch current as auxiliary unknown `branch`.
    pub fn stamp_voltage_source(
        &mut self,
        n_pos: Option<usize>,
        n_neg: Option<usize>,
        branch: usize,
        voltage: f64,
    ) {
        let br = self.branch_row(branch);
        if let Some(i) = n_pos {
            self.a.add(br, i, 1.0);
            self.a.add(i, br, 1.0);
        }
        if let Some(j) = n_neg {
            self.a.add(br, j, -1.0);
            self.a.add(j, br, -1.0);
        }
        self.z[br] += voltage;
    }

    /// Stamp an independent current source, current flowing from n+ to n-.
    pub fn stamp_current_source(&mut self, n_pos: Option<usize>, n_neg: Option<usize>, current: f64) {
        if let Some(i) = n_pos {
            self.z[i] -= current;
        }
        if let Some(j) = n_neg {
            self.z[j] += current;
        }
    }

    /// Add a self-term on a branch row (series resistance of a companion model).
    pub fn add_branch_resistance(&mut self, branch: usize, r: f64) {
        let br = self.branch_row(branch);
        self.a.add(br, br, -r);
    }

    /// Solve the assembled system, tagging a singular matrix with the
    /// analysis that hit it.
    pub fn solve(&self, analysis: &'static str) -> Result<Vec<f64>> {
        linear::solve(&self.a, &self.z).ok_or(EngineError::singular(analysis))
    }

    /// Voltage at a node index, treating ground as 0.
    pub fn voltage(x: &[f64], node: Option<usize>) -> f64 {
        node.map(|i| x[i]).unwrap_or(0.0)
    }
}

/// Per-component stamping record: resolved node indices plus an optional
/// auxiliary branch index.
#[derive(Debug, Clone)]
pub struct ComponentStamp {
    /// Index into the caller's component slice
    pub component: usize,
    /// Matrix index of the first port's node (`None` = ground)
    pub n1: Option<usize>,
    /// Matrix index of the second port's node
    pub n2: Option<usize>,
    /// Auxiliary branch-current index, if this element needs one
    pub branch: Option<usize>,
}

/// The full stamping plan for one assembly pass.
#[derive(Debug, Clone)]
pub struct StampPlan {
    pub stamps: Vec<ComponentStamp>,
    pub num_branches: usize,
}

impl StampPlan {
    /// Resolve node indices and allocate branch-current variables.
    ///
    /// `diode_on[i]` gives the tentative state of component `i` when it is
    /// a diode or LED; ON diodes are stamped as ideal voltage sources and
    /// therefore get a branch variable, OFF diodes get none. `transient`
    /// switches capacitors/inductors to their companion-model treatment
    /// (which does not change branch allocation: inductors carry a branch
    /// variable in both DC and transient analysis).
    pub fn build(
        components: &[Component],
        topology: &Topology,
        diode_on: &[bool],
    ) -> Result<Self> {
        let mut stamps = Vec::with_capacity(components.len());
        let mut num_branches = 0usize;

        for (idx, comp) in components.iter().enumerate() {
            let (n1, n2) = match comp.kind {
                // No analog stamp and possibly not two ports
                ComponentKind::Ground | ComponentKind::Gate { .. } => (None, None),
                _ => {
                    let node1 = topology.require_node(&comp.port(0))?;
                    let node2 = topology.require_node(&comp.port(1))?;
                    (topology.matrix_index(node1), topology.matrix_index(node2))
                }
            };

            let needs_branch = match comp.kind {
                ComponentKind::DcSource { .. }
                | ComponentKind::AcSource { .. }
                | ComponentKind::Inductor { .. }
                | ComponentKind::Ammeter => true,
                ComponentKind::Diode { .. } | ComponentKind::Led { .. } => diode_on[idx],
                _ => false,
            };

            let branch = if needs_branch {
                let b = num_branches;
                num_branches += 1;
                Some(b)
            } else {
                None
            };

            stamps.push(ComponentStamp {
                component: idx,
                n1,
                n2,
                branch,
            });
        }

        trace!(
            components = components.len(),
            branches = num_branches,
            "stamp plan built"
        );

        Ok(Self {
            stamps,
            num_branches,
        })
    }
}
