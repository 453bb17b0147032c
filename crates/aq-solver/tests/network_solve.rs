//! Full-period solves on small networks.

use aq_core::{NodeId, Tolerances};
use aq_network::{
    HydraulicState, LinkStatus, Network, NetworkBuilder, PipeSpec, TankSpec, ValveKind,
    ValveSpec,
};
use aq_solver::status::{link_status, valve_status};
use aq_solver::{
    DenseCholesky, HydraulicConfig, HydraulicSolver, LinearSolver, LinearSystem, SolverError,
    SolverResult, SparsePattern, StatusLog,
};
use nalgebra::DVector;

/// Initial state with junction demands at their base values.
fn state_with_demands(net: &Network) -> HydraulicState {
    let mut state = HydraulicState::initial(net, &Tolerances::default());
    for node in net.nodes() {
        state.nodes[node.id.slot()].demand = node.demands.iter().map(|d| d.base).sum();
    }
    state
}

/// Sum of link flows into `node` minus flows out.
fn net_inflow(net: &Network, state: &HydraulicState, node: NodeId) -> f64 {
    net.links()
        .iter()
        .map(|l| {
            let q = state.link(l.id).flow;
            if l.to == node {
                q
            } else if l.from == node {
                -q
            } else {
                0.0
            }
        })
        .sum()
}

fn looped_network() -> Network {
    // R(100) -> J1 -> J2 -> J4
    //             \-> J3 ---^
    let mut b = NetworkBuilder::new();
    let r = b.add_reservoir("R", 100.0);
    let j1 = b.add_junction("J1", 10.0);
    let j2 = b.add_junction("J2", 12.0);
    let j3 = b.add_junction("J3", 8.0);
    let j4 = b.add_junction("J4", 5.0);
    b.add_demand(j2, 0.4, None);
    b.add_demand(j3, 0.3, None);
    b.add_demand(j4, 0.8, None);
    b.add_pipe("P1", r, j1, PipeSpec::new(2000.0, 1.5, 120.0));
    b.add_pipe("P2", j1, j2, PipeSpec::new(1000.0, 1.0, 110.0));
    b.add_pipe("P3", j1, j3, PipeSpec::new(1200.0, 0.8, 100.0));
    b.add_pipe("P4", j2, j4, PipeSpec::new(900.0, 0.8, 100.0));
    b.add_pipe("P5", j3, j4, PipeSpec::new(800.0, 0.8, 130.0).with_minor_loss(2.0));
    b.build().unwrap()
}

fn prv_network() -> Network {
    // R(100) -> A -> [PRV 60] -> B(elev 10, demand 1) -> R(40)
    let mut b = NetworkBuilder::new();
    let r1 = b.add_reservoir("R1", 100.0);
    let a = b.add_junction("A", 0.0);
    let bn = b.add_junction("B", 10.0);
    let r2 = b.add_reservoir("R2", 40.0);
    b.add_demand(bn, 1.0, None);
    b.add_pipe("P1", r1, a, PipeSpec::new(1000.0, 2.0, 100.0));
    b.add_valve("PRV", a, bn, ValveSpec::new(ValveKind::Prv, 1.0).with_setting(60.0));
    b.add_pipe("P2", bn, r2, PipeSpec::new(5000.0, 1.0, 100.0));
    b.build().unwrap()
}

#[test]
fn looped_network_conserves_flow() {
    let net = looped_network();
    let mut state = state_with_demands(&net);
    let mut solver = HydraulicSolver::new(&net, HydraulicConfig::default()).unwrap();
    let sol = solver.solve(&mut state, &[]).unwrap();

    assert!(sol.converged);
    assert!(sol.relative_error <= 0.001);
    for node in net.nodes().iter().filter(|n| n.is_junction()) {
        let imbalance = net_inflow(&net, &state, node.id) - state.node(node.id).demand;
        assert!(imbalance.abs() < 1e-4, "{}: {imbalance}", node.name);
    }
    // reservoir supplies the total demand
    let r = net.find_node("R").unwrap();
    assert!((state.node(r).demand + 1.5).abs() < 1e-4);
    // heads fall along the flow path
    let h = |name: &str| state.head(net.find_node(name).unwrap());
    assert!(h("J1") < 100.0);
    assert!(h("J4") < h("J2"));
}

#[test]
fn prv_pins_downstream_head() {
    let tol = Tolerances::default();
    let net = prv_network();
    let mut state = state_with_demands(&net);
    let mut solver = HydraulicSolver::new(&net, HydraulicConfig::default()).unwrap();
    let sol = solver.solve(&mut state, &[]).unwrap();
    assert!(sol.converged);

    let prv = net.find_link("PRV").unwrap();
    let b = net.find_node("B").unwrap();
    assert_eq!(state.link(prv).status, LinkStatus::Active);
    assert!((state.head(b) - 70.0).abs() < tol.htol, "head {}", state.head(b));
    assert!(state.link(prv).flow > 0.0);

    // B passes its surplus on to the lower reservoir
    let p2 = net.find_link("P2").unwrap();
    assert!(state.link(p2).flow > 0.0);
    let imbalance = net_inflow(&net, &state, b) - 1.0;
    assert!(imbalance.abs() < tol.qtol, "imbalance {imbalance}");
}

#[test]
fn status_resolution_is_idempotent_after_convergence() {
    let tol = Tolerances::default();
    for net in [prv_network(), looped_network()] {
        let mut state = state_with_demands(&net);
        let mut solver = HydraulicSolver::new(&net, HydraulicConfig::default()).unwrap();
        assert!(solver.solve(&mut state, &[]).unwrap().converged);

        let before = state.clone();
        let mut log = StatusLog::new(false);
        assert!(!valve_status(&net, &mut state, &tol, &mut log));
        assert!(!link_status(&net, &mut state, &tol, &mut log));
        assert!(log.changes().is_empty());
        assert_eq!(before, state);
    }
}

#[test]
fn check_valve_closes_against_higher_head() {
    let mut b = NetworkBuilder::new();
    let low = b.add_reservoir("LOW", 50.0);
    let high = b.add_reservoir("HIGH", 100.0);
    let j = b.add_junction("J", 0.0);
    b.add_demand(j, 0.2, None);
    let cv = b.add_check_valve("CV", low, j, PipeSpec::new(500.0, 1.0, 100.0));
    b.add_pipe("P", high, j, PipeSpec::new(500.0, 1.0, 100.0));
    let net = b.build().unwrap();

    let mut state = state_with_demands(&net);
    let mut solver = HydraulicSolver::new(&net, HydraulicConfig::default()).unwrap();
    let sol = solver.solve(&mut state, &[]).unwrap();

    assert!(sol.converged);
    assert!(state.link(cv).status.is_closed());
    assert!(state.link(cv).flow.abs() < 1e-6);
    assert!(state.head(j) > 50.0);
    assert!(
        sol.status_changes
            .iter()
            .any(|c| c.link == cv && c.to == LinkStatus::Closed)
    );
}

#[test]
fn pump_lifts_into_higher_reservoir() {
    let mut b = NetworkBuilder::new();
    let src = b.add_reservoir("SRC", 0.0);
    let dst = b.add_reservoir("DST", 40.0);
    let j = b.add_junction("J", 0.0);
    let curve = b.add_curve("H", vec![1.0], vec![60.0]);
    let pump = b.add_pump("PU", src, j, curve).unwrap();
    b.add_pipe("P", j, dst, PipeSpec::new(1000.0, 1.0, 120.0));
    let net = b.build().unwrap();

    let mut state = state_with_demands(&net);
    let mut solver = HydraulicSolver::new(&net, HydraulicConfig::default()).unwrap();
    let sol = solver.solve(&mut state, &[]).unwrap();

    assert!(sol.converged);
    let ls = state.link(pump);
    assert_eq!(ls.status, LinkStatus::Open);
    assert!(ls.flow > 0.0);
    // operating point lies on the fitted curve h = 80 - 20 q²
    let gain = state.head(j);
    assert!(gain > 40.0 && gain < 80.0);
    assert!((gain - (80.0 - 20.0 * ls.flow * ls.flow)).abs() < 0.5);
    assert!((state.node(dst).demand - ls.flow).abs() < 1e-4);
}

#[test]
fn full_tank_that_can_overflow_keeps_its_inflow() {
    let mut b = NetworkBuilder::new();
    let r = b.add_reservoir("R", 120.0);
    let full = b
        .add_tank("FULL", TankSpec::new(0.0, 50.0, 0.0, 50.0, 20.0).with_overflow(true))
        .unwrap();
    let half = b
        .add_tank("HALF", TankSpec::new(0.0, 25.0, 0.0, 50.0, 20.0))
        .unwrap();
    let j = b.add_junction("J", 0.0);
    b.add_pipe("P0", r, j, PipeSpec::new(500.0, 1.5, 120.0));
    let p1 = b.add_pipe("P1", j, full, PipeSpec::new(1000.0, 1.0, 120.0));
    b.add_pipe("P2", j, half, PipeSpec::new(1000.0, 1.0, 120.0));
    let net = b.build().unwrap();

    let mut state = state_with_demands(&net);
    let mut solver = HydraulicSolver::new(&net, HydraulicConfig::default()).unwrap();
    assert!(solver.solve(&mut state, &[]).unwrap().converged);

    assert_eq!(state.link(p1).status, LinkStatus::Open);
    assert!(state.node(full).demand > 0.0);
    let status = |id| state.node(id).tank.unwrap().status;
    assert_eq!(status(full), LinkStatus::Overflowing);
    assert_eq!(status(half), LinkStatus::Filling);
}

#[test]
fn emitter_discharges_with_pressure() {
    let mut b = NetworkBuilder::new();
    let r = b.add_reservoir("R", 100.0);
    let j = b.add_junction("J", 20.0);
    b.set_emitter(j, 0.05);
    let p = b.add_pipe("P", r, j, PipeSpec::new(1000.0, 1.0, 120.0));
    let net = b.build().unwrap();

    let mut state = state_with_demands(&net);
    let mut solver = HydraulicSolver::new(&net, HydraulicConfig::default()).unwrap();
    assert!(solver.solve(&mut state, &[]).unwrap().converged);

    let ns = state.node(j);
    let expected = 0.05 * (ns.head - 20.0).sqrt();
    assert!((ns.emitter_flow - expected).abs() < 5e-3);
    assert!((state.link(p).flow - ns.emitter_flow).abs() < 1e-4);
}

#[test]
fn parallel_assembly_matches_sequential() {
    let net = looped_network();
    let mut seq = state_with_demands(&net);
    let mut par = seq.clone();

    HydraulicSolver::new(&net, HydraulicConfig::default())
        .unwrap()
        .solve(&mut seq, &[])
        .unwrap();
    let config = HydraulicConfig {
        parallel_assembly: true,
        ..HydraulicConfig::default()
    };
    HydraulicSolver::new(&net, config)
        .unwrap()
        .solve(&mut par, &[])
        .unwrap();

    for (a, b) in seq.nodes.iter().zip(&par.nodes) {
        assert!((a.head - b.head).abs() < 1e-6);
    }
    for (a, b) in seq.links.iter().zip(&par.links) {
        assert!((a.flow - b.flow).abs() < 1e-6);
    }
}

/// Reports a singular system at `row`; only on the first call when `fail_once`.
struct Failing {
    row: usize,
    calls: usize,
    fail_once: bool,
    inner: DenseCholesky,
}

impl LinearSolver for Failing {
    fn solve(
        &mut self,
        system: &LinearSystem,
        pattern: &SparsePattern,
    ) -> SolverResult<DVector<f64>> {
        self.calls += 1;
        if !self.fail_once || self.calls == 1 {
            return Err(SolverError::Singular { row: self.row });
        }
        self.inner.solve(system, pattern)
    }
}

#[test]
fn singular_row_forces_active_valve_out() {
    let net = prv_network();
    let b = net.find_node("B").unwrap();
    let prv = net.find_link("PRV").unwrap();
    let solver = HydraulicSolver::new(&net, HydraulicConfig::default()).unwrap();
    let row = solver.pattern().row_map().row(b).unwrap();
    let mut solver = solver.with_linear_solver(Box::new(Failing {
        row,
        calls: 0,
        fail_once: true,
        inner: DenseCholesky::new(),
    }));

    let mut state = state_with_demands(&net);
    let sol = solver.solve(&mut state, &[]).unwrap();
    assert_eq!(sol.status_changes[0].link, prv);
    assert_eq!(sol.status_changes[0].from, LinkStatus::Active);
    assert_eq!(sol.status_changes[0].to, LinkStatus::Xpressure);
}

#[test]
fn unrepairable_singular_system_is_ill_conditioned() {
    let net = prv_network();
    let b = net.find_node("B").unwrap();
    let solver = HydraulicSolver::new(&net, HydraulicConfig::default()).unwrap();
    let row = solver.pattern().row_map().row(b).unwrap();
    let mut solver = solver.with_linear_solver(Box::new(Failing {
        row,
        calls: 0,
        fail_once: false,
        inner: DenseCholesky::new(),
    }));

    let mut state = state_with_demands(&net);
    let err = solver.solve(&mut state, &[]).unwrap_err();
    assert_eq!(err, SolverError::IllConditioned { node: "B".into() });
    assert_eq!(err.code(), 110);
    // the valve was tried first
    assert_eq!(state.link(net.find_link("PRV").unwrap()).status, LinkStatus::Xpressure);
}

#[test]
fn first_adjacent_valve_decides_the_retry() {
    // a TCV listed ahead of the PRV at B shadows it
    let mut b = NetworkBuilder::new();
    let r1 = b.add_reservoir("R1", 100.0);
    let a = b.add_junction("A", 0.0);
    let bn = b.add_junction("B", 10.0);
    let r2 = b.add_reservoir("R2", 40.0);
    b.add_demand(bn, 1.0, None);
    b.add_pipe("P1", r1, a, PipeSpec::new(1000.0, 2.0, 100.0));
    let tcv = b.add_valve("TCV", a, bn, ValveSpec::new(ValveKind::Tcv, 1.0).with_setting(5.0));
    let prv = b.add_valve("PRV", a, bn, ValveSpec::new(ValveKind::Prv, 1.0).with_setting(60.0));
    b.add_pipe("P2", bn, r2, PipeSpec::new(5000.0, 1.0, 100.0));
    let net = b.build().unwrap();

    let solver = HydraulicSolver::new(&net, HydraulicConfig::default()).unwrap();
    let row = solver.pattern().row_map().row(bn).unwrap();
    let mut solver = solver.with_linear_solver(Box::new(Failing {
        row,
        calls: 0,
        fail_once: true,
        inner: DenseCholesky::new(),
    }));

    let mut state = state_with_demands(&net);
    let err = solver.solve(&mut state, &[]).unwrap_err();
    assert_eq!(err, SolverError::IllConditioned { node: "B".into() });
    assert_eq!(state.link(prv).status, LinkStatus::Active);
    assert!(!state.link(tcv).status.is_closed());
}

#[test]
fn rejects_bad_config() {
    let net = looped_network();
    let config = HydraulicConfig {
        accuracy: 0.0,
        ..HydraulicConfig::default()
    };
    assert!(matches!(
        HydraulicSolver::new(&net, config),
        Err(SolverError::ProblemSetup { .. })
    ));
}
