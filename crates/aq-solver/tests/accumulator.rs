//! Accumulation into the linear system does not depend on write order.

use aq_solver::LinearSystem;
use proptest::prelude::*;

const ROWS: usize = 6;
const LINKS: usize = 9;
const NODES: usize = 8;

#[derive(Debug, Clone, Copy)]
enum Write {
    Diag(usize, f64),
    Offdiag(usize, f64),
    Rhs(usize, f64),
    Inflow(usize, f64),
}

fn write() -> impl Strategy<Value = Write> {
    prop_oneof![
        (0..ROWS, -1e3..1e3f64).prop_map(|(i, v)| Write::Diag(i, v)),
        (0..LINKS, -1e3..1e3f64).prop_map(|(i, v)| Write::Offdiag(i, v)),
        (0..ROWS, -1e3..1e3f64).prop_map(|(i, v)| Write::Rhs(i, v)),
        (0..NODES, -1e3..1e3f64).prop_map(|(i, v)| Write::Inflow(i, v)),
    ]
}

fn apply(sys: &mut LinearSystem, w: Write) {
    match w {
        Write::Diag(i, v) => sys.add_diag(i, v),
        Write::Offdiag(i, v) => sys.add_offdiag(i, v),
        Write::Rhs(i, v) => sys.add_rhs(i, v),
        Write::Inflow(i, v) => sys.add_inflow(i, v),
    }
}

fn close(a: &LinearSystem, b: &LinearSystem) -> bool {
    let near = |x: f64, y: f64| (x - y).abs() <= 1e-9 * (1.0 + x.abs().max(y.abs()));
    (0..ROWS).all(|i| near(a.diag(i), b.diag(i)) && near(a.rhs(i), b.rhs(i)))
        && (0..LINKS).all(|k| near(a.offdiag(k), b.offdiag(k)))
        && (0..NODES).all(|n| near(a.inflow(n), b.inflow(n)))
}

proptest! {
    #[test]
    fn reversed_order_gives_same_system(writes in prop::collection::vec(write(), 0..60)) {
        let mut forward = LinearSystem::new(ROWS, LINKS, NODES);
        let mut backward = LinearSystem::new(ROWS, LINKS, NODES);
        for &w in &writes {
            apply(&mut forward, w);
        }
        for &w in writes.iter().rev() {
            apply(&mut backward, w);
        }
        prop_assert!(close(&forward, &backward));
    }

    #[test]
    fn split_and_merge_gives_same_system(
        writes in prop::collection::vec(write(), 0..60),
        split in 0usize..60,
    ) {
        let split = split.min(writes.len());
        let mut whole = LinearSystem::new(ROWS, LINKS, NODES);
        let mut left = LinearSystem::new(ROWS, LINKS, NODES);
        let mut right = LinearSystem::new(ROWS, LINKS, NODES);
        for &w in &writes {
            apply(&mut whole, w);
        }
        for &w in &writes[..split] {
            apply(&mut left, w);
        }
        for &w in &writes[split..] {
            apply(&mut right, w);
        }
        let merged = right.merge(&left);
        prop_assert!(close(&whole, &merged));
    }
}
