//! Tank volumes stay inside their limits whatever the inflow history.

use aq_core::Tolerances;
use aq_network::{HydraulicState, Network, NetworkBuilder, PipeSpec, TankSpec};
use aq_sim::{TankSnapshot, advance_tanks};
use proptest::prelude::*;

fn network(overflow: bool) -> Network {
    let mut b = NetworkBuilder::new();
    let t = b
        .add_tank(
            "T",
            TankSpec::new(20.0, 4.0, 1.0, 12.0, 15.0).with_overflow(overflow),
        )
        .unwrap();
    let j = b.add_junction("J", 0.0);
    b.add_pipe("P", t, j, PipeSpec::new(300.0, 1.0, 100.0));
    b.build().unwrap()
}

proptest! {
    #[test]
    fn volume_and_head_stay_within_limits(
        overflow in any::<bool>(),
        steps in prop::collection::vec((-5.0..5.0f64, 1i64..7200), 1..40),
    ) {
        let net = network(overflow);
        let t = net.find_node("T").unwrap();
        let tank = net.node(t).unwrap().storage_tank().unwrap().clone();
        let mut state = HydraulicState::initial(&net, &Tolerances::default());

        for (q, dt) in steps {
            state.nodes[t.slot()].demand = q;
            advance_tanks(&net, &mut state, dt);
            let v = state.node(t).tank.unwrap().volume;
            prop_assert!(v >= tank.v_min && v <= tank.v_max);
            let h = state.head(t);
            prop_assert!(h >= tank.h_min - 1e-9 && h <= tank.h_max + 1e-9);
        }
    }

    #[test]
    fn snapshot_undoes_any_advance(
        steps in prop::collection::vec((-5.0..5.0f64, 1i64..7200), 1..10),
    ) {
        let net = network(false);
        let t = net.find_node("T").unwrap();
        let mut state = HydraulicState::initial(&net, &Tolerances::default());
        let before = state.clone();
        let snap = TankSnapshot::capture(&net, &state);
        for (q, dt) in steps {
            state.nodes[t.slot()].demand = q;
            advance_tanks(&net, &mut state, dt);
        }
        snap.restore(&mut state);
        prop_assert_eq!(state.head(t), before.head(t));
        prop_assert_eq!(state.node(t).tank, before.node(t).tank);
    }
}
