//! Discrete link status machines.
//!
//! Re-run after trial solves to decide whether any link must change state.
//! Status changes never fail; they only tell the caller to iterate again.

use aq_core::{LinkId, Tolerances};
use aq_network::{HydraulicState, Link, LinkKind, LinkStatus, Network, Pump, ValveKind};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One link status transition within a period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub link: LinkId,
    pub from: LinkStatus,
    pub to: LinkStatus,
}

/// Collects status transitions; logs them when verbose.
#[derive(Debug, Default, Clone)]
pub struct StatusLog {
    changes: Vec<StatusChange>,
    verbose: bool,
}

impl StatusLog {
    pub fn new(verbose: bool) -> Self {
        Self {
            changes: Vec::new(),
            verbose,
        }
    }

    pub fn record(&mut self, link: &Link, from: LinkStatus, to: LinkStatus) {
        if self.verbose {
            debug!(link = %link.name, kind = link.category(), ?from, ?to, "status change");
        }
        self.changes.push(StatusChange {
            link: link.id,
            from,
            to,
        });
    }

    pub fn changes(&self) -> &[StatusChange] {
        &self.changes
    }

    pub fn take(&mut self) -> Vec<StatusChange> {
        std::mem::take(&mut self.changes)
    }
}

/// Check valve: closed unless the head drop favors forward flow.
///
/// `dh` is the head at the upstream end minus the downstream end.
pub fn cv_status(s: LinkStatus, dh: f64, q: f64, tol: &Tolerances) -> LinkStatus {
    if dh.abs() > tol.htol {
        if dh < -tol.htol || q < -tol.qtol {
            LinkStatus::Closed
        } else {
            LinkStatus::Open
        }
    } else if q < -tol.qtol {
        LinkStatus::Closed
    } else {
        s
    }
}

/// Pump: cannot deliver a head gain above its speed-scaled shutoff head.
pub fn pump_status(pump: &Pump, speed: f64, gain: f64, tol: &Tolerances) -> LinkStatus {
    if gain > pump.max_head(speed) + tol.htol {
        LinkStatus::Xhead
    } else {
        LinkStatus::Open
    }
}

/// Pressure reducing valve holding downstream head `hset`.
pub fn prv_status(
    km: f64,
    s: LinkStatus,
    hset: f64,
    h1: f64,
    h2: f64,
    q: f64,
    tol: &Tolerances,
) -> LinkStatus {
    let hml = km * q * q;
    let htol = tol.htol;
    match s {
        LinkStatus::Active => {
            if q < -tol.qtol {
                LinkStatus::Closed
            } else if h1 - hml < hset - htol {
                LinkStatus::Open
            } else {
                LinkStatus::Active
            }
        }
        LinkStatus::Open => {
            if q < -tol.qtol {
                LinkStatus::Closed
            } else if h2 >= hset + htol {
                LinkStatus::Active
            } else {
                LinkStatus::Open
            }
        }
        LinkStatus::Closed => {
            if h1 >= hset + htol && h2 < hset - htol {
                LinkStatus::Active
            } else if h1 < hset - htol && h1 > h2 + htol {
                LinkStatus::Open
            } else {
                LinkStatus::Closed
            }
        }
        LinkStatus::Xpressure if q < -tol.qtol => LinkStatus::Closed,
        other => other,
    }
}

/// Pressure sustaining valve holding upstream head `hset`.
pub fn psv_status(
    km: f64,
    s: LinkStatus,
    hset: f64,
    h1: f64,
    h2: f64,
    q: f64,
    tol: &Tolerances,
) -> LinkStatus {
    let hml = km * q * q;
    let htol = tol.htol;
    match s {
        LinkStatus::Active => {
            if q < -tol.qtol {
                LinkStatus::Closed
            } else if h2 + hml > hset + htol {
                LinkStatus::Open
            } else {
                LinkStatus::Active
            }
        }
        LinkStatus::Open => {
            if q < -tol.qtol {
                LinkStatus::Closed
            } else if h1 < hset - htol {
                LinkStatus::Active
            } else {
                LinkStatus::Open
            }
        }
        LinkStatus::Closed => {
            if h2 > hset + htol && h1 > h2 + htol {
                LinkStatus::Open
            } else if h1 >= hset + htol && h1 > h2 + htol {
                LinkStatus::Active
            } else {
                LinkStatus::Closed
            }
        }
        LinkStatus::Xpressure if q < -tol.qtol => LinkStatus::Closed,
        other => other,
    }
}

/// Flow control valve: `Xfcv` when it cannot pass its target flow.
pub fn fcv_status(
    s: LinkStatus,
    setting: f64,
    h1: f64,
    h2: f64,
    q: f64,
    tol: &Tolerances,
) -> LinkStatus {
    if h1 - h2 < -tol.htol || q < -tol.qtol {
        LinkStatus::Xfcv
    } else if s == LinkStatus::Xfcv && q >= setting {
        LinkStatus::Active
    } else {
        s
    }
}

/// Temporarily close a link that would overfill or drain a tank.
///
/// Returns the status the link must take, or `None` to leave it alone.
fn tank_status(
    network: &Network,
    link: &Link,
    state: &HydraulicState,
    current: LinkStatus,
    tol: &Tolerances,
) -> Option<LinkStatus> {
    if current.is_closed() {
        return None;
    }
    let mut q = state.link(link.id).flow;
    let (tank_node, other) = if network.node(link.from)?.storage_tank().is_some() {
        (link.from, link.to)
    } else {
        q = -q;
        (link.to, link.from)
    };
    let node = network.node(tank_node)?;
    let tank = node.storage_tank()?;

    let head = state.head(tank_node);
    let h = head - state.head(other);
    let is_pump = matches!(link.kind, LinkKind::Pump(_));

    if head >= tank.h_max - tol.htol && !tank.can_overflow {
        let fills = if is_pump {
            link.to == tank_node
        } else {
            cv_status(LinkStatus::Open, h, q, tol) == LinkStatus::Closed
        };
        if fills {
            return Some(LinkStatus::TempClosed);
        }
    }
    if head <= tank.h_min + tol.htol {
        let drains = if is_pump {
            link.from == tank_node
        } else {
            cv_status(LinkStatus::Closed, h, q, tol) == LinkStatus::Open
        };
        if drains {
            return Some(LinkStatus::TempClosed);
        }
    }
    None
}

/// Re-evaluate PRV and PSV states with a setpoint. Returns true on any change.
pub fn valve_status(
    network: &Network,
    state: &mut HydraulicState,
    tol: &Tolerances,
    log: &mut StatusLog,
) -> bool {
    let mut change = false;
    for &id in network.valves() {
        let Some(link) = network.link(id) else {
            continue;
        };
        let ls = *state.link(id);
        let Some(setting) = ls.setting else {
            continue;
        };
        let (Some(n1), Some(n2)) = (network.node(link.from), network.node(link.to)) else {
            continue;
        };
        let (h1, h2) = (state.head(link.from), state.head(link.to));
        let new = match link.valve() {
            Some(ValveKind::Prv) => prv_status(
                link.minor_loss,
                ls.status,
                n2.elevation + setting,
                h1,
                h2,
                ls.flow,
                tol,
            ),
            Some(ValveKind::Psv) => psv_status(
                link.minor_loss,
                ls.status,
                n1.elevation + setting,
                h1,
                h2,
                ls.flow,
                tol,
            ),
            _ => continue,
        };
        if new != ls.status {
            log.record(link, ls.status, new);
            state.links[id.slot()].status = new;
            change = true;
        }
    }
    change
}

/// Re-evaluate check valves, pumps, FCVs and links attached to tanks.
/// Returns true on any change.
pub fn link_status(
    network: &Network,
    state: &mut HydraulicState,
    tol: &Tolerances,
    log: &mut StatusLog,
) -> bool {
    let mut change = false;
    for link in network.links() {
        let slot = link.id.slot();
        let ls = *state.link(link.id);
        let (h1, h2) = (state.head(link.from), state.head(link.to));
        let dh = h1 - h2;

        let mut status = match ls.status {
            LinkStatus::Xhead | LinkStatus::TempClosed => LinkStatus::Open,
            s => s,
        };
        match &link.kind {
            LinkKind::CheckValve => status = cv_status(status, dh, ls.flow, tol),
            LinkKind::Pump(pump) => {
                let speed = ls.setting.unwrap_or(0.0);
                if status >= LinkStatus::Open && speed > 0.0 {
                    status = pump_status(pump, speed, -dh, tol);
                }
            }
            LinkKind::Valve(ValveKind::Fcv) => {
                if let Some(setting) = ls.setting {
                    status = fcv_status(ls.status, setting, h1, h2, ls.flow, tol);
                }
            }
            _ => {}
        }
        state.links[slot].status = status;
        if let Some(forced) = tank_status(network, link, state, status, tol) {
            status = forced;
            state.links[slot].status = status;
        }

        if status != ls.status {
            log.record(link, ls.status, status);
            change = true;
        }
    }
    change
}
