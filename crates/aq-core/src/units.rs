// aq-core/src/units.rs
//
// Internal computation runs on US customary hydraulic units: heads and lengths
// in ft, flows in ft³/s, volumes in ft³, time in whole seconds. Run timing is
// given as uom `Time` and rounded onto the whole-second clock here.

use uom::si::f64::Time as UomTime;

pub type Time = UomTime;

use crate::numeric::Seconds;

#[inline]
pub fn minutes(v: f64) -> Time {
    use uom::si::time::minute;
    Time::new::<minute>(v)
}

#[inline]
pub fn hours(v: f64) -> Time {
    use uom::si::time::hour;
    Time::new::<hour>(v)
}

/// Round a duration to the whole-second simulation clock.
#[inline]
pub fn to_seconds(t: Time) -> Seconds {
    use uom::si::time::second;
    t.get::<second>().round() as Seconds
}

pub mod constants {
    use crate::numeric::Seconds;

    pub const SEC_PER_DAY: Seconds = 86_400;
    pub const SEC_PER_HOUR: f64 = 3_600.0;
    /// Minor loss conversion: `0.02517 · K / d⁴` gives head per flow².
    pub const MINOR_LOSS_FACTOR: f64 = 0.02517;
    pub const KW_PER_HP: f64 = 0.7457;
    /// Water horsepower divisor for head (ft) × flow (cfs).
    pub const HP_DIVISOR: f64 = 8.814;
    /// Gravitational acceleration (ft/s²).
    pub const G_FTPS2: f64 = 32.2;
}
