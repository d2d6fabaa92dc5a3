//-
// Copyright (c) 2017 Jason Lingle
//
// Permission to  use, copy,  modify, and/or distribute  this software  for any
// purpose  with or  without fee  is hereby  granted, provided  that the  above
// copyright notice and this permission notice appear in all copies.
//
// THE SOFTWARE  IS PROVIDED "AS  IS" AND  THE AUTHOR DISCLAIMS  ALL WARRANTIES
// WITH  REGARD   TO  THIS  SOFTWARE   INCLUDING  ALL  IMPLIED   WARRANTIES  OF
// MERCHANTABILITY AND FITNESS. IN NO EVENT  SHALL THE AUTHOR BE LIABLE FOR ANY
// SPECIAL,  DIRECT,   INDIRECT,  OR  CONSEQUENTIAL  DAMAGES   OR  ANY  DAMAGES
// WHATSOEVER RESULTING FROM LOSS OF USE, DATA OR PROFITS, WHETHER IN AN ACTION
// OF  CONTRACT, NEGLIGENCE  OR OTHER  TORTIOUS ACTION,  ARISING OUT  OF OR  IN
// CONNECTION WITH THE USE OR PERFORMANCE OF THIS SOFTWARE.

use defs::*;
use error::{ensure_finite, Result};

/// Simulation time, plus the multiplier applied to it when evaluating
/// orbits.
///
/// Kinematic localities integrate against raw `time`; orbiting ones are
/// evaluated at `orbit_time()`, so orbital motion can be sped up for display
/// without affecting anything else.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorldClock {
    time: Seconds,
    time_factor: f64,
}

impl Default for WorldClock {
    fn default() -> Self {
        WorldClock { time: 0.0, time_factor: 1.0 }
    }
}

impl WorldClock {
    pub fn new() -> Self {
        WorldClock::default()
    }

    #[inline]
    pub fn time(&self) -> Seconds {
        self.time
    }

    #[inline]
    pub fn time_factor(&self) -> f64 {
        self.time_factor
    }

    /// The time at which orbits are evaluated.
    #[inline]
    pub fn orbit_time(&self) -> Seconds {
        self.time * self.time_factor
    }

    pub fn set_time(&mut self, time: Seconds) -> Result<()> {
        self.time = ensure_finite("time", time)?;
        Ok(())
    }

    pub fn set_time_factor(&mut self, factor: f64) -> Result<()> {
        self.time_factor = ensure_finite("time factor", factor)?;
        Ok(())
    }

    /// Moves time forward by `dt`, which may be negative.
    pub fn advance(&mut self, dt: Seconds) -> Result<()> {
        ensure_finite("time step", dt)?;
        let time = self.time + dt;
        self.set_time(time)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn orbit_time_is_scaled() {
        let mut clock = WorldClock::new();
        clock.advance(10.0).unwrap();
        clock.advance(5.0).unwrap();
        assert_eq!(15.0, clock.time());
        assert_eq!(15.0, clock.orbit_time());

        clock.set_time_factor(100.0).unwrap();
        assert_eq!(1500.0, clock.orbit_time());
        assert_eq!(15.0, clock.time());
    }

    #[test]
    fn rejects_non_finite_input() {
        let mut clock = WorldClock::new();
        assert!(clock.advance(::std::f64::NAN).is_err());
        assert!(clock.set_time_factor(::std::f64::INFINITY).is_err());
        assert_eq!(WorldClock::new(), clock);
    }
}
