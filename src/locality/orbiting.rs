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

use body::{Bodies, EntityId};
use defs::*;
use error::{HierarchyError, Result};
use orbit::Orbit;
use xform::Transform;

/// A locality moved along a Keplerian orbit around its parent entity.
///
/// The local transform is a pure function of orbit time; nothing is
/// integrated.
#[derive(Clone, Debug)]
pub struct Orbiting {
    orbit: Orbit,
}

impl Orbiting {
    pub fn new(orbit: Orbit) -> Self {
        Orbiting { orbit: orbit }
    }

    pub fn orbit(&self) -> &Orbit {
        &self.orbit
    }

    pub(crate) fn orbit_mut(&mut self) -> &mut Orbit {
        &mut self.orbit
    }

    /// The entity being orbited.
    pub fn parent(&self) -> EntityId {
        self.orbit.parent()
    }

    pub fn local_transform<B: Bodies + ?Sized>(&self, bodies: &B,
                                               time: Seconds)
                                               -> Result<Transform> {
        Ok(self.orbit.relative_kinematics(bodies, time)?.transform())
    }

    /// The times of `legs` evenly spaced samples starting at `start` and
    /// spanning `duration`, or one orbital period if no duration is given.
    ///
    /// The end of the span is not sampled, so a full-period itinerary does
    /// not repeat its first point.
    pub fn itinerary_times<B: Bodies + ?Sized>(
        &self, bodies: &B, legs: usize, start: Seconds,
        duration: Option<Seconds>) -> Result<Vec<Seconds>>
    {
        let span = match duration {
            Some(d) => d,
            None => self.orbit.period(bodies)?,
        };
        if !(span.is_finite() && span > 0.0) {
            return Err(HierarchyError::numerical(
                format!("itinerary duration is {}", span)));
        }

        Ok((0..legs)
           .map(|leg| start + span * (leg as f64) / (legs as f64))
           .collect())
    }
}

#[cfg(test)]
mod test {
    use cgmath::{InnerSpace, Vector3, Zero};

    use body::Bodies;
    use orbit::OrbitalElements;
    use super::*;

    struct OneSun;

    impl Bodies for OneSun {
        fn collective_mass(&self, _: EntityId) -> Result<f64> {
            Ok(1.0 / GRAVITATIONAL_CONSTANT)
        }

        fn position_at_time(&self, _: EntityId, _: Seconds)
                            -> Result<Position> {
            Ok(Vector3::zero())
        }
    }

    fn unit_orbit() -> Orbiting {
        Orbiting::new(Orbit::new(OrbitalElements::circular(1.0),
                                 EntityId::from_index(0)).unwrap())
    }

    #[test]
    fn local_transform_follows_relative_kinematics() {
        let o = unit_orbit();
        // mu = 1 and a = 1, so the period is 2π and a quarter turn is π/2.
        let t = o.local_transform(&OneSun, ::std::f64::consts::FRAC_PI_2)
            .unwrap();
        assert_approx!(1e-6, 0.0, t.origin.x);
        assert_approx!(1e-6, 1.0, t.origin.y);
        assert_approx!(1e-6, 1.0, t.origin.magnitude());
    }

    #[test]
    fn itinerary_times_default_to_one_period() {
        let o = unit_orbit();
        let times = o.itinerary_times(&OneSun, 4, 10.0, None).unwrap();
        assert_eq!(4, times.len());
        assert_approx!(1e-9, 10.0, times[0]);
        assert_approx!(1e-9, 10.0 + ::std::f64::consts::PI, times[2]);
    }

    #[test]
    fn itinerary_times_with_explicit_duration() {
        let o = unit_orbit();
        assert_eq!(vec![0.0, 5.0],
                   o.itinerary_times(&OneSun, 2, 0.0, Some(10.0)).unwrap());
        assert!(o.itinerary_times(&OneSun, 2, 0.0, Some(0.0)).is_err());
        assert!(o.itinerary_times(&OneSun, 0, 0.0, None).unwrap().is_empty());
    }
}
