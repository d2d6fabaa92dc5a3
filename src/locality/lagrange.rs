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

/*! The first Lagrange point of a two-body system.

L1 lies on the line from the primary to the secondary. For a secondary much
lighter than the primary its distance from the secondary is approximately the
Hill radius,

```text
  r_H = d cbrt(m₂ / (3 m₁))
```

so the point sits at `d (1 - cbrt(m₂ / (3 m₁)))` from the primary. The
approximation degrades as the masses approach each other; the fraction is
clamped to [0, 1] so a pathological mass ratio still yields a point between
the two bodies.
*/

use body::{ensure_massive, Bodies, EntityId};
use defs::*;
use error::{HierarchyError, Result};
use xform::is_finite_vec;

/// Fraction of the primary-to-secondary distance at which L1 lies.
pub fn hill_fraction(primary_mass: Mass, secondary_mass: Mass) -> f64 {
    let fraction = 1.0 - (secondary_mass / (3.0 * primary_mass)).cbrt();
    fraction.max(0.0).min(1.0)
}

/// A locality at the L1 point between `primary` and `secondary`.
///
/// Its superior is the primary's locality. The position is derived from the
/// two bodies, so it cannot be reparented.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Lagrange1 {
    primary: EntityId,
    secondary: EntityId,
}

impl Lagrange1 {
    pub fn new(primary: EntityId, secondary: EntityId) -> Result<Self> {
        if primary == secondary {
            return Err(HierarchyError::invalid(format!(
                "L1 point needs two distinct bodies, got {} twice", primary)));
        }

        Ok(Lagrange1 { primary: primary, secondary: secondary })
    }

    pub fn primary(&self) -> EntityId {
        self.primary
    }

    pub fn secondary(&self) -> EntityId {
        self.secondary
    }

    /// The offset of L1 from the primary at `time`, in root-aligned axes.
    pub fn offset<B: Bodies + ?Sized>(&self, bodies: &B, time: Seconds)
                                      -> Result<Position> {
        let m1 = ensure_massive(self.primary,
                                bodies.collective_mass(self.primary)?)?;
        let m2 = ensure_massive(self.secondary,
                                bodies.collective_mass(self.secondary)?)?;
        let separation = bodies.position_at_time(self.secondary, time)? -
            bodies.position_at_time(self.primary, time)?;

        let offset = separation * hill_fraction(m1, m2);
        if is_finite_vec(offset) {
            Ok(offset)
        } else {
            Err(HierarchyError::numerical(format!(
                "L1 offset between {} and {} is {:?}",
                self.primary, self.secondary, offset)))
        }
    }
}

#[cfg(test)]
mod test {
    use cgmath::{InnerSpace, Vector3};

    use super::*;

    struct Pair;

    impl Bodies for Pair {
        fn collective_mass(&self, entity: EntityId) -> Result<Mass> {
            Ok(if 0 == entity.index() { 1.989e30 } else { 5.972e24 })
        }

        fn position_at_time(&self, entity: EntityId, _: Seconds)
                            -> Result<Position> {
            Ok(if 0 == entity.index() {
                Vector3::new(1.0, 1.0, 1.0)
            } else {
                Vector3::new(1.0 + 1.496e11, 1.0, 1.0)
            })
        }
    }

    #[test]
    fn hill_fraction_sun_earth() {
        // Earth's L1 is about 1.5 million km sunward.
        let fraction = hill_fraction(1.989e30, 5.972e24);
        assert_approx!(1e-3, 1.0 - 1.5e9 / 1.496e11, fraction);
    }

    #[test]
    fn hill_fraction_is_clamped() {
        assert_approx!(1e-12, 1.0 - (1.0f64 / 3.0).cbrt(),
                       hill_fraction(1.0, 1.0));
        assert_eq!(0.0, hill_fraction(1.0, 1e6));
    }

    #[test]
    fn offset_points_at_secondary() {
        let l1 = Lagrange1::new(EntityId::from_index(0),
                                EntityId::from_index(1)).unwrap();
        let offset = l1.offset(&Pair, 0.0).unwrap();
        assert!(offset.x > 0.0);
        assert_approx!(1e-9, 0.0, offset.y);
        assert_approx!(1e3, 1.496e11 * hill_fraction(1.989e30, 5.972e24),
                       offset.magnitude());
    }

    #[test]
    fn same_body_twice_is_rejected() {
        assert!(Lagrange1::new(EntityId::from_index(3),
                               EntityId::from_index(3)).is_err());
    }
}
