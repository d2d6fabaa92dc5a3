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

//! Localities holding an explicit local transform.

use cgmath::Zero;

use body::EntityId;
use defs::*;
use error::{HierarchyError, Result};
use locality::LocalityId;
use xform::{is_finite_vec, Transform};

/// A constant transform under an explicit anchor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Fixed {
    anchor: LocalityId,
    transform: Transform,
}

impl Fixed {
    pub fn new(anchor: LocalityId, transform: Transform) -> Result<Self> {
        transform.validate("local transform")?;
        Ok(Fixed { anchor: anchor, transform: transform })
    }

    pub fn anchor(&self) -> LocalityId {
        self.anchor
    }

    pub(crate) fn set_anchor(&mut self, anchor: LocalityId) {
        self.anchor = anchor;
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    /// Replaces the local transform. On failure the old one is kept.
    pub fn set_transform(&mut self, transform: Transform) -> Result<()> {
        transform.validate("local transform")?;
        self.transform = transform;
        Ok(())
    }

    /// Moves the origin by `offset` in the anchor's frame.
    pub fn translate(&mut self, offset: Position) -> Result<()> {
        let moved = self.transform.translated(offset);
        self.set_transform(moved)
    }
}

/// A `Fixed` locality which drifts at a constant velocity, expressed in the
/// anchor's frame.
///
/// Unlike an orbit, the position is integrated state: it moves only when
/// `update()` is called.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Kinematic {
    fixed: Fixed,
    velocity: Velocity,
}

impl Kinematic {
    pub fn new(anchor: LocalityId, transform: Transform, velocity: Velocity)
               -> Result<Self> {
        let mut this = Kinematic {
            fixed: Fixed::new(anchor, transform)?,
            velocity: Velocity::zero(),
        };
        this.set_velocity(velocity)?;
        Ok(this)
    }

    pub fn fixed(&self) -> &Fixed {
        &self.fixed
    }

    pub fn fixed_mut(&mut self) -> &mut Fixed {
        &mut self.fixed
    }

    pub fn velocity(&self) -> Velocity {
        self.velocity
    }

    pub fn set_velocity(&mut self, velocity: Velocity) -> Result<()> {
        if !is_finite_vec(velocity) {
            return Err(HierarchyError::numerical(
                format!("velocity is {:?}", velocity)));
        }

        self.velocity = velocity;
        Ok(())
    }

    /// Integrates one tick of `dt` seconds. Returns whether anything moved.
    pub fn update(&mut self, dt: Seconds) -> Result<bool> {
        if self.velocity.is_zero() {
            return Ok(false);
        }

        self.fixed.translate(self.velocity * dt)?;
        Ok(true)
    }
}

/// A constant transform under whatever locality positions another physical
/// entity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Attached {
    anchor: EntityId,
    transform: Transform,
}

impl Attached {
    pub fn new(anchor: EntityId, transform: Transform) -> Result<Self> {
        transform.validate("attachment transform")?;
        Ok(Attached { anchor: anchor, transform: transform })
    }

    pub fn anchor(&self) -> EntityId {
        self.anchor
    }

    pub(crate) fn set_anchor(&mut self, anchor: EntityId) {
        self.anchor = anchor;
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    pub fn set_transform(&mut self, transform: Transform) -> Result<()> {
        transform.validate("attachment transform")?;
        self.transform = transform;
        Ok(())
    }

    pub fn translate(&mut self, offset: Position) -> Result<()> {
        let moved = self.transform.translated(offset);
        self.set_transform(moved)
    }
}

#[cfg(test)]
mod test {
    use cgmath::Vector3;

    use super::*;

    fn anchor() -> LocalityId {
        LocalityId::from_index(0)
    }

    #[test]
    fn fixed_rejects_bad_transform_and_keeps_old() {
        let mut bad = Transform::identity();
        bad.origin.x = ::std::f64::NAN;
        assert!(Fixed::new(anchor(), bad).is_err());

        let mut fixed = Fixed::new(anchor(), Transform::identity()).unwrap();
        assert!(fixed.set_transform(bad).is_err());
        assert_eq!(Transform::identity(), fixed.transform());

        assert!(fixed.translate(Vector3::new(::std::f64::INFINITY, 0.0, 0.0))
                .is_err());
        assert_eq!(Transform::identity(), fixed.transform());
    }

    #[test]
    fn kinematic_update_integrates_velocity() {
        let mut k = Kinematic::new(
            anchor(), Transform::from_translation(Vector3::new(1.0, 0.0, 0.0)),
            Vector3::new(2.0, 0.0, -1.0)).unwrap();
        assert!(k.update(0.5).unwrap());
        assert!(k.update(0.5).unwrap());
        assert_eq!(Vector3::new(3.0, 0.0, -1.0), k.fixed().transform().origin);
    }

    #[test]
    fn stationary_kinematic_does_not_move() {
        let mut k = Kinematic::new(anchor(), Transform::identity(),
                                   Vector3::zero()).unwrap();
        assert!(!k.update(100.0).unwrap());
        assert_eq!(Transform::identity(), k.fixed().transform());
    }

    #[test]
    fn kinematic_rejects_non_finite_velocity() {
        let mut k = Kinematic::new(anchor(), Transform::identity(),
                                   Vector3::zero()).unwrap();
        assert!(k.set_velocity(Vector3::new(0.0, ::std::f64::NAN, 0.0))
                .is_err());
        assert_eq!(Vector3::zero(), k.velocity());
    }

    #[test]
    fn attached_translate() {
        let mut a = Attached::new(EntityId::from_index(4),
                                  Transform::identity()).unwrap();
        a.translate(Vector3::new(0.0, 1.0, 0.0)).unwrap();
        assert_eq!(Vector3::new(0.0, 1.0, 0.0), a.transform().origin);
    }
}
