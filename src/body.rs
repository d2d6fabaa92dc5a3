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

//! Physical entities, as far as the locality system cares about them.
//!
//! The game proper attaches far more state to its entities; all this module
//! tracks is a name, a mass, and which locality (if any) positions the
//! entity.

use std::fmt;

use defs::*;
use error::{HierarchyError, Result};
use locality::LocalityId;

/// Handle to a `PhysicalEntity` owned by a `Hierarchy`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(u32);

impl EntityId {
    #[inline]
    pub fn from_index(index: usize) -> Self {
        debug_assert!(index <= u32::max_value() as usize);
        EntityId(index as u32)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

#[derive(Clone, Debug)]
pub struct PhysicalEntity {
    name: String,
    mass: Mass,
    /// Back-reference to the locality positioning this entity. Kept in sync
    /// with the locality's own `entity` field by the `Hierarchy`.
    pub(crate) locality: Option<LocalityId>,
}

impl PhysicalEntity {
    /// Creates an unplaced entity.
    ///
    /// The mass must be finite and non-negative. Zero is accepted here, but
    /// orbits involving a massless entity will refuse to evaluate.
    pub fn new(name: &str, mass: Mass) -> Result<Self> {
        if !mass.is_finite() || mass < 0.0 {
            return Err(HierarchyError::numerical(
                format!("mass of {} is {}", name, mass)));
        }

        Ok(PhysicalEntity {
            name: name.to_owned(),
            mass: mass,
            locality: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The entity's own mass, excluding anything attached to it.
    pub fn mass(&self) -> Mass {
        self.mass
    }

    pub fn locality(&self) -> Option<LocalityId> {
        self.locality
    }
}

/// What orbit evaluation needs to know about the bodies involved.
pub trait Bodies {
    /// The mass of `entity` together with everything attached to it.
    fn collective_mass(&self, entity: EntityId) -> Result<Mass>;

    /// The position of `entity` relative to the hierarchy root at `time`.
    fn position_at_time(&self, entity: EntityId, time: Seconds)
                        -> Result<Position>;
}

/// Fails with `NumericalInvalidity` unless `mass` is finite and positive.
pub fn ensure_massive(entity: EntityId, mass: Mass) -> Result<Mass> {
    if mass.is_finite() && mass > 0.0 {
        Ok(mass)
    } else {
        Err(HierarchyError::numerical(
            format!("collective mass of {} is {}", entity, mass)))
    }
}
