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

//! Locality node records.
//!
//! A `Locality` is only data; everything that needs to look at more than one
//! node lives on `Hierarchy`. The variant-specific state is in `LocalityKind`,
//! whose payloads are defined in the submodules.

use std::cell::Cell;
use std::fmt;

use smallvec::SmallVec;

use body::EntityId;
use defs::*;
use xform::Transform;

pub mod fixed;
pub mod lagrange;
pub mod orbiting;

pub use self::fixed::{Attached, Fixed, Kinematic};
pub use self::lagrange::Lagrange1;
pub use self::orbiting::Orbiting;

/// Handle to a `Locality` owned by a `Hierarchy`.
///
/// Handles are never reused, so a handle to a deleted locality stays
/// recognisably obsolete for the life of the hierarchy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocalityId(u32);

impl LocalityId {
    #[inline]
    pub fn from_index(index: usize) -> Self {
        debug_assert!(index <= u32::max_value() as usize);
        LocalityId(index as u32)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for LocalityId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "locality#{}", self.0)
    }
}

bitflags! {
    pub struct LocalityFlags : u32 {
        /// The locality has been deleted. Terminal.
        const OBSOLETE          = 1 << 0;
        /// The locality is a waypoint of a predicted itinerary rather than a
        /// live position.
        const PREDICTED         = 1 << 1;
    }
}

/// Whether a renderer can assume a locality's transform stays put between
/// frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Visualizability {
    Static,
    Dynamic,
}

/// How `Hierarchy::reanchored()` chooses the new local transform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ReanchorMethod {
    /// Keep the absolute pose; derive a new local transform for it.
    MaintainAbsoluteTransform,
    /// Keep the local transform numbers; the absolute pose moves with the
    /// new anchor.
    MaintainLocalTransform,
    /// Use this local transform under the new anchor.
    UseNewTransform(Transform),
}

#[derive(Clone, Debug)]
pub enum LocalityKind {
    Root,
    Fixed(Fixed),
    Kinematic(Kinematic),
    Orbiting(Orbiting),
    Lagrange1(Lagrange1),
    Attached(Attached),
}

impl LocalityKind {
    /// Whether subordinates compose with this locality's rotation, or only
    /// with its position.
    pub fn inherits_rotation(&self) -> bool {
        match *self {
            LocalityKind::Orbiting(_) | LocalityKind::Lagrange1(_) => false,
            _ => true,
        }
    }

    pub fn visualizability(&self) -> Visualizability {
        match *self {
            LocalityKind::Root |
            LocalityKind::Fixed(_) |
            LocalityKind::Attached(_) => Visualizability::Static,

            LocalityKind::Kinematic(_) |
            LocalityKind::Orbiting(_) |
            LocalityKind::Lagrange1(_) => Visualizability::Dynamic,
        }
    }

    pub fn variant_name(&self) -> &'static str {
        match *self {
            LocalityKind::Root => "root",
            LocalityKind::Fixed(_) => "fixed",
            LocalityKind::Kinematic(_) => "kinematic",
            LocalityKind::Orbiting(_) => "orbiting",
            LocalityKind::Lagrange1(_) => "L1",
            LocalityKind::Attached(_) => "attached",
        }
    }

    /// The superior, for variants anchored directly to a locality.
    pub fn locality_anchor(&self) -> Option<LocalityId> {
        match *self {
            LocalityKind::Fixed(ref f) => Some(f.anchor()),
            LocalityKind::Kinematic(ref k) => Some(k.fixed().anchor()),
            _ => None,
        }
    }

    /// The entity whose locality is the superior, for variants anchored
    /// through a physical entity.
    pub fn entity_anchor(&self) -> Option<EntityId> {
        match *self {
            LocalityKind::Orbiting(ref o) => Some(o.parent()),
            LocalityKind::Lagrange1(ref l) => Some(l.primary()),
            LocalityKind::Attached(ref a) => Some(a.anchor()),
            _ => None,
        }
    }

    /// The `Fixed` state of `Fixed` and `Kinematic` localities.
    pub fn fixed_mut(&mut self) -> Option<&mut Fixed> {
        match *self {
            LocalityKind::Fixed(ref mut f) => Some(f),
            LocalityKind::Kinematic(ref mut k) => Some(k.fixed_mut()),
            _ => None,
        }
    }
}

/// One node of the hierarchy.
#[derive(Clone, Debug)]
pub struct Locality {
    pub(crate) name: Option<String>,
    pub(crate) kind: LocalityKind,
    pub(crate) subordinates: SmallVec<[LocalityId; 4]>,
    /// Distance from the root, or `UNKNOWN_DEPTH` if it must be recomputed.
    pub(crate) depth: Cell<u32>,
    pub(crate) flags: LocalityFlags,
    pub(crate) entity: Option<EntityId>,
}

impl Locality {
    pub(crate) fn new(kind: LocalityKind) -> Self {
        Locality {
            name: None,
            kind: kind,
            subordinates: SmallVec::new(),
            depth: Cell::new(UNKNOWN_DEPTH),
            flags: LocalityFlags::empty(),
            entity: None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_ref().map(|s| &s[..])
    }

    pub fn kind(&self) -> &LocalityKind {
        &self.kind
    }

    pub fn subordinates(&self) -> &[LocalityId] {
        &self.subordinates
    }

    pub fn entity(&self) -> Option<EntityId> {
        self.entity
    }

    pub fn flags(&self) -> LocalityFlags {
        self.flags
    }

    pub fn is_obsolete(&self) -> bool {
        self.flags.contains(LocalityFlags::OBSOLETE)
    }

    pub fn is_predicted(&self) -> bool {
        self.flags.contains(LocalityFlags::PREDICTED)
    }

    /// The cached depth, if it is currently known.
    pub fn cached_depth(&self) -> Option<u32> {
        match self.depth.get() {
            UNKNOWN_DEPTH => None,
            d => Some(d),
        }
    }
}

#[cfg(test)]
mod test {
    use cgmath::{Quaternion, Vector3};

    use body::EntityId;
    use orbit::{Orbit, OrbitalElements};
    use super::*;

    fn fixed() -> LocalityKind {
        LocalityKind::Fixed(Fixed::new(LocalityId::from_index(0),
                                       Transform::identity()).unwrap())
    }

    fn orbiting() -> LocalityKind {
        LocalityKind::Orbiting(Orbiting::new(
            Orbit::new(OrbitalElements::circular(1.0),
                       EntityId::from_index(2)).unwrap()))
    }

    #[test]
    fn rotation_inheritance_by_variant() {
        assert!(LocalityKind::Root.inherits_rotation());
        assert!(fixed().inherits_rotation());
        assert!(!orbiting().inherits_rotation());
        assert!(!LocalityKind::Lagrange1(Lagrange1::new(
            EntityId::from_index(0), EntityId::from_index(1)).unwrap())
                .inherits_rotation());
    }

    #[test]
    fn visualizability_by_variant() {
        assert_eq!(Visualizability::Static,
                   LocalityKind::Root.visualizability());
        assert_eq!(Visualizability::Static, fixed().visualizability());
        assert_eq!(Visualizability::Dynamic, orbiting().visualizability());
        assert_eq!(Visualizability::Dynamic, LocalityKind::Kinematic(
            Kinematic::new(LocalityId::from_index(0), Transform::identity(),
                           Vector3::new(1.0, 0.0, 0.0)).unwrap())
                   .visualizability());
        assert_eq!(Visualizability::Static, LocalityKind::Attached(
            Attached::new(EntityId::from_index(0),
                          Transform::from_rotation(
                              Quaternion::new(1.0, 0.0, 0.0, 0.0))).unwrap())
                   .visualizability());
    }

    #[test]
    fn anchors_by_variant() {
        assert_eq!(Some(LocalityId::from_index(0)),
                   fixed().locality_anchor());
        assert_eq!(None, fixed().entity_anchor());
        assert_eq!(Some(EntityId::from_index(2)), orbiting().entity_anchor());
        assert_eq!(None, LocalityKind::Root.locality_anchor());
        assert_eq!(None, LocalityKind::Root.entity_anchor());
    }

    #[test]
    fn new_locality_has_unknown_depth() {
        let loc = Locality::new(LocalityKind::Root);
        assert_eq!(None, loc.cached_depth());
        assert!(!loc.is_obsolete());
        assert!(!loc.is_predicted());
    }
}
