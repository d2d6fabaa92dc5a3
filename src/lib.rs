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

/*!
Spatial hierarchy and Keplerian orbit core.

Every physical thing in the world is positioned by a _locality_: a node in a
single tree rooted at the hierarchy's root. A locality knows its transform
relative to its _superior_ (parent); how it computes that transform depends on
its variant:

- `Fixed`: a constant transform under an explicit anchor.
- `Kinematic`: like `Fixed`, but moved by a constant velocity every tick.
- `Orbiting`: placed by evaluating a Keplerian `Orbit` at the current time.
- `Lagrange1`: placed at the approximate L1 point between two bodies.
- `Attached`: a constant transform under another physical entity.

The `Hierarchy` owns all localities, all physical entities and the simulation
clock. Localities and entities refer to each other by handle, never by
reference, so the tree can be freely restructured.

Transforms between any two localities are computed by walking both up to their
lowest common ancestor and composing the local transforms along each branch.
Orbiting and L1 localities do not pass their rotation on to the chain below
them; only their position is carried through.
*/

extern crate bit_set;
#[macro_use] extern crate bitflags;
extern crate cgmath;
extern crate fnv;
#[macro_use] extern crate log;
extern crate smallvec;

#[cfg(test)] #[macro_use] extern crate proptest;

#[cfg(test)]
#[macro_use]
mod test_macros {
    macro_rules! assert_approx {
        ($fuzz:expr, $expected:expr, $actual:expr) => {{
            let expected: f64 = $expected;
            let actual: f64 = $actual;
            assert!((actual - expected).abs() <= $fuzz,
                    "Expected {:?} +/- {:?}, got {:?}",
                    expected, $fuzz, actual);
        }}
    }
}

pub mod defs;
pub mod error;
pub mod xform;
pub mod memo;
pub mod ephemeris;
pub mod orbit;
pub mod body;
pub mod clock;
pub mod locality;
pub mod hierarchy;

pub use body::{Bodies, EntityId, PhysicalEntity};
pub use clock::WorldClock;
pub use ephemeris::Ephemeris;
pub use error::{HierarchyError, Result};
pub use hierarchy::Hierarchy;
pub use locality::{Locality, LocalityId, LocalityKind, ReanchorMethod,
                   Visualizability};
pub use orbit::{Frame, Orbit, OrbitalElements, Spin};
pub use xform::Transform;
