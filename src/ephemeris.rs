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
use xform::Transform;

/// The kinematic state of a body at one instant.
///
/// Whether `position` and `velocity` are relative to the orbited body or to
/// the hierarchy root depends on which orbit query produced it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ephemeris {
    pub time: Seconds,
    pub position: Position,
    pub velocity: Velocity,
    pub rotation: Rotation,
    pub angular_velocity: AngularVelocity,
}

impl Ephemeris {
    /// Returns the pose described by this ephemeris.
    pub fn transform(&self) -> Transform {
        Transform::from_rotation_translation(self.rotation, self.position)
    }
}
