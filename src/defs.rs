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

//! Common definitions for the locality and orbit system.
//!
//! Everything is measured in SI units: metres, seconds, kilograms, radians.

use cgmath;

/// Simulation time, in seconds since the hierarchy was created.
pub type Seconds = f64;
/// Mass in kilograms.
pub type Mass = f64;
pub type Position = cgmath::Vector3<f64>;
pub type Velocity = cgmath::Vector3<f64>;
/// Angular velocity as an axis scaled by radians per second.
pub type AngularVelocity = cgmath::Vector3<f64>;
pub type Basis = cgmath::Matrix3<f64>;
pub type Rotation = cgmath::Quaternion<f64>;

/// Newton's gravitational constant, in m³/(kg·s²).
pub const GRAVITATIONAL_CONSTANT: f64 = 6.6743e-11;

/// The Kepler solver stops once an iteration moves the eccentric anomaly by
/// no more than this many radians.
pub const KEPLER_TOLERANCE: f64 = 1e-5;
/// Upper bound on Kepler solver iterations. Well-formed elliptical orbits
/// converge in a handful; hitting this means the inputs are degenerate.
pub const MAX_KEPLER_ITERATIONS: u32 = 100;

/// A basis whose determinant has a smaller magnitude than this is considered
/// singular.
pub const MIN_BASIS_DETERMINANT: f64 = 1e-12;
/// No basis column may be longer than this.
pub const MAX_BASIS_SCALE: f64 = 1e6;

/// Absolute tolerance, per unit of distance from the origin, within which a
/// reanchored locality must reproduce its previous absolute transform.
pub const REANCHOR_TOLERANCE: f64 = 1e-6;

/// Sentinel stored in a locality's cached depth when it must be recomputed.
pub const UNKNOWN_DEPTH: u32 = !0;
