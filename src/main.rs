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

extern crate cgmath;
extern crate env_logger;
#[macro_use] extern crate log;
extern crate orrery;

use std::io;
use std::io::Write;

use cgmath::Vector3;

use orrery::{Hierarchy, LocalityKind, Orbit, OrbitalElements, ReanchorMethod,
             Transform};

const DAY: f64 = 86400.0;

/// Builds a sun/earth/moon system with a probe drifting away from the earth,
/// runs it for a month of simulated time and logs where things end up.
fn run() -> orrery::Result<()> {
    let mut world = Hierarchy::new();
    let root = world.root();

    let sun = world.add_entity("sun", 1.989e30)?;
    let earth = world.add_entity("earth", 5.972e24)?;
    let moon = world.add_entity("moon", 7.342e22)?;

    let sun_loc = world.create_fixed(root, Transform::identity(), Some(sun))?;
    world.set_name(sun_loc, "sun")?;

    let mut earth_orbit = OrbitalElements::circular(1.496e11);
    earth_orbit.eccentricity = 0.0167;
    earth_orbit.argument_of_periapsis = 1.796;
    let earth_loc = world.create_orbiting(
        Orbit::new(earth_orbit, sun)?, Some(earth))?;
    world.set_name(earth_loc, "earth")?;

    let mut moon_orbit = OrbitalElements::circular(3.844e8);
    moon_orbit.eccentricity = 0.0549;
    moon_orbit.inclination = 0.0898;
    let moon_loc = world.create_orbiting(
        Orbit::new(moon_orbit, earth)?, Some(moon))?;
    world.set_name(moon_loc, "moon")?;

    let l1 = world.create_lagrange1(sun, earth, None)?;
    world.set_name(l1, "sun-earth L1")?;

    let probe = world.create_kinematic(
        earth_loc, Transform::from_translation(Vector3::new(7e6, 0.0, 0.0)),
        Vector3::new(0.0, 3e3, 0.0), None)?;
    world.set_name(probe, "probe")?;

    if let LocalityKind::Orbiting(ref o) = *world.locality(earth_loc)?.kind() {
        info!("Earth year: {:.1} days", o.orbit().period(&world)? / DAY);
    }

    for day in 0..30 {
        world.advance(DAY)?;
        if 0 == day % 5 {
            info!("Day {:2}: earth-moon {:.0} km, probe-earth {:.0} km, \
                   L1-earth {:.0} km",
                  day + 1,
                  world.distance_to(moon_loc, earth_loc)? / 1e3,
                  world.distance_to(probe, earth_loc)? / 1e3,
                  world.distance_to(l1, earth_loc)? / 1e3);
        }
    }

    // Hand the probe over to the moon without moving it.
    let probe = world.reanchored(probe, moon_loc,
                                 ReanchorMethod::MaintainAbsoluteTransform)?;
    info!("Probe is now {} under {:?}, {:.0} km from the moon",
          probe, world.hierarchy_superior(probe)?,
          world.distance_to(probe, moon_loc)? / 1e3);

    let waypoints = world.predicted_itinerary(moon_loc, 8, earth_loc, None)?;
    for &waypoint in &waypoints {
        let origin = world.relative_transform(waypoint, earth_loc)?.origin;
        info!("Moon waypoint {}: ({:.0}, {:.0}, {:.0}) km",
              waypoint, origin.x / 1e3, origin.y / 1e3, origin.z / 1e3);
    }

    Ok(())
}

fn main() {
    env_logger::init();

    if let Err(err) = run() {
        writeln!(&mut io::stderr(), "Simulation failed: {}", err).unwrap();
        std::process::exit(70);
    }
}
