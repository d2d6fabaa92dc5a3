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

/*! Keplerian two-body propagation.

An orbit is described by the six classical elements plus the body being
orbited. Evaluating it at a time `t` goes:

```text
  μ = G (m_orbiter + m_parent)
  n = sqrt(μ / a³)                        mean motion
  M = n t                                 mean anomaly
  E = M + e sin E                         Kepler's equation, solved for E
  f = 2 atan2(√(1+e) sin(E/2), √(1-e) cos(E/2)) + f₀
```

`f` is wrapped into [0, 2π). The position and velocity are first computed in
the perifocal frame (X towards periapsis, Z along the angular momentum):

```text
  p = a (1 - e²)
  r = p / (1 + e cos f)
  position = r (cos f, sin f, 0)
  velocity = √(μ/p) (-sin f, e + cos f, 0)
```

and then rotated into the parent's frame with the 3-1-3 Euler rotation
`Rz(Ω) Rx(i) Rz(ω)`, written out in closed form in `perifocal_to_parent()`.

Note that the starting true anomaly `f₀` is added _after_ solving Kepler's
equation rather than being converted into a mean anomaly at epoch. Bodies on
eccentric orbits therefore do not start at periapsis timing-wise, but their
paths are the same ellipse.

Kepler's equation is solved by Newton iteration, which stops when a step
moves E by no more than `KEPLER_TOLERANCE` and fails after
`MAX_KEPLER_ITERATIONS`. Starting from E = M is fine for modest
eccentricities; for e ≥ 0.8 the iteration starts from E = π, which converges
for every M in [0, 2π).
*/

use std::f64::consts::{PI, TAU};

use cgmath::{InnerSpace, Matrix3, Quaternion, Rad, Rotation3, Vector3, Zero};

use body::{ensure_massive, Bodies, EntityId};
use defs::*;
use ephemeris::Ephemeris;
use error::{ensure_finite, HierarchyError, Result};
use memo::MonoMemory;
use xform::is_finite_vec;

/// The six classical orbital elements. Angles are in radians, the semimajor
/// axis in metres.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrbitalElements {
    pub inclination: f64,
    pub longitude_of_ascending_node: f64,
    pub argument_of_periapsis: f64,
    pub eccentricity: f64,
    pub semimajor_axis: f64,
    /// True anomaly at time zero.
    pub true_anomaly: f64,
}

impl OrbitalElements {
    /// A circular, equatorial orbit of the given radius.
    pub fn circular(radius: f64) -> Self {
        OrbitalElements {
            inclination: 0.0,
            longitude_of_ascending_node: 0.0,
            argument_of_periapsis: 0.0,
            eccentricity: 0.0,
            semimajor_axis: radius,
            true_anomaly: 0.0,
        }
    }

    /// Rejects non-finite elements and anything other than a closed
    /// ellipse.
    pub fn validate(&self) -> Result<()> {
        ensure_finite("inclination", self.inclination)?;
        ensure_finite("longitude of ascending node",
                      self.longitude_of_ascending_node)?;
        ensure_finite("argument of periapsis", self.argument_of_periapsis)?;
        ensure_finite("starting true anomaly", self.true_anomaly)?;

        if !(self.eccentricity >= 0.0 && self.eccentricity < 1.0) {
            return Err(HierarchyError::numerical(format!(
                "eccentricity {} is not that of an ellipse",
                self.eccentricity)));
        }
        if !(self.semimajor_axis.is_finite() && self.semimajor_axis > 0.0) {
            return Err(HierarchyError::numerical(format!(
                "semimajor axis is {}", self.semimajor_axis)));
        }

        Ok(())
    }
}

/// Rotation of an orbiting body about its own axis.
///
/// The orientation at time `t` is the rotation by `|ω| t` about `ω`'s
/// direction (in the parent frame) applied after `rotation_offset`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Spin {
    pub rotation_offset: Rotation,
    pub angular_velocity: AngularVelocity,
}

impl Default for Spin {
    fn default() -> Self {
        Spin {
            rotation_offset: Quaternion::new(1.0, 0.0, 0.0, 0.0),
            angular_velocity: Vector3::zero(),
        }
    }
}

impl Spin {
    pub fn rotation_at(&self, time: Seconds) -> Rotation {
        let rate = self.angular_velocity.magnitude();
        if rate == 0.0 {
            return self.rotation_offset;
        }

        let period = TAU / rate;
        let angle = rate * time.rem_euclid(period);
        Quaternion::from_axis_angle(self.angular_velocity / rate, Rad(angle))
            * self.rotation_offset
    }
}

/// Which frame an `Ephemeris` is expressed in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Frame {
    /// Relative to the hierarchy root.
    Absolute,
    /// Relative to the orbited body.
    Relative,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KeplerSolution {
    pub eccentric_anomaly: f64,
    /// Number of Newton steps taken, including the final one.
    pub iterations: u32,
}

/// Solves Kepler's equation `M = E - e sin E` for the eccentric anomaly.
///
/// Newton iteration runs on the mean anomaly reduced into [0, 2π); the
/// whole revolutions are added back afterwards, so the result is on the
/// same revolution as `mean_anomaly`.
pub fn solve_kepler(mean_anomaly: f64, eccentricity: f64)
                    -> Result<KeplerSolution> {
    ensure_finite("mean anomaly", mean_anomaly)?;
    if !(eccentricity >= 0.0 && eccentricity < 1.0) {
        return Err(HierarchyError::numerical(format!(
            "cannot solve Kepler's equation for eccentricity {}",
            eccentricity)));
    }

    let e = eccentricity;
    let m = mean_anomaly.rem_euclid(TAU);
    let mut ea = if e < 0.8 { m } else { PI };

    for iteration in 1..MAX_KEPLER_ITERATIONS + 1 {
        let delta = (m + e * ea.sin() - ea) / (1.0 - e * ea.cos());
        ea += delta;
        if !ea.is_finite() {
            return Err(HierarchyError::numerical(format!(
                "eccentric anomaly diverged to {} (M = {}, e = {})",
                ea, m, e)));
        }
        if delta.abs() <= KEPLER_TOLERANCE {
            trace!("Kepler solved in {} iterations (M = {}, e = {})",
                   iteration, m, e);
            return Ok(KeplerSolution {
                eccentric_anomaly: mean_anomaly + (ea - m),
                iterations: iteration,
            });
        }
    }

    Err(HierarchyError::numerical(format!(
        "Kepler's equation did not converge within {} iterations \
         (M = {}, e = {})", MAX_KEPLER_ITERATIONS, m, e)))
}

/// Converts an eccentric anomaly into a true anomaly in (-π, π].
pub fn true_anomaly(eccentric_anomaly: f64, eccentricity: f64) -> f64 {
    let half = eccentric_anomaly / 2.0;
    2.0 * ((1.0 + eccentricity).sqrt() * half.sin())
        .atan2((1.0 - eccentricity).sqrt() * half.cos())
}

/// The period of an orbit with semimajor axis `a` under gravitational
/// parameter `mu`.
pub fn orbital_period(semimajor_axis: f64, mu: f64) -> f64 {
    TAU * (semimajor_axis.powi(3) / mu).sqrt()
}

/// Position and velocity in the perifocal frame at true anomaly `f`.
pub fn perifocal_state(f: f64, eccentricity: f64, semimajor_axis: f64,
                       mu: f64) -> (Position, Velocity) {
    let e = eccentricity;
    let p = semimajor_axis * (1.0 - e * e);
    let r = p / (1.0 + e * f.cos());
    let speed = (mu / p).sqrt();

    (Vector3::new(r * f.cos(), r * f.sin(), 0.0),
     Vector3::new(-speed * f.sin(), speed * (e + f.cos()), 0.0))
}

/// The 3-1-3 rotation `Rz(Ω) Rx(i) Rz(ω)` from the perifocal frame into
/// the parent's frame.
pub fn perifocal_to_parent(inclination: f64, longitude_of_ascending_node: f64,
                           argument_of_periapsis: f64) -> Basis {
    let (si, ci) = inclination.sin_cos();
    let (so, co) = longitude_of_ascending_node.sin_cos();
    let (sw, cw) = argument_of_periapsis.sin_cos();

    Matrix3::from_cols(
        Vector3::new(co * cw - so * sw * ci,
                     so * cw + co * sw * ci,
                     sw * si),
        Vector3::new(-co * sw - so * cw * ci,
                     -so * sw + co * cw * ci,
                     cw * si),
        Vector3::new(so * si,
                     -co * si,
                     ci))
}

/// A Keplerian orbit of one body around another.
///
/// The elements are fixed at construction. Each frame has a single-slot memo,
/// so repeated queries for the same time within a tick cost nothing.
#[derive(Clone, Debug)]
pub struct Orbit {
    elements: OrbitalElements,
    parent: EntityId,
    orbiter: Option<EntityId>,
    spin: Spin,
    absolute_memo: MonoMemory<Ephemeris>,
    relative_memo: MonoMemory<Ephemeris>,
}

impl Orbit {
    pub fn new(elements: OrbitalElements, parent: EntityId) -> Result<Self> {
        elements.validate()?;
        Ok(Orbit {
            elements: elements,
            parent: parent,
            orbiter: None,
            spin: Spin::default(),
            absolute_memo: MonoMemory::new(),
            relative_memo: MonoMemory::new(),
        })
    }

    pub fn with_spin(mut self, spin: Spin) -> Result<Self> {
        if !is_finite_vec(spin.angular_velocity) ||
            !is_finite_vec(spin.rotation_offset.v) ||
            !spin.rotation_offset.s.is_finite()
        {
            return Err(HierarchyError::numerical(
                format!("spin {:?} is not finite", spin)));
        }

        self.spin = spin;
        Ok(self)
    }

    pub fn elements(&self) -> &OrbitalElements {
        &self.elements
    }

    pub fn parent(&self) -> EntityId {
        self.parent
    }

    pub fn orbiter(&self) -> Option<EntityId> {
        self.orbiter
    }

    pub fn spin(&self) -> &Spin {
        &self.spin
    }

    /// Sets the body travelling along this orbit, whose mass contributes to
    /// μ.
    pub fn set_orbiter(&mut self, orbiter: EntityId) {
        self.orbiter = Some(orbiter);
        self.forget();
    }

    pub(crate) fn set_parent(&mut self, parent: EntityId) {
        self.parent = parent;
        self.forget();
    }

    /// Drops both memos.
    pub fn forget(&self) {
        self.absolute_memo.clear();
        self.relative_memo.clear();
    }

    /// The standard gravitational parameter of the two-body system.
    ///
    /// Without an orbiter, the orbiting body is treated as massless.
    pub fn mu<B: Bodies + ?Sized>(&self, bodies: &B) -> Result<f64> {
        let parent_mass = ensure_massive(
            self.parent, bodies.collective_mass(self.parent)?)?;
        let orbiter_mass = match self.orbiter {
            Some(orbiter) => ensure_massive(
                orbiter, bodies.collective_mass(orbiter)?)?,
            None => 0.0,
        };

        let mu = GRAVITATIONAL_CONSTANT * (parent_mass + orbiter_mass);
        if mu.is_finite() && mu > 0.0 {
            Ok(mu)
        } else {
            Err(HierarchyError::numerical(format!("mu is {}", mu)))
        }
    }

    pub fn period<B: Bodies + ?Sized>(&self, bodies: &B) -> Result<Seconds> {
        let mu = self.mu(bodies)?;
        ensure_finite("orbital period",
                      orbital_period(self.elements.semimajor_axis, mu))
    }

    /// Evaluates the orbit at `time` without touching the memos.
    pub fn kinematics<B: Bodies + ?Sized>(&self, bodies: &B, time: Seconds,
                                          frame: Frame) -> Result<Ephemeris> {
        let el = &self.elements;
        let mu = self.mu(bodies)?;
        let a = el.semimajor_axis;
        let e = el.eccentricity;

        let mean_motion = ensure_finite("mean motion", (mu / a.powi(3)).sqrt())?;
        let mean_anomaly = ensure_finite("mean anomaly", mean_motion * time)?;
        let eccentric = solve_kepler(mean_anomaly, e)?.eccentric_anomaly;
        let f = ensure_finite(
            "true anomaly",
            (true_anomaly(eccentric, e) + el.true_anomaly).rem_euclid(TAU))?;

        let (pos, vel) = perifocal_state(f, e, a, mu);
        let rot = perifocal_to_parent(el.inclination,
                                      el.longitude_of_ascending_node,
                                      el.argument_of_periapsis);
        let mut position = rot * pos;
        let velocity = rot * vel;

        if Frame::Absolute == frame {
            position += bodies.position_at_time(self.parent, time)?;
        }

        if !is_finite_vec(position) || !is_finite_vec(velocity) {
            return Err(HierarchyError::numerical(format!(
                "orbit around {} yields position {:?}, velocity {:?} at {}",
                self.parent, position, velocity, time)));
        }

        Ok(Ephemeris {
            time: time,
            position: position,
            velocity: velocity,
            rotation: self.spin.rotation_at(time),
            angular_velocity: self.spin.angular_velocity,
        })
    }

    /// The ephemeris relative to the hierarchy root at `time`, memoized.
    pub fn absolute_kinematics<B: Bodies + ?Sized>(&self, bodies: &B,
                                                   time: Seconds)
                                                   -> Result<Ephemeris> {
        self.absolute_memo.get_or_try_insert_with(
            time, || self.kinematics(bodies, time, Frame::Absolute))
    }

    /// The ephemeris relative to the parent body at `time`, memoized.
    pub fn relative_kinematics<B: Bodies + ?Sized>(&self, bodies: &B,
                                                   time: Seconds)
                                                   -> Result<Ephemeris> {
        self.relative_memo.get_or_try_insert_with(
            time, || self.kinematics(bodies, time, Frame::Relative))
    }
}

#[cfg(test)]
mod test {
    use std::cell::Cell;
    use std::f64::consts::FRAC_PI_2;

    use proptest::prelude::*;

    use super::*;

    const SUN: usize = 0;
    const EARTH: usize = 1;

    struct TestBodies {
        masses: Vec<f64>,
        positions: Vec<Position>,
        mass_queries: Cell<u32>,
    }

    impl TestBodies {
        fn new(masses: &[f64]) -> Self {
            TestBodies {
                masses: masses.to_vec(),
                positions: vec![Vector3::zero(); masses.len()],
                mass_queries: Cell::new(0),
            }
        }
    }

    impl Bodies for TestBodies {
        fn collective_mass(&self, entity: EntityId) -> Result<f64> {
            self.mass_queries.set(self.mass_queries.get() + 1);
            Ok(self.masses[entity.index()])
        }

        fn position_at_time(&self, entity: EntityId, _: Seconds)
                            -> Result<Position> {
            Ok(self.positions[entity.index()])
        }
    }

    fn id(ix: usize) -> EntityId {
        EntityId::from_index(ix)
    }

    fn solar() -> TestBodies {
        TestBodies::new(&[1.989e30, 5.972e24])
    }

    #[test]
    fn circular_kepler_is_exact_in_one_iteration() {
        for &m in &[0.0, 0.5, 3.0, 6.0, -2.0, 7.5, 1e3] {
            let solution = solve_kepler(m, 0.0).unwrap();
            assert_eq!(m, solution.eccentric_anomaly);
            assert_eq!(1, solution.iterations);
        }
    }

    #[test]
    fn kepler_keeps_the_revolution() {
        let base = solve_kepler(0.5, 0.3).unwrap().eccentric_anomaly;
        let later = solve_kepler(0.5 + 3.0 * TAU, 0.3).unwrap()
            .eccentric_anomaly;
        let earlier = solve_kepler(0.5 - TAU, 0.3).unwrap().eccentric_anomaly;
        assert_approx!(1e-9, base + 3.0 * TAU, later);
        assert_approx!(1e-9, base - TAU, earlier);
    }

    #[test]
    fn kepler_rejects_unbound_eccentricity() {
        assert!(solve_kepler(1.0, 1.0).is_err());
        assert!(solve_kepler(1.0, -0.1).is_err());
        assert!(solve_kepler(::std::f64::NAN, 0.5).is_err());
    }

    proptest! {
        #[test]
        fn kepler_converges_for_moderate_eccentricity(
            m in -1e3f64..1e3, e in 0.0f64..0.9
        ) {
            let solution = solve_kepler(m, e).unwrap();
            prop_assert!(solution.iterations <= MAX_KEPLER_ITERATIONS);

            let ea = solution.eccentric_anomaly;
            let residual = ea - e * ea.sin() - m;
            prop_assert!(residual.abs() < 1e-6,
                         "M = {}, e = {}, E = {}, residual = {}",
                         m, e, ea, residual);
        }
    }

    #[test]
    fn one_year_period() {
        let period = orbital_period(1.496e11, 1.327e20);
        assert_approx!(1e5, 3.156e7, period);
    }

    #[test]
    fn elements_validate() {
        assert!(OrbitalElements::circular(1.0).validate().is_ok());
        assert!(OrbitalElements::circular(0.0).validate().is_err());
        assert!(OrbitalElements::circular(-5.0).validate().is_err());

        let mut el = OrbitalElements::circular(1.0);
        el.eccentricity = 1.0;
        assert!(Orbit::new(el, id(SUN)).is_err());
        el.eccentricity = 0.5;
        el.inclination = ::std::f64::INFINITY;
        assert!(Orbit::new(el, id(SUN)).is_err());
    }

    #[test]
    fn circular_orbit_keeps_radius_and_speed() {
        let bodies = solar();
        let mut orbit = Orbit::new(
            OrbitalElements::circular(1.496e11), id(SUN)).unwrap();
        orbit.set_orbiter(id(EARTH));
        let mu = orbit.mu(&bodies).unwrap();

        for &t in &[0.0, 1e5, 1e6, 1e7] {
            let eph = orbit.kinematics(&bodies, t, Frame::Relative).unwrap();
            assert_approx!(1.0, 1.496e11, eph.position.magnitude());
            assert_approx!(1e-6, (mu / 1.496e11).sqrt(),
                           eph.velocity.magnitude());
            assert_approx!(1e-3, 0.0, eph.position.dot(eph.velocity) / 1e11);
        }
    }

    #[test]
    fn returns_to_start_after_one_period() {
        let bodies = solar();
        let mut el = OrbitalElements::circular(1.496e11);
        el.eccentricity = 0.3;
        el.inclination = 0.4;
        el.argument_of_periapsis = 1.0;
        let orbit = Orbit::new(el, id(SUN)).unwrap();
        let period = orbit.period(&bodies).unwrap();

        let start = orbit.kinematics(&bodies, 0.0, Frame::Relative).unwrap();
        let end = orbit.kinematics(&bodies, period, Frame::Relative).unwrap();
        assert!((start.position - end.position).magnitude() < 1e3,
                "{:?} vs {:?}", start.position, end.position);
    }

    #[test]
    fn starts_at_periapsis() {
        let bodies = solar();
        let mut el = OrbitalElements::circular(1e11);
        el.eccentricity = 0.5;
        let orbit = Orbit::new(el, id(SUN)).unwrap();

        let eph = orbit.kinematics(&bodies, 0.0, Frame::Relative).unwrap();
        assert_approx!(1e-3, 0.5e11, eph.position.x);
        assert_approx!(1e-3, 0.0, eph.position.y);
        assert!(eph.velocity.y > 0.0);
    }

    #[test]
    fn polar_orbit_leaves_the_plane() {
        let bodies = solar();
        let mut el = OrbitalElements::circular(1e9);
        el.inclination = FRAC_PI_2;
        el.true_anomaly = FRAC_PI_2;
        let orbit = Orbit::new(el, id(SUN)).unwrap();

        let eph = orbit.kinematics(&bodies, 0.0, Frame::Relative).unwrap();
        assert_approx!(1e-3, 0.0, eph.position.x);
        assert_approx!(1e-3, 0.0, eph.position.y);
        assert_approx!(1e-3, 1e9, eph.position.z);
    }

    #[test]
    fn absolute_frame_adds_parent_position() {
        let mut bodies = solar();
        bodies.positions[SUN] = Vector3::new(5.0, 6.0, 7.0);
        let orbit = Orbit::new(OrbitalElements::circular(100.0), id(SUN))
            .unwrap();

        let rel = orbit.relative_kinematics(&bodies, 3.0).unwrap();
        let abs = orbit.absolute_kinematics(&bodies, 3.0).unwrap();
        let diff = abs.position - rel.position;
        assert_approx!(1e-9, 5.0, diff.x);
        assert_approx!(1e-9, 6.0, diff.y);
        assert_approx!(1e-9, 7.0, diff.z);
    }

    #[test]
    fn memo_holds_one_time_value() {
        let bodies = solar();
        let mut orbit = Orbit::new(OrbitalElements::circular(1e11), id(SUN))
            .unwrap();
        orbit.set_orbiter(id(EARTH));

        orbit.relative_kinematics(&bodies, 10.0).unwrap();
        let after_first = bodies.mass_queries.get();
        assert!(after_first > 0);

        orbit.relative_kinematics(&bodies, 10.0).unwrap();
        assert_eq!(after_first, bodies.mass_queries.get());

        orbit.relative_kinematics(&bodies, 20.0).unwrap();
        let after_second = bodies.mass_queries.get();
        assert!(after_second > after_first);

        orbit.relative_kinematics(&bodies, 10.0).unwrap();
        assert!(bodies.mass_queries.get() > after_second);
    }

    #[test]
    fn massless_parent_is_rejected() {
        let bodies = TestBodies::new(&[0.0, 1.0]);
        let orbit = Orbit::new(OrbitalElements::circular(1.0), id(SUN))
            .unwrap();
        match orbit.kinematics(&bodies, 0.0, Frame::Relative) {
            Err(HierarchyError::NumericalInvalidity(_)) => (),
            other => panic!("Unexpected {:?}", other),
        }
    }

    #[test]
    fn massless_orbiter_is_rejected() {
        let bodies = TestBodies::new(&[1e20, 0.0]);
        let mut orbit = Orbit::new(OrbitalElements::circular(1.0), id(SUN))
            .unwrap();
        assert!(orbit.mu(&bodies).is_ok());
        orbit.set_orbiter(id(EARTH));
        assert!(orbit.mu(&bodies).is_err());
    }

    #[test]
    fn spin_wraps_at_rotational_period() {
        let spin = Spin {
            rotation_offset: Quaternion::new(1.0, 0.0, 0.0, 0.0),
            angular_velocity: Vector3::new(0.0, 0.0, 0.5),
        };

        let quarter = spin.rotation_at(PI) * Vector3::new(1.0, 0.0, 0.0);
        assert_approx!(1e-12, 0.0, quarter.x);
        assert_approx!(1e-12, 1.0, quarter.y);

        let later = spin.rotation_at(PI + 4.0 * PI) *
            Vector3::new(1.0, 0.0, 0.0);
        assert_approx!(1e-9, 0.0, later.x);
        assert_approx!(1e-9, 1.0, later.y);
    }

    #[test]
    fn ephemeris_carries_spin() {
        let bodies = solar();
        let spin = Spin {
            rotation_offset: Quaternion::from_angle_x(Rad(1.0)),
            angular_velocity: Vector3::zero(),
        };
        let orbit = Orbit::new(OrbitalElements::circular(1e9), id(SUN))
            .unwrap().with_spin(spin).unwrap();
        let eph = orbit.kinematics(&bodies, 123.0, Frame::Relative).unwrap();
        assert_eq!(spin.rotation_offset, eph.rotation);
    }
}
