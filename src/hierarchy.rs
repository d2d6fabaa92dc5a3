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

/*! The locality tree and everything that needs more than one node.

`Hierarchy` is an arena. Localities and physical entities are stored in
`Vec`s and refer to each other by index handle. Deleted localities are never
removed; they stay behind flagged `OBSOLETE`, so a stale handle is always
detected as such rather than silently aliasing a newer node.

## Superiors

A locality's superior is not stored directly. `Fixed` and `Kinematic`
localities name their anchor locality, but `Orbiting`, `Lagrange1` and
`Attached` localities name an _entity_, and their superior is whichever
locality currently positions that entity. Moving an entity between
localities therefore moves everything anchored through it.

The subordinate lists are the reverse index of this relation and are kept in
sync by every structural mutation.

## Depth

Each node caches its distance from the root. A cached depth of
`UNKNOWN_DEPTH` means "recompute on demand": the query walks up until it
finds a node with a known depth (or the root) and fills in the path on the
way back down. The walk tracks visited nodes, so a cycle is reported rather
than looped on.

When a node is moved, its own depth is recomputed immediately. Only if it
actually changed are its subordinates' depths invalidated.

## Transforms

The transform of `a` relative to `b` is found by taking their lowest common
ancestor `c`, then composing the local transforms from `c` down to each of
them, outermost first:

```text
  inherits rotation:        acc = acc * local
  does not inherit:         acc = local translated by acc.origin
```

The second rule is what lets an orbiting body carry its satellites' positions
without spinning them around with its orbital frame. The result is then
`inverse(chain(b)) * chain(a)`, with the basis re-orthonormalised.

Every chain is evaluated at a single orbit time. The plain queries use the
clock's current orbit time; the `_at` variants take one explicitly, which is
how positions of bodies at future times are found.

Nothing here is cached beyond depths and each orbit's own per-time memo;
every transform query re-evaluates the local transforms involved.
*/

use std::cell::RefCell;
use std::mem;

use bit_set::BitSet;
use cgmath::{InnerSpace, Vector3, Zero};
use fnv::FnvHashMap;
use smallvec::SmallVec;

use body::{Bodies, EntityId, PhysicalEntity};
use clock::WorldClock;
use defs::*;
use error::{ensure_finite, HierarchyError, Result};
use locality::{Attached, Fixed, Kinematic, Lagrange1, Locality, LocalityFlags,
               LocalityId, LocalityKind, Orbiting, ReanchorMethod,
               Visualizability};
use orbit::{Frame, Orbit};
use xform::Transform;

/// A path of localities, innermost first.
type Path = SmallVec<[LocalityId; 16]>;

#[derive(Clone, Debug)]
pub struct Hierarchy {
    localities: Vec<Locality>,
    entities: Vec<PhysicalEntity>,
    names: FnvHashMap<String, LocalityId>,
    root: LocalityId,
    clock: WorldClock,
    /// L1 points whose offsets are currently being evaluated.
    lagrange_active: RefCell<BitSet>,
}

impl Default for Hierarchy {
    fn default() -> Self {
        Hierarchy::new()
    }
}

impl Hierarchy {
    /// Creates a hierarchy containing only its root, with the clock at zero.
    pub fn new() -> Self {
        let mut root = Locality::new(LocalityKind::Root);
        root.depth.set(0);
        root.name = Some("root".to_owned());

        let root_id = LocalityId::from_index(0);
        let mut names = FnvHashMap::default();
        names.insert("root".to_owned(), root_id);

        Hierarchy {
            localities: vec![root],
            entities: Vec::new(),
            names: names,
            root: root_id,
            clock: WorldClock::new(),
            lagrange_active: RefCell::new(BitSet::new()),
        }
    }

    #[inline]
    pub fn root(&self) -> LocalityId {
        self.root
    }

    #[inline]
    pub fn clock(&self) -> &WorldClock {
        &self.clock
    }

    #[inline]
    pub fn clock_mut(&mut self) -> &mut WorldClock {
        &mut self.clock
    }

    // ---------------------------------------------------------------------
    // Lookup

    /// Returns the locality behind `id`.
    ///
    /// Fails with `ObsoleteAccess` if it has been deleted, or
    /// `InvalidHierarchy` if `id` never belonged to this hierarchy.
    pub fn locality(&self, id: LocalityId) -> Result<&Locality> {
        match self.localities.get(id.index()) {
            None => Err(HierarchyError::invalid(
                format!("{} does not exist", id))),
            Some(loc) if loc.is_obsolete() =>
                Err(HierarchyError::ObsoleteAccess(id)),
            Some(loc) => Ok(loc),
        }
    }

    fn locality_mut(&mut self, id: LocalityId) -> Result<&mut Locality> {
        self.validate(id)?;
        Ok(&mut self.localities[id.index()])
    }

    #[inline]
    pub fn validate(&self, id: LocalityId) -> Result<()> {
        self.locality(id).map(|_| ())
    }

    pub fn is_obsolete(&self, id: LocalityId) -> bool {
        self.localities.get(id.index()).map_or(false, |l| l.is_obsolete())
    }

    pub fn is_predicted(&self, id: LocalityId) -> Result<bool> {
        Ok(self.locality(id)?.is_predicted())
    }

    pub fn name(&self, id: LocalityId) -> Result<Option<&str>> {
        Ok(self.locality(id)?.name())
    }

    /// Names `id`, which becomes the result of `find_by_name()` for that
    /// name even if another locality already carries it.
    pub fn set_name<S: Into<String>>(&mut self, id: LocalityId, name: S)
                                     -> Result<()> {
        self.validate(id)?;
        let name = name.into();
        if let Some(old) = self.localities[id.index()].name.take() {
            self.unindex_name(id, &old);
        }

        self.names.insert(name.clone(), id);
        self.localities[id.index()].name = Some(name);
        Ok(())
    }

    pub fn find_by_name(&self, name: &str) -> Option<LocalityId> {
        self.names.get(name).cloned()
    }

    /// Drops `id` from the name index. If another live locality has the
    /// same name, the highest-numbered one takes over.
    fn unindex_name(&mut self, id: LocalityId, name: &str) {
        if self.names.get(name) != Some(&id) {
            return;
        }

        self.names.remove(name);
        let fallback = self.localities.iter().enumerate().rev()
            .find(|&(ix, loc)| ix != id.index() && !loc.is_obsolete() &&
                  loc.name() == Some(name))
            .map(|(ix, _)| LocalityId::from_index(ix));
        if let Some(fallback) = fallback {
            self.names.insert(name.to_owned(), fallback);
        }
    }

    // ---------------------------------------------------------------------
    // Physical entities

    pub fn add_entity(&mut self, name: &str, mass: Mass) -> Result<EntityId> {
        let entity = PhysicalEntity::new(name, mass)?;
        let id = EntityId::from_index(self.entities.len());
        self.entities.push(entity);
        debug!("Added {} \"{}\" of mass {}", id, name, mass);
        Ok(id)
    }

    pub fn entity(&self, id: EntityId) -> Result<&PhysicalEntity> {
        self.entities.get(id.index()).ok_or_else(
            || HierarchyError::invalid(format!("{} does not exist", id)))
    }

    pub fn entity_locality(&self, id: EntityId) -> Result<Option<LocalityId>> {
        Ok(self.entity(id)?.locality)
    }

    /// The locality positioning `entity`, which must exist.
    fn placement(&self, entity: EntityId) -> Result<LocalityId> {
        self.entity(entity)?.locality.ok_or_else(
            || HierarchyError::invalid(format!(
                "{} is not placed in the hierarchy", entity)))
    }

    /// Links `entity` and `locality` to each other.
    ///
    /// Both must currently be unlinked. Localities left anchored to the
    /// entity by an earlier delete hang from `locality` afterwards.
    pub fn set_physical_entity(&mut self, locality: LocalityId,
                               entity: EntityId) -> Result<()> {
        self.validate(locality)?;
        if let Some(existing) = self.localities[locality.index()].entity {
            return Err(HierarchyError::invalid(format!(
                "{} already positions {}", locality, existing)));
        }
        if let Some(existing) = self.entity(entity)?.locality {
            return Err(HierarchyError::invalid(format!(
                "{} is already positioned by {}", entity, existing)));
        }
        if self.depends_on_entity(&self.localities[locality.index()].kind,
                                  entity) {
            return Err(HierarchyError::invalid(format!(
                "{} cannot position {}, which it is derived from",
                locality, entity)));
        }
        // Anything adopted below must end up connected to the root.
        self.hierarchy_depth(locality)?;

        let orphans: Vec<LocalityId> = self.localities.iter().enumerate()
            .filter(|&(_, loc)| !loc.is_obsolete() &&
                    loc.kind.entity_anchor() == Some(entity))
            .map(|(ix, _)| LocalityId::from_index(ix))
            .collect();

        {
            let node = &mut self.localities[locality.index()];
            node.entity = Some(entity);
            if let LocalityKind::Orbiting(ref mut o) = node.kind {
                o.orbit_mut().set_orbiter(entity);
            }
        }
        self.entities[entity.index()].locality = Some(locality);

        for &orphan in &orphans {
            self.localities[locality.index()].subordinates.push(orphan);
            self.invalidate_depth(orphan);
        }

        self.forget_ephemerides();
        debug!("Linked {} to {}, adopting {} orphan(s)",
               entity, locality, orphans.len());
        Ok(())
    }

    /// Whether `kind` is positioned relative to `entity` in a way that
    /// would make it its own ancestor if it also positioned `entity`.
    fn depends_on_entity(&self, kind: &LocalityKind, entity: EntityId)
                         -> bool {
        match *kind {
            LocalityKind::Lagrange1(ref l) => l.secondary() == entity ||
                l.primary() == entity,
            _ => kind.entity_anchor() == Some(entity),
        }
    }

    // ---------------------------------------------------------------------
    // Construction

    pub fn create_fixed(&mut self, anchor: LocalityId, transform: Transform,
                        entity: Option<EntityId>) -> Result<LocalityId> {
        let kind = LocalityKind::Fixed(Fixed::new(anchor, transform)?);
        self.insert(kind, entity)
    }

    pub fn create_kinematic(&mut self, anchor: LocalityId,
                            transform: Transform, velocity: Velocity,
                            entity: Option<EntityId>) -> Result<LocalityId> {
        let kind = LocalityKind::Kinematic(
            Kinematic::new(anchor, transform, velocity)?);
        self.insert(kind, entity)
    }

    /// Creates a locality following `orbit` around the orbit's parent
    /// entity. If `entity` is given, it becomes the orbit's orbiter.
    pub fn create_orbiting(&mut self, orbit: Orbit, entity: Option<EntityId>)
                           -> Result<LocalityId> {
        self.insert(LocalityKind::Orbiting(Orbiting::new(orbit)), entity)
    }

    pub fn create_lagrange1(&mut self, primary: EntityId, secondary: EntityId,
                            entity: Option<EntityId>) -> Result<LocalityId> {
        self.entity(secondary)?;
        let kind = LocalityKind::Lagrange1(Lagrange1::new(primary, secondary)?);
        self.insert(kind, entity)
    }

    pub fn create_attached(&mut self, anchor: EntityId, transform: Transform,
                           entity: Option<EntityId>) -> Result<LocalityId> {
        let kind = LocalityKind::Attached(Attached::new(anchor, transform)?);
        self.insert(kind, entity)
    }

    fn insert(&mut self, mut kind: LocalityKind, entity: Option<EntityId>)
              -> Result<LocalityId> {
        let superior = if let Some(anchor) = kind.locality_anchor() {
            self.validate(anchor)?;
            anchor
        } else if let Some(anchor) = kind.entity_anchor() {
            let superior = self.placement(anchor)?;
            self.validate(superior)?;
            superior
        } else {
            return Err(HierarchyError::invalid(
                "only the root may lack a superior"));
        };

        if let Some(entity) = entity {
            if let Some(existing) = self.entity(entity)?.locality {
                return Err(HierarchyError::invalid(format!(
                    "{} is already positioned by {}", entity, existing)));
            }
            if self.depends_on_entity(&kind, entity) {
                return Err(HierarchyError::invalid(format!(
                    "{} locality cannot position {}, which it is derived from",
                    kind.variant_name(), entity)));
            }
            if let LocalityKind::Orbiting(ref mut o) = kind {
                o.orbit_mut().set_orbiter(entity);
            }
        }

        let id = LocalityId::from_index(self.localities.len());
        let variant = kind.variant_name();
        let mut locality = Locality::new(kind);
        locality.entity = entity;
        self.localities.push(locality);
        if let Some(entity) = entity {
            self.entities[entity.index()].locality = Some(id);
        }

        self.register_hierarchy_subordinate(superior, id)?;
        self.forget_ephemerides();
        debug!("Created {} {} under {}", variant, id, superior);
        Ok(id)
    }

    // ---------------------------------------------------------------------
    // Tree structure

    /// Returns the superior of `id`, or `None` for the root.
    pub fn hierarchy_superior(&self, id: LocalityId)
                              -> Result<Option<LocalityId>> {
        let node = self.locality(id)?;
        let superior = if let Some(anchor) = node.kind.locality_anchor() {
            anchor
        } else if let Some(anchor) = node.kind.entity_anchor() {
            self.placement(anchor)?
        } else {
            return Ok(None);
        };

        if self.is_obsolete(superior) {
            Err(HierarchyError::invalid(format!(
                "{} hangs from deleted {}", id, superior)))
        } else {
            Ok(Some(superior))
        }
    }

    pub fn hierarchy_subordinates(&self, id: LocalityId)
                                  -> Result<&[LocalityId]> {
        Ok(self.locality(id)?.subordinates())
    }

    /// Returns the distance of `id` from the root, recomputing it (and that
    /// of any ancestor whose depth is unknown) if necessary.
    pub fn hierarchy_depth(&self, id: LocalityId) -> Result<u32> {
        let cached = self.locality(id)?.depth.get();
        if UNKNOWN_DEPTH != cached {
            return Ok(cached);
        }

        let mut path = Path::new();
        let mut seen = BitSet::new();
        let mut cur = id;
        let base = loop {
            if !seen.insert(cur.index()) {
                return Err(HierarchyError::invalid(format!(
                    "superior chain of {} loops through {}", id, cur)));
            }

            let depth = self.locality(cur)?.depth.get();
            if UNKNOWN_DEPTH != depth {
                break Some(depth);
            }

            path.push(cur);
            match self.hierarchy_superior(cur)? {
                Some(superior) => cur = superior,
                None => break None,
            }
        };

        let mut depth = base.map_or(0, |d| d + 1);
        for &node in path.iter().rev() {
            self.localities[node.index()].depth.set(depth);
            depth += 1;
        }

        let depth = self.localities[id.index()].depth.get();
        trace!("Depth of {} is {} ({} node(s) recomputed)",
               id, depth, path.len());
        Ok(depth)
    }

    /// Marks the depth of `id` and its whole subtree as unknown.
    fn invalidate_depth(&self, id: LocalityId) {
        let mut stack = Path::new();
        let mut seen = BitSet::new();
        stack.push(id);

        while let Some(node) = stack.pop() {
            if !seen.insert(node.index()) {
                continue;
            }

            let loc = &self.localities[node.index()];
            loc.depth.set(UNKNOWN_DEPTH);
            stack.extend(loc.subordinates.iter().cloned());
        }
    }

    /// Recomputes the depth of `id` from its superior. If it changed, the
    /// depths of its subordinates are invalidated.
    pub fn recalculate_hierarchy_depth(&self, id: LocalityId) -> Result<u32> {
        let node = self.locality(id)?;
        let previous = node.depth.replace(UNKNOWN_DEPTH);
        let depth = self.hierarchy_depth(id)?;

        if previous != depth {
            for &sub in &node.subordinates {
                self.invalidate_depth(sub);
            }
        }

        Ok(depth)
    }

    /// Records `child` as a subordinate of `parent`, which must be what
    /// `child` already resolves as its superior.
    pub fn register_hierarchy_subordinate(&mut self, parent: LocalityId,
                                          child: LocalityId) -> Result<()> {
        self.validate(parent)?;
        let actual = self.hierarchy_superior(child)?;
        if Some(parent) != actual {
            return Err(HierarchyError::invalid(format!(
                "{} is not the superior of {} ({:?} is)",
                parent, child, actual)));
        }

        {
            let subs = &mut self.localities[parent.index()].subordinates;
            if !subs.contains(&child) {
                subs.push(child);
            }
        }

        self.recalculate_hierarchy_depth(child)?;
        debug!("Registered {} under {}", child, parent);
        Ok(())
    }

    fn deregister(&mut self, parent: LocalityId, child: LocalityId) {
        if let Some(p) = self.localities.get_mut(parent.index()) {
            p.subordinates.retain(|s| *s != child);
        }
    }

    fn step_up(&self, id: LocalityId, a: LocalityId, b: LocalityId)
               -> Result<LocalityId> {
        self.hierarchy_superior(id)?.ok_or_else(
            || HierarchyError::invalid(format!(
                "{} and {} share no common ancestor", a, b)))
    }

    /// Finds the deepest locality which is an ancestor of (or equal to)
    /// both `a` and `b`.
    pub fn lowest_common_ancestor(&self, a: LocalityId, b: LocalityId)
                                  -> Result<LocalityId> {
        let mut da = self.hierarchy_depth(a)?;
        let mut db = self.hierarchy_depth(b)?;
        let (mut x, mut y) = (a, b);

        while da > db {
            x = self.step_up(x, a, b)?;
            da -= 1;
        }
        while db > da {
            y = self.step_up(y, a, b)?;
            db -= 1;
        }
        while x != y {
            if 0 == da {
                return Err(HierarchyError::invalid(format!(
                    "{} and {} share no common ancestor", a, b)));
            }

            x = self.step_up(x, a, b)?;
            y = self.step_up(y, a, b)?;
            da -= 1;
        }

        Ok(x)
    }

    /// Whether `ancestor` is a strict ancestor of `node`.
    pub fn is_ancestor(&self, ancestor: LocalityId, node: LocalityId)
                       -> Result<bool> {
        let da = self.hierarchy_depth(ancestor)?;
        let mut dn = self.hierarchy_depth(node)?;
        if da >= dn {
            return Ok(false);
        }

        let mut cur = node;
        while dn > da {
            cur = self.step_up(cur, ancestor, node)?;
            dn -= 1;
        }
        Ok(cur == ancestor)
    }

    /// Whether `node` is `ancestor` or lies below it.
    ///
    /// Unlike `is_ancestor()` this only walks up from `node`, so `ancestor`
    /// may be detached from the root.
    fn is_within(&self, node: LocalityId, ancestor: LocalityId)
                 -> Result<bool> {
        let mut seen = BitSet::new();
        let mut cur = Some(node);
        while let Some(here) = cur {
            if here == ancestor {
                return Ok(true);
            }
            if !seen.insert(here.index()) {
                return Err(HierarchyError::invalid(format!(
                    "superior chain of {} loops through {}", node, here)));
            }
            cur = self.hierarchy_superior(here)?;
        }

        Ok(false)
    }

    // ---------------------------------------------------------------------
    // Transforms

    pub fn inherits_rotation(&self, id: LocalityId) -> Result<bool> {
        Ok(self.locality(id)?.kind.inherits_rotation())
    }

    pub fn visualizability(&self, id: LocalityId) -> Result<Visualizability> {
        Ok(self.locality(id)?.kind.visualizability())
    }

    /// The transform of `id` relative to its superior, evaluated now.
    pub fn local_transform(&self, id: LocalityId) -> Result<Transform> {
        self.local_transform_at(id, self.clock.orbit_time())
    }

    /// The transform of `id` relative to its superior at orbit time `time`.
    ///
    /// Orbits and L1 points are evaluated at `time`. Kinematic localities
    /// only move when updated, so they report their current transform.
    pub fn local_transform_at(&self, id: LocalityId, time: Seconds)
                              -> Result<Transform> {
        match self.locality(id)?.kind {
            LocalityKind::Root => Ok(Transform::identity()),
            LocalityKind::Fixed(ref f) => Ok(f.transform()),
            LocalityKind::Kinematic(ref k) => Ok(k.fixed().transform()),
            LocalityKind::Attached(ref a) => Ok(a.transform()),
            LocalityKind::Orbiting(ref o) => o.local_transform(self, time),
            LocalityKind::Lagrange1(ref l) =>
                self.lagrange_transform(id, l, time),
        }
    }

    fn lagrange_transform(&self, id: LocalityId, l1: &Lagrange1,
                          time: Seconds) -> Result<Transform> {
        if let Some(secondary) = self.entity(l1.secondary())?.locality {
            if self.is_within(secondary, id)? {
                return Err(HierarchyError::invalid(format!(
                    "L1 point {} is positioned relative to its own \
                     descendant {}", id, secondary)));
            }
        }

        // Two L1 points can still depend on each other through their
        // secondaries' ancestors.
        if !self.lagrange_active.borrow_mut().insert(id.index()) {
            return Err(HierarchyError::invalid(format!(
                "L1 point {} depends on itself", id)));
        }

        let offset = l1.offset(self, time);
        self.lagrange_active.borrow_mut().remove(id.index());
        Ok(Transform::from_translation(offset?))
    }

    /// Composes the local transforms from `stop` (exclusive) down to `id`.
    fn chain_transform(&self, id: LocalityId, stop: LocalityId,
                       time: Seconds) -> Result<Transform> {
        let mut path = Path::new();
        let mut cur = id;
        while cur != stop {
            path.push(cur);
            cur = self.hierarchy_superior(cur)?.ok_or_else(
                || HierarchyError::invalid(format!(
                    "{} is not below {}", id, stop)))?;
        }

        let mut acc = Transform::identity();
        for &step in path.iter().rev() {
            let local = self.local_transform_at(step, time)?;
            acc = if self.locality(step)?.kind.inherits_rotation() {
                acc * local
            } else {
                local.translated(acc.origin)
            };

            if !acc.is_finite() {
                return Err(HierarchyError::numerical(format!(
                    "chain from {} to {} became {} at {}",
                    stop, id, acc, step)));
            }
        }

        Ok(acc)
    }

    /// Returns the transform mapping points in the frame of `this` into the
    /// frame of `other`.
    pub fn relative_transform(&self, this: LocalityId, other: LocalityId)
                              -> Result<Transform> {
        self.relative_transform_at(this, other, self.clock.orbit_time())
    }

    /// `relative_transform()` with every orbit evaluated at orbit time
    /// `time` instead of now.
    pub fn relative_transform_at(&self, this: LocalityId, other: LocalityId,
                                 time: Seconds) -> Result<Transform> {
        self.validate(this)?;
        self.validate(other)?;
        if this == other {
            return Err(HierarchyError::invalid(format!(
                "transform of {} relative to itself", this)));
        }

        let lca = self.lowest_common_ancestor(this, other)?;
        let this_chain = self.chain_transform(this, lca, time)?;
        let other_chain = self.chain_transform(other, lca, time)?;
        let rel = (other_chain.try_inverse()? * this_chain).orthonormalized();
        if !rel.is_finite() {
            return Err(HierarchyError::numerical(format!(
                "transform of {} relative to {} is {}", this, other, rel)));
        }

        trace!("{} relative to {} via {}: {}", this, other, lca, rel);
        Ok(rel)
    }

    /// The transform of `id` relative to the root.
    pub fn absolute_transform(&self, id: LocalityId) -> Result<Transform> {
        self.absolute_transform_at(id, self.clock.orbit_time())
    }

    /// The transform of `id` relative to the root at orbit time `time`.
    pub fn absolute_transform_at(&self, id: LocalityId, time: Seconds)
                                 -> Result<Transform> {
        self.validate(id)?;
        if id == self.root {
            Ok(Transform::identity())
        } else {
            self.relative_transform_at(id, self.root, time)
        }
    }

    pub fn distance_to(&self, this: LocalityId, other: LocalityId)
                       -> Result<f64> {
        let rel = self.relative_transform(this, other)?;
        ensure_finite("distance", rel.origin.magnitude())
    }

    // ---------------------------------------------------------------------
    // Mutation

    /// Moves `id` under `new_superior`.
    ///
    /// Localities anchored through an entity move to whichever entity
    /// `new_superior` positions. The root and L1 points cannot be moved.
    pub fn replace_superior(&mut self, id: LocalityId,
                            new_superior: LocalityId) -> Result<()> {
        let new_entity = self.locality(new_superior)?.entity;
        match self.locality(id)?.kind {
            LocalityKind::Root => return Err(HierarchyError::invalid(
                "the root has no superior")),
            LocalityKind::Lagrange1(_) => return Err(HierarchyError::invalid(
                format!("L1 point {} cannot be reparented", id))),
            _ => (),
        }
        if self.is_within(new_superior, id)? {
            return Err(HierarchyError::invalid(format!(
                "moving {} under {} would create a cycle", id, new_superior)));
        }

        let old_superior = self.hierarchy_superior(id).ok().and_then(|s| s);
        let need_entity = || new_entity.ok_or_else(
            || HierarchyError::invalid(format!(
                "{} positions no entity to anchor {} to", new_superior, id)));

        match self.localities[id.index()].kind {
            LocalityKind::Fixed(ref mut f) => f.set_anchor(new_superior),
            LocalityKind::Kinematic(ref mut k) =>
                k.fixed_mut().set_anchor(new_superior),
            LocalityKind::Orbiting(ref mut o) =>
                o.orbit_mut().set_parent(need_entity()?),
            LocalityKind::Attached(ref mut a) => a.set_anchor(need_entity()?),
            LocalityKind::Root | LocalityKind::Lagrange1(_) =>
                return Err(HierarchyError::invalid(format!(
                    "{} cannot be reparented", id))),
        }

        if let Some(old) = old_superior {
            self.deregister(old, id);
        }
        self.register_hierarchy_subordinate(new_superior, id)?;
        self.forget_ephemerides();
        debug!("Moved {} from {:?} to {}", id, old_superior, new_superior);
        Ok(())
    }

    /// Puts `replacement` in the place of `old`, then deletes `old`.
    ///
    /// The name, the positioned entity and all subordinates of `old` pass to
    /// `replacement`. `replacement` stays under its own superior.
    pub fn replace(&mut self, old: LocalityId, replacement: LocalityId)
                   -> Result<()> {
        self.validate(old)?;
        self.validate(replacement)?;
        if old == self.root {
            return Err(HierarchyError::invalid("the root cannot be replaced"));
        }
        if old == replacement {
            return Err(HierarchyError::invalid(format!(
                "{} cannot replace itself", old)));
        }
        if self.is_within(replacement, old)? {
            return Err(HierarchyError::invalid(format!(
                "{} cannot replace its own ancestor {}", replacement, old)));
        }

        let entity = self.localities[old.index()].entity;
        if let Some(entity) = entity {
            if let Some(existing) = self.localities[replacement.index()].entity {
                return Err(HierarchyError::invalid(format!(
                    "{} cannot take over {} while positioning {}",
                    replacement, entity, existing)));
            }
            if self.depends_on_entity(
                &self.localities[replacement.index()].kind, entity)
            {
                return Err(HierarchyError::invalid(format!(
                    "{} cannot position {}, which it is derived from",
                    replacement, entity)));
            }
        }

        if let Some(name) = self.localities[old.index()].name.take() {
            self.unindex_name(old, &name);
            self.set_name(replacement, name)?;
        }

        if let Some(entity) = self.localities[old.index()].entity.take() {
            self.entities[entity.index()].locality = Some(replacement);
            let node = &mut self.localities[replacement.index()];
            node.entity = Some(entity);
            if let LocalityKind::Orbiting(ref mut o) = node.kind {
                o.orbit_mut().set_orbiter(entity);
            }
        }

        let subordinates = mem::replace(
            &mut self.localities[old.index()].subordinates, SmallVec::new());
        for &sub in &subordinates {
            if let Some(f) = self.localities[sub.index()].kind.fixed_mut() {
                if f.anchor() == old {
                    f.set_anchor(replacement);
                }
            }

            let subs = &mut self.localities[replacement.index()].subordinates;
            if !subs.contains(&sub) {
                subs.push(sub);
            }
        }
        self.invalidate_depth(replacement);

        debug!("Replacing {} with {}, which takes {} subordinate(s)",
               old, replacement, subordinates.len());
        self.delete(old)
    }

    /// Deletes `id`, which becomes obsolete.
    ///
    /// Subordinates should have been moved elsewhere first; any that remain
    /// are left dangling.
    pub fn delete(&mut self, id: LocalityId) -> Result<()> {
        self.validate(id)?;
        if id == self.root {
            return Err(HierarchyError::invalid("the root cannot be deleted"));
        }

        if let Some(superior) = self.hierarchy_superior(id).ok()
            .and_then(|s| s)
        {
            self.deregister(superior, id);
        }

        let orphans = mem::replace(
            &mut self.localities[id.index()].subordinates, SmallVec::new());
        if !orphans.is_empty() {
            warn!("Deleting {} orphans {} subordinate(s): {:?}",
                  id, orphans.len(), &orphans[..]);
        }
        for &orphan in &orphans {
            self.invalidate_depth(orphan);
        }

        if let Some(entity) = self.localities[id.index()].entity.take() {
            self.entities[entity.index()].locality = None;
        }
        if let Some(name) = self.localities[id.index()].name.take() {
            self.unindex_name(id, &name);
        }

        {
            let node = &mut self.localities[id.index()];
            node.flags.insert(LocalityFlags::OBSOLETE);
            node.depth.set(UNKNOWN_DEPTH);
        }

        self.forget_ephemerides();
        debug!("Deleted {}", id);
        Ok(())
    }

    /// Replaces the `Fixed` or `Kinematic` locality `id` with a new one
    /// under `new_anchor`, returning the new locality.
    ///
    /// `id` is deleted; its name, entity and subordinates pass to the new
    /// locality. With `MaintainAbsoluteTransform`, the new locality's
    /// absolute pose is checked against the old one and the operation is
    /// abandoned if they differ.
    pub fn reanchored(&mut self, id: LocalityId, new_anchor: LocalityId,
                      method: ReanchorMethod) -> Result<LocalityId> {
        self.validate(new_anchor)?;
        let (current, velocity) = match self.locality(id)?.kind {
            LocalityKind::Fixed(ref f) => (f.transform(), None),
            LocalityKind::Kinematic(ref k) =>
                (k.fixed().transform(), Some(k.velocity())),
            ref other => return Err(HierarchyError::unsupported(format!(
                "reanchoring {} locality {}", other.variant_name(), id))),
        };
        if self.is_within(new_anchor, id)? {
            return Err(HierarchyError::invalid(format!(
                "{} cannot be anchored to its own descendant {}",
                id, new_anchor)));
        }

        let (local, original) = match method {
            ReanchorMethod::MaintainAbsoluteTransform => {
                let original = self.absolute_transform(id)?;
                let anchor = self.absolute_transform(new_anchor)?;
                ((anchor.try_inverse()? * original).orthonormalized(),
                 Some(original))
            },
            ReanchorMethod::MaintainLocalTransform => (current, None),
            ReanchorMethod::UseNewTransform(t) => (t, None),
        };

        let kind = match velocity {
            Some(v) => LocalityKind::Kinematic(
                Kinematic::new(new_anchor, local, v)?),
            None => LocalityKind::Fixed(Fixed::new(new_anchor, local)?),
        };
        let fresh = self.insert(kind, None)?;

        if let Some(original) = original {
            if let Err(err) = self.check_same_pose(id, fresh, &original) {
                self.delete(fresh)?;
                return Err(err);
            }
        }

        self.replace(id, fresh)?;
        debug!("Reanchored {} under {} as {}", id, new_anchor, fresh);
        Ok(fresh)
    }

    fn check_same_pose(&self, old: LocalityId, fresh: LocalityId,
                       original: &Transform) -> Result<()> {
        let moved = self.absolute_transform(fresh)?;
        let fuzz = REANCHOR_TOLERANCE * original.origin.magnitude().max(1.0);
        let zero = Vector3::zero();
        let same_basis = Transform::new(moved.basis, zero).approx_eq(
            &Transform::new(original.basis, zero), REANCHOR_TOLERANCE);

        if same_basis && (moved.origin - original.origin).magnitude() <= fuzz {
            Ok(())
        } else {
            Err(HierarchyError::numerical(format!(
                "reanchoring {} as {} moved it from {} to {}",
                old, fresh, original, moved)))
        }
    }

    /// The stored local transform of a `Fixed`, `Kinematic` or `Attached`
    /// locality.
    pub fn transform(&self, id: LocalityId) -> Result<Transform> {
        match self.locality(id)?.kind {
            LocalityKind::Fixed(ref f) => Ok(f.transform()),
            LocalityKind::Kinematic(ref k) => Ok(k.fixed().transform()),
            LocalityKind::Attached(ref a) => Ok(a.transform()),
            ref other => Err(HierarchyError::unsupported(format!(
                "{} locality {} has no stored transform",
                other.variant_name(), id))),
        }
    }

    pub fn set_transform(&mut self, id: LocalityId, transform: Transform)
                         -> Result<()> {
        match self.locality_mut(id)?.kind {
            LocalityKind::Fixed(ref mut f) => f.set_transform(transform)?,
            LocalityKind::Kinematic(ref mut k) =>
                k.fixed_mut().set_transform(transform)?,
            LocalityKind::Attached(ref mut a) => a.set_transform(transform)?,
            ref other => return Err(HierarchyError::unsupported(format!(
                "setting the transform of {} locality {}",
                other.variant_name(), id))),
        }

        self.forget_ephemerides();
        Ok(())
    }

    /// Moves `id` by `offset` in its superior's frame.
    pub fn translate(&mut self, id: LocalityId, offset: Position)
                     -> Result<()> {
        match self.locality_mut(id)?.kind {
            LocalityKind::Fixed(ref mut f) => f.translate(offset)?,
            LocalityKind::Kinematic(ref mut k) =>
                k.fixed_mut().translate(offset)?,
            LocalityKind::Attached(ref mut a) => a.translate(offset)?,
            ref other => return Err(HierarchyError::unsupported(format!(
                "translating {} locality {}", other.variant_name(), id))),
        }

        self.forget_ephemerides();
        Ok(())
    }

    pub fn velocity(&self, id: LocalityId) -> Result<Velocity> {
        match self.locality(id)?.kind {
            LocalityKind::Kinematic(ref k) => Ok(k.velocity()),
            ref other => Err(HierarchyError::unsupported(format!(
                "{} locality {} has no velocity",
                other.variant_name(), id))),
        }
    }

    pub fn set_velocity(&mut self, id: LocalityId, velocity: Velocity)
                        -> Result<()> {
        match self.locality_mut(id)?.kind {
            LocalityKind::Kinematic(ref mut k) => k.set_velocity(velocity),
            ref other => Err(HierarchyError::unsupported(format!(
                "setting the velocity of {} locality {}",
                other.variant_name(), id))),
        }
    }

    /// Integrates one tick of the `Kinematic` locality `id`. Returns whether
    /// it moved.
    pub fn update_kinematic(&mut self, id: LocalityId, dt: Seconds)
                            -> Result<bool> {
        let moved = match self.locality_mut(id)?.kind {
            LocalityKind::Kinematic(ref mut k) => k.update(dt)?,
            ref other => return Err(HierarchyError::unsupported(format!(
                "updating {} locality {}", other.variant_name(), id))),
        };

        if moved {
            self.forget_ephemerides();
        }
        Ok(moved)
    }

    /// Advances the clock by `dt` and updates every kinematic locality
    /// once.
    pub fn advance(&mut self, dt: Seconds) -> Result<()> {
        self.clock.advance(dt)?;

        let kinematic: Vec<LocalityId> = self.localities.iter().enumerate()
            .filter(|&(_, loc)| !loc.is_obsolete() && match loc.kind {
                LocalityKind::Kinematic(_) => true,
                _ => false,
            })
            .map(|(ix, _)| LocalityId::from_index(ix))
            .collect();
        for &id in &kinematic {
            self.update_kinematic(id, dt)?;
        }

        self.forget_ephemerides();
        trace!("Advanced to t={} ({} kinematic)",
               self.clock.time(), kinematic.len());
        Ok(())
    }

    /// Orbit memos are keyed only on time, so anything that could move a
    /// body or change a mass drops them.
    fn forget_ephemerides(&self) {
        for loc in &self.localities {
            if let LocalityKind::Orbiting(ref o) = loc.kind {
                o.orbit().forget();
            }
        }
    }

    // ---------------------------------------------------------------------
    // Prediction

    /// Samples the orbit of `id` at `legs` evenly spaced times, starting
    /// now and spanning `duration` (or one period), and creates a `Fixed`
    /// waypoint under `parent` at each sampled pose. Each pose is taken
    /// relative to where `parent` will be at that sample's time.
    ///
    /// The waypoints are flagged `PREDICTED`. Either all of them are created
    /// or none are.
    pub fn predicted_itinerary(&mut self, id: LocalityId, legs: usize,
                               parent: LocalityId, duration: Option<Seconds>)
                               -> Result<Vec<LocalityId>> {
        self.validate(parent)?;
        let orbiting = match self.locality(id)?.kind {
            LocalityKind::Orbiting(ref o) => o.clone(),
            ref other => return Err(HierarchyError::unsupported(format!(
                "predicting the itinerary of {} locality {}",
                other.variant_name(), id))),
        };

        let now = self.clock.orbit_time();
        let times = orbiting.itinerary_times(self, legs, now, duration)?;

        let mut poses = Vec::with_capacity(times.len());
        for &time in &times {
            let eph = orbiting.orbit().kinematics(self, time, Frame::Absolute)?;
            let to_parent = self.absolute_transform_at(parent, time)?
                .try_inverse()?;
            let pose = (to_parent * eph.transform()).orthonormalized();
            pose.validate("itinerary waypoint")?;
            poses.push(pose);
        }

        let mut waypoints = Vec::with_capacity(poses.len());
        for pose in poses {
            let waypoint = self.insert(
                LocalityKind::Fixed(Fixed::new(parent, pose)?), None)?;
            self.localities[waypoint.index()].flags
                .insert(LocalityFlags::PREDICTED);
            waypoints.push(waypoint);
        }

        debug!("Predicted {} waypoint(s) of {} under {}",
               waypoints.len(), id, parent);
        Ok(waypoints)
    }
}

impl Bodies for Hierarchy {
    fn collective_mass(&self, entity: EntityId) -> Result<Mass> {
        let mut total = 0.0;
        let mut stack: SmallVec<[EntityId; 8]> = SmallVec::new();
        let mut seen = BitSet::new();
        stack.push(entity);

        while let Some(e) = stack.pop() {
            if !seen.insert(e.index()) {
                continue;
            }

            let body = self.entity(e)?;
            total += body.mass();
            let loc = match body.locality {
                Some(loc) => loc,
                None => continue,
            };

            for &sub in self.hierarchy_subordinates(loc)? {
                let sub = &self.localities[sub.index()];
                if let LocalityKind::Attached(ref a) = sub.kind {
                    if a.anchor() == e {
                        stack.extend(sub.entity);
                    }
                }
            }
        }

        ensure_finite("collective mass", total)
    }

    fn position_at_time(&self, entity: EntityId, time: Seconds)
                        -> Result<Position> {
        let loc = self.placement(entity)?;
        // Reject superior cycles before recursing up the orbit chain.
        self.hierarchy_depth(loc)?;

        match self.locality(loc)?.kind {
            LocalityKind::Orbiting(ref o) =>
                Ok(o.orbit().absolute_kinematics(self, time)?.position),
            _ => Ok(self.absolute_transform_at(loc, time)?.origin),
        }
    }
}
