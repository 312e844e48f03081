//! The simulation world: body and spring registries plus the stepping loop.
//!
//! ## Frame and sub-step
//!
//! The host calls [`PhysicsWorld::update`] once per frame with the bodies it
//! currently tracks. If any of them is moving, the frame is split into
//! `steps` calls to [`PhysicsWorld::simulate`], each of which is split again
//! so no slice exceeds `min_substep`. One slice runs, in order:
//!
//! ```text
//! 1. reset          t0 <- t1, damping / braking
//! 2. integrate1     drift under accumulated force
//! 3. springs        late forces
//! 4. integrate2     fold late forces + gravity, clamp
//! 5. detect         all collidable pairs, swept
//! 6. sort           contacts by time of impact (stable)
//! 7. resolve        impulses, events
//! 8. drain          contacts back to the pool
//! 9. drift          renormalize, roll back non-finite state
//! ```
//!
//! Removals requested by event handlers run after step 9.

use log::{debug, trace, warn};
use slotmap::SlotMap;

use crate::body::{Body, BodyId, MotionLimits};
use crate::collision::{CollisionDetector, CollisionResolver, Contact, ContactKind};
use crate::config::WorldConfig;
use crate::events::{CallbackRegistry, Commands, EventKind, EventSink, PhysicsEvent};
use crate::forces::{Spring, SpringId, SpringParams};
use crate::geometry::{Geometry, Plane, Triangle};
use crate::types::{Quat, Vec3};

/// Boolean body properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyFlag {
    Active,
    UseGravity,
    Collidable,
    Spinnable,
    Translatable,
}

/// Scalar body properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyScalar {
    AngularDamping,
    LinearDamping,
    Mass,
}

/// Vector body properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyVector {
    /// Half-size; a sphere's radius on every axis.
    Extent,
    Position,
    Velocity,
    AngularVelocity,
}

/// Upper bound on sub-steps run by a single `simulate` call.
pub const MAX_SUBSTEPS: u32 = 4096;

/// Counters for the most recent `update` call. Direct `simulate` calls add
/// to them until the next `update` resets them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepStats {
    pub substeps: u32,
    pub contacts_detected: u32,
    /// Contacts that produced an impulse.
    pub contacts_resolved: u32,
    /// Sum over sub-steps of bodies reported below the sleep threshold.
    pub sleeping_bodies: u32,
}

/// Owns every body and spring and drives the simulation.
pub struct PhysicsWorld<S: EventSink = CallbackRegistry> {
    config: WorldConfig,
    limits: MotionLimits,
    bodies: SlotMap<BodyId, Body>,
    springs: SlotMap<SpringId, Spring>,
    detector: CollisionDetector,
    resolver: CollisionResolver,
    sink: S,
    commands: Commands,
    at_rest: bool,
    stats: StepStats,
    /// Reused candidate list for pair testing.
    candidates: Vec<BodyId>,
}

impl PhysicsWorld<CallbackRegistry> {
    pub fn new(config: WorldConfig) -> Self {
        Self::with_sink(config, CallbackRegistry::new())
    }

    /// Install the handler for `kind`, replacing any previous one.
    pub fn register_callback<F>(&mut self, kind: EventKind, handler: F) -> bool
    where
        F: FnMut(&PhysicsEvent, &mut Commands) + 'static,
    {
        self.sink.register(kind, handler)
    }

    pub fn unregister_callback(&mut self, kind: EventKind) -> bool {
        self.sink.unregister(kind)
    }
}

impl Default for PhysicsWorld<CallbackRegistry> {
    fn default() -> Self {
        Self::new(WorldConfig::default())
    }
}

impl<S: EventSink> PhysicsWorld<S> {
    /// Values the config loader would reject are replaced with defaults.
    pub fn with_sink(config: WorldConfig, sink: S) -> Self {
        let config = config.sanitized();
        Self {
            limits: config.limits(),
            detector: CollisionDetector::with_capacity(config.contact_capacity),
            resolver: CollisionResolver::with_restitution(config.restitution()),
            config,
            bodies: SlotMap::with_key(),
            springs: SlotMap::with_key(),
            sink,
            commands: Commands::default(),
            at_rest: false,
            stats: StepStats::default(),
            candidates: Vec::new(),
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Replace the tuning. The contact pool only ever grows.
    pub fn set_config(&mut self, config: WorldConfig) {
        let config = config.sanitized();
        self.limits = config.limits();
        self.resolver = CollisionResolver::with_restitution(config.restitution());
        self.detector.set_capacity(config.contact_capacity);
        self.config = config;
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn stats(&self) -> StepStats {
        self.stats
    }

    pub fn detector(&self) -> &CollisionDetector {
        &self.detector
    }

    // =========================================================================
    // Registries
    // =========================================================================

    /// Add a dynamic sphere at the origin.
    pub fn add_sphere(&mut self, radius: f64) -> BodyId {
        let id = self.bodies.insert_with_key(|id| Body::sphere(id, radius));
        debug!("added sphere {:?} (r = {})", id, radius);
        id
    }

    /// Add an immobile infinite plane.
    pub fn add_plane(&mut self, plane: Plane) -> BodyId {
        let id = self.bodies.insert_with_key(|id| Body::plane(id, plane));
        debug!("added plane {:?}", id);
        id
    }

    /// Add an immobile pocket opening bounded by `triangle`.
    pub fn add_bounded_plane(&mut self, triangle: Triangle) -> BodyId {
        let id = self
            .bodies
            .insert_with_key(|id| Body::bounded_plane(id, triangle));
        debug!("added pocket {:?}", id);
        id
    }

    /// Remove a body and every spring attached to it.
    pub fn remove_body(&mut self, id: BodyId) -> bool {
        if !self.bodies.contains_key(id) {
            return false;
        }
        let before = self.springs.len();
        self.springs.retain(|_, spring| !spring.references(id));
        self.bodies.remove(id);
        debug!(
            "removed body {:?} and {} spring(s)",
            id,
            before - self.springs.len()
        );
        true
    }

    pub fn remove_all(&mut self) {
        debug!(
            "removing all {} bodies and {} springs",
            self.bodies.len(),
            self.springs.len()
        );
        self.springs.clear();
        self.bodies.clear();
    }

    pub fn body(&self, id: BodyId) -> Option<&Body> {
        self.bodies.get(id)
    }

    pub fn contains(&self, id: BodyId) -> bool {
        self.bodies.contains_key(id)
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn bodies(&self) -> impl Iterator<Item = &Body> {
        self.bodies.values()
    }

    /// Ids of spheres that can translate, in registry order.
    pub fn dynamic_body_ids(&self) -> Vec<BodyId> {
        self.bodies
            .iter()
            .filter(|(_, b)| b.translatable && b.geometry().radius().is_some())
            .map(|(id, _)| id)
            .collect()
    }

    /// Connect two distinct, existing bodies. The spring starts with its
    /// current length as the previous length.
    pub fn add_spring(&mut self, a: BodyId, b: BodyId, params: SpringParams) -> Option<SpringId> {
        if a == b {
            return None;
        }
        let (body_a, body_b) = (self.bodies.get(a)?, self.bodies.get(b)?);
        let length = (params.anchor_b.world_point(body_b) - params.anchor_a.world_point(body_a))
            .magnitude();
        let id = self.springs.insert(Spring::new(a, b, params, length));
        debug!("added spring {:?} between {:?} and {:?}", id, a, b);
        Some(id)
    }

    pub fn remove_spring(&mut self, id: SpringId) -> bool {
        let removed = self.springs.remove(id).is_some();
        if removed {
            debug!("removed spring {:?}", id);
        }
        removed
    }

    pub fn spring(&self, id: SpringId) -> Option<&Spring> {
        self.springs.get(id)
    }

    pub fn spring_count(&self) -> usize {
        self.springs.len()
    }

    // =========================================================================
    // Typed accessors (unknown ids read as zero and ignore writes)
    // =========================================================================

    pub fn get_flag(&self, id: BodyId, flag: BodyFlag) -> bool {
        let Some(body) = self.bodies.get(id) else {
            return false;
        };
        match flag {
            BodyFlag::Active => body.active,
            BodyFlag::UseGravity => body.gravity_affected,
            BodyFlag::Collidable => body.collidable,
            BodyFlag::Spinnable => body.spinnable,
            BodyFlag::Translatable => body.translatable,
        }
    }

    pub fn set_flag(&mut self, id: BodyId, flag: BodyFlag, value: bool) {
        let Some(body) = self.bodies.get_mut(id) else {
            return;
        };
        match flag {
            BodyFlag::Active => body.active = value,
            BodyFlag::UseGravity => body.gravity_affected = value,
            BodyFlag::Collidable => body.collidable = value,
            BodyFlag::Spinnable => body.spinnable = value,
            BodyFlag::Translatable => body.translatable = value,
        }
    }

    pub fn get_scalar(&self, id: BodyId, scalar: BodyScalar) -> f64 {
        let Some(body) = self.bodies.get(id) else {
            return 0.0;
        };
        match scalar {
            BodyScalar::AngularDamping => body.angular_damping,
            BodyScalar::LinearDamping => body.linear_damping,
            BodyScalar::Mass => body.mass(),
        }
    }

    pub fn set_scalar(&mut self, id: BodyId, scalar: BodyScalar, value: f64) {
        let Some(body) = self.bodies.get_mut(id) else {
            return;
        };
        match scalar {
            BodyScalar::AngularDamping => body.angular_damping = value,
            BodyScalar::LinearDamping => body.linear_damping = value,
            BodyScalar::Mass => body.set_mass(value),
        }
    }

    pub fn get_vector(&self, id: BodyId, vector: BodyVector) -> Vec3 {
        let Some(body) = self.bodies.get(id) else {
            return Vec3::ZERO;
        };
        match vector {
            BodyVector::Extent => body.geometry().extent(),
            BodyVector::Position => body.position(),
            BodyVector::Velocity => body.velocity(),
            BodyVector::AngularVelocity => body.state().angular_velocity,
        }
    }

    pub fn set_vector(&mut self, id: BodyId, vector: BodyVector, value: Vec3) {
        let Some(body) = self.bodies.get_mut(id) else {
            return;
        };
        match vector {
            BodyVector::Extent => body.set_extent(value),
            BodyVector::Position => body.set_position(value),
            BodyVector::Velocity => body.set_velocity(value),
            BodyVector::AngularVelocity => body.set_angular_velocity(value),
        }
    }

    pub fn get_orientation(&self, id: BodyId) -> Quat {
        self.bodies
            .get(id)
            .map_or(Quat::IDENTITY, |body| body.state().orientation)
    }

    pub fn set_orientation(&mut self, id: BodyId, orientation: Quat) {
        if let Some(body) = self.bodies.get_mut(id) {
            body.set_orientation(orientation);
        }
    }

    /// Accumulate a force for the next sub-step.
    pub fn apply_force(&mut self, id: BodyId, force: Vec3) {
        if let Some(body) = self.bodies.get_mut(id) {
            body.apply_force(force);
        }
    }

    pub fn apply_torque(&mut self, id: BodyId, torque: Vec3) {
        if let Some(body) = self.bodies.get_mut(id) {
            body.apply_torque(torque);
        }
    }

    /// Change a body's velocity instantly and wake the world.
    pub fn apply_impulse(&mut self, id: BodyId, impulse: Vec3) {
        if let Some(body) = self.bodies.get_mut(id) {
            body.apply_impulse(impulse);
            body.t0.velocity = body.t1.velocity;
            self.disturb();
        }
    }

    // =========================================================================
    // Stepping
    // =========================================================================

    pub fn at_rest(&self) -> bool {
        self.at_rest
    }

    /// Force the next `update` to simulate.
    pub fn disturb(&mut self) {
        if self.at_rest {
            debug!("world disturbed");
        }
        self.at_rest = false;
    }

    /// Advance one frame.
    ///
    /// # Arguments
    /// * `dt` - Frame duration in seconds
    /// * `steps` - Number of `simulate` calls to split the frame into; zero
    ///   applies drag and rest detection without advancing time
    /// * `tracked` - Bodies whose motion keeps the world awake; ids that no
    ///   longer exist are skipped
    pub fn update(&mut self, dt: f64, steps: u32, tracked: &[BodyId]) {
        self.stats = StepStats::default();
        if self.at_rest {
            return;
        }

        let drag = (self.config.drag_coefficient * dt).clamp(0.0, 1.0);
        let activation = self.config.drag_activation_speed;
        let mut is_static = true;

        for &id in tracked {
            let Some(body) = self.bodies.get_mut(id) else {
                continue;
            };
            let velocity = body.velocity();
            let speed = velocity.magnitude();
            if speed > activation {
                body.set_velocity(velocity - velocity * drag);
                is_static = false;
            } else if speed > 0.0 {
                body.set_velocity(Vec3::ZERO);
            }
        }

        self.at_rest = is_static;
        if is_static {
            debug!("world came to rest");
            self.sink.on_event(&PhysicsEvent::WorldStatic, &mut self.commands);
            self.apply_commands();
            return;
        }

        if steps == 0 {
            return;
        }
        let h = dt / f64::from(steps);
        for _ in 0..steps {
            self.simulate(h);
        }
    }

    /// Advance by `dt`, subdivided so no slice exceeds `min_substep`.
    ///
    /// At most [`MAX_SUBSTEPS`] slices run per call; beyond that the slices
    /// grow instead.
    pub fn simulate(&mut self, dt: f64) {
        if !dt.is_finite() || dt <= 0.0 {
            if dt != 0.0 {
                warn!("ignoring simulate with dt = {}", dt);
            }
            return;
        }
        let wanted = (dt / self.config.min_substep).ceil().max(1.0);
        let slices = if wanted > f64::from(MAX_SUBSTEPS) {
            warn!(
                "simulate({}) needs {} slices, capping at {}",
                dt, wanted, MAX_SUBSTEPS
            );
            MAX_SUBSTEPS
        } else {
            wanted as u32
        };
        let h = dt / f64::from(slices);
        for _ in 0..slices {
            self.substep(h);
        }
    }

    fn substep(&mut self, dt: f64) {
        self.stats.substeps += 1;
        let (detected, resolved) = (self.stats.contacts_detected, self.stats.contacts_resolved);

        // 1
        for body in self.bodies.values_mut().filter(|b| b.active) {
            if body.reset_for_next_step() {
                self.stats.sleeping_bodies += 1;
            }
        }

        // 2
        for body in self.bodies.values_mut().filter(|b| b.active) {
            body.integrate1(dt);
        }

        // 3
        for spring in self.springs.values_mut() {
            let (a, b) = spring.bodies();
            if let Some([body_a, body_b]) = self.bodies.get_disjoint_mut([a, b]) {
                if body_a.active || body_b.active {
                    spring.apply(body_a, body_b, dt);
                }
            }
        }

        // 4
        let gravity = self.config.gravity;
        for body in self.bodies.values_mut().filter(|b| b.active) {
            body.integrate2(dt, gravity, &self.limits);
        }

        // 5
        self.detect_contacts();

        // 6
        self.detector.sort_contacts();

        // 7
        for index in 0..self.detector.contacts().len() {
            let contact = self.detector.contacts()[index];
            self.resolve_contact(&contact);
        }

        // 8
        self.detector.end();

        // 9
        for body in self.bodies.values_mut().filter(|b| b.active) {
            body.correct_drift();
        }

        trace!(
            "substep dt={:.5}: {} contacts, {} resolved",
            dt,
            self.stats.contacts_detected - detected,
            self.stats.contacts_resolved - resolved
        );

        self.apply_commands();
    }

    fn detect_contacts(&mut self) {
        self.detector.begin();

        self.candidates.clear();
        self.candidates.extend(
            self.bodies
                .iter()
                .filter(|(_, b)| b.active && b.collidable)
                .map(|(id, _)| id),
        );

        for i in 0..self.candidates.len() {
            for j in (i + 1)..self.candidates.len() {
                let a = &self.bodies[self.candidates[i]];
                let b = &self.bodies[self.candidates[j]];
                if !a.moved() && !b.moved() {
                    continue;
                }
                if !swept_bounds_overlap(a, b) {
                    continue;
                }
                if self.detector.test_collision(a, b).is_some() {
                    self.stats.contacts_detected += 1;
                }
            }
        }
    }

    fn resolve_contact(&mut self, contact: &Contact) {
        let Some([a, b]) = self.bodies.get_disjoint_mut([contact.body_a, contact.body_b]) else {
            return;
        };

        let event = match (contact.kind, self.resolver.resolve(contact, a, b)) {
            (ContactKind::SpherePocket, _) => PhysicsEvent::SphereVsPocket {
                sphere: contact.body_a,
                pocket: contact.body_b,
                position: contact.position,
            },
            (_, None) => return,
            (ContactKind::SpherePlane, Some(speed)) => PhysicsEvent::SphereVsPlane {
                sphere: contact.body_a,
                plane: contact.body_b,
                position: contact.position,
                normal: contact.normal,
                speed,
            },
            (ContactKind::SphereSphere, Some(speed)) => PhysicsEvent::SphereVsSphere {
                a: contact.body_a,
                b: contact.body_b,
                position: contact.position,
                normal: contact.normal,
                speed,
            },
        };

        if event.kind() != EventKind::SphereVsPocket {
            self.stats.contacts_resolved += 1;
        }
        self.sink.on_event(&event, &mut self.commands);
    }

    fn apply_commands(&mut self) {
        if self.commands.is_empty() {
            return;
        }
        debug!(
            "applying deferred commands: {} bodies, {} springs",
            self.commands.bodies.len(),
            self.commands.springs.len()
        );

        let mut springs = std::mem::take(&mut self.commands.springs);
        for id in springs.drain(..) {
            self.remove_spring(id);
        }
        self.commands.springs = springs;

        let mut bodies = std::mem::take(&mut self.commands.bodies);
        for id in bodies.drain(..) {
            self.remove_body(id);
        }
        self.commands.bodies = bodies;

        if std::mem::take(&mut self.commands.disturb) {
            self.disturb();
        }
    }
}

/// Cheap reject for sphere pairs whose swept boxes are apart. Pairs with a
/// planar body always pass.
fn swept_bounds_overlap(a: &Body, b: &Body) -> bool {
    if !matches!(a.geometry(), Geometry::Sphere { .. })
        || !matches!(b.geometry(), Geometry::Sphere { .. })
    {
        return true;
    }
    match (a.swept_bounds(), b.swept_bounds()) {
        (Some((min_a, max_a)), Some((min_b, max_b))) => {
            min_a.x <= max_b.x
                && min_b.x <= max_a.x
                && min_a.y <= max_b.y
                && min_b.y <= max_a.y
                && min_a.z <= max_b.z
                && min_b.z <= max_a.z
        }
        _ => true,
    }
}

// =============================================================================
// Tests
// =============================================================================
