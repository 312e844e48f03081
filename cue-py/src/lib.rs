//! Python bindings for the cue-core physics engine.
//!
//! Provides a simple Python API:
//!
//! ```python
//! from cue_physics import World, Vec3
//!
//! world = World()
//! world.add_plane(0.0, 0.0, 1.0, 0.0)
//! ball = world.add_sphere(0.028575)
//! world.set_position(ball, 0.0, 0.0, 0.028575)
//! world.set_velocity(ball, 2.0, 0.0, 0.0)
//!
//! while not world.at_rest():
//!     world.update(1 / 60, 2)
//!     for event in world.poll_events():
//!         print(event["kind"], event.get("a"))
//! ```
//!
//! Body and spring ids cross the boundary as opaque integers.

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyDict;
use slotmap::{Key, KeyData};

use cue_core::{
    Anchor, BodyFlag, BodyId, BodyScalar, BodyVector, ConfigLoader, EventLog, PhysicsEvent,
    PhysicsWorld, Plane, SpringId, SpringParams, Triangle, Vec3 as CoreVec3, WorldConfig,
};

/// 3D vector for positions, velocities, etc.
#[pyclass]
#[derive(Clone, Copy)]
pub struct Vec3 {
    #[pyo3(get, set)]
    pub x: f64,
    #[pyo3(get, set)]
    pub y: f64,
    #[pyo3(get, set)]
    pub z: f64,
}

#[pymethods]
impl Vec3 {
    #[new]
    fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    fn __repr__(&self) -> String {
        format!("Vec3({:.4}, {:.4}, {:.4})", self.x, self.y, self.z)
    }

    fn magnitude(&self) -> f64 {
        CoreVec3::from(*self).magnitude()
    }

    fn to_tuple(&self) -> (f64, f64, f64) {
        (self.x, self.y, self.z)
    }
}

impl From<CoreVec3> for Vec3 {
    fn from(v: CoreVec3) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }
}

impl From<Vec3> for CoreVec3 {
    fn from(v: Vec3) -> Self {
        CoreVec3::new(v.x, v.y, v.z)
    }
}

fn body_id(raw: u64) -> BodyId {
    BodyId::from(KeyData::from_ffi(raw))
}

fn spring_id(raw: u64) -> SpringId {
    SpringId::from(KeyData::from_ffi(raw))
}

fn raw<K: Key>(key: K) -> u64 {
    key.data().as_ffi()
}

fn parse_flag(name: &str) -> PyResult<BodyFlag> {
    match name {
        "active" => Ok(BodyFlag::Active),
        "use_gravity" => Ok(BodyFlag::UseGravity),
        "collidable" => Ok(BodyFlag::Collidable),
        "spinnable" => Ok(BodyFlag::Spinnable),
        "translatable" => Ok(BodyFlag::Translatable),
        other => Err(PyValueError::new_err(format!("unknown body flag: {}", other))),
    }
}

/// Physics world with an internal event log.
///
/// Events raised while stepping are buffered until `poll_events`.
#[pyclass]
pub struct World {
    inner: PhysicsWorld<EventLog>,
}

#[pymethods]
impl World {
    /// Create a world from an optional YAML configuration string.
    #[new]
    #[pyo3(signature = (config_yaml=None))]
    fn new(config_yaml: Option<&str>) -> PyResult<Self> {
        let config = match config_yaml {
            Some(text) => {
                WorldConfig::from_yaml_str(text).map_err(|e| PyValueError::new_err(e.to_string()))?
            }
            None => WorldConfig::default(),
        };
        Ok(Self {
            inner: PhysicsWorld::with_sink(config, EventLog::new()),
        })
    }

    /// Create a world from a named preset under `<base_path>/worlds/`.
    #[staticmethod]
    fn from_preset(base_path: &str, name: &str) -> PyResult<Self> {
        let config = ConfigLoader::new(base_path)
            .load_world(name)
            .map_err(|e| PyValueError::new_err(e.to_string()))?;
        Ok(Self {
            inner: PhysicsWorld::with_sink(config, EventLog::new()),
        })
    }

    /// Names of the presets available under `<base_path>/worlds/`.
    #[staticmethod]
    fn list_presets(base_path: &str) -> PyResult<Vec<String>> {
        ConfigLoader::new(base_path)
            .list_worlds()
            .map_err(|e| PyValueError::new_err(e.to_string()))
    }

    fn add_sphere(&mut self, radius: f64) -> u64 {
        raw(self.inner.add_sphere(radius))
    }

    /// Add a wall `nx*x + ny*y + nz*z + offset = 0`.
    fn add_plane(&mut self, nx: f64, ny: f64, nz: f64, offset: f64) -> u64 {
        raw(self.inner.add_plane(Plane::new(CoreVec3::new(nx, ny, nz), offset)))
    }

    /// Add a pocket opening bounded by a triangle.
    fn add_pocket(&mut self, a: Vec3, b: Vec3, c: Vec3) -> u64 {
        raw(self
            .inner
            .add_bounded_plane(Triangle::new(a.into(), b.into(), c.into())))
    }

    fn remove(&mut self, id: u64) -> bool {
        self.inner.remove_body(body_id(id))
    }

    fn remove_all(&mut self) {
        self.inner.remove_all();
    }

    fn contains(&self, id: u64) -> bool {
        self.inner.contains(body_id(id))
    }

    fn body_count(&self) -> usize {
        self.inner.body_count()
    }

    fn position(&self, id: u64) -> Vec3 {
        self.inner.body(body_id(id)).map_or(CoreVec3::ZERO, |b| b.position()).into()
    }

    fn set_position(&mut self, id: u64, x: f64, y: f64, z: f64) {
        self.inner
            .set_vector(body_id(id), BodyVector::Position, CoreVec3::new(x, y, z));
    }

    fn velocity(&self, id: u64) -> Vec3 {
        self.inner.get_vector(body_id(id), BodyVector::Velocity).into()
    }

    fn set_velocity(&mut self, id: u64, vx: f64, vy: f64, vz: f64) {
        self.inner.set_vector(
            body_id(id),
            BodyVector::Velocity,
            CoreVec3::new(vx, vy, vz),
        );
    }

    /// Spin in rad/s.
    fn angular_velocity(&self, id: u64) -> Vec3 {
        self.inner
            .get_vector(body_id(id), BodyVector::AngularVelocity)
            .into()
    }

    fn set_angular_velocity(&mut self, id: u64, wx: f64, wy: f64, wz: f64) {
        self.inner.set_vector(
            body_id(id),
            BodyVector::AngularVelocity,
            CoreVec3::new(wx, wy, wz),
        );
    }

    fn mass(&self, id: u64) -> f64 {
        self.inner.get_scalar(body_id(id), BodyScalar::Mass)
    }

    fn set_mass(&mut self, id: u64, mass: f64) {
        self.inner.set_scalar(body_id(id), BodyScalar::Mass, mass);
    }

    /// Read a flag: active, use_gravity, collidable, spinnable, translatable.
    fn flag(&self, id: u64, name: &str) -> PyResult<bool> {
        Ok(self.inner.get_flag(body_id(id), parse_flag(name)?))
    }

    fn set_flag(&mut self, id: u64, name: &str, value: bool) -> PyResult<()> {
        self.inner.set_flag(body_id(id), parse_flag(name)?, value);
        Ok(())
    }

    /// Instantly change a body's velocity; wakes the world.
    fn apply_impulse(&mut self, id: u64, x: f64, y: f64, z: f64) {
        self.inner.apply_impulse(body_id(id), CoreVec3::new(x, y, z));
    }

    /// Connect two body centers with a spring. Returns None if either id is
    /// unknown or both are the same body.
    #[pyo3(signature = (a, b, stiffness, rest_length, damping=0.0, compressible=false))]
    fn add_spring(
        &mut self,
        a: u64,
        b: u64,
        stiffness: f64,
        rest_length: f64,
        damping: f64,
        compressible: bool,
    ) -> Option<u64> {
        let params = SpringParams {
            stiffness,
            damping,
            rest_length,
            anchor_a: Anchor::Center,
            anchor_b: Anchor::Center,
            compressible,
        };
        self.inner
            .add_spring(body_id(a), body_id(b), params)
            .map(raw)
    }

    fn remove_spring(&mut self, id: u64) -> bool {
        self.inner.remove_spring(spring_id(id))
    }

    /// Advance one frame. `tracked` defaults to every dynamic sphere.
    #[pyo3(signature = (dt, steps=1, tracked=None))]
    fn update(&mut self, dt: f64, steps: u32, tracked: Option<Vec<u64>>) {
        let tracked: Vec<BodyId> = match tracked {
            Some(ids) => ids.into_iter().map(body_id).collect(),
            None => self.inner.dynamic_body_ids(),
        };
        self.inner.update(dt, steps, &tracked);
    }

    fn simulate(&mut self, dt: f64) {
        self.inner.simulate(dt);
    }

    fn at_rest(&self) -> bool {
        self.inner.at_rest()
    }

    fn disturb(&mut self) {
        self.inner.disturb();
    }

    /// (substeps, contacts_detected, contacts_resolved, sleeping_bodies) for
    /// the last `update`.
    fn stats(&self) -> (u32, u32, u32, u32) {
        let s = self.inner.stats();
        (
            s.substeps,
            s.contacts_detected,
            s.contacts_resolved,
            s.sleeping_bodies,
        )
    }

    /// Drain buffered events as dicts with a `kind` key.
    fn poll_events(&mut self, py: Python<'_>) -> PyResult<Vec<PyObject>> {
        let events = self.inner.sink_mut().drain();
        let mut out = Vec::with_capacity(events.len());
        for event in events {
            let dict = PyDict::new_bound(py);
            dict.set_item("code", event.kind().code())?;
            match event {
                PhysicsEvent::SphereVsPlane {
                    sphere,
                    plane,
                    position,
                    normal,
                    speed,
                } => {
                    dict.set_item("kind", "sphere_vs_plane")?;
                    dict.set_item("a", raw(sphere))?;
                    dict.set_item("b", raw(plane))?;
                    dict.set_item("position", Vec3::from(position).to_tuple())?;
                    dict.set_item("normal", Vec3::from(normal).to_tuple())?;
                    dict.set_item("speed", speed)?;
                }
                PhysicsEvent::SphereVsSphere {
                    a,
                    b,
                    position,
                    normal,
                    speed,
                } => {
                    dict.set_item("kind", "sphere_vs_sphere")?;
                    dict.set_item("a", raw(a))?;
                    dict.set_item("b", raw(b))?;
                    dict.set_item("position", Vec3::from(position).to_tuple())?;
                    dict.set_item("normal", Vec3::from(normal).to_tuple())?;
                    dict.set_item("speed", speed)?;
                }
                PhysicsEvent::SphereVsPocket {
                    sphere,
                    pocket,
                    position,
                } => {
                    dict.set_item("kind", "sphere_vs_pocket")?;
                    dict.set_item("a", raw(sphere))?;
                    dict.set_item("b", raw(pocket))?;
                    dict.set_item("position", Vec3::from(position).to_tuple())?;
                }
                PhysicsEvent::WorldStatic => {
                    dict.set_item("kind", "world_static")?;
                }
            }
            out.push(dict.into_any().unbind());
        }
        Ok(out)
    }
}

/// Python module definition.
#[pymodule]
fn cue_physics(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<Vec3>()?;
    m.add_class::<World>()?;
    Ok(())
}
