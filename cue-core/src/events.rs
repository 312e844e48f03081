//! Notifications raised while the world steps.
//!
//! The world owns an [`EventSink`] chosen at construction. Sinks receive each
//! event together with a [`Commands`] buffer; structural changes requested
//! there (removing a pocketed ball, waking the world) are applied only once
//! the current sub-step has finished iterating over bodies and contacts.

use std::fmt;

use crate::body::BodyId;
use crate::forces::SpringId;
use crate::types::Vec3;

/// Event categories, one callback slot each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum EventKind {
    SphereVsPlane = 0,
    SphereVsSphere = 1,
    SphereVsPocket = 2,
    WorldStatic = 3,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::SphereVsPlane,
        EventKind::SphereVsSphere,
        EventKind::SphereVsPocket,
        EventKind::WorldStatic,
    ];

    /// Stable numeric code, for hosts that address callbacks by number.
    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }
}

/// Something that happened during a step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PhysicsEvent {
    /// A ball bounced off a wall or the table bed.
    SphereVsPlane {
        sphere: BodyId,
        plane: BodyId,
        position: Vec3,
        normal: Vec3,
        /// Approach speed along the normal before the bounce.
        speed: f64,
    },
    /// Two balls struck each other. `normal` points from `b` toward `a`.
    SphereVsSphere {
        a: BodyId,
        b: BodyId,
        position: Vec3,
        normal: Vec3,
        speed: f64,
    },
    /// A ball crossed a pocket opening.
    SphereVsPocket {
        sphere: BodyId,
        pocket: BodyId,
        position: Vec3,
    },
    /// Every tracked body came to rest.
    WorldStatic,
}

impl PhysicsEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            PhysicsEvent::SphereVsPlane { .. } => EventKind::SphereVsPlane,
            PhysicsEvent::SphereVsSphere { .. } => EventKind::SphereVsSphere,
            PhysicsEvent::SphereVsPocket { .. } => EventKind::SphereVsPocket,
            PhysicsEvent::WorldStatic => EventKind::WorldStatic,
        }
    }
}

/// Deferred requests issued from event handlers.
#[derive(Debug, Default, Clone)]
pub struct Commands {
    pub(crate) bodies: Vec<BodyId>,
    pub(crate) springs: Vec<SpringId>,
    pub(crate) disturb: bool,
}

impl Commands {
    /// Remove a body (and its springs) after the current sub-step.
    pub fn remove_body(&mut self, id: BodyId) {
        if !self.bodies.contains(&id) {
            self.bodies.push(id);
        }
    }

    pub fn remove_spring(&mut self, id: SpringId) {
        if !self.springs.contains(&id) {
            self.springs.push(id);
        }
    }

    /// Mark the world as moving once the handler returns.
    pub fn disturb(&mut self) {
        self.disturb = true;
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty() && self.springs.is_empty() && !self.disturb
    }
}

/// Receiver of physics events.
pub trait EventSink {
    fn on_event(&mut self, event: &PhysicsEvent, commands: &mut Commands);
}

/// Discards every event.
impl EventSink for () {
    fn on_event(&mut self, _event: &PhysicsEvent, _commands: &mut Commands) {}
}

/// Boxed event handler stored in a [`CallbackRegistry`].
pub type Handler = Box<dyn FnMut(&PhysicsEvent, &mut Commands)>;

/// One optional handler per [`EventKind`].
#[derive(Default)]
pub struct CallbackRegistry {
    handlers: [Option<Handler>; 4],
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `handler` for `kind`. Returns `true` if it replaced one.
    pub fn register<F>(&mut self, kind: EventKind, handler: F) -> bool
    where
        F: FnMut(&PhysicsEvent, &mut Commands) + 'static,
    {
        self.handlers[kind as usize]
            .replace(Box::new(handler))
            .is_some()
    }

    pub fn unregister(&mut self, kind: EventKind) -> bool {
        self.handlers[kind as usize].take().is_some()
    }

    pub fn is_registered(&self, kind: EventKind) -> bool {
        self.handlers[kind as usize].is_some()
    }
}

impl fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registered: Vec<EventKind> = EventKind::ALL
            .into_iter()
            .filter(|kind| self.is_registered(*kind))
            .collect();
        f.debug_struct("CallbackRegistry")
            .field("registered", &registered)
            .finish()
    }
}

impl EventSink for CallbackRegistry {
    fn on_event(&mut self, event: &PhysicsEvent, commands: &mut Commands) {
        if let Some(handler) = self.handlers[event.kind() as usize].as_mut() {
            handler(event, commands);
        }
    }
}

/// Records events in arrival order for later polling.
#[derive(Debug, Default, Clone)]
pub struct EventLog {
    events: Vec<PhysicsEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[PhysicsEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|e| e.kind() == kind).count()
    }

    /// Take all recorded events, leaving the log empty.
    pub fn drain(&mut self) -> Vec<PhysicsEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for EventLog {
    fn on_event(&mut self, event: &PhysicsEvent, _commands: &mut Commands) {
        self.events.push(*event);
    }
}

// =============================================================================
// Tests
// =============================================================================
