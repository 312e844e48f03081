//! Contacts and the fixed-capacity pool that recycles them.
//!
//! A [`Contact`] is a plain value; the pool exists to bound how many can be
//! live in one sub-step and to keep their storage allocated across frames.
//! At any instant every slot is either free or active:
//!
//! ```text
//! acquire ──► (fill) ──► commit ──► active ──► drain_active ──► free
//!                   └──► release ─────────────────────────────► free
//! ```

use log::debug;

use crate::body::BodyId;
use crate::types::Vec3;

/// Default number of contacts a detector can hold in one sub-step.
pub const DEFAULT_CONTACT_CAPACITY: usize = 2048;

/// Which pair of geometries produced a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContactKind {
    /// Sphere against an infinite plane (wall or bed).
    SpherePlane,
    SphereSphere,
    /// Sphere crossing a bounded plane.
    SpherePocket,
}

/// A detected overlap, valid for a single sub-step.
///
/// For sphere–plane and sphere–pocket contacts `body_a` is always the sphere.
/// The normal points from `body_b` toward `body_a`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    pub position: Vec3,
    pub normal: Vec3,
    /// Fraction of the sub-step at which the contact begins, in `[0, 1]`.
    /// Contacts are resolved in ascending order of this key.
    pub time: f64,
    pub body_a: BodyId,
    pub body_b: BodyId,
    pub kind: ContactKind,
}

impl Default for Contact {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            normal: Vec3::ZERO,
            time: 0.0,
            body_a: BodyId::default(),
            body_b: BodyId::default(),
            kind: ContactKind::SpherePlane,
        }
    }
}

/// Pre-sized storage split into free and active contacts.
#[derive(Debug, Clone)]
pub struct ContactPool {
    free: Vec<Contact>,
    active: Vec<Contact>,
}

impl Default for ContactPool {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CONTACT_CAPACITY)
    }
}

impl ContactPool {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            free: vec![Contact::default(); capacity],
            active: Vec::with_capacity(capacity),
        }
    }

    /// Grow the free set to hold at least `capacity` contacts. Does nothing
    /// when it already does.
    pub fn set_capacity(&mut self, capacity: usize) {
        if self.free.len() >= capacity {
            return;
        }
        let missing = capacity - self.free.len();
        debug!("growing contact pool by {} to {}", missing, capacity);
        self.free.resize(capacity, Contact::default());
        let total = self.free.len() + self.active.len();
        self.active.reserve(total.saturating_sub(self.active.len()));
    }

    /// Total contacts owned by the pool.
    pub fn capacity(&self) -> usize {
        self.free.len() + self.active.len()
    }

    pub fn free_len(&self) -> usize {
        self.free.len()
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn active(&self) -> &[Contact] {
        &self.active
    }

    /// Take a contact from the free set.
    ///
    /// # Panics
    /// When the free set is empty. Capacity must be sized for the largest
    /// number of simultaneous contacts the world can produce.
    pub fn acquire(&mut self) -> Contact {
        match self.free.pop() {
            Some(contact) => contact,
            None => panic!(
                "contact pool exhausted ({} active); raise contact_capacity",
                self.active.len()
            ),
        }
    }

    /// Move a filled contact into the active set.
    pub fn commit(&mut self, contact: Contact) {
        self.active.push(contact);
    }

    /// Return an unused contact to the free set.
    pub fn release(&mut self, contact: Contact) {
        self.free.push(contact);
    }

    /// Stable sort of the active set by ascending `time`.
    pub fn sort_active(&mut self) {
        self.active.sort_by(|a, b| a.time.total_cmp(&b.time));
    }

    /// Return every active contact to the free set.
    pub fn drain_active(&mut self) {
        self.free.append(&mut self.active);
    }

    #[cfg(test)]
    pub(crate) fn allocated(&self) -> (usize, usize) {
        (self.free.capacity(), self.active.capacity())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn contact_at(time: f64) -> Contact {
        Contact {
            time,
            ..Contact::default()
        }
    }

    #[test]
    fn test_acquire_commit_drain() {
        let mut pool = ContactPool::with_capacity(4);
        let c = pool.acquire();
        pool.commit(c);
        let c = pool.acquire();
        pool.release(c);

        assert_eq!(pool.free_len(), 3);
        assert_eq!(pool.active_len(), 1);

        pool.drain_active();
        assert_eq!(pool.free_len(), 4);
        assert_eq!(pool.active_len(), 0);
        assert_eq!(pool.capacity(), 4);
    }

    #[test]
    #[should_panic(expected = "contact pool exhausted")]
    fn test_exhaustion_is_fatal() {
        let mut pool = ContactPool::with_capacity(1);
        let c = pool.acquire();
        pool.commit(c);
        pool.acquire();
    }

    #[test]
    fn test_drain_with_no_active_is_noop() {
        let mut pool = ContactPool::with_capacity(8);
        let before = pool.allocated();
        pool.drain_active();
        assert_eq!(pool.free_len(), 8);
        assert_eq!(pool.allocated(), before);
    }

    #[test]
    fn test_set_capacity_when_large_enough_allocates_nothing() {
        let mut pool = ContactPool::with_capacity(16);
        let before = pool.allocated();
        pool.set_capacity(16);
        pool.set_capacity(4);
        assert_eq!(pool.allocated(), before);
        assert_eq!(pool.free_len(), 16);
    }

    #[test]
    fn test_set_capacity_grows() {
        let mut pool = ContactPool::with_capacity(2);
        pool.set_capacity(10);
        assert_eq!(pool.free_len(), 10);
        assert_eq!(pool.capacity(), 10);
    }

    #[test]
    fn test_sort_orders_by_time() {
        let mut pool = ContactPool::with_capacity(8);
        for t in [0.1, 0.05, 0.9] {
            let mut c = pool.acquire();
            c.time = t;
            pool.commit(c);
        }
        pool.sort_active();
        let times: Vec<f64> = pool.active().iter().map(|c| c.time).collect();
        assert_eq!(times, vec![0.05, 0.1, 0.9]);
    }

    #[test]
    fn test_sort_is_stable_for_equal_keys() {
        let mut pool = ContactPool::with_capacity(8);
        for (i, t) in [0.0, 0.5, 0.0].into_iter().enumerate() {
            let mut c = contact_at(t);
            c.position = Vec3::new(i as f64, 0.0, 0.0);
            pool.acquire();
            pool.commit(c);
        }
        pool.sort_active();
        let xs: Vec<f64> = pool.active().iter().map(|c| c.position.x).collect();
        assert_eq!(xs, vec![0.0, 2.0, 1.0]);
    }
}
