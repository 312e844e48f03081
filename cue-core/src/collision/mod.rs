//! Collision detection and resolution.
//!
//! This module handles:
//! - **Contacts**: Plain contact records recycled through a fixed pool
//! - **Detection**: Finding when and where two bodies touch (swept tests)
//! - **Resolution**: Impulses, spin exchange and penetration correction
//!
//! ## Swept Tests
//!
//! Instead of checking whether two bodies overlap at the end of a sub-step
//! (which misses fast balls), each test sweeps the ball from its start state
//! to its end state and reports the fraction of the step at which contact
//! begins.
//!
//! ```text
//! u = 0            u = 1
//!    ●────────────────●
//!    start           end
//!         \    ↓
//!          \   wall
//! ══════════╳═══════════
//!           └─ contact, time = u
//! ```
//!
//! Contacts are then resolved in ascending `time` so earlier impacts are
//! handled before later ones.

pub mod contact;
pub mod detection;
pub mod resolution;

pub use contact::*;
pub use detection::*;
pub use resolution::*;
