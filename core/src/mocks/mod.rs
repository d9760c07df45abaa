//! In-memory implementations of the store traits for testing.
//!
//! These mirror the atomicity of the production stores with a single mutex
//! per store, evaluate TTLs against an injectable [`Clock`], and can be
//! switched "unavailable" to exercise error propagation.
//!
//! [`Clock`]: crate::environment::Clock

pub mod clock;
pub mod key_value;
pub mod sequence;

pub use clock::{ManualClock, test_start};
pub use key_value::InMemoryKeyValueStore;
pub use sequence::InMemorySequenceStore;
