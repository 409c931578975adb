//! agekit: associative containers with a temporal index.
//!
//! Every stored entry carries a `when` timestamp taken from an injected
//! [`Clock`](clock::Clock) and is threaded onto a temporal list alongside
//! the associative index. Walking the [`chronological`] view from the oldest
//! end and touching entries on access is all it takes to build LRU,
//! time-bounded, or quota-bounded caches; the eviction policy stays in
//! client code.
//!
//! Eight container types cover the ordered/unordered, unique/multi, and
//! set/map axes. See [`ordered`] and [`unordered`] for the container
//! internals and `DESIGN.md` for the architecture notes.
//!
//! # Example
//!
//! ```
//! use agekit::clock::ManualClock;
//! use agekit::ordered::AgedOrderedMap;
//!
//! let clock = ManualClock::new();
//! let mut sessions = AgedOrderedMap::new(clock.clone());
//!
//! sessions.insert("alice", 101);
//! clock.advance(30);
//! sessions.insert("bob", 102);
//!
//! // Alice is active; expire everything untouched for 60 ticks.
//! clock.advance(40);
//! sessions.touch(&"alice");
//!
//! let now = 70;
//! loop {
//!     let expired = match sessions.chronological().oldest() {
//!         Some(oldest) if now - oldest.when >= 60 => oldest.id,
//!         _ => break,
//!     };
//!     sessions.remove_entry(expired);
//! }
//!
//! assert!(sessions.contains_key(&"alice"));
//! assert!(!sessions.contains_key(&"bob"));
//! ```

pub mod chronological;
pub mod clock;
pub mod ds;
pub mod error;
pub mod ordered;
pub mod prelude;
pub mod traits;
pub mod unordered;

pub use chronological::{AgedEntry, AgedKey, Chronological, KeyChronological};
pub use clock::{Clock, ManualClock, SystemClock};
pub use ds::EntryId;
pub use error::KeyNotFoundError;
pub use ordered::{AgedOrderedMap, AgedOrderedMultimap, AgedOrderedMultiset, AgedOrderedSet};
pub use unordered::{
    AgedUnorderedMap, AgedUnorderedMultimap, AgedUnorderedMultiset, AgedUnorderedSet,
};
