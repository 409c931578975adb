pub use crate::chronological::{AgedEntry, AgedKey, Chronological, KeyChronological};
pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::ds::EntryId;
pub use crate::error::KeyNotFoundError;
pub use crate::ordered::{
    AgedOrderedMap, AgedOrderedMultimap, AgedOrderedMultiset, AgedOrderedSet,
};
pub use crate::traits::{AgedContainer, ChronologicalAccess};
pub use crate::unordered::{
    AgedUnorderedMap, AgedUnorderedMultimap, AgedUnorderedMultiset, AgedUnorderedSet,
};
