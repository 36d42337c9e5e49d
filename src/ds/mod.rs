pub mod shard;
pub mod slot_arena;
pub mod space_saving;

pub use shard::{ShardId, ShardSelector};
pub use slot_arena::{SlotArena, SlotId};
pub use space_saving::{Counter, FrequencyEstimator, DEFAULT_CAPACITY};
