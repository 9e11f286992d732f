//! Descriptor arenas and their allocator

mod arena;
mod arena_allocator;

pub use arena::{ArenaId, DescriptorArena, SlotRange, SlotRef};
pub use arena_allocator::{ArenaAllocator, ResolvedSlot};
