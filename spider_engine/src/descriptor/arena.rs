/// DescriptorArena - one growable, append-only table of descriptor slots

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::graphics_device::{DescriptorCategory, DescriptorTable, GraphicsDevice};

/// Identifies an arena inside its `ArenaAllocator`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArenaId(pub(crate) u32);

/// Logical address of one slot
///
/// Stays valid across arena growth; resolve it through the allocator to
/// reach the live backing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotRef {
    pub arena: ArenaId,
    pub index: u32,
}

/// Contiguous run of slots handed out by one `allocate` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotRange {
    pub arena: ArenaId,
    pub start: u32,
    pub count: u32,
}

impl SlotRange {
    /// Slot `offset` of the range
    pub fn slot(&self, offset: u32) -> Option<SlotRef> {
        (offset < self.count).then(|| SlotRef {
            arena: self.arena,
            index: self.start + offset,
        })
    }

    pub fn end(&self) -> u32 {
        self.start + self.count
    }

    pub fn contains(&self, slot: SlotRef) -> bool {
        slot.arena == self.arena && slot.index >= self.start && slot.index < self.end()
    }
}

/// Growable descriptor table
///
/// Invariants: `size <= capacity`, capacity never decreases, and slots
/// `[0, size)` keep their offset and content when the table is replaced.
pub struct DescriptorArena {
    id: ArenaId,
    name: String,
    category: DescriptorCategory,
    shader_visible: bool,
    size: u32,
    table: Arc<dyn DescriptorTable>,
    generation: u32,
}

impl DescriptorArena {
    pub(crate) fn new(
        device: &dyn GraphicsDevice,
        id: ArenaId,
        name: &str,
        category: DescriptorCategory,
        capacity: u32,
        shader_visible: bool,
    ) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidResource(format!(
                "arena '{}' needs a non-zero capacity",
                name
            )));
        }
        let table = device.create_descriptor_table(category, capacity, shader_visible)?;
        Ok(Self {
            id,
            name: name.to_string(),
            category,
            shader_visible,
            size: 0,
            table,
            generation: 0,
        })
    }

    pub fn id(&self) -> ArenaId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> DescriptorCategory {
        self.category
    }

    pub fn shader_visible(&self) -> bool {
        self.shader_visible
    }

    /// Slots handed out so far (the next free offset)
    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn capacity(&self) -> u32 {
        self.table.capacity()
    }

    /// Number of times the backing table was replaced
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Live backing table
    pub fn table(&self) -> &Arc<dyn DescriptorTable> {
        &self.table
    }

    /// Capacity after growing to hold `required` slots
    pub fn grown_capacity(capacity: u32, required: u32) -> u32 {
        capacity.saturating_mul(2).max(required)
    }

    /// Replace the table with one that holds at least `required` slots
    ///
    /// Returns the previous capacity.
    pub(crate) fn grow(&mut self, device: &dyn GraphicsDevice, required: u32) -> Result<u32> {
        let old_capacity = self.capacity();
        let new_capacity = Self::grown_capacity(old_capacity, required);
        let table = device.create_descriptor_table(self.category, new_capacity, self.shader_visible)?;
        if self.size > 0 {
            device.copy_descriptors(self.table.as_ref(), table.as_ref(), self.size)?;
        }
        self.table = table;
        self.generation += 1;
        Ok(old_capacity)
    }

    /// Reserve `count` slots, initializing each through `writer`
    ///
    /// `writer` receives the device, the live table, the absolute slot index
    /// and the index within the new range. The arena only advances once every
    /// slot was written, so a failing writer leaves the arena as it was.
    pub(crate) fn allocate<F>(
        &mut self,
        device: &dyn GraphicsDevice,
        count: u32,
        mut writer: F,
    ) -> Result<SlotRange>
    where
        F: FnMut(&dyn GraphicsDevice, &dyn DescriptorTable, u32, u32) -> Result<()>,
    {
        if count == 0 {
            return Err(Error::InvalidResource(format!(
                "allocation of zero slots in arena '{}'",
                self.name
            )));
        }
        let required = self.size.checked_add(count).ok_or_else(|| {
            Error::InvalidResource(format!("arena '{}' slot count overflow", self.name))
        })?;
        if required > self.capacity() {
            self.grow(device, required)?;
        }

        let start = self.size;
        for offset in 0..count {
            writer(device, self.table.as_ref(), start + offset, offset)?;
        }
        self.size = required;

        Ok(SlotRange {
            arena: self.id,
            start,
            count,
        })
    }
}
