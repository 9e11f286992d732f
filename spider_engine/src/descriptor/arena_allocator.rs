/// ArenaAllocator - owns the named descriptor arenas of a renderer
///
/// Every arena sits behind its own mutex, so allocations from the frame
/// thread and from background uploads are serialized per arena while
/// different arenas never contend. Slot handles never leave the allocator:
/// callers keep `SlotRef`s and resolve them when they need the table.

use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::graphics_device::{DescriptorCategory, DescriptorTable, DescriptorWrite, GraphicsDevice};
use crate::log::Console;
use crate::{engine_debug, engine_info};
use super::arena::{ArenaId, DescriptorArena, SlotRange, SlotRef};

const SOURCE: &str = "spider::arena";

/// A slot resolved against the live table
#[derive(Clone)]
pub struct ResolvedSlot {
    pub table: Arc<dyn DescriptorTable>,
    pub index: u32,
}

pub struct ArenaAllocator {
    device: Arc<dyn GraphicsDevice>,
    console: Console,
    arenas: RwLock<Vec<Arc<Mutex<DescriptorArena>>>>,
    names: RwLock<FxHashMap<String, ArenaId>>,
}

impl ArenaAllocator {
    pub fn new(device: Arc<dyn GraphicsDevice>, console: Console) -> Self {
        Self {
            device,
            console,
            arenas: RwLock::new(Vec::new()),
            names: RwLock::new(FxHashMap::default()),
        }
    }

    /// Create a named arena with an initial table of `capacity` slots
    pub fn create_arena(
        &self,
        name: &str,
        category: DescriptorCategory,
        capacity: u32,
        shader_visible: bool,
    ) -> Result<ArenaId> {
        let mut names = self
            .names
            .write()
            .map_err(|_| Error::BackendError("arena name map poisoned".to_string()))?;
        if names.contains_key(name) {
            return Err(Error::InvalidResource(format!("arena '{}' already exists", name)));
        }

        let mut arenas = self
            .arenas
            .write()
            .map_err(|_| Error::BackendError("arena list poisoned".to_string()))?;
        let id = ArenaId(arenas.len() as u32);
        let arena = DescriptorArena::new(
            self.device.as_ref(),
            id,
            name,
            category,
            capacity,
            shader_visible,
        )?;
        arenas.push(Arc::new(Mutex::new(arena)));
        names.insert(name.to_string(), id);

        engine_debug!(
            self.console,
            SOURCE,
            "Created arena '{}' ({:?}, {} slots)",
            name,
            category,
            capacity
        );
        Ok(id)
    }

    /// Look up an arena by name
    pub fn arena_id(&self, name: &str) -> Option<ArenaId> {
        self.names.read().ok()?.get(name).copied()
    }

    /// Reserve `count` slots in `arena`, growing it when full
    ///
    /// See `DescriptorArena::allocate` for the writer contract.
    pub fn allocate<F>(&self, arena: ArenaId, count: u32, writer: F) -> Result<SlotRange>
    where
        F: FnMut(&dyn GraphicsDevice, &dyn DescriptorTable, u32, u32) -> Result<()>,
    {
        let handle = self.arena(arena)?;
        let mut arena = Self::lock(&handle)?;
        let before = arena.capacity();
        let range = arena.allocate(self.device.as_ref(), count, writer)?;
        if arena.capacity() != before {
            engine_info!(
                self.console,
                SOURCE,
                "Arena '{}' grew from {} to {} slots (generation {})",
                arena.name(),
                before,
                arena.capacity(),
                arena.generation()
            );
        }
        Ok(range)
    }

    /// Reserve `count` slots and fill them with `write`
    pub fn allocate_with(
        &self,
        arena: ArenaId,
        count: u32,
        write: &DescriptorWrite<'_>,
    ) -> Result<SlotRange> {
        self.allocate(arena, count, |device, table, slot, _| {
            device.write_descriptor(table, slot, write)
        })
    }

    /// Re-issue one live slot in place through `writer`
    ///
    /// The writer runs under the arena lock, so the table it receives cannot
    /// be replaced by a concurrent growth.
    pub fn rewrite<F>(&self, slot: SlotRef, writer: F) -> Result<()>
    where
        F: FnOnce(&dyn GraphicsDevice, &dyn DescriptorTable, u32) -> Result<()>,
    {
        let handle = self.arena(slot.arena)?;
        let arena = Self::lock(&handle)?;
        Self::check_live(&arena, slot)?;
        writer(self.device.as_ref(), arena.table().as_ref(), slot.index)
    }

    /// Re-issue one live slot in place with `write`
    pub fn write(&self, slot: SlotRef, write: &DescriptorWrite<'_>) -> Result<()> {
        self.rewrite(slot, |device, table, index| {
            device.write_descriptor(table, index, write)
        })
    }

    /// Resolve `slot` against the live table of its arena
    pub fn resolve(&self, slot: SlotRef) -> Result<ResolvedSlot> {
        let handle = self.arena(slot.arena)?;
        let arena = Self::lock(&handle)?;
        Self::check_live(&arena, slot)?;
        Ok(ResolvedSlot {
            table: arena.table().clone(),
            index: slot.index,
        })
    }

    /// Live table of `arena`
    pub fn table(&self, arena: ArenaId) -> Result<Arc<dyn DescriptorTable>> {
        let handle = self.arena(arena)?;
        let arena = Self::lock(&handle)?;
        Ok(arena.table().clone())
    }

    pub fn capacity(&self, arena: ArenaId) -> Result<u32> {
        self.with_arena(arena, |a| a.capacity())
    }

    pub fn size(&self, arena: ArenaId) -> Result<u32> {
        self.with_arena(arena, |a| a.size())
    }

    pub fn category(&self, arena: ArenaId) -> Result<DescriptorCategory> {
        self.with_arena(arena, |a| a.category())
    }

    pub fn generation(&self, arena: ArenaId) -> Result<u32> {
        self.with_arena(arena, |a| a.generation())
    }

    fn with_arena<T>(&self, arena: ArenaId, f: impl FnOnce(&DescriptorArena) -> T) -> Result<T> {
        let handle = self.arena(arena)?;
        let arena = Self::lock(&handle)?;
        Ok(f(&arena))
    }

    fn arena(&self, id: ArenaId) -> Result<Arc<Mutex<DescriptorArena>>> {
        let arenas = self
            .arenas
            .read()
            .map_err(|_| Error::BackendError("arena list poisoned".to_string()))?;
        arenas
            .get(id.0 as usize)
            .cloned()
            .ok_or_else(|| Error::InvalidResource(format!("unknown arena {:?}", id)))
    }

    fn lock(handle: &Mutex<DescriptorArena>) -> Result<MutexGuard<'_, DescriptorArena>> {
        handle
            .lock()
            .map_err(|_| Error::BackendError("arena lock poisoned".to_string()))
    }

    fn check_live(arena: &DescriptorArena, slot: SlotRef) -> Result<()> {
        if slot.index >= arena.size() {
            return Err(Error::InvalidResource(format!(
                "slot {} was never allocated in arena '{}' (size {})",
                slot.index,
                arena.name(),
                arena.size()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "arena_allocator_tests.rs"]
mod tests;
