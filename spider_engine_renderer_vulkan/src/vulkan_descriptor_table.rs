/// DescriptorTable - Vulkan implementation of the DescriptorTable trait
///
/// Vulkan has no descriptor heap a shader can index by slot, so a table is
/// a CPU-side array of slot records. When a command list binds a window of
/// the table it allocates a transient descriptor set and writes the records
/// of that window into it (see `plan_table_writes`).
///
/// Records hold raw handles and do not keep the resources alive; the
/// binding registry owns them for as long as they are bound.

use ash::vk;
use spider_engine::spider::render::{
    DescriptorCategory, DescriptorTable as RendererDescriptorTable, RangeKind, TableDesc,
};
use spider_engine::spider::{Error, Result};
use std::any::Any;
use std::sync::Mutex;

/// Content of one table slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SlotContent {
    Empty,
    UniformBuffer { buffer: vk::Buffer, range: u64 },
    StorageBuffer { buffer: vk::Buffer, range: u64 },
    SampledImage { view: vk::ImageView },
    Sampler { sampler: vk::Sampler },
}

impl SlotContent {
    /// Whether this content can fill a slot of a range of `kind`
    fn fits(&self, kind: RangeKind) -> bool {
        matches!(
            (self, kind),
            (SlotContent::UniformBuffer { .. }, RangeKind::ConstantBuffer)
                | (SlotContent::StorageBuffer { .. }, RangeKind::StorageBuffer)
                | (SlotContent::SampledImage { .. }, RangeKind::Texture)
                | (SlotContent::Sampler { .. }, RangeKind::Sampler)
        )
    }
}

/// Vulkan descriptor table implementation
pub struct DescriptorTable {
    category: DescriptorCategory,
    shader_visible: bool,
    slots: Mutex<Vec<SlotContent>>,
}

impl DescriptorTable {
    pub(crate) fn new(category: DescriptorCategory, capacity: u32, shader_visible: bool) -> Self {
        Self {
            category,
            shader_visible,
            slots: Mutex::new(vec![SlotContent::Empty; capacity as usize]),
        }
    }

    pub(crate) fn write(&self, slot: u32, content: SlotContent) -> Result<()> {
        let mut slots = self.lock()?;
        let capacity = slots.len();
        let entry = slots.get_mut(slot as usize).ok_or_else(|| {
            Error::InvalidResource(format!("slot {} out of table capacity {}", slot, capacity))
        })?;
        *entry = content;
        Ok(())
    }

    /// Copy slots `[0, count)` of `src` into this table
    pub(crate) fn copy_from(&self, src: &DescriptorTable, count: u32) -> Result<()> {
        if std::ptr::eq(self, src) {
            return Ok(());
        }
        let source = src.snapshot(0, count)?;
        let mut slots = self.lock()?;
        if count as usize > slots.len() {
            return Err(Error::InvalidResource(format!(
                "copy of {} slots into a table of {}",
                count,
                slots.len()
            )));
        }
        slots[..count as usize].copy_from_slice(&source);
        Ok(())
    }

    /// Records of slots `[base, base + count)`
    pub(crate) fn snapshot(&self, base: u32, count: u32) -> Result<Vec<SlotContent>> {
        let slots = self.lock()?;
        let end = base as usize + count as usize;
        if end > slots.len() {
            return Err(Error::InvalidResource(format!(
                "slots {}..{} out of table capacity {}",
                base,
                end,
                slots.len()
            )));
        }
        Ok(slots[base as usize..end].to_vec())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<SlotContent>>> {
        self.slots
            .lock()
            .map_err(|_| Error::BackendError("descriptor table lock poisoned".to_string()))
    }
}

impl RendererDescriptorTable for DescriptorTable {
    fn category(&self) -> DescriptorCategory {
        self.category
    }

    fn capacity(&self) -> u32 {
        self.slots.lock().map(|slots| slots.len() as u32).unwrap_or(0)
    }

    fn shader_visible(&self) -> bool {
        self.shader_visible
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// One descriptor to write into a set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PlannedWrite {
    pub binding: u32,
    pub descriptor_type: vk::DescriptorType,
    pub content: SlotContent,
}

/// Writes needed to mirror a table window into a descriptor set
///
/// `window` holds the slot records starting at the bound base slot. Binding
/// numbers are slot positions inside the table layout. Empty slots are left
/// unwritten, and a record whose kind does not match its range is an error.
pub(crate) fn plan_table_writes(desc: &TableDesc, window: &[SlotContent]) -> Result<Vec<PlannedWrite>> {
    let mut writes = Vec::new();
    for range in &desc.ranges {
        for i in 0..range.count {
            let binding = range.offset + i;
            let content = window.get(binding as usize).copied().ok_or_else(|| {
                Error::InvalidResource(format!(
                    "binding {} outside the {} bound slot(s)",
                    binding,
                    window.len()
                ))
            })?;
            if content == SlotContent::Empty {
                continue;
            }
            if !content.fits(range.kind) {
                return Err(Error::InvalidResource(format!(
                    "slot {} holds {:?} but the layout expects {:?}",
                    binding, content, range.kind
                )));
            }
            writes.push(PlannedWrite {
                binding,
                descriptor_type: crate::vulkan_format::range_kind_to_descriptor_type(range.kind),
                content,
            });
        }
    }
    Ok(writes)
}

#[cfg(test)]
#[path = "vulkan_descriptor_table_tests.rs"]
mod tests;
