/// BindingRegistry - per-pipeline index of binding slots by (name, stage)

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::shader::ShaderStage;
use super::binding::{BindingResource, BindingSlot, ViewSource};
use super::resource_factory::ResourceFactory;

type BindingKey = (String, ShaderStage);

#[derive(Debug, Default)]
pub struct BindingRegistry {
    entries: FxHashMap<BindingKey, BindingSlot>,
    /// Keys in insertion order
    order: Vec<BindingKey>,
}

impl BindingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a slot; a second slot for the same (name, stage) is rejected
    pub fn insert(&mut self, slot: BindingSlot) -> Result<()> {
        let key = (slot.name.clone(), slot.stage);
        if self.entries.contains_key(&key) {
            return Err(Error::InvalidResource(format!(
                "binding '{}' declared twice in the {:?} stage",
                slot.name, slot.stage
            )));
        }
        self.order.push(key.clone());
        self.entries.insert(key, slot);
        Ok(())
    }

    pub fn get(&self, name: &str, stage: ShaderStage) -> Result<&BindingSlot> {
        self.entries
            .get(&(name.to_string(), stage))
            .ok_or_else(|| Self::not_found(name, stage))
    }

    pub fn contains(&self, name: &str, stage: ShaderStage) -> bool {
        self.entries.contains_key(&(name.to_string(), stage))
    }

    /// Copy `data` into the start of the constant buffer bound as `name`
    pub fn bind_constant(&self, name: &str, stage: ShaderStage, data: &[u8]) -> Result<()> {
        self.bind_constant_at(name, stage, 0, data)
    }

    /// Copy `data` into the constant buffer bound as `name` at `offset`
    pub fn bind_constant_at(
        &self,
        name: &str,
        stage: ShaderStage,
        offset: u64,
        data: &[u8],
    ) -> Result<()> {
        let slot = self.get(name, stage)?;
        match &slot.resource {
            BindingResource::ConstantBuffer { buffer } => {
                let end = offset.saturating_add(data.len() as u64);
                if end > slot.size {
                    return Err(Error::InvalidResource(format!(
                        "{} bytes at offset {} overflow constant buffer '{}' ({} bytes)",
                        data.len(),
                        offset,
                        name,
                        slot.size
                    )));
                }
                buffer.update(offset, data)
            }
            other => Err(Error::InvalidResource(format!(
                "binding '{}' is a {}, not a constant buffer",
                name,
                other.kind_name()
            ))),
        }
    }

    /// Re-create the view bound as `name` from `source`, keeping its slot
    ///
    /// Returns the replaced resource. Frames already recorded may still read
    /// it, so it must outlive them; `FrameSequencer::retire` holds it until
    /// the GPU is done.
    pub fn bind_resource_view(
        &mut self,
        name: &str,
        stage: ShaderStage,
        source: &ViewSource,
        factory: &dyn ResourceFactory,
    ) -> Result<BindingResource> {
        let key = (name.to_string(), stage);
        let slot = self
            .entries
            .get_mut(&key)
            .ok_or_else(|| Self::not_found(name, stage))?;

        let kind = match &slot.resource {
            BindingResource::ResourceView { kind, .. } => *kind,
            other => {
                return Err(Error::InvalidResource(format!(
                    "binding '{}' is a {}, not a resource view",
                    name,
                    other.kind_name()
                )))
            }
        };

        let view = factory.create_resource_view(kind, Some(source), slot.slot)?;
        slot.size = view_size(source);
        Ok(std::mem::replace(
            &mut slot.resource,
            BindingResource::ResourceView { kind, view },
        ))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Slots in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &BindingSlot> {
        self.order.iter().filter_map(move |key| self.entries.get(key))
    }

    fn not_found(name: &str, stage: ShaderStage) -> Error {
        Error::BindingNotFound {
            name: name.to_string(),
            stage,
        }
    }
}

/// Bytes behind a view source
pub(crate) fn view_size(source: &ViewSource) -> u64 {
    match source {
        ViewSource::Texture(texture) => texture.desc().byte_size(),
        ViewSource::Buffer { data, .. } => data.len() as u64,
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
