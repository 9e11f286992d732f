/// SamplerCache - internal VkSampler management for the Vulkan backend
///
/// Sampler descriptors are written from a `SamplerDesc`; the matching
/// VkSampler is created on first use and shared by every table slot that
/// names the same description. Typical engines only need a handful.

use ash::vk;
use rustc_hash::FxHashMap;
use spider_engine::engine_err;
use spider_engine::spider::render::{AddressMode, Filter, SamplerDesc};
use spider_engine::spider::Result;
use std::sync::Arc;

use crate::vulkan_context::{GpuContext, SOURCE};
use crate::vulkan_format::{address_mode_to_vk, filter_to_vk};

/// Creates VkSamplers on first use, destroys them on drop
pub(crate) struct SamplerCache {
    ctx: Arc<GpuContext>,
    cache: FxHashMap<SamplerDesc, vk::Sampler>,
}

impl SamplerCache {
    pub(crate) fn new(ctx: Arc<GpuContext>) -> Self {
        Self {
            ctx,
            cache: FxHashMap::default(),
        }
    }

    /// Get or create the VkSampler for `desc`
    pub(crate) fn get(&mut self, desc: &SamplerDesc) -> Result<vk::Sampler> {
        if let Some(&sampler) = self.cache.get(desc) {
            return Ok(sampler);
        }

        let sampler = unsafe {
            self.ctx
                .device
                .create_sampler(&sampler_create_info(desc, self.ctx.anisotropy), None)
                .map_err(|e| engine_err!(self.ctx.console, SOURCE, "Failed to create VkSampler: {:?}", e))?
        };
        self.cache.insert(*desc, sampler);
        Ok(sampler)
    }
}

/// Anisotropy only applies to `Filter::Anisotropic` and only when the device
/// feature is enabled
pub(crate) fn sampler_create_info(desc: &SamplerDesc, anisotropy_supported: bool) -> vk::SamplerCreateInfo<'static> {
    let (filter, mipmap) = filter_to_vk(desc.filter);
    let address = address_mode_to_vk(desc.address_mode);

    let create_info = vk::SamplerCreateInfo::default()
        .mag_filter(filter)
        .min_filter(filter)
        .mipmap_mode(mipmap)
        .address_mode_u(address)
        .address_mode_v(address)
        .address_mode_w(address)
        .mip_lod_bias(0.0)
        .min_lod(0.0)
        .max_lod(vk::LOD_CLAMP_NONE)
        .border_color(if desc.address_mode == AddressMode::Border {
            vk::BorderColor::FLOAT_OPAQUE_WHITE
        } else {
            vk::BorderColor::FLOAT_OPAQUE_BLACK
        })
        .unnormalized_coordinates(false)
        .compare_enable(false)
        .compare_op(vk::CompareOp::ALWAYS);

    if desc.filter == Filter::Anisotropic && anisotropy_supported && desc.max_anisotropy > 1 {
        create_info
            .anisotropy_enable(true)
            .max_anisotropy(desc.max_anisotropy.min(16) as f32)
    } else {
        create_info.anisotropy_enable(false).max_anisotropy(1.0)
    }
}

impl Drop for SamplerCache {
    fn drop(&mut self) {
        for (_, sampler) in self.cache.drain() {
            unsafe {
                self.ctx.device.destroy_sampler(sampler, None);
            }
        }
    }
}
