/// PipelineLayout - table shape, binding layout and pipeline state of a pipeline

use std::sync::Arc;

use crate::graphics_device::{
    BindingLayout, BindingLayoutDesc, DescriptorCategory, PipelineState, RangeKind, TableDesc,
    TableRange,
};
use crate::shader::StageMask;

/// Table 0: constant buffers, then textures, then storage buffers
pub const VIEW_TABLE_INDEX: u32 = 0;
/// Table 1: samplers
pub const SAMPLER_TABLE_INDEX: u32 = 1;

/// Slot counts of each range, aggregated over all stages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RangeCounts {
    pub constant_buffers: u32,
    pub textures: u32,
    pub storage_buffers: u32,
    pub samplers: u32,
}

impl RangeCounts {
    pub fn view_slots(&self) -> u32 {
        self.constant_buffers + self.textures + self.storage_buffers
    }

    /// First slot of `kind` inside its table
    pub fn range_offset(&self, kind: RangeKind) -> u32 {
        match kind {
            RangeKind::ConstantBuffer | RangeKind::Sampler => 0,
            RangeKind::Texture => self.constant_buffers,
            RangeKind::StorageBuffer => self.constant_buffers + self.textures,
        }
    }

    pub fn range_count(&self, kind: RangeKind) -> u32 {
        match kind {
            RangeKind::ConstantBuffer => self.constant_buffers,
            RangeKind::Texture => self.textures,
            RangeKind::StorageBuffer => self.storage_buffers,
            RangeKind::Sampler => self.samplers,
        }
    }

    /// Binding layout with both tables, empty ranges included
    pub fn binding_layout_desc(&self, view_stages: StageMask, sampler_stages: StageMask) -> BindingLayoutDesc {
        let range = |kind| TableRange {
            kind,
            offset: self.range_offset(kind),
            count: self.range_count(kind),
        };
        BindingLayoutDesc {
            tables: vec![
                TableDesc {
                    category: DescriptorCategory::ResourceView,
                    ranges: vec![
                        range(RangeKind::ConstantBuffer),
                        range(RangeKind::Texture),
                        range(RangeKind::StorageBuffer),
                    ],
                    visibility: view_stages,
                },
                TableDesc {
                    category: DescriptorCategory::Sampler,
                    ranges: vec![range(RangeKind::Sampler)],
                    visibility: sampler_stages,
                },
            ],
        }
    }
}

#[derive(Clone)]
pub struct PipelineLayout {
    counts: RangeCounts,
    binding_layout: Arc<dyn BindingLayout>,
    pipeline_state: Arc<dyn PipelineState>,
}

impl PipelineLayout {
    pub fn new(
        counts: RangeCounts,
        binding_layout: Arc<dyn BindingLayout>,
        pipeline_state: Arc<dyn PipelineState>,
    ) -> Self {
        Self {
            counts,
            binding_layout,
            pipeline_state,
        }
    }

    pub fn counts(&self) -> &RangeCounts {
        &self.counts
    }

    pub fn binding_layout(&self) -> &Arc<dyn BindingLayout> {
        &self.binding_layout
    }

    pub fn pipeline_state(&self) -> &Arc<dyn PipelineState> {
        &self.pipeline_state
    }
}

impl std::fmt::Debug for PipelineLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineLayout")
            .field("counts", &self.counts)
            .field("binding_layout", self.binding_layout.desc())
            .finish()
    }
}
