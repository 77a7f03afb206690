use std::collections::BTreeMap;

use ash::prelude::VkResult;
use ash::vk;
use serde::{Deserialize, Serialize};

use crate::error::{SynthesisError, SynthesisResult};
use crate::reflection::{
    ArrayDimension, ReflectedDescriptorBinding, ReflectedDescriptorType,
    ReflectedPushConstantBlock, ShaderStage,
};

/// data for creating a vulkan PipelineLayout
///
/// `descriptor_set_layouts` is dense and zero-based: pipeline layout creation
/// indexes set layouts by position, so a set index that the shader never uses
/// still needs an (empty) layout when a higher set index is used.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesizedPipelineLayout {
    pub descriptor_set_layouts: Vec<SynthesizedDescriptorSetLayout>,
    pub push_constant_ranges: Vec<SynthesizedPushConstantRange>,
}

/// data for creating a vulkan DescriptorSetLayout
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesizedDescriptorSetLayout {
    pub bindings: Vec<SynthesizedDescriptorSetLayoutBinding>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesizedDescriptorSetLayoutBinding {
    pub binding: u32,
    pub descriptor_type: ReflectedDescriptorType,
    pub descriptor_count: u32,
    pub stage: ShaderStage,
}

impl SynthesizedDescriptorSetLayoutBinding {
    pub fn to_vk(&self) -> vk::DescriptorSetLayoutBinding<'static> {
        vk::DescriptorSetLayoutBinding::default()
            .stage_flags(self.stage.to_vk())
            .binding(self.binding)
            .descriptor_count(self.descriptor_count)
            .descriptor_type(self.descriptor_type.to_vk())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesizedPushConstantRange {
    pub stage: ShaderStage,
    pub offset: u32,
    pub size: u32,
}

impl SynthesizedPushConstantRange {
    pub fn to_vk(&self) -> vk::PushConstantRange {
        vk::PushConstantRange::default()
            .stage_flags(self.stage.to_vk())
            .offset(self.offset)
            .size(self.size)
    }
}

/// the layout plus the input attachment indices found while building it
#[derive(Debug)]
pub struct PipelineLayoutSynthesis {
    pub layout: SynthesizedPipelineLayout,
    pub input_attachment_indices: Vec<u32>,
}

pub fn synthesize_pipeline_layout(
    stage: ShaderStage,
    bindings: &[ReflectedDescriptorBinding],
    push_constant_blocks: &[ReflectedPushConstantBlock],
) -> SynthesisResult<PipelineLayoutSynthesis> {
    let mut input_attachment_indices = vec![];
    let mut sets: BTreeMap<u32, SynthesizedDescriptorSetLayout> = BTreeMap::new();

    for reflected in bindings {
        let set = sets.entry(reflected.set).or_default();
        if set.bindings.iter().any(|b| b.binding == reflected.binding) {
            return Err(SynthesisError::DuplicateBinding {
                set: reflected.set,
                binding: reflected.binding,
            });
        }

        if reflected.descriptor_type == ReflectedDescriptorType::InputAttachment {
            input_attachment_indices.push(reflected.input_attachment_index);
        }

        set.bindings.push(SynthesizedDescriptorSetLayoutBinding {
            binding: reflected.binding,
            descriptor_type: reflected.descriptor_type,
            descriptor_count: descriptor_count(reflected)?,
            stage,
        });
    }

    let mut descriptor_set_layouts = vec![];
    for (set_index, set_layout) in sets {
        // backfill unused set indices
        while (descriptor_set_layouts.len() as u32) < set_index {
            log::debug!(
                "inserting empty descriptor set layout at set {}",
                descriptor_set_layouts.len()
            );
            descriptor_set_layouts.push(SynthesizedDescriptorSetLayout::default());
        }

        descriptor_set_layouts.push(set_layout);
    }

    let push_constant_ranges = push_constant_blocks
        .iter()
        .map(|block| SynthesizedPushConstantRange {
            stage,
            offset: block.offset,
            size: block.size,
        })
        .collect();

    Ok(PipelineLayoutSynthesis {
        layout: SynthesizedPipelineLayout {
            descriptor_set_layouts,
            push_constant_ranges,
        },
        input_attachment_indices,
    })
}

/// the product of all array extents
///
/// A runtime-sized dimension counts as 1, a layout needs a concrete count.
pub fn descriptor_count(binding: &ReflectedDescriptorBinding) -> SynthesisResult<u32> {
    let mut count: u32 = 1;

    for dimension in &binding.array_dimensions {
        let extent = match dimension {
            ArrayDimension::Sized(extent) => *extent,
            ArrayDimension::RuntimeSized => {
                log::warn!(
                    "runtime-sized array at set {} binding {} counted as a single descriptor",
                    binding.set,
                    binding.binding
                );
                1
            }
        };

        count = count
            .checked_mul(extent)
            .ok_or(SynthesisError::DescriptorCountOverflow {
                set: binding.set,
                binding: binding.binding,
            })?;
    }

    Ok(count)
}

/// the vulkan calls needed to build a pipeline layout
pub trait LayoutDevice {
    /// # Safety
    /// same contract as vkCreateDescriptorSetLayout
    unsafe fn create_descriptor_set_layout(
        &self,
        create_info: &vk::DescriptorSetLayoutCreateInfo<'_>,
    ) -> VkResult<vk::DescriptorSetLayout>;

    /// # Safety
    /// same contract as vkDestroyDescriptorSetLayout
    unsafe fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout);

    /// # Safety
    /// same contract as vkCreatePipelineLayout
    unsafe fn create_pipeline_layout(
        &self,
        create_info: &vk::PipelineLayoutCreateInfo<'_>,
    ) -> VkResult<vk::PipelineLayout>;
}

impl LayoutDevice for ash::Device {
    unsafe fn create_descriptor_set_layout(
        &self,
        create_info: &vk::DescriptorSetLayoutCreateInfo<'_>,
    ) -> VkResult<vk::DescriptorSetLayout> {
        unsafe { ash::Device::create_descriptor_set_layout(self, create_info, None) }
    }

    unsafe fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        unsafe { ash::Device::destroy_descriptor_set_layout(self, layout, None) }
    }

    unsafe fn create_pipeline_layout(
        &self,
        create_info: &vk::PipelineLayoutCreateInfo<'_>,
    ) -> VkResult<vk::PipelineLayout> {
        unsafe { ash::Device::create_pipeline_layout(self, create_info, None) }
    }
}

/// descriptor set layouts that only live long enough to create a pipeline layout
struct TransientSetLayouts<'d, D: LayoutDevice> {
    device: &'d D,
    layouts: Vec<vk::DescriptorSetLayout>,
}

impl<D: LayoutDevice> Drop for TransientSetLayouts<'_, D> {
    fn drop(&mut self) {
        for layout in self.layouts.drain(..) {
            unsafe { self.device.destroy_descriptor_set_layout(layout) };
        }
    }
}

impl SynthesizedPipelineLayout {
    /// creates the vulkan PipelineLayout
    ///
    /// The intermediate descriptor set layouts are destroyed before returning,
    /// whether or not creation succeeded.
    ///
    /// # Safety
    /// `device` must be a valid device that outlives the returned layout
    pub unsafe fn vk_create<D: LayoutDevice>(&self, device: &D) -> SynthesisResult<vk::PipelineLayout> {
        let mut transient = TransientSetLayouts {
            device,
            layouts: Vec::with_capacity(self.descriptor_set_layouts.len()),
        };

        for set_layout in &self.descriptor_set_layouts {
            let bindings: Vec<_> = set_layout.bindings.iter().map(|b| b.to_vk()).collect();
            let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
            let layout = unsafe { device.create_descriptor_set_layout(&create_info)? };
            transient.layouts.push(layout);
        }

        let push_constant_ranges: Vec<_> =
            self.push_constant_ranges.iter().map(|r| r.to_vk()).collect();

        let pipeline_layout_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&transient.layouts)
            .push_constant_ranges(&push_constant_ranges);

        let pipeline_layout = unsafe { device.create_pipeline_layout(&pipeline_layout_info)? };

        Ok(pipeline_layout)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use ash::vk::Handle;

    use super::*;

    fn binding(set: u32, binding: u32) -> ReflectedDescriptorBinding {
        ReflectedDescriptorBinding {
            name: String::new(),
            set,
            binding,
            descriptor_type: ReflectedDescriptorType::UniformBuffer,
            array_dimensions: vec![],
            input_attachment_index: 0,
        }
    }

    #[test]
    fn sparse_sets_are_backfilled() {
        let bindings = [binding(5, 0), binding(0, 0), binding(2, 1), binding(2, 0)];
        let synthesis =
            synthesize_pipeline_layout(ShaderStage::Fragment, &bindings, &[]).unwrap();
        let layouts = &synthesis.layout.descriptor_set_layouts;

        assert_eq!(layouts.len(), 6);
        for empty in [1, 3, 4] {
            assert!(layouts[empty].bindings.is_empty(), "set {empty} should be empty");
        }
        assert_eq!(layouts[0].bindings.len(), 1);
        assert_eq!(layouts[5].bindings.len(), 1);

        // reflected order is kept within a set
        let set_2: Vec<u32> = layouts[2].bindings.iter().map(|b| b.binding).collect();
        assert_eq!(set_2, vec![1, 0]);
    }

    #[test]
    fn bindings_use_the_stage_under_test() {
        let synthesis =
            synthesize_pipeline_layout(ShaderStage::Geometry, &[binding(0, 3)], &[]).unwrap();
        let vk_binding = synthesis.layout.descriptor_set_layouts[0].bindings[0].to_vk();

        assert_eq!(vk_binding.binding, 3);
        assert_eq!(vk_binding.stage_flags, vk::ShaderStageFlags::GEOMETRY);
        assert_eq!(vk_binding.descriptor_type, vk::DescriptorType::UNIFORM_BUFFER);
    }

    #[test]
    fn descriptor_count_is_product_of_extents() {
        let mut b = binding(0, 0);
        assert_eq!(descriptor_count(&b).unwrap(), 1);

        b.array_dimensions = vec![ArrayDimension::Sized(2), ArrayDimension::Sized(3)];
        assert_eq!(descriptor_count(&b).unwrap(), 6);

        b.array_dimensions = vec![ArrayDimension::Sized(4), ArrayDimension::RuntimeSized];
        assert_eq!(descriptor_count(&b).unwrap(), 4);

        b.array_dimensions = vec![ArrayDimension::Sized(u32::MAX), ArrayDimension::Sized(2)];
        assert!(matches!(
            descriptor_count(&b),
            Err(SynthesisError::DescriptorCountOverflow { set: 0, binding: 0 })
        ));
    }

    #[test]
    fn duplicate_binding_is_rejected() {
        let result =
            synthesize_pipeline_layout(ShaderStage::Compute, &[binding(1, 2), binding(1, 2)], &[]);

        assert!(matches!(
            result,
            Err(SynthesisError::DuplicateBinding { set: 1, binding: 2 })
        ));
    }

    #[test]
    fn input_attachment_indices_are_collected() {
        let mut first = binding(0, 0);
        first.descriptor_type = ReflectedDescriptorType::InputAttachment;
        first.input_attachment_index = 2;
        let mut second = binding(0, 1);
        second.descriptor_type = ReflectedDescriptorType::InputAttachment;
        second.input_attachment_index = 0;
        let mut not_an_attachment = binding(0, 2);
        not_an_attachment.input_attachment_index = 7;

        let synthesis = synthesize_pipeline_layout(
            ShaderStage::Fragment,
            &[first, second, not_an_attachment],
            &[],
        )
        .unwrap();

        assert_eq!(synthesis.input_attachment_indices, vec![2, 0]);
    }

    #[test]
    fn push_constant_blocks_are_not_merged() {
        let blocks = [
            ReflectedPushConstantBlock {
                name: "a".to_string(),
                offset: 0,
                size: 16,
            },
            ReflectedPushConstantBlock {
                name: "b".to_string(),
                offset: 8,
                size: 16,
            },
        ];
        let synthesis = synthesize_pipeline_layout(ShaderStage::Vertex, &[], &blocks).unwrap();
        let ranges: Vec<_> = synthesis
            .layout
            .push_constant_ranges
            .iter()
            .map(|r| r.to_vk())
            .collect();

        assert_eq!(ranges.len(), 2);
        assert_eq!((ranges[1].offset, ranges[1].size), (8, 16));
        assert_eq!(ranges[1].stage_flags, vk::ShaderStageFlags::VERTEX);
    }

    #[test]
    fn no_push_constants_means_no_ranges() {
        let synthesis =
            synthesize_pipeline_layout(ShaderStage::Vertex, &[binding(0, 0)], &[]).unwrap();

        assert!(synthesis.layout.push_constant_ranges.is_empty());
    }

    #[test]
    fn serialized_layout() {
        let synthesis = synthesize_pipeline_layout(
            ShaderStage::Fragment,
            &[binding(1, 0)],
            &[ReflectedPushConstantBlock {
                name: "pc".to_string(),
                offset: 0,
                size: 64,
            }],
        )
        .unwrap();

        insta::assert_json_snapshot!(synthesis.layout, @r###"
        {
          "descriptor_set_layouts": [
            {
              "bindings": []
            },
            {
              "bindings": [
                {
                  "binding": 0,
                  "descriptor_type": "uniformBuffer",
                  "descriptor_count": 1,
                  "stage": "fragment"
                }
              ]
            }
          ],
          "push_constant_ranges": [
            {
              "stage": "fragment",
              "offset": 0,
              "size": 64
            }
          ]
        }
        "###);
    }

    /// records calls and fails on request
    #[derive(Default)]
    struct RecordingDevice {
        next_handle: Cell<u64>,
        created: RefCell<Vec<vk::DescriptorSetLayout>>,
        destroyed: RefCell<Vec<vk::DescriptorSetLayout>>,
        set_layouts_in_pipeline_layout: Cell<u32>,
        fail_set_layout_at: Option<usize>,
        fail_pipeline_layout: bool,
    }

    impl RecordingDevice {
        fn handle(&self) -> u64 {
            let handle = self.next_handle.get() + 1;
            self.next_handle.set(handle);
            handle
        }
    }

    impl LayoutDevice for RecordingDevice {
        unsafe fn create_descriptor_set_layout(
            &self,
            _create_info: &vk::DescriptorSetLayoutCreateInfo<'_>,
        ) -> VkResult<vk::DescriptorSetLayout> {
            if self.fail_set_layout_at == Some(self.created.borrow().len()) {
                return Err(vk::Result::ERROR_OUT_OF_HOST_MEMORY);
            }

            let layout = vk::DescriptorSetLayout::from_raw(self.handle());
            self.created.borrow_mut().push(layout);
            Ok(layout)
        }

        unsafe fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
            self.destroyed.borrow_mut().push(layout);
        }

        unsafe fn create_pipeline_layout(
            &self,
            create_info: &vk::PipelineLayoutCreateInfo<'_>,
        ) -> VkResult<vk::PipelineLayout> {
            self.set_layouts_in_pipeline_layout
                .set(create_info.set_layout_count);
            if self.fail_pipeline_layout {
                return Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
            }

            Ok(vk::PipelineLayout::from_raw(self.handle()))
        }
    }

    fn sparse_layout() -> SynthesizedPipelineLayout {
        synthesize_pipeline_layout(ShaderStage::Fragment, &[binding(0, 0), binding(2, 0)], &[])
            .unwrap()
            .layout
    }

    #[test]
    fn transient_set_layouts_are_destroyed() {
        let device = RecordingDevice::default();
        let pipeline_layout = unsafe { sparse_layout().vk_create(&device) }.unwrap();

        assert!(!pipeline_layout.is_null());
        assert_eq!(device.set_layouts_in_pipeline_layout.get(), 3);
        assert_eq!(device.created.borrow().len(), 3);
        assert_eq!(*device.destroyed.borrow(), *device.created.borrow());
    }

    #[test]
    fn transient_set_layouts_are_destroyed_on_pipeline_layout_failure() {
        let device = RecordingDevice {
            fail_pipeline_layout: true,
            ..Default::default()
        };
        let result = unsafe { sparse_layout().vk_create(&device) };

        assert!(matches!(
            result,
            Err(SynthesisError::Vulkan(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY))
        ));
        assert_eq!(*device.destroyed.borrow(), *device.created.borrow());
    }

    #[test]
    fn transient_set_layouts_are_destroyed_on_set_layout_failure() {
        let device = RecordingDevice {
            fail_set_layout_at: Some(2),
            ..Default::default()
        };
        let result = unsafe { sparse_layout().vk_create(&device) };

        assert!(matches!(result, Err(SynthesisError::Vulkan(_))));
        assert_eq!(device.created.borrow().len(), 2);
        assert_eq!(*device.destroyed.borrow(), *device.created.borrow());
        assert_eq!(device.set_layouts_in_pipeline_layout.get(), 0);
    }
}
