use ash::vk;
use bytemuck::{Pod, Zeroable};
use std::fs::File;
use std::path::Path;

use super::device::GpuDevice;
use super::error::{GpuError, VkResultExt};
use super::handle::{self, DeviceHandle};
use crate::scene::Scene;

/// Workgroup edge length, matching `local_size_x/y` in the shader
pub const WORKGROUP_SIZE: u32 = 16;

/// Push constant block: the two background gradient colors as RGBA
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct BackgroundPushConstants {
    pub top: [f32; 4],
    pub bottom: [f32; 4],
}

// Vulkan guarantees at least 128 bytes of push constants
const _: () = assert!(std::mem::size_of::<BackgroundPushConstants>() <= 128);

impl BackgroundPushConstants {
    pub fn from_scene(scene: &Scene) -> Self {
        Self {
            top: scene.background_top.to_rgba_array(),
            bottom: scene.background_bottom.to_rgba_array(),
        }
    }
}

/// Workgroups per axis; partial groups at the edges are bounds-checked in the shader
pub fn dispatch_groups(width: u32, height: u32) -> (u32, u32) {
    (width.div_ceil(WORKGROUP_SIZE), height.div_ceil(WORKGROUP_SIZE))
}

/// Read a SPIR-V binary from disk
pub fn load_shader(path: &Path) -> Result<Vec<u32>, GpuError> {
    let mut file = File::open(path).map_err(|source| GpuError::ShaderMissing {
        path: path.to_path_buf(),
        source,
    })?;
    ash::util::read_spv(&mut file).map_err(|source| GpuError::ShaderInvalid {
        path: path.to_path_buf(),
        source,
    })
}

/// Compute pipeline plus the layouts and descriptor pool it binds against.
/// Fields drop top to bottom.
pub struct ComputePipeline {
    pub pipeline: DeviceHandle<vk::Pipeline>,
    pub pipeline_layout: DeviceHandle<vk::PipelineLayout>,
    pub descriptor_pool: DeviceHandle<vk::DescriptorPool>,
    pub set_layout: DeviceHandle<vk::DescriptorSetLayout>,
    _shader_module: DeviceHandle<vk::ShaderModule>,
}

impl ComputePipeline {
    pub fn new(gpu: &GpuDevice, shader_path: &Path) -> Result<Self, GpuError> {
        let device = &gpu.device;

        let code = load_shader(shader_path)?;
        log::debug!("Loaded {} ({} words)", shader_path.display(), code.len());

        let module_info = vk::ShaderModuleCreateInfo::default().code(&code);
        let shader_module = handle::shader_module(
            device,
            unsafe { device.create_shader_module(&module_info, None) }.during("vkCreateShaderModule")?,
        );

        let bindings = [vk::DescriptorSetLayoutBinding::default()
            .binding(0)
            .descriptor_type(vk::DescriptorType::STORAGE_IMAGE)
            .descriptor_count(1)
            .stage_flags(vk::ShaderStageFlags::COMPUTE)];
        let layout_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
        let set_layout = handle::descriptor_set_layout(
            device,
            unsafe { device.create_descriptor_set_layout(&layout_info, None) }
                .during("vkCreateDescriptorSetLayout")?,
        );

        let pool_sizes = [vk::DescriptorPoolSize {
            ty: vk::DescriptorType::STORAGE_IMAGE,
            descriptor_count: 1,
        }];
        let pool_info = vk::DescriptorPoolCreateInfo::default()
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
            .max_sets(1)
            .pool_sizes(&pool_sizes);
        let descriptor_pool = handle::descriptor_pool(
            device,
            unsafe { device.create_descriptor_pool(&pool_info, None) }.during("vkCreateDescriptorPool")?,
        );

        let push_ranges = [vk::PushConstantRange::default()
            .stage_flags(vk::ShaderStageFlags::COMPUTE)
            .offset(0)
            .size(std::mem::size_of::<BackgroundPushConstants>() as u32)];
        let set_layouts = [set_layout.get()];
        let pipeline_layout_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&set_layouts)
            .push_constant_ranges(&push_ranges);
        let pipeline_layout = handle::pipeline_layout(
            device,
            unsafe { device.create_pipeline_layout(&pipeline_layout_info, None) }
                .during("vkCreatePipelineLayout")?,
        );

        let stage = vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::COMPUTE)
            .module(shader_module.get())
            .name(c"main");
        let pipeline_info = vk::ComputePipelineCreateInfo::default()
            .stage(stage)
            .layout(pipeline_layout.get());
        let pipelines = unsafe {
            device.create_compute_pipelines(vk::PipelineCache::null(), std::slice::from_ref(&pipeline_info), None)
        }
        .map_err(|(_, result)| result)
        .during("vkCreateComputePipelines")?;
        let pipeline = pipelines
            .into_iter()
            .next()
            .map(|p| handle::pipeline(device, p))
            .ok_or(GpuError::Vulkan {
                step: "vkCreateComputePipelines",
                result: vk::Result::ERROR_UNKNOWN,
            })?;

        log::info!("Compute pipeline ready");

        Ok(ComputePipeline {
            pipeline,
            pipeline_layout,
            descriptor_pool,
            set_layout,
            _shader_module: shader_module,
        })
    }
}
