//! One compute frame: create the output image, record, submit, wait, read back.
//!
//! Every per-frame object is an owning local, so an early return on any
//! failed call releases whatever was created so far.

use ash::vk;

use super::commands::CommandResources;
use super::device::{pick_output_memory_type, GpuDevice, OUTPUT_FORMAT};
use super::error::{GpuError, VkResultExt};
use super::handle;
use super::pipeline::{dispatch_groups, BackgroundPushConstants, ComputePipeline};
use crate::config::Resolution;

/// Descriptor set returned to its pool on drop
struct PooledDescriptorSet {
    set: vk::DescriptorSet,
    pool: vk::DescriptorPool,
    device: ash::Device,
}

impl Drop for PooledDescriptorSet {
    fn drop(&mut self) {
        if let Err(e) = unsafe { self.device.free_descriptor_sets(self.pool, &[self.set]) } {
            log::warn!("vkFreeDescriptorSets failed: {e}");
        }
    }
}

const COLOR_RANGE: vk::ImageSubresourceRange = vk::ImageSubresourceRange {
    aspect_mask: vk::ImageAspectFlags::COLOR,
    base_mip_level: 0,
    level_count: 1,
    base_array_layer: 0,
    layer_count: 1,
};

pub fn trace_frame(
    gpu: &GpuDevice,
    pipeline: &ComputePipeline,
    commands: &CommandResources,
    resolution: Resolution,
    push: &BackgroundPushConstants,
    framebuffer: &mut [u32],
) -> Result<(), GpuError> {
    let device = &gpu.device;
    let (width, height) = (resolution.width(), resolution.height());

    // Output image, linear so the host can read it after the dispatch
    let image_info = vk::ImageCreateInfo::default()
        .image_type(vk::ImageType::TYPE_2D)
        .format(OUTPUT_FORMAT)
        .extent(vk::Extent3D {
            width,
            height,
            depth: 1,
        })
        .mip_levels(1)
        .array_layers(1)
        .samples(vk::SampleCountFlags::TYPE_1)
        .tiling(vk::ImageTiling::LINEAR)
        .usage(vk::ImageUsageFlags::STORAGE)
        .sharing_mode(vk::SharingMode::EXCLUSIVE)
        .initial_layout(vk::ImageLayout::UNDEFINED);
    let image = handle::image(
        device,
        unsafe { device.create_image(&image_info, None) }.during("vkCreateImage")?,
    );

    let requirements = unsafe { device.get_image_memory_requirements(image.get()) };
    let memory_type = pick_output_memory_type(&gpu.memory_properties, requirements.memory_type_bits)
        .ok_or(GpuError::NoMemoryType)?;
    let alloc_info = vk::MemoryAllocateInfo::default()
        .allocation_size(requirements.size)
        .memory_type_index(memory_type);
    let memory = handle::memory(
        device,
        unsafe { device.allocate_memory(&alloc_info, None) }.during("vkAllocateMemory")?,
    );
    unsafe { device.bind_image_memory(image.get(), memory.get(), 0) }.during("vkBindImageMemory")?;

    let view_info = vk::ImageViewCreateInfo::default()
        .image(image.get())
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(OUTPUT_FORMAT)
        .subresource_range(COLOR_RANGE);
    let view = handle::image_view(
        device,
        unsafe { device.create_image_view(&view_info, None) }.during("vkCreateImageView")?,
    );

    let set_layouts = [pipeline.set_layout.get()];
    let set_info = vk::DescriptorSetAllocateInfo::default()
        .descriptor_pool(pipeline.descriptor_pool.get())
        .set_layouts(&set_layouts);
    let descriptor_set = unsafe { device.allocate_descriptor_sets(&set_info) }
        .during("vkAllocateDescriptorSets")?
        .into_iter()
        .next()
        .map(|set| PooledDescriptorSet {
            set,
            pool: pipeline.descriptor_pool.get(),
            device: device.clone(),
        })
        .ok_or(GpuError::Vulkan {
            step: "vkAllocateDescriptorSets",
            result: vk::Result::ERROR_UNKNOWN,
        })?;

    let image_infos = [vk::DescriptorImageInfo::default()
        .image_view(view.get())
        .image_layout(vk::ImageLayout::GENERAL)];
    let write = vk::WriteDescriptorSet::default()
        .dst_set(descriptor_set.set)
        .dst_binding(0)
        .descriptor_type(vk::DescriptorType::STORAGE_IMAGE)
        .image_info(&image_infos);
    unsafe { device.update_descriptor_sets(std::slice::from_ref(&write), &[]) };

    record(device, pipeline, commands.buffer, image.get(), descriptor_set.set, push, resolution)?;

    let fence = handle::fence(
        device,
        unsafe { device.create_fence(&vk::FenceCreateInfo::default(), None) }.during("vkCreateFence")?,
    );
    let command_buffers = [commands.buffer];
    let submit = vk::SubmitInfo::default().command_buffers(&command_buffers);
    unsafe { device.queue_submit(gpu.queue, std::slice::from_ref(&submit), fence.get()) }
        .during("vkQueueSubmit")?;
    if let Err(result) = unsafe { device.wait_for_fences(&[fence.get()], true, u64::MAX) } {
        // The submission may still be running; the locals must not be freed under it
        unsafe { device.device_wait_idle() }.ok();
        return Err(GpuError::Vulkan {
            step: "vkWaitForFences",
            result,
        });
    }

    let subresource = vk::ImageSubresource {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        mip_level: 0,
        array_layer: 0,
    };
    let layout = unsafe { device.get_image_subresource_layout(image.get(), subresource) };

    let mapped = unsafe { device.map_memory(memory.get(), 0, vk::WHOLE_SIZE, vk::MemoryMapFlags::empty()) }
        .during("vkMapMemory")? as *const u8;
    let row_bytes = width as usize * 4;
    for (y, dst) in framebuffer.chunks_exact_mut(width as usize).enumerate() {
        let offset = layout.offset as usize + y * layout.row_pitch as usize;
        // Rows lie within the allocation per the image's subresource layout
        let src = unsafe { std::slice::from_raw_parts(mapped.add(offset), row_bytes) };
        for (pixel, bytes) in dst.iter_mut().zip(src.chunks_exact(4)) {
            *pixel = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        }
    }
    unsafe { device.unmap_memory(memory.get()) };

    log::debug!("GPU frame {}x{} read back (row pitch {})", width, height, layout.row_pitch);
    Ok(())
}

fn record(
    device: &ash::Device,
    pipeline: &ComputePipeline,
    cmd: vk::CommandBuffer,
    image: vk::Image,
    descriptor_set: vk::DescriptorSet,
    push: &BackgroundPushConstants,
    resolution: Resolution,
) -> Result<(), GpuError> {
    let begin_info = vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
    let (groups_x, groups_y) = dispatch_groups(resolution.width(), resolution.height());

    unsafe {
        device
            .reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())
            .during("vkResetCommandBuffer")?;
        device
            .begin_command_buffer(cmd, &begin_info)
            .during("vkBeginCommandBuffer")?;

        let to_general = vk::ImageMemoryBarrier::default()
            .src_access_mask(vk::AccessFlags::empty())
            .dst_access_mask(vk::AccessFlags::SHADER_WRITE)
            .old_layout(vk::ImageLayout::UNDEFINED)
            .new_layout(vk::ImageLayout::GENERAL)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(COLOR_RANGE);
        device.cmd_pipeline_barrier(
            cmd,
            vk::PipelineStageFlags::TOP_OF_PIPE,
            vk::PipelineStageFlags::COMPUTE_SHADER,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &[to_general],
        );

        device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::COMPUTE, pipeline.pipeline.get());
        device.cmd_bind_descriptor_sets(
            cmd,
            vk::PipelineBindPoint::COMPUTE,
            pipeline.pipeline_layout.get(),
            0,
            &[descriptor_set],
            &[],
        );
        device.cmd_push_constants(
            cmd,
            pipeline.pipeline_layout.get(),
            vk::ShaderStageFlags::COMPUTE,
            0,
            bytemuck::bytes_of(push),
        );
        device.cmd_dispatch(cmd, groups_x, groups_y, 1);

        let to_host = vk::ImageMemoryBarrier::default()
            .src_access_mask(vk::AccessFlags::SHADER_WRITE)
            .dst_access_mask(vk::AccessFlags::HOST_READ)
            .old_layout(vk::ImageLayout::GENERAL)
            .new_layout(vk::ImageLayout::GENERAL)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(COLOR_RANGE);
        device.cmd_pipeline_barrier(
            cmd,
            vk::PipelineStageFlags::COMPUTE_SHADER,
            vk::PipelineStageFlags::HOST,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &[to_host],
        );

        device.end_command_buffer(cmd).during("vkEndCommandBuffer")?;
    }

    log::debug!("Recorded dispatch of {}x{} workgroups", groups_x, groups_y);
    Ok(())
}
