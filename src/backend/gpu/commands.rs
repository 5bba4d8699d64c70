use ash::vk;

use super::device::GpuDevice;
use super::error::{GpuError, VkResultExt};
use super::handle::{self, DeviceHandle};

/// One resettable primary command buffer and the pool it comes from
pub struct CommandResources {
    pub buffer: vk::CommandBuffer,
    pool: DeviceHandle<vk::CommandPool>,
}

impl CommandResources {
    pub fn new(gpu: &GpuDevice) -> Result<Self, GpuError> {
        let device = &gpu.device;

        let pool_info = vk::CommandPoolCreateInfo::default()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(gpu.queue_family_index);
        let pool = handle::command_pool(
            device,
            unsafe { device.create_command_pool(&pool_info, None) }.during("vkCreateCommandPool")?,
        );

        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool.get())
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let buffer = unsafe { device.allocate_command_buffers(&alloc_info) }
            .during("vkAllocateCommandBuffers")?
            .into_iter()
            .next()
            .ok_or(GpuError::Vulkan {
                step: "vkAllocateCommandBuffers",
                result: vk::Result::ERROR_UNKNOWN,
            })?;

        Ok(CommandResources { buffer, pool })
    }
}

impl Drop for CommandResources {
    fn drop(&mut self) {
        unsafe {
            self.pool
                .device()
                .free_command_buffers(self.pool.get(), &[self.buffer]);
        }
    }
}
