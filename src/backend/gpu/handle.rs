//! Owning wrappers for device-level Vulkan handles

use ash::vk;

/// A device child object released when the wrapper is dropped.
///
/// Not `Clone`: each wrapper is the single owner of its handle. The parent
/// `VkDevice` must outlive every wrapper created from it.
pub struct DeviceHandle<H: vk::Handle + Copy> {
    handle: H,
    device: ash::Device,
    release: fn(&ash::Device, H),
}

impl<H: vk::Handle + Copy> DeviceHandle<H> {
    pub fn new(device: &ash::Device, handle: H, release: fn(&ash::Device, H)) -> Self {
        Self {
            handle,
            device: device.clone(),
            release,
        }
    }

    pub fn get(&self) -> H {
        self.handle
    }

    pub fn device(&self) -> &ash::Device {
        &self.device
    }
}

impl<H: vk::Handle + Copy> Drop for DeviceHandle<H> {
    fn drop(&mut self) {
        (self.release)(&self.device, self.handle);
    }
}

pub fn image(device: &ash::Device, image: vk::Image) -> DeviceHandle<vk::Image> {
    DeviceHandle::new(device, image, |d, h| unsafe { d.destroy_image(h, None) })
}

pub fn image_view(device: &ash::Device, view: vk::ImageView) -> DeviceHandle<vk::ImageView> {
    DeviceHandle::new(device, view, |d, h| unsafe { d.destroy_image_view(h, None) })
}

pub fn memory(device: &ash::Device, memory: vk::DeviceMemory) -> DeviceHandle<vk::DeviceMemory> {
    DeviceHandle::new(device, memory, |d, h| unsafe { d.free_memory(h, None) })
}

pub fn fence(device: &ash::Device, fence: vk::Fence) -> DeviceHandle<vk::Fence> {
    DeviceHandle::new(device, fence, |d, h| unsafe { d.destroy_fence(h, None) })
}

pub fn shader_module(device: &ash::Device, module: vk::ShaderModule) -> DeviceHandle<vk::ShaderModule> {
    DeviceHandle::new(device, module, |d, h| unsafe { d.destroy_shader_module(h, None) })
}

pub fn descriptor_set_layout(
    device: &ash::Device,
    layout: vk::DescriptorSetLayout,
) -> DeviceHandle<vk::DescriptorSetLayout> {
    DeviceHandle::new(device, layout, |d, h| unsafe { d.destroy_descriptor_set_layout(h, None) })
}

pub fn descriptor_pool(device: &ash::Device, pool: vk::DescriptorPool) -> DeviceHandle<vk::DescriptorPool> {
    DeviceHandle::new(device, pool, |d, h| unsafe { d.destroy_descriptor_pool(h, None) })
}

pub fn pipeline_layout(device: &ash::Device, layout: vk::PipelineLayout) -> DeviceHandle<vk::PipelineLayout> {
    DeviceHandle::new(device, layout, |d, h| unsafe { d.destroy_pipeline_layout(h, None) })
}

pub fn pipeline(device: &ash::Device, pipeline: vk::Pipeline) -> DeviceHandle<vk::Pipeline> {
    DeviceHandle::new(device, pipeline, |d, h| unsafe { d.destroy_pipeline(h, None) })
}

pub fn command_pool(device: &ash::Device, pool: vk::CommandPool) -> DeviceHandle<vk::CommandPool> {
    DeviceHandle::new(device, pool, |d, h| unsafe { d.destroy_command_pool(h, None) })
}
