use ash::vk;
use std::ffi::CStr;

use super::error::{GpuError, VkResultExt};
use super::instance::GpuInstance;

/// Storage image format; the shader swizzles so host bytes read as ARGB32
pub const OUTPUT_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;

/// Memory property sets tried in order for the host-readable output image
pub const OUTPUT_MEMORY_PREFERENCES: [vk::MemoryPropertyFlags; 2] = [
    vk::MemoryPropertyFlags::from_raw(
        vk::MemoryPropertyFlags::DEVICE_LOCAL.as_raw()
            | vk::MemoryPropertyFlags::HOST_VISIBLE.as_raw()
            | vk::MemoryPropertyFlags::HOST_COHERENT.as_raw(),
    ),
    vk::MemoryPropertyFlags::from_raw(
        vk::MemoryPropertyFlags::HOST_VISIBLE.as_raw() | vk::MemoryPropertyFlags::HOST_COHERENT.as_raw(),
    ),
];

/// Pick `(device index, queue family index)` for compute work.
///
/// Considers every compute-capable family on every device and keeps the one
/// with the most queues; on a tie the first one found wins.
pub fn select_compute_queue(devices: &[Vec<vk::QueueFamilyProperties>]) -> Option<(usize, u32)> {
    let mut best: Option<(usize, u32, u32)> = None;
    for (device_index, families) in devices.iter().enumerate() {
        for (family_index, family) in families.iter().enumerate() {
            if family.queue_count == 0 || !family.queue_flags.contains(vk::QueueFlags::COMPUTE) {
                continue;
            }
            if best.map_or(true, |(_, _, count)| family.queue_count > count) {
                best = Some((device_index, family_index as u32, family.queue_count));
            }
        }
    }
    best.map(|(device, family, _)| (device, family))
}

/// First memory type allowed by `type_bits` that has all of `required`
pub fn find_memory_type(
    properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    required: vk::MemoryPropertyFlags,
) -> Option<u32> {
    (0..properties.memory_type_count).find(|&i| {
        type_bits & (1 << i) != 0
            && properties.memory_types[i as usize]
                .property_flags
                .contains(required)
    })
}

/// Walk [`OUTPUT_MEMORY_PREFERENCES`] until one property set is satisfiable
pub fn pick_output_memory_type(properties: &vk::PhysicalDeviceMemoryProperties, type_bits: u32) -> Option<u32> {
    OUTPUT_MEMORY_PREFERENCES
        .iter()
        .find_map(|&flags| find_memory_type(properties, type_bits, flags))
}

pub struct GpuDevice {
    pub device: ash::Device,
    pub physical_device: vk::PhysicalDevice,
    pub queue: vk::Queue,
    pub queue_family_index: u32,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    pub name: String,
}

impl GpuDevice {
    pub fn new(gpu_instance: &GpuInstance) -> Result<Self, GpuError> {
        let instance = &gpu_instance.instance;

        let physical_devices =
            unsafe { instance.enumerate_physical_devices() }.during("vkEnumeratePhysicalDevices")?;
        let families: Vec<Vec<vk::QueueFamilyProperties>> = physical_devices
            .iter()
            .map(|&pd| unsafe { instance.get_physical_device_queue_family_properties(pd) })
            .collect();

        let (device_index, queue_family_index) =
            select_compute_queue(&families).ok_or(GpuError::NoComputeDevice)?;
        let physical_device = physical_devices[device_index];

        let props = unsafe { instance.get_physical_device_properties(physical_device) };
        let name = unsafe { CStr::from_ptr(props.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned();
        log::info!(
            "Selected GPU: {} (queue family {}, {} queues)",
            name,
            queue_family_index,
            families[device_index][queue_family_index as usize].queue_count
        );

        let format_props =
            unsafe { instance.get_physical_device_format_properties(physical_device, OUTPUT_FORMAT) };
        if !format_props
            .linear_tiling_features
            .contains(vk::FormatFeatureFlags::STORAGE_IMAGE)
        {
            return Err(GpuError::FormatUnsupported(OUTPUT_FORMAT));
        }

        let priorities = [1.0f32];
        let queue_info = vk::DeviceQueueCreateInfo::default()
            .queue_family_index(queue_family_index)
            .queue_priorities(&priorities);
        let device_info = vk::DeviceCreateInfo::default().queue_create_infos(std::slice::from_ref(&queue_info));

        let device =
            unsafe { instance.create_device(physical_device, &device_info, None) }.during("vkCreateDevice")?;
        let queue = unsafe { device.get_device_queue(queue_family_index, 0) };
        let memory_properties = unsafe { instance.get_physical_device_memory_properties(physical_device) };

        Ok(GpuDevice {
            device,
            physical_device,
            queue,
            queue_family_index,
            memory_properties,
            name,
        })
    }
}

impl Drop for GpuDevice {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                log::warn!("vkDeviceWaitIdle failed during teardown: {e}");
            }
            self.device.destroy_device(None);
        }
    }
}
