use ash::vk;
use std::borrow::Cow;
use std::ffi::{c_void, CStr};

use super::error::{GpuError, VkResultExt};

/// Minimum instance API version, as (major, minor)
pub const REQUIRED_API_VERSION: (u32, u32) = (1, 0);

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    msg_type: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user: *mut c_void,
) -> vk::Bool32 {
    let msg = if data.is_null() || (*data).p_message.is_null() {
        Cow::Borrowed("<empty>")
    } else {
        CStr::from_ptr((*data).p_message).to_string_lossy()
    };
    match severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => log::error!("[VK {msg_type:?}] {msg}"),
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => log::warn!("[VK {msg_type:?}] {msg}"),
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => log::debug!("[VK {msg_type:?}] {msg}"),
        _ => log::trace!("[VK {msg_type:?}] {msg}"),
    }
    vk::FALSE
}

/// True if a packed instance version is at least [`REQUIRED_API_VERSION`]
pub fn meets_required_version(version: u32) -> bool {
    let found = (vk::api_version_major(version), vk::api_version_minor(version));
    found >= REQUIRED_API_VERSION
}

struct DebugMessenger {
    loader: ash::ext::debug_utils::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
}

pub struct GpuInstance {
    debug: Option<DebugMessenger>,
    pub instance: ash::Instance,
}

impl GpuInstance {
    pub fn new(entry: &ash::Entry, validation: bool) -> Result<Self, GpuError> {
        let version = unsafe { entry.try_enumerate_instance_version() }
            .during("vkEnumerateInstanceVersion")?
            .unwrap_or(vk::API_VERSION_1_0);
        if !meets_required_version(version) {
            return Err(GpuError::ApiVersion {
                found_major: vk::api_version_major(version),
                found_minor: vk::api_version_minor(version),
                required_major: REQUIRED_API_VERSION.0,
                required_minor: REQUIRED_API_VERSION.1,
            });
        }
        log::debug!(
            "Vulkan instance version {}.{}.{}",
            vk::api_version_major(version),
            vk::api_version_minor(version),
            vk::api_version_patch(version)
        );

        let app_info = vk::ApplicationInfo::default()
            .application_name(c"rt-compute")
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(c"No Engine")
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::make_api_version(0, REQUIRED_API_VERSION.0, REQUIRED_API_VERSION.1, 0));

        let debug_enabled = validation && debug_support_available(entry);
        let layer_names: Vec<*const std::ffi::c_char> = if debug_enabled {
            vec![VALIDATION_LAYER.as_ptr()]
        } else {
            Vec::new()
        };
        let ext_names: Vec<*const std::ffi::c_char> = if debug_enabled {
            vec![ash::ext::debug_utils::NAME.as_ptr()]
        } else {
            Vec::new()
        };

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_layer_names(&layer_names)
            .enabled_extension_names(&ext_names);

        let instance = unsafe { entry.create_instance(&create_info, None) }.during("vkCreateInstance")?;
        let mut gpu_instance = GpuInstance {
            debug: None,
            instance,
        };

        if debug_enabled {
            let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
                .message_severity(
                    vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                        | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                        | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
                )
                .message_type(
                    vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                        | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                        | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
                )
                .pfn_user_callback(Some(debug_callback));
            let loader = ash::ext::debug_utils::Instance::new(entry, &gpu_instance.instance);
            match unsafe { loader.create_debug_utils_messenger(&debug_info, None) } {
                Ok(messenger) => gpu_instance.debug = Some(DebugMessenger { loader, messenger }),
                Err(e) => log::warn!("Debug messenger unavailable: {e}"),
            }
        } else if validation {
            log::warn!("Validation requested but VK_LAYER_KHRONOS_validation is not installed");
        }

        log::info!(
            "Vulkan instance created{}",
            if gpu_instance.debug.is_some() { " with validation" } else { "" }
        );
        Ok(gpu_instance)
    }
}

fn debug_support_available(entry: &ash::Entry) -> bool {
    let has_layer = unsafe { entry.enumerate_instance_layer_properties() }
        .map(|layers| {
            layers
                .iter()
                .any(|l| (unsafe { CStr::from_ptr(l.layer_name.as_ptr()) }) == VALIDATION_LAYER)
        })
        .unwrap_or(false);
    let has_ext = unsafe { entry.enumerate_instance_extension_properties(None) }
        .map(|exts| {
            exts.iter()
                .any(|e| (unsafe { CStr::from_ptr(e.extension_name.as_ptr()) }) == ash::ext::debug_utils::NAME)
        })
        .unwrap_or(false);
    has_layer && has_ext
}

impl Drop for GpuInstance {
    fn drop(&mut self) {
        unsafe {
            if let Some(debug) = self.debug.take() {
                debug
                    .loader
                    .destroy_debug_utils_messenger(debug.messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_check() {
        assert!(meets_required_version(vk::API_VERSION_1_0));
        assert!(meets_required_version(vk::API_VERSION_1_3));
        assert!(meets_required_version(vk::make_api_version(0, 2, 0, 0)));
        assert!(!meets_required_version(vk::make_api_version(0, 0, 9, 0)));
    }

    #[test]
    fn test_debug_support_query() {
        // Needs a Vulkan loader; without one there is nothing to query
        let Ok(entry) = (unsafe { ash::Entry::load() }) else {
            return;
        };
        let available = debug_support_available(&entry);
        if available {
            let layers = unsafe { entry.enumerate_instance_layer_properties() }.unwrap();
            assert!(layers
                .iter()
                .any(|l| (unsafe { CStr::from_ptr(l.layer_name.as_ptr()) }) == VALIDATION_LAYER));
        }
    }
}
