//! Vulkan instance for off-screen rendering.
//!
//! No surface or window-system extensions are requested. With validation
//! enabled, the Khronos layer is loaded (if installed) and its messages are
//! forwarded to `tracing` under the `vulkan` target.
//!
//! # Example
//!
//! ```no_run
//! use renderer_rhi::instance::Instance;
//!
//! let instance = Instance::new(cfg!(debug_assertions)).expect("Vulkan instance");
//! println!("validation active: {}", instance.has_validation());
//! ```

use std::borrow::Cow;
use std::ffi::{CStr, c_char, c_void};

use ash::{Entry, vk};
use tracing::{Level, debug, info, warn};

use crate::error::RhiResult;

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Debug-utils loader and the messenger created through it.
struct DebugMessenger {
    loader: ash::ext::debug_utils::Instance,
    handle: vk::DebugUtilsMessengerEXT,
}

impl DebugMessenger {
    fn new(entry: &Entry, instance: &ash::Instance) -> RhiResult<Self> {
        let loader = ash::ext::debug_utils::Instance::new(entry, instance);
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(forward_to_tracing));

        let handle = unsafe { loader.create_debug_utils_messenger(&create_info, None)? };
        Ok(Self { loader, handle })
    }

    /// # Safety
    ///
    /// Must run before the owning instance is destroyed.
    unsafe fn destroy(&self) {
        unsafe {
            self.loader
                .destroy_debug_utils_messenger(self.handle, None)
        };
    }
}

/// Vulkan instance with an optional validation messenger.
pub struct Instance {
    entry: Entry,
    instance: ash::Instance,
    messenger: Option<DebugMessenger>,
}

impl Instance {
    /// Loads Vulkan and creates a 1.3 instance.
    ///
    /// A missing validation layer is not an error; a warning is logged and
    /// the instance is created without it.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::LoadingError`](crate::RhiError::LoadingError) if no
    /// Vulkan loader is installed, or a Vulkan error if creation fails.
    pub fn new(enable_validation: bool) -> RhiResult<Self> {
        let entry = unsafe { Entry::load()? };

        let validation = enable_validation && validation_layer_present(&entry)?;
        if enable_validation && !validation {
            warn!("Validation requested but {:?} is not installed", VALIDATION_LAYER);
        }

        let app_info = vk::ApplicationInfo::default()
            .application_name(c"frame-resource renderer")
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(c"renderer-rs")
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_3);

        let extensions = instance_extensions(validation);
        let layers: Vec<*const c_char> = if validation {
            vec![VALIDATION_LAYER.as_ptr()]
        } else {
            Vec::new()
        };

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers);
        let instance = unsafe { entry.create_instance(&create_info, None)? };

        let messenger = if validation {
            match DebugMessenger::new(&entry, &instance) {
                Ok(messenger) => Some(messenger),
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        info!(
            "Vulkan 1.3 instance created (validation {})",
            if validation { "on" } else { "off" }
        );

        Ok(Self {
            entry,
            instance,
            messenger,
        })
    }

    #[inline]
    pub fn handle(&self) -> &ash::Instance {
        &self.instance
    }

    #[inline]
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Whether validation messages are being forwarded.
    #[inline]
    pub fn has_validation(&self) -> bool {
        self.messenger.is_some()
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        unsafe {
            if let Some(messenger) = self.messenger.take() {
                messenger.destroy();
            }
            self.instance.destroy_instance(None);
        }
        debug!("Vulkan instance destroyed");
    }
}

/// Instance extensions; only debug utils, and only with validation.
fn instance_extensions(validation: bool) -> Vec<*const c_char> {
    if validation {
        vec![ash::ext::debug_utils::NAME.as_ptr()]
    } else {
        Vec::new()
    }
}

fn validation_layer_present(entry: &Entry) -> RhiResult<bool> {
    let layers = unsafe { entry.enumerate_instance_layer_properties()? };
    Ok(layers
        .iter()
        .any(|layer| layer.layer_name_as_c_str().is_ok_and(|name| name == VALIDATION_LAYER)))
}

/// Tracing level a validation message is logged at.
fn severity_level(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> Level {
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        Level::ERROR
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        Level::WARN
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        Level::INFO
    } else {
        Level::DEBUG
    }
}

fn message_kind(kind: vk::DebugUtilsMessageTypeFlagsEXT) -> &'static str {
    if kind.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "validation"
    } else if kind.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "performance"
    } else {
        "general"
    }
}

unsafe extern "system" fn forward_to_tracing(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    kind: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut c_void,
) -> vk::Bool32 {
    let message = match unsafe { data.as_ref() } {
        Some(data) if !data.p_message.is_null() => unsafe {
            CStr::from_ptr(data.p_message).to_string_lossy()
        },
        _ => Cow::Borrowed("(no message)"),
    };
    let kind = message_kind(kind);

    let level = severity_level(severity);
    if level == Level::ERROR {
        tracing::error!(target: "vulkan", "[{}] {}", kind, message);
    } else if level == Level::WARN {
        tracing::warn!(target: "vulkan", "[{}] {}", kind, message);
    } else if level == Level::INFO {
        tracing::info!(target: "vulkan", "[{}] {}", kind, message);
    } else {
        tracing::debug!(target: "vulkan", "[{}] {}", kind, message);
    }

    // Never abort the call that triggered the message.
    vk::FALSE
}
