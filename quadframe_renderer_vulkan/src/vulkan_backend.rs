/// VulkanBackend - GraphicsBackend entry point
///
/// The instance is created lazily by the first device request, so the
/// validation layer can still be enabled beforehand. A capability tier
/// maps to a Vulkan API version: the loader and the physical device must
/// both report at least that version.

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use quadframe::config::Config;
use quadframe::graphics_device::{
    CapabilityTier, CommandQueue, GraphicsBackend, GraphicsDevice, GraphicsFactory, SwapChain,
    SwapChainDesc, WindowSurface,
};
use quadframe::{qf_bail, qf_debug, qf_err, qf_info, qf_warn, Error, Result};
use raw_window_handle::HasDisplayHandle;
use std::ffi::{c_char, CStr, CString};
use std::sync::Arc;

use crate::debug::{init_debug_config, severity_flags, vulkan_debug_callback, DebugConfig};
use crate::vulkan_command_queue::VulkanCommandQueue;
use crate::vulkan_context::{GpuContext, InstanceContext};
use crate::vulkan_device::VulkanDevice;
use crate::vulkan_format::{api_version_supports, tier_api_version};
use crate::vulkan_swapchain::VulkanSwapChain;

const SOURCE: &str = "quadframe::vulkan";

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Vulkan graphics backend
///
/// # Example
///
/// ```no_run
/// # fn run(window: &winit::window::Window) -> quadframe::Result<()> {
/// use quadframe::config::Config;
/// use quadframe_renderer_vulkan::VulkanBackend;
///
/// let config = Config::default();
/// let mut backend = VulkanBackend::new(window, &config)?;
/// # Ok(())
/// # }
/// ```
pub struct VulkanBackend {
    entry: ash::Entry,
    app_name: CString,
    /// Instance extensions the window system needs for surfaces
    surface_extensions: Vec<&'static CStr>,
    debug: DebugConfig,
    debug_layer: bool,
    instance: Option<Arc<InstanceContext>>,
    context: Option<Arc<GpuContext>>,
}

impl VulkanBackend {
    /// Load the Vulkan library
    ///
    /// # Arguments
    ///
    /// * `display` - Any handle to the display the windows will live on
    /// * `config` - Application name and validation settings are read here
    pub fn new<W: HasDisplayHandle + ?Sized>(display: &W, config: &Config) -> Result<Self> {
        let entry = unsafe { ash::Entry::load() }
            .map_err(|e| Error::InitializationFailed(format!("Failed to load Vulkan library: {}", e)))?;

        let display_handle = display
            .display_handle()
            .map_err(|e| Error::InitializationFailed(format!("Failed to get display handle: {}", e)))?;
        let surface_extensions = ash_window::enumerate_required_extensions(display_handle.as_raw())
            .map_err(|e| Error::InitializationFailed(format!("Failed to get required extensions: {:?}", e)))?
            .iter()
            .map(|&name| unsafe { CStr::from_ptr(name) })
            .collect();

        Ok(Self {
            entry,
            app_name: CString::new(config.app_name.replace('\0', "")).unwrap_or_default(),
            surface_extensions,
            debug: DebugConfig {
                severity: config.debug_severity,
                panic_on_error: config.panic_on_validation_error,
                enable_stats: config.enable_validation_stats,
            },
            debug_layer: false,
            instance: None,
            context: None,
        })
    }

    fn validation_layer_available(&self) -> Result<bool> {
        let layers = unsafe { self.entry.enumerate_instance_layer_properties() }
            .map_err(|e| qf_err!(SOURCE, "Failed to enumerate instance layers: {:?}", e))?;
        Ok(layers
            .iter()
            .any(|layer| layer.layer_name_as_c_str().is_ok_and(|name| name == VALIDATION_LAYER)))
    }

    fn instance(&mut self, api_version: u32) -> Result<Arc<InstanceContext>> {
        if let Some(instance) = &self.instance {
            return Ok(instance.clone());
        }
        let instance = Arc::new(self.create_instance(api_version)?);
        self.instance = Some(instance.clone());
        Ok(instance)
    }

    fn create_instance(&self, api_version: u32) -> Result<InstanceContext> {
        let app_info = vk::ApplicationInfo::default()
            .application_name(&self.app_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(c"quadframe")
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(api_version);

        let mut extension_names: Vec<*const c_char> =
            self.surface_extensions.iter().map(|name| name.as_ptr()).collect();
        let mut layer_names = Vec::new();
        if self.debug_layer {
            extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
            layer_names.push(VALIDATION_LAYER.as_ptr());
        }

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_layer_names(&layer_names)
            .enabled_extension_names(&extension_names);

        unsafe {
            let instance = self
                .entry
                .create_instance(&create_info, None)
                .map_err(|e| Error::InitializationFailed(format!("Failed to create instance: {:?}", e)))?;

            let (debug_utils_loader, debug_messenger) = if self.debug_layer {
                let debug_utils = ash::ext::debug_utils::Instance::new(&self.entry, &instance);
                init_debug_config(self.debug);

                let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
                    .message_severity(severity_flags(self.debug.severity))
                    .message_type(
                        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                            | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                            | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
                    )
                    .pfn_user_callback(Some(vulkan_debug_callback));

                match debug_utils.create_debug_utils_messenger(&debug_info, None) {
                    Ok(messenger) => (Some(debug_utils), Some(messenger)),
                    Err(e) => {
                        qf_warn!(SOURCE, "Failed to create debug messenger, validation output lost: {:?}", e);
                        crate::debug::cleanup_debug_config();
                        (None, None)
                    }
                }
            } else {
                (None, None)
            };

            let surface_loader = ash::khr::surface::Instance::new(&self.entry, &instance);
            Ok(InstanceContext {
                entry: self.entry.clone(),
                instance,
                surface_loader,
                api_version,
                debug_utils_loader,
                debug_messenger,
            })
        }
    }

    /// First physical device at `tier` with a graphics queue family
    fn pick_physical_device(
        instance: &ash::Instance,
        tier: CapabilityTier,
    ) -> Result<(vk::PhysicalDevice, u32, vk::PhysicalDeviceProperties)> {
        let physical_devices = unsafe { instance.enumerate_physical_devices() }
            .map_err(|e| qf_err!(SOURCE, "Failed to enumerate physical devices: {:?}", e))?;
        if physical_devices.is_empty() {
            return Err(Error::UnsupportedCapability("no Vulkan-capable GPU found".to_string()));
        }

        for physical_device in physical_devices {
            let properties = unsafe { instance.get_physical_device_properties(physical_device) };
            if !api_version_supports(properties.api_version, tier) {
                continue;
            }
            let queue_families = unsafe { instance.get_physical_device_queue_family_properties(physical_device) };
            let graphics_family = queue_families
                .iter()
                .position(|family| family.queue_flags.contains(vk::QueueFlags::GRAPHICS));
            if let Some(family) = graphics_family {
                return Ok((physical_device, family as u32, properties));
            }
        }
        Err(Error::UnsupportedCapability(format!("no GPU supports Vulkan {}", tier)))
    }

    fn create_context(
        instance: Arc<InstanceContext>,
        physical_device: vk::PhysicalDevice,
        graphics_family: u32,
    ) -> Result<GpuContext> {
        unsafe {
            let features = instance.instance.get_physical_device_features(physical_device);
            let sampler_anisotropy = features.sampler_anisotropy == vk::TRUE;

            let queue_priorities = [1.0];
            let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
                .queue_family_index(graphics_family)
                .queue_priorities(&queue_priorities)];
            let device_extension_names = [ash::khr::swapchain::NAME.as_ptr()];
            let device_features = vk::PhysicalDeviceFeatures::default().sampler_anisotropy(sampler_anisotropy);

            let device_create_info = vk::DeviceCreateInfo::default()
                .queue_create_infos(&queue_create_infos)
                .enabled_extension_names(&device_extension_names)
                .enabled_features(&device_features);

            let device = instance
                .instance
                .create_device(physical_device, &device_create_info, None)
                .map_err(|e| Error::InitializationFailed(format!("Failed to create device: {:?}", e)))?;

            let allocator = match Allocator::new(&AllocatorCreateDesc {
                instance: instance.instance.clone(),
                device: device.clone(),
                physical_device,
                debug_settings: Default::default(),
                buffer_device_address: false,
                allocation_sizes: Default::default(),
            }) {
                Ok(allocator) => allocator,
                Err(e) => {
                    device.destroy_device(None);
                    return Err(Error::InitializationFailed(format!("Failed to create allocator: {:?}", e)));
                }
            };

            let upload_pool_create_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(graphics_family)
                .flags(vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
            let upload_command_pool = match device.create_command_pool(&upload_pool_create_info, None) {
                Ok(pool) => pool,
                Err(e) => {
                    drop(allocator);
                    device.destroy_device(None);
                    return Err(Error::InitializationFailed(format!(
                        "Failed to create upload command pool: {:?}",
                        e
                    )));
                }
            };

            let graphics_queue = device.get_device_queue(graphics_family, 0);
            Ok(GpuContext::new(
                instance,
                physical_device,
                device,
                allocator,
                graphics_queue,
                graphics_family,
                sampler_anisotropy,
                upload_command_pool,
            ))
        }
    }
}

impl GraphicsBackend for VulkanBackend {
    fn name(&self) -> &str {
        "Vulkan"
    }

    fn enable_debug_layer(&mut self) -> Result<()> {
        if !cfg!(feature = "vulkan-validation") {
            return Err(Error::UnsupportedCapability(
                "built without the vulkan-validation feature".to_string(),
            ));
        }
        if self.instance.is_some() {
            qf_bail!(SOURCE, "The debug layer must be enabled before any device is created");
        }
        if !self.validation_layer_available()? {
            return Err(Error::UnsupportedCapability(format!(
                "{} is not installed",
                VALIDATION_LAYER.to_string_lossy()
            )));
        }
        self.debug_layer = true;
        Ok(())
    }

    fn create_device(&mut self, tier: CapabilityTier) -> Result<Box<dyn GraphicsDevice>> {
        if self.context.is_some() {
            qf_bail!(SOURCE, "A device already exists for this backend");
        }

        let loader_version = unsafe { self.entry.try_enumerate_instance_version() }
            .map_err(|e| qf_err!(SOURCE, "Failed to query the loader version: {:?}", e))?
            .unwrap_or(vk::API_VERSION_1_0);
        if !api_version_supports(loader_version, tier) {
            return Err(Error::UnsupportedCapability(format!(
                "Vulkan loader {}.{} is older than {}",
                vk::api_version_major(loader_version),
                vk::api_version_minor(loader_version),
                tier
            )));
        }

        let instance = self.instance(tier_api_version(tier))?;
        if !api_version_supports(instance.api_version, tier) {
            return Err(Error::UnsupportedCapability(format!(
                "instance was created for an API version below {}",
                tier
            )));
        }

        let (physical_device, graphics_family, properties) = Self::pick_physical_device(&instance.instance, tier)?;
        let device_name = properties
            .device_name_as_c_str()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        qf_debug!(
            SOURCE,
            "Using {} (Vulkan {}.{}), graphics family {}",
            device_name,
            vk::api_version_major(properties.api_version),
            vk::api_version_minor(properties.api_version),
            graphics_family
        );

        let ctx = Arc::new(Self::create_context(instance, physical_device, graphics_family)?);
        self.context = Some(ctx.clone());
        qf_info!(SOURCE, "Vulkan device created on {}", device_name);
        Ok(Box::new(VulkanDevice::new(ctx, tier)))
    }

    fn create_factory(&mut self, debug: bool) -> Result<Box<dyn GraphicsFactory>> {
        let Some(ctx) = &self.context else {
            qf_bail!(SOURCE, "Factory requested before any device was created");
        };
        if debug && !self.debug_layer {
            qf_warn!(SOURCE, "Debug factory requested without the validation layer");
        }
        Ok(Box::new(VulkanFactory {
            instance: ctx.instance.clone(),
            debug,
        }))
    }
}

/// Swap-chain factory for windows on the backend's instance
pub struct VulkanFactory {
    instance: Arc<InstanceContext>,
    debug: bool,
}

impl GraphicsFactory for VulkanFactory {
    fn is_debug(&self) -> bool {
        self.debug
    }

    fn create_swap_chain_for_window(
        &self,
        queue: &dyn CommandQueue,
        window: &dyn WindowSurface,
        desc: &SwapChainDesc,
    ) -> Result<Box<dyn SwapChain>> {
        let queue = queue
            .as_any()
            .downcast_ref::<VulkanCommandQueue>()
            .ok_or_else(|| Error::InvalidResource("queue is not a Vulkan command queue".to_string()))?;
        if !Arc::ptr_eq(&queue.context().instance, &self.instance) {
            return Err(Error::InvalidResource("queue belongs to another Vulkan instance".to_string()));
        }
        Ok(Box::new(VulkanSwapChain::new(
            queue.context().clone(),
            queue.queue,
            window,
            desc,
        )?))
    }
}
