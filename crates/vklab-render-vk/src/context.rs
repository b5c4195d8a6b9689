// SPDX-License-Identifier: CEPL-1.0
use crate::debug::DebugMessenger;
use anyhow::{anyhow, Context, Result};
use ash::khr::{surface, swapchain};
use ash::{vk, Entry};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle};
use std::ffi::{c_char, CStr};
use tracing::{info, warn};

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";
const APP_NAME: &CStr = c"vklab";

/// Queue family indices used for rendering and presentation. They may be the same family.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilies {
    pub fn is_shared(&self) -> bool {
        self.graphics == self.present
    }

    pub fn unique(&self) -> Vec<u32> {
        if self.is_shared() {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }
}

/// Picks a graphics family and a present family.
///
/// A single family that does both wins. Otherwise the first graphics family is
/// paired with the first family that can present.
pub fn pick_queue_families(
    props: &[vk::QueueFamilyProperties],
    mut supports_present: impl FnMut(u32) -> bool,
) -> Option<QueueFamilies> {
    let present: Vec<bool> = (0..props.len() as u32)
        .map(&mut supports_present)
        .collect();

    let graphics = |i: usize| props[i].queue_flags.contains(vk::QueueFlags::GRAPHICS);

    if let Some(i) = (0..props.len()).find(|&i| graphics(i) && present[i]) {
        return Some(QueueFamilies {
            graphics: i as u32,
            present: i as u32,
        });
    }
    let g = (0..props.len()).find(|&i| graphics(i))?;
    let p = (0..props.len()).find(|&i| present[i])?;
    Some(QueueFamilies {
        graphics: g as u32,
        present: p as u32,
    })
}

fn device_type_rank(ty: vk::PhysicalDeviceType) -> u32 {
    match ty {
        vk::PhysicalDeviceType::DISCRETE_GPU => 3,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 2,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 1,
        _ => 0,
    }
}

/// Owns the instance. Destroyed after everything created from it.
pub(crate) struct InstanceHandle(pub(crate) ash::Instance);

impl Drop for InstanceHandle {
    fn drop(&mut self) {
        unsafe { self.0.destroy_instance(None) };
    }
}

pub(crate) struct SurfaceHandle {
    loader: surface::Instance,
    pub(crate) handle: vk::SurfaceKHR,
}

impl Drop for SurfaceHandle {
    fn drop(&mut self) {
        unsafe { self.loader.destroy_surface(self.handle, None) };
    }
}

/// Instance, surface, logical device and queues. Everything else borrows from this,
/// so it is dropped last.
///
/// The device is destroyed in `Drop`; the instance-scoped owners follow in
/// field order: debug messenger, surface, instance.
pub struct DeviceContext {
    pub(crate) phys: vk::PhysicalDevice,
    pub(crate) families: QueueFamilies,
    pub(crate) device: ash::Device,
    pub(crate) graphics_queue: vk::Queue,
    pub(crate) present_queue: vk::Queue,
    pub(crate) swapchain_loader: swapchain::Device,
    /// `fillModeNonSolid` was available and enabled (wireframe rendering).
    pub(crate) fill_mode_non_solid: bool,
    pub(crate) device_name: String,

    debug: Option<DebugMessenger>,
    pub(crate) surface: SurfaceHandle,
    pub(crate) instance: InstanceHandle,
}

impl DeviceContext {
    pub unsafe fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        validation: bool,
    ) -> Result<Self> {
        // STRICT ORDER:
        // 1) instance (WSI extensions + optional debug utils)
        // 2) surface from this instance
        // 3) physical device + queue families checked against this surface
        // 4) logical device, queues, swapchain loader
        let dh = display
            .display_handle()
            .map_err(|e| anyhow!("{e}"))?
            .as_raw();
        let wh = window
            .window_handle()
            .map_err(|e| anyhow!("{e}"))?
            .as_raw();

        let entry = Entry::linked();
        let validation = validation && has_validation_layer(&entry);
        // Each owner is a local until the struct is assembled, so an early
        // return destroys what was already created in reverse order.
        let instance =
            InstanceHandle(create_instance(&entry, dh, validation).context("create_instance")?);

        let debug = if validation {
            Some(DebugMessenger::new(&entry, &instance.0)?)
        } else {
            None
        };

        let surface = SurfaceHandle {
            loader: surface::Instance::new(&entry, &instance.0),
            handle: ash_window::create_surface(&entry, &instance.0, dh, wh, None)
                .context("ash_window::create_surface")?,
        };

        let (phys, families) = pick_physical_device(&instance.0, &surface.loader, surface.handle)?;
        let props = instance.0.get_physical_device_properties(phys);
        let device_name = CStr::from_ptr(props.device_name.as_ptr())
            .to_string_lossy()
            .into_owned();
        let features = instance.0.get_physical_device_features(phys);
        let fill_mode_non_solid = features.fill_mode_non_solid == vk::TRUE;

        let device = create_device(&instance.0, phys, families, fill_mode_non_solid)?;
        let graphics_queue = device.get_device_queue(families.graphics, 0);
        let present_queue = device.get_device_queue(families.present, 0);
        let swapchain_loader = swapchain::Device::new(&instance.0, &device);

        info!(
            device = %device_name,
            graphics_family = families.graphics,
            present_family = families.present,
            validation,
            "vulkan device ready"
        );

        Ok(DeviceContext {
            phys,
            families,
            device,
            graphics_queue,
            present_queue,
            swapchain_loader,
            fill_mode_non_solid,
            device_name,
            debug,
            surface,
            instance,
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub(crate) unsafe fn surface_support(
        &self,
    ) -> Result<(
        vk::SurfaceCapabilitiesKHR,
        Vec<vk::SurfaceFormatKHR>,
        Vec<vk::PresentModeKHR>,
    )> {
        let (loader, surface) = (&self.surface.loader, self.surface.handle);
        let caps = loader
            .get_physical_device_surface_capabilities(self.phys, surface)
            .context("get_physical_device_surface_capabilities")?;
        let formats = loader
            .get_physical_device_surface_formats(self.phys, surface)
            .context("get_physical_device_surface_formats")?;
        let modes = loader
            .get_physical_device_surface_present_modes(self.phys, surface)
            .context("get_physical_device_surface_present_modes")?;
        Ok((caps, formats, modes))
    }

    pub(crate) unsafe fn memory_properties(&self) -> vk::PhysicalDeviceMemoryProperties {
        self.instance.0.get_physical_device_memory_properties(self.phys)
    }
}

impl Drop for DeviceContext {
    fn drop(&mut self) {
        unsafe { self.device.destroy_device(None) };
    }
}

unsafe fn has_validation_layer(entry: &Entry) -> bool {
    let found = entry
        .enumerate_instance_layer_properties()
        .unwrap_or_default()
        .iter()
        .any(|l| CStr::from_ptr(l.layer_name.as_ptr()) == VALIDATION_LAYER);
    if !found {
        warn!("validation requested but VK_LAYER_KHRONOS_validation is not installed");
    }
    found
}

unsafe fn create_instance(
    entry: &Entry,
    display_raw: RawDisplayHandle,
    validation: bool,
) -> Result<ash::Instance> {
    let app_info = vk::ApplicationInfo {
        s_type: vk::StructureType::APPLICATION_INFO,
        p_application_name: APP_NAME.as_ptr(),
        application_version: 0,
        p_engine_name: APP_NAME.as_ptr(),
        engine_version: 0,
        api_version: vk::API_VERSION_1_1,
        ..Default::default()
    };

    let mut extensions: Vec<*const c_char> = ash_window::enumerate_required_extensions(display_raw)
        .context("enumerate_required_extensions")?
        .to_vec();
    let mut layers: Vec<*const c_char> = Vec::new();
    if validation {
        extensions.push(ash::ext::debug_utils::NAME.as_ptr());
        layers.push(VALIDATION_LAYER.as_ptr());
    }

    let create_info = vk::InstanceCreateInfo {
        s_type: vk::StructureType::INSTANCE_CREATE_INFO,
        p_application_info: &app_info,
        enabled_extension_count: extensions.len() as u32,
        pp_enabled_extension_names: extensions.as_ptr(),
        enabled_layer_count: layers.len() as u32,
        pp_enabled_layer_names: layers.as_ptr(),
        ..Default::default()
    };

    Ok(entry.create_instance(&create_info, None)?)
}

unsafe fn supports_swapchain(instance: &ash::Instance, phys: vk::PhysicalDevice) -> bool {
    instance
        .enumerate_device_extension_properties(phys)
        .unwrap_or_default()
        .iter()
        .any(|e| CStr::from_ptr(e.extension_name.as_ptr()) == swapchain::NAME)
}

unsafe fn pick_physical_device(
    instance: &ash::Instance,
    surf_i: &surface::Instance,
    surface: vk::SurfaceKHR,
) -> Result<(vk::PhysicalDevice, QueueFamilies)> {
    let mut best: Option<(u32, vk::PhysicalDevice, QueueFamilies)> = None;

    for phys in instance
        .enumerate_physical_devices()
        .context("enumerate_physical_devices")?
    {
        if !supports_swapchain(instance, phys) {
            continue;
        }
        let qprops = instance.get_physical_device_queue_family_properties(phys);
        let Some(families) = pick_queue_families(&qprops, |i| {
            surf_i
                .get_physical_device_surface_support(phys, i, surface)
                .unwrap_or(false)
        }) else {
            continue;
        };

        let rank = device_type_rank(instance.get_physical_device_properties(phys).device_type);
        if best.as_ref().map_or(true, |(r, _, _)| rank > *r) {
            best = Some((rank, phys, families));
        }
    }

    best.map(|(_, phys, families)| (phys, families))
        .ok_or_else(|| anyhow!("no physical device with graphics + present support"))
}

unsafe fn create_device(
    instance: &ash::Instance,
    phys: vk::PhysicalDevice,
    families: QueueFamilies,
    fill_mode_non_solid: bool,
) -> Result<ash::Device> {
    let priorities = [1.0_f32];
    let queue_infos: Vec<vk::DeviceQueueCreateInfo> = families
        .unique()
        .into_iter()
        .map(|family| vk::DeviceQueueCreateInfo {
            s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
            queue_family_index: family,
            queue_count: 1,
            p_queue_priorities: priorities.as_ptr(),
            ..Default::default()
        })
        .collect();

    let features = vk::PhysicalDeviceFeatures {
        fill_mode_non_solid: if fill_mode_non_solid {
            vk::TRUE
        } else {
            vk::FALSE
        },
        ..Default::default()
    };
    let device_exts = [swapchain::NAME.as_ptr()];

    let dinfo = vk::DeviceCreateInfo {
        s_type: vk::StructureType::DEVICE_CREATE_INFO,
        queue_create_info_count: queue_infos.len() as u32,
        p_queue_create_infos: queue_infos.as_ptr(),
        enabled_extension_count: device_exts.len() as u32,
        pp_enabled_extension_names: device_exts.as_ptr(),
        p_enabled_features: &features,
        ..Default::default()
    };

    instance
        .create_device(phys, &dinfo, None)
        .context("create_device")
}
