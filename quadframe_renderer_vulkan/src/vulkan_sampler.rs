/// Static samplers - VkSampler objects baked into a root signature's
/// pipeline layout as immutable samplers

use ash::vk;
use quadframe::graphics_device::StaticSamplerDesc;
use quadframe::{qf_err, qf_warn, Result};

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{address_mode, border_color, compare_op, filter};

const SOURCE: &str = "quadframe::vulkan";

pub(crate) fn create_static_sampler(ctx: &GpuContext, desc: &StaticSamplerDesc) -> Result<vk::Sampler> {
    let (filter, mipmap_mode, mut anisotropy) = filter(desc.filter);
    if anisotropy && !ctx.sampler_anisotropy {
        qf_warn!(SOURCE, "Anisotropic filtering unavailable on this device, using linear");
        anisotropy = false;
    }

    let max_lod = if desc.max_lod >= vk::LOD_CLAMP_NONE { vk::LOD_CLAMP_NONE } else { desc.max_lod };

    let create_info = vk::SamplerCreateInfo::default()
        .mag_filter(filter)
        .min_filter(filter)
        .mipmap_mode(mipmap_mode)
        .address_mode_u(address_mode(desc.address_u))
        .address_mode_v(address_mode(desc.address_v))
        .address_mode_w(address_mode(desc.address_w))
        .mip_lod_bias(desc.mip_lod_bias)
        .anisotropy_enable(anisotropy)
        .max_anisotropy(if anisotropy { desc.max_anisotropy as f32 } else { 1.0 })
        .compare_enable(false)
        .compare_op(compare_op(desc.comparison_func))
        .min_lod(desc.min_lod)
        .max_lod(max_lod)
        .border_color(border_color(desc.border_color))
        .unnormalized_coordinates(false);

    unsafe { ctx.device.create_sampler(&create_info, None) }
        .map_err(|e| qf_err!(SOURCE, "Failed to create static sampler s{}: {:?}", desc.shader_register, e))
}
