/// Conversions from quadframe descriptions to Vulkan enums
///
/// Pure functions only; no device needed.

use ash::vk;
use gpu_allocator::MemoryLocation;
use quadframe::graphics_device::{
    Blend, BlendOp, CapabilityTier, ColorWriteMask, ComparisonFunc, CullMode,
    DescriptorRangeType, FillMode, Filter, Format, HeapProperties, HeapType, LogicOp,
    PrimitiveTopology, PrimitiveTopologyType, ResourceState, ShaderVisibility,
    StaticBorderColor, TextureAddressMode,
};

// ===== FORMATS =====

pub(crate) fn format_to_vk(format: Format) -> vk::Format {
    match format {
        Format::UNKNOWN => vk::Format::UNDEFINED,
        Format::R8G8B8A8_UNORM => vk::Format::R8G8B8A8_UNORM,
        Format::R8G8B8A8_UNORM_SRGB => vk::Format::R8G8B8A8_SRGB,
        Format::B8G8R8A8_UNORM => vk::Format::B8G8R8A8_UNORM,
        Format::B8G8R8A8_UNORM_SRGB => vk::Format::B8G8R8A8_SRGB,
        Format::R32G32B32A32_FLOAT => vk::Format::R32G32B32A32_SFLOAT,
        Format::R32G32_FLOAT => vk::Format::R32G32_SFLOAT,
        Format::R32G32B32_FLOAT => vk::Format::R32G32B32_SFLOAT,
        Format::R16_UINT => vk::Format::R16_UINT,
        Format::R32_UINT => vk::Format::R32_UINT,
    }
}

/// Inverse of `format_to_vk` for the formats a surface may report
pub(crate) fn format_from_vk(format: vk::Format) -> Option<Format> {
    match format {
        vk::Format::R8G8B8A8_UNORM => Some(Format::R8G8B8A8_UNORM),
        vk::Format::R8G8B8A8_SRGB => Some(Format::R8G8B8A8_UNORM_SRGB),
        vk::Format::B8G8R8A8_UNORM => Some(Format::B8G8R8A8_UNORM),
        vk::Format::B8G8R8A8_SRGB => Some(Format::B8G8R8A8_UNORM_SRGB),
        vk::Format::R32G32B32A32_SFLOAT => Some(Format::R32G32B32A32_FLOAT),
        _ => None,
    }
}

pub(crate) fn index_type(format: Format) -> Option<vk::IndexType> {
    match format {
        Format::R16_UINT => Some(vk::IndexType::UINT16),
        Format::R32_UINT => Some(vk::IndexType::UINT32),
        _ => None,
    }
}

// ===== CAPABILITY TIERS =====

/// A capability tier is the Vulkan API version it names
pub(crate) fn tier_api_version(tier: CapabilityTier) -> u32 {
    vk::make_api_version(0, tier.major, tier.minor, 0)
}

/// True when an implementation reporting `api_version` provides `tier`
pub(crate) fn api_version_supports(api_version: u32, tier: CapabilityTier) -> bool {
    let major = vk::api_version_major(api_version);
    let minor = vk::api_version_minor(api_version);
    (major, minor) >= (tier.major, tier.minor)
}

// ===== MEMORY =====

pub(crate) fn memory_location(heap: &HeapProperties) -> MemoryLocation {
    match heap.heap_type {
        HeapType::Default => MemoryLocation::GpuOnly,
        HeapType::Upload => MemoryLocation::CpuToGpu,
        HeapType::Readback => MemoryLocation::GpuToCpu,
        HeapType::Custom if heap.is_cpu_visible() => MemoryLocation::CpuToGpu,
        HeapType::Custom => MemoryLocation::GpuOnly,
    }
}

// ===== RESOURCE STATES =====

pub(crate) fn state_layout(state: ResourceState) -> vk::ImageLayout {
    match state {
        ResourceState::Common | ResourceState::GenericRead => vk::ImageLayout::GENERAL,
        ResourceState::Present => vk::ImageLayout::PRESENT_SRC_KHR,
        ResourceState::RenderTarget => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        ResourceState::PixelShaderResource => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        ResourceState::CopyDest => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
    }
}

pub(crate) fn state_access(state: ResourceState) -> vk::AccessFlags {
    match state {
        ResourceState::Common | ResourceState::Present => vk::AccessFlags::empty(),
        ResourceState::RenderTarget => {
            vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE
        }
        ResourceState::GenericRead => {
            vk::AccessFlags::VERTEX_ATTRIBUTE_READ
                | vk::AccessFlags::INDEX_READ
                | vk::AccessFlags::UNIFORM_READ
                | vk::AccessFlags::SHADER_READ
                | vk::AccessFlags::TRANSFER_READ
        }
        ResourceState::PixelShaderResource => vk::AccessFlags::SHADER_READ,
        ResourceState::CopyDest => vk::AccessFlags::TRANSFER_WRITE,
    }
}

pub(crate) fn state_stage(state: ResourceState) -> vk::PipelineStageFlags {
    match state {
        ResourceState::Common => vk::PipelineStageFlags::ALL_COMMANDS,
        ResourceState::Present => vk::PipelineStageFlags::BOTTOM_OF_PIPE,
        ResourceState::RenderTarget => vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        ResourceState::GenericRead => {
            vk::PipelineStageFlags::VERTEX_INPUT
                | vk::PipelineStageFlags::VERTEX_SHADER
                | vk::PipelineStageFlags::FRAGMENT_SHADER
        }
        ResourceState::PixelShaderResource => vk::PipelineStageFlags::FRAGMENT_SHADER,
        ResourceState::CopyDest => vk::PipelineStageFlags::TRANSFER,
    }
}

// ===== PIPELINE STATE =====

/// Vulkan pipelines bake the topology; a type maps to its list topology
pub(crate) fn topology_for_type(topology_type: PrimitiveTopologyType) -> vk::PrimitiveTopology {
    match topology_type {
        PrimitiveTopologyType::Point => vk::PrimitiveTopology::POINT_LIST,
        PrimitiveTopologyType::Line => vk::PrimitiveTopology::LINE_LIST,
        PrimitiveTopologyType::Triangle => vk::PrimitiveTopology::TRIANGLE_LIST,
    }
}

pub(crate) fn topology(topology: PrimitiveTopology) -> vk::PrimitiveTopology {
    match topology {
        PrimitiveTopology::PointList => vk::PrimitiveTopology::POINT_LIST,
        PrimitiveTopology::LineList => vk::PrimitiveTopology::LINE_LIST,
        PrimitiveTopology::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
        PrimitiveTopology::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
    }
}

pub(crate) fn polygon_mode(fill_mode: FillMode) -> vk::PolygonMode {
    match fill_mode {
        FillMode::Wireframe => vk::PolygonMode::LINE,
        FillMode::Solid => vk::PolygonMode::FILL,
    }
}

pub(crate) fn cull_mode(cull_mode: CullMode) -> vk::CullModeFlags {
    match cull_mode {
        CullMode::None => vk::CullModeFlags::NONE,
        CullMode::Front => vk::CullModeFlags::FRONT,
        CullMode::Back => vk::CullModeFlags::BACK,
    }
}

pub(crate) fn front_face(front_counter_clockwise: bool) -> vk::FrontFace {
    if front_counter_clockwise {
        vk::FrontFace::COUNTER_CLOCKWISE
    } else {
        vk::FrontFace::CLOCKWISE
    }
}

pub(crate) fn blend_factor(blend: Blend) -> vk::BlendFactor {
    match blend {
        Blend::Zero => vk::BlendFactor::ZERO,
        Blend::One => vk::BlendFactor::ONE,
        Blend::SrcAlpha => vk::BlendFactor::SRC_ALPHA,
        Blend::InvSrcAlpha => vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
    }
}

pub(crate) fn blend_op(op: BlendOp) -> vk::BlendOp {
    match op {
        BlendOp::Add => vk::BlendOp::ADD,
        BlendOp::Subtract => vk::BlendOp::SUBTRACT,
        BlendOp::RevSubtract => vk::BlendOp::REVERSE_SUBTRACT,
        BlendOp::Min => vk::BlendOp::MIN,
        BlendOp::Max => vk::BlendOp::MAX,
    }
}

pub(crate) fn logic_op(op: LogicOp) -> vk::LogicOp {
    match op {
        LogicOp::Noop => vk::LogicOp::NO_OP,
        LogicOp::Clear => vk::LogicOp::CLEAR,
        LogicOp::Copy => vk::LogicOp::COPY,
    }
}

pub(crate) fn color_write_mask(mask: ColorWriteMask) -> vk::ColorComponentFlags {
    let mut flags = vk::ColorComponentFlags::empty();
    if mask.contains(ColorWriteMask::RED) {
        flags |= vk::ColorComponentFlags::R;
    }
    if mask.contains(ColorWriteMask::GREEN) {
        flags |= vk::ColorComponentFlags::G;
    }
    if mask.contains(ColorWriteMask::BLUE) {
        flags |= vk::ColorComponentFlags::B;
    }
    if mask.contains(ColorWriteMask::ALPHA) {
        flags |= vk::ColorComponentFlags::A;
    }
    flags
}

pub(crate) fn sample_count(count: u32) -> Option<vk::SampleCountFlags> {
    match count {
        1 => Some(vk::SampleCountFlags::TYPE_1),
        2 => Some(vk::SampleCountFlags::TYPE_2),
        4 => Some(vk::SampleCountFlags::TYPE_4),
        8 => Some(vk::SampleCountFlags::TYPE_8),
        16 => Some(vk::SampleCountFlags::TYPE_16),
        _ => None,
    }
}

// ===== DESCRIPTORS AND SAMPLERS =====

pub(crate) fn descriptor_type(range_type: DescriptorRangeType) -> vk::DescriptorType {
    match range_type {
        DescriptorRangeType::Srv => vk::DescriptorType::SAMPLED_IMAGE,
        DescriptorRangeType::Uav => vk::DescriptorType::STORAGE_IMAGE,
        DescriptorRangeType::Cbv => vk::DescriptorType::UNIFORM_BUFFER,
        DescriptorRangeType::Sampler => vk::DescriptorType::SAMPLER,
    }
}

pub(crate) fn shader_stages(visibility: ShaderVisibility) -> vk::ShaderStageFlags {
    match visibility {
        ShaderVisibility::All => vk::ShaderStageFlags::ALL_GRAPHICS,
        ShaderVisibility::Vertex => vk::ShaderStageFlags::VERTEX,
        ShaderVisibility::Pixel => vk::ShaderStageFlags::FRAGMENT,
    }
}

/// Min/mag filter, mip mode and whether anisotropy is on
pub(crate) fn filter(filter: Filter) -> (vk::Filter, vk::SamplerMipmapMode, bool) {
    match filter {
        Filter::MinMagMipPoint => (vk::Filter::NEAREST, vk::SamplerMipmapMode::NEAREST, false),
        Filter::MinMagMipLinear => (vk::Filter::LINEAR, vk::SamplerMipmapMode::LINEAR, false),
        Filter::Anisotropic => (vk::Filter::LINEAR, vk::SamplerMipmapMode::LINEAR, true),
    }
}

pub(crate) fn address_mode(mode: TextureAddressMode) -> vk::SamplerAddressMode {
    match mode {
        TextureAddressMode::Wrap => vk::SamplerAddressMode::REPEAT,
        TextureAddressMode::Mirror => vk::SamplerAddressMode::MIRRORED_REPEAT,
        TextureAddressMode::Clamp => vk::SamplerAddressMode::CLAMP_TO_EDGE,
        TextureAddressMode::Border => vk::SamplerAddressMode::CLAMP_TO_BORDER,
    }
}

pub(crate) fn compare_op(func: ComparisonFunc) -> vk::CompareOp {
    match func {
        ComparisonFunc::Never => vk::CompareOp::NEVER,
        ComparisonFunc::Less => vk::CompareOp::LESS,
        ComparisonFunc::Equal => vk::CompareOp::EQUAL,
        ComparisonFunc::LessEqual => vk::CompareOp::LESS_OR_EQUAL,
        ComparisonFunc::Greater => vk::CompareOp::GREATER,
        ComparisonFunc::NotEqual => vk::CompareOp::NOT_EQUAL,
        ComparisonFunc::GreaterEqual => vk::CompareOp::GREATER_OR_EQUAL,
        ComparisonFunc::Always => vk::CompareOp::ALWAYS,
    }
}

pub(crate) fn border_color(color: StaticBorderColor) -> vk::BorderColor {
    match color {
        StaticBorderColor::TransparentBlack => vk::BorderColor::FLOAT_TRANSPARENT_BLACK,
        StaticBorderColor::OpaqueBlack => vk::BorderColor::FLOAT_OPAQUE_BLACK,
        StaticBorderColor::OpaqueWhite => vk::BorderColor::FLOAT_OPAQUE_WHITE,
    }
}

#[cfg(test)]
#[path = "vulkan_format_tests.rs"]
mod tests;
