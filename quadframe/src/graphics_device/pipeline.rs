/// Root signatures, static samplers, input layouts and graphics pipeline
/// state descriptions

use std::any::Any;

use bitflags::bitflags;

use crate::graphics_device::{Format, PrimitiveTopology};

// ===== SHADERS =====

/// Compiled shader byte code plus the entry point it was compiled for
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShaderBytecode {
    pub code: Vec<u8>,
    pub entry_point: String,
}

impl ShaderBytecode {
    pub fn new(code: Vec<u8>, entry_point: impl Into<String>) -> Self {
        Self { code, entry_point: entry_point.into() }
    }

    /// True when compilation produced nothing
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }
}

// ===== ROOT SIGNATURE =====

/// Shader stages a root parameter is visible to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderVisibility {
    All,
    Vertex,
    Pixel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorRangeType {
    Srv,
    Uav,
    Cbv,
    Sampler,
}

/// Range offset meaning "right after the previous range"
pub const DESCRIPTOR_RANGE_OFFSET_APPEND: u32 = u32::MAX;

/// A run of descriptors of one type inside a descriptor table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorRange {
    pub range_type: DescriptorRangeType,
    pub num_descriptors: u32,
    pub base_shader_register: u32,
    pub register_space: u32,
    pub offset_in_descriptors_from_table_start: u32,
}

impl DescriptorRange {
    /// `num_descriptors` descriptors starting at register `base_register`, space 0
    pub fn new(range_type: DescriptorRangeType, num_descriptors: u32, base_register: u32) -> Self {
        Self {
            range_type,
            num_descriptors,
            base_shader_register: base_register,
            register_space: 0,
            offset_in_descriptors_from_table_start: DESCRIPTOR_RANGE_OFFSET_APPEND,
        }
    }
}

/// One root parameter
#[derive(Debug, Clone, PartialEq)]
pub enum RootParameter {
    /// Table of descriptors bound through a GPU descriptor handle
    DescriptorTable {
        ranges: Vec<DescriptorRange>,
        visibility: ShaderVisibility,
    },
}

impl RootParameter {
    pub fn visibility(&self) -> ShaderVisibility {
        match self {
            RootParameter::DescriptorTable { visibility, .. } => *visibility,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    MinMagMipPoint,
    MinMagMipLinear,
    Anisotropic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureAddressMode {
    Wrap,
    Mirror,
    Clamp,
    Border,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonFunc {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StaticBorderColor {
    TransparentBlack,
    OpaqueBlack,
    OpaqueWhite,
}

/// Sampler baked into a root signature
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaticSamplerDesc {
    pub filter: Filter,
    pub address_u: TextureAddressMode,
    pub address_v: TextureAddressMode,
    pub address_w: TextureAddressMode,
    pub mip_lod_bias: f32,
    pub max_anisotropy: u32,
    pub comparison_func: ComparisonFunc,
    pub border_color: StaticBorderColor,
    pub min_lod: f32,
    pub max_lod: f32,
    pub shader_register: u32,
    pub register_space: u32,
    pub shader_visibility: ShaderVisibility,
}

bitflags! {
    /// Root signature flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RootSignatureFlags: u32 {
        /// The pipeline uses an input-assembler input layout
        const ALLOW_INPUT_ASSEMBLER_INPUT_LAYOUT = 0x1;
    }
}

/// Root signature description (binding layout of a pipeline)
#[derive(Debug, Clone, PartialEq)]
pub struct RootSignatureDesc {
    pub parameters: Vec<RootParameter>,
    pub static_samplers: Vec<StaticSamplerDesc>,
    pub flags: RootSignatureFlags,
}

/// A root signature description that passed serialization
#[derive(Debug, Clone, PartialEq)]
pub struct SerializedRootSignature {
    desc: RootSignatureDesc,
}

impl SerializedRootSignature {
    pub fn desc(&self) -> &RootSignatureDesc {
        &self.desc
    }
}

impl RootSignatureDesc {
    /// Validate the layout and freeze it for `create_root_signature`
    ///
    /// # Errors
    ///
    /// Returns the human-readable error text a backend would put in its
    /// error blob: empty tables, zero-sized ranges, sampler ranges mixed
    /// with view ranges, overlapping registers, bad LOD ranges.
    pub fn serialize(&self) -> std::result::Result<SerializedRootSignature, String> {
        let mut used: Vec<(DescriptorRangeType, u32, u32, u32)> = Vec::new();
        let mut claim = |range_type: DescriptorRangeType, space: u32, first: u32, count: u32| {
            for &(t, s, f, c) in &used {
                if t == range_type && s == space && first < f + c && f < first + count {
                    return Err(format!(
                        "{:?} registers {}..{} (space {}) overlap an earlier binding",
                        range_type,
                        first,
                        first + count,
                        space
                    ));
                }
            }
            used.push((range_type, space, first, count));
            Ok(())
        };

        for (index, parameter) in self.parameters.iter().enumerate() {
            match parameter {
                RootParameter::DescriptorTable { ranges, .. } => {
                    if ranges.is_empty() {
                        return Err(format!("root parameter {}: descriptor table has no ranges", index));
                    }
                    let has_sampler = ranges.iter().any(|r| r.range_type == DescriptorRangeType::Sampler);
                    let has_view = ranges.iter().any(|r| r.range_type != DescriptorRangeType::Sampler);
                    if has_sampler && has_view {
                        return Err(format!(
                            "root parameter {}: sampler ranges cannot share a table with view ranges",
                            index
                        ));
                    }
                    for range in ranges {
                        if range.num_descriptors == 0 {
                            return Err(format!("root parameter {}: descriptor range is empty", index));
                        }
                        claim(
                            range.range_type,
                            range.register_space,
                            range.base_shader_register,
                            range.num_descriptors,
                        )?;
                    }
                }
            }
        }

        for (index, sampler) in self.static_samplers.iter().enumerate() {
            if sampler.min_lod > sampler.max_lod {
                return Err(format!(
                    "static sampler {}: min LOD {} exceeds max LOD {}",
                    index, sampler.min_lod, sampler.max_lod
                ));
            }
            if sampler.filter == Filter::Anisotropic && !(1..=16).contains(&sampler.max_anisotropy) {
                return Err(format!(
                    "static sampler {}: max anisotropy {} outside 1..=16",
                    index, sampler.max_anisotropy
                ));
            }
            claim(DescriptorRangeType::Sampler, sampler.register_space, sampler.shader_register, 1)?;
        }

        Ok(SerializedRootSignature { desc: self.clone() })
    }
}

/// Compiled root signature
pub trait RootSignature: Send + Sync {
    fn parameter_count(&self) -> u32;

    /// For backend downcasts
    fn as_any(&self) -> &dyn Any;
}

// ===== INPUT LAYOUT =====

/// Byte offset meaning "right after the previous element in the same slot"
pub const APPEND_ALIGNED_ELEMENT: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputClassification {
    PerVertex,
    PerInstance,
}

/// One vertex attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputElementDesc {
    pub semantic_name: &'static str,
    pub semantic_index: u32,
    pub format: Format,
    pub input_slot: u32,
    pub aligned_byte_offset: u32,
    pub input_slot_class: InputClassification,
    pub instance_data_step_rate: u32,
}

impl InputElementDesc {
    /// Per-vertex element in slot 0 placed after the previous one
    pub fn per_vertex(semantic_name: &'static str, format: Format) -> Self {
        Self {
            semantic_name,
            semantic_index: 0,
            format,
            input_slot: 0,
            aligned_byte_offset: APPEND_ALIGNED_ELEMENT,
            input_slot_class: InputClassification::PerVertex,
            instance_data_step_rate: 0,
        }
    }
}

/// Resolve `APPEND_ALIGNED_ELEMENT` into concrete byte offsets
///
/// Returns one offset per element, in order. Offsets are tracked per input slot.
pub fn resolve_input_offsets(elements: &[InputElementDesc]) -> Vec<u32> {
    let mut slot_ends: Vec<(u32, u32)> = Vec::new();
    elements
        .iter()
        .map(|element| {
            let position = match slot_ends.iter().position(|(slot, _)| *slot == element.input_slot) {
                Some(position) => position,
                None => {
                    slot_ends.push((element.input_slot, 0));
                    slot_ends.len() - 1
                }
            };
            let end = &mut slot_ends[position].1;
            let offset = if element.aligned_byte_offset == APPEND_ALIGNED_ELEMENT {
                *end
            } else {
                element.aligned_byte_offset
            };
            *end = (*end).max(offset + element.format.size_bytes());
            offset
        })
        .collect()
}

/// Vertex stride of `slot` implied by the layout
pub fn input_slot_stride(elements: &[InputElementDesc], slot: u32) -> u32 {
    resolve_input_offsets(elements)
        .into_iter()
        .zip(elements)
        .filter(|(_, element)| element.input_slot == slot)
        .map(|(offset, element)| offset + element.format.size_bytes())
        .max()
        .unwrap_or(0)
}

// ===== FIXED-FUNCTION STATE =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillMode {
    Wireframe,
    Solid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    None,
    Front,
    Back,
}

/// Rasterizer state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterizerDesc {
    pub fill_mode: FillMode,
    pub cull_mode: CullMode,
    pub front_counter_clockwise: bool,
    pub depth_bias: i32,
    pub depth_bias_clamp: f32,
    pub slope_scaled_depth_bias: f32,
    pub depth_clip_enable: bool,
    pub multisample_enable: bool,
    pub antialiased_line_enable: bool,
}

impl Default for RasterizerDesc {
    /// Solid fill, back-face culling, clockwise front faces, depth clip on
    fn default() -> Self {
        Self {
            fill_mode: FillMode::Solid,
            cull_mode: CullMode::Back,
            front_counter_clockwise: false,
            depth_bias: 0,
            depth_bias_clamp: 0.0,
            slope_scaled_depth_bias: 0.0,
            depth_clip_enable: true,
            multisample_enable: false,
            antialiased_line_enable: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blend {
    Zero,
    One,
    SrcAlpha,
    InvSrcAlpha,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendOp {
    Add,
    Subtract,
    RevSubtract,
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    Noop,
    Clear,
    Copy,
}

bitflags! {
    /// Color channels written to a render target
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ColorWriteMask: u8 {
        const RED = 0x1;
        const GREEN = 0x2;
        const BLUE = 0x4;
        const ALPHA = 0x8;
        const ALL = Self::RED.bits() | Self::GREEN.bits() | Self::BLUE.bits() | Self::ALPHA.bits();
    }
}

/// Blend state of one render target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTargetBlendDesc {
    pub blend_enable: bool,
    pub logic_op_enable: bool,
    pub src_blend: Blend,
    pub dest_blend: Blend,
    pub blend_op: BlendOp,
    pub src_blend_alpha: Blend,
    pub dest_blend_alpha: Blend,
    pub blend_op_alpha: BlendOp,
    pub logic_op: LogicOp,
    pub render_target_write_mask: ColorWriteMask,
}

impl Default for RenderTargetBlendDesc {
    /// Opaque: no blending, no logic op, all channels written
    fn default() -> Self {
        Self {
            blend_enable: false,
            logic_op_enable: false,
            src_blend: Blend::One,
            dest_blend: Blend::Zero,
            blend_op: BlendOp::Add,
            src_blend_alpha: Blend::One,
            dest_blend_alpha: Blend::Zero,
            blend_op_alpha: BlendOp::Add,
            logic_op: LogicOp::Noop,
            render_target_write_mask: ColorWriteMask::ALL,
        }
    }
}

/// Maximum simultaneous render targets
pub const MAX_RENDER_TARGETS: usize = 8;

/// Blend state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlendDesc {
    pub alpha_to_coverage_enable: bool,
    pub independent_blend_enable: bool,
    pub render_target: [RenderTargetBlendDesc; MAX_RENDER_TARGETS],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexBufferStripCutValue {
    Disabled,
    Value0xFFFF,
    Value0xFFFFFFFF,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveTopologyType {
    Point,
    Line,
    Triangle,
}

impl PrimitiveTopologyType {
    /// True when `topology` can be drawn with a pipeline of this type
    pub fn accepts(&self, topology: PrimitiveTopology) -> bool {
        matches!(
            (self, topology),
            (PrimitiveTopologyType::Point, PrimitiveTopology::PointList)
                | (PrimitiveTopologyType::Line, PrimitiveTopology::LineList)
                | (PrimitiveTopologyType::Triangle, PrimitiveTopology::TriangleList)
                | (PrimitiveTopologyType::Triangle, PrimitiveTopology::TriangleStrip)
        )
    }
}

/// Multisampling parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleDesc {
    pub count: u32,
    pub quality: u32,
}

impl Default for SampleDesc {
    fn default() -> Self {
        Self { count: 1, quality: 0 }
    }
}

/// Sample mask enabling every sample
pub const DEFAULT_SAMPLE_MASK: u32 = u32::MAX;

/// Graphics pipeline state description (no depth/stencil)
pub struct GraphicsPipelineStateDesc<'a> {
    pub root_signature: &'a dyn RootSignature,
    pub vertex_shader: &'a ShaderBytecode,
    pub pixel_shader: &'a ShaderBytecode,
    pub blend_state: BlendDesc,
    pub sample_mask: u32,
    pub rasterizer_state: RasterizerDesc,
    pub input_layout: &'a [InputElementDesc],
    pub ib_strip_cut_value: IndexBufferStripCutValue,
    pub primitive_topology_type: PrimitiveTopologyType,
    /// One entry per render target
    pub render_target_formats: Vec<Format>,
    pub sample_desc: SampleDesc,
}

/// Compiled graphics pipeline
pub trait PipelineState: Send + Sync {
    fn primitive_topology_type(&self) -> PrimitiveTopologyType;

    /// For backend downcasts
    fn as_any(&self) -> &dyn Any;
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
