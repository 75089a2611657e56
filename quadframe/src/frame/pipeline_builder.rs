/// PipelineBuilder - root signature and graphics pipeline state for the quad.

use crate::asset::quad_input_layout;
use crate::error::{Error, Result};
use crate::graphics_device::{
    BlendDesc, ComparisonFunc, CullMode, DescriptorRange, DescriptorRangeType, FillMode, Filter,
    Format, GraphicsDevice, GraphicsPipelineStateDesc, IndexBufferStripCutValue, PipelineState,
    PrimitiveTopologyType, RasterizerDesc, RootParameter, RootSignature, RootSignatureDesc,
    RootSignatureFlags, SampleDesc, ShaderBytecode, ShaderVisibility, StaticBorderColor,
    StaticSamplerDesc, TextureAddressMode, DEFAULT_SAMPLE_MASK,
};
use crate::{qf_error, qf_info};

const SOURCE: &str = "quadframe::PipelineBuilder";

/// Root parameter index of the texture table
pub const TEXTURE_ROOT_INDEX: u32 = 0;
/// Root parameter index of the constant-buffer table
pub const CONSTANT_ROOT_INDEX: u32 = 1;

/// Compiled binding layout and pipeline state
pub struct GraphicsPipeline {
    // Drop order: the pipeline before the root signature it was built against
    pub pipeline_state: Box<dyn PipelineState>,
    pub root_signature: Box<dyn RootSignature>,
}

/// Builds the quad pipeline from vertex and pixel byte code
pub struct PipelineBuilder<'a> {
    vertex_shader: &'a ShaderBytecode,
    pixel_shader: &'a ShaderBytecode,
    render_target_format: Format,
}

impl<'a> PipelineBuilder<'a> {
    pub fn new(vertex_shader: &'a ShaderBytecode, pixel_shader: &'a ShaderBytecode, render_target_format: Format) -> Self {
        Self { vertex_shader, pixel_shader, render_target_format }
    }

    /// Root signature layout: texture table (t0, pixel), constant table
    /// (b0, vertex) and a linear wrap sampler (s0, pixel)
    pub fn root_signature_desc() -> RootSignatureDesc {
        RootSignatureDesc {
            parameters: vec![
                RootParameter::DescriptorTable {
                    ranges: vec![DescriptorRange::new(DescriptorRangeType::Srv, 1, 0)],
                    visibility: ShaderVisibility::Pixel,
                },
                RootParameter::DescriptorTable {
                    ranges: vec![DescriptorRange::new(DescriptorRangeType::Cbv, 1, 0)],
                    visibility: ShaderVisibility::Vertex,
                },
            ],
            static_samplers: vec![StaticSamplerDesc {
                filter: Filter::MinMagMipLinear,
                address_u: TextureAddressMode::Wrap,
                address_v: TextureAddressMode::Wrap,
                address_w: TextureAddressMode::Wrap,
                mip_lod_bias: 0.0,
                max_anisotropy: 0,
                comparison_func: ComparisonFunc::Never,
                border_color: StaticBorderColor::TransparentBlack,
                min_lod: 0.0,
                max_lod: f32::MAX,
                shader_register: 0,
                register_space: 0,
                shader_visibility: ShaderVisibility::Pixel,
            }],
            flags: RootSignatureFlags::ALLOW_INPUT_ASSEMBLER_INPUT_LAYOUT,
        }
    }

    /// No culling, solid fill, depth clip on
    pub fn rasterizer_desc() -> RasterizerDesc {
        RasterizerDesc { cull_mode: CullMode::None, fill_mode: FillMode::Solid, ..RasterizerDesc::default() }
    }

    /// Serialize and create the root signature, then the pipeline state
    ///
    /// # Errors
    ///
    /// `Error::InitializationFailed` when a shader blob is empty or the root
    /// signature does not serialize; creation errors from the device are
    /// propagated.
    pub fn build(&self, device: &dyn GraphicsDevice) -> Result<GraphicsPipeline> {
        for (stage, code) in [("vertex", self.vertex_shader), ("pixel", self.pixel_shader)] {
            if code.is_empty() {
                qf_error!(SOURCE, "Empty {} shader byte code", stage);
                return Err(Error::InitializationFailed(format!("empty {} shader byte code", stage)));
            }
        }

        let serialized = Self::root_signature_desc().serialize().map_err(|text| {
            qf_error!(SOURCE, "Root signature serialization failed:\n{}", text);
            Error::InitializationFailed(format!("root signature serialization failed: {}", text))
        })?;
        let root_signature = device.create_root_signature(&serialized)?;

        let input_layout = quad_input_layout();
        let pipeline_state = {
            let desc = GraphicsPipelineStateDesc {
                root_signature: &*root_signature,
                vertex_shader: self.vertex_shader,
                pixel_shader: self.pixel_shader,
                blend_state: BlendDesc::default(),
                sample_mask: DEFAULT_SAMPLE_MASK,
                rasterizer_state: Self::rasterizer_desc(),
                input_layout: &input_layout,
                ib_strip_cut_value: IndexBufferStripCutValue::Disabled,
                primitive_topology_type: PrimitiveTopologyType::Triangle,
                render_target_formats: vec![self.render_target_format],
                sample_desc: SampleDesc::default(),
            };
            device.create_graphics_pipeline_state(&desc)?
        };

        qf_info!(
            SOURCE,
            "Pipeline built ({} -> {}, target {:?})",
            self.vertex_shader.entry_point,
            self.pixel_shader.entry_point,
            self.render_target_format
        );
        Ok(GraphicsPipeline { pipeline_state, root_signature })
    }
}

#[cfg(test)]
#[path = "pipeline_builder_tests.rs"]
mod tests;
