/// Root signatures and graphics pipelines on Vulkan
///
/// A root signature becomes a pipeline layout. Descriptor table `i` is set
/// `i` with one descriptor at binding 0; static samplers are immutable
/// samplers in the set after the last table, at binding = shader register.
/// Shaders must be SPIR-V compiled against that mapping.

use ash::vk;
use quadframe::graphics_device::{
    input_slot_stride, resolve_input_offsets, DescriptorRangeType, GraphicsPipelineStateDesc,
    InputClassification, PipelineState, PrimitiveTopologyType, RootParameter, RootSignature,
    SerializedRootSignature, ShaderBytecode,
};
use quadframe::{qf_err, qf_warn, Error, Result};
use std::any::Any;
use std::ffi::CString;
use std::io::Cursor;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{
    blend_factor, blend_op, color_write_mask, cull_mode, descriptor_type, format_to_vk, front_face,
    logic_op, polygon_mode, sample_count, shader_stages, topology_for_type,
};
use crate::vulkan_sampler::create_static_sampler;

const SOURCE: &str = "quadframe::vulkan";

pub struct VulkanRootSignature {
    ctx: Arc<GpuContext>,
    pub(crate) layout: vk::PipelineLayout,
    /// Descriptor type of each table, in root parameter order
    pub(crate) table_types: Vec<vk::DescriptorType>,
    samplers: Vec<vk::Sampler>,
    sampler_layout: vk::DescriptorSetLayout,
    sampler_pool: vk::DescriptorPool,
    /// Immutable-sampler set, bound at index `table_types.len()`
    pub(crate) sampler_set: Option<vk::DescriptorSet>,
}

impl VulkanRootSignature {
    pub(crate) fn new(ctx: Arc<GpuContext>, serialized: &SerializedRootSignature) -> Result<Self> {
        let desc = serialized.desc();

        // Partially built objects are destroyed by Drop on early return
        let mut signature = Self {
            ctx: ctx.clone(),
            layout: vk::PipelineLayout::null(),
            table_types: Vec::with_capacity(desc.parameters.len()),
            samplers: Vec::with_capacity(desc.static_samplers.len()),
            sampler_layout: vk::DescriptorSetLayout::null(),
            sampler_pool: vk::DescriptorPool::null(),
            sampler_set: None,
        };

        let mut set_layouts = Vec::with_capacity(desc.parameters.len() + 1);
        for (index, parameter) in desc.parameters.iter().enumerate() {
            let RootParameter::DescriptorTable { ranges, .. } = parameter;
            let range = match ranges.as_slice() {
                [range] if range.num_descriptors == 1 => range,
                _ => {
                    return Err(Error::UnsupportedCapability(format!(
                        "root parameter {}: the Vulkan backend binds exactly one descriptor per table",
                        index
                    )));
                }
            };
            if range.range_type == DescriptorRangeType::Sampler {
                return Err(Error::UnsupportedCapability(format!(
                    "root parameter {}: sampler tables are not supported, use static samplers",
                    index
                )));
            }
            let ty = descriptor_type(range.range_type);
            signature.table_types.push(ty);
            set_layouts.push(ctx.table_layout(ty)?);
        }

        if !desc.static_samplers.is_empty() {
            for sampler in &desc.static_samplers {
                let vk_sampler = create_static_sampler(&ctx, sampler)?;
                signature.samplers.push(vk_sampler);
            }

            let bindings: Vec<vk::DescriptorSetLayoutBinding> = desc
                .static_samplers
                .iter()
                .zip(&signature.samplers)
                .map(|(sampler, vk_sampler)| {
                    vk::DescriptorSetLayoutBinding::default()
                        .binding(sampler.shader_register)
                        .descriptor_type(vk::DescriptorType::SAMPLER)
                        .descriptor_count(1)
                        .stage_flags(shader_stages(sampler.shader_visibility))
                        .immutable_samplers(std::slice::from_ref(vk_sampler))
                })
                .collect();

            unsafe {
                let layout_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
                signature.sampler_layout = ctx
                    .device
                    .create_descriptor_set_layout(&layout_info, None)
                    .map_err(|e| qf_err!(SOURCE, "Failed to create static sampler set layout: {:?}", e))?;

                let pool_sizes = [vk::DescriptorPoolSize {
                    ty: vk::DescriptorType::SAMPLER,
                    descriptor_count: signature.samplers.len() as u32,
                }];
                let pool_info = vk::DescriptorPoolCreateInfo::default()
                    .max_sets(1)
                    .pool_sizes(&pool_sizes);
                signature.sampler_pool = ctx
                    .device
                    .create_descriptor_pool(&pool_info, None)
                    .map_err(|e| qf_err!(SOURCE, "Failed to create static sampler pool: {:?}", e))?;

                let layouts = [signature.sampler_layout];
                let alloc_info = vk::DescriptorSetAllocateInfo::default()
                    .descriptor_pool(signature.sampler_pool)
                    .set_layouts(&layouts);
                let sets = ctx
                    .device
                    .allocate_descriptor_sets(&alloc_info)
                    .map_err(|e| qf_err!(SOURCE, "Failed to allocate static sampler set: {:?}", e))?;
                signature.sampler_set = Some(sets[0]);
            }
            set_layouts.push(signature.sampler_layout);
        }

        let layout_info = vk::PipelineLayoutCreateInfo::default().set_layouts(&set_layouts);
        signature.layout = unsafe { ctx.device.create_pipeline_layout(&layout_info, None) }
            .map_err(|e| qf_err!(SOURCE, "Failed to create pipeline layout: {:?}", e))?;

        Ok(signature)
    }
}

impl RootSignature for VulkanRootSignature {
    fn parameter_count(&self) -> u32 {
        self.table_types.len() as u32
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanRootSignature {
    fn drop(&mut self) {
        unsafe {
            let device = &self.ctx.device;
            device.destroy_pipeline_layout(self.layout, None);
            device.destroy_descriptor_pool(self.sampler_pool, None);
            device.destroy_descriptor_set_layout(self.sampler_layout, None);
            for sampler in self.samplers.drain(..) {
                device.destroy_sampler(sampler, None);
            }
        }
    }
}

pub struct VulkanPipelineState {
    ctx: Arc<GpuContext>,
    pub(crate) pipeline: vk::Pipeline,
    primitive_topology_type: PrimitiveTopologyType,
}

fn create_shader_module(ctx: &GpuContext, shader: &ShaderBytecode) -> Result<vk::ShaderModule> {
    let code = ash::util::read_spv(&mut Cursor::new(&shader.code)).map_err(|e| {
        Error::InitializationFailed(format!("{}: byte code is not SPIR-V: {}", shader.entry_point, e))
    })?;
    let create_info = vk::ShaderModuleCreateInfo::default().code(&code);
    unsafe { ctx.device.create_shader_module(&create_info, None) }
        .map_err(|e| qf_err!(SOURCE, "Failed to create shader module {}: {:?}", shader.entry_point, e))
}

impl VulkanPipelineState {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &GraphicsPipelineStateDesc<'_>) -> Result<Self> {
        let root_signature = desc
            .root_signature
            .as_any()
            .downcast_ref::<VulkanRootSignature>()
            .ok_or_else(|| Error::InvalidResource("root signature is not a Vulkan root signature".to_string()))?;

        let target_format = match desc.render_target_formats.as_slice() {
            [format] => *format,
            formats => {
                return Err(Error::UnsupportedCapability(format!(
                    "the Vulkan backend renders to exactly one target, got {}",
                    formats.len()
                )));
            }
        };
        let samples = sample_count(desc.sample_desc.count).ok_or_else(|| {
            Error::UnsupportedCapability(format!("{} samples per pixel", desc.sample_desc.count))
        })?;
        let render_pass = ctx.render_pass(format_to_vk(target_format))?;

        let vertex_entry = CString::new(desc.vertex_shader.entry_point.as_str())
            .map_err(|_| Error::InitializationFailed("vertex entry point contains a NUL byte".to_string()))?;
        let pixel_entry = CString::new(desc.pixel_shader.entry_point.as_str())
            .map_err(|_| Error::InitializationFailed("pixel entry point contains a NUL byte".to_string()))?;

        let vertex_module = create_shader_module(&ctx, desc.vertex_shader)?;
        let pixel_module = match create_shader_module(&ctx, desc.pixel_shader) {
            Ok(module) => module,
            Err(e) => {
                unsafe { ctx.device.destroy_shader_module(vertex_module, None) };
                return Err(e);
            }
        };

        let stages = [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vertex_module)
                .name(&vertex_entry),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(pixel_module)
                .name(&pixel_entry),
        ];

        // Vertex input
        let offsets = resolve_input_offsets(desc.input_layout);
        let mut bindings: Vec<vk::VertexInputBindingDescription> = Vec::new();
        for element in desc.input_layout {
            if bindings.iter().any(|b| b.binding == element.input_slot) {
                continue;
            }
            let input_rate = match element.input_slot_class {
                InputClassification::PerVertex => vk::VertexInputRate::VERTEX,
                InputClassification::PerInstance => vk::VertexInputRate::INSTANCE,
            };
            bindings.push(vk::VertexInputBindingDescription {
                binding: element.input_slot,
                stride: input_slot_stride(desc.input_layout, element.input_slot),
                input_rate,
            });
        }
        let attributes: Vec<vk::VertexInputAttributeDescription> = desc
            .input_layout
            .iter()
            .zip(&offsets)
            .enumerate()
            .map(|(location, (element, &offset))| vk::VertexInputAttributeDescription {
                location: location as u32,
                binding: element.input_slot,
                format: format_to_vk(element.format),
                offset,
            })
            .collect();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(topology_for_type(desc.primitive_topology_type))
            .primitive_restart_enable(false);

        // Viewport and scissor are dynamic
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let raster = &desc.rasterizer_state;
        if !raster.depth_clip_enable {
            qf_warn!(SOURCE, "Depth clip cannot be disabled on the Vulkan backend");
        }
        let depth_bias_enable = raster.depth_bias != 0 || raster.slope_scaled_depth_bias != 0.0;
        let rasterizer = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(polygon_mode(raster.fill_mode))
            .cull_mode(cull_mode(raster.cull_mode))
            .front_face(front_face(raster.front_counter_clockwise))
            .depth_bias_enable(depth_bias_enable)
            .depth_bias_constant_factor(raster.depth_bias as f32)
            .depth_bias_clamp(raster.depth_bias_clamp)
            .depth_bias_slope_factor(raster.slope_scaled_depth_bias)
            .line_width(1.0);

        let sample_mask = [desc.sample_mask];
        let multisampling = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(samples)
            .sample_shading_enable(false)
            .sample_mask(&sample_mask)
            .alpha_to_coverage_enable(desc.blend_state.alpha_to_coverage_enable);

        let target = &desc.blend_state.render_target[0];
        let color_blend_attachments = [vk::PipelineColorBlendAttachmentState::default()
            .blend_enable(target.blend_enable)
            .src_color_blend_factor(blend_factor(target.src_blend))
            .dst_color_blend_factor(blend_factor(target.dest_blend))
            .color_blend_op(blend_op(target.blend_op))
            .src_alpha_blend_factor(blend_factor(target.src_blend_alpha))
            .dst_alpha_blend_factor(blend_factor(target.dest_blend_alpha))
            .alpha_blend_op(blend_op(target.blend_op_alpha))
            .color_write_mask(color_write_mask(target.render_target_write_mask))];
        let color_blending = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(target.logic_op_enable)
            .logic_op(logic_op(target.logic_op))
            .attachments(&color_blend_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .color_blend_state(&color_blending)
            .dynamic_state(&dynamic_state)
            .layout(root_signature.layout)
            .render_pass(render_pass)
            .subpass(0);

        let result = unsafe {
            ctx.device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
        };

        unsafe {
            ctx.device.destroy_shader_module(vertex_module, None);
            ctx.device.destroy_shader_module(pixel_module, None);
        }

        let pipeline = result.map_err(|e| qf_err!(SOURCE, "Failed to create graphics pipeline: {:?}", e.1))?[0];

        Ok(Self {
            ctx,
            pipeline,
            primitive_topology_type: desc.primitive_topology_type,
        })
    }
}

impl PipelineState for VulkanPipelineState {
    fn primitive_topology_type(&self) -> PrimitiveTopologyType {
        self.primitive_topology_type
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanPipelineState {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_pipeline(self.pipeline, None);
        }
    }
}
