/// ResourceUploader - GPU-visible buffers, the texture and their views.
///
/// Owns the shader-visible descriptor heap. Slot 0 holds the texture
/// SRV, slot 1 the constant-buffer CBV. Everything is written once at
/// startup and only read by the GPU afterwards.

use bytemuck::Pod;
use glam::Mat4;

use crate::asset::DecodedImage;
use crate::error::{Error, Result};
use crate::graphics_device::{
    write_mapped, ConstantBufferViewDesc, DescriptorHeap, DescriptorHeapDesc, DescriptorHeapKind,
    Format, GpuDescriptorHandle, GraphicsDevice, HeapProperties, IndexBufferView, Resource,
    ResourceDesc, ResourceState, ShaderResourceViewDesc, VertexBufferView,
};
use crate::{qf_bail, qf_debug};

const SOURCE: &str = "quadframe::ResourceUploader";

/// Shader-visible heap slot of the texture SRV
pub const TEXTURE_SLOT: u32 = 0;
/// Shader-visible heap slot of the constant-buffer CBV
pub const CONSTANT_SLOT: u32 = 1;
const SHADER_HEAP_CAPACITY: u32 = 2;

/// Constant buffers are sized in multiples of 256 bytes
pub const CONSTANT_BUFFER_ALIGNMENT: u64 = 256;

/// Round `size` up to the constant-buffer alignment
pub fn align_constant_buffer_size(size: u64) -> u64 {
    (size + 0xff) & !0xff
}

/// Byte size of a buffer view; views address at most 4 GiB
pub fn view_size(size: u64, what: &str) -> Result<u32> {
    u32::try_from(size).map_err(|_| {
        Error::InvalidResource(format!("{} of {} bytes does not fit a buffer view", what, size))
    })
}

/// Uploaded vertex buffer and its binding
pub struct VertexBuffer {
    pub resource: Box<dyn Resource>,
    pub view: VertexBufferView,
}

/// Uploaded index buffer and its binding
pub struct IndexBuffer {
    pub resource: Box<dyn Resource>,
    pub view: IndexBufferView,
}

pub struct ResourceUploader {
    heap: Box<dyn DescriptorHeap>,
    gpu_start: GpuDescriptorHandle,
    increment: u32,
    texture: Option<Box<dyn Resource>>,
    constant_buffer: Option<Box<dyn Resource>>,
}

impl ResourceUploader {
    /// Create the shader-visible CBV/SRV heap (two slots)
    pub fn new(device: &dyn GraphicsDevice) -> Result<Self> {
        let heap = device.create_descriptor_heap(&DescriptorHeapDesc::shader_visible(SHADER_HEAP_CAPACITY))?;
        let Some(gpu_start) = heap.gpu_descriptor_handle_for_heap_start() else {
            qf_bail!(SOURCE, "Shader-visible heap has no GPU handle");
        };
        let increment = device.descriptor_handle_increment_size(DescriptorHeapKind::CbvSrvUav);
        Ok(Self { heap, gpu_start, increment, texture: None, constant_buffer: None })
    }

    /// Create an upload-heap buffer holding `data`
    ///
    /// The buffer is created in `ResourceState::GenericRead`, mapped, filled
    /// and unmapped.
    pub fn upload_buffer(device: &dyn GraphicsDevice, data: &[u8]) -> Result<Box<dyn Resource>> {
        if data.is_empty() {
            qf_bail!(SOURCE, "Cannot upload an empty buffer");
        }
        let resource = device.create_committed_resource(
            &HeapProperties::upload(),
            &ResourceDesc::buffer(data.len() as u64),
            ResourceState::GenericRead,
        )?;
        write_mapped(&*resource, data)?;
        Ok(resource)
    }

    /// Upload vertices and build the vertex-buffer view
    ///
    /// # Example
    ///
    /// ```no_run
    /// # fn run(device: &dyn quadframe::graphics_device::GraphicsDevice) -> quadframe::Result<()> {
    /// use quadframe::asset::QUAD_VERTICES;
    /// use quadframe::frame::ResourceUploader;
    ///
    /// let vertices = ResourceUploader::upload_vertex_buffer(device, &QUAD_VERTICES)?;
    /// assert_eq!(vertices.view.stride_in_bytes, 20);
    /// # Ok(())
    /// # }
    /// ```
    pub fn upload_vertex_buffer<V: Pod>(device: &dyn GraphicsDevice, vertices: &[V]) -> Result<VertexBuffer> {
        let bytes: &[u8] = bytemuck::cast_slice(vertices);
        let size_in_bytes = view_size(bytes.len() as u64, "vertex buffer")?;
        let stride_in_bytes = view_size(std::mem::size_of::<V>() as u64, "vertex stride")?;
        let resource = Self::upload_buffer(device, bytes)?;
        let view = VertexBufferView {
            buffer_location: resource.gpu_virtual_address(),
            size_in_bytes,
            stride_in_bytes,
        };
        qf_debug!(SOURCE, "Vertex buffer: {} vertices at {:#x}", vertices.len(), view.buffer_location);
        Ok(VertexBuffer { resource, view })
    }

    /// Upload 16-bit indices and build the index-buffer view
    pub fn upload_index_buffer(device: &dyn GraphicsDevice, indices: &[u16]) -> Result<IndexBuffer> {
        let bytes: &[u8] = bytemuck::cast_slice(indices);
        let size_in_bytes = view_size(bytes.len() as u64, "index buffer")?;
        let resource = Self::upload_buffer(device, bytes)?;
        let view = IndexBufferView {
            buffer_location: resource.gpu_virtual_address(),
            size_in_bytes,
            format: Format::R16_UINT,
        };
        qf_debug!(SOURCE, "Index buffer: {} indices at {:#x}", indices.len(), view.buffer_location);
        Ok(IndexBuffer { resource, view })
    }

    /// Create the texture from decoded rows and its SRV in slot 0
    ///
    /// The texture lives in a CPU write-back custom heap, so the rows are
    /// written directly without a staging copy.
    pub fn upload_texture(&mut self, device: &dyn GraphicsDevice, image: &DecodedImage) -> Result<()> {
        let metadata = image.metadata();
        let desc = ResourceDesc::texture_2d(
            metadata.width,
            metadata.height,
            metadata.format,
            metadata.array_size,
            metadata.mip_levels,
        );
        let texture = device.create_committed_resource(
            &HeapProperties::custom_write_back(),
            &desc,
            ResourceState::PixelShaderResource,
        )?;
        texture.write_to_subresource(0, image.pixels(), image.row_pitch(), image.slice_pitch())?;

        let slot = self.heap.cpu_descriptor_handle_for_heap_start().offset(TEXTURE_SLOT, self.increment);
        device.create_shader_resource_view(&*texture, &ShaderResourceViewDesc::texture_2d(metadata.format, 1), slot)?;

        qf_debug!(
            SOURCE,
            "Texture {}x{} {:?} uploaded",
            metadata.width,
            metadata.height,
            metadata.format
        );
        self.texture = Some(texture);
        Ok(())
    }

    /// Create a 256-byte aligned constant buffer holding `data` and its CBV in slot 1
    pub fn upload_constant_buffer(&mut self, device: &dyn GraphicsDevice, data: &[u8]) -> Result<()> {
        let size = align_constant_buffer_size(data.len() as u64);
        if size == 0 {
            qf_bail!(SOURCE, "Cannot upload an empty constant buffer");
        }
        let size_in_bytes = view_size(size, "constant buffer")?;
        let resource = device.create_committed_resource(
            &HeapProperties::upload(),
            &ResourceDesc::buffer(size),
            ResourceState::GenericRead,
        )?;
        write_mapped(&*resource, data)?;

        let view = ConstantBufferViewDesc {
            buffer_location: resource.gpu_virtual_address(),
            size_in_bytes,
        };
        let slot = self.heap.cpu_descriptor_handle_for_heap_start().offset(CONSTANT_SLOT, self.increment);
        device.create_constant_buffer_view(&view, slot)?;

        qf_debug!(SOURCE, "Constant buffer: {} bytes ({} aligned)", data.len(), size);
        self.constant_buffer = Some(resource);
        Ok(())
    }

    /// Upload a matrix as the constant buffer
    pub fn upload_constant_matrix(&mut self, device: &dyn GraphicsDevice, matrix: Mat4) -> Result<()> {
        self.upload_constant_buffer(device, bytemuck::bytes_of(&matrix))
    }

    pub fn heap(&self) -> &dyn DescriptorHeap {
        &*self.heap
    }

    /// Size of one slot step in the shader-visible heap
    pub fn descriptor_increment(&self) -> u32 {
        self.increment
    }

    /// GPU handle of the texture table (slot 0)
    pub fn texture_table(&self) -> GpuDescriptorHandle {
        self.gpu_start.offset(TEXTURE_SLOT, self.increment)
    }

    /// GPU handle of the constant-buffer table (slot 1)
    pub fn constant_table(&self) -> GpuDescriptorHandle {
        self.gpu_start.offset(CONSTANT_SLOT, self.increment)
    }

    pub fn texture(&self) -> Option<&dyn Resource> {
        self.texture.as_deref()
    }

    pub fn constant_buffer(&self) -> Option<&dyn Resource> {
        self.constant_buffer.as_deref()
    }
}

#[cfg(test)]
#[path = "resource_uploader_tests.rs"]
mod tests;
