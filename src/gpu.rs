//! Accelerator conversion strategy.
//!
//! The per-pixel palette-index computation is dispatched as a wgpu compute
//! kernel, one work item per pixel with no cross-pixel dependency. Resize
//! and the final index-to-glyph rendering stay on the host and are shared
//! with the CPU path, which is what guarantees byte-identical output.

use wgpu::util::DeviceExt;
use wgpu::DeviceType;

use crate::device;
use crate::error::{Error, Result};
use crate::mapper::{render_indices, resize_frame, FrameMapper};
use crate::palette::GlyphPalette;
use crate::source::GrayFrame;

const WORKGROUP_SIZE: u32 = 256;

/// Storage buffers have no 8-bit element type in WGSL, so pixels are widened
/// to one u32 word each on the host. The index math mirrors
/// `GlyphPalette::index_for` exactly.
const KERNEL: &str = r#"
struct Params {
    pixel_count: u32,
    glyph_count: u32,
}

@group(0) @binding(0) var<storage, read> pixels: array<u32>;
@group(0) @binding(1) var<storage, read_write> indices: array<u32>;
@group(0) @binding(2) var<uniform> params: Params;

@compute @workgroup_size(256)
fn map_intensity(@builtin(global_invocation_id) gid: vec3<u32>) {
    let i = gid.x;
    if (i >= params.pixel_count) {
        return;
    }
    let idx = (pixels[i] * params.glyph_count) / 256u;
    indices[i] = min(idx, params.glyph_count - 1u);
}
"#;

/// Frame mapper running the intensity kernel on a named wgpu adapter.
pub struct GpuMapper {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::ComputePipeline,
    bind_layout: wgpu::BindGroupLayout,
    adapter_name: String,
    out_width: u32,
    out_height: u32,
}

impl GpuMapper {
    /// Acquire the accelerator named by `selector` (case-insensitive
    /// substring, optional `accelerator:` prefix) and build the kernel.
    ///
    /// # Errors
    /// [`Error::DeviceUnavailable`] when no adapter matches or device setup
    /// fails; callers recover by falling back to the CPU strategy.
    pub fn new(selector: &str, out_width: u32, out_height: u32) -> Result<Self> {
        let instance = wgpu::Instance::default();
        let adapter = instance
            .enumerate_adapters(wgpu::Backends::all())
            .into_iter()
            .find(|a| {
                let info = a.get_info();
                info.device_type != DeviceType::Cpu && device::name_matches(selector, &info.name)
            })
            .ok_or_else(|| {
                Error::DeviceUnavailable(format!("no accelerator matching '{selector}'"))
            })?;
        let adapter_name = adapter.get_info().name;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("tascii-device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
            },
            None,
        ))
        .map_err(|e| Error::DeviceUnavailable(format!("'{adapter_name}': {e}")))?;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("tascii-intensity-kernel"),
            source: wgpu::ShaderSource::Wgsl(KERNEL.into()),
        });

        let bind_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("tascii-bind-layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("tascii-pipeline-layout"),
            bind_group_layouts: &[&bind_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("tascii-intensity-pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: "map_intensity",
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        });

        Ok(Self {
            device,
            queue,
            pipeline,
            bind_layout,
            adapter_name,
            out_width,
            out_height,
        })
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    /// Run the kernel over one resized frame, returning one palette index
    /// per pixel. All GPU buffers are scoped to this call.
    fn dispatch(&self, pixels: &[u8], glyph_count: u32) -> Result<Vec<u32>> {
        let widened: Vec<u32> = pixels.iter().map(|&p| p as u32).collect();
        let byte_len = (widened.len() * std::mem::size_of::<u32>()) as u64;

        let input = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("tascii-input"),
                contents: bytemuck::cast_slice(&widened),
                usage: wgpu::BufferUsages::STORAGE,
            });
        let output = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("tascii-output"),
            size: byte_len,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let params = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("tascii-params"),
                contents: bytemuck::bytes_of(&[widened.len() as u32, glyph_count]),
                usage: wgpu::BufferUsages::UNIFORM,
            });
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("tascii-staging"),
            size: byte_len,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("tascii-bind-group"),
            layout: &self.bind_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: input.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: output.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: params.as_entire_binding(),
                },
            ],
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("tascii-encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("tascii-pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            let groups = (widened.len() as u32).div_ceil(WORKGROUP_SIZE);
            pass.dispatch_workgroups(groups, 1, 1);
        }
        encoder.copy_buffer_to_buffer(&output, 0, &staging, 0, byte_len);
        self.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|_| Error::DeviceUnavailable("kernel readback dropped".to_string()))?
            .map_err(|e| Error::DeviceUnavailable(format!("kernel readback failed: {e}")))?;

        let indices = bytemuck::cast_slice::<u8, u32>(&slice.get_mapped_range()).to_vec();
        staging.unmap();
        Ok(indices)
    }
}

impl FrameMapper for GpuMapper {
    fn map(&self, frame: &GrayFrame, palette: &GlyphPalette) -> Result<String> {
        let resized = resize_frame(frame, self.out_width, self.out_height)?;
        let indices = self.dispatch(&resized.data, palette.len() as u32)?;
        Ok(render_indices(&indices, resized.width as usize, palette))
    }

    fn label(&self) -> &'static str {
        "accelerator"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{list_devices, DeviceKind, NO_ACCELERATOR};
    use crate::mapper::CpuMapper;

    /// Both strategies must produce byte-identical text frames. Skips
    /// silently on machines without an accelerator adapter.
    #[test]
    fn strategy_equivalence_with_cpu() {
        let Some(accel) = list_devices()
            .into_iter()
            .find(|d| d.kind == DeviceKind::Accelerator && d.name != NO_ACCELERATOR)
        else {
            return;
        };
        let Ok(gpu) = GpuMapper::new(&accel.name, 32, 18) else {
            return;
        };
        let cpu = CpuMapper::new(32, 18);
        let palette = GlyphPalette::default();
        let data: Vec<u8> = (0..64u32 * 36).map(|i| (i * 7 % 256) as u8).collect();
        let frame = GrayFrame::new(64, 36, data);
        assert_eq!(
            gpu.map(&frame, &palette).unwrap(),
            cpu.map(&frame, &palette).unwrap()
        );
    }

    #[test]
    fn missing_adapter_is_device_unavailable() {
        assert!(matches!(
            GpuMapper::new("no-such-adapter-xyzzy", 8, 4),
            Err(Error::DeviceUnavailable(_))
        ));
    }
}
