//! GPU-accelerated stepping using wgpu (Vulkan/Metal compute)
//!
//! WGSL has no byte-sized storage type, so the device buffers hold one
//! `u32` per cell; the host widens the byte grid on upload and narrows it
//! again on readback. Element counts still match the host grid exactly.

#[cfg(feature = "wgpu-compute")]
pub use wgpu_life::WgpuLifeEngine;

#[cfg(feature = "wgpu-compute")]
mod wgpu_life {
    use crate::engine::{EngineError, EngineResult, LifeKernel};
    use crate::tiling::TileLayout;
    use bytemuck::{Pod, Zeroable};
    use std::borrow::Cow;

    /// Life compute shader. `__BLOCK_W__`/`__BLOCK_H__` are replaced with the
    /// tile edge at construction, so one workgroup is exactly one tile.
    const LIFE_SHADER: &str = r#"
struct Params {
    width: u32,
    height: u32,
    _pad0: u32,
    _pad1: u32,
}

@group(0) @binding(0) var<storage, read> cells_in: array<u32>;
@group(0) @binding(1) var<storage, read_write> cells_out: array<u32>;
@group(0) @binding(2) var<uniform> params: Params;

fn living(x: u32, y: u32) -> u32 {
    return select(0u, 1u, cells_in[y * params.width + x] == 1u);
}

@compute @workgroup_size(__BLOCK_W__, __BLOCK_H__, 1)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let w = params.width;
    let h = params.height;
    let x = gid.x;
    let y = gid.y;

    // Tiles over-cover the grid when w or h is not a multiple of the edge
    if (x >= w || y >= h) {
        return;
    }

    let left = (x + w - 1u) % w;
    let right = (x + 1u) % w;
    let up = (y + h - 1u) % h;
    let down = (y + 1u) % h;

    let n = living(left, up) + living(x, up) + living(right, up)
          + living(left, y) + living(right, y)
          + living(left, down) + living(x, down) + living(right, down);

    let idx = y * w + x;
    let alive = cells_in[idx] == 1u;
    cells_out[idx] = select(0u, 1u, n == 3u || (alive && n == 2u));
}
"#;

    #[repr(C)]
    #[derive(Clone, Copy, Pod, Zeroable)]
    struct Params {
        width: u32,
        height: u32,
        _pad0: u32,
        _pad1: u32,
    }

    pub struct WgpuLifeEngine {
        name: String,
        layout: TileLayout,
        device: wgpu::Device,
        queue: wgpu::Queue,
        pipeline: wgpu::ComputePipeline,
        bind_group: wgpu::BindGroup,
        input_buffer: wgpu::Buffer,
        output_buffer: wgpu::Buffer,
        staging_buffer: wgpu::Buffer,
        buffer_size: u64,
        // Widened copy of the host input, reused every step
        upload: Vec<u32>,
    }

    impl WgpuLifeEngine {
        pub fn new(width: usize, height: usize, max_block_edge: usize) -> EngineResult<Self> {
            pollster::block_on(Self::new_async(width, height, max_block_edge))
        }

        async fn new_async(width: usize, height: usize, max_block_edge: usize) -> EngineResult<Self> {
            let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
                backends: wgpu::Backends::VULKAN | wgpu::Backends::METAL,
                ..Default::default()
            });

            let adapter = instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::HighPerformance,
                    compatible_surface: None,
                    force_fallback_adapter: false,
                })
                .await
                .ok_or_else(|| EngineError::Unavailable("no Vulkan/Metal adapter found".to_string()))?;

            let adapter_info = adapter.get_info();
            let adapter_limits = adapter.limits();

            let cells = (width * height) as u64;
            let buffer_size = cells * std::mem::size_of::<u32>() as u64;
            if buffer_size > adapter_limits.max_storage_buffer_binding_size as u64
                || buffer_size > adapter_limits.max_buffer_size
            {
                return Err(EngineError::Allocation(format!(
                    "{}x{} grid needs {} bytes per buffer, adapter allows {}",
                    width,
                    height,
                    buffer_size,
                    (adapter_limits.max_storage_buffer_binding_size as u64).min(adapter_limits.max_buffer_size)
                )));
            }

            let (device, queue) = adapter
                .request_device(
                    &wgpu::DeviceDescriptor {
                        label: Some("Life Device"),
                        required_features: wgpu::Features::empty(),
                        required_limits: wgpu::Limits {
                            max_storage_buffer_binding_size: adapter_limits.max_storage_buffer_binding_size,
                            max_buffer_size: adapter_limits.max_buffer_size,
                            ..Default::default()
                        },
                    },
                    None,
                )
                .await
                .map_err(|e| EngineError::Unavailable(format!("request_device failed: {}", e)))?;

            let limits = device.limits();
            let edge = workgroup_edge(
                max_block_edge,
                limits.max_compute_invocations_per_workgroup as usize,
                limits.max_compute_workgroup_size_x.min(limits.max_compute_workgroup_size_y) as usize,
            );
            let layout = TileLayout::new(width, height, edge);
            let max_groups = limits.max_compute_workgroups_per_dimension as usize;
            if layout.tiles_x > max_groups || layout.tiles_y > max_groups {
                return Err(EngineError::Allocation(format!(
                    "{} exceeds {} workgroups per dimension",
                    layout, max_groups
                )));
            }

            device.push_error_scope(wgpu::ErrorFilter::Validation);
            let source = LIFE_SHADER
                .replace("__BLOCK_W__", &layout.block_width.to_string())
                .replace("__BLOCK_H__", &layout.block_height.to_string());
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Life Shader"),
                source: wgpu::ShaderSource::Wgsl(Cow::Owned(source)),
            });

            let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Life Bind Group Layout"),
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
                label: Some("Life Pipeline Layout"),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });

            let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("Life Pipeline"),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point: "main",
                compilation_options: Default::default(),
            });
            if let Some(e) = device.pop_error_scope().await {
                return Err(EngineError::Compile(e.to_string()));
            }

            device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
            let input_buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Cells In"),
                size: buffer_size,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let output_buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Cells Out"),
                size: buffer_size,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            });
            let staging_buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Cells Staging"),
                size: buffer_size,
                usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                mapped_at_creation: false,
            });
            let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Life Params"),
                size: std::mem::size_of::<Params>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            if let Some(e) = device.pop_error_scope().await {
                return Err(EngineError::Allocation(e.to_string()));
            }

            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Life Bind Group"),
                layout: &bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry { binding: 0, resource: input_buffer.as_entire_binding() },
                    wgpu::BindGroupEntry { binding: 1, resource: output_buffer.as_entire_binding() },
                    wgpu::BindGroupEntry { binding: 2, resource: params_buffer.as_entire_binding() },
                ],
            });

            // Dimensions are fixed for the engine's lifetime
            let params = Params {
                width: width as u32,
                height: height as u32,
                _pad0: 0,
                _pad1: 0,
            };
            queue.write_buffer(&params_buffer, 0, bytemuck::bytes_of(&params));

            log::info!("wgpu adapter: {} ({:?})", adapter_info.name, adapter_info.backend);
            log::info!("wgpu backend: {}", layout);

            Ok(Self {
                name: format!("wgpu ({})", adapter_info.name),
                layout,
                device,
                queue,
                pipeline,
                bind_group,
                input_buffer,
                output_buffer,
                staging_buffer,
                buffer_size,
                upload: vec![0u32; width * height],
            })
        }

        fn read_back(&self, output: &mut [u8]) -> EngineResult<()> {
            let slice = self.staging_buffer.slice(..);
            let (tx, rx) = std::sync::mpsc::channel();
            slice.map_async(wgpu::MapMode::Read, move |result| {
                let _ = tx.send(result);
            });
            self.device.poll(wgpu::Maintain::Wait);
            rx.recv()
                .map_err(|_| EngineError::Transfer("map callback dropped".to_string()))?
                .map_err(|e| EngineError::Transfer(e.to_string()))?;

            let data = slice.get_mapped_range();
            for (cell, word) in output.iter_mut().zip(data.chunks_exact(4)) {
                *cell = u32::from_le_bytes([word[0], word[1], word[2], word[3]]) as u8;
            }
            drop(data);
            self.staging_buffer.unmap();
            Ok(())
        }
    }

    impl LifeKernel for WgpuLifeEngine {
        fn name(&self) -> &str {
            &self.name
        }

        fn layout(&self) -> &TileLayout {
            &self.layout
        }

        fn step(&mut self, input: &[u8], output: &mut [u8]) -> EngineResult<()> {
            assert_eq!(input.len(), self.layout.cell_count(), "input size does not match engine");
            assert_eq!(output.len(), self.layout.cell_count(), "output size does not match engine");

            for (word, &cell) in self.upload.iter_mut().zip(input) {
                *word = cell as u32;
            }
            self.queue.write_buffer(&self.input_buffer, 0, bytemuck::cast_slice(&self.upload));

            self.device.push_error_scope(wgpu::ErrorFilter::Validation);
            let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Life Step"),
            });
            {
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("Life Pass"),
                    timestamp_writes: None,
                });
                pass.set_pipeline(&self.pipeline);
                pass.set_bind_group(0, &self.bind_group, &[]);
                pass.dispatch_workgroups(self.layout.tiles_x as u32, self.layout.tiles_y as u32, 1);
            }
            encoder.copy_buffer_to_buffer(&self.output_buffer, 0, &self.staging_buffer, 0, self.buffer_size);
            self.queue.submit(Some(encoder.finish()));
            if let Some(e) = pollster::block_on(self.device.pop_error_scope()) {
                return Err(EngineError::Launch(e.to_string()));
            }

            self.read_back(output)
        }
    }

    /// Largest square workgroup edge that fits the device limits
    fn workgroup_edge(max_block_edge: usize, max_invocations: usize, max_axis: usize) -> usize {
        let mut edge = max_block_edge.min(max_axis).max(1);
        while edge > 1 && edge * edge > max_invocations {
            edge -= 1;
        }
        edge
    }

}

#[cfg(feature = "wgpu-compute")]
pub fn wgpu_available() -> bool {
    pollster::block_on(async {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::VULKAN | wgpu::Backends::METAL,
            ..Default::default()
        });
        instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .is_some()
    })
}

#[cfg(not(feature = "wgpu-compute"))]
pub fn wgpu_available() -> bool {
    false
}
