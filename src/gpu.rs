//! wgpu backend: every stage is a render pipeline drawing a full-screen
//! quad into the target field's texture.

use crate::backend::Backend;
use crate::error::{FluidError, Result};
use crate::field::{Channels, Field, FieldDesc, FieldSnapshot};
use crate::program::{FRAGMENT_ENTRY, VERTEX_ENTRY, link_source};
use crate::shaders::{Stage, StageUniforms};
use std::collections::HashMap;
use std::sync::mpsc;

const TARGET_FORMATS: [wgpu::TextureFormat; 4] = [
    wgpu::TextureFormat::R32Float,
    wgpu::TextureFormat::Rg32Float,
    wgpu::TextureFormat::Rgba32Float,
    wgpu::TextureFormat::Rgba8Unorm,
];

fn format_for(channels: Channels) -> wgpu::TextureFormat {
    match channels {
        Channels::Scalar => wgpu::TextureFormat::R32Float,
        Channels::Vector => wgpu::TextureFormat::Rg32Float,
        // No three-channel float format exists; the fourth lane stays unused.
        Channels::Color => wgpu::TextureFormat::Rgba32Float,
        Channels::Rgba => wgpu::TextureFormat::Rgba8Unorm,
    }
}

/// Bytes per texel and stored components for a field format.
fn texel_layout(channels: Channels) -> (u32, usize) {
    match channels {
        Channels::Scalar => (4, 1),
        Channels::Vector => (8, 2),
        Channels::Color => (16, 4),
        Channels::Rgba => (4, 4),
    }
}

fn padded_bytes_per_row(unpadded: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

pub struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    format: wgpu::TextureFormat,
}

impl GpuTexture {
    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }
}

pub struct GpuProgram {
    stage: Stage,
    bind_group_layout: wgpu::BindGroupLayout,
    pipelines: HashMap<wgpu::TextureFormat, wgpu::RenderPipeline>,
}

pub struct GpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter_name: String,
    uniform_buffer: wgpu::Buffer,
    max_texture_dimension: u32,
}

impl GpuBackend {
    /// Requests an adapter and device. Fails with `UnsupportedBackend` when
    /// the host has neither.
    pub async fn new() -> Result<Self> {
        let instance = wgpu::Instance::default();

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| FluidError::UnsupportedBackend("no GPU adapter found".into()))?;

        let info = adapter.get_info();
        log::info!("using adapter {} ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("inkflow device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults()
                        .using_resolution(adapter.limits()),
                },
                None,
            )
            .await
            .map_err(|err| FluidError::UnsupportedBackend(err.to_string()))?;

        device.on_uncaptured_error(Box::new(|err| {
            log::error!("wgpu error: {err}");
        }));

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("stage uniforms"),
            size: std::mem::size_of::<StageUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let max_texture_dimension = device.limits().max_texture_dimension_2d;

        Ok(Self {
            device,
            queue,
            adapter_name: info.name,
            uniform_buffer,
            max_texture_dimension,
        })
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    fn bind_group_layout(&self, stage: Stage) -> wgpu::BindGroupLayout {
        let mut entries = vec![wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<StageUniforms>() as u64),
            },
            count: None,
        }];
        for binding in 1..=stage.input_count() as u32 {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
        }
        self.device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(stage.label()),
                entries: &entries,
            })
    }

    fn submit_pass(
        &self,
        label: &str,
        target: &wgpu::TextureView,
        draw: Option<(&wgpu::RenderPipeline, &wgpu::BindGroup)>,
    ) {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(label),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            if let Some((pipeline, bind_group)) = draw {
                pass.set_pipeline(pipeline);
                pass.set_bind_group(0, bind_group, &[]);
                pass.draw(0..4, 0..1);
            }
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }
}

impl Backend for GpuBackend {
    type Texture = GpuTexture;
    type Program = GpuProgram;

    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn max_texture_dimension(&self) -> u32 {
        self.max_texture_dimension
    }

    fn create_texture(&mut self, desc: &FieldDesc) -> Result<GpuTexture> {
        let limit = self.max_texture_dimension;
        if desc.width == 0 || desc.height == 0 || desc.width > limit || desc.height > limit {
            return Err(FluidError::ResourceExhausted {
                width: desc.width,
                height: desc.height,
                limit,
            });
        }

        let format = format_for(desc.channels);
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(GpuTexture {
            texture,
            view,
            format,
        })
    }

    fn compile(&mut self, stage: Stage, vertex_source: &str, fragment_source: &str) -> Result<GpuProgram> {
        let source = link_source(stage, vertex_source, fragment_source)?;

        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(stage.label()),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
        let bind_group_layout = self.bind_group_layout(stage);
        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(stage.label()),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });

        let pipelines = TARGET_FORMATS
            .iter()
            .map(|&format| {
                let pipeline = self
                    .device
                    .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                        label: Some(stage.label()),
                        layout: Some(&pipeline_layout),
                        vertex: wgpu::VertexState {
                            module: &module,
                            entry_point: VERTEX_ENTRY,
                            compilation_options: wgpu::PipelineCompilationOptions::default(),
                            buffers: &[],
                        },
                        primitive: wgpu::PrimitiveState {
                            topology: wgpu::PrimitiveTopology::TriangleStrip,
                            ..Default::default()
                        },
                        depth_stencil: None,
                        multisample: wgpu::MultisampleState::default(),
                        fragment: Some(wgpu::FragmentState {
                            module: &module,
                            entry_point: FRAGMENT_ENTRY,
                            compilation_options: wgpu::PipelineCompilationOptions::default(),
                            targets: &[Some(wgpu::ColorTargetState {
                                format,
                                blend: None,
                                write_mask: wgpu::ColorWrites::ALL,
                            })],
                        }),
                        multiview: None,
                    });
                (format, pipeline)
            })
            .collect();

        log::debug!("built {stage} pipelines");
        Ok(GpuProgram {
            stage,
            bind_group_layout,
            pipelines,
        })
    }

    fn draw(
        &mut self,
        program: &GpuProgram,
        uniforms: &StageUniforms,
        inputs: &[&Field<GpuTexture>],
        target: &mut Field<GpuTexture>,
    ) -> Result<()> {
        let stage = program.stage;
        if inputs.len() != stage.input_count() {
            return Err(FluidError::BindingMismatch {
                stage,
                expected: stage.input_count(),
                got: inputs.len(),
            });
        }
        let format = target.texture().format;
        let pipeline = program.pipelines.get(&format).ok_or_else(|| {
            FluidError::UnsupportedBackend(format!("{stage} has no pipeline for {format:?}"))
        })?;

        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));

        let mut entries = vec![wgpu::BindGroupEntry {
            binding: 0,
            resource: self.uniform_buffer.as_entire_binding(),
        }];
        for (i, input) in inputs.iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: i as u32 + 1,
                resource: wgpu::BindingResource::TextureView(&input.texture().view),
            });
        }
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(stage.label()),
            layout: &program.bind_group_layout,
            entries: &entries,
        });

        self.submit_pass(stage.label(), &target.texture().view, Some((pipeline, &bind_group)));
        Ok(())
    }

    fn clear(&mut self, field: &mut Field<GpuTexture>) -> Result<()> {
        self.submit_pass("clear", &field.texture().view, None);
        Ok(())
    }

    fn read(&mut self, field: &Field<GpuTexture>) -> Result<FieldSnapshot> {
        let (width, height) = (field.width(), field.height());
        let (bytes_per_texel, stored) = texel_layout(field.channels());
        let unpadded = width * bytes_per_texel;
        let padded = padded_bytes_per_row(unpadded);

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("field readback"),
            size: padded as u64 * height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("field readback"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &field.texture().texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = buffer.slice(..);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        match receiver.recv() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(FluidError::Readback(format!("{err:?}"))),
            Err(_) => return Err(FluidError::Readback("map callback dropped".into())),
        }

        let channels = field.channels().count();
        let mut snapshot = FieldSnapshot::zeroed(width, height, channels);
        {
            let mapped = slice.get_mapped_range();
            let is_unorm = field.channels() == Channels::Rgba;
            let mut values = Vec::with_capacity(stored);
            for y in 0..height {
                let row = &mapped[(y * padded) as usize..(y * padded + unpadded) as usize];
                for x in 0..width {
                    let texel = &row[(x * bytes_per_texel) as usize..((x + 1) * bytes_per_texel) as usize];
                    values.clear();
                    if is_unorm {
                        values.extend(texel.iter().map(|&b| b as f32 / 255.0));
                    } else {
                        values.extend(
                            texel
                                .chunks_exact(4)
                                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]])),
                        );
                    }
                    snapshot
                        .texel_mut(x, y)
                        .copy_from_slice(&values[..channels]);
                }
            }
        }
        buffer.unmap();
        Ok(snapshot)
    }

    fn write(&mut self, field: &mut Field<GpuTexture>, data: &[f32]) -> Result<()> {
        let channels = field.channels().count();
        let expected = field.desc().texel_count() * channels;
        if data.len() != expected {
            return Err(FluidError::Readback(format!(
                "upload to {} expects {expected} values, got {}",
                field.desc().label,
                data.len()
            )));
        }

        let (bytes_per_texel, stored) = texel_layout(field.channels());
        let mut bytes = Vec::with_capacity(field.desc().texel_count() * bytes_per_texel as usize);
        for texel in data.chunks(channels) {
            for c in 0..stored {
                let value = texel.get(c).copied().unwrap_or(0.0);
                if field.channels() == Channels::Rgba {
                    bytes.push((value.clamp(0.0, 1.0) * 255.0).round() as u8);
                } else {
                    bytes.extend_from_slice(&value.to_le_bytes());
                }
            }
        }

        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &field.texture().texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &bytes,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(field.width() * bytes_per_texel),
                rows_per_image: Some(field.height()),
            },
            wgpu::Extent3d {
                width: field.width(),
                height: field.height(),
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn release(&mut self, field: Field<GpuTexture>) {
        field.into_texture().texture.destroy();
    }
}
