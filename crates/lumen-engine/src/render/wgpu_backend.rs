//! [`GpuContext`] on top of wgpu.
//!
//! Calls made during a frame are recorded; [`WgpuContext::encode`] replays
//! them into a single render pass. Texture uploads and program compilation
//! happen immediately.

use std::collections::{HashMap, HashSet};
use std::ops::Range;

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::coords::ColorRgba;
use crate::error::GpuError;
use crate::lighting::{GlobalLightUniform, PointLightUniform, MAX_GLOBAL_LIGHTS, MAX_POINT_LIGHTS};

use super::gpu::validate_rgba8;
use super::{
    FrameUniforms, GpuContext, GpuProgram, GpuTexture, InstanceUniforms, LineSegment, ProgramLayout,
    ProgramSource, RenderTarget, LINE_WGSL,
};

// ── vertex data ───────────────────────────────────────────────────────────

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct QuadVertex {
    pos: [f32; 2], // -0.5..0.5
}

impl QuadVertex {
    const ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

const QUAD_VERTICES: [QuadVertex; 4] = [
    QuadVertex { pos: [-0.5, -0.5] },
    QuadVertex { pos: [0.5, -0.5] },
    QuadVertex { pos: [0.5, 0.5] },
    QuadVertex { pos: [-0.5, 0.5] },
];

const QUAD_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct SpriteInstance {
    model: [[f32; 4]; 4],
    source_rect: [f32; 4],
    tint: [f32; 4],
}

impl SpriteInstance {
    const ATTRS: [wgpu::VertexAttribute; 6] = wgpu::vertex_attr_array![
        1 => Float32x4, // model col 0
        2 => Float32x4, // model col 1
        3 => Float32x4, // model col 2
        4 => Float32x4, // model col 3
        5 => Float32x4, // source rect
        6 => Float32x4  // tint
    ];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<SpriteInstance>() as u64,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRS,
        }
    }
}

impl From<&InstanceUniforms> for SpriteInstance {
    fn from(i: &InstanceUniforms) -> Self {
        Self {
            model: i.model,
            source_rect: i.source_rect,
            tint: i.tint,
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct LineVertex {
    pos: [f32; 2],
    color: [f32; 4],
}

impl LineVertex {
    const ATTRS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x4];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<LineVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

/// Matches `Frame` in the sprite shaders.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct FrameUniform {
    view_proj: [[f32; 4]; 4],
    globals: [GlobalLightUniform; MAX_GLOBAL_LIGHTS],
    points: [PointLightUniform; MAX_POINT_LIGHTS],
}

// ── recorded work ─────────────────────────────────────────────────────────

struct TextureEntry {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    bind_group: wgpu::BindGroup,
}

struct SpriteDraw {
    program: GpuProgram,
    frame_bind_group: wgpu::BindGroup,
    /// Consecutive instances sharing a texture.
    runs: Vec<(GpuTexture, Range<u32>)>,
}

struct LineDraw {
    vbo: wgpu::Buffer,
    vertex_count: u32,
    bind_group: wgpu::BindGroup,
}

enum RecordedDraw {
    Sprites(SpriteDraw),
    Lines(LineDraw),
}

/// Lazily built pipeline for overlay lines.
struct LinePipeline {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
}

/// wgpu implementation of [`GpuContext`].
///
/// Every program shares one pipeline layout: group 0 holds the frame
/// uniform, the two point-light masks and their sampler; group 1 holds the
/// sprite texture and its sampler. Custom uniforms are not bound.
pub struct WgpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_format: wgpu::TextureFormat,

    frame_layout: Option<wgpu::BindGroupLayout>,
    texture_layout: Option<wgpu::BindGroupLayout>,
    pipeline_layout: Option<wgpu::PipelineLayout>,
    sampler: Option<wgpu::Sampler>,

    quad_vbo: Option<wgpu::Buffer>,
    quad_ibo: Option<wgpu::Buffer>,

    instance_vbo: Option<wgpu::Buffer>,
    instance_capacity: usize,

    next_program: u32,
    next_texture: u32,
    pipelines: HashMap<GpuProgram, wgpu::RenderPipeline>,
    textures: HashMap<GpuTexture, TextureEntry>,
    lines: Option<LinePipeline>,

    clear: Option<wgpu::Color>,
    staged: Vec<SpriteInstance>,
    draws: Vec<RecordedDraw>,

    warned_custom: HashSet<GpuProgram>,
}

impl WgpuContext {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, surface_format: wgpu::TextureFormat) -> Self {
        Self {
            device,
            queue,
            surface_format,
            frame_layout: None,
            texture_layout: None,
            pipeline_layout: None,
            sampler: None,
            quad_vbo: None,
            quad_ibo: None,
            instance_vbo: None,
            instance_capacity: 0,
            next_program: 0,
            next_texture: 0,
            pipelines: HashMap::new(),
            textures: HashMap::new(),
            lines: None,
            clear: None,
            staged: Vec::new(),
            draws: Vec::new(),
            warned_custom: HashSet::new(),
        }
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.surface_format
    }

    /// Replays recorded clears and draws into `target`, then forgets them.
    pub fn encode(&mut self, target: &mut RenderTarget<'_>) {
        let clear = self.clear.take();
        let draws = std::mem::take(&mut self.draws);
        let staged = std::mem::take(&mut self.staged);
        if clear.is_none() && draws.is_empty() {
            return;
        }

        self.ensure_static_buffers();
        if !staged.is_empty() {
            self.ensure_instance_capacity(staged.len());
            if let Some(vbo) = self.instance_vbo.as_ref() {
                self.queue.write_buffer(vbo, 0, bytemuck::cast_slice(&staged));
            }
        }

        let load = match clear {
            Some(c) => wgpu::LoadOp::Clear(c),
            None => wgpu::LoadOp::Load,
        };

        let mut rpass = target.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("lumen sprite pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        for draw in &draws {
            match draw {
                RecordedDraw::Sprites(draw) => {
                    // Released between record and encode.
                    let Some(pipeline) = self.pipelines.get(&draw.program) else { continue };
                    let (Some(quad_vbo), Some(quad_ibo), Some(instance_vbo)) = (
                        self.quad_vbo.as_ref(),
                        self.quad_ibo.as_ref(),
                        self.instance_vbo.as_ref(),
                    ) else {
                        continue;
                    };

                    rpass.set_pipeline(pipeline);
                    rpass.set_vertex_buffer(0, quad_vbo.slice(..));
                    rpass.set_vertex_buffer(1, instance_vbo.slice(..));
                    rpass.set_index_buffer(quad_ibo.slice(..), wgpu::IndexFormat::Uint16);
                    rpass.set_bind_group(0, &draw.frame_bind_group, &[]);

                    for (texture, range) in &draw.runs {
                        let Some(entry) = self.textures.get(texture) else { continue };
                        rpass.set_bind_group(1, &entry.bind_group, &[]);
                        rpass.draw_indexed(0..QUAD_INDICES.len() as u32, 0, range.clone());
                    }
                }
                RecordedDraw::Lines(draw) => {
                    let Some(lines) = self.lines.as_ref() else { continue };
                    rpass.set_pipeline(&lines.pipeline);
                    rpass.set_bind_group(0, &draw.bind_group, &[]);
                    rpass.set_vertex_buffer(0, draw.vbo.slice(..));
                    rpass.draw(0..draw.vertex_count, 0..1);
                }
            }
        }
    }

    // ── lazy resources ────────────────────────────────────────────────────

    fn ensure_layouts(&mut self) {
        if self.pipeline_layout.is_some() {
            return;
        }

        let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                multisampled: false,
                view_dimension: wgpu::TextureViewDimension::D2,
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
            },
            count: None,
        };
        let sampler_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        };

        let frame_layout = self.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lumen frame bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(
                            std::mem::size_of::<FrameUniform>() as u64,
                        ),
                    },
                    count: None,
                },
                texture_entry(1),
                texture_entry(2),
                sampler_entry(3),
            ],
        });

        let texture_layout = self.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lumen sprite texture bgl"),
            entries: &[texture_entry(0), sampler_entry(1)],
        });

        let pipeline_layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("lumen sprite pipeline layout"),
            bind_group_layouts: &[&frame_layout, &texture_layout],
            immediate_size: 0,
        });

        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("lumen sprite sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        self.frame_layout = Some(frame_layout);
        self.texture_layout = Some(texture_layout);
        self.pipeline_layout = Some(pipeline_layout);
        self.sampler = Some(sampler);
    }

    fn ensure_static_buffers(&mut self) {
        if self.quad_vbo.is_some() && self.quad_ibo.is_some() {
            return;
        }

        self.quad_vbo = Some(self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("lumen quad vbo"),
            contents: bytemuck::cast_slice(&QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        }));

        self.quad_ibo = Some(self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("lumen quad ibo"),
            contents: bytemuck::cast_slice(&QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        }));
    }

    fn ensure_instance_capacity(&mut self, required_instances: usize) {
        if required_instances <= self.instance_capacity && self.instance_vbo.is_some() {
            return;
        }

        let new_cap = required_instances.next_power_of_two().max(64);
        let new_size = (new_cap * std::mem::size_of::<SpriteInstance>()) as u64;

        self.instance_vbo = Some(self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("lumen sprite instance vbo"),
            size: new_size,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }));
        self.instance_capacity = new_cap;
    }

    fn ensure_line_pipeline(&mut self) -> Result<(), GpuError> {
        if self.lines.is_some() {
            return Ok(());
        }
        check_wgsl("line", LINE_WGSL, &[wgpu::naga::ShaderStage::Vertex, wgpu::naga::ShaderStage::Fragment])?;

        let layout = self.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lumen line bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(64),
                },
                count: None,
            }],
        });
        let pipeline_layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("lumen line pipeline layout"),
            bind_group_layouts: &[&layout],
            immediate_size: 0,
        });

        let scope = self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("lumen line shader"),
            source: wgpu::ShaderSource::Wgsl(LINE_WGSL.into()),
        });
        let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("lumen line pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[LineVertex::layout()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.surface_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::LineList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });
        if let Some(err) = pollster::block_on(scope.pop()) {
            return Err(GpuError::Compile(format!("line pipeline: {err}")));
        }

        log::debug!("line pipeline created");
        self.lines = Some(LinePipeline { pipeline, layout });
        Ok(())
    }

    fn texture_view(&self, texture: GpuTexture) -> Result<&wgpu::TextureView, GpuError> {
        self.textures
            .get(&texture)
            .map(|e| &e.view)
            .ok_or(GpuError::UnknownTexture(texture.0))
    }
}

/// Parses WGSL on the host and checks that every stage in `stages` has its
/// entry point (`vs_main` / `fs_main`).
fn check_wgsl(label: &str, source: &str, stages: &[wgpu::naga::ShaderStage]) -> Result<(), GpuError> {
    let module = wgpu::naga::front::wgsl::parse_str(source)
        .map_err(|e| GpuError::Compile(format!("{label}: {}", e.emit_to_string(source))))?;

    for stage in stages {
        let name = match stage {
            wgpu::naga::ShaderStage::Vertex => "vs_main",
            wgpu::naga::ShaderStage::Fragment => "fs_main",
            _ => continue,
        };
        if !module.entry_points.iter().any(|ep| ep.stage == *stage && ep.name == name) {
            return Err(GpuError::Compile(format!("{label}: missing {stage:?} entry point `{name}`")));
        }
    }
    Ok(())
}

fn to_wgpu_color(c: ColorRgba) -> wgpu::Color {
    wgpu::Color {
        r: c.r as f64,
        g: c.g as f64,
        b: c.b as f64,
        a: c.a as f64,
    }
}

impl GpuContext for WgpuContext {
    fn compile(
        &mut self,
        source: &ProgramSource<'_>,
        layout: &ProgramLayout,
    ) -> Result<GpuProgram, GpuError> {
        check_wgsl("vertex stage", source.vertex, &[wgpu::naga::ShaderStage::Vertex])?;
        check_wgsl("fragment stage", source.fragment, &[wgpu::naga::ShaderStage::Fragment])?;
        self.ensure_layouts();
        let Some(pipeline_layout) = self.pipeline_layout.as_ref() else {
            return Err(GpuError::Compile("pipeline layout unavailable".into()));
        };

        // Binding or interface mismatches only show up in device validation.
        let scope = self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let vs = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("lumen sprite vs"),
            source: wgpu::ShaderSource::Wgsl(source.vertex.into()),
        });
        let fs = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("lumen sprite fs"),
            source: wgpu::ShaderSource::Wgsl(source.fragment.into()),
        });

        let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("lumen sprite pipeline"),
            layout: Some(pipeline_layout),

            vertex: wgpu::VertexState {
                module: &vs,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[QuadVertex::layout(), SpriteInstance::layout()],
            },

            fragment: Some(wgpu::FragmentState {
                module: &fs,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.surface_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),

            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },

            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });
        if let Some(err) = pollster::block_on(scope.pop()) {
            return Err(GpuError::Compile(err.to_string()));
        }

        self.next_program += 1;
        let handle = GpuProgram(self.next_program);
        self.pipelines.insert(handle, pipeline);
        log::debug!("{handle}: pipeline created ({} custom uniform(s))", layout.uniforms.len());
        Ok(handle)
    }

    fn release_program(&mut self, program: GpuProgram) {
        self.pipelines.remove(&program);
        self.warned_custom.remove(&program);
    }

    fn upload_texture(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> Result<GpuTexture, GpuError> {
        validate_rgba8(pixels, width, height)?;
        self.ensure_layouts();
        let (Some(texture_layout), Some(sampler)) = (self.texture_layout.as_ref(), self.sampler.as_ref())
        else {
            return Err(GpuError::Compile("texture layout unavailable".into()));
        };

        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("lumen texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lumen texture bind group"),
            layout: texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        });

        self.next_texture += 1;
        let handle = GpuTexture(self.next_texture);
        self.textures.insert(
            handle,
            TextureEntry {
                _texture: texture,
                view,
                bind_group,
            },
        );
        Ok(handle)
    }

    fn release_texture(&mut self, texture: GpuTexture) {
        self.textures.remove(&texture);
    }

    fn clear(&mut self, color: ColorRgba, _depth: f32) {
        self.clear = Some(to_wgpu_color(color));
    }

    fn issue_draw(
        &mut self,
        program: GpuProgram,
        frame: &FrameUniforms,
        instances: &[InstanceUniforms],
    ) -> Result<(), GpuError> {
        if !self.pipelines.contains_key(&program) {
            return Err(GpuError::UnknownProgram(program.0));
        }
        if !frame.custom.is_empty() && self.warned_custom.insert(program) {
            log::debug!("{program}: custom uniforms are not bound by the wgpu backend; ignored");
        }

        let (Some(frame_layout), Some(sampler)) = (self.frame_layout.as_ref(), self.sampler.as_ref())
        else {
            return Err(GpuError::UnknownProgram(program.0));
        };
        let mask_0 = self.texture_view(frame.point_textures[0])?;
        let mask_1 = self.texture_view(frame.point_textures[1])?;

        let mut runs: Vec<(GpuTexture, Range<u32>)> = Vec::new();
        let base = self.staged.len() as u32;
        for (i, inst) in instances.iter().enumerate() {
            if !self.textures.contains_key(&inst.texture) {
                return Err(GpuError::UnknownTexture(inst.texture.0));
            }
            let idx = base + i as u32;
            match runs.last_mut() {
                Some((t, range)) if *t == inst.texture => range.end = idx + 1,
                _ => runs.push((inst.texture, idx..idx + 1)),
            }
        }

        let uniform = FrameUniform {
            view_proj: frame.view_projection,
            globals: frame.globals,
            points: frame.points,
        };
        let ubo = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("lumen frame ubo"),
            contents: bytemuck::bytes_of(&uniform),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let frame_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lumen frame bind group"),
            layout: frame_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: ubo.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(mask_0),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(mask_1),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        });

        self.staged.extend(instances.iter().map(SpriteInstance::from));
        self.draws.push(RecordedDraw::Sprites(SpriteDraw {
            program,
            frame_bind_group,
            runs,
        }));
        Ok(())
    }

    fn draw_lines(
        &mut self,
        view_projection: &[[f32; 4]; 4],
        segments: &[LineSegment],
    ) -> Result<(), GpuError> {
        if segments.is_empty() {
            return Ok(());
        }
        self.ensure_line_pipeline()?;
        let Some(lines) = self.lines.as_ref() else {
            return Err(GpuError::Compile("line pipeline unavailable".into()));
        };

        let vertices = line_vertices(segments);
        let vbo = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("lumen line vbo"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let ubo = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("lumen line ubo"),
            contents: bytemuck::cast_slice(view_projection),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lumen line bind group"),
            layout: &lines.layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: ubo.as_entire_binding(),
            }],
        });

        self.draws.push(RecordedDraw::Lines(LineDraw {
            vbo,
            vertex_count: vertices.len() as u32,
            bind_group,
        }));
        Ok(())
    }
}

/// Two vertices per segment, for a `LineList`.
fn line_vertices(segments: &[LineSegment]) -> Vec<LineVertex> {
    segments
        .iter()
        .flat_map(|s| {
            [
                LineVertex { pos: s.start, color: s.color },
                LineVertex { pos: s.end, color: s.color },
            ]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_uniform_matches_wgsl_layout() {
        // mat4 + 2 × (2 vec4) + 2 × (mat4 + 3 vec4)
        assert_eq!(std::mem::size_of::<FrameUniform>(), 64 + 2 * 32 + 2 * 112);
        assert_eq!(std::mem::size_of::<FrameUniform>() % 16, 0);
    }

    #[test]
    fn instance_is_six_vec4s() {
        assert_eq!(std::mem::size_of::<SpriteInstance>(), 6 * 16);
    }

    #[test]
    fn quad_is_centered() {
        let sum = QUAD_VERTICES
            .iter()
            .fold([0.0f32; 2], |acc, v| [acc[0] + v.pos[0], acc[1] + v.pos[1]]);
        assert_eq!(sum, [0.0, 0.0]);
    }

    use wgpu::naga::ShaderStage;

    // ── shader checks ─────────────────────────────────────────────────────

    #[test]
    fn builtin_shaders_parse() {
        assert!(check_wgsl("vertex", crate::render::SPRITE_VERTEX_WGSL, &[ShaderStage::Vertex]).is_ok());
        assert!(check_wgsl("fragment", crate::render::SPRITE_FRAGMENT_WGSL, &[ShaderStage::Fragment]).is_ok());
        assert!(check_wgsl("line", LINE_WGSL, &[ShaderStage::Vertex, ShaderStage::Fragment]).is_ok());
    }

    #[test]
    fn malformed_wgsl_is_a_compile_error() {
        assert!(matches!(
            check_wgsl("vertex", "fn (", &[ShaderStage::Vertex]),
            Err(GpuError::Compile(_))
        ));
    }

    #[test]
    fn valid_wgsl_without_the_entry_point_is_rejected() {
        let src = "@vertex fn main() -> @builtin(position) vec4<f32> { return vec4<f32>(0.0); }";
        let err = check_wgsl("vertex", src, &[ShaderStage::Vertex]).unwrap_err();
        assert!(matches!(&err, GpuError::Compile(msg) if msg.contains("vs_main")));

        // A fragment entry point does not satisfy the vertex stage.
        let src = "@fragment fn vs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }";
        assert!(check_wgsl("vertex", src, &[ShaderStage::Vertex]).is_err());
    }

    // ── lines ─────────────────────────────────────────────────────────────

    #[test]
    fn each_segment_becomes_two_colored_vertices() {
        let red = [1.0, 0.0, 0.0, 1.0];
        let v = line_vertices(&[LineSegment {
            start: [0.0, 0.0],
            end: [100.0, 0.0],
            color: red,
        }]);
        assert_eq!(v.len(), 2);
        assert_eq!(v[1].pos, [100.0, 0.0]);
        assert!(v.iter().all(|x| x.color == red));
        assert_eq!(std::mem::size_of::<LineVertex>(), 24);
    }
}
