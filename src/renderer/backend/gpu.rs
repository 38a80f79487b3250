//! wgpu Render Backend
//!
//! GPU implementation of [`RenderBackend`]. All work of a frame is recorded
//! into one command encoder and submitted in [`present`](RenderBackend::present),
//! so pass ordering is the submission order on the single queue.
//!
//! # Formats
//!
//! | Attachment    | Format                 |
//! |---------------|------------------------|
//! | color         | `Rgba8Unorm`           |
//! | depth/stencil | `Depth24PlusStencil8`  |
//! | screen        | surface preferred format (or `Rgba8Unorm` headless) |
//!
//! Every full-screen input is sampled with a nearest, clamp-to-edge sampler.
//! Material textures use a nearest, repeat sampler; untextured objects bind
//! a 1×1 white texture.
//! Depth sharing clones the depth texture handle into the target, so both
//! targets render against the same GPU resource.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec4};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use wgpu::util::DeviceExt;

use super::{DrawOutput, RenderBackend};
use crate::errors::{PostFxError, Result};
use crate::renderer::program::ShaderProgram;
use crate::renderer::shader_library::{ShaderModuleCache, scene_source};
use crate::renderer::target::{ClearOps, Extent, TargetDesc};
use crate::pixels::PixelBuffer;
use crate::scene::{Mesh, RenderRequest, Shading};
use crate::settings::CompositorSettings;

pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;

/// Per-object uniform block of `scene/flat_lit.wgsl`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct ObjectUniforms {
    view_projection: [[f32; 4]; 4],
    model: [[f32; 4]; 4],
    color: [f32; 4],
    light_direction: [f32; 4],
    light_color: [f32; 4],
    /// rgb: ambient, a: 1 for Lambert shading.
    ambient: [f32; 4],
    /// xy: texture repeat.
    uv_repeat: [f32; 4],
}

#[derive(Debug, Clone)]
struct GpuDepth {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

/// Offscreen target of the wgpu backend.
#[derive(Debug)]
pub struct GpuTarget {
    label: &'static str,
    extent: Extent,
    color: wgpu::Texture,
    color_view: wgpu::TextureView,
    depth: Option<GpuDepth>,
    has_stencil: bool,
}

impl GpuTarget {
    #[inline]
    #[must_use]
    pub fn color_texture(&self) -> &wgpu::Texture {
        &self.color
    }

    /// `true` when both targets render against the same depth texture.
    #[must_use]
    pub fn shares_depth_with(&self, other: &Self) -> bool {
        match (&self.depth, &other.depth) {
            (Some(a), Some(b)) => a.texture == b.texture,
            _ => false,
        }
    }
}

#[derive(Clone)]
struct MeshBuffers {
    _mesh: Arc<Mesh>,
    positions: wgpu::Buffer,
    uvs: wgpu::Buffer,
    indices: wgpu::Buffer,
    index_count: u32,
}

struct GpuTexture {
    _image: Arc<PixelBuffer>,
    view: wgpu::TextureView,
}

enum Screen {
    Surface {
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
        frame: Option<(wgpu::SurfaceTexture, wgpu::TextureView)>,
        /// The acquired frame was suboptimal; reconfigure after presenting.
        reconfigure: bool,
    },
    Offscreen {
        texture: wgpu::Texture,
        view: wgpu::TextureView,
    },
}

pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    screen: Screen,
    screen_format: wgpu::TextureFormat,
    max_dimension: u32,

    sampler: wgpu::Sampler,
    repeat_sampler: wgpu::Sampler,
    white_texture: wgpu::TextureView,
    shaders: ShaderModuleCache,
    /// Texture count → layout.
    fullscreen_layouts: FxHashMap<usize, wgpu::BindGroupLayout>,
    /// (program source hash, output format) → pipeline.
    fullscreen_pipelines: FxHashMap<(u128, wgpu::TextureFormat), wgpu::RenderPipeline>,
    object_layout: wgpu::BindGroupLayout,
    /// Has depth attachment → pipeline.
    scene_pipelines: FxHashMap<bool, wgpu::RenderPipeline>,
    meshes: FxHashMap<*const Mesh, MeshBuffers>,
    textures: FxHashMap<*const PixelBuffer, GpuTexture>,

    encoder: Option<wgpu::CommandEncoder>,
}

fn request_device(
    instance: &wgpu::Instance,
    surface: Option<&wgpu::Surface<'_>>,
    settings: &CompositorSettings,
) -> Result<(wgpu::Adapter, wgpu::Device, wgpu::Queue)> {
    let power_preference = if settings.high_performance {
        wgpu::PowerPreference::HighPerformance
    } else {
        wgpu::PowerPreference::LowPower
    };

    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference,
        compatible_surface: surface,
        force_fallback_adapter: false,
    }))
    .map_err(|e| PostFxError::AdapterRequestFailed(e.to_string()))?;

    log::info!("Using adapter: {}", adapter.get_info().name);

    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("PostFX Device"),
        required_features: wgpu::Features::empty(),
        required_limits: wgpu::Limits::default(),
        memory_hints: wgpu::MemoryHints::Performance,
        ..Default::default()
    }))?;

    Ok((adapter, device, queue))
}

impl WgpuBackend {
    /// Creates a backend presenting to `window`.
    pub fn new<W>(window: W, settings: &CompositorSettings, width: u32, height: u32) -> Result<Self>
    where
        W: Into<wgpu::SurfaceTarget<'static>>,
    {
        let instance = wgpu::Instance::default();
        let surface = instance.create_surface(window)?;
        let (adapter, device, queue) = request_device(&instance, Some(&surface), settings)?;

        let mut config = surface
            .get_default_config(&adapter, width.max(1), height.max(1))
            .ok_or_else(|| {
                PostFxError::AdapterRequestFailed("Surface not supported by adapter".to_string())
            })?;
        config.present_mode = if settings.vsync {
            wgpu::PresentMode::AutoVsync
        } else {
            wgpu::PresentMode::AutoNoVsync
        };
        surface.configure(&device, &config);

        let screen_format = config.format;
        let screen = Screen::Surface {
            surface,
            config,
            frame: None,
            reconfigure: false,
        };
        Ok(Self::from_parts(device, queue, screen, screen_format))
    }

    /// Creates a backend that renders the screen into an offscreen texture.
    pub fn headless(settings: &CompositorSettings, width: u32, height: u32) -> Result<Self> {
        let instance = wgpu::Instance::default();
        let (_adapter, device, queue) = request_device(&instance, None, settings)?;
        let (texture, view) = create_screen_texture(&device, Extent::new(width, height));
        let screen = Screen::Offscreen { texture, view };
        Ok(Self::from_parts(device, queue, screen, COLOR_FORMAT))
    }

    fn from_parts(
        device: wgpu::Device,
        queue: wgpu::Queue,
        screen: Screen,
        screen_format: wgpu::TextureFormat,
    ) -> Self {
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Nearest Clamp Sampler"),
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            ..Default::default()
        });

        let repeat_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Nearest Repeat Sampler"),
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            ..Default::default()
        });

        let white_texture = upload_texture(
            &device,
            &queue,
            "White Texture",
            &PixelBuffer::new(1, 1, Vec4::ONE),
        );

        let object_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Object BindGroup Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let max_dimension = device.limits().max_texture_dimension_2d;

        Self {
            device,
            queue,
            screen,
            screen_format,
            max_dimension,
            sampler,
            repeat_sampler,
            white_texture,
            shaders: ShaderModuleCache::new(),
            fullscreen_layouts: FxHashMap::default(),
            fullscreen_pipelines: FxHashMap::default(),
            object_layout,
            scene_pipelines: FxHashMap::default(),
            meshes: FxHashMap::default(),
            textures: FxHashMap::default(),
            encoder: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    #[inline]
    #[must_use]
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// The offscreen screen texture of a headless backend.
    #[must_use]
    pub fn screen_texture(&self) -> Option<&wgpu::Texture> {
        match &self.screen {
            Screen::Offscreen { texture, .. } => Some(texture),
            Screen::Surface { .. } => None,
        }
    }

    fn encoder(&mut self) -> &mut wgpu::CommandEncoder {
        self.encoder.get_or_insert_with(|| {
            self.device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("PostFX Frame Encoder"),
                })
        })
    }

    fn screen_view(&self) -> Result<wgpu::TextureView> {
        match &self.screen {
            Screen::Surface { frame, .. } => frame
                .as_ref()
                .map(|(_, view)| view.clone())
                .ok_or_else(|| PostFxError::SurfaceUnavailable("no frame acquired".to_string())),
            Screen::Offscreen { view, .. } => Ok(view.clone()),
        }
    }

    fn fullscreen_layout(&mut self, texture_count: usize) -> wgpu::BindGroupLayout {
        let device = &self.device;
        self.fullscreen_layouts
            .entry(texture_count)
            .or_insert_with(|| {
                let mut entries = vec![
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ];
                entries.extend((0..texture_count).map(|i| wgpu::BindGroupLayoutEntry {
                    binding: 2 + i as u32,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                }));
                device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("Fullscreen BindGroup Layout"),
                    entries: &entries,
                })
            })
            .clone()
    }

    fn fullscreen_pipeline(
        &mut self,
        program: &ShaderProgram,
        layout: &wgpu::BindGroupLayout,
        format: wgpu::TextureFormat,
    ) -> wgpu::RenderPipeline {
        let key = (program.source_hash(), format);
        if let Some(pipeline) = self.fullscreen_pipelines.get(&key) {
            return pipeline.clone();
        }

        log::debug!("Creating pipeline '{}' for {format:?}", program.label());

        let (module, _) = self
            .shaders
            .get_or_compile(&self.device, program.label(), program.source());

        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(program.label()),
                bind_group_layouts: &[Some(layout)],
                immediate_size: 0,
            });

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(program.label()),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module,
                    entry_point: Some("vs_main"),
                    buffers: &[],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            });

        self.fullscreen_pipelines.insert(key, pipeline.clone());
        pipeline
    }

    fn scene_pipeline(&mut self, with_depth: bool) -> Result<wgpu::RenderPipeline> {
        if let Some(pipeline) = self.scene_pipelines.get(&with_depth) {
            return Ok(pipeline.clone());
        }

        let source = scene_source()?;
        let (module, _) = self
            .shaders
            .get_or_compile(&self.device, "Flat Lit", &source);

        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Scene Pipeline Layout"),
                bind_group_layouts: &[Some(&self.object_layout)],
                immediate_size: 0,
            });

        let depth_stencil = with_depth.then(|| wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: Some(true),
            depth_compare: Some(wgpu::CompareFunction::LessEqual),
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        });

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Scene Pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module,
                    entry_point: Some("vs_main"),
                    buffers: &[
                        wgpu::VertexBufferLayout {
                            array_stride: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                            step_mode: wgpu::VertexStepMode::Vertex,
                            attributes: &wgpu::vertex_attr_array![0 => Float32x3],
                        },
                        wgpu::VertexBufferLayout {
                            array_stride: std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
                            step_mode: wgpu::VertexStepMode::Vertex,
                            attributes: &wgpu::vertex_attr_array![1 => Float32x2],
                        },
                    ],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: COLOR_FORMAT,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil,
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            });

        log::debug!("Created scene pipeline (depth: {with_depth})");
        self.scene_pipelines.insert(with_depth, pipeline.clone());
        Ok(pipeline)
    }

    fn mesh_buffers(&mut self, mesh: &Arc<Mesh>) -> MeshBuffers {
        let device = &self.device;
        self.meshes
            .entry(Arc::as_ptr(mesh))
            .or_insert_with(|| MeshBuffers {
                _mesh: Arc::clone(mesh),
                positions: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Mesh Positions"),
                    contents: bytemuck::cast_slice(mesh.positions()),
                    usage: wgpu::BufferUsages::VERTEX,
                }),
                uvs: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Mesh UVs"),
                    contents: bytemuck::cast_slice(mesh.uvs()),
                    usage: wgpu::BufferUsages::VERTEX,
                }),
                indices: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Mesh Indices"),
                    contents: bytemuck::cast_slice(mesh.indices()),
                    usage: wgpu::BufferUsages::INDEX,
                }),
                index_count: mesh.indices().len() as u32,
            })
            .clone()
    }

    fn texture_view(&mut self, image: &Arc<PixelBuffer>) -> wgpu::TextureView {
        let (device, queue) = (&self.device, &self.queue);
        self.textures
            .entry(Arc::as_ptr(image))
            .or_insert_with(|| GpuTexture {
                _image: Arc::clone(image),
                view: upload_texture(device, queue, "Material Texture", image),
            })
            .view
            .clone()
    }
}

/// Uploads `image` as an `Rgba8Unorm` texture.
fn upload_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    image: &PixelBuffer,
) -> wgpu::TextureView {
    let texture = device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: image.width().max(1),
                height: image.height().max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: COLOR_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        wgpu::util::TextureDataOrder::LayerMajor,
        image.to_rgba8().as_raw(),
    );
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

fn create_screen_texture(device: &wgpu::Device, extent: Extent) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Offscreen Screen"),
        size: wgpu::Extent3d {
            width: extent.width.max(1),
            height: extent.height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: COLOR_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

fn to_wgpu_color(c: Vec4) -> wgpu::Color {
    wgpu::Color {
        r: f64::from(c.x),
        g: f64::from(c.y),
        b: f64::from(c.z),
        a: f64::from(c.w),
    }
}

impl RenderBackend for WgpuBackend {
    type Target = GpuTarget;

    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn create_target(&mut self, desc: &TargetDesc, extent: Extent) -> Result<GpuTarget> {
        if extent.width > self.max_dimension || extent.height > self.max_dimension {
            return Err(PostFxError::ResourceExhausted {
                label: desc.label(),
                width: extent.width,
                height: extent.height,
                reason: format!("exceeds max_texture_dimension_2d ({})", self.max_dimension),
            });
        }

        let size = wgpu::Extent3d {
            width: extent.width,
            height: extent.height,
            depth_or_array_layers: 1,
        };

        let color = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label()),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: COLOR_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());

        let depth = desc.has_depth.then(|| {
            let texture = self.device.create_texture(&wgpu::TextureDescriptor {
                label: Some(desc.label()),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: DEPTH_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            });
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            GpuDepth { texture, view }
        });

        log::debug!(
            "Created GPU target '{}' {}x{} (depth: {})",
            desc.label(),
            extent.width,
            extent.height,
            desc.has_depth
        );

        Ok(GpuTarget {
            label: desc.label(),
            extent,
            color,
            color_view,
            depth,
            has_stencil: desc.has_stencil,
        })
    }

    fn target_extent(&self, target: &GpuTarget) -> Extent {
        target.extent
    }

    fn has_depth(&self, target: &GpuTarget) -> bool {
        target.depth.is_some()
    }

    fn clear(&mut self, target: &mut GpuTarget, ops: &ClearOps) -> Result<()> {
        if ops.is_noop() {
            return Ok(());
        }

        let color_load = ops
            .color
            .map_or(wgpu::LoadOp::Load, |c| wgpu::LoadOp::Clear(to_wgpu_color(c)));
        let depth_view = target.depth.as_ref().map(|d| d.view.clone());
        let stencil = ops.stencil.filter(|_| target.has_stencil);
        let color_view = target.color_view.clone();

        let encoder = self.encoder();
        let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(target.label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: color_load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: depth_view.as_ref().map(|view| {
                wgpu::RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: Some(wgpu::Operations {
                        load: ops.depth.map_or(wgpu::LoadOp::Load, wgpu::LoadOp::Clear),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: Some(wgpu::Operations {
                        load: stencil.map_or(wgpu::LoadOp::Load, wgpu::LoadOp::Clear),
                        store: wgpu::StoreOp::Store,
                    }),
                }
            }),
            ..Default::default()
        });
        Ok(())
    }

    fn draw_scene(&mut self, request: &RenderRequest, target: &mut GpuTarget) -> Result<()> {
        let pipeline = self.scene_pipeline(target.depth.is_some())?;

        let mut draws = Vec::with_capacity(request.items.len());
        // Empty vertex buffers cannot be bound.
        for item in request.items.iter().filter(|item| item.mesh.triangle_count() > 0) {
            let (map_view, uv_repeat) = match &item.map {
                Some(map) => (self.texture_view(&map.image), map.repeat),
                None => (self.white_texture.clone(), Vec2::ONE),
            };
            let uniforms = ObjectUniforms {
                view_projection: request.camera.view_projection.to_cols_array_2d(),
                model: item.transform.to_cols_array_2d(),
                color: item.color.to_array(),
                light_direction: request.lighting.direction.extend(0.0).to_array(),
                light_color: request.lighting.color.extend(0.0).to_array(),
                ambient: request
                    .lighting
                    .ambient
                    .extend(if item.shading == Shading::Lambert { 1.0 } else { 0.0 })
                    .to_array(),
                uv_repeat: [uv_repeat.x, uv_repeat.y, 0.0, 0.0],
            };
            let buffer = self
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Object Uniforms"),
                    contents: bytemuck::bytes_of(&uniforms),
                    usage: wgpu::BufferUsages::UNIFORM,
                });
            let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Object BindGroup"),
                layout: &self.object_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(&map_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::Sampler(&self.repeat_sampler),
                    },
                ],
            });
            draws.push((bind_group, self.mesh_buffers(&item.mesh)));
        }

        let color_view = target.color_view.clone();
        let depth_view = target.depth.as_ref().map(|d| d.view.clone());

        let encoder = self.encoder();
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(target.label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: depth_view.as_ref().map(|view| {
                wgpu::RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    }),
                    // DEPTH_FORMAT always carries a stencil aspect.
                    stencil_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    }),
                }
            }),
            ..Default::default()
        });

        pass.set_pipeline(&pipeline);
        for (bind_group, buffers) in &draws {
            pass.set_bind_group(0, bind_group, &[]);
            pass.set_vertex_buffer(0, buffers.positions.slice(..));
            pass.set_vertex_buffer(1, buffers.uvs.slice(..));
            pass.set_index_buffer(buffers.indices.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..buffers.index_count, 0, 0..1);
        }
        Ok(())
    }

    fn draw_fullscreen(
        &mut self,
        program: &ShaderProgram,
        inputs: &[(&str, &GpuTarget)],
        output: DrawOutput<'_, GpuTarget>,
    ) -> Result<()> {
        let (output_view, format, label) = match output {
            DrawOutput::Target(target) => (target.color_view.clone(), COLOR_FORMAT, target.label),
            DrawOutput::Screen => (self.screen_view()?, self.screen_format, "screen"),
        };

        let views: SmallVec<[wgpu::TextureView; 4]> = program
            .textures()
            .iter()
            .map(|name| {
                let Some((_, target)) = inputs.iter().find(|(n, _)| n == name) else {
                    panic!("program '{}' has no input bound to '{name}'", program.label());
                };
                target.color_view.clone()
            })
            .collect();

        let layout = self.fullscreen_layout(views.len());
        let pipeline = self.fullscreen_pipeline(program, &layout, format);

        let uniforms = program.pack_uniforms();
        let uniform_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Pass Uniforms"),
                contents: bytemuck::bytes_of(&uniforms),
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let mut entries = vec![
            wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&self.sampler),
            },
        ];
        entries.extend(views.iter().enumerate().map(|(i, view)| wgpu::BindGroupEntry {
            binding: 2 + i as u32,
            resource: wgpu::BindingResource::TextureView(view),
        }));
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(program.label()),
            layout: &layout,
            entries: &entries,
        });

        let encoder = self.encoder();
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &output_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            ..Default::default()
        });
        pass.set_pipeline(&pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..6, 0..1);
        Ok(())
    }

    fn supports_depth_sharing(&self) -> bool {
        true
    }

    fn share_depth(&mut self, source: &GpuTarget, target: &mut GpuTarget) -> Result<()> {
        let depth = source
            .depth
            .clone()
            .ok_or(PostFxError::MissingDepthAttachment(source.label))?;
        if target.depth.is_none() {
            return Err(PostFxError::MissingDepthAttachment(target.label));
        }
        target.depth = Some(depth);
        Ok(())
    }

    fn resize_surface(&mut self, extent: Extent) -> Result<()> {
        if extent.is_empty() {
            return Err(PostFxError::InvalidExtent {
                width: extent.width,
                height: extent.height,
            });
        }
        match &mut self.screen {
            Screen::Surface { surface, config, .. } => {
                config.width = extent.width;
                config.height = extent.height;
                surface.configure(&self.device, config);
            }
            Screen::Offscreen { texture, view } => {
                (*texture, *view) = create_screen_texture(&self.device, extent);
            }
        }
        Ok(())
    }

    fn begin_frame(&mut self) -> Result<()> {
        let Screen::Surface {
            surface,
            config,
            frame,
            reconfigure,
        } = &mut self.screen
        else {
            return Ok(());
        };

        let output = match surface.get_current_texture() {
            wgpu::CurrentSurfaceTexture::Success(output) => output,
            wgpu::CurrentSurfaceTexture::Suboptimal(output) => {
                *reconfigure = true;
                output
            }
            wgpu::CurrentSurfaceTexture::Timeout => {
                return Err(PostFxError::SurfaceUnavailable("timeout".to_string()));
            }
            wgpu::CurrentSurfaceTexture::Occluded => {
                return Err(PostFxError::SurfaceUnavailable("occluded".to_string()));
            }
            wgpu::CurrentSurfaceTexture::Outdated => {
                surface.configure(&self.device, config);
                return Err(PostFxError::SurfaceUnavailable("outdated".to_string()));
            }
            wgpu::CurrentSurfaceTexture::Lost => {
                log::warn!("Surface lost, reconfiguring");
                surface.configure(&self.device, config);
                return Err(PostFxError::SurfaceUnavailable("lost".to_string()));
            }
            wgpu::CurrentSurfaceTexture::Validation => {
                log::error!("Validation error while acquiring the surface texture");
                return Err(PostFxError::SurfaceUnavailable("validation error".to_string()));
            }
        };

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        *frame = Some((output, view));
        Ok(())
    }

    fn present(&mut self) -> Result<()> {
        if let Some(encoder) = self.encoder.take() {
            self.queue.submit(Some(encoder.finish()));
        }
        if let Screen::Surface {
            surface,
            config,
            frame,
            reconfigure,
        } = &mut self.screen
        {
            if let Some((output, _view)) = frame.take() {
                output.present();
            }
            if std::mem::take(reconfigure) {
                surface.configure(&self.device, config);
            }
        }
        Ok(())
    }
}
