use scene::components::Geometry;

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

/// Interleave positions and normals. Geometry without normals gets
/// area-weighted vertex normals.
pub fn mesh_vertices(geometry: &Geometry) -> Vec<MeshVertex> {
    let computed;
    let normals = match &geometry.normals {
        Some(n) if n.len() == geometry.positions.len() => n,
        _ => {
            computed = smooth_normals(&geometry.positions, &geometry.indices);
            &computed
        }
    };
    geometry
        .positions
        .iter()
        .zip(normals)
        .map(|(&position, &normal)| MeshVertex { position, normal })
        .collect()
}

fn smooth_normals(positions: &[[f32; 3]], indices: &[u32]) -> Vec<[f32; 3]> {
    let mut acc = vec![[0.0f32; 3]; positions.len()];
    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        let (Some(pa), Some(pb), Some(pc)) = (positions.get(a), positions.get(b), positions.get(c))
        else {
            continue;
        };
        let e1 = [pb[0] - pa[0], pb[1] - pa[1], pb[2] - pa[2]];
        let e2 = [pc[0] - pa[0], pc[1] - pa[1], pc[2] - pa[2]];
        let n = [
            e1[1] * e2[2] - e1[2] * e2[1],
            e1[2] * e2[0] - e1[0] * e2[2],
            e1[0] * e2[1] - e1[1] * e2[0],
        ];
        for i in [a, b, c] {
            for k in 0..3 {
                acc[i][k] += n[k];
            }
        }
    }
    acc.into_iter()
        .map(|n| {
            let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
            if len > 0.0 {
                [n[0] / len, n[1] / len, n[2] / len]
            } else {
                [0.0, 1.0, 0.0]
            }
        })
        .collect()
}

#[cfg(target_arch = "wasm32")]
mod imp {
    use super::{MeshVertex, mesh_vertices};
    use ::wgpu::util::DeviceExt;
    use gpu::backend::{BackendFactory, CameraView, GpuContextError, RenderBackend};
    use gpu::renderer::Renderer;
    use gpu::settings::RendererSettings;
    use scene::instance::ModelInstance;
    use std::borrow::Cow;
    use std::cell::RefCell;
    use std::rc::Rc;
    use wasm_bindgen::JsCast;
    use wasm_bindgen::prelude::*;
    use wasm_bindgen_futures::spawn_local;

    const MESH_SHADER: &str = r#"
struct Globals {
    view_proj: mat4x4<f32>,
    light_dir: vec3<f32>,
    _pad: f32,
};

struct MeshUniforms {
    model: mat4x4<f32>,
    base_color: vec4<f32>,
};

@group(0) @binding(0)
var<uniform> globals: Globals;

@group(1) @binding(0)
var<uniform> mesh: MeshUniforms;

struct VsOut {
    @builtin(position) pos: vec4<f32>,
    @location(0) normal: vec3<f32>,
};

@vertex
fn vs_main(@location(0) position: vec3<f32>, @location(1) normal: vec3<f32>) -> VsOut {
    let world = mesh.model * vec4<f32>(position, 1.0);
    return VsOut(
        globals.view_proj * world,
        (mesh.model * vec4<f32>(normal, 0.0)).xyz,
    );
}

@fragment
fn fs_main(fs_in: VsOut) -> @location(0) vec4<f32> {
    let n = normalize(fs_in.normal);
    let l = normalize(globals.light_dir);
    let shade = 0.35 + 0.65 * max(dot(n, l), 0.0);
    return vec4<f32>(mesh.base_color.rgb * shade, mesh.base_color.a);
}
"#;

    #[repr(C)]
    #[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
    struct Globals {
        view_proj: [[f32; 4]; 4],
        light_dir: [f32; 3],
        _pad: f32,
    }

    #[repr(C)]
    #[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
    struct MeshUniforms {
        model: [[f32; 4]; 4],
        base_color: [f32; 4],
    }

    struct GpuMesh {
        vertex_buffer: ::wgpu::Buffer,
        index_buffer: ::wgpu::Buffer,
        index_count: u32,
        _uniform_buffer: ::wgpu::Buffer,
        bind_group: ::wgpu::BindGroup,
    }

    struct MeshContext {
        surface: ::wgpu::Surface<'static>,
        _instance: ::wgpu::Instance,
        device: ::wgpu::Device,
        queue: ::wgpu::Queue,
        config: ::wgpu::SurfaceConfiguration,
        sample_count: u32,
        pipeline: ::wgpu::RenderPipeline,
        globals_buffer: ::wgpu::Buffer,
        globals_bind_group: ::wgpu::BindGroup,
        mesh_layout: ::wgpu::BindGroupLayout,
        depth_view: ::wgpu::TextureView,
        msaa_view: Option<::wgpu::TextureView>,
        meshes: Vec<GpuMesh>,
    }

    fn create_depth_view(
        device: &::wgpu::Device,
        config: &::wgpu::SurfaceConfiguration,
        sample_count: u32,
    ) -> ::wgpu::TextureView {
        let tex = device.create_texture(&::wgpu::TextureDescriptor {
            label: Some("viewer-depth"),
            size: ::wgpu::Extent3d {
                width: config.width.max(1),
                height: config.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count,
            dimension: ::wgpu::TextureDimension::D2,
            format: ::wgpu::TextureFormat::Depth24Plus,
            usage: ::wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        tex.create_view(&::wgpu::TextureViewDescriptor::default())
    }

    fn create_msaa_view(
        device: &::wgpu::Device,
        config: &::wgpu::SurfaceConfiguration,
        sample_count: u32,
    ) -> Option<::wgpu::TextureView> {
        if sample_count <= 1 {
            return None;
        }
        let tex = device.create_texture(&::wgpu::TextureDescriptor {
            label: Some("viewer-msaa"),
            size: ::wgpu::Extent3d {
                width: config.width.max(1),
                height: config.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count,
            dimension: ::wgpu::TextureDimension::D2,
            format: config.format,
            usage: ::wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        Some(tex.create_view(&::wgpu::TextureViewDescriptor::default()))
    }

    fn uniform_layout_entry() -> ::wgpu::BindGroupLayoutEntry {
        ::wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: ::wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: ::wgpu::BindingType::Buffer {
                ty: ::wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }
    }

    impl MeshContext {
        async fn new(
            canvas: web_sys::HtmlCanvasElement,
            settings: &RendererSettings,
        ) -> Result<Self, GpuContextError> {
            // Prefer WebGPU when available, but allow WebGL as a fallback.
            let instance = ::wgpu::Instance::new(&::wgpu::InstanceDescriptor {
                backends: ::wgpu::Backends::BROWSER_WEBGPU | ::wgpu::Backends::GL,
                ..Default::default()
            });

            let surface = instance
                .create_surface(::wgpu::SurfaceTarget::Canvas(canvas))
                .map_err(|e| GpuContextError::Surface {
                    reason: e.to_string(),
                })?;

            let adapter = instance
                .request_adapter(&::wgpu::RequestAdapterOptions {
                    power_preference: ::wgpu::PowerPreference::HighPerformance,
                    compatible_surface: Some(&surface),
                    force_fallback_adapter: false,
                })
                .await
                .map_err(|e| GpuContextError::Unavailable {
                    reason: e.to_string(),
                })?;

            let (device, queue) = adapter
                .request_device(&::wgpu::DeviceDescriptor {
                    label: Some("viewer-device"),
                    required_features: ::wgpu::Features::empty(),
                    required_limits: ::wgpu::Limits::downlevel_webgl2_defaults(),
                    ..Default::default()
                })
                .await
                .map_err(|e| GpuContextError::Device {
                    reason: e.to_string(),
                })?;

            let caps = surface.get_capabilities(&adapter);
            let format = caps
                .formats
                .iter()
                .copied()
                .find(|f| f.is_srgb())
                .or_else(|| caps.formats.first().copied())
                .ok_or_else(|| GpuContextError::Surface {
                    reason: "surface reports no formats".to_string(),
                })?;
            let alpha_mode = caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(::wgpu::CompositeAlphaMode::Auto);

            let config = ::wgpu::SurfaceConfiguration {
                usage: ::wgpu::TextureUsages::RENDER_ATTACHMENT,
                format,
                width: settings.surface_width,
                height: settings.surface_height,
                desired_maximum_frame_latency: 2,
                present_mode: ::wgpu::PresentMode::Fifo,
                alpha_mode,
                view_formats: vec![],
            };
            surface.configure(&device, &config);

            let sample_count = if settings.antialias { 4 } else { 1 };
            let depth_view = create_depth_view(&device, &config, sample_count);
            let msaa_view = create_msaa_view(&device, &config, sample_count);

            let shader = device.create_shader_module(::wgpu::ShaderModuleDescriptor {
                label: Some("viewer-mesh-shader"),
                source: ::wgpu::ShaderSource::Wgsl(Cow::Borrowed(MESH_SHADER)),
            });

            let globals_buffer = device.create_buffer(&::wgpu::BufferDescriptor {
                label: Some("viewer-globals"),
                size: std::mem::size_of::<Globals>() as u64,
                usage: ::wgpu::BufferUsages::UNIFORM | ::wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let globals_layout =
                device.create_bind_group_layout(&::wgpu::BindGroupLayoutDescriptor {
                    label: Some("viewer-globals-bgl"),
                    entries: &[uniform_layout_entry()],
                });
            let mesh_layout = device.create_bind_group_layout(&::wgpu::BindGroupLayoutDescriptor {
                label: Some("viewer-mesh-bgl"),
                entries: &[uniform_layout_entry()],
            });
            let globals_bind_group = device.create_bind_group(&::wgpu::BindGroupDescriptor {
                label: Some("viewer-globals-bg"),
                layout: &globals_layout,
                entries: &[::wgpu::BindGroupEntry {
                    binding: 0,
                    resource: globals_buffer.as_entire_binding(),
                }],
            });

            let pipeline_layout =
                device.create_pipeline_layout(&::wgpu::PipelineLayoutDescriptor {
                    label: Some("viewer-mesh-pipeline-layout"),
                    bind_group_layouts: &[&globals_layout, &mesh_layout],
                    immediate_size: 0,
                });

            let pipeline = device.create_render_pipeline(&::wgpu::RenderPipelineDescriptor {
                label: Some("viewer-mesh-pipeline"),
                layout: Some(&pipeline_layout),
                vertex: ::wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &[::wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<MeshVertex>() as ::wgpu::BufferAddress,
                        step_mode: ::wgpu::VertexStepMode::Vertex,
                        attributes: &[
                            ::wgpu::VertexAttribute {
                                format: ::wgpu::VertexFormat::Float32x3,
                                offset: 0,
                                shader_location: 0,
                            },
                            ::wgpu::VertexAttribute {
                                format: ::wgpu::VertexFormat::Float32x3,
                                offset: 12,
                                shader_location: 1,
                            },
                        ],
                    }],
                },
                fragment: Some(::wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    compilation_options: Default::default(),
                    targets: &[Some(::wgpu::ColorTargetState {
                        format: config.format,
                        blend: Some(::wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: ::wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: ::wgpu::PrimitiveState {
                    topology: ::wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: ::wgpu::FrontFace::Ccw,
                    // Authored models are not guaranteed to be closed.
                    cull_mode: None,
                    polygon_mode: ::wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: Some(::wgpu::DepthStencilState {
                    format: ::wgpu::TextureFormat::Depth24Plus,
                    depth_write_enabled: true,
                    depth_compare: ::wgpu::CompareFunction::Less,
                    stencil: ::wgpu::StencilState::default(),
                    bias: ::wgpu::DepthBiasState::default(),
                }),
                multisample: ::wgpu::MultisampleState {
                    count: sample_count,
                    mask: !0,
                    alpha_to_coverage_enabled: false,
                },
                multiview_mask: None,
                cache: None,
            });

            Ok(Self {
                surface,
                _instance: instance,
                device,
                queue,
                config,
                sample_count,
                pipeline,
                globals_buffer,
                globals_bind_group,
                mesh_layout,
                depth_view,
                msaa_view,
                meshes: Vec::new(),
            })
        }

        fn resize(&mut self, width: u32, height: u32) {
            let (width, height) = (width.max(1), height.max(1));
            if self.config.width == width && self.config.height == height {
                return;
            }
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.device, &self.config);
            self.depth_view = create_depth_view(&self.device, &self.config, self.sample_count);
            self.msaa_view = create_msaa_view(&self.device, &self.config, self.sample_count);
        }

        fn upload(&mut self, model: &ModelInstance) {
            let frame = Renderer::collect(model);
            self.meshes = frame
                .draws
                .iter()
                .filter(|draw| !draw.mesh.geometry.indices.is_empty())
                .map(|draw| {
                    let vertices = mesh_vertices(&draw.mesh.geometry);
                    let vertex_buffer =
                        self.device
                            .create_buffer_init(&::wgpu::util::BufferInitDescriptor {
                                label: Some("viewer-mesh-vertices"),
                                contents: bytemuck::cast_slice(&vertices),
                                usage: ::wgpu::BufferUsages::VERTEX,
                            });
                    let index_buffer =
                        self.device
                            .create_buffer_init(&::wgpu::util::BufferInitDescriptor {
                                label: Some("viewer-mesh-indices"),
                                contents: bytemuck::cast_slice(&draw.mesh.geometry.indices),
                                usage: ::wgpu::BufferUsages::INDEX,
                            });
                    let uniforms = MeshUniforms {
                        model: draw.model,
                        base_color: draw.mesh.material.base_color,
                    };
                    let uniform_buffer =
                        self.device
                            .create_buffer_init(&::wgpu::util::BufferInitDescriptor {
                                label: Some("viewer-mesh-uniforms"),
                                contents: bytemuck::bytes_of(&uniforms),
                                usage: ::wgpu::BufferUsages::UNIFORM,
                            });
                    let bind_group = self.device.create_bind_group(&::wgpu::BindGroupDescriptor {
                        label: Some("viewer-mesh-bg"),
                        layout: &self.mesh_layout,
                        entries: &[::wgpu::BindGroupEntry {
                            binding: 0,
                            resource: uniform_buffer.as_entire_binding(),
                        }],
                    });
                    GpuMesh {
                        vertex_buffer,
                        index_buffer,
                        index_count: draw.mesh.geometry.indices.len() as u32,
                        _uniform_buffer: uniform_buffer,
                        bind_group,
                    }
                })
                .collect();
        }

        fn render(&self, camera: &CameraView) -> Result<(), GpuContextError> {
            let frame = self
                .surface
                .get_current_texture()
                .map_err(|e| GpuContextError::Surface {
                    reason: format!("surface acquire failed: {e}"),
                })?;
            let frame_view = frame
                .texture
                .create_view(&::wgpu::TextureViewDescriptor::default());

            let globals = Globals {
                view_proj: camera.view_proj,
                light_dir: [0.4, 0.8, 0.3],
                _pad: 0.0,
            };
            self.queue
                .write_buffer(&self.globals_buffer, 0, bytemuck::bytes_of(&globals));

            let mut encoder = self
                .device
                .create_command_encoder(&::wgpu::CommandEncoderDescriptor {
                    label: Some("viewer-mesh-encoder"),
                });

            {
                let (view, resolve_target) = match &self.msaa_view {
                    Some(msaa) => (msaa, Some(&frame_view)),
                    None => (&frame_view, None),
                };
                let mut rpass = encoder.begin_render_pass(&::wgpu::RenderPassDescriptor {
                    label: Some("viewer-mesh-pass"),
                    color_attachments: &[Some(::wgpu::RenderPassColorAttachment {
                        view,
                        resolve_target,
                        depth_slice: None,
                        ops: ::wgpu::Operations {
                            // Transparent so the page background shows through.
                            load: ::wgpu::LoadOp::Clear(::wgpu::Color::TRANSPARENT),
                            store: ::wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: Some(::wgpu::RenderPassDepthStencilAttachment {
                        view: &self.depth_view,
                        depth_ops: Some(::wgpu::Operations {
                            load: ::wgpu::LoadOp::Clear(1.0),
                            store: ::wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }),
                    occlusion_query_set: None,
                    timestamp_writes: None,
                    multiview_mask: None,
                });

                rpass.set_pipeline(&self.pipeline);
                rpass.set_bind_group(0, &self.globals_bind_group, &[]);
                for mesh in &self.meshes {
                    rpass.set_bind_group(1, &mesh.bind_group, &[]);
                    rpass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                    rpass.set_index_buffer(
                        mesh.index_buffer.slice(..),
                        ::wgpu::IndexFormat::Uint32,
                    );
                    rpass.draw_indexed(0..mesh.index_count, 0, 0..1);
                }
            }

            self.queue.submit(std::iter::once(encoder.finish()));
            frame.present();
            Ok(())
        }
    }

    enum GpuState {
        Pending,
        Ready(Box<MeshContext>),
        Failed(String),
        Disposed,
    }

    /// wgpu renderer drawing into a canvas appended to the container.
    ///
    /// Device creation is asynchronous in the browser. The backend reports
    /// not ready until it completes, and an initialization failure is
    /// reported by the next `render`.
    pub struct WgpuBackend {
        canvas: web_sys::HtmlCanvasElement,
        state: Rc<RefCell<GpuState>>,
        settings: RendererSettings,
        model: Option<ModelInstance>,
        uploaded: bool,
    }

    fn size_canvas(canvas: &web_sys::HtmlCanvasElement, settings: &RendererSettings) {
        canvas.set_width(settings.surface_width);
        canvas.set_height(settings.surface_height);
    }

    impl RenderBackend for WgpuBackend {
        fn resize(&mut self, settings: &RendererSettings) {
            self.settings = *settings;
            size_canvas(&self.canvas, settings);
            if let GpuState::Ready(ctx) = &mut *self.state.borrow_mut() {
                ctx.resize(settings.surface_width, settings.surface_height);
            }
        }

        fn set_model(&mut self, model: &ModelInstance) {
            self.model = Some(model.clone());
            self.uploaded = false;
        }

        fn is_ready(&self) -> bool {
            !matches!(*self.state.borrow(), GpuState::Pending)
        }

        fn render(&mut self, view: &CameraView) -> Result<(), GpuContextError> {
            let mut state = self.state.borrow_mut();
            match &mut *state {
                GpuState::Pending | GpuState::Disposed => Ok(()),
                GpuState::Failed(reason) => Err(GpuContextError::Device {
                    reason: reason.clone(),
                }),
                GpuState::Ready(ctx) => {
                    // The container may have been resized while the device was pending.
                    ctx.resize(self.settings.surface_width, self.settings.surface_height);
                    if !self.uploaded {
                        if let Some(model) = &self.model {
                            ctx.upload(model);
                            self.uploaded = true;
                        }
                    }
                    ctx.render(view)
                }
            }
        }

        fn dispose(&mut self) {
            *self.state.borrow_mut() = GpuState::Disposed;
            self.model = None;
            self.canvas.remove();
        }
    }

    pub struct WgpuBackendFactory {
        container: web_sys::HtmlElement,
    }

    impl WgpuBackendFactory {
        pub fn new(container: web_sys::HtmlElement) -> Self {
            Self { container }
        }
    }

    fn dom_err(err: JsValue) -> GpuContextError {
        GpuContextError::Surface {
            reason: format!("{err:?}"),
        }
    }

    impl BackendFactory for WgpuBackendFactory {
        type Backend = WgpuBackend;

        fn create(&mut self, settings: &RendererSettings) -> Result<WgpuBackend, GpuContextError> {
            let document = web_sys::window()
                .and_then(|w| w.document())
                .ok_or_else(|| GpuContextError::Unavailable {
                    reason: "document missing".to_string(),
                })?;
            let canvas = document
                .create_element("canvas")
                .map_err(dom_err)?
                .dyn_into::<web_sys::HtmlCanvasElement>()
                .map_err(|_| GpuContextError::Surface {
                    reason: "created element is not a canvas".to_string(),
                })?;
            size_canvas(&canvas, settings);
            let style = canvas.style();
            style.set_property("width", "100%").map_err(dom_err)?;
            style.set_property("height", "100%").map_err(dom_err)?;
            style.set_property("display", "block").map_err(dom_err)?;
            self.container.append_child(&canvas).map_err(dom_err)?;

            let state = Rc::new(RefCell::new(GpuState::Pending));
            let slot = Rc::clone(&state);
            let target = canvas.clone();
            let init_settings = *settings;
            spawn_local(async move {
                let next = match MeshContext::new(target, &init_settings).await {
                    Ok(ctx) => GpuState::Ready(Box::new(ctx)),
                    Err(err) => {
                        web_sys::console::log_1(&JsValue::from_str(&format!(
                            "wgpu init error: {err}"
                        )));
                        GpuState::Failed(err.to_string())
                    }
                };
                let mut slot = slot.borrow_mut();
                // A viewer detached during initialization stays disposed.
                if matches!(*slot, GpuState::Pending) {
                    *slot = next;
                }
            });

            Ok(WgpuBackend {
                canvas,
                state,
                settings: *settings,
                model: None,
                uploaded: false,
            })
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod imp {
    use gpu::backend::{BackendFactory, CameraView, GpuContextError, RenderBackend};
    use gpu::settings::RendererSettings;
    use scene::instance::ModelInstance;

    #[derive(Debug, Default)]
    pub struct WgpuBackend;

    impl RenderBackend for WgpuBackend {
        fn resize(&mut self, _settings: &RendererSettings) {}

        fn set_model(&mut self, _model: &ModelInstance) {}

        fn render(&mut self, _view: &CameraView) -> Result<(), GpuContextError> {
            Err(GpuContextError::Unavailable {
                reason: "wgpu rendering is only available on wasm32 targets".to_string(),
            })
        }

        fn dispose(&mut self) {}
    }

    pub struct WgpuBackendFactory {
        _container: web_sys::HtmlElement,
    }

    impl WgpuBackendFactory {
        pub fn new(container: web_sys::HtmlElement) -> Self {
            Self {
                _container: container,
            }
        }
    }

    impl BackendFactory for WgpuBackendFactory {
        type Backend = WgpuBackend;

        fn create(&mut self, _settings: &RendererSettings) -> Result<WgpuBackend, GpuContextError> {
            Err(GpuContextError::Unavailable {
                reason: "wgpu initialization is only available on wasm32 targets".to_string(),
            })
        }
    }
}

pub use imp::{WgpuBackend, WgpuBackendFactory};
