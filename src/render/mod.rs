//! GPU side of the world: textures, buffers and pipelines on macroquad's
//! miniquad context. Created on the first draw, released with the World.

pub mod batch;
pub mod shaders;

use crate::atlas::{AtlasId, AtlasManager};
use crate::error::{Result, WorldError};
use crate::maze::geometry::{Mesh, MazeMesh, MazeVertex, Surface};
use batch::{QuadBatch, TextureKey, Vertex};
use macroquad::miniquad::*;
use shaders::{MazeUniforms, SpriteUniforms};

/// Vertex/index buffers that grow on demand and are rewritten every frame.
struct StreamMesh {
    vb: BufferId,
    ib: BufferId,
    vcap: usize,
    icap: usize,
}

impl StreamMesh {
    fn new<V>(ctx: &mut dyn RenderingBackend, vcap: usize, icap: usize) -> Self {
        StreamMesh {
            vb: ctx.new_buffer(BufferType::VertexBuffer, BufferUsage::Stream, BufferSource::empty::<V>(vcap)),
            ib: ctx.new_buffer(BufferType::IndexBuffer, BufferUsage::Stream, BufferSource::empty::<u32>(icap)),
            vcap,
            icap,
        }
    }

    fn upload<V>(&mut self, ctx: &mut dyn RenderingBackend, vertices: &[V], indices: &[u32]) {
        if vertices.len() > self.vcap {
            ctx.delete_buffer(self.vb);
            self.vcap = vertices.len().next_power_of_two();
            self.vb = ctx.new_buffer(BufferType::VertexBuffer, BufferUsage::Stream, BufferSource::empty::<V>(self.vcap));
        }
        if indices.len() > self.icap {
            ctx.delete_buffer(self.ib);
            self.icap = indices.len().next_power_of_two();
            self.ib = ctx.new_buffer(BufferType::IndexBuffer, BufferUsage::Stream, BufferSource::empty::<u32>(self.icap));
        }
        ctx.buffer_update(self.vb, BufferSource::slice(vertices));
        ctx.buffer_update(self.ib, BufferSource::slice(indices));
    }

    fn release(&self, ctx: &mut dyn RenderingBackend) {
        ctx.delete_buffer(self.vb);
        ctx.delete_buffer(self.ib);
    }
}

/// Immutable geometry plus its draw ranges.
struct StaticMesh<K> {
    vb: BufferId,
    ib: BufferId,
    ranges: Vec<(K, u32, u32)>,
}

impl<K> StaticMesh<K> {
    fn new<V>(ctx: &mut dyn RenderingBackend, vertices: &[V], indices: &[u32], ranges: Vec<(K, u32, u32)>) -> Option<Self> {
        if indices.is_empty() {
            return None;
        }
        Some(StaticMesh {
            vb: ctx.new_buffer(BufferType::VertexBuffer, BufferUsage::Immutable, BufferSource::slice(vertices)),
            ib: ctx.new_buffer(BufferType::IndexBuffer, BufferUsage::Immutable, BufferSource::slice(indices)),
            ranges,
        })
    }

    fn release(&self, ctx: &mut dyn RenderingBackend) {
        ctx.delete_buffer(self.vb);
        ctx.delete_buffer(self.ib);
    }
}

fn blend() -> Option<BlendState> {
    Some(BlendState::new(
        Equation::Add,
        BlendFactor::Value(BlendValue::SourceAlpha),
        BlendFactor::OneMinusValue(BlendValue::SourceAlpha),
    ))
}

pub struct WorldRenderer {
    white: TextureId,
    atlas_textures: Vec<TextureId>,
    sprite_shader: ShaderId,
    maze_shader: ShaderId,
    sprite_pipeline: Pipeline,
    maze_pipeline: Pipeline,
    billboard_pipeline: Pipeline,
    tiles: Option<StaticMesh<TextureKey>>,
    dynamic: StreamMesh,
    walls: Option<StaticMesh<Surface>>,
    billboards: StreamMesh,
}

impl WorldRenderer {
    pub fn new(ctx: &mut dyn RenderingBackend) -> Result<Self> {
        let white = ctx.new_texture_from_rgba8(1, 1, &[255, 255, 255, 255]);
        ctx.texture_set_filter(white, FilterMode::Nearest, MipmapFilterMode::None);

        let sprite_shader = ctx
            .new_shader(
                ShaderSource::Glsl {
                    vertex: shaders::SPRITE_VERTEX,
                    fragment: shaders::SPRITE_FRAGMENT,
                },
                shaders::sprite_meta(),
            )
            .map_err(|e| WorldError::Gpu(format!("sprite shader: {e:?}")))?;
        let maze_shader = match ctx.new_shader(
            ShaderSource::Glsl {
                vertex: shaders::MAZE_VERTEX,
                fragment: shaders::MAZE_FRAGMENT,
            },
            shaders::maze_meta(),
        ) {
            Ok(s) => s,
            Err(e) => {
                ctx.delete_shader(sprite_shader);
                ctx.delete_texture(white);
                return Err(WorldError::Gpu(format!("maze shader: {e:?}")));
            }
        };

        let sprite_pipeline = ctx.new_pipeline(
            &[BufferLayout::default()],
            &[
                VertexAttribute::new("in_pos", VertexFormat::Float2),
                VertexAttribute::new("in_uv", VertexFormat::Float2),
                VertexAttribute::new("in_color", VertexFormat::Float4),
            ],
            sprite_shader,
            PipelineParams {
                color_blend: blend(),
                cull_face: CullFace::Nothing,
                ..Default::default()
            },
        );
        let maze_attributes = [
            VertexAttribute::new("in_pos", VertexFormat::Float3),
            VertexAttribute::new("in_uv", VertexFormat::Float2),
            VertexAttribute::new("in_normal", VertexFormat::Float3),
        ];
        let maze_pipeline = ctx.new_pipeline(
            &[BufferLayout::default()],
            &maze_attributes,
            maze_shader,
            PipelineParams {
                cull_face: CullFace::Back,
                front_face_order: FrontFaceOrder::CounterClockwise,
                depth_test: Comparison::LessOrEqual,
                depth_write: true,
                ..Default::default()
            },
        );
        let billboard_pipeline = ctx.new_pipeline(
            &[BufferLayout::default()],
            &maze_attributes,
            maze_shader,
            PipelineParams {
                color_blend: blend(),
                cull_face: CullFace::Nothing,
                depth_test: Comparison::LessOrEqual,
                depth_write: true,
                ..Default::default()
            },
        );

        tracing::debug!("world renderer created");
        Ok(WorldRenderer {
            white,
            atlas_textures: Vec::new(),
            sprite_shader,
            maze_shader,
            sprite_pipeline,
            maze_pipeline,
            billboard_pipeline,
            tiles: None,
            dynamic: StreamMesh::new::<Vertex>(ctx, 1024, 1536),
            walls: None,
            billboards: StreamMesh::new::<MazeVertex>(ctx, 256, 384),
        })
    }

    /// Uploads atlases registered since the last call.
    pub fn sync_atlases(&mut self, ctx: &mut dyn RenderingBackend, atlases: &AtlasManager) {
        for (id, atlas) in atlases.iter().skip(self.atlas_textures.len()) {
            let tex = ctx.new_texture_from_rgba8(atlas.width as u16, atlas.height as u16, atlas.pixels.as_raw());
            ctx.texture_set_filter(tex, FilterMode::Nearest, MipmapFilterMode::None);
            ctx.texture_set_wrap(tex, TextureWrap::Clamp, TextureWrap::Clamp);
            tracing::debug!(id, file = %atlas.filename.display(), "atlas uploaded");
            self.atlas_textures.push(tex);
        }
    }

    fn texture(&self, key: TextureKey) -> TextureId {
        match key {
            TextureKey::Atlas(id) => self.atlas_textures.get(id).copied().unwrap_or(self.white),
            TextureKey::White => self.white,
        }
    }

    fn surface_texture(&self, atlas: Option<AtlasId>) -> TextureId {
        atlas.map_or(self.white, |a| self.texture(TextureKey::Atlas(a)))
    }

    pub fn set_tiles(&mut self, ctx: &mut dyn RenderingBackend, batch: &QuadBatch) {
        if let Some(old) = self.tiles.take() {
            old.release(ctx);
        }
        let ranges = batch.calls.iter().map(|c| (c.texture, c.first, c.count)).collect();
        self.tiles = StaticMesh::new(ctx, &batch.vertices, &batch.indices, ranges);
    }

    pub fn set_maze_mesh(&mut self, ctx: &mut dyn RenderingBackend, mesh: &MazeMesh) {
        if let Some(old) = self.walls.take() {
            old.release(ctx);
        }
        let ranges = mesh.ranges.iter().map(|r| (r.key, r.first, r.count)).collect();
        self.walls = StaticMesh::new(ctx, &mesh.vertices, &mesh.indices, ranges);
    }

    /// Tiles, then the per-frame batch (sprites and overlays), in the current pass.
    pub fn draw_2d(&mut self, ctx: &mut dyn RenderingBackend, mvp: [f32; 16], dynamic: &QuadBatch) {
        ctx.begin_default_pass(PassAction::Nothing);
        ctx.apply_pipeline(&self.sprite_pipeline);
        let uniforms = SpriteUniforms { mvp };

        if let Some(tiles) = &self.tiles {
            for &(key, first, count) in &tiles.ranges {
                ctx.apply_bindings(&Bindings {
                    vertex_buffers: vec![tiles.vb],
                    index_buffer: tiles.ib,
                    images: vec![self.texture(key)],
                });
                ctx.apply_uniforms(UniformsSource::table(&uniforms));
                ctx.draw(first as i32, count as i32, 1);
            }
        }

        if !dynamic.is_empty() {
            self.dynamic.upload(ctx, &dynamic.vertices, &dynamic.indices);
            for call in &dynamic.calls {
                ctx.apply_bindings(&Bindings {
                    vertex_buffers: vec![self.dynamic.vb],
                    index_buffer: self.dynamic.ib,
                    images: vec![self.texture(call.texture)],
                });
                ctx.apply_uniforms(UniformsSource::table(&uniforms));
                ctx.draw(call.first as i32, call.count as i32, 1);
            }
        }
        ctx.end_render_pass();
    }

    /// Walls/floor/ceiling with culling, then billboards without.
    pub fn draw_maze(
        &mut self,
        ctx: &mut dyn RenderingBackend,
        uniforms: &MazeUniforms,
        surfaces: [Option<AtlasId>; 3],
        billboards: &Mesh<AtlasId>,
    ) {
        ctx.begin_default_pass(PassAction::Clear {
            color: None,
            depth: Some(1.0),
            stencil: None,
        });

        if let Some(walls) = &self.walls {
            ctx.apply_pipeline(&self.maze_pipeline);
            for &(surface, first, count) in &walls.ranges {
                ctx.apply_bindings(&Bindings {
                    vertex_buffers: vec![walls.vb],
                    index_buffer: walls.ib,
                    images: vec![self.surface_texture(surfaces[surface as usize])],
                });
                ctx.apply_uniforms(UniformsSource::table(uniforms));
                ctx.draw(first as i32, count as i32, 1);
            }
        }

        if !billboards.indices.is_empty() {
            self.billboards.upload(ctx, &billboards.vertices, &billboards.indices);
            ctx.apply_pipeline(&self.billboard_pipeline);
            for r in &billboards.ranges {
                ctx.apply_bindings(&Bindings {
                    vertex_buffers: vec![self.billboards.vb],
                    index_buffer: self.billboards.ib,
                    images: vec![self.texture(TextureKey::Atlas(r.key))],
                });
                ctx.apply_uniforms(UniformsSource::table(uniforms));
                ctx.draw(r.first as i32, r.count as i32, 1);
            }
        }
        ctx.end_render_pass();
    }

    pub fn release(self, ctx: &mut dyn RenderingBackend) {
        if let Some(t) = &self.tiles {
            t.release(ctx);
        }
        if let Some(w) = &self.walls {
            w.release(ctx);
        }
        self.dynamic.release(ctx);
        self.billboards.release(ctx);
        for tex in self.atlas_textures {
            ctx.delete_texture(tex);
        }
        ctx.delete_texture(self.white);
        ctx.delete_pipeline(self.sprite_pipeline);
        ctx.delete_pipeline(self.maze_pipeline);
        ctx.delete_pipeline(self.billboard_pipeline);
        ctx.delete_shader(self.sprite_shader);
        ctx.delete_shader(self.maze_shader);
        tracing::debug!("world renderer released");
    }
}
