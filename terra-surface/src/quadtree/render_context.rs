use bevy::utils::HashSet;

use super::imagery_provider::ImageryImage;

/// Opaque handle to vertex and index buffers uploaded by a [`RenderContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexArray(pub u64);

/// Opaque handle to a texture uploaded by a [`RenderContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Texture(pub u64);

/// The GPU as the tile pipeline sees it. Every call happens on the thread driving the frame.
pub trait RenderContext: Send + Sync {
    fn create_vertex_array(&mut self, vertices: &[f32], indices: &[u32]) -> VertexArray;
    fn destroy_vertex_array(&mut self, vertex_array: VertexArray);
    fn create_texture(&mut self, image: &ImageryImage) -> Texture;
    fn destroy_texture(&mut self, texture: Texture);
    fn maximum_texture_units(&self) -> usize;
}

/// Hands out counted ids without touching a GPU.
#[derive(Debug)]
pub struct HeadlessRenderContext {
    next_id: u64,
    maximum_texture_units: usize,
    live_vertex_arrays: HashSet<VertexArray>,
    live_textures: HashSet<Texture>,
    created_vertex_arrays: usize,
    created_textures: usize,
}
impl Default for HeadlessRenderContext {
    fn default() -> Self {
        Self::new(16)
    }
}
impl HeadlessRenderContext {
    pub fn new(maximum_texture_units: usize) -> Self {
        Self {
            next_id: 1,
            maximum_texture_units: maximum_texture_units.max(1),
            live_vertex_arrays: HashSet::new(),
            live_textures: HashSet::new(),
            created_vertex_arrays: 0,
            created_textures: 0,
        }
    }
    pub fn live_vertex_array_count(&self) -> usize {
        self.live_vertex_arrays.len()
    }
    pub fn live_texture_count(&self) -> usize {
        self.live_textures.len()
    }
    pub fn created_vertex_array_count(&self) -> usize {
        self.created_vertex_arrays
    }
    pub fn created_texture_count(&self) -> usize {
        self.created_textures
    }
    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}
impl RenderContext for HeadlessRenderContext {
    fn create_vertex_array(&mut self, _vertices: &[f32], _indices: &[u32]) -> VertexArray {
        let vertex_array = VertexArray(self.next_id());
        self.live_vertex_arrays.insert(vertex_array);
        self.created_vertex_arrays += 1;
        vertex_array
    }
    fn destroy_vertex_array(&mut self, vertex_array: VertexArray) {
        if !self.live_vertex_arrays.remove(&vertex_array) {
            bevy::log::warn!("vertex array {:?} destroyed twice", vertex_array);
        }
    }
    fn create_texture(&mut self, _image: &ImageryImage) -> Texture {
        let texture = Texture(self.next_id());
        self.live_textures.insert(texture);
        self.created_textures += 1;
        texture
    }
    fn destroy_texture(&mut self, texture: Texture) {
        if !self.live_textures.remove(&texture) {
            bevy::log::warn!("texture {:?} destroyed twice", texture);
        }
    }
    fn maximum_texture_units(&self) -> usize {
        self.maximum_texture_units
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_unique_and_counted() {
        let mut context = HeadlessRenderContext::default();
        let a = context.create_vertex_array(&[0.0; 6], &[0, 1, 2]);
        let b = context.create_vertex_array(&[0.0; 6], &[0, 1, 2]);
        let texture = context.create_texture(&ImageryImage::new(1, 1, vec![0; 4]));
        assert_ne!(a, b);
        assert_ne!(a.0, texture.0);
        assert_eq!(context.live_vertex_array_count(), 2);

        context.destroy_vertex_array(a);
        context.destroy_texture(texture);
        assert_eq!(context.live_vertex_array_count(), 1);
        assert_eq!(context.live_texture_count(), 0);
        assert_eq!(context.created_vertex_array_count(), 2);
        assert_eq!(context.created_texture_count(), 1);
    }

    #[test]
    fn at_least_one_texture_unit() {
        assert_eq!(HeadlessRenderContext::new(0).maximum_texture_units(), 1);
    }
}
