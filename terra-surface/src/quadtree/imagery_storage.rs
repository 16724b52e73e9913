use std::sync::atomic::{AtomicU64, Ordering};

use bevy::utils::HashMap;
use terra_scene::{Rectangle, TileKey, TilingScheme};

use super::{
    error::ImageryError,
    imagery_layer::ImageryLayerId,
    imagery_provider::ImageryImage,
    render_context::Texture,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ImageryState {
    Unloaded,
    Placeholder,
    Loading,
    Received,
    Transforming,
    Ready,
    Failed,
    Invalid,
}

/// Addresses one imagery tile of one layer.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct ImageryKey {
    pub key: TileKey,
    pub layer_id: ImageryLayerId,
}
impl ImageryKey {
    pub fn new(key: TileKey, layer_id: ImageryLayerId) -> Self {
        Self { key, layer_id }
    }
}

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
pub struct Imagery {
    pub key: TileKey,
    pub parent: Option<TileKey>,
    pub state: ImageryState,
    pub rectangle: Rectangle,
    pub image: Option<ImageryImage>,
    pub texture: Option<Texture>,
    pub reference_count: u32,
    generation: u64,
}
impl Imagery {
    fn new(key: TileKey, rectangle: Rectangle) -> Self {
        Self {
            key,
            parent: key.parent(),
            state: ImageryState::Unloaded,
            rectangle,
            image: None,
            texture: None,
            reference_count: 0,
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
        }
    }
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// The imagery cache of a single layer. Every node holds a reference on its parent, so a
/// cached node always has its whole ancestor chain cached as well.
#[derive(Debug, Default)]
pub struct ImageryStorage {
    map: HashMap<TileKey, Imagery>,
    textures_to_destroy: Vec<Texture>,
}
impl ImageryStorage {
    pub fn new() -> Self {
        Self::default()
    }
    #[inline]
    pub fn get(&self, key: &TileKey) -> Option<&Imagery> {
        self.map.get(key)
    }
    #[inline]
    pub fn get_mut(&mut self, key: &TileKey) -> Option<&mut Imagery> {
        self.map.get_mut(key)
    }
    pub fn len(&self) -> usize {
        self.map.len()
    }
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = &Imagery> {
        self.map.values()
    }

    /// Adds a reference to the cached imagery for `key`, creating it and its ancestors when
    /// missing.
    pub fn get_imagery_from_cache(&mut self, key: TileKey, tiling_scheme: &dyn TilingScheme) {
        if let Some(imagery) = self.map.get_mut(&key) {
            imagery.reference_count += 1;
            return;
        }
        if let Some(parent) = key.parent() {
            self.get_imagery_from_cache(parent, tiling_scheme);
        }
        let rectangle = tiling_scheme.tile_x_y_to_rectangle(key.x, key.y, key.level);
        let mut imagery = Imagery::new(key, rectangle);
        imagery.reference_count = 1;
        self.map.insert(key, imagery);
    }

    pub fn add_reference(&mut self, key: &TileKey) -> Result<u32, ImageryError> {
        let imagery = self
            .map
            .get_mut(key)
            .ok_or(ImageryError::UnknownImagery(*key))?;
        imagery.reference_count += 1;
        Ok(imagery.reference_count)
    }

    /// Drops one reference. At zero the node leaves the cache, its texture is queued for
    /// destruction and the reference it held on its parent is released too.
    pub fn release_reference(&mut self, key: &TileKey) -> Result<u32, ImageryError> {
        let imagery = self
            .map
            .get_mut(key)
            .ok_or(ImageryError::UnknownImagery(*key))?;
        if imagery.reference_count == 0 {
            return Err(ImageryError::OverReleased(*key));
        }
        imagery.reference_count -= 1;
        if imagery.reference_count > 0 {
            return Ok(imagery.reference_count);
        }

        let Some(imagery) = self.map.remove(key) else {
            return Ok(0);
        };
        if let Some(texture) = imagery.texture {
            self.textures_to_destroy.push(texture);
        }
        if let Some(parent) = imagery.parent {
            self.release_reference(&parent)?;
        }
        Ok(0)
    }

    /// Empties the cache, queueing every texture for destruction.
    pub fn clear(&mut self) {
        for (_, imagery) in self.map.drain() {
            if let Some(texture) = imagery.texture {
                self.textures_to_destroy.push(texture);
            }
        }
    }

    pub fn take_textures_to_destroy(&mut self) -> Vec<Texture> {
        std::mem::take(&mut self.textures_to_destroy)
    }
}

#[cfg(test)]
mod tests {
    use terra_scene::GeographicTilingScheme;

    use super::*;

    #[test]
    fn creating_imagery_references_its_ancestors() {
        let tiling_scheme = GeographicTilingScheme::default();
        let mut storage = ImageryStorage::new();
        let key = TileKey::new(5, 3, 3);
        storage.get_imagery_from_cache(key, &tiling_scheme);

        assert_eq!(storage.len(), 4);
        let Some(imagery) = storage.get(&key) else {
            panic!("imagery should be cached");
        };
        assert_eq!(imagery.reference_count, 1);
        assert_eq!(imagery.parent, Some(TileKey::new(2, 1, 2)));
        assert_eq!(imagery.state, ImageryState::Unloaded);
        assert_eq!(
            imagery.rectangle,
            tiling_scheme.tile_x_y_to_rectangle(5, 3, 3)
        );
        // a sibling adds to the shared parent chain without recreating it
        storage.get_imagery_from_cache(TileKey::new(4, 3, 3), &tiling_scheme);
        assert_eq!(storage.len(), 5);
        assert_eq!(
            storage.get(&TileKey::new(2, 1, 2)).map(|x| x.reference_count),
            Some(2)
        );
    }

    #[test]
    fn n_references_need_n_releases() {
        let tiling_scheme = GeographicTilingScheme::default();
        let mut storage = ImageryStorage::new();
        let key = TileKey::new(1, 0, 1);
        storage.get_imagery_from_cache(key, &tiling_scheme);
        assert_eq!(storage.add_reference(&key), Ok(2));
        assert_eq!(storage.add_reference(&key), Ok(3));

        assert_eq!(storage.release_reference(&key), Ok(2));
        assert_eq!(storage.release_reference(&key), Ok(1));
        assert!(storage.get(&key).is_some());
        assert_eq!(storage.release_reference(&key), Ok(0));
        assert!(storage.is_empty());
        assert_eq!(
            storage.release_reference(&key),
            Err(ImageryError::UnknownImagery(key))
        );
    }

    #[test]
    fn over_release_is_detected() {
        let tiling_scheme = GeographicTilingScheme::default();
        let mut storage = ImageryStorage::new();
        let key = TileKey::new(0, 0, 0);
        storage.get_imagery_from_cache(key, &tiling_scheme);
        if let Some(imagery) = storage.get_mut(&key) {
            imagery.reference_count = 0;
        }
        assert_eq!(
            storage.release_reference(&key),
            Err(ImageryError::OverReleased(key))
        );
    }

    #[test]
    fn purged_textures_are_queued_for_destruction() {
        let tiling_scheme = GeographicTilingScheme::default();
        let mut storage = ImageryStorage::new();
        let key = TileKey::new(0, 0, 1);
        storage.get_imagery_from_cache(key, &tiling_scheme);
        if let Some(imagery) = storage.get_mut(&key) {
            imagery.texture = Some(Texture(9));
        }
        if let Some(parent) = storage.get_mut(&TileKey::new(0, 0, 0)) {
            parent.texture = Some(Texture(8));
        }
        assert_eq!(storage.release_reference(&key), Ok(0));
        assert!(storage.is_empty());
        assert_eq!(
            storage.take_textures_to_destroy(),
            vec![Texture(9), Texture(8)]
        );
        assert!(storage.take_textures_to_destroy().is_empty());
    }
}
