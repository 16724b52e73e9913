use bevy::utils::HashMap;
use terra_scene::TileKey;

use super::{
    imagery_layer_collection::ImageryLayerCollection, quadtree_tile_storage::QuadtreeTileStorage,
};

#[derive(Debug, Clone, Copy, Default)]
struct Links {
    previous: Option<TileKey>,
    next: Option<TileKey>,
}

/// Least recently rendered tiles first in line for eviction. `head` is the most recently
/// rendered tile.
#[derive(Debug, Default)]
pub struct TileReplacementQueue {
    links: HashMap<TileKey, Links>,
    head: Option<TileKey>,
    tail: Option<TileKey>,
    count: usize,
    /// Head of the list when the current frame started.
    last_before_start_of_frame: Option<TileKey>,
    /// Head of the list when the previous frame started. Trimming stops here.
    eviction_floor: Option<TileKey>,
}
impl TileReplacementQueue {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn clear(&mut self) {
        *self = Self::default();
    }
    pub fn get_head(&self) -> Option<TileKey> {
        self.head
    }
    pub fn get_tail(&self) -> Option<TileKey> {
        self.tail
    }
    pub fn get_count(&self) -> usize {
        self.count
    }
    pub fn contains(&self, key: &TileKey) -> bool {
        self.links.contains_key(key)
    }
    /// Keys from the most to the least recently rendered.
    pub fn iter(&self) -> impl Iterator<Item = TileKey> + '_ {
        std::iter::successors(self.head, |key| {
            self.links.get(key).and_then(|links| links.next)
        })
    }

    pub fn mark_start_of_render_frame(&mut self) {
        self.eviction_floor = self.last_before_start_of_frame;
        self.last_before_start_of_frame = self.head;
    }

    pub fn mark_tile_rendered(&mut self, key: TileKey) {
        if self.head == Some(key) {
            let next = self.links.get(&key).and_then(|links| links.next);
            self.retarget_boundaries(key, next);
            return;
        }

        let Some(head) = self.head else {
            self.links.insert(key, Links::default());
            self.head = Some(key);
            self.tail = Some(key);
            self.count = 1;
            return;
        };

        if self.links.contains_key(&key) {
            self.remove(&key);
        }
        self.links.insert(
            key,
            Links {
                previous: None,
                next: Some(head),
            },
        );
        if let Some(links) = self.links.get_mut(&head) {
            links.previous = Some(key);
        }
        self.head = Some(key);
        self.count += 1;
    }

    /// Unlinks `key`. Returns false when it was not in the queue.
    pub fn remove(&mut self, key: &TileKey) -> bool {
        let Some(Links { previous, next }) = self.links.remove(key) else {
            return false;
        };
        self.retarget_boundaries(*key, next);

        if self.head == Some(*key) {
            self.head = next;
        } else if let Some(links) = previous.and_then(|previous| self.links.get_mut(&previous)) {
            links.next = next;
        }
        if self.tail == Some(*key) {
            self.tail = previous;
        } else if let Some(links) = next.and_then(|next| self.links.get_mut(&next)) {
            links.previous = previous;
        }
        self.count -= 1;
        true
    }

    /// Evicts tiles from the tail until at most `maximum_tiles` remain, skipping tiles that
    /// cannot be unloaded yet. Tiles rendered during the previous or the current frame only
    /// leave along with an evicted ancestor.
    pub fn trim_tiles(
        &mut self,
        storage: &mut QuadtreeTileStorage,
        imagery_layers: &mut ImageryLayerCollection,
        maximum_tiles: usize,
    ) {
        if self.eviction_floor.is_none() {
            return;
        }
        // Only tiles not used in the last two frames, oldest first.
        let mut candidates = vec![];
        let mut cursor = self.tail;
        while let Some(key) = cursor {
            candidates.push(key);
            if Some(key) == self.eviction_floor {
                break;
            }
            cursor = self.links.get(&key).and_then(|links| links.previous);
        }

        for key in candidates {
            if self.count <= maximum_tiles {
                break;
            }
            // discarded along with an evicted ancestor
            if !self.links.contains_key(&key) {
                continue;
            }
            let eligible = storage
                .get(&key)
                .map(|tile| tile.eligible_for_unloading(imagery_layers));
            match eligible {
                None => {
                    self.remove(&key);
                }
                Some(true) => {
                    for descendant in storage.free_resources(&key, imagery_layers) {
                        self.remove(&descendant);
                    }
                    self.remove(&key);
                }
                Some(false) => {}
            }
        }
    }

    fn retarget_boundaries(&mut self, key: TileKey, next: Option<TileKey>) {
        if self.last_before_start_of_frame == Some(key) {
            self.last_before_start_of_frame = next;
        }
        if self.eviction_floor == Some(key) {
            self.eviction_floor = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use terra_scene::GeographicTilingScheme;

    use super::*;
    use crate::quadtree::{globe_surface_tile::GlobeSurfaceTile, quadtree_tile::QuadtreeTileLoadState};

    fn keys(queue: &TileReplacementQueue) -> Vec<TileKey> {
        queue.iter().collect()
    }

    #[test]
    fn most_recent_tile_is_at_the_head() {
        let a = TileKey::new(0, 0, 0);
        let b = TileKey::new(1, 0, 0);
        let mut queue = TileReplacementQueue::new();
        queue.mark_tile_rendered(a);
        queue.mark_tile_rendered(b);
        queue.mark_tile_rendered(a);
        assert_eq!(keys(&queue), vec![a, b]);
        assert_eq!(queue.get_count(), 2);
        assert_eq!(queue.get_head(), Some(a));
        assert_eq!(queue.get_tail(), Some(b));

        queue.mark_tile_rendered(a);
        assert_eq!(queue.get_count(), 2);
    }

    #[test]
    fn removing_relinks_neighbours() {
        let a = TileKey::new(0, 0, 1);
        let b = TileKey::new(1, 0, 1);
        let c = TileKey::new(2, 0, 1);
        let mut queue = TileReplacementQueue::new();
        queue.mark_tile_rendered(a);
        queue.mark_tile_rendered(b);
        queue.mark_tile_rendered(c);
        assert!(queue.remove(&b));
        assert_eq!(keys(&queue), vec![c, a]);
        assert!(queue.remove(&a));
        assert_eq!(queue.get_tail(), Some(c));
        assert!(queue.remove(&c));
        assert_eq!(queue.get_head(), None);
        assert_eq!(queue.get_tail(), None);
        assert_eq!(queue.get_count(), 0);
        assert!(!queue.remove(&c));
    }

    fn storage_with_children() -> (QuadtreeTileStorage, [TileKey; 4]) {
        let mut storage = QuadtreeTileStorage::new(Arc::new(GeographicTilingScheme::default()));
        storage.create_level_zero_tiles();
        let Some(children) = storage.children(&TileKey::new(0, 0, 0)) else {
            panic!("root tile should have children");
        };
        for key in children.iter() {
            if let Some(tile) = storage.get_mut(key) {
                tile.data = Some(GlobeSurfaceTile::new());
                tile.state = QuadtreeTileLoadState::Done;
            }
        }
        (storage, children)
    }

    #[test]
    fn tiles_of_the_previous_frame_survive_trimming() {
        let (mut storage, [a, b, c, d]) = storage_with_children();
        let mut imagery_layers = ImageryLayerCollection::new();
        let mut queue = TileReplacementQueue::new();

        queue.mark_start_of_render_frame();
        queue.mark_tile_rendered(a);
        queue.mark_start_of_render_frame();
        queue.mark_tile_rendered(b);
        queue.mark_tile_rendered(c);
        queue.mark_start_of_render_frame();
        queue.mark_tile_rendered(d);

        queue.trim_tiles(&mut storage, &mut imagery_layers, 0);
        // only the tile last used two frames ago goes
        assert_eq!(keys(&queue), vec![d, c, b]);
        assert_eq!(
            storage.get(&a).map(|x| x.state),
            Some(QuadtreeTileLoadState::Start)
        );
        assert!(storage.get(&a).map_or(false, |x| x.data.is_none()));
        assert!(storage.get(&b).map_or(false, |x| x.data.is_some()));

        // once b and c age past the floor they can go too
        queue.mark_start_of_render_frame();
        queue.mark_tile_rendered(d);
        queue.mark_start_of_render_frame();
        queue.mark_tile_rendered(d);
        queue.trim_tiles(&mut storage, &mut imagery_layers, 1);
        assert_eq!(keys(&queue), vec![d]);
    }

    #[test]
    fn trimming_stops_at_the_budget() {
        let (mut storage, [a, b, c, d]) = storage_with_children();
        let mut imagery_layers = ImageryLayerCollection::new();
        let mut queue = TileReplacementQueue::new();
        queue.mark_start_of_render_frame();
        for key in [a, b, c] {
            queue.mark_tile_rendered(key);
        }
        queue.mark_start_of_render_frame();
        queue.mark_start_of_render_frame();
        queue.mark_tile_rendered(d);
        queue.trim_tiles(&mut storage, &mut imagery_layers, 2);
        assert_eq!(keys(&queue), vec![d, c]);
    }

    #[test]
    fn evicting_a_parent_unlinks_its_descendants() {
        let (mut storage, children) = storage_with_children();
        let root = TileKey::new(0, 0, 0);
        let mut imagery_layers = ImageryLayerCollection::new();
        let mut queue = TileReplacementQueue::new();
        queue.mark_start_of_render_frame();
        queue.mark_tile_rendered(root);
        for key in children.iter() {
            queue.mark_tile_rendered(*key);
        }
        let other_root = TileKey::new(1, 0, 0);
        queue.mark_start_of_render_frame();
        queue.mark_start_of_render_frame();
        queue.mark_tile_rendered(other_root);

        // the root sits at the tail and takes its children with it
        queue.trim_tiles(&mut storage, &mut imagery_layers, 0);
        assert_eq!(keys(&queue), vec![other_root]);
        assert_eq!(queue.get_count(), 1);
        assert!(storage.get(&children[0]).is_none());
    }

    #[test]
    fn descendants_of_an_evicted_tile_count_against_the_budget() {
        let (mut storage, children) = storage_with_children();
        let root = TileKey::new(0, 0, 0);
        let other_root = TileKey::new(1, 0, 0);
        let Some(other_children) = storage.children(&other_root) else {
            panic!("root tile should have children");
        };
        let mut imagery_layers = ImageryLayerCollection::new();
        let mut queue = TileReplacementQueue::new();
        queue.mark_start_of_render_frame();
        queue.mark_tile_rendered(root);
        queue.mark_tile_rendered(other_root);
        queue.mark_tile_rendered(other_children[0]);
        queue.mark_start_of_render_frame();
        for key in children.iter() {
            queue.mark_tile_rendered(*key);
        }
        queue.mark_start_of_render_frame();
        assert_eq!(queue.get_count(), 7);

        // the root and its four children leave together, which is already under budget
        queue.trim_tiles(&mut storage, &mut imagery_layers, 5);
        assert_eq!(keys(&queue), vec![other_children[0], other_root]);
        assert_eq!(queue.get_count(), 2);
        assert!(storage.get(&children[0]).is_none());
        assert!(storage.get(&other_children[0]).is_some());
    }
}
