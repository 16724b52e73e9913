use std::fmt;

use super::imagery_layer::{ImageryLayer, ImageryLayerId};

/// A change to the layer stack that tiles have to react to.
pub enum ImageryLayerEvent {
    Added {
        id: ImageryLayerId,
        index: usize,
    },
    /// Carries the removed layer so the imagery tiles still hold can be released.
    Removed(Box<ImageryLayer>),
    Moved {
        id: ImageryLayerId,
        new_index: usize,
        old_index: usize,
    },
    ShownOrHidden {
        id: ImageryLayerId,
        index: usize,
        show: bool,
    },
}
impl fmt::Debug for ImageryLayerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added { id, index } => write!(f, "Added({id}, {index})"),
            Self::Removed(layer) => write!(f, "Removed({})", layer.id()),
            Self::Moved {
                id,
                new_index,
                old_index,
            } => write!(f, "Moved({id}, {old_index} -> {new_index})"),
            Self::ShownOrHidden { id, index, show } => {
                write!(f, "ShownOrHidden({id}, {index}, {show})")
            }
        }
    }
}

/// Ordered imagery layers, bottom first. The first shown layer is the base layer.
#[derive(Default)]
pub struct ImageryLayerCollection {
    layers: Vec<ImageryLayer>,
    events: Vec<ImageryLayerEvent>,
}
impl ImageryLayerCollection {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn len(&self) -> usize {
        self.layers.len()
    }
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
    pub fn add(&mut self, layer: ImageryLayer) -> ImageryLayerId {
        self.add_at(layer, self.layers.len())
    }
    /// Inserts `layer` at `index`, clamped to the top of the stack.
    pub fn add_at(&mut self, mut layer: ImageryLayer, index: usize) -> ImageryLayerId {
        let index = index.min(self.layers.len());
        let id = layer.id();
        layer.shown = Some(layer.show());
        self.layers.insert(index, layer);
        self.update();
        self.events.push(ImageryLayerEvent::Added { id, index });
        id
    }
    /// Returns false when no layer has that id.
    pub fn remove(&mut self, id: ImageryLayerId) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };
        let layer = self.layers.remove(index);
        self.update();
        self.events.push(ImageryLayerEvent::Removed(Box::new(layer)));
        true
    }
    pub fn contains(&self, id: ImageryLayerId) -> bool {
        self.index_of(id).is_some()
    }
    pub fn index_of(&self, id: ImageryLayerId) -> Option<usize> {
        self.layers.iter().position(|layer| layer.id() == id)
    }
    pub fn get(&self, index: usize) -> Option<&ImageryLayer> {
        self.layers.get(index)
    }
    pub fn get_by_id(&self, id: ImageryLayerId) -> Option<&ImageryLayer> {
        self.layers.iter().find(|layer| layer.id() == id)
    }
    pub fn get_by_id_mut(&mut self, id: ImageryLayerId) -> Option<&mut ImageryLayer> {
        self.layers.iter_mut().find(|layer| layer.id() == id)
    }
    pub fn iter(&self) -> impl Iterator<Item = &ImageryLayer> {
        self.layers.iter()
    }
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ImageryLayer> {
        self.layers.iter_mut()
    }

    pub fn raise(&mut self, id: ImageryLayerId) -> bool {
        match self.index_of(id) {
            Some(index) if index + 1 < self.layers.len() => self.move_layer(index, index + 1),
            _ => false,
        }
    }
    pub fn lower(&mut self, id: ImageryLayerId) -> bool {
        match self.index_of(id) {
            Some(index) if index > 0 => self.move_layer(index, index - 1),
            _ => false,
        }
    }
    pub fn raise_to_top(&mut self, id: ImageryLayerId) -> bool {
        match self.index_of(id) {
            Some(index) => self.move_layer(index, self.layers.len() - 1),
            None => false,
        }
    }
    pub fn lower_to_bottom(&mut self, id: ImageryLayerId) -> bool {
        match self.index_of(id) {
            Some(index) => self.move_layer(index, 0),
            None => false,
        }
    }

    fn move_layer(&mut self, old_index: usize, new_index: usize) -> bool {
        if old_index == new_index {
            return false;
        }
        let layer = self.layers.remove(old_index);
        let id = layer.id();
        self.layers.insert(new_index, layer);
        self.update();
        self.events.push(ImageryLayerEvent::Moved {
            id,
            new_index,
            old_index,
        });
        true
    }

    /// Refreshes layer indices and the base layer, and records layers whose `show` flag
    /// changed since the last call.
    pub fn update(&mut self) {
        let mut is_base_layer = true;
        for (index, layer) in self.layers.iter_mut().enumerate() {
            layer.layer_index = index;
            let show = layer.show();
            if show {
                layer.is_base_layer = is_base_layer;
                is_base_layer = false;
            } else {
                layer.is_base_layer = false;
            }
            if layer.shown != Some(show) {
                if layer.shown.is_some() {
                    self.events.push(ImageryLayerEvent::ShownOrHidden {
                        id: layer.id(),
                        index,
                        show,
                    });
                }
                layer.shown = Some(show);
            }
        }
    }

    pub fn take_events(&mut self) -> Vec<ImageryLayerEvent> {
        std::mem::take(&mut self.events)
    }
}
