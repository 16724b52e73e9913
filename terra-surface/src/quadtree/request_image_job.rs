use terra_jobs::{AsyncReturn, Context, Job};

use super::{
    error::{ProviderError, TileError},
    imagery_layer_collection::ImageryLayerCollection,
    imagery_provider::{ImageryImage, ImageryRequest},
    imagery_storage::{ImageryKey, ImageryState},
};

pub struct RequestImageJob {
    pub imagery_key: ImageryKey,
    pub generation: u64,
    pub request: ImageryRequest,
}
pub struct RequestImageJobOutcome {
    pub imagery_key: ImageryKey,
    pub generation: u64,
    pub result: Result<Option<ImageryImage>, ProviderError>,
}
impl Job for RequestImageJob {
    type Outcome = RequestImageJobOutcome;
    fn name(&self) -> String {
        format!("request image {}", self.imagery_key.key)
    }
    fn perform(self, _context: Context) -> AsyncReturn<Self::Outcome> {
        Box::pin(async move {
            let result = self.request.await;
            RequestImageJobOutcome {
                imagery_key: self.imagery_key,
                generation: self.generation,
                result,
            }
        })
    }
}
impl RequestImageJobOutcome {
    /// Stores the image on the imagery node it was requested for, if that node is still
    /// cached and waiting for it.
    pub fn apply(self, imagery_layers: &mut ImageryLayerCollection) -> Option<TileError> {
        let layer = imagery_layers.get_by_id_mut(self.imagery_key.layer_id)?;
        let imagery = layer.storage.get_mut(&self.imagery_key.key)?;
        if imagery.generation() != self.generation || imagery.state != ImageryState::Loading {
            return None;
        }
        match self.result {
            Ok(Some(image)) => {
                imagery.image = Some(image);
                imagery.state = ImageryState::Received;
                None
            }
            Ok(None) => {
                imagery.state = ImageryState::Invalid;
                None
            }
            Err(error) => {
                imagery.state = ImageryState::Failed;
                Some(TileError::ImageryRequest {
                    key: self.imagery_key.key,
                    reason: error.to_string(),
                })
            }
        }
    }
}
