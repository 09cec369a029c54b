use shared::domain::{ModelInfo, TestImage};
use tracing::{info, warn};

use crate::{error::TransportError, selection::Selection, transport::SegmentationApi};

/// Catalog data fetched once at startup and read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    pub models: Vec<ModelInfo>,
    pub images: Vec<TestImage>,
}

impl Catalog {
    /// The first catalog image, or nothing for an empty catalog.
    pub fn default_selection(&self) -> Selection {
        self.images
            .first()
            .map(|image| Selection::CatalogImage(image.id.clone()))
            .unwrap_or_default()
    }

    pub fn primary_model(&self) -> Option<&ModelInfo> {
        self.models.first()
    }
}

/// Fetch both catalogs concurrently. Either failure fails the whole load.
pub async fn load_catalog(api: &dyn SegmentationApi) -> Result<Catalog, TransportError> {
    let loaded = tokio::try_join!(api.list_models(), api.list_test_images());
    match loaded {
        Ok((models, images)) => {
            info!(models = models.len(), images = images.len(), "catalog loaded");
            Ok(Catalog { models, images })
        }
        Err(err) => {
            warn!(error = %err, url = err.url(), "catalog bootstrap failed");
            Err(err)
        }
    }
}
