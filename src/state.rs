use std::sync::Arc;

use crate::brands::BrandCatalog;
use crate::critique::CritiqueService;
use crate::llm::VisionModel;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<BrandCatalog>,
    pub critique: Arc<CritiqueService>,
}

impl AppState {
    pub fn new(catalog: BrandCatalog, model: Arc<dyn VisionModel>) -> Self {
        let catalog = Arc::new(catalog);
        AppState {
            critique: Arc::new(CritiqueService::new(Arc::clone(&catalog), model)),
            catalog,
        }
    }
}
