use std::sync::Arc;

use shelf_db::Database;
use shelf_http::csrf::CsrfGuard;
use shelf_kernel::settings::Settings;

use crate::modules::books::store::BookStore;
use crate::modules::photos::store::PhotoStore;

/// Everything a request handler needs, built once at startup and shared as
/// axum state.
#[derive(Clone)]
pub struct AppContext {
    pub books: BookStore,
    pub photos: PhotoStore,
    pub csrf: CsrfGuard,
    pub settings: Arc<Settings>,
}

impl AppContext {
    pub fn new(db: Database, settings: Settings) -> anyhow::Result<Self> {
        let csrf = CsrfGuard::from_settings(&settings)?;
        Ok(Self {
            books: BookStore::new(db),
            photos: PhotoStore::new(&settings.uploads.dir),
            csrf,
            settings: Arc::new(settings),
        })
    }
}
