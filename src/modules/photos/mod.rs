pub mod routes;
pub mod store;
pub mod views;

use anyhow::Context;
use async_trait::async_trait;
use axum::Router;
use shelf_kernel::{InitCtx, Module};

use crate::context::AppContext;

/// Photo gallery backed by the upload directory
pub struct PhotosModule {
    ctx: AppContext,
}

impl PhotosModule {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Module for PhotosModule {
    fn name(&self) -> &'static str {
        "photos"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        self.ctx.photos.ensure_dir().await.with_context(|| {
            format!(
                "failed to create upload directory {}",
                self.ctx.photos.dir().display()
            )
        })?;

        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            uploads = %self.ctx.photos.dir().display(),
            "photos module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(self.ctx.clone())
    }
}

/// Create a new instance of the photos module
pub fn create_module(ctx: AppContext) -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(PhotosModule::new(ctx))
}
