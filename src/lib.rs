//! Shelf application library
//!
//! Book catalog and photo gallery modules plus the bootstrap that wires them
//! into the HTTP server.

pub mod context;
pub mod modules;

use anyhow::Context;
use axum::Router;
use shelf_db::Database;
use shelf_kernel::{settings::Settings, InitCtx, ModuleRegistry};

pub use context::AppContext;

/// A fully initialized application: context, registered modules, migrated store
pub struct App {
    pub ctx: AppContext,
    pub registry: ModuleRegistry,
}

impl App {
    /// Open the configured database and build the application.
    pub async fn bootstrap(settings: Settings) -> anyhow::Result<Self> {
        let db = Database::open(&settings.database.path).with_context(|| {
            format!(
                "failed to open database {}",
                settings.database.path.display()
            )
        })?;
        Self::with_database(db, settings).await
    }

    /// Build the application on an already opened database: register modules,
    /// apply migrations, then run each module's init hook.
    pub async fn with_database(db: Database, settings: Settings) -> anyhow::Result<Self> {
        let ctx = AppContext::new(db.clone(), settings)?;

        let mut registry = ModuleRegistry::new();
        modules::register_all(&mut registry, &ctx);

        let applied = db
            .migrate(registry.collect_migrations())
            .await
            .context("failed to apply migrations")?;
        tracing::info!(applied, "database schema up to date");

        let init_ctx = InitCtx {
            settings: &ctx.settings,
        };
        registry.init_modules(&init_ctx).await?;

        Ok(Self { ctx, registry })
    }

    /// Router serving every module's routes with the shared middleware stack
    pub fn router(&self) -> Router {
        shelf_http::build_router(&self.registry, &self.ctx.settings)
    }

    /// Serve HTTP until interrupted
    pub async fn serve(self) -> anyhow::Result<()> {
        shelf_http::start_server(&self.registry, &self.ctx.settings).await
    }
}
