pub mod form;
pub mod models;
pub mod routes;
pub mod store;
pub mod views;

use async_trait::async_trait;
use axum::Router;
use shelf_kernel::{InitCtx, Migration, Module};

use crate::context::AppContext;

/// Book catalog: add, list, edit and delete records
pub struct BooksModule {
    ctx: AppContext,
}

impl BooksModule {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx }
    }

    /// Schema of the `books` table
    pub(crate) fn schema() -> Vec<Migration> {
        vec![Migration {
            id: "001_init",
            up: r#"
                CREATE TABLE IF NOT EXISTS books (
                    id     INTEGER PRIMARY KEY AUTOINCREMENT,
                    number INTEGER NOT NULL UNIQUE,
                    title  TEXT    NOT NULL CHECK (length(title) <= 250),
                    author TEXT    NOT NULL CHECK (length(author) <= 250),
                    year   INTEGER NOT NULL,
                    pages  INTEGER NOT NULL
                );
                "#,
        }]
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let count = self.ctx.books.list_ordered().await?.len();
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            database = %ctx.settings.database.path.display(),
            books = count,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(self.ctx.clone())
    }

    fn migrations(&self) -> Vec<Migration> {
        Self::schema()
    }
}

/// Create a new instance of the books module
pub fn create_module(ctx: AppContext) -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(BooksModule::new(ctx))
}
