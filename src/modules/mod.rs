pub mod books;
pub mod photos;

use shelf_kernel::ModuleRegistry;

use crate::context::AppContext;

/// Register all feature modules with the registry
pub fn register_all(registry: &mut ModuleRegistry, ctx: &AppContext) {
    registry.register(books::create_module(ctx.clone()));
    registry.register(photos::create_module(ctx.clone()));
}
