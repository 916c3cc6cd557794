use anyhow::Context;
use clap::{Parser, Subcommand};
use shelf_app::App;
use shelf_kernel::settings::Settings;

/// Personal book catalog and photo gallery
#[derive(Debug, Parser)]
#[command(name = "shelf", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the HTTP server (default)
    Serve,
    /// Apply pending database migrations and exit
    Migrate,
    /// Print the catalog ordered by number
    Books,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load().with_context(|| "failed to load shelf settings")?;
    shelf_telemetry::init(&settings.telemetry)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => App::bootstrap(settings).await?.serve().await,
        Command::Migrate => {
            let app = App::bootstrap(settings).await?;
            tracing::info!(
                modules = app.registry.module_count(),
                "migrations applied"
            );
            Ok(())
        }
        Command::Books => {
            let app = App::bootstrap(settings).await?;
            for book in app.ctx.books.list_ordered().await? {
                println!(
                    "{:>3}  {}  ({}, {}, {} pages)",
                    book.number, book.title, book.author, book.year, book.pages
                );
            }
            Ok(())
        }
    }
}
