use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use podrelay::app::AppContext;
use podrelay::cli::{commands, Cli, Commands};
use podrelay::config::Config;
use podrelay::domain::FeedSettings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    config.apply_env(|key| std::env::var(key).ok());

    let ctx = AppContext::new(config)?;

    match cli.command {
        Commands::AddFeed { url } => {
            commands::add_feed(&ctx, &url).await?;
        }
        Commands::CheckFeeds => {
            commands::check_feeds(&ctx).await?;
        }
        Commands::FullFeed { title } => {
            commands::full_feed(&ctx, &title).await?;
        }
        Commands::ResyncFeeds => {
            commands::resync_feeds(&ctx).await?;
        }
        Commands::PublishItems => {
            commands::publish_items(&ctx).await?;
        }
        Commands::PublishOne => {
            commands::publish_one(&ctx).await?;
        }
        Commands::PubNext { feed_id } => {
            commands::pub_next(&ctx, feed_id).await?;
        }
        Commands::ReadyFeeds => {
            commands::ready_feeds(&ctx)?;
        }
        Commands::FeedConfig {
            feed_id,
            ready,
            channel,
            extra_link,
            extra_link_enabled,
        } => {
            let settings = FeedSettings {
                publish_ready: ready,
                tg_channel: channel,
                extra_link_enabled,
                extra_link,
            };
            commands::feed_config(&ctx, feed_id, settings)?;
        }
        Commands::Service => {
            commands::run_service(ctx).await?;
        }
    }

    Ok(())
}
