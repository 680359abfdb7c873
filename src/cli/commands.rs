use std::sync::Arc;

use crate::app::{AppContext, RelayError, Result};
use crate::domain::{Feed, FeedSettings};
use crate::publish::PublishReport;
use crate::service::Service;
use crate::store::Store;
use crate::sync;

pub async fn add_feed(ctx: &AppContext, url: &str) -> Result<()> {
    let feed = sync::register_feed(ctx.store.as_ref(), ctx.source.as_ref(), url).await?;
    println!("Feed #{}: {}", feed.id, feed.display_title());
    if feed.url != url {
        println!("  already registered from {}", feed.url);
    }
    Ok(())
}

pub async fn check_feeds(ctx: &AppContext) -> Result<()> {
    let report = sync::check_all(
        ctx.store.as_ref(),
        ctx.source.as_ref(),
        ctx.config.sync.check_limit,
    )
    .await?;
    println!("Check complete: {} new items", report.created);
    Ok(())
}

pub async fn full_feed(ctx: &AppContext, title: &str) -> Result<()> {
    let report = sync::full_sync(
        ctx.store.as_ref(),
        ctx.source.as_ref(),
        title,
        ctx.config.sync.full_sync_limit,
    )
    .await?;
    println!(
        "Synced {}: {} new items, {} already known",
        title, report.created, report.existing
    );
    Ok(())
}

pub async fn resync_feeds(ctx: &AppContext) -> Result<()> {
    sync::resync_feeds(ctx.store.as_ref(), ctx.source.as_ref()).await?;
    println!("Resync complete");
    Ok(())
}

fn print_report(report: &PublishReport) {
    println!(
        "Published {} items ({} skipped, {} to retry)",
        report.delivered, report.skipped, report.failed
    );
}

pub async fn publish_items(ctx: &AppContext) -> Result<()> {
    let report = ctx.publisher()?.publish_all_ready().await?;
    print_report(&report);
    Ok(())
}

pub async fn publish_one(ctx: &AppContext) -> Result<()> {
    let report = ctx.publisher()?.publish_one_per_feed().await?;
    print_report(&report);
    Ok(())
}

pub async fn pub_next(ctx: &AppContext, feed_id: i64) -> Result<()> {
    let report = ctx.publisher()?.publish_next_for_feed(feed_id).await?;
    print_report(&report);
    Ok(())
}

fn print_feed(feed: &Feed) {
    let channel = feed
        .tg_channel
        .map(|c| c.to_string())
        .unwrap_or_else(|| "-".to_string());
    println!("{:>4}  {}  (channel {})", feed.id, feed.display_title(), channel);
}

pub fn ready_feeds(ctx: &AppContext) -> Result<()> {
    let feeds = ctx.store.get_ready_feeds()?;

    if feeds.is_empty() {
        println!("No feeds are ready for publishing");
        return Ok(());
    }

    for feed in &feeds {
        print_feed(feed);
    }
    Ok(())
}

pub fn feed_config(ctx: &AppContext, feed_id: i64, settings: FeedSettings) -> Result<()> {
    let changed = settings.publish_ready.is_some()
        || settings.tg_channel.is_some()
        || settings.extra_link.is_some()
        || settings.extra_link_enabled.is_some();

    if changed {
        ctx.store
            .get_feed(feed_id)?
            .ok_or_else(|| RelayError::FeedNotFound(feed_id.to_string()))?;
        ctx.store.update_feed_settings(feed_id, &settings)?;
    }

    let feed = ctx
        .store
        .get_feed(feed_id)?
        .ok_or_else(|| RelayError::FeedNotFound(feed_id.to_string()))?;

    print_feed(&feed);
    println!("  url:        {}", feed.url);
    println!("  ready:      {}", feed.publish_ready);
    println!(
        "  extra link: {} ({})",
        feed.extra_link,
        if feed.extra_link_enabled { "on" } else { "off" }
    );
    Ok(())
}

pub async fn run_service(ctx: AppContext) -> Result<()> {
    let ctx = Arc::new(ctx);
    let service = Service::new(ctx.clone(), &ctx.config.service)?;
    service.run().await
}
