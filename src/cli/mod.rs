pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "podrelay")]
#[command(about = "Relay podcast feeds into Telegram channels", long_about = None)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Register a feed by URL
    AddFeed {
        /// URL of the feed document
        url: String,
    },
    /// Ingest the newest items of every feed
    CheckFeeds,
    /// Ingest a long backlog of one feed
    FullFeed {
        /// Title of the registered feed
        title: String,
    },
    /// Re-fetch every feed and refresh its stored image
    ResyncFeeds,
    /// Deliver all pending items of ready feeds
    PublishItems,
    /// Deliver the oldest pending item of each ready feed
    PublishOne,
    /// Deliver the oldest pending item of one feed
    PubNext {
        /// Feed id
        feed_id: i64,
    },
    /// List feeds that are enabled for publishing
    ReadyFeeds,
    /// Show or change a feed's publishing settings
    FeedConfig {
        /// Feed id
        feed_id: i64,

        /// Enable or disable publishing
        #[arg(long)]
        ready: Option<bool>,

        /// Target Telegram channel id
        #[arg(long, allow_hyphen_values = true)]
        channel: Option<i64>,

        /// Link appended to captions
        #[arg(long)]
        extra_link: Option<String>,

        /// Append the extra link to captions
        #[arg(long)]
        extra_link_enabled: Option<bool>,
    },
    /// Sync and publish on a fixed interval until stopped
    Service,
}
