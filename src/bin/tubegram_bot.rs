#![forbid(unsafe_code)]

//! Telegram entry point. Loads settings, checks that yt-dlp is callable and
//! hands every update to the shared [`Handlers`] through a per-chat
//! [`TelegramOutbox`].

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use teloxide::{prelude::*, utils::command::BotCommands};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tubegram::{
    config::{self, DEFAULT_CONFIG_PATH},
    handlers::Handlers,
    link_store::LinkStore,
    links,
    outbox::TelegramOutbox,
    security,
    ytdlp::YtDlp,
};

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;
type SharedHandlers = Arc<Handlers<YtDlp>>;

#[derive(Parser, Debug)]
#[command(name = "tubegram-bot", about = "Telegram bot that downloads YouTube videos on request")]
struct Cli {
    /// env-style config file (KEY="value" per line)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Overrides DOWNLOAD_DIR
    #[arg(long)]
    download_dir: Option<PathBuf>,

    /// Overrides YTDLP_PATH
    #[arg(long)]
    ytdlp: Option<PathBuf>,

    /// debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
enum Command {
    #[command(description = "greeting and upload limit")]
    Start,
    #[command(description = "how to use the bot")]
    Help,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    security::ensure_not_root("tubegram-bot")?;

    let mut settings = config::load_settings_from(&cli.config, |key| std::env::var(key).ok())
        .with_context(|| format!("loading settings (config file {})", cli.config.display()))?;
    if let Some(dir) = cli.download_dir {
        settings.download_dir = dir;
    }
    if let Some(program) = cli.ytdlp {
        settings.ytdlp_path = program;
    }

    let ytdlp = YtDlp::from_settings(&settings);
    let version = ytdlp.ensure_available().await?;
    tokio::fs::create_dir_all(&settings.download_dir)
        .await
        .with_context(|| format!("creating {}", settings.download_dir.display()))?;

    info!(
        ytdlp = %version,
        download_dir = %settings.download_dir.display(),
        max_upload_mb = settings.max_upload_mb,
        "bot starting"
    );

    let handlers: SharedHandlers = Arc::new(Handlers::new(
        ytdlp,
        LinkStore::new(settings.link_store_capacity),
        settings.max_upload_mb,
    ));
    let bot = Bot::new(settings.bot_token.expose());

    let schema = dptree::entry()
        .branch(
            Update::filter_message()
                .branch(
                    dptree::entry()
                        .filter_command::<Command>()
                        .endpoint(on_command),
                )
                .branch(
                    dptree::filter(|msg: Message| !msg.text().is_some_and(links::is_command))
                        .endpoint(on_text),
                ),
        )
        .branch(Update::filter_callback_query().endpoint(on_callback));

    Dispatcher::builder(bot, schema)
        .dependencies(dptree::deps![handlers])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("bot stopped");
    Ok(())
}

/// `RUST_LOG` wins unless `-v` asks for debug output. teloxide's `log`
/// records are bridged by the subscriber.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn on_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    handlers: SharedHandlers,
) -> HandlerResult {
    let outbox = TelegramOutbox::new(bot, msg.chat.id);
    match cmd {
        Command::Start => handlers.start(&outbox).await?,
        Command::Help => handlers.help(&outbox).await?,
    }
    Ok(())
}

async fn on_text(bot: Bot, msg: Message, handlers: SharedHandlers) -> HandlerResult {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let outbox = TelegramOutbox::new(bot, msg.chat.id);
    handlers.link(&outbox, text).await?;
    Ok(())
}

async fn on_callback(bot: Bot, query: CallbackQuery, handlers: SharedHandlers) -> HandlerResult {
    bot.answer_callback_query(query.id.clone()).await?;

    let (Some(data), Some(message)) = (query.data.as_deref(), query.message.as_ref()) else {
        return Ok(());
    };
    let outbox = TelegramOutbox::new(bot, message.chat().id);
    handlers.selection(&outbox, data).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_to_system_config() {
        let cli = Cli::try_parse_from(["tubegram-bot"]).unwrap();
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert!(cli.download_dir.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn cli_accepts_overrides() {
        let cli = Cli::try_parse_from([
            "tubegram-bot",
            "--config",
            "/tmp/bot.env",
            "--download-dir",
            "/srv/dl",
            "--ytdlp",
            "/opt/yt-dlp",
            "-v",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("/tmp/bot.env"));
        assert_eq!(cli.download_dir, Some(PathBuf::from("/srv/dl")));
        assert_eq!(cli.ytdlp, Some(PathBuf::from("/opt/yt-dlp")));
        assert!(cli.verbose);
    }

    #[test]
    fn parses_known_commands_only() {
        assert_eq!(Command::parse("/start", "tubegram_bot").unwrap(), Command::Start);
        assert_eq!(Command::parse("/help", "tubegram_bot").unwrap(), Command::Help);
        assert!(Command::parse("/download", "tubegram_bot").is_err());
    }
}
