mod config;
mod relay;

use std::path::Path;
use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::ChatKind;
use tracing::info;
use tracing_subscriber::prelude::*;

use config::Config;
use relay::{
    AvatarStore, Database, GeminiClient, InboundMessage, PersonaBook, RelayEngine, SenderProfile,
    TelegramClient,
};

type Engine = RelayEngine<TelegramClient, GeminiClient>;

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "gemgram.json".to_string());
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let database_url = match std::env::var("DATABASE_URL") {
        Ok(url) if !url.is_empty() => url,
        _ => {
            eprintln!("Error: DATABASE_URL environment variable not set.");
            std::process::exit(1);
        }
    };

    // Setup logging
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("gemgram.log"))
        .expect("Failed to open log file");
    let (non_blocking, _guard) = tracing_appender::non_blocking(log_file);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .init();

    info!("🚀 Starting gemgram...");
    info!("Loaded config from {config_path}");
    info!("Using model {}", config.gemini_model);

    let personas = PersonaBook::load(&config.prompt_config_path());

    let database = match Database::open(Path::new(&database_url)) {
        Ok(db) => Arc::new(db),
        Err(e) => {
            eprintln!("Error initializing database: {e}");
            std::process::exit(1);
        }
    };
    info!("Database initialized successfully.");

    let avatars = AvatarStore::new(&config.data_dir);
    if let Err(e) = avatars.ensure_dir() {
        eprintln!("Error creating profile picture directory: {e}");
        std::process::exit(1);
    }

    let bot = Bot::new(config.bot_token());
    let transport = Arc::new(TelegramClient::new(bot.clone()));
    let model = Arc::new(GeminiClient::new(
        config.gemini_api_key.clone(),
        config.gemini_model.clone(),
        personas.system_prompt().to_string(),
    ));
    let engine = Arc::new(RelayEngine::new(personas, database, avatars, transport, model));

    info!("Client started. Listening for messages...");

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handle_new_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![engine])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn handle_new_message(msg: Message, engine: Arc<Engine>) -> ResponseResult<()> {
    // Only private text messages from a human sender enter the pipeline;
    // everything else is ignored silently.
    if !matches!(msg.chat.kind, ChatKind::Private(_)) {
        return Ok(());
    }
    let Some(ref user) = msg.from else {
        return Ok(());
    };
    if user.is_bot {
        return Ok(());
    }
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let inbound = InboundMessage {
        chat_id: msg.chat.id.0,
        sender_id: user.id.0 as i64,
        sender: SenderProfile {
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        },
        text: text.to_string(),
    };

    engine.handle_message(inbound).await;
    Ok(())
}
