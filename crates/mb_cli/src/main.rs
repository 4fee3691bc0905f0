use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use clap::{Args, Parser, Subcommand};
use mb_core::{Error, Result, Storage};
use mb_inference::Summarizer;
use mb_news::{
    handle_command, BriefingArgs, BriefingCommands, BriefingGenerator, FetchWindow, FetchedNews,
    NewsSource, PushNotifier, TheNewsApi, TheNewsApiConfig,
};
use mb_storage::StorageKind;
use mb_tts::ElevenLabsConfig;
use mb_web::{AppState, BeehiivClient, BeehiivConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Fetch, summarize and narrate the daily geopolitics briefing", long_about = None)]
pub struct Cli {
    /// Storage backend: memory, file or sqlite
    #[arg(long, env = "MORNING_BRIEF_STORAGE", default_value = "file")]
    storage: String,
    /// Data directory for the file backend, database path for sqlite
    #[arg(long, env = "MORNING_BRIEF_DATA")]
    data: Option<String>,
    #[command(flatten)]
    keys: Keys,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct Keys {
    #[arg(long, env = "THENEWSAPI_KEY", hide_env_values = true)]
    news_api_key: Option<String>,
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    anthropic_api_key: Option<String>,
    /// Anthropic model id
    #[arg(long, env = "ANTHROPIC_MODEL")]
    model: Option<String>,
    #[arg(long, env = "ELEVENLABS_API_KEY", hide_env_values = true)]
    elevenlabs_api_key: Option<String>,
    /// Narrate with Amazon Polly (needs the `polly` build feature and AWS credentials)
    #[arg(long, env = "MORNING_BRIEF_POLLY")]
    polly: bool,
    #[arg(long, env = "AWS_REGION")]
    aws_region: Option<String>,
    #[arg(long, env = "BEEHIIV_API_KEY", hide_env_values = true)]
    beehiiv_api_key: Option<String>,
    #[arg(long, env = "BEEHIIV_PUBLICATION_ID")]
    beehiiv_publication_id: Option<String>,
    #[arg(long, env = "VAPID_PUBLIC_KEY")]
    vapid_public_key: Option<String>,
    #[arg(long, env = "VAPID_PRIVATE_KEY", hide_env_values = true)]
    vapid_private_key: Option<String>,
    #[arg(long, env = "VAPID_SUBJECT", default_value = "mailto:hello@morningbrief.news")]
    vapid_subject: String,
    #[arg(long, env = "CRON_SECRET", hide_env_values = true)]
    cron_secret: Option<String>,
    /// Protects historical generation; defaults to the cron secret
    #[arg(long, env = "ADMIN_SECRET", hide_env_values = true)]
    admin_secret: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the REST API and stored audio
    Serve {
        #[arg(long, env = "MORNING_BRIEF_ADDR", default_value = "127.0.0.1:3000")]
        addr: SocketAddr,
    },
    #[command(flatten)]
    Briefing(BriefingCommands),
}

/// Stands in for the news API when no key is configured, so stored
/// briefings can still be read and served.
struct UnconfiguredSource;

#[async_trait]
impl NewsSource for UnconfiguredSource {
    fn name(&self) -> &str {
        "Unconfigured"
    }

    async fn fetch_all(&self, _window: &FetchWindow) -> Result<FetchedNews> {
        Err(Error::NotConfigured("THENEWSAPI_KEY".to_string()))
    }
}

fn news_source(api_key: Option<String>) -> Result<Arc<dyn NewsSource>> {
    match api_key {
        Some(key) => {
            let config = TheNewsApiConfig { api_key: Some(key), ..TheNewsApiConfig::default() };
            Ok(Arc::new(TheNewsApi::new(config)?))
        }
        None => {
            warn!("⚠️ THENEWSAPI_KEY not set, generation is disabled");
            Ok(Arc::new(UnconfiguredSource))
        }
    }
}

fn summarizer(keys: &Keys) -> Result<Summarizer> {
    let provider = if keys.anthropic_api_key.is_some() {
        "anthropic"
    } else {
        warn!("⚠️ ANTHROPIC_API_KEY not set, using template summaries");
        "offline"
    };
    let model = mb_inference::create_model(mb_inference::Config {
        provider: provider.to_string(),
        api_key: keys.anthropic_api_key.clone(),
        model_name: keys.model.clone(),
        base_url: None,
    })?;
    Ok(Summarizer::new(model))
}

#[cfg(feature = "web-push")]
fn push_notifier(keys: &Keys, storage: Arc<dyn Storage>) -> Option<Arc<PushNotifier>> {
    use mb_news::notify::{VapidConfig, WebPushSender};

    let (Some(public_key), Some(private_key)) =
        (keys.vapid_public_key.clone(), keys.vapid_private_key.clone())
    else {
        info!("🔕 VAPID keys not set, push disabled");
        return None;
    };
    let vapid = VapidConfig { public_key, private_key, subject: keys.vapid_subject.clone() };
    match WebPushSender::new(vapid) {
        Ok(sender) => Some(Arc::new(PushNotifier::new(Arc::new(sender), storage))),
        Err(e) => {
            warn!("Push disabled: {}", e);
            None
        }
    }
}

#[cfg(not(feature = "web-push"))]
fn push_notifier(keys: &Keys, _storage: Arc<dyn Storage>) -> Option<Arc<PushNotifier>> {
    if keys.vapid_private_key.is_some() {
        warn!("VAPID keys set but morning-brief was built without the `web-push` feature");
    }
    None
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let cli = Cli::parse();

    let kind: StorageKind = cli.storage.parse()?;
    let storage = mb_storage::create_storage(kind, cli.data.as_deref()).await?;
    info!("💾 Storage ready (using {})", cli.storage);

    let narrators = mb_tts::build_narrators(mb_tts::Config {
        elevenlabs: ElevenLabsConfig {
            api_key: cli.keys.elevenlabs_api_key.clone(),
            ..ElevenLabsConfig::default()
        },
        aws_region: cli.keys.aws_region.clone(),
        polly: cli.keys.polly,
    })
    .await;

    let generator = Arc::new(
        BriefingGenerator::new(
            news_source(cli.keys.news_api_key.clone())?,
            summarizer(&cli.keys)?,
            storage.clone(),
        )
        .with_narrators(narrators.full, narrators.category),
    );
    let notifier = push_notifier(&cli.keys, storage.clone());

    match cli.command {
        Commands::Serve { addr } => {
            let mut state = AppState::new(generator)
                .with_secrets(cli.keys.cron_secret.clone(), cli.keys.admin_secret.clone());
            if let (Some(notifier), Some(public_key)) = (notifier, cli.keys.vapid_public_key.clone()) {
                state = state.with_push(notifier, public_key);
            }
            if let Some(provider) = narrators.elevenlabs {
                state = state.with_elevenlabs(provider);
            }
            match BeehiivClient::new(BeehiivConfig {
                api_key: cli.keys.beehiiv_api_key.clone(),
                publication_id: cli.keys.beehiiv_publication_id.clone(),
                base_url: None,
            }) {
                Ok(client) => state = state.with_newsletter(Arc::new(client)),
                Err(e) => info!("📭 Newsletter forwarding off: {}", e),
            }
            mb_web::serve(state, addr).await?;
        }
        Commands::Briefing(command) => {
            handle_command(BriefingArgs { command }, &generator, notifier.as_deref()).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve_and_briefing_commands() {
        let cli = Cli::try_parse_from(["morning-brief", "--storage", "memory", "serve", "--addr", "0.0.0.0:8080"]).unwrap();
        assert_eq!(cli.storage, "memory");
        assert!(matches!(cli.command, Commands::Serve { addr } if addr.port() == 8080));

        let cli = Cli::try_parse_from(["morning-brief", "generate", "--force"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Briefing(BriefingCommands::Generate { date: None, force: true })
        ));

        let cli = Cli::try_parse_from(["morning-brief", "history", "--limit", "3"]).unwrap();
        assert!(matches!(cli.command, Commands::Briefing(BriefingCommands::History { limit: 3 })));
    }

    #[tokio::test]
    async fn test_unconfigured_source_refuses_to_fetch() {
        let source = news_source(None).unwrap();
        let window = FetchWindow::last_24h(chrono::Utc::now());
        assert!(matches!(source.fetch_all(&window).await, Err(Error::NotConfigured(_))));
    }
}
