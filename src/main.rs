use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use whatsapp_bridge::auth::MultiFileAuthState;
use whatsapp_bridge::client::ClientConnector;
use whatsapp_bridge::config::{load_config, Config};
use whatsapp_bridge::events::DEFAULT_EVENT_CAPACITY;
use whatsapp_bridge::mirror::Mirror;
use whatsapp_bridge::session::{Session, SessionConfig};
use whatsapp_bridge::socket::WsDialer;
use whatsapp_bridge::store::Store;
use whatsapp_bridge::version::{VersionSource, BUNDLED_VERSION};
use whatsapp_bridge::{logging, server};

#[derive(Parser)]
#[command(name = "whatsapp-bridge")]
#[command(about = "Expose a WhatsApp session over a small HTTP API", long_about = None)]
struct Cli {
    /// Config file path (TOML). Defaults apply when absent.
    #[arg(long, short, value_name = "PATH", env = "WA_BRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// HTTP port (default from config or 3000)
    #[arg(long, short, env = "WA_BRIDGE_PORT")]
    port: Option<u16>,

    /// HTTP bind address (default from config or 0.0.0.0)
    #[arg(long, env = "WA_BRIDGE_BIND")]
    bind: Option<String>,

    /// Directory holding session credentials
    #[arg(long, value_name = "DIR", env = "WA_BRIDGE_AUTH_DIR")]
    auth_dir: Option<PathBuf>,

    /// WebSocket URL of the protocol gateway
    #[arg(long, value_name = "URL", env = "WA_BRIDGE_TRANSPORT_URL")]
    transport_url: Option<String>,

    /// Use the bundled protocol version instead of fetching the latest
    #[arg(long)]
    offline_version: bool,

    /// Do not render pairing QR codes in the terminal
    #[arg(long)]
    no_qr: bool,
}

impl Cli {
    fn apply(self, config: &mut Config) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(bind) = self.bind {
            config.server.bind = bind;
        }
        if let Some(dir) = self.auth_dir {
            config.auth.dir = dir;
        }
        if let Some(url) = self.transport_url {
            config.transport.url = url;
        }
        if self.offline_version {
            config.version.fetch = false;
        }
        if self.no_qr {
            config.print_qr = false;
        }
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = match load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to load config: {:#}", e);
            std::process::exit(1);
        }
    };
    cli.apply(&mut config);

    if let Err(e) = logging::init_tracing(&config.log.level) {
        eprintln!("{:#}", e);
    }

    if let Err(e) = run(config).await {
        tracing::error!("bridge failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    let version = if config.version.fetch {
        VersionSource::remote(config.version.url.clone())
    } else {
        VersionSource::Fixed(BUNDLED_VERSION)
    };
    let dialer = Arc::new(WsDialer::new(config.transport.url.clone()));

    let (session, handles) = Session::new(SessionConfig {
        auth: Arc::new(MultiFileAuthState::new(config.auth.dir.clone())),
        connector: Arc::new(ClientConnector::new(dialer)),
        version,
        reconnect: config.reconnect.clone(),
        mirror: Mirror::new(config.mirror.capacity, config.mirror.first_only).shared(),
        store: Store::new(config.mirror.messages_per_chat).shared(),
        print_qr: config.print_qr,
        event_capacity: DEFAULT_EVENT_CAPACITY,
    });
    tracing::info!(
        auth_dir = %config.auth.dir.display(),
        transport = %config.transport.url,
        "starting session"
    );
    let _session_task = session.spawn();

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    server::serve(listener, handles.into(), shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
