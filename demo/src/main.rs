//! Demo API protected by scopegate
//!
//! Serves `GET /health` without authentication and `GET /me` behind the
//! bearer middleware. Trust settings come from flags or the environment:
//!
//! ```text
//! SCOPEGATE_TENANT_ID=contoso SCOPEGATE_AUDIENCE=api://orders \
//!     cargo run -p scopegate-demo
//! curl -H "Authorization: Bearer $TOKEN" http://127.0.0.1:3000/me
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::{Extension, Json, Router};
use clap::Parser;
use scopegate::tower::BearerAuthLayer;
use scopegate::{
    DEFAULT_REQUIRED_SCOPE, Principal, TokenValidationEngine, TrustConfig, TrustSettings,
    preferred_user_name,
};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(name = "scopegate-demo")]
#[command(about = "Bearer-token protected demo API", version)]
struct Cli {
    /// Identity provider base URL
    #[arg(
        long,
        env = "SCOPEGATE_INSTANCE",
        default_value = "https://login.microsoftonline.com/"
    )]
    instance: String,

    /// Tenant identifier
    #[arg(long, env = "SCOPEGATE_TENANT_ID")]
    tenant_id: Option<String>,

    /// Expected audience
    #[arg(long, env = "SCOPEGATE_AUDIENCE")]
    audience: Option<String>,

    /// Scope every token must carry
    #[arg(long, env = "SCOPEGATE_REQUIRED_SCOPE", default_value = DEFAULT_REQUIRED_SCOPE)]
    required_scope: String,

    /// Clock skew tolerance in seconds
    #[arg(long, env = "SCOPEGATE_CLOCK_SKEW_SECS", default_value_t = 0)]
    clock_skew_secs: u64,

    /// Address to listen on
    #[arg(long, env = "SCOPEGATE_BIND", default_value = "127.0.0.1:3000")]
    bind: SocketAddr,
}

impl From<&Cli> for TrustSettings {
    fn from(cli: &Cli) -> Self {
        TrustSettings {
            instance: Some(cli.instance.clone()),
            tenant_id: cli.tenant_id.clone(),
            audience: cli.audience.clone(),
            required_scope: cli.required_scope.clone(),
            clock_skew_secs: cli.clock_skew_secs,
        }
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn me(Extension(principal): Extension<Principal>) -> Json<Value> {
    Json(json!({
        "name": preferred_user_name(&principal),
        "subject": principal.subject(),
        "scopes": principal.scopes(),
    }))
}

fn router(engine: Arc<TokenValidationEngine>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/me", get(me))
        .layer(BearerAuthLayer::from_arc(engine).bypass_path("/health"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,scopegate=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = TrustConfig::try_from(TrustSettings::from(&cli))?;
    tracing::info!(
        discovery_url = %config.discovery_url(),
        audience = config.audience(),
        required_scope = config.required_scope(),
        "trust configuration loaded"
    );

    let engine = Arc::new(TokenValidationEngine::new(config)?);

    // Warm the cache; a failure here is retried on the first request
    if let Err(err) = engine.discovery().get().await {
        tracing::warn!(error = %err, "initial discovery fetch failed");
    }

    let listener = tokio::net::TcpListener::bind(cli.bind).await?;
    tracing::info!(addr = %cli.bind, "listening");
    axum::serve(listener, router(engine)).await?;

    Ok(())
}
