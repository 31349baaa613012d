use smartcity::{
    app,
    config::PublicConfig,
    state::PublicState,
    telemetry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init("smartcity=debug,public_api=debug,tower_http=info");

    let config = PublicConfig::from_env()?;
    let state = PublicState::init(&config);
    tracing::info!(models_dir = %config.models_dir.display(), "public API starting");

    let app = app::build_public_app(state, config.max_content_length);
    app::serve(app, &config.host, config.port).await
}
