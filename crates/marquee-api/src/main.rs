use marquee_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    let app = marquee_api::setup::initialize_app(config.clone()).await?;

    marquee_api::setup::server::start_server(&config, app.router).await?;

    app.background.shutdown().await;

    Ok(())
}
