#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let config = spot_lib::load_config(spot_lib::config_path(&args))?;
    spot_lib::init_tracing(&config)?;
    spot_lib::run(config).await
}
