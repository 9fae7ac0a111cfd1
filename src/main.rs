#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pkiproxy::cli::run_cli().await
}
