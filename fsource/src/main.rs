#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fsource::run_cli().await
}
