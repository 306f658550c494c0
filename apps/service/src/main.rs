#[tokio::main]
async fn main() -> anyhow::Result<()> {
    lexquest_service::run().await
}
