#[tokio::main]
async fn main() -> anyhow::Result<()> {
    linepace_lib::run().await
}
