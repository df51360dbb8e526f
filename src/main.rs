#[tokio::main]
async fn main() -> anyhow::Result<()> {
    jungle_tracker_lib::run().await
}
