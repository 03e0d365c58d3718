use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    atlas::cli::run().await
}
