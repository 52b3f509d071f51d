use judge_server::app::run;
use judge_server::errors::Result;

#[tokio::main]
async fn main() -> Result<()> {
    run().await?;
    Ok(())
}
