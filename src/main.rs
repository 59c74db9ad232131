use calform::startup;
use tracing::info;

#[tokio::main]
async fn main() -> miette::Result<()> {
    // Initialize logging
    startup::init_logging()?;

    info!("Starting calform");

    // Load configuration
    let config = startup::load_config()?;

    // Serve the form
    startup::serve(config).await
}
