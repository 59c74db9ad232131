use calform::components::google_calendar::consent::ConsentFlow;
use calform::components::google_calendar::token::TokenStore;
use calform::startup;

#[tokio::main]
async fn main() -> miette::Result<()> {
    // Initialize logging
    startup::init_logging()?;

    // Load configuration
    let config = startup::load_config()?;

    let store = TokenStore::new(&config.token_path, &config.credentials_path);
    if store.load().await.is_some() {
        println!(
            "A token already exists at {}; it will be replaced.",
            store.token_path().display()
        );
    }

    println!("Opening browser for Google Calendar authorization...");
    let grant = ConsentFlow::new(&config).run().await?;

    // Save token next to the app credentials
    store.save(&grant.refresh_token).await?;

    println!("Token successfully saved to {}!", store.token_path().display());

    Ok(())
}
