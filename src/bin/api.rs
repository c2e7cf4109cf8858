use budget_choice_experiment::{
    advice::{AdviceGenerator, AdviceRequester, MockAdviceService, OpenAiClient},
    api::start_server,
    store::InMemorySessionStore,
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();

    let api_port: u16 = std::env::var("PORT")
        .or_else(|_| std::env::var("API_PORT"))
        .unwrap_or_else(|_| "8080".to_string())
        .parse()?;

    info!("🚀 Budget-Choice Experiment - API Server");
    info!("📍 Port: {}", api_port);

    // Create components
    let generator: Box<dyn AdviceGenerator> = if api_key.is_empty() {
        eprintln!("⚠️  OPENAI_API_KEY not set in .env");
        eprintln!("📌 Treatment-group advice will use the offline mock service");
        Box::new(MockAdviceService)
    } else {
        let client = match std::env::var("OPENAI_BASE_URL") {
            Ok(base_url) => OpenAiClient::new(api_key).with_base_url(base_url),
            Err(_) => OpenAiClient::new(api_key),
        };
        Box::new(client)
    };

    let advice = Arc::new(AdviceRequester::new(generator));
    let store = Arc::new(InMemorySessionStore::new());

    info!("✅ Session store and advice requester initialized");
    info!("📡 Starting API server...");

    // Start API server
    start_server(store, advice, api_port).await?;

    Ok(())
}
