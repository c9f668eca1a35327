//! Stream a chat completion and print tokens as they arrive.
//!
//! Run with:
//! ```bash
//! export OPENAI_API_KEY="your-api-key"
//! RUST_LOG=unai_sse=debug cargo run --example openai_streaming
//! ```

use std::io::Write;

use tracing_subscriber::EnvFilter;
use unai_sse::client::StreamingClient;
use unai_sse::model::Message;
use unai_sse::options::{HttpTransport, ModelOptions, OpenAiModel, SessionOptions, TransportOptions};
use unai_sse::providers::OpenAiClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let model_options = ModelOptions::new(OpenAiModel::default())
        .with_model("gpt-4o-mini".to_string())
        .with_instructions("You are a friendly dental clinic assistant.".to_string())
        .with_max_tokens(200);

    let client = OpenAiClient::new(
        model_options.clone(),
        TransportOptions::new(HttpTransport::from_env()?),
    );

    let messages = vec![Message::user("I have tooth pain, what should I do?")];

    println!("=== Streaming ===");
    let result = client
        .chat_stream_with_options(
            messages,
            &model_options,
            SessionOptions::new().with_request_id("demo-1"),
            |delta, _cumulative| {
                print!("{}", delta);
                let _ = std::io::stdout().flush();
            },
        )
        .await;

    match result {
        Ok(reply) => {
            println!("\n\n=== Final response ({} chars) ===", reply.len());
            println!("{}", reply);
        }
        Err(e) => {
            eprintln!("\n{}", e.user_message());
            eprintln!("details: {}", e);
        }
    }

    Ok(())
}
