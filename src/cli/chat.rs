//! CLI `chat` command: interactive question loop.

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use itinera::config::ItineraConfig;
use itinera::Engine;

pub async fn chat(config: &ItineraConfig, k: usize) -> Result<()> {
    let engine = Engine::from_config(config)?;

    println!("Itinerary assistant. Type 'exit' or 'quit' to leave.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"\nEnter your travel question: ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let query = line.trim();
        if matches!(query.to_lowercase().as_str(), "exit" | "quit") {
            break;
        }
        if query.is_empty() {
            continue;
        }

        println!("\nThinking...\n");
        match engine.answer(query, k).await {
            Ok(text) => {
                println!("=== Assistant Answer ===\n");
                println!("{text}");
                println!("\n=== End ===");
            }
            Err(e) => super::ask::report(&e),
        }
    }
    Ok(())
}
