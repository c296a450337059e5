//! CLI `doctor` command: database diagnostics and setup checks.

use anyhow::{Context, Result};

use itinera::config::{expand_tilde, ItineraConfig};
use itinera::db;

/// Print a health report for the knowledge database, model files and generator.
pub fn doctor(config: &ItineraConfig) -> Result<()> {
    let db_path = config.resolved_db_path();

    println!("Itinera Health Report");
    println!("=====================");
    println!();

    if !db_path.exists() {
        println!("Database:          not found at {}", db_path.display());
        println!("Set storage.db_path or ITINERA_DB to an indexed knowledge base.");
    } else {
        let file_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);
        let conn = db::open_database(&db_path)
            .context("failed to open database (may be corrupt)")?;
        let report = db::check_database_health(&conn).context("failed to run health check")?;

        println!("Database:          {}", db_path.display());
        println!("File size:         {}", format_bytes(file_size));
        println!("sqlite-vec:        {}", report.sqlite_vec_version);
        println!();
        println!("Row counts:");
        println!("  Entities:        {}", report.entity_count);
        println!("  Relations:       {}", report.relation_count);
        println!("  Vectors:         {}", report.vector_count);
        if report.unembedded_count > 0 {
            println!(
                "  WARNING: {} entities have no vector and will never be retrieved.",
                report.unembedded_count
            );
        }
        println!();
        if report.integrity_ok {
            println!("Integrity check:   PASSED");
        } else {
            println!("Integrity check:   FAILED ({})", report.integrity_details);
        }
    }

    println!();
    let model_dir = expand_tilde(&config.embedding.cache_dir);
    let model_ok = ["model.onnx", "tokenizer.json"]
        .iter()
        .all(|f| model_dir.join(f).exists());
    println!("Embedding model:   {}", config.embedding.model);
    if model_ok {
        println!("  Files:           OK ({})", model_dir.display());
    } else {
        println!("  Files:           missing. Run `itinera model download`.");
    }
    println!("  Query cache:     {}", config.embedding.query_cache);

    println!();
    println!("Generation:        {} ({})", config.generation.provider, config.generation.model);
    if config.generation.api_key.is_some() {
        println!("  API key:         set");
    } else {
        println!("  API key:         missing. Set GEMINI_API_KEY or generation.api_key.");
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
