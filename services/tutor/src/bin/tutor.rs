//! services/tutor/src/bin/tutor.rs
//!
//! A small terminal front end for the tutoring client: analyzes a study
//! material file, prints the topic breakdown, then drops into a streaming
//! chat loop.

use std::io::{BufRead, Write};
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tutor_core::domain::{ChatMessage, LessonContext};
use tutor_lib::{ClientError, Config, HttpBackendAdapter, TutorSession};

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Connecting to {}", config.api_url);

    // --- 2. Build the Backend Adapter & Session ---
    let backend = Arc::new(HttpBackendAdapter::new(&config)?);
    let session = TutorSession::new(backend);

    // --- 3. Analyze the Material ---
    let material_path = std::env::args().nth(1).ok_or_else(|| {
        ClientError::Internal("usage: tutor <material-file>".to_string())
    })?;
    let material = std::fs::read_to_string(&material_path)?;

    println!("Analyzing {material_path}...");
    let Some(analysis) = session.analyze_material(&material).await else {
        let reason = session
            .last_notice()
            .map(|notice| notice.message)
            .unwrap_or_else(|| "analysis failed".to_string());
        return Err(ClientError::Internal(reason));
    };

    println!("\n{} ({} min total)", analysis.title, analysis.total_estimated_minutes);
    for topic in &analysis.topics {
        println!(
            "  {}. {} [{}] ({} min)",
            topic.order, topic.name, topic.difficulty, topic.estimated_minutes
        );
    }

    let lesson_context = LessonContext {
        topic: analysis.title.clone(),
        subtopic: analysis.topics.first().map(|topic| topic.name.clone()),
        difficulty: analysis.overall_difficulty.clone(),
        learning_style: "reading".to_string(),
    };

    // --- 4. Chat Loop ---
    println!("\nAsk questions about the material (empty line to quit).");
    let stdin = std::io::stdin();
    let mut messages: Vec<ChatMessage> = Vec::new();

    loop {
        print!("you> ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            break;
        }

        messages.push(ChatMessage::user(line));
        print!("tutor> ");
        let reply = session
            .chat(&messages, Some(&lesson_context), |delta| {
                print!("{delta}");
                let _ = std::io::stdout().flush();
            })
            .await;
        println!();
        messages.push(ChatMessage::assistant(reply));
    }

    // --- 5. Session Summary ---
    if !messages.is_empty() {
        let summary = session.session_summary(&lesson_context).await;
        if !summary.is_empty() {
            println!("\nSession summary:\n{summary}");
        }
    }

    Ok(())
}
