//! `chatrelay ask` — Single-message or interactive chat from the terminal.
//!
//! Runs the same pipeline as the HTTP handler, so persona, knowledge and
//! the session window behave identically.

use chatrelay_agent::{ChatInput, ChatService};
use chatrelay_config::AppConfig;
use chatrelay_core::message::SessionId;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(
    config: AppConfig,
    message: Option<String>,
    session: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let chat = chatrelay_gateway::build_chat_service(&config)?;
    let session_id = session
        .map(SessionId::from)
        .unwrap_or_else(SessionId::generate);

    if let Some(msg) = message {
        let outcome = chat
            .handle(ChatInput::new(msg, session_id.as_str()))
            .await?;
        println!("{}", outcome.reply);
        return Ok(());
    }

    interactive(&chat, &config, &session_id).await
}

async fn interactive(
    chat: &ChatService,
    config: &AppConfig,
    session_id: &SessionId,
) -> Result<(), Box<dyn std::error::Error>> {
    println!();
    println!("  chatrelay — interactive mode");
    println!();
    println!("  Model:     {}", config.provider.model);
    println!("  Persona:   {:?}", chat.persona().source);
    println!("  Knowledge: {} fragments", chat.knowledge().len());
    println!("  Session:   {session_id}");
    println!();
    println!("  Type your message and press Enter. Type 'exit' to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        match chat.handle(ChatInput::new(line, session_id.as_str())).await {
            Ok(outcome) => {
                println!();
                for reply_line in outcome.reply.lines() {
                    println!("  Assistant > {reply_line}");
                }
                println!();
            }
            Err(e) => {
                eprintln!("  [Error] {e}");
                println!();
            }
        }
    }

    Ok(())
}
