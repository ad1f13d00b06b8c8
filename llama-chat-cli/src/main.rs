mod client;

use anyhow::Result;
use client::GatewayClient;
use llama_chat_shared::{ChatRequest, MessageRole};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

const DEFAULT_GATEWAY_URL: &str = "http://localhost:8080";
const DEFAULT_MAX_TOKENS: i64 = 150;
const ERROR_REPLY: &str = "Sorry, I encountered an error. Please try again.";

struct Transcript {
    entries: Vec<(MessageRole, String)>,
}

impl Transcript {
    fn new() -> Self {
        Self { entries: Vec::new() }
    }

    fn push(&mut self, role: MessageRole, content: String) {
        self.entries.push((role, content));
    }

    fn print(&self) {
        for (role, content) in &self.entries {
            let label = match role {
                MessageRole::User => "you",
                MessageRole::Assistant => "llama",
            };
            println!("{:>6} | {}", label, content);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Log to a file so tracing output does not interleave with the conversation
    if let Ok(file) = std::fs::File::create("llama-chat.log") {
        tracing_subscriber::fmt()
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .init();
    }

    let base_url =
        std::env::var("LLAMA_CHAT_URL").unwrap_or_else(|_| DEFAULT_GATEWAY_URL.to_string());
    let max_tokens = match std::env::var("LLAMA_CHAT_MAX_TOKENS") {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid LLAMA_CHAT_MAX_TOKENS '{}'", raw);
            DEFAULT_MAX_TOKENS
        }),
        Err(_) => DEFAULT_MAX_TOKENS,
    };

    let client = GatewayClient::new(&base_url)?;
    match client.health().await {
        Ok(health) => info!("Gateway {} is {}", client.base_url(), health.status),
        Err(e) => {
            warn!("Gateway health check failed: {}", e);
            eprintln!("warning: gateway at {} is not reachable yet", client.base_url());
        }
    }

    println!("Connected to {}. Type a message, /history to review, /quit to exit.", client.base_url());

    let mut transcript = Transcript::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        match input {
            "" => continue,
            "/quit" | "/exit" => break,
            "/history" => {
                transcript.print();
                continue;
            }
            _ => {}
        }

        transcript.push(MessageRole::User, input.to_string());
        let request = ChatRequest::new(input).with_max_tokens(max_tokens);
        let reply = match client.chat(&request).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Chat request failed: {:#}", e);
                ERROR_REPLY.to_string()
            }
        };

        println!("{}", reply);
        transcript.push(MessageRole::Assistant, reply);
    }

    info!("Exiting after {} messages", transcript.entries.len());
    Ok(())
}
