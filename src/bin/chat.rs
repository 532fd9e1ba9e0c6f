use anyhow::Result;
use campus_rag::bootstrap::{build_services, init_logging};
use campus_rag::history::{ChatHistory, Role};
use campus_rag::Config;
use clap::Parser;
use std::io::{self, BufRead, Write};

#[derive(Parser, Debug)]
#[command(name = "chat")]
#[command(about = "Ask questions about the indexed university documents")]
struct Args {
    /// Number of chunks retrieved per question (defaults to chat.top_k)
    #[arg(short = 'k', long)]
    top_k: Option<usize>,
}

const HELP: &str = "\
Commands:
  help      show this message
  history   show the last 10 messages
  clear     delete the chat history
  exit      quit (also: quit, thoat, thoát)
Anything else is sent as a question.";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = Config::load()?;
    init_logging(&config.app.log_level);
    if let Some(k) = args.top_k.filter(|k| *k > 0) {
        config.chat.top_k = k;
    }

    let query = build_services(&config).await?.query;
    let mut history = ChatHistory::open(&config.app.history_file);

    println!("Campus RAG assistant. Type 'help' for commands.\n");
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("Bạn: ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else { break };
        let input = line?;
        let input = input.trim();

        match input.to_lowercase().as_str() {
            "" => continue,
            cmd if is_exit(cmd) => break,
            "help" => println!("{}\n", HELP),
            "history" => {
                if history.is_empty() {
                    println!("(no history)\n");
                }
                for entry in history.recent(10) {
                    let who = match entry.role {
                        Role::User => "Bạn",
                        Role::Assistant => "Bot",
                    };
                    println!("[{}] {}: {}", entry.timestamp, who, entry.content);
                }
                println!();
            }
            "clear" => {
                print!("Delete all chat history? (yes/no): ");
                io::stdout().flush()?;
                let confirmed = matches!(lines.next(), Some(Ok(answer)) if answer.trim().eq_ignore_ascii_case("yes"));
                if confirmed {
                    history.clear();
                    println!("History cleared.\n");
                } else {
                    println!("Cancelled.\n");
                }
            }
            _ => {
                history.add_message(Role::User, input, Vec::new());
                match query.answer(input).await {
                    Ok(answer) => {
                        let reply = answer.render(&config.chat.no_answer_message);
                        println!("\nBot: {}", reply);
                        if !answer.sources().is_empty() {
                            println!("Sources: {}", answer.sources().join(", "));
                        }
                        println!();
                        history.add_message(Role::Assistant, &reply, answer.sources().to_vec());
                    }
                    Err(e) => {
                        log::error!("Question failed: {}", e);
                        println!("\nBot: Error while answering: {}\n", e);
                    }
                }
            }
        }
    }

    println!("Goodbye!");
    Ok(())
}

fn is_exit(command: &str) -> bool {
    matches!(command, "exit" | "quit" | "thoat" | "thoát")
}
