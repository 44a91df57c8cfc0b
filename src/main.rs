use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};

use video_analytics_bot::bot::{self, LlmQuestionService};
use video_analytics_bot::config::{self, AppConfig};
use video_analytics_bot::database::Database;
use video_analytics_bot::executor::QueryExecutor;
use video_analytics_bot::llm::LlmClient;
use video_analytics_bot::logging::init_logging;
use video_analytics_bot::telegram::TelegramClient;

#[derive(Parser)]
#[command(name = "video-analytics-bot", version)]
#[command(about = "Telegram bot answering questions about video metrics with a single number")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the Telegram bot (imports the JSON feed first if present)
    Bot {
        #[arg(long)]
        skip_load: bool,
    },

    /// Ask a single question (non-interactive)
    Ask {
        question: String,
        #[arg(long)]
        show_sql: bool,
    },

    /// Interactive question prompt
    Query,

    /// Import videos and snapshots from a JSON file
    Load {
        path: Option<PathBuf>,
    },

    /// Drop and recreate the tables
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let (cfg, config_error) = match config::load_config() {
        Ok(cfg) => (cfg, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };
    init_logging(&cfg.logging);
    if let Some(e) = config_error {
        tracing::warn!("Config load failed ({}), using defaults", e);
    }

    match cli.command {
        Command::Bot { skip_load } => {
            let token = cfg.telegram.validated_token()?;
            let db = Database::open(&cfg.database.path)?;
            if !skip_load {
                import_if_present(&db, &cfg);
            }
            print_startup_info(&cfg, &db);

            let telegram = TelegramClient::new(
                &cfg.telegram.api_url,
                token,
                cfg.telegram.poll_timeout_secs,
            )?;
            bot::run(telegram, build_service(&cfg, db)?).await?;
        }

        Command::Ask { question, show_sql } => {
            let db = Database::open(&cfg.database.path)?;
            let service = build_service(&cfg, db)?;
            let (query, reply) = service.respond(&question).await;
            if show_sql {
                println!("SQL ({:?}): {}", query.origin, query.sql);
            }
            println!("{}", strip_html(&reply));
        }

        Command::Query => {
            let db = Database::open(&cfg.database.path)?;
            let service = build_service(&cfg, db)?;
            repl(&service).await;
        }

        Command::Load { path } => {
            let db = Database::open(&cfg.database.path)?;
            let path = path.unwrap_or_else(|| PathBuf::from(&cfg.loader.json_path));
            let report = db.load_json_file(&path, cfg.loader.batch_size)?;
            println!(
                "Imported {} videos, {} snapshots ({} duplicates, {} skipped, {} failed)",
                report.videos, report.snapshots, report.duplicates, report.skipped, report.failed
            );
        }

        Command::Reset => {
            let db = Database::open(&cfg.database.path)?;
            db.reset()?;
            println!("Tables dropped and recreated in {}", db.path().display());
        }
    }
    Ok(())
}

fn build_service(cfg: &AppConfig, db: Database) -> Result<LlmQuestionService<LlmClient>> {
    let client = LlmClient::from_config(&cfg.llm)?;
    Ok(bot::llm_service(client, QueryExecutor::new(db)))
}

/// Import the configured JSON feed when the file exists. Failures are logged;
/// the bot still starts on whatever the store already holds.
fn import_if_present(db: &Database, cfg: &AppConfig) {
    let path = Path::new(&cfg.loader.json_path);
    if !path.exists() {
        tracing::warn!("JSON feed not found at {}, starting with existing data", path.display());
        return;
    }
    match db.load_json_file(path, cfg.loader.batch_size) {
        Ok(report) => tracing::info!(?report, "JSON feed imported"),
        Err(e) => tracing::error!("JSON import failed: {:#}", e),
    }
}

async fn repl(service: &LlmQuestionService<LlmClient>) {
    println!();
    println!("╔════════════════════════════════════════════════════╗");
    println!("║   Video analytics — question prompt                ║");
    println!("╠════════════════════════════════════════════════════╣");
    println!("║  Задайте вопрос на русском языке.                  ║");
    println!("║  Введите 'exit' или Ctrl+C для выхода.             ║");
    println!("╚════════════════════════════════════════════════════╝");
    println!();

    loop {
        print!("❯ ");
        io::stdout().flush().ok();

        let mut input = String::new();
        match io::stdin().read_line(&mut input) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let question = input.trim();

        if question.is_empty() { continue; }
        if question.eq_ignore_ascii_case("exit")
            || question.eq_ignore_ascii_case("quit")
            || question == "q" { break; }

        let (query, reply) = service.respond(question).await;
        println!("SQL ({:?}): {}", query.origin, query.sql);
        println!("{}", strip_html(&reply));
        println!();
    }
}

fn strip_html(text: &str) -> String {
    ["<b>", "</b>", "<i>", "</i>"]
        .iter()
        .fold(text.to_string(), |acc, tag| acc.replace(tag, ""))
}

fn print_startup_info(cfg: &AppConfig, db: &Database) {
    let llm = cfg.llm.api_key.as_ref()
        .filter(|k| !k.is_empty())
        .map(|_| format!("{} @ {}", cfg.llm.model, cfg.llm.base_url))
        .unwrap_or_else(|| "none (rule-based fallback only)".into());
    let videos = db.count_videos().map(|n| n.to_string()).unwrap_or_else(|_| "?".into());

    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║            VIDEO ANALYTICS BOT                           ║");
    println!("╠══════════════════════════════════════════════════════════╣");
    println!("  Database:  {} ({} videos)", db.path().display(), videos);
    println!("  LLM:       {}", llm);
    println!("  Polling:   {}s long poll", cfg.telegram.poll_timeout_secs);
    println!("╚══════════════════════════════════════════════════════════╝");
}
