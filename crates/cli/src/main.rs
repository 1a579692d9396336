use clap::{Parser, Subcommand};
use lib::envelope::Envelope;
use lib::gateway::ChatRequest;

#[derive(Parser)]
#[command(name = "mailchat")]
#[command(about = "Mailchat CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Run the gateway (HTTP chat and email API).
    Serve {
        /// Config file path (default: MAILCHAT_CONFIG_PATH or ~/.mailchat/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP port (default from config or 8000)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Parse a message offline and print the recognized command as JSON.
    Parse {
        /// Message text; multiple words are joined with spaces.
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Chat with a running gateway (interactive). Email commands are executed by the gateway.
    Chat {
        /// Config file path (default: MAILCHAT_CONFIG_PATH or ~/.mailchat/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Chat provider for plain messages ("openai" or "gemini").
        #[arg(long, value_name = "NAME")]
        provider: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("mailchat {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Serve { config, port }) => {
            if let Err(e) = run_serve(config, port).await {
                log::error!("gateway failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Parse { text }) => {
            if let Err(e) = run_parse(&text.join(" ")) {
                log::error!("parse failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Chat { config, provider }) => {
            if let Err(e) = run_chat(config, provider).await {
                log::error!("chat failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

async fn run_serve(config_path: Option<std::path::PathBuf>, port: Option<u16>) -> anyhow::Result<()> {
    let (mut config, path) = lib::config::load_config(config_path)?;
    if let Some(p) = port {
        config.gateway.port = p;
    }
    log::info!(
        "starting gateway on {}:{} (config {})",
        config.gateway.bind,
        config.gateway.port,
        path.display()
    );
    lib::gateway::run_gateway(config).await
}

fn run_parse(text: &str) -> anyhow::Result<()> {
    let command = lib::command::parse(text);
    println!("{}", serde_json::to_string_pretty(&command)?);
    Ok(())
}

async fn run_chat(config_path: Option<std::path::PathBuf>, provider: Option<String>) -> anyhow::Result<()> {
    use std::io::{self, Write};

    let (config, _) = lib::config::load_config(config_path)?;
    let url = format!(
        "http://{}:{}/api/chat",
        lib::config::client_host(&config.gateway.bind),
        config.gateway.port
    );
    let client = reqwest::Client::new();
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("/exit") || input.eq_ignore_ascii_case("/quit") {
            break;
        }

        let request = ChatRequest {
            message: input.to_string(),
            provider: provider.clone(),
        };
        match send_chat(&client, &url, &request).await {
            Ok(envelope) => print_envelope(&envelope),
            Err(e) => eprintln!("chat error: {}", e),
        }
    }

    Ok(())
}

async fn send_chat(client: &reqwest::Client, url: &str, request: &ChatRequest) -> anyhow::Result<Envelope> {
    let res = client.post(url).json(request).send().await?;
    let status = res.status();
    let body = res.text().await?;
    serde_json::from_str(&body).map_err(|_| anyhow::anyhow!("{} {}", status, body))
}

fn print_envelope(envelope: &Envelope) {
    if let Some(reply) = &envelope.reply {
        println!("< {}", reply.trim());
        return;
    }
    if envelope.is_error() || envelope.detail.is_some() {
        let detail = envelope.detail.as_deref().unwrap_or("request failed");
        match &envelope.error {
            Some(kind) => println!("! {}: {}", kind, detail),
            None => println!("! {}", detail),
        }
        return;
    }
    if let Some(emails) = &envelope.emails {
        if let Some(warning) = &envelope.warning {
            println!("! {}", warning);
        }
        if emails.is_empty() {
            println!("< no emails");
        }
        for email in emails {
            println!("< [{}] {} | {}", email.id, email.from, email.subject);
        }
        return;
    }
    match (&envelope.status, &envelope.message_id) {
        (Some(status), Some(id)) => println!("< {} ({})", status, id),
        (Some(status), None) => println!("< {}", status),
        _ => println!("< (empty response)"),
    }
}
