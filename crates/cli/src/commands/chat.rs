//! `toolwright chat`: Single-message or interactive chat with one agent.

use std::io::Write;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::StreamExt;
use toolwright_agent::{AgentEngine, AgentEvent, EngineResult, Invocation};
use toolwright_config::{AgentCatalog, AppConfig};
use toolwright_core::Message;
use uuid::Uuid;

pub struct ChatArgs {
    pub agent: String,
    pub message: Option<String>,
    pub stream: bool,
    pub max_iterations: Option<u32>,
    pub user: Option<Uuid>,
    pub json: bool,
}

pub async fn run(args: ChatArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set TOOLWRIGHT_API_KEY or OPENAI_API_KEY, or add api_key under");
        eprintln!("  [provider] in {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let catalog = AgentCatalog::load_dir(config.resolved_agents_dir())?;
    let provider = super::build_provider(&config);
    let registry = super::build_registry(&config, provider.clone());
    let engine = Arc::new(
        AgentEngine::load(&args.agent, &catalog, &registry, provider, config.provider.model.clone())?
            .with_engine_config(&config.engine),
    );

    let mut invocation = Invocation::new();
    if let Some(user) = args.user {
        invocation = invocation.with_user(user);
    }
    if let Some(index) = super::build_chunk_index(&config).await? {
        invocation = invocation.with_chunk_index(index);
    }
    if let Some(max) = args.max_iterations {
        invocation = invocation.with_max_iterations(max);
    }

    if let Some(message) = args.message.clone() {
        let transcript = vec![Message::user(message)];
        turn(&engine, transcript, &invocation, &args).await?;
        return Ok(());
    }

    let profile = engine.profile();
    println!();
    println!("  {} — {}", profile.name, profile.description.as_deref().unwrap_or("interactive chat"));
    println!("  Model:  {}", config.provider.model);
    println!("  Tools:  {}", engine.tools().names().join(", "));
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    let mut history: Vec<Message> = Vec::new();
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

        history.push(Message::user(line));
        match turn(&engine, history.clone(), &invocation, &args).await {
            Ok(answer) => history.push(Message::assistant(answer)),
            Err(e) => {
                history.pop();
                eprintln!("  [Error] {e}");
            }
        }
        println!();
    }

    Ok(())
}

/// Run one invocation and print it. Returns the visible answer.
async fn turn(
    engine: &Arc<AgentEngine>,
    transcript: Vec<Message>,
    invocation: &Invocation,
    args: &ChatArgs,
) -> Result<String, Box<dyn std::error::Error>> {
    if args.stream {
        return stream_turn(engine, transcript, invocation, args.json).await;
    }

    let result = engine.process(transcript, invocation).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }
    Ok(result.content)
}

fn print_result(result: &EngineResult) {
    if let Some(thinking) = &result.thinking {
        for line in thinking.lines() {
            eprintln!("  [{line}]");
        }
    }
    println!("{}", result.content);
    if !result.sources.is_empty() {
        println!("\n  Sources: {}", result.sources.len());
        for source in &result.sources {
            let document = source.get("document_id").and_then(|v| v.as_str()).unwrap_or("?");
            println!("    - {document}");
        }
    }
    if let Some(usage) = &result.usage {
        eprintln!(
            "  [{} tokens: {} prompt, {} completion]",
            usage.total_tokens, usage.prompt_tokens, usage.completion_tokens
        );
    }
}

async fn stream_turn(
    engine: &Arc<AgentEngine>,
    transcript: Vec<Message>,
    invocation: &Invocation,
    json: bool,
) -> Result<String, Box<dyn std::error::Error>> {
    let mut events = engine.process_stream(transcript, invocation.clone());
    let mut answer = String::new();

    while let Some(event) = events.next().await {
        if json {
            println!("{}", serde_json::to_string(&event)?);
        }
        match event {
            AgentEvent::Thinking { content } if !json => eprintln!("  [{content}]"),
            AgentEvent::ToolCall { name, params } if !json => {
                eprintln!("  → {name} {}", serde_json::Value::Object(params));
            }
            AgentEvent::ToolResult { name, result } if !json => match &result.error {
                Some(error) => eprintln!("  ✗ {name}: {error}"),
                None => eprintln!("  ✓ {name}"),
            },
            AgentEvent::Content { content, .. } => {
                if !json {
                    print!("{content}");
                    std::io::stdout().flush()?;
                }
                answer.push_str(&content);
            }
            AgentEvent::Done { sources, .. } => {
                if !json {
                    println!();
                    if !sources.is_empty() {
                        println!("\n  Sources: {}", sources.len());
                    }
                }
            }
            AgentEvent::Error { message } => return Err(message.into()),
            _ => {}
        }
    }
    Ok(answer)
}
