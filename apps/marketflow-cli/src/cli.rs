use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use marketflow_analysis::{
    AnalysisEngine, AnalysisEngineConfig, HttpLlmClient, HttpLlmClientConfig,
};
use marketflow_catalog::OutputRecorder;
use marketflow_methods::{AnalysisToolbox, SampleMarketData, SampleNews};

use crate::config::{load_config, MarketflowConfig};

#[derive(Debug, Parser)]
#[command(name = "marketflow", about = "LLM-driven crypto market analysis")]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Answer a market question end to end
    Ask(AskArgs),
    /// Print the method catalog metadata the LLM sees
    Catalog,
}

#[derive(Debug, Args)]
struct AskArgs {
    #[arg(long, default_value = "config/marketflow.yaml")]
    config: PathBuf,
    #[arg(long)]
    verbose: bool,
    /// Show the generated workflow and collected data too
    #[arg(long)]
    explain: bool,
    #[arg(value_name = "QUESTION", required = true)]
    question: Vec<String>,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Ask(args) => ask(args).await,
            Command::Catalog => {
                let catalog = sample_toolbox().build_catalog();
                println!("{}", serde_json::to_string_pretty(&catalog.metadata())?);
                Ok(())
            }
        }
    }
}

async fn ask(args: AskArgs) -> anyhow::Result<()> {
    let config = load_config(&args.config)
        .with_context(|| format!("loading config from {}", args.config.display()))?;
    init_logging(&config, args.verbose);

    let question = args.question.join(" ");
    let engine = build_engine(&config)?;
    let outcome = engine.analyze(&question).await?;

    if args.explain {
        if let Some(workflow) = &outcome.workflow_json {
            println!("--- workflow ---\n{workflow}\n");
        }
        if !outcome.collected.is_empty() {
            println!("--- collected ---\n{}", outcome.collected);
        }
        println!("--- answer ---");
    }
    println!("{}", outcome.answer);
    Ok(())
}

fn build_engine(config: &MarketflowConfig) -> anyhow::Result<AnalysisEngine> {
    let api_key = env::var(&config.llm.api_key_env).ok();
    if api_key.is_none() {
        tracing::warn!(
            env = %config.llm.api_key_env,
            "no API key in the environment; requests will likely be rejected"
        );
    }
    let llm = HttpLlmClient::new(HttpLlmClientConfig {
        endpoint: config.llm.endpoint.clone(),
        api_key,
        timeout_secs: config.llm.timeout_secs,
    })?;

    let toolbox = sample_toolbox();
    let recorder = toolbox.recorder();
    let catalog = Arc::new(toolbox.build_catalog());

    Ok(AnalysisEngine::new(
        Arc::new(llm),
        catalog,
        recorder,
        AnalysisEngineConfig {
            model: config.llm.model.clone(),
            temperature: config.llm.temperature,
            interpretation_cap: Duration::from_secs(config.engine.interpretation_cap_secs),
            relevance_gate: config.engine.relevance_gate,
        },
    ))
}

fn sample_toolbox() -> AnalysisToolbox {
    AnalysisToolbox::new(
        Arc::new(SampleMarketData::new()),
        Arc::new(SampleNews),
        Arc::new(OutputRecorder::new()),
    )
}

fn init_logging(config: &MarketflowConfig, verbose: bool) {
    let default_level = if verbose {
        "debug"
    } else {
        config.observability.log_level.as_str()
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
