use async_trait::async_trait;
use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

mod cli;
mod config;

use arcane::actions::{
    ActionDispatcher, AgentDirectory, ReplyChannel, register_core_actions, register_messaging,
};
use arcane::agent::{Agent, CycleState, GoalLoop, Reply};
use arcane::domain::InboundMessage;
use arcane::executor::{Delegation, GoalLoopWorkerFactory, PlanExecutor, register_delegation};
use arcane::llm::{AnthropicGenerator, TextGenerator};
use arcane::plan::{Plan, PlanSynthesizer, Status};
use arcane::prompt::Prompts;
use arcane::storage::{JsonPlanStore, PlanStore};
use cli::Cli;
use cli::commands::{Commands, PlanCommands};
use config::Config;

fn setup_logging() -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("arcane")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("arcane.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

/// Prints agent replies to the terminal
struct ConsoleChannel {
    agent: String,
}

#[async_trait]
impl ReplyChannel for ConsoleChannel {
    async fn send(&self, message: &str) -> arcane::Result<()> {
        println!("{} {}", format!("[{}]", self.agent).cyan().bold(), message);
        Ok(())
    }
}

/// Shared services built from the configuration
struct Services {
    generator: Arc<dyn TextGenerator>,
    prompts: Arc<Prompts>,
    store: Arc<dyn PlanStore>,
    executor: Arc<PlanExecutor>,
}

impl Services {
    fn build(config: &Config) -> Result<Self> {
        let generator: Arc<dyn TextGenerator> =
            Arc::new(AnthropicGenerator::new(config.anthropic()).context("Failed to create text generator")?);
        let prompts = Arc::new(config.prompts()?);
        let store = open_store(config)?;

        let worker_dispatcher = Arc::new(register_core_actions(ActionDispatcher::builder()).build());
        let workers = Arc::new(GoalLoopWorkerFactory::new(
            generator.clone(),
            worker_dispatcher,
            prompts.clone(),
            config.worker_goal_loop(),
        ));
        let executor = Arc::new(PlanExecutor::new(store.clone(), workers));

        Ok(Self {
            generator,
            prompts,
            store,
            executor,
        })
    }

    fn delegation(&self, config: &Config) -> Arc<Delegation> {
        let synthesizer = Arc::new(PlanSynthesizer::new(
            self.generator.clone(),
            self.prompts.clone(),
            config.generation_timeout(),
        ));
        Arc::new(Delegation::new(
            synthesizer,
            self.store.clone(),
            self.executor.clone(),
            config.storage.workspace_root.clone(),
        ))
    }
}

fn open_store(config: &Config) -> Result<Arc<dyn PlanStore>> {
    let store = JsonPlanStore::new(config.plans_dir())
        .context(format!("Failed to open plan store at {}", config.plans_dir().display()))?;
    Ok(Arc::new(store))
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Chat { message, sender } => handle_chat_command(message, sender, config).await,
        Commands::Delegate { description, name } => {
            handle_delegate_command(description, name.as_deref(), config).await
        }
        Commands::Plans { command } => match command {
            PlanCommands::List => handle_plans_list(config).await,
            PlanCommands::Show { id, detailed } => handle_plans_show(id, *detailed, config).await,
            PlanCommands::Resume { id } => handle_plans_resume(id, config).await,
        },
    }
}

async fn handle_chat_command(message: &str, sender: &str, config: &Config) -> Result<()> {
    info!("Chat message from {}: {}", sender, message);
    let services = Services::build(config)?;

    let dispatcher = register_core_actions(ActionDispatcher::builder());
    let dispatcher = register_messaging(
        dispatcher,
        Arc::new(AgentDirectory::new(config.agents.clone())),
        reqwest::Client::new(),
    );
    let dispatcher = Arc::new(register_delegation(dispatcher, services.delegation(config)).build());

    let profile = config.profile();
    let work_directory = config.storage.workspace_root.join(&profile.name);
    fs::create_dir_all(&work_directory).context("Failed to create agent work directory")?;

    let goal_loop = GoalLoop::new(
        services.generator.clone(),
        dispatcher,
        services.prompts.clone(),
        config.goal_loop(),
        profile.clone(),
    );
    let agent = Agent::with_log(profile.name.clone(), work_directory, goal_loop, config.event_log());
    let channel = Arc::new(ConsoleChannel { agent: profile.name });

    match agent.handle(InboundMessage::user(sender, message), channel).await {
        Reply::Busy(status) => println!("{}", status.yellow()),
        Reply::Processed(outcome) => {
            println!("{} {}", "Goal:".green(), outcome.goal);
            let state = match outcome.state {
                CycleState::Done if outcome.max_reached => "max iterations reached".yellow(),
                CycleState::Done => "done".green(),
                _ => "aborted".red(),
            };
            println!(
                "{} {} after {} iteration(s), {} action(s)",
                "Cycle:".green(),
                state,
                outcome.iterations,
                outcome.executed_actions.len()
            );
        }
    }
    Ok(())
}

async fn handle_delegate_command(description: &str, name: Option<&str>, config: &Config) -> Result<()> {
    info!("Delegating task: {}", description);
    println!("{} {}", "Delegating:".green(), description);

    let services = Services::build(config)?;
    let name = name.unwrap_or(arcane::executor::DEFAULT_PLAN_NAME);
    let summary = services
        .delegation(config)
        .run(name, description)
        .await
        .context("Delegation failed")?;

    println!("{}", summary);
    Ok(())
}

fn colored_status(status: Status) -> ColoredString {
    match status {
        Status::Completed => status.as_str().green(),
        Status::Failed => status.as_str().red(),
        Status::InProgress => status.as_str().yellow(),
        Status::Pending => status.as_str().normal(),
    }
}

async fn handle_plans_list(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let plans = store.list().await.context("Failed to list plans")?;

    if plans.is_empty() {
        println!("{}", "No plans found".yellow());
        return Ok(());
    }

    for plan in plans {
        println!(
            "{}  {:<12}  {}  ({} levels, {} tasks)",
            plan.id.cyan(),
            colored_status(plan.status),
            plan.name,
            plan.levels.len(),
            plan.task_count()
        );
    }
    Ok(())
}

fn print_plan(plan: &Plan, detailed: bool) {
    println!("{} {}", "Plan:".green(), plan.name);
    println!("  {} {}", "ID:".bold(), plan.id);
    println!("  {} {}", "Status:".bold(), colored_status(plan.status));
    println!("  {} {}", "Work directory:".bold(), plan.work_directory.display());
    println!("  {} {}", "Description:".bold(), plan.description);

    for level in &plan.levels {
        println!("  Level {} [{}]", level.order, colored_status(level.status));
        for task in &level.tasks {
            println!("    - {} [{}]", task.name, colored_status(task.status));
            if detailed && let Some(output) = &task.output_message {
                for line in output.lines() {
                    println!("        {}", line.dimmed());
                }
            }
        }
    }
}

async fn handle_plans_show(id: &str, detailed: bool, config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let plan = store.load(id).await.context(format!("Failed to load plan {}", id))?;
    print_plan(&plan, detailed);
    Ok(())
}

async fn handle_plans_resume(id: &str, config: &Config) -> Result<()> {
    info!("Resuming plan: {}", id);
    let services = Services::build(config)?;
    let mut plan = services
        .store
        .load(id)
        .await
        .context(format!("Failed to load plan {}", id))?;

    if plan.status == Status::Completed {
        println!("{} plan {} is already completed", "Nothing to do:".yellow(), id);
        return Ok(());
    }

    println!("{} {}", "Resuming:".green(), plan.name);
    let narrative = services.executor.execute_plan(&mut plan).await;
    println!("{}", narrative);
    print_plan(&plan, false);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!("Starting with config from: {:?}", cli.config);

    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}
