// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! eqs developer CLI.
//!
//! Runs query templates (JSON descriptors) against a world description, either
//! instantly or through the time-sliced scheduler, and prints the ranked items.

use std::cell::RefCell;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use eqs_core::{
    ActorHandle, ConfigService, ManagerConfig, QueryManager, QueryParams, QueryRequest,
    QueryResult, Registry, RunMode, SimpleWorld, SystemClock, TemplateDesc, World, WorldDesc,
};
use tracing_subscriber::EnvFilter;

mod config;
mod report;

use config::FsConfigStore;
use report::{catalog_table, RunReport};

#[derive(Parser, Debug)]
#[command(name = "eqs", version, about = "Environment query developer CLI")]
struct Cli {
    /// Config directory (defaults to the platform config dir)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Log filter, e.g. `warn` or `eqs_core=debug`
    #[arg(long, global = true, default_value = "warn")]
    log: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one template against a world
    Run(RunArgs),
    /// List the registered context, generator, and test kinds
    Kinds,
    /// Show or reset the manager config
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum ConfigAction {
    /// Print the effective config as JSON
    Show,
    /// Write the default config
    Reset,
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// World description (JSON)
    #[arg(long)]
    world: PathBuf,

    /// Template descriptor files (JSON); repeatable
    #[arg(long = "template", required = true)]
    templates: Vec<PathBuf>,

    /// Template to run; defaults to the first file's template
    #[arg(long)]
    query: Option<String>,

    /// Querier handle; defaults to the first actor tagged `querier`
    #[arg(long)]
    owner: Option<u64>,

    /// Result selection
    #[arg(long, value_enum, default_value_t = Mode::Single)]
    mode: Mode,

    /// Named parameter `name=value`; repeatable
    #[arg(long = "param", value_parser = parse_param)]
    params: Vec<(String, f32)>,

    /// Seed for random selection and random tests
    #[arg(long)]
    seed: Option<u64>,

    /// Run to completion without the scheduler
    #[arg(long)]
    instant: bool,

    /// Per-tick budget override in milliseconds
    #[arg(long)]
    budget_ms: Option<f64>,

    /// Give up after this many ticks
    #[arg(long, default_value_t = 10_000)]
    max_ticks: u32,

    /// Emit JSON instead of a table
    #[arg(long)]
    json: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Mode {
    Single,
    Random5,
    Random25,
    All,
}

impl From<Mode> for RunMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Single => Self::SingleResult,
            Mode::Random5 => Self::RandomBest5Pct,
            Mode::Random25 => Self::RandomBest25Pct,
            Mode::All => Self::AllMatching,
        }
    }
}

fn parse_param(raw: &str) -> Result<(String, f32), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got `{raw}`"))?;
    let value = value
        .trim()
        .parse::<f32>()
        .map_err(|err| format!("bad value for `{name}`: {err}"))?;
    Ok((name.trim().to_owned(), value))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&cli.log).context("invalid --log filter")?)
        .with_writer(std::io::stderr)
        .init();

    let store = match &cli.config_dir {
        Some(dir) => FsConfigStore::at(dir),
        None => FsConfigStore::new(),
    }
    .context("opening config store")?;
    let service = ConfigService::new(store);

    let mut out = std::io::stdout().lock();
    match cli.command {
        Command::Run(args) => run(&args, &service, &mut out),
        Command::Kinds => {
            let mut registry = Registry::with_builtins();
            writeln!(out, "{}", catalog_table(registry.catalog()))?;
            Ok(())
        }
        Command::Config { action } => config_command(action, &service, &mut out),
    }
}

fn config_command(
    action: ConfigAction,
    service: &ConfigService<FsConfigStore>,
    out: &mut impl Write,
) -> Result<()> {
    let config = match action {
        ConfigAction::Show => ManagerConfig::load_or_default(service)?,
        ConfigAction::Reset => {
            let config = ManagerConfig::default();
            service.save(ManagerConfig::CONFIG_KEY, &config)?;
            tracing::info!("config reset to defaults");
            config
        }
    };
    writeln!(out, "{}", serde_json::to_string_pretty(&config)?)?;
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn pick_owner(world: &SimpleWorld, owner: Option<u64>) -> Result<ActorHandle> {
    let owner = match owner {
        Some(handle) => ActorHandle(handle),
        None => world
            .actors_with_tag("querier")
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("no --owner given and no actor tagged `querier`"))?,
    };
    if !world.is_alive(owner) {
        bail!("owner {owner} is not in the world");
    }
    Ok(owner)
}

fn run(args: &RunArgs, service: &ConfigService<FsConfigStore>, out: &mut impl Write) -> Result<()> {
    let world_desc: WorldDesc = read_json(&args.world)?;
    let world = Arc::new(SimpleWorld::from_desc(&world_desc));
    let owner = pick_owner(&world, args.owner)?;

    let mut registry = Registry::with_builtins();
    let mut first = None;
    for path in &args.templates {
        let desc: TemplateDesc = read_json(path)?;
        first.get_or_insert_with(|| desc.name.clone());
        registry.add_template(desc);
    }
    let name = args
        .query
        .clone()
        .or(first)
        .ok_or_else(|| anyhow!("no template given"))?;

    let mut config = ManagerConfig::load_or_default(service)?;
    if let Some(ms) = args.budget_ms {
        if !ms.is_finite() || ms < 0.0 {
            bail!("--budget-ms must be a non-negative number");
        }
        config.max_allowed_testing_time = Duration::from_secs_f64(ms / 1000.0);
    }
    let mut manager = QueryManager::new(config, world.clone(), Arc::new(SystemClock::new()));
    registry.install(&mut manager)?;
    if manager.template(&name).is_none() {
        bail!("template `{name}` not found in the given files");
    }

    let mut params = QueryParams::new();
    for (key, value) in &args.params {
        params.set(key.clone(), *value);
    }
    let mut request = QueryRequest::new(name.clone(), owner)
        .with_run_mode(args.mode.into())
        .with_params(params);
    if let Some(seed) = args.seed {
        request = request.with_seed(seed);
    }

    let (result, ticks, steps) = if args.instant {
        let result = manager
            .run_instant_query(request)
            .ok_or_else(|| anyhow!("query was rejected"))?;
        (result, 0, 0)
    } else {
        scheduled(&mut manager, request, args.max_ticks)?
    };

    let report = RunReport::new(&name, &result, world.as_ref(), ticks, steps);
    if args.json {
        writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
    } else {
        writeln!(out, "{}", report.summary())?;
        writeln!(out, "{}", report.table())?;
    }
    Ok(())
}

fn scheduled(
    manager: &mut QueryManager,
    request: QueryRequest,
    max_ticks: u32,
) -> Result<(QueryResult, u32, u32)> {
    let slot: Rc<RefCell<Option<QueryResult>>> = Rc::default();
    let sink = Rc::clone(&slot);
    manager
        .run_query(request, move |result| {
            *sink.borrow_mut() = Some(result.clone());
        })
        .ok_or_else(|| anyhow!("query was rejected"))?;

    let frame = Duration::from_millis(16);
    let mut steps = 0;
    for tick in 1..=max_ticks {
        steps += manager.tick(frame).steps;
        if let Some(result) = slot.borrow_mut().take() {
            tracing::debug!(tick, steps, "query delivered");
            return Ok((result, tick, steps));
        }
    }
    bail!("query did not finish within {max_ticks} ticks")
}
