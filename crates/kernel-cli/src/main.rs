use std::env;
use std::net::SocketAddr;
use std::process::ExitCode;

use contracts::RunConfig;
use kernel_api::{serve, AppState, EngineApi};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "kernel_core=info,kernel_api=info";

fn print_usage() {
    println!("kernel-cli <command>");
    println!("commands:");
    println!("  status");
    println!("  step [n]");
    println!("  run-to <turn>");
    println!("  simulate <seed> [turns] [config.json]");
    println!("    runs a deterministic simulation and prints the turn log");
    println!("  serve [addr]");
    println!("    default addr: 127.0.0.1:8080");
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_u64(value: Option<&String>, label: &str) -> Result<u64, String> {
    let raw = value.ok_or_else(|| format!("missing {label}"))?;
    raw.parse::<u64>()
        .map_err(|_| format!("invalid {label}: {raw}"))
}

fn parse_socket_addr(value: Option<&String>) -> Result<SocketAddr, String> {
    let raw = value.map(String::as_str).unwrap_or("127.0.0.1:8080");
    raw.parse::<SocketAddr>()
        .map_err(|_| format!("invalid addr: {raw}"))
}

fn engine(config: RunConfig) -> Result<EngineApi, String> {
    EngineApi::from_config(config).map_err(|err| format!("invalid config: {err}"))
}

fn run_simulation(args: &[String]) -> Result<(), String> {
    let seed = parse_u64(args.get(2), "seed")?;
    let turns = args
        .get(3)
        .map(|value| {
            value
                .parse::<u64>()
                .map_err(|_| format!("invalid turns: {value}"))
        })
        .transpose()?;
    let mut config = match args.get(4) {
        Some(path) => RunConfig::from_json_file(path).map_err(|err| err.to_string())?,
        None => RunConfig::default(),
    };
    config.seed = seed;
    if let Some(turns) = turns {
        config.max_turns = turns;
    }

    let mut api = engine(config)?;
    let max_turns = api.config().max_turns;
    let (status, committed) = api
        .run_to_turn(max_turns)
        .map_err(|err| format!("governance halted: {err}"))?;

    for record in api.turns() {
        println!(
            "turn={} success={} pool={} living={} taxes={} president={} speaker={} judge={} {}",
            record.turn,
            record.success,
            record.common_pool,
            record.living_clients,
            record.taxes_collected,
            record.roles.president,
            record.roles.speaker,
            record.roles.judge,
            record.description
        );
    }
    println!("simulated seed={seed} committed={committed} {status}");
    Ok(())
}

async fn run(args: &[String]) -> Result<(), String> {
    match args.get(1).map(String::as_str) {
        Some("status") => {
            let api = engine(RunConfig::default())?;
            println!("{}", api.status());
        }
        Some("step") => {
            let steps = args.get(2).and_then(|v| v.parse::<u64>().ok()).unwrap_or(1);
            let mut api = engine(RunConfig::default())?;
            let (status, committed) = api
                .step(steps)
                .map_err(|err| format!("governance halted: {err}"))?;
            println!("stepped={committed} {status}");
        }
        Some("run-to") => {
            let target_turn = parse_u64(args.get(2), "turn")?;
            let mut api = engine(RunConfig::default())?;
            let (status, committed) = api
                .run_to_turn(target_turn)
                .map_err(|err| format!("governance halted: {err}"))?;
            println!("committed={committed} {status}");
        }
        Some("simulate") => run_simulation(args)?,
        Some("serve") => {
            let addr = parse_socket_addr(args.get(2))?;
            let state = AppState::with_engine(engine(RunConfig::default())?);
            println!("serving api on http://{addr}");
            serve(addr, state)
                .await
                .map_err(|err| format!("server error: {err}"))?;
        }
        _ => print_usage(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let args: Vec<String> = env::args().collect();

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
