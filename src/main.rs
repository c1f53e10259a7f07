use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use post_insights::api::{ApiPredictResponse, ApiStatsResponse};
use post_insights::config::InsightsConfig;
use post_insights::server::{self, AppState};
use post_insights::{format_count, weekday_name, JsonFileSource, PostSource};

#[derive(Parser)]
#[command(name = "post-insights", about = "Posting-time analytics and like prediction")]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print analytics for the post history
    Stats(StatsArgs),
    /// Estimate likes for a post at the given hour and weekday
    Predict(PredictArgs),
    /// Run the HTTP service
    Serve(ServeArgs),
    /// Write the default configuration file
    InitConfig(InitConfigArgs),
}

#[derive(Args, Debug, Clone)]
struct StatsArgs {
    #[arg(long)]
    data: Option<PathBuf>,
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug, Clone)]
struct PredictArgs {
    #[arg(long, allow_negative_numbers = true)]
    hour: i64,
    #[arg(long)]
    day: String,
    #[arg(long)]
    data: Option<PathBuf>,
    #[arg(long)]
    explain: bool,
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug, Clone)]
struct ServeArgs {
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    port: Option<u16>,
    #[arg(long)]
    data: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
struct InitConfigArgs {
    #[arg(long, default_value = "config/insights.toml")]
    path: PathBuf,
    #[arg(long)]
    force: bool,
}

#[tokio::main]
async fn main() {
    load_dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli).await {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    if let Command::InitConfig(args) = &cli.command {
        return run_init_config(args);
    }

    let (mut config, _) = InsightsConfig::load(cli.config).map_err(|err| err.to_string())?;
    match cli.command {
        Command::Stats(args) => {
            apply_data_override(&mut config, args.data.as_deref());
            run_stats(&config, args.json).await
        }
        Command::Predict(args) => {
            apply_data_override(&mut config, args.data.as_deref());
            run_predict(&config, &args).await
        }
        Command::Serve(args) => {
            apply_data_override(&mut config, args.data.as_deref());
            if let Some(host) = args.host {
                config.server.host = host;
            }
            if let Some(port) = args.port {
                config.server.port = port;
            }
            let state = AppState::from_config(&config).map_err(|err| err.to_string())?;
            server::serve(state, &config.server.host, config.server.port)
                .await
                .map_err(|err| err.to_string())
        }
        Command::InitConfig(_) => Ok(()),
    }
}

async fn run_stats(config: &InsightsConfig, json: bool) -> Result<(), String> {
    let records = JsonFileSource::new(&config.data.path)
        .load()
        .await
        .map_err(|err| err.to_string())?;
    let aggregator = config.analytics.aggregator().map_err(|err| err.to_string())?;
    let result = aggregator.aggregate(&records).map_err(|err| err.to_string())?;

    if json {
        let response = ApiStatsResponse::from_result(result);
        let payload = serde_json::to_string_pretty(&response)
            .map_err(|err| format!("failed to serialize stats: {}", err))?;
        println!("{}", payload);
        return Ok(());
    }

    println!("Stats:");
    for entry in &result.stats {
        println!("  {}: {}", entry.name, entry.display_value());
    }

    match result.best_hour {
        Some(hour) => println!("Best hour: {}:00", hour),
        None => println!("Best hour: N/A"),
    }
    println!("Best day: {}", result.best_day.map(weekday_name).unwrap_or("N/A"));
    match &result.top_post {
        Some(post) => println!(
            "Top post: {} ({} likes, {})",
            post.id,
            format_count(post.likes()),
            post.timestamp.to_rfc3339()
        ),
        None => println!("Top post: N/A"),
    }

    if !result.engagement_trend.is_empty() {
        println!("\nEngagement trend:");
        for point in &result.engagement_trend {
            println!(
                "  {}: {} likes",
                point.timestamp.to_rfc3339(),
                format_count(point.likes_count)
            );
        }
    }

    Ok(())
}

async fn run_predict(config: &InsightsConfig, args: &PredictArgs) -> Result<(), String> {
    let records = JsonFileSource::new(&config.data.path)
        .load()
        .await
        .map_err(|err| err.to_string())?;
    let predictor = config.analytics.predictor().map_err(|err| err.to_string())?;
    let model = predictor.fit(&records).map_err(|err| err.to_string())?;
    let prediction = model
        .explain(args.hour, &args.day)
        .map_err(|err| err.to_string())?;

    if args.json {
        let response = ApiPredictResponse::from_prediction(prediction, args.explain);
        let payload = serde_json::to_string_pretty(&response)
            .map_err(|err| format!("failed to serialize prediction: {}", err))?;
        println!("{}", payload);
        return Ok(());
    }

    println!("Predicted likes: {}", format_count(prediction.likes));
    if args.explain {
        println!(
            "Based on: {} ({} posts, mean {:.2})",
            prediction.level.label(),
            prediction.support,
            prediction.mean
        );
    }
    Ok(())
}

fn run_init_config(args: &InitConfigArgs) -> Result<(), String> {
    if args.path.exists() && !args.force {
        return Err(format!(
            "{} already exists; pass --force to overwrite",
            args.path.display()
        ));
    }
    InsightsConfig::default()
        .write(&args.path)
        .map_err(|err| err.to_string())?;
    println!("Wrote {}", args.path.display());
    Ok(())
}

fn apply_data_override(config: &mut InsightsConfig, data: Option<&Path>) {
    if let Some(path) = data {
        config.data.path = path.display().to_string();
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_dotenv() {
    let _ = dotenvy::dotenv();
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    let manifest_path = Path::new(manifest_dir).join(".env");
    let _ = dotenvy::from_path(manifest_path);
}
