use std::io::{self, BufRead, Write};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use streambench_rs::{
    completions_url, parse_concurrency_levels, CancellationToken, HttpConnector, LevelReport,
    PayloadTemplate, Percentiles, ProcessTableDiscovery, ReportSink, RunReport, ServerCandidate,
    ServerDiscovery, Suite, SuiteConfig, SuiteError, Summary, DEFAULT_PROMPT,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "streambench",
    about = "Sweep concurrency levels against a streaming completions endpoint"
)]
struct Args {
    /// Concurrency level(s) to test (comma-separated)
    #[arg(short, long, default_value = "1,5,10,20")]
    concurrency: String,

    /// Number of runs per concurrency level
    #[arg(short, long, default_value_t = 3)]
    runs: usize,

    /// Model name to use; discovered from running servers when omitted
    #[arg(short, long)]
    model: Option<String>,

    /// Port the server listens on; discovered from running servers when omitted
    #[arg(short, long)]
    port: Option<u16>,

    /// Host the server listens on
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Completions endpoint path
    #[arg(long, default_value = "/v1/completions")]
    endpoint: String,

    /// Prompt to use for testing
    #[arg(long, default_value = DEFAULT_PROMPT)]
    prompt: String,

    /// Total timeout per request in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Run the suite repeatedly, asking before each new sweep
    #[arg(long)]
    continuous: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("streambench=info,streambench_rs=info")),
        )
        .init();

    let args = Args::parse();

    let concurrency_levels = parse_concurrency_levels(&args.concurrency)?;
    let server = resolve_server(&args, &ProcessTableDiscovery).await?;
    println!("Using model: {} on port {}", server.model, server.port);

    let endpoint = completions_url(&args.host, server.port, &args.endpoint)?;
    let config = SuiteConfig::try_new(
        endpoint,
        PayloadTemplate::new(server.model, args.prompt),
        concurrency_levels,
        args.runs,
    )?
    .with_request_timeout(args.timeout_secs.map(Duration::from_secs));

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, stopping");
                cancel.cancel();
            }
        });
    }

    let suite = Suite::new(config, HttpConnector);
    let mut sink = ConsoleSink;

    let result = if args.continuous {
        suite
            .run_continuous(&mut sink, &cancel, || ask_to_continue(&cancel))
            .await
            .map(|_| ())
    } else {
        suite.run(&mut sink, &cancel).await.map(|_| ())
    };

    match result {
        Ok(()) => {}
        Err(SuiteError::Cancelled { concurrency, .. }) => {
            println!("\nInterrupted during concurrency level {}", concurrency);
        }
        Err(SuiteError::Config(err)) => return Err(err),
    }

    if cancel.is_cancelled() {
        // A prompt abandoned on interrupt leaves a thread blocked on stdin, which
        // would hold up runtime shutdown.
        let _ = io::stdout().flush();
        std::process::exit(130);
    }
    Ok(())
}

async fn resolve_server<D: ServerDiscovery>(args: &Args, discovery: &D) -> Result<ServerCandidate> {
    if let (Some(model), Some(port)) = (&args.model, args.port) {
        return Ok(ServerCandidate {
            model: model.clone(),
            port,
        });
    }

    let mut servers = discovery.discover().await;
    match servers.len() {
        0 => Err(anyhow!(
            "No vLLM servers detected. Please specify --model and --port"
        )),
        1 => Ok(servers.remove(0)),
        count => {
            println!("Multiple servers detected:");
            for (idx, server) in servers.iter().enumerate() {
                println!("  {}) {} (port {})", idx + 1, server.model, server.port);
            }

            let choice = prompt_line(format!("Select server [1-{}]: ", count)).await?;
            let index = choice
                .trim()
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .filter(|&idx| idx < count)
                .ok_or_else(|| anyhow!("Invalid selection"))?;
            Ok(servers.swap_remove(index))
        }
    }
}

async fn ask_to_continue(cancel: &CancellationToken) -> bool {
    println!("\n{}", "=".repeat(60));
    let answer = tokio::select! {
        _ = cancel.cancelled() => {
            println!();
            return false;
        }
        answer = prompt_line("Run again? [y/N]: ".to_string()) => answer,
    };

    match answer {
        Ok(answer) => answer.trim().eq_ignore_ascii_case("y"),
        Err(err) => {
            warn!(error = %err, "failed to read answer");
            false
        }
    }
}

async fn prompt_line(prompt: String) -> Result<String> {
    tokio::task::spawn_blocking(move || {
        print!("{}", prompt);
        io::stdout().flush()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok::<_, io::Error>(line)
    })
    .await
    .context("stdin reader task failed")?
    .context("failed to read from stdin")
}

struct ConsoleSink;

impl ReportSink for ConsoleSink {
    fn level_started(&mut self, concurrency: usize) {
        let rule = "=".repeat(60);
        println!("\n{}", rule);
        println!("Concurrency Level: {}", concurrency);
        println!("{}", rule);
    }

    fn run_completed(&mut self, report: &RunReport) {
        println!("\n--- Run {}/{} ---", report.run, report.runs_per_level);
        println!(
            "Batch completed in {:.2}s",
            report.batch_elapsed.as_secs_f64()
        );
        print_summary(&report.summary, "  ");
    }

    fn level_completed(&mut self, report: &LevelReport) {
        if let Summary::NoData = report.summary {
            return;
        }
        println!("\n--- Aggregate Statistics (all {} runs) ---", report.runs);
        print_summary(&report.summary, "  ");
    }
}

fn print_summary(summary: &Summary, label: &str) {
    let Some(stats) = summary.stats() else {
        println!("{}No successful requests", label);
        return;
    };

    println!("{}Successful requests: {}", label, stats.successful_requests);
    println!(
        "{}TTFT  - {}",
        label,
        format_percentiles(&stats.time_to_first_chunk, 3, "s")
    );
    println!(
        "{}Total - {}",
        label,
        format_percentiles(&stats.total_duration, 3, "s")
    );
    println!(
        "{}TPS   - {}",
        label,
        format_percentiles(&stats.throughput, 1, "")
    );
}

fn format_percentiles(values: &Percentiles, precision: usize, unit: &str) -> String {
    format!(
        "p50: {:.prec$}{unit}, p95: {:.prec$}{unit}, min: {:.prec$}{unit}, max: {:.prec$}{unit}",
        values.p50,
        values.p95,
        values.min,
        values.max,
        prec = precision,
        unit = unit
    )
}
