use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

const SERVER_ENTRYPOINT: &str = "vllm.entrypoints.openai.api_server";
const DEFAULT_MODEL: &str = "unknown";
const DEFAULT_PORT: u16 = 8000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerCandidate {
    pub model: String,
    pub port: u16,
}

/// Source of completion servers the benchmark could target.
#[async_trait]
pub trait ServerDiscovery: Send + Sync {
    async fn discover(&self) -> Vec<ServerCandidate>;
}

/// Finds OpenAI-compatible vLLM servers in the local process table.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessTableDiscovery;

#[async_trait]
impl ServerDiscovery for ProcessTableDiscovery {
    async fn discover(&self) -> Vec<ServerCandidate> {
        let output = match Command::new("ps").args(["-ewwo", "pid,args"]).output().await {
            Ok(output) => output,
            Err(err) => {
                warn!(error = %err, "failed to list processes");
                return Vec::new();
            }
        };

        let table = String::from_utf8_lossy(&output.stdout);
        let candidates = parse_process_table(&table);
        debug!(found = candidates.len(), "server discovery finished");
        candidates
    }
}

/// Extracts server candidates from `ps` output, one process per line.
pub fn parse_process_table(table: &str) -> Vec<ServerCandidate> {
    table
        .lines()
        .filter(|line| line.contains(SERVER_ENTRYPOINT) && !line.contains("grep"))
        .map(|line| {
            let args: Vec<&str> = line.split_whitespace().collect();
            let model = flag_value(&args, "--model")
                .filter(|model| !model.is_empty())
                .unwrap_or(DEFAULT_MODEL);
            let port = flag_value(&args, "--port")
                .and_then(leading_port)
                .or_else(|| glued_value(&args, "--port").and_then(leading_port))
                .unwrap_or(DEFAULT_PORT);

            ServerCandidate {
                model: model.to_string(),
                port,
            }
        })
        .collect()
}

/// Value of `flag` given either as `flag=value` or as `flag value`.
fn flag_value<'a>(args: &[&'a str], flag: &str) -> Option<&'a str> {
    args.iter().enumerate().find_map(|(idx, arg)| {
        let rest = arg.strip_prefix(flag)?;
        if rest.is_empty() {
            args.get(idx + 1).copied()
        } else {
            rest.strip_prefix('=')
        }
    })
}

/// Digits written directly after `flag`, as in `--port7011`.
fn glued_value<'a>(args: &[&'a str], flag: &str) -> Option<&'a str> {
    args.iter().find_map(|arg| {
        arg.strip_prefix(flag)
            .filter(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
    })
}

fn leading_port(value: &str) -> Option<u16> {
    let end = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    value[..end].parse().ok()
}
