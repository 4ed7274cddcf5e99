use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use peerscout_core::TargetInput;
use peerscout_local::governor::{CallGovernor, GovernorConfig};
use peerscout_local::{output, Pipeline, PipelineConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "peerscout")]
#[command(about = "Find comparable public companies for a target business", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the full pipeline for one target and write the comparable table.
    Find(FindCmd),
    /// Diagnose configuration issues (json; no secrets).
    Doctor,
    /// Print version info.
    Version,
}

#[derive(clap::Args, Debug)]
struct FindCmd {
    /// Target as a JSON file with name/business_description/url/primary_industry.
    #[arg(long, conflicts_with_all = ["name", "business_description"])]
    json: Option<PathBuf>,

    /// Target company name (with --business-description, instead of --json).
    #[arg(long, requires = "business_description")]
    name: Option<String>,
    /// Target business description.
    #[arg(long, requires = "name")]
    business_description: Option<String>,
    /// Target company website.
    #[arg(long)]
    url: Option<String>,
    /// Primary industry hint (free text).
    #[arg(long)]
    primary_industry: Option<String>,

    /// Output path; .json writes a JSON array, anything else CSV.
    /// A sibling <out>.provenance.jsonl is always written.
    #[arg(long)]
    out: PathBuf,

    /// Chat model id (or set PEERSCOUT_OPENAI_COMPAT_MODEL).
    #[arg(long, env = "PEERSCOUT_OPENAI_COMPAT_MODEL")]
    model: Option<String>,

    /// How many discovered candidates to evaluate.
    #[arg(long, default_value_t = 40)]
    max_candidates: usize,
    /// Minimum validation score for the checks-based admission tier.
    #[arg(long, default_value_t = 0.35)]
    min_score: f64,
    /// Maximum rows in the final table.
    #[arg(long, default_value_t = 10)]
    max_final: usize,

    /// Verbose logging (overrides RUST_LOG).
    #[arg(long, action = clap::ArgAction::SetTrue)]
    debug: bool,
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        tracing_subscriber::EnvFilter::new("peerscout=debug,peerscout_local=debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn,peerscout_local=info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_target(cmd: &FindCmd) -> Result<TargetInput> {
    if let Some(path) = &cmd.json {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        return serde_json::from_str(&raw)
            .with_context(|| format!("parsing {}", path.display()));
    }
    match (&cmd.name, &cmd.business_description) {
        (Some(name), Some(description)) => Ok(TargetInput {
            name: name.clone(),
            business_description: description.clone(),
            url: cmd.url.clone(),
            primary_industry: cmd.primary_industry.clone(),
        }),
        _ => anyhow::bail!("provide either --json or both --name and --business-description"),
    }
}

fn provenance_path(out: &Path) -> PathBuf {
    let stem = out
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("peerscout");
    out.with_file_name(format!("{stem}.provenance.jsonl"))
}

const QUOTA_GUIDANCE: &str = "\
The model provider reported an exhausted quota. Partial results (if any) were
written. To continue:
  - check your provider billing/usage dashboard
  - wait for the quota window to reset, or switch PEERSCOUT_OPENAI_COMPAT_MODEL
    to a model with remaining quota
  - re-run; already-written output files are safe to overwrite";

const EMPTY_GUIDANCE: &str = "\
No comparables were admitted. This usually means:
  - the business description is too thin; add concrete products and customers
  - the curated discovery catalog has no coverage for this niche
  - --min-score is too strict for a sparsely documented target";

/// Quota can run out before any candidate is processed (during target
/// normalization). That still deserves the output files and the billing
/// guidance, not a bare error, so fold it into an empty report.
fn report_or_quota(
    result: peerscout_core::Result<peerscout_local::PipelineReport>,
) -> Result<peerscout_local::PipelineReport> {
    match result {
        Ok(report) => Ok(report),
        Err(peerscout_core::Error::QuotaExhausted(msg)) => {
            eprintln!("quota exhausted before any candidate was evaluated: {msg}");
            Ok(peerscout_local::PipelineReport {
                comparables: Vec::new(),
                quota_exhausted: true,
                interrupted: false,
                skipped: 0,
            })
        }
        Err(e) => Err(e.into()),
    }
}

async fn run_find(cmd: FindCmd) -> Result<()> {
    let target = load_target(&cmd)?;

    let client = peerscout_local::shared_http_client()?;
    let llm = peerscout_local::llm::LlmServices::new(
        peerscout_local::llm::OpenAiCompatClient::from_env(client.clone(), cmd.model.clone()),
    );
    let services = Arc::new(llm);

    let pipeline = Pipeline::new(
        services.clone(),
        Arc::new(peerscout_local::discover::CuratedDiscovery),
        Arc::new(peerscout_local::fetch::WebSnippetFetcher::new(client)),
        services.clone(),
        services,
        CallGovernor::new(GovernorConfig::from_env()),
        PipelineConfig {
            max_candidates: cmd.max_candidates,
            min_score: cmd.min_score,
            max_final: cmd.max_final,
        },
    );

    let cancel = pipeline.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("interrupt received, finishing current candidate...");
            cancel.store(true, std::sync::atomic::Ordering::SeqCst);
        }
    });

    let report = report_or_quota(pipeline.run(&target).await)?;

    output::write_table(&cmd.out, &report.comparables)?;
    let prov = provenance_path(&cmd.out);
    output::write_provenance(&prov, &report.comparables)?;

    println!(
        "wrote {} comparable(s) to {} (provenance: {})",
        report.comparables.len(),
        cmd.out.display(),
        prov.display()
    );
    output::print_summary(&report.comparables);
    if report.skipped > 0 {
        println!("  ({} candidate(s) skipped after extraction failures)", report.skipped);
    }
    if report.interrupted {
        println!("run was interrupted; the table above is partial");
    }
    if report.quota_exhausted {
        eprintln!("{QUOTA_GUIDANCE}");
    } else if report.comparables.is_empty() {
        eprintln!("{EMPTY_GUIDANCE}");
    } else if report.comparables.len() < 3 {
        eprintln!("note: fewer than 3 comparables; treat the peer set as weak evidence");
    }
    Ok(())
}

fn env_is_set(key: &str) -> bool {
    std::env::var(key)
        .map(|v| !v.trim().is_empty())
        .unwrap_or(false)
}

fn run_doctor() -> Result<()> {
    let governor = GovernorConfig::from_env();
    let doc = serde_json::json!({
        "schema_version": 1,
        "name": "peerscout",
        "version": env!("CARGO_PKG_VERSION"),
        "configured": {
            "llm": {
                "base_url_override": env_is_set("PEERSCOUT_OPENAI_COMPAT_BASE_URL"),
                "api_key": env_is_set("PEERSCOUT_OPENAI_COMPAT_API_KEY"),
                "model": env_is_set("PEERSCOUT_OPENAI_COMPAT_MODEL"),
            },
            "governor": {
                "min_call_interval_s": governor.min_interval.as_secs(),
                "base_retry_delay_s": governor.base_delay.as_secs(),
                "max_retries": governor.max_retries,
            },
        },
    });
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_before_any_candidate_becomes_an_empty_flagged_report() {
        let report = report_or_quota(Err(peerscout_core::Error::QuotaExhausted(
            "billing hard limit".into(),
        )))
        .unwrap();
        assert!(report.quota_exhausted);
        assert!(report.comparables.is_empty());
        assert!(!report.interrupted);
    }

    #[test]
    fn non_quota_pipeline_errors_still_fail_the_command() {
        let err = report_or_quota(Err(peerscout_core::Error::Discover(
            "provider down".into(),
        )))
        .unwrap_err();
        assert!(err.to_string().contains("provider down"));
    }

    #[test]
    fn provenance_path_sits_next_to_the_table() {
        assert_eq!(
            provenance_path(Path::new("/tmp/peers.csv")),
            PathBuf::from("/tmp/peers.provenance.jsonl")
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Find(cmd) => {
            init_tracing(cmd.debug);
            run_find(cmd).await
        }
        Commands::Doctor => run_doctor(),
        Commands::Version => {
            println!("peerscout {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
