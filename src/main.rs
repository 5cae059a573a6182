// src/main.rs
// =============================================================================
// This is the entry point of the mailgun-cog binary.
//
// What happens here:
// 1. Set up logging (stderr, so --json output on stdout stays clean)
// 2. Parse command-line arguments using clap
// 3. Dispatch to the subcommand handler
// 4. Exit with proper code (0 = passed, 1 = failed / broken links, 2 = error)
// =============================================================================

mod cli;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use cli::{CheckerArgs, Cli, Commands, MailgunArgs};
use mailgun_cog::checker::{CandidateUrl, Evaluator, HttpFetcher, LinkCheckResult, LinkStatus, UrlType};
use mailgun_cog::mailgun::MailgunClient;
use mailgun_cog::steps::{self, Outcome, RecordValue, RunStepResponse, StepContext};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

fn init_logging() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("mailgun_cog=info".parse()?))
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

// Returns:
//   Ok(0) = step passed / no broken links
//   Ok(1) = step failed / broken links found
//   Ok(2) = step errored
//   Err = could not run at all
async fn run() -> Result<i32> {
    init_logging()?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Manifest { json } => handle_manifest(json),
        Commands::Run { step_id, data, json } => {
            handle_run(&cli.mailgun, &cli.checker, &step_id, &data, json).await
        }
        Commands::Check {
            urls,
            pass_on_codes,
            json,
        } => handle_check(&cli.checker, urls, pass_on_codes.as_deref(), json).await,
    }
}

fn handle_manifest(json: bool) -> Result<i32> {
    let manifest = steps::manifest();

    if json {
        println!("{}", serde_json::to_string_pretty(&manifest)?);
        return Ok(0);
    }

    println!("{} ({}) v{}", manifest.label, manifest.name, manifest.version);
    println!("\nAuth fields:");
    for field in manifest.auth_fields {
        println!("   {:<10} {}", field.field, field.description);
    }
    println!("\nSteps:");
    for step in &manifest.step_definitions {
        println!("   {}", step.step_id);
        println!("      {}", step.name);
        println!("      /{}/", step.expression);
    }
    Ok(0)
}

fn evaluator(checker: &CheckerArgs) -> Result<Evaluator> {
    let config = checker.config();
    let fetcher = HttpFetcher::new(config.fetch_options())?;
    Ok(Evaluator::new(Arc::new(fetcher)).with_concurrency(config.concurrency))
}

// Bounds the whole operation when --deadline-secs is set
async fn with_deadline<F: Future>(deadline_secs: Option<u64>, work: F) -> Result<F::Output> {
    match deadline_secs {
        Some(secs) => tokio::time::timeout(Duration::from_secs(secs), work)
            .await
            .map_err(|_| anyhow!("gave up after the {}s deadline", secs)),
        None => Ok(work.await),
    }
}

async fn handle_run(
    mailgun: &MailgunArgs,
    checker: &CheckerArgs,
    step_id: &str,
    data: &str,
    json: bool,
) -> Result<i32> {
    let config = mailgun.config().ok_or_else(|| {
        anyhow!("Mailgun credentials missing: set --api-key/--domain or MAILGUN_API_KEY/MAILGUN_DOMAIN")
    })?;
    debug!(config = %config.redacted(), "using Mailgun credentials");

    let data: Value = serde_json::from_str(data).context("--data must be a JSON object")?;
    let context = StepContext {
        mailbox: Arc::new(MailgunClient::new(config)?),
        evaluator: evaluator(checker)?,
    };

    let response = with_deadline(
        checker.deadline_secs,
        steps::run_step(&context, step_id, &data),
    )
    .await?;

    print_response(&response, json)?;

    Ok(match response.outcome {
        Outcome::Passed => 0,
        Outcome::Failed => 1,
        Outcome::Error => 2,
    })
}

async fn handle_check(
    checker: &CheckerArgs,
    urls: Vec<String>,
    pass_on_codes: Option<&str>,
    json: bool,
) -> Result<i32> {
    let candidates: Vec<_> = urls
        .into_iter()
        .enumerate()
        .map(|(i, url)| CandidateUrl::new(url, UrlType::Plain, i + 1))
        .collect();
    info!(count = candidates.len(), "checking urls");

    let evaluator = evaluator(checker)?;
    let result = with_deadline(
        checker.deadline_secs,
        evaluator.evaluate(candidates, pass_on_codes),
    )
    .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_table(&result.all_sorted());
    }

    Ok(if result.has_broken() { 1 } else { 0 })
}

fn print_response(response: &RunStepResponse, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(response)?);
        return Ok(());
    }

    let badge = match response.outcome {
        Outcome::Passed => "✅ PASSED",
        Outcome::Failed => "❌ FAILED",
        Outcome::Error => "⚠️  ERROR",
    };
    println!("{}: {}", badge, response.rendered_message());

    for record in &response.records {
        println!("\n📋 {} ({})", record.name, record.id);
        match &record.value {
            RecordValue::Table { headers, rows } => {
                for row in rows {
                    let cells: Vec<String> = headers
                        .iter()
                        .map(|h| format!("{}={}", h.label, display_value(row.get(&h.key))))
                        .collect();
                    println!("   {}", cells.join("  "));
                }
            }
            RecordValue::Binary { mime_type, data } => {
                println!("   {} attachment, {} base64 chars", mime_type, data.len());
            }
            RecordValue::KeyValue { fields } => {
                for (key, value) in fields {
                    println!("   {}: {} chars", key, display_value(Some(value)).len());
                }
            }
        }
    }
    Ok(())
}

fn display_value(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

// Prints results as a human-readable table in the terminal
fn print_table(results: &[LinkCheckResult]) {
    println!("{:<60} {:<8} {:<12} {:<30}", "URL", "CODE", "STATUS", "FINAL URL");
    println!("{}", "=".repeat(110));

    for result in results {
        println!(
            "{:<60} {:<8} {:<12} {:<30}",
            truncate(&result.url, 57),
            result.status_code,
            format_status(&result.status),
            truncate(&result.final_url, 30),
        );
    }

    println!();

    let working = results.iter().filter(|r| r.is_ok()).count();
    println!("📊 Summary:");
    println!("   ✅ Working: {}", working);
    println!("   ❌ Broken: {}", results.len() - working);
    println!("   📋 Total: {}", results.len());
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        format!("{}...", text.chars().take(max).collect::<String>())
    } else {
        text.to_string()
    }
}

fn format_status(status: &LinkStatus) -> &'static str {
    match status {
        LinkStatus::Working => "✅ WORKING",
        LinkStatus::Broken => "❌ BROKEN",
    }
}
