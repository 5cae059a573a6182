// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// Three subcommands:
// - manifest: print the cog manifest (auth fields + step definitions)
// - run: run one step against the configured Mailgun domain
// - check: run the link evaluator on URLs given on the command line
//
// Mailgun credentials come from flags or the MAILGUN_* environment
// variables, so they never need to appear in shell history.
// =============================================================================

use clap::{Args, Parser, Subcommand};
use mailgun_cog::checker::DEFAULT_CONCURRENCY;
use mailgun_cog::config::{CheckerConfig, MailgunConfig, DEFAULT_ENDPOINT};

#[derive(Parser, Debug)]
#[command(
    name = "mailgun-cog",
    version,
    about = "Scenario steps that check emails received in a Mailgun inbox",
    long_about = "mailgun-cog runs validation steps against a Mailgun inbox: email counts, \
                  field checks, and broken link / image detection in received emails."
)]
pub struct Cli {
    #[command(flatten)]
    pub mailgun: MailgunArgs,

    #[command(flatten)]
    pub checker: CheckerArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the cog manifest
    ///
    /// Example: mailgun-cog manifest --json
    Manifest {
        /// Output the manifest as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Run one step
    ///
    /// Example: mailgun-cog run EmailLinksValidationStep --data '{"email":"me@mg.example.com","position":1}'
    Run {
        /// Step id, as listed by `manifest`
        step_id: String,

        /// Step data as a JSON object
        #[arg(long, default_value = "{}")]
        data: String,

        /// Output the full step response as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check URLs with the link evaluator, without reading any inbox
    ///
    /// Example: mailgun-cog check https://example.com https://example.org/about
    Check {
        /// URLs to check
        #[arg(required = true)]
        urls: Vec<String>,

        /// Comma-separated status codes that count as working (e.g. 403,429)
        #[arg(long)]
        pass_on_codes: Option<String>,

        /// Output results in JSON format instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct MailgunArgs {
    /// Mailgun API key
    #[arg(long, global = true, env = "MAILGUN_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Mailgun sending domain; only addresses on it can be checked
    #[arg(long, global = true, env = "MAILGUN_DOMAIN")]
    pub domain: Option<String>,

    /// Mailgun API endpoint (use https://api.eu.mailgun.net/v3 for EU domains)
    #[arg(long, global = true, env = "MAILGUN_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,
}

impl MailgunArgs {
    // None when either the key or the domain is missing
    pub fn config(&self) -> Option<MailgunConfig> {
        Some(MailgunConfig {
            api_key: self.api_key.clone()?,
            domain: self.domain.clone()?,
            endpoint: self.endpoint.clone(),
        })
    }
}

#[derive(Args, Debug)]
pub struct CheckerArgs {
    /// Maximum number of URLs checked at the same time
    #[arg(long, global = true, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Per-request timeout in milliseconds
    #[arg(long, global = true, default_value_t = 10_000)]
    pub timeout_ms: u64,

    /// Redirects followed before a URL's last 3xx response is kept as-is
    #[arg(long, global = true, default_value_t = 10)]
    pub max_redirects: usize,

    /// Give up on the whole run after this many seconds
    #[arg(long, global = true)]
    pub deadline_secs: Option<u64>,
}

impl CheckerArgs {
    pub fn config(&self) -> CheckerConfig {
        CheckerConfig {
            concurrency: self.concurrency,
            timeout_ms: self.timeout_ms,
            max_redirects: self.max_redirects,
        }
    }
}
