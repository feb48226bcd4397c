// Copyright 2024 SAP SE
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![warn(clippy::pedantic)]

mod api_clients;
mod projects;
mod repo;
mod report;
mod stats;
mod tracker;

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use anyhow::Context;
use api_clients::{Client, RealClient};
use clap::builder::styling::Style;
use clap::builder::{FalseyValueParser, NonEmptyStringValueParser};
use clap::{ArgAction, Parser};
use repo::GitPublisher;
use stats::StatsStore;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracker::Tracker;

const BOLD_UNDERLINE: Style = Style::new().bold().underline();
static ENVIRONMENT_HELP: LazyLock<String> = LazyLock::new(|| {
    format!(
        "{BOLD_UNDERLINE}Environment variables:{BOLD_UNDERLINE:#}
  DOCKER_PROJECTS              JSON list of {{\"username\": ..., \"repository\": ...}} objects to track
  GITHUB_ACTIONS               Commit and push the stats file when set to a non-false value
  GITHUB_STEP_SUMMARY          Job summary file the download table is appended to
  RUST_LOG                     Log filter, defaults to info
"
    )
});

#[derive(Parser)]
#[command(version, about, long_about = None, after_help = ENVIRONMENT_HELP.to_string())]
struct Cli {
    /// JSON list of Docker Hub repositories to track
    #[arg(
        long,
        env = "DOCKER_PROJECTS",
        hide_env_values = true,
        value_parser = NonEmptyStringValueParser::new()
    )]
    projects: String,

    /// Commit and push the updated stats file
    #[arg(
        long,
        env = "GITHUB_ACTIONS",
        hide_env_values = true,
        action = ArgAction::SetTrue,
        value_parser = FalseyValueParser::new()
    )]
    commit: bool,

    /// Git repository the stats file is committed to
    #[arg(long, default_value = ".", env = "GITHUB_WORKSPACE", hide_env_values = true)]
    workspace: PathBuf,

    /// Directory holding the download history
    #[arg(long, default_value = "stats", env = "STATS_DIR")]
    stats_dir: PathBuf,

    /// Docker Hub API to query
    #[arg(
        long,
        default_value = api_clients::DOCKER_HUB_API,
        env = "DOCKER_HUB_API",
        value_parser = NonEmptyStringValueParser::new()
    )]
    api_endpoint: String,

    /// Markdown file the download table is appended to
    #[arg(long, env = "GITHUB_STEP_SUMMARY", hide_env_values = true)]
    step_summary: Option<String>,

    /// File the log is appended to, in addition to stderr
    #[arg(long, default_value = "docker_downloads.log")]
    log_file: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    init_tracing(&cli.log_file)?;
    run(cli).await
}

async fn run(cli: Cli) -> Result<(), anyhow::Error> {
    let projects = projects::parse(&cli.projects).context("while loading DOCKER_PROJECTS")?;

    let tracker = Tracker {
        projects,
        client: RealClient::new(&cli.api_endpoint)?,
        store: StatsStore::new(&cli.stats_dir),
        publisher: cli.commit.then(|| GitPublisher::new(cli.workspace)),
        step_summary: cli.step_summary.filter(|path| !path.is_empty()).map(PathBuf::from),
    };

    let date = chrono::Local::now().format("%Y-%m-%d").to_string();
    tracker.run(&date).await?;

    Ok(())
}

fn init_tracing(log_file: &Path) -> Result<(), anyhow::Error> {
    let log_file = File::options()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("cannot open log file {}", log_file.display()))?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Arc::new(log_file)),
        )
        .init();

    Ok(())
}
