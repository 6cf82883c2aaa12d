#![deny(missing_docs)]
//! prgate command-line interface.
//!
//! Evaluates the CI artifacts of a pull-request build, writes the HTML report
//! and publishes commit statuses and a summary comment to GitHub.

mod github;

use clap::builder::FalseyValueParser;
use clap::{Args, Parser, Subcommand};
use github::{DEFAULT_API_URL, GitHubApiClient};
use log::info;
use prgate_core::{
    AllowList, ArtifactLayout, CommentPolicy, Evaluation, HtmlRenderer, IssueTarget,
    PrGateError, PublishOutcome, Publisher, ReportSections, StdFileSystem, TestRunLayout,
    assemble_report, evaluate, report_url,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

pub(crate) type CliResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

const EXIT_GATE_FAILED: u8 = 1;
const EXIT_FATAL: u8 = 2;

#[derive(Parser)]
#[command(name = "prgate", version, about = "CI artifact aggregator and pull-request reporter")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate CI artifacts, write the report and publish verdicts.
    Report(ReportArgs),
    /// Mark the pull request head commit as pending.
    Begin(PublishArgs),
}

#[derive(Args, Clone, Debug)]
struct ReportArgs {
    #[command(flatten)]
    artifacts: ArtifactArgs,
    #[command(flatten)]
    publish: PublishArgs,
    /// Path of the rendered HTML report.
    #[arg(long, default_value = "artifacts/PullRequestReport.html")]
    output: PathBuf,
    /// Evaluate and write the report without contacting GitHub.
    #[arg(long)]
    no_publish: bool,
}

#[derive(Args, Clone, Debug)]
struct ArtifactArgs {
    /// Structured static-analysis report.
    #[arg(long, default_value = "LatestPylint/pylintpy3Report.json")]
    analysis_report: PathBuf,
    /// Line-oriented style report.
    #[arg(long, default_value = "LatestPylint/pep8py3.txt")]
    style_report: PathBuf,
    /// Style report used when the primary one is missing.
    #[arg(long, default_value = "LatestPylint/pep8.txt")]
    style_fallback: PathBuf,
    /// Never fall back to another style report.
    #[arg(long, conflicts_with = "style_fallback")]
    no_style_fallback: bool,
    /// Directory holding the baseline test results.
    #[arg(long, default_value = "MasterUnitTests")]
    baseline_dir: PathBuf,
    /// Directory holding the candidate test results.
    #[arg(long, default_value = "LatestUnitTests")]
    candidate_dir: PathBuf,
    /// Glob matching result files under each test directory.
    #[arg(long, default_value = "*/nosetestspy3-*.xml")]
    test_pattern: String,
    /// List of known unstable tests.
    #[arg(long, default_value = "UnstableTests.txt")]
    unstable_list: PathBuf,
    /// Analysis codes that never fail the build (repeatable or comma-separated).
    #[arg(long = "allowed-code", value_delimiter = ',')]
    allowed_codes: Vec<String>,
}

impl ArtifactArgs {
    fn layout(&self) -> ArtifactLayout {
        ArtifactLayout {
            analysis_report: self.analysis_report.clone(),
            style_report: self.style_report.clone(),
            style_fallback: (!self.no_style_fallback).then(|| self.style_fallback.clone()),
            tests: TestRunLayout {
                baseline_root: self.baseline_dir.clone(),
                candidate_root: self.candidate_dir.clone(),
                pattern: self.test_pattern.clone(),
                unstable_list: self.unstable_list.clone(),
            },
        }
    }

    fn allow_list(&self) -> AllowList {
        if self.allowed_codes.is_empty() {
            AllowList::default()
        } else {
            AllowList::new(self.allowed_codes.iter().map(|code| code.trim().to_string()))
        }
    }
}

#[derive(Args, Clone, Debug)]
struct PublishArgs {
    /// GitHub API token; publishing is skipped when unset.
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,
    /// GitHub API base URL.
    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,
    /// User agent sent with API requests.
    #[arg(long, env = "GITHUB_USER_AGENT", default_value = "prgate")]
    user_agent: String,
    /// Repository owner.
    #[arg(long, env = "CODE_OWNER", default_value = "dmwm")]
    owner: String,
    /// Repository name.
    #[arg(long, env = "CODE_REPO", default_value = "WMCore")]
    repo: String,
    /// Pull request under test; an empty value counts as unset.
    #[arg(long, env = "ghprbPullId")]
    pull_id: Option<String>,
    /// Tracking issue used when no pull request is set.
    #[arg(long, env = "TargetIssueID")]
    target_issue: Option<String>,
    /// CI build URL the report is published under.
    #[arg(long, env = "BUILD_URL")]
    build_url: Option<String>,
    /// Post the summary message as a comment.
    #[arg(long, env = "PRGATE_POST_COMMENT", value_parser = FalseyValueParser::new())]
    post_comment: bool,
    /// Only post comments on this issue number.
    #[arg(long, env = "PRGATE_COMMENT_ISSUE")]
    comment_issue: Option<String>,
}

impl PublishArgs {
    fn comment_policy(&self) -> CliResult<CommentPolicy> {
        Ok(CommentPolicy {
            enabled: self.post_comment,
            allowed_issue: issue_number("PRGATE_COMMENT_ISSUE", self.comment_issue.as_deref())?,
        })
    }

    fn target(&self) -> CliResult<IssueTarget> {
        let pull_id = issue_number("ghprbPullId", self.pull_id.as_deref())?;
        let target_issue = issue_number("TargetIssueID", self.target_issue.as_deref())?;
        Ok(IssueTarget::resolve(pull_id, target_issue)?)
    }

    fn client(&self) -> Option<GitHubApiClient> {
        let token = self.token.as_deref().filter(|token| !token.is_empty())?;
        Some(GitHubApiClient::new(
            self.api_url.clone(),
            self.owner.clone(),
            self.repo.clone(),
            token,
            self.user_agent.clone(),
        ))
    }

    fn build_url(&self) -> CliResult<&str> {
        self.build_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| PrGateError::Config("BUILD_URL is not set".to_string()).into())
    }
}

#[cfg(not(test))]
fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Report(args) => run_report(&args),
        Commands::Begin(args) => run_begin(&args).map(|_| ExitCode::SUCCESS),
    };
    match result {
        Ok(code) => code,
        Err(err) => {
            log::error!("{err}");
            ExitCode::from(EXIT_FATAL)
        }
    }
}

#[cfg(test)]
fn main() {}

fn run_report(args: &ReportArgs) -> CliResult<ExitCode> {
    let allow_list = args.artifacts.allow_list();
    let evaluation = evaluate(&StdFileSystem::new(), &args.artifacts.layout(), &allow_list)?;

    let html = assemble_report(&HtmlRenderer::new(), &evaluation.sections(), &allow_list)?;
    write_report(&args.output, &html)?;
    info!("Wrote report to {}", args.output.display());

    print_sentinels(&evaluation);

    if args.no_publish {
        info!("Publishing disabled; not updating GitHub");
    } else {
        publish_results(&args.publish, &evaluation.sections())?;
    }
    Ok(exit_code(&evaluation))
}

fn run_begin(args: &PublishArgs) -> CliResult<Option<PublishOutcome>> {
    let Some(client) = args.client() else {
        info!("GITHUB_TOKEN not defined; not marking tests as started");
        return Ok(None);
    };
    let target = args.target()?;
    let build_url = args.build_url()?;
    let publisher = Publisher::new(&client, target, args.comment_policy()?);
    let outcome = publisher.begin(build_url, &timestamp())?;
    info!("Marked {} statuses as pending", outcome.statuses);
    Ok(Some(outcome))
}

fn publish_results(
    args: &PublishArgs,
    sections: &ReportSections<'_>,
) -> CliResult<Option<PublishOutcome>> {
    let Some(client) = args.client() else {
        info!("GITHUB_TOKEN not defined; not updating the pull request");
        return Ok(None);
    };
    let target = args.target()?;
    let url = report_url(args.build_url()?);
    let publisher = Publisher::new(&client, target, args.comment_policy()?);
    let outcome = publisher.publish(sections, &url, &timestamp())?;
    info!(
        "Published {} statuses to issue {} (comment posted: {})",
        outcome.statuses,
        target.number(),
        outcome.comment_posted
    );
    Ok(Some(outcome))
}

fn issue_number(name: &str, value: Option<&str>) -> CliResult<Option<u64>> {
    let Some(raw) = value.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(None);
    };
    raw.parse().map(Some).map_err(|err| {
        PrGateError::Config(format!("{name} is not an issue number: {raw:?} ({err})")).into()
    })
}

fn write_report(path: &Path, contents: &str) -> CliResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)?;
    Ok(())
}

fn print_sentinels(evaluation: &Evaluation) {
    for token in evaluation.sentinels() {
        println!("{token}");
    }
}

fn exit_code(evaluation: &Evaluation) -> ExitCode {
    if evaluation.failed() {
        ExitCode::from(EXIT_GATE_FAILED)
    } else {
        ExitCode::SUCCESS
    }
}

fn timestamp() -> String {
    chrono::Utc::now().format("%d %b %Y %H:%M GMT").to_string()
}
