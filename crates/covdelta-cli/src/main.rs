//! covdelta compares an LCOV coverage report against a base report and renders a per-file coverage summary with deltas for check runs, PR comments and CI logs.

use clap::{Args, Parser, Subcommand, ValueEnum};
use covdelta_adapters_github::{ActionsEnv, ContextError, GithubContext, resolve_context};
use covdelta_app::{AppError, SummaryRequest, summarize};
use covdelta_config::{
    CliOverrides, Config, ConfigError, discover_config, load_config, resolve_config,
};
use covdelta_types::{DiffOptions, OutputFormat};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// covdelta compares an LCOV coverage report against a base report and renders a per-file coverage summary with deltas.
#[derive(Parser)]
#[command(name = "covdelta")]
#[command(
    about = "covdelta compares an LCOV coverage report against a base report and renders a per-file coverage summary with deltas."
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// CLI output format option
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CliFormat {
    Markdown,
    Text,
    Json,
}

impl From<CliFormat> for OutputFormat {
    fn from(format: CliFormat) -> Self {
        match format {
            CliFormat::Markdown => OutputFormat::Markdown,
            CliFormat::Text => OutputFormat::Text,
            CliFormat::Json => OutputFormat::Json,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Render a coverage report, compared against a base report when given
    Report(ReportArgs),
}

#[derive(Debug, Clone, Default, Args)]
struct ReportArgs {
    /// Path to the current LCOV report (default: ./coverage/lcov.info)
    #[arg(long)]
    lcov: Option<PathBuf>,

    /// Path to the base LCOV report to compare against
    #[arg(long)]
    lcov_base: Option<PathBuf>,

    /// Repository full name (owner/name)
    #[arg(long)]
    repository: Option<String>,

    /// Commit SHA of the current report
    #[arg(long)]
    commit: Option<String>,

    /// Head branch or ref
    #[arg(long)]
    head: Option<String>,

    /// Base branch
    #[arg(long)]
    base: Option<String>,

    /// Literal prefix to strip from LCOV SF paths
    #[arg(long)]
    prefix: Option<String>,

    /// Glob pattern of files to leave out (repeatable)
    #[arg(long)]
    exclude: Vec<String>,

    /// Output format (overrides config file)
    #[arg(long, value_enum)]
    format: Option<CliFormat>,

    /// Output path for the report body (default: stdout)
    #[arg(long)]
    out: Option<PathBuf>,

    /// Check-run name used in the title
    #[arg(long)]
    name: Option<String>,

    /// Path to config file (default: auto-discover covdelta.toml)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Resolve repository, commit and branches from the GitHub Actions environment
    #[arg(long)]
    github: bool,
}

/// CLI errors
#[derive(Debug, Error)]
enum CliError {
    #[error("Failed to read file '{path}': {source}")]
    FileRead {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    FileWrite {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to create directory '{path}': {source}")]
    DirCreate {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to load config: {0}")]
    ConfigLoad(#[from] ConfigError),

    #[error("Failed to resolve GitHub context: {0}")]
    Context(#[from] ContextError),

    #[error("{0}")]
    App(#[from] AppError),
}

/// Exit codes:
/// - 0: Report written, or nothing to report
/// - 1: Tool/runtime error (I/O, config, parse failure)
const EXIT_CODE_OK: i32 = 0;
const EXIT_CODE_ERROR: i32 = 1;

fn main() {
    let cli = Cli::parse();
    let exit_code = match run(cli, &|key: &str| std::env::var(key).ok()) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {}", e);
            EXIT_CODE_ERROR
        }
    };
    std::process::exit(exit_code);
}

type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

fn run(cli: Cli, env: EnvLookup<'_>) -> Result<i32, CliError> {
    match cli.command {
        Commands::Report(args) => run_report(args, env),
    }
}

fn run_report(args: ReportArgs, env: EnvLookup<'_>) -> Result<i32, CliError> {
    // Load configuration
    let loaded_config: Option<Config> = match &args.config {
        Some(path) => Some(load_config(path)?),
        None => discover_config()?.map(|(_, c)| c),
    };

    let github = if args.github {
        Some(github_context(env)?)
    } else {
        None
    };

    // Explicit flags win over the Actions context, which wins over the config file
    let github_prefix = github.as_ref().and_then(|ctx| ctx.options.prefix.clone());
    let cli_overrides = CliOverrides {
        name: args.name.clone(),
        lcov_file: args.lcov.clone(),
        lcov_base: args.lcov_base.clone(),
        format: args.format.map(OutputFormat::from),
        prefix: args.prefix.clone().or(github_prefix),
        exclude: if args.exclude.is_empty() {
            None
        } else {
            Some(args.exclude.clone())
        },
    };
    let effective = resolve_config(loaded_config.as_ref(), &cli_overrides);

    let Ok(current_text) = fs::read_to_string(&effective.lcov_file) else {
        eprintln!(
            "info: no coverage report found at \"{}\", exiting...",
            effective.lcov_file.display()
        );
        return Ok(EXIT_CODE_OK);
    };

    let base_text = effective
        .lcov_base
        .as_ref()
        .and_then(|path| match fs::read_to_string(path) {
            Ok(text) => Some(text),
            Err(_) => {
                eprintln!(
                    "warning: no base coverage report found at \"{}\", ignoring...",
                    path.display()
                );
                None
            }
        });

    let options = build_options(&args, github.as_ref().map(|ctx| &ctx.options), &effective.prefix);

    let request = SummaryRequest {
        current_text,
        base_text,
        options,
        format: effective.format,
        name: effective.name.clone(),
        exclude_patterns: effective.exclude_patterns.clone(),
    };
    let summary = summarize(&request)?;

    if let Some(path) = &effective.lcov_base
        && request.base_text.is_some()
        && summary.result.base.is_none()
    {
        eprintln!(
            "warning: base coverage report at \"{}\" has no coverage data, ignoring...",
            path.display()
        );
    }

    match &args.out {
        Some(path) => {
            write_file(path, &summary.body)?;
            eprintln!(
                "info: wrote {} report to {}",
                effective.format.as_str(),
                path.display()
            );
        }
        None => write_stdout(&summary.body)?,
    }

    if let Some(ctx) = &github
        && let Some(output_path) = env("GITHUB_OUTPUT").filter(|p| !p.is_empty())
    {
        append_github_output(
            Path::new(&output_path),
            &[("title", summary.title.as_str()), ("head-sha", ctx.head_sha.as_str())],
        )?;
    }

    Ok(EXIT_CODE_OK)
}

/// Read the Actions environment and event payload.
fn github_context(env: EnvLookup<'_>) -> Result<GithubContext, CliError> {
    let actions = ActionsEnv::from_lookup(env);
    let payload = match env("GITHUB_EVENT_PATH").filter(|p| !p.is_empty()) {
        Some(path) => fs::read_to_string(&path).map_err(|e| CliError::FileRead { path, source: e })?,
        None => "{}".to_string(),
    };
    Ok(resolve_context(&actions, &payload)?)
}

/// Merge explicit flags over the Actions context.
fn build_options(
    args: &ReportArgs,
    github: Option<&DiffOptions>,
    prefix: &Option<String>,
) -> DiffOptions {
    let mut options = github.cloned().unwrap_or_default();
    if let Some(repository) = &args.repository {
        options.repository = Some(repository.clone());
    }
    if let Some(commit) = &args.commit {
        options.commit = Some(commit.clone());
    }
    if let Some(head) = &args.head {
        options.head = Some(head.clone());
    }
    if let Some(base) = &args.base {
        options.base = Some(base.clone());
    }
    options.prefix = prefix.clone();
    options
}

fn write_stdout(body: &str) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    let result = stdout.write_all(body.as_bytes()).and_then(|()| {
        if body.ends_with('\n') {
            Ok(())
        } else {
            stdout.write_all(b"\n")
        }
    });
    result.map_err(|e| CliError::FileWrite {
        path: "<stdout>".to_string(),
        source: e,
    })
}

fn write_file(path: &Path, content: &str) -> Result<(), CliError> {
    ensure_parent_dir(path)?;
    fs::write(path, content).map_err(|e| CliError::FileWrite {
        path: path.display().to_string(),
        source: e,
    })
}

/// Append outputs to the file named by `GITHUB_OUTPUT`.
fn append_github_output(path: &Path, outputs: &[(&str, &str)]) -> Result<(), CliError> {
    let content: String = outputs
        .iter()
        .map(|(key, value)| format_github_output(key, value))
        .collect();
    fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut file| file.write_all(content.as_bytes()))
        .map_err(|e| CliError::FileWrite {
            path: path.display().to_string(),
            source: e,
        })
}

/// One output entry: `key=value`, or the `key<<DELIMITER` block form when the
/// value spans lines so it cannot inject further keys.
fn format_github_output(key: &str, value: &str) -> String {
    if !value.contains(['\n', '\r']) {
        return format!("{}={}\n", key, value);
    }
    let mut delimiter = String::from("COVDELTA_EOF");
    while value.lines().any(|line| line == delimiter) {
        delimiter.push('_');
    }
    format!("{}<<{}\n{}\n{}\n", key, delimiter, value, delimiter)
}

/// Ensure the parent directory of a path exists
fn ensure_parent_dir(path: &Path) -> Result<(), CliError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|e| CliError::DirCreate {
            path: parent.display().to_string(),
            source: e,
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn report_args(cli: Cli) -> ReportArgs {
        match cli.command {
            Commands::Report(args) => args,
        }
    }

    fn fixture(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../../fixtures/lcov")
            .join(name)
    }

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["covdelta", "report", "--lcov", "coverage.info"]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_cli_default_values() {
        let args = report_args(Cli::parse_from(["covdelta", "report"]));
        assert!(args.lcov.is_none());
        assert!(args.format.is_none());
        assert!(args.out.is_none());
        assert!(args.exclude.is_empty());
        assert!(!args.github);
    }

    #[test]
    fn test_cli_all_optional_args_together() {
        let args = report_args(Cli::parse_from([
            "covdelta",
            "report",
            "--lcov",
            "a.info",
            "--lcov-base",
            "b.info",
            "--repository",
            "octo/repo",
            "--commit",
            "abc",
            "--head",
            "feature",
            "--base",
            "main",
            "--prefix",
            "/ws/",
            "--exclude",
            "a/**",
            "--exclude",
            "b/**",
            "--format",
            "json",
            "--out",
            "out.json",
            "--name",
            "Coverage",
            "-c",
            "covdelta.toml",
            "--github",
        ]));
        assert_eq!(args.lcov_base, Some(PathBuf::from("b.info")));
        assert_eq!(args.exclude, vec!["a/**", "b/**"]);
        assert_eq!(args.format, Some(CliFormat::Json));
        assert!(args.github);
    }

    #[test]
    fn test_cli_rejects_invalid_format() {
        let cli = Cli::try_parse_from(["covdelta", "report", "--format", "html"]);
        assert!(cli.is_err());
    }

    #[test]
    fn test_cli_format_maps_to_output_format() {
        assert_eq!(OutputFormat::from(CliFormat::Markdown), OutputFormat::Markdown);
        assert_eq!(OutputFormat::from(CliFormat::Text), OutputFormat::Text);
        assert_eq!(OutputFormat::from(CliFormat::Json), OutputFormat::Json);
    }

    #[test]
    fn test_build_options_flags_override_context() {
        let args = ReportArgs {
            commit: Some("explicit".to_string()),
            ..Default::default()
        };
        let context = DiffOptions {
            repository: Some("octo/repo".to_string()),
            commit: Some("from-event".to_string()),
            head: Some("feature".to_string()),
            ..Default::default()
        };

        let options = build_options(&args, Some(&context), &Some("/ws/".to_string()));

        assert_eq!(options.repository.as_deref(), Some("octo/repo"));
        assert_eq!(options.commit.as_deref(), Some("explicit"));
        assert_eq!(options.head.as_deref(), Some("feature"));
        assert_eq!(options.prefix.as_deref(), Some("/ws/"));
    }

    #[test]
    fn test_ensure_parent_dir_with_simple_path() {
        assert!(ensure_parent_dir(Path::new("report.md")).is_ok());
    }

    #[test]
    fn test_missing_current_report_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let args = ReportArgs {
            lcov: Some(dir.path().join("missing.info")),
            config: Some(write_empty_config(dir.path())),
            ..Default::default()
        };
        assert_eq!(run_report(args, &|_: &str| None).unwrap(), EXIT_CODE_OK);
    }

    #[test]
    fn test_malformed_current_report_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let args = ReportArgs {
            lcov: Some(fixture("malformed.info")),
            config: Some(write_empty_config(dir.path())),
            out: Some(dir.path().join("out.md")),
            ..Default::default()
        };
        let err = run_report(args, &|_: &str| None).unwrap_err();
        assert!(matches!(err, CliError::App(AppError::CurrentLcov(_))));
        assert!(!dir.path().join("out.md").exists());
    }

    #[test]
    fn test_github_outputs_appended() {
        let dir = tempfile::tempdir().unwrap();
        let event_path = dir.path().join("event.json");
        fs::write(
            &event_path,
            r#"{"repository":{"full_name":"octo/repo"},"pull_request":{"head":{"ref":"feature","sha":"abc123"},"base":{"ref":"main","sha":"def"}}}"#,
        )
        .unwrap();
        let output_path = dir.path().join("github_output");
        fs::write(&output_path, "existing=1\n").unwrap();

        let vars: HashMap<&str, String> = HashMap::from([
            ("GITHUB_EVENT_NAME", "pull_request".to_string()),
            ("GITHUB_EVENT_PATH", event_path.display().to_string()),
            ("GITHUB_SHA", "merge".to_string()),
            ("GITHUB_WORKSPACE", "/workspace".to_string()),
            ("GITHUB_OUTPUT", output_path.display().to_string()),
        ]);
        let env = move |key: &str| vars.get(key).cloned();

        let out = dir.path().join("report.md");
        let args = ReportArgs {
            lcov: Some(fixture("current.info")),
            lcov_base: Some(fixture("base.info")),
            config: Some(write_empty_config(dir.path())),
            out: Some(out.clone()),
            github: true,
            ..Default::default()
        };

        assert_eq!(run_report(args, &env).unwrap(), EXIT_CODE_OK);

        let body = fs::read_to_string(&out).unwrap();
        assert!(body.contains("Coverage: 63.6% (+18.1% vs base)"));
        assert!(body.contains("- **Repository**: octo/repo"));
        assert!(body.contains("| src/app.js |"));

        let outputs = fs::read_to_string(&output_path).unwrap();
        assert_eq!(
            outputs,
            "existing=1\ntitle=Code Coverage \u{2705}\nhead-sha=abc123\n"
        );
    }

    #[test]
    fn test_github_without_event_path_uses_sha() {
        let vars: HashMap<&str, String> = HashMap::from([
            ("GITHUB_EVENT_NAME", "push".to_string()),
            ("GITHUB_SHA", "sha1".to_string()),
            ("GITHUB_REF", "refs/heads/main".to_string()),
        ]);
        let ctx = github_context(&move |key: &str| vars.get(key).cloned()).unwrap();
        assert_eq!(ctx.head_sha, "sha1");
        assert_eq!(ctx.options.head.as_deref(), Some("refs/heads/main"));
        assert!(ctx.options.repository.is_none());
    }

    #[test]
    fn test_github_unreadable_event_path() {
        let vars: HashMap<&str, String> = HashMap::from([
            ("GITHUB_EVENT_NAME", "push".to_string()),
            ("GITHUB_EVENT_PATH", "/nonexistent/event.json".to_string()),
        ]);
        let err = github_context(&move |key: &str| vars.get(key).cloned()).unwrap_err();
        assert!(matches!(err, CliError::FileRead { .. }));
    }

    #[test]
    fn test_format_github_output_single_line() {
        assert_eq!(format_github_output("title", "Coverage \u{2705}"), "title=Coverage \u{2705}\n");
    }

    #[test]
    fn test_format_github_output_multiline_uses_delimiter() {
        assert_eq!(
            format_github_output("title", "Cov\nhead-sha=evil"),
            "title<<COVDELTA_EOF\nCov\nhead-sha=evil\nCOVDELTA_EOF\n"
        );
    }

    #[test]
    fn test_format_github_output_delimiter_avoids_value() {
        assert_eq!(
            format_github_output("title", "a\nCOVDELTA_EOF\nb"),
            "title<<COVDELTA_EOF_\na\nCOVDELTA_EOF\nb\nCOVDELTA_EOF_\n"
        );
    }

    #[test]
    fn test_github_output_name_with_newline_cannot_add_keys() {
        let dir = tempfile::tempdir().unwrap();
        let output_path = dir.path().join("github_output");
        let vars: HashMap<&str, String> = HashMap::from([
            ("GITHUB_EVENT_NAME", "push".to_string()),
            ("GITHUB_SHA", "sha1".to_string()),
            ("GITHUB_OUTPUT", output_path.display().to_string()),
        ]);
        let env = move |key: &str| vars.get(key).cloned();

        let args = ReportArgs {
            lcov: Some(fixture("covered.info")),
            config: Some(write_empty_config(dir.path())),
            out: Some(dir.path().join("report.md")),
            name: Some("Cov\nhead-sha=evil".to_string()),
            github: true,
            ..Default::default()
        };

        assert_eq!(run_report(args, &env).unwrap(), EXIT_CODE_OK);

        let outputs = fs::read_to_string(&output_path).unwrap();
        assert_eq!(
            outputs,
            "title<<COVDELTA_EOF\nCov\nhead-sha=evil \u{2705}\nCOVDELTA_EOF\nhead-sha=sha1\n"
        );
    }

    #[test]
    fn test_empty_base_report_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("base.info");
        fs::write(&base, "").unwrap();
        let out = dir.path().join("report.md");

        let args = ReportArgs {
            lcov: Some(fixture("covered.info")),
            lcov_base: Some(base),
            config: Some(write_empty_config(dir.path())),
            out: Some(out.clone()),
            ..Default::default()
        };

        assert_eq!(run_report(args, &|_: &str| None).unwrap(), EXIT_CODE_OK);
        let body = fs::read_to_string(&out).unwrap();
        assert!(body.contains("**Coverage: 100.0%**"));
        assert!(!body.contains("vs base"));
        assert!(!body.contains("new file"));
    }

    fn write_empty_config(dir: &Path) -> PathBuf {
        let path = dir.join("covdelta.toml");
        fs::write(&path, "").unwrap();
        path
    }
}
