//! wellsignal CLI - Command-line front end for the check-in analysis engine
//!
//! Commands:
//! - analyze: Analyze one check-in bundle against its history
//! - encode: Encode a notification interaction into a behavior vector
//! - rules: Evaluate notification rules against evaluation data
//! - doctor: Diagnose configuration and engine health

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing_subscriber::EnvFilter;
use wellsignal::behavior::{BehaviorEncoder, BehaviorEvent, BEHAVIOR_DIMENSION};
use wellsignal::interaction::InteractionInsights;
use wellsignal::providers::MemoryHistoryStore;
use wellsignal::rules::{
    insight_evaluation_data, EvaluationData, InsightRuleContext, RuleRegistry, RuleSummary,
    UserRuleContext,
};
use wellsignal::trend::{TrendAnalysis, TrendAnalyzer};
use wellsignal::types::{
    CheckInRecord, CheckInResponse, Insight, ResponseAnalysisResult, UserHealthContext, UserProfile,
};
use wellsignal::vector::SEMANTIC_DIMENSION;
use wellsignal::{AnalysisConfig, AnalysisError, Analyzer, VERSION};

/// wellsignal - Baselines, anomalies, trends and risk for daily health check-ins
#[derive(Parser)]
#[command(name = "wellsignal")]
#[command(version = VERSION)]
#[command(about = "Analyze daily health check-ins", long_about = None)]
struct Cli {
    /// Config file (JSON); defaults apply to missing fields
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze one check-in bundle
    Analyze {
        /// Input file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,

        /// Override the baseline lookback in days
        #[arg(long)]
        lookback_days: Option<u32>,

        /// Cap the number of baseline records
        #[arg(long)]
        baseline_cap: Option<usize>,
    },

    /// Encode a behavior event into its 128-dimension vector
    Encode {
        /// Input file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Output format
        #[arg(long, default_value = "json")]
        output_format: OutputFormat,
    },

    /// Evaluate notification rules against evaluation data
    Rules {
        /// Input file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Disable a rule by id before evaluating (repeatable)
        #[arg(long)]
        disable: Vec<String>,

        /// List every rule instead of evaluating
        #[arg(long)]
        list: bool,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,
    },

    /// Diagnose configuration and engine health
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

/// Everything `analyze` reads
#[derive(Deserialize)]
struct AnalyzeBundle {
    user_id: String,
    date: NaiveDate,
    responses: Vec<CheckInResponse>,
    #[serde(default)]
    history: Vec<CheckInRecord>,
    #[serde(default)]
    profile: Option<UserProfile>,
    /// Days the user has shown a declining trend, for rule context
    #[serde(default)]
    declining_days: Option<u32>,
}

#[derive(Serialize)]
struct AnalyzeReport {
    user_id: String,
    date: NaiveDate,
    analysis: ResponseAnalysisResult,
    insights: Vec<Insight>,
    health_score: u8,
    consistency: f64,
    trend_analysis: TrendAnalysis,
    matched_rules: Vec<RuleSummary>,
}

#[derive(Serialize)]
struct EncodeReport {
    user_id: String,
    notification_id: String,
    dimension: usize,
    non_zero: usize,
    vector: Vec<f32>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("wellsignal=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);

    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

async fn run(cli: Cli) -> Result<(), CommandError> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Analyze {
            input,
            output_format,
            lookback_days,
            baseline_cap,
        } => {
            let mut config = config;
            if let Some(days) = lookback_days {
                config.lookback_days = days;
            }
            if baseline_cap.is_some() {
                config.baseline_record_cap = baseline_cap;
            }
            cmd_analyze(&input, output_format, config).await
        }

        Commands::Encode {
            input,
            output_format,
        } => cmd_encode(&input, output_format),

        Commands::Rules {
            input,
            disable,
            list,
            output_format,
        } => cmd_rules(&input, &disable, list, output_format),

        Commands::Doctor { json } => cmd_doctor(&config, cli.config.as_deref(), json),
    }
}

fn load_config(path: Option<&Path>) -> Result<AnalysisConfig, CommandError> {
    match path {
        Some(path) => Ok(AnalysisConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(AnalysisConfig::default()),
    }
}

fn read_input(input: &Path) -> Result<String, CommandError> {
    if input.to_string_lossy() == "-" {
        if atty::is(atty::Stream::Stdin) {
            return Err(CommandError::NoInput);
        }
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn format_output<T: Serialize>(value: &T, format: &OutputFormat) -> Result<String, CommandError> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string(value)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(value)?),
    }
}

async fn cmd_analyze(
    input: &Path,
    output_format: OutputFormat,
    config: AnalysisConfig,
) -> Result<(), CommandError> {
    let bundle: AnalyzeBundle = serde_json::from_str(&read_input(input)?)?;
    if bundle.responses.is_empty() {
        return Err(CommandError::NoResponses);
    }

    // Seed an in-memory store with the bundle's history and profile
    let store = MemoryHistoryStore::new();
    store.extend_check_ins(bundle.history.iter().cloned().map(|mut record| {
        record.user_id = bundle.user_id.clone();
        record
    }));
    if let Some(profile) = bundle.profile.clone() {
        store.set_profile(bundle.user_id.clone(), profile);
    }

    let analyzer = Analyzer::new(Arc::new(store)).with_config(config)?;
    let user_id = bundle.user_id.as_str();

    let analysis = analyzer
        .analyze_responses(user_id, bundle.date, &bundle.responses)
        .await?;

    let context = analyzer.user_health_context(user_id).await?;
    let mut interaction = InteractionInsights::default();
    let mut trend_history = bundle.history.clone();
    trend_history.push(CheckInRecord::from_responses(user_id, bundle.date, &bundle.responses));
    interaction.behavior_trends = TrendAnalyzer::behavior_trends_from_records(&trend_history);

    let insights = analyzer
        .generate_insights(&analysis, &interaction, &context)
        .await;

    let consistency = analyzer.check_in_consistency(user_id, bundle.date).await?;
    let health_score = analyzer.compute_health_score(
        &analysis,
        interaction.behavior_trends.overall_trend,
        consistency,
    );
    let trend_analysis = analyzer.trend_analysis(user_id, bundle.date).await?;

    let matched_rules = evaluate_bundle_rules(&analyzer, &bundle, &analysis, &insights, &context).await;

    let report = AnalyzeReport {
        user_id: bundle.user_id.clone(),
        date: bundle.date,
        analysis,
        insights,
        health_score,
        consistency: consistency.value(),
        trend_analysis,
        matched_rules,
    };

    println!("{}", format_output(&report, &output_format)?);
    Ok(())
}

/// Rules matched by the analysis itself and by each generated insight, once per rule
async fn evaluate_bundle_rules(
    analyzer: &Analyzer,
    bundle: &AnalyzeBundle,
    analysis: &ResponseAnalysisResult,
    insights: &[Insight],
    context: &UserHealthContext,
) -> Vec<RuleSummary> {
    let current = CheckInRecord::from_responses(&bundle.user_id, bundle.date, &bundle.responses);
    let user_context = UserRuleContext {
        user_id: bundle.user_id.clone(),
        duration_days: bundle.declining_days,
        ..Default::default()
    };

    let mut evaluations = vec![EvaluationData {
        risk_score: Some(analysis.risk_score),
        trends: analysis
            .trends
            .iter()
            .map(|t| t.direction.as_str().to_string())
            .collect(),
        symptoms: current.symptoms.clone(),
        prescriptions: context.prescriptions.clone(),
        user_context: Some(user_context.clone()),
        ..Default::default()
    }];
    evaluations.extend(insights.iter().map(|insight| {
        insight_evaluation_data(
            insight,
            InsightRuleContext {
                symptoms: current.symptoms.clone(),
                prescriptions: context.prescriptions.clone(),
                user_context: Some(user_context.clone()),
            },
        )
    }));

    let mut seen = HashSet::new();
    let mut matched = Vec::new();
    for data in &evaluations {
        for rule in analyzer
            .evaluate_notification_rules(&bundle.user_id, data)
            .await
        {
            if seen.insert(rule.id.clone()) {
                matched.push(rule.summary());
            }
        }
    }
    matched
}

fn cmd_encode(input: &Path, output_format: OutputFormat) -> Result<(), CommandError> {
    let event: BehaviorEvent = serde_json::from_str(&read_input(input)?)?;
    let vector = BehaviorEncoder::new().encode(&event);

    let report = EncodeReport {
        user_id: event.user_id,
        notification_id: event.notification_id,
        dimension: vector.len(),
        non_zero: vector.iter().filter(|v| **v != 0.0).count(),
        vector,
    };

    println!("{}", format_output(&report, &output_format)?);
    Ok(())
}

fn cmd_rules(
    input: &Path,
    disable: &[String],
    list: bool,
    output_format: OutputFormat,
) -> Result<(), CommandError> {
    let registry = RuleRegistry::default();
    for rule_id in disable {
        if !registry.toggle_rule(rule_id, false) {
            return Err(CommandError::UnknownRule(rule_id.clone()));
        }
    }

    let rules: Vec<RuleSummary> = if list {
        registry.all_rules().iter().map(|r| r.summary()).collect()
    } else {
        let data: EvaluationData = serde_json::from_str(&read_input(input)?)?;
        registry
            .evaluate_rules(&data)
            .iter()
            .map(|r| r.summary())
            .collect()
    };

    println!("{}", format_output(&rules, &output_format)?);
    Ok(())
}

fn cmd_doctor(
    config: &AnalysisConfig,
    config_path: Option<&Path>,
    json: bool,
) -> Result<(), CommandError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("wellsignal version {}", VERSION),
    });

    checks.push(DoctorCheck {
        name: "vector_dimensions".to_string(),
        status: CheckStatus::Ok,
        message: format!(
            "semantic {}, behavioral {}",
            SEMANTIC_DIMENSION, BEHAVIOR_DIMENSION
        ),
    });

    let registry = RuleRegistry::default();
    let rules = registry.all_rules();
    checks.push(DoctorCheck {
        name: "rules".to_string(),
        status: if rules.is_empty() {
            CheckStatus::Warning
        } else {
            CheckStatus::Ok
        },
        message: format!(
            "{} rules registered, {} enabled",
            rules.len(),
            rules.iter().filter(|r| r.enabled).count()
        ),
    });

    checks.push(match config.validate() {
        Ok(()) => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: match config_path {
                Some(path) => format!("Config {} valid", path.display()),
                None => "Using default config".to_string(),
            },
        },
        Err(e) => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Error,
            message: e.to_string(),
        },
    });

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (pass --input <file>)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (ready for input)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        version: VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("wellsignal Doctor Report");
        println!("========================");
        println!("Version: {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(CommandError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Error types

#[derive(Debug)]
enum CommandError {
    Io(io::Error),
    Analysis(AnalysisError),
    Json(serde_json::Error),
    NoInput,
    NoResponses,
    UnknownRule(String),
    DoctorFailed,
}

impl From<io::Error> for CommandError {
    fn from(e: io::Error) -> Self {
        CommandError::Io(e)
    }
}

impl From<AnalysisError> for CommandError {
    fn from(e: AnalysisError) -> Self {
        CommandError::Analysis(e)
    }
}

impl From<serde_json::Error> for CommandError {
    fn from(e: serde_json::Error) -> Self {
        CommandError::Json(e)
    }
}

#[derive(Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<CommandError> for CliError {
    fn from(e: CommandError) -> Self {
        match e {
            CommandError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            CommandError::Analysis(AnalysisError::Config(message)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message,
                hint: Some("Run 'wellsignal doctor --config <file>' for details".to_string()),
            },
            CommandError::Analysis(e) => CliError {
                code: "ANALYSIS_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            CommandError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax and field names".to_string()),
            },
            CommandError::NoInput => CliError {
                code: "NO_INPUT".to_string(),
                message: "No input on stdin".to_string(),
                hint: Some("Pipe JSON in or pass --input <file>".to_string()),
            },
            CommandError::NoResponses => CliError {
                code: "NO_RESPONSES".to_string(),
                message: "Bundle contains no responses".to_string(),
                hint: Some("Include at least one answered question".to_string()),
            },
            CommandError::UnknownRule(rule_id) => CliError {
                code: "UNKNOWN_RULE".to_string(),
                message: format!("No rule with id '{}'", rule_id),
                hint: Some("Run 'wellsignal rules --list' to see rule ids".to_string()),
            },
            CommandError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(Serialize)]
struct DoctorReport {
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
