pub mod cli;
pub mod config;
pub mod http;
pub mod llm;
pub mod pipeline;
pub mod puzzle;
pub mod python;
pub mod solver;
pub mod trace;

use anyhow::{Result, anyhow};
use cli::CliArgs;
use config::{AppConfig, ProviderKind, SandboxBackend, SandboxConfig};
use http::{HttpClient, HttpDebugConfig};
use llm::{AnyProvider, GeminiProvider, OpenAiProvider};
use pipeline::{InputSource, Pipeline, Report, SolveRequest};
use puzzle::PuzzleFetcher;
use python::{AnySandbox, EmbeddedSandbox, ProcessSandbox};
use solver::SolutionGenerator;
use std::process::ExitCode;
use std::time::{SystemTime, UNIX_EPOCH};
use trace::RunTrace;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

pub async fn run(args: CliArgs) -> Result<ExitCode> {
    let mut config = AppConfig::load_with_path(args.config.as_deref())?;
    apply_cli_overrides(&mut config, &args);

    let run_id = generate_run_id();
    let trace = RunTrace::create(&run_id)?;
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(config.request_timeout())
        .build()
        .map_err(|err| anyhow!("Failed to build HTTP client: {err}"))?;
    let http = HttpClient::new(client, HttpDebugConfig::from_verbose(args.verbose))
        .with_trace(trace.clone());

    let provider = build_provider(&config, http.clone())?;
    let sandbox = build_sandbox(&config.sandbox)?;
    let fetcher = PuzzleFetcher::new(
        http,
        &config.aoc_base_url,
        config.aoc_year,
        config.aoc_session.clone(),
    );
    let pipeline = Pipeline::new(
        fetcher,
        SolutionGenerator::new(provider, config.request_timeout()),
        sandbox,
    )
    .with_trace(trace);

    let input = match args.input.clone() {
        Some(path) => InputSource::File(path),
        None => InputSource::Download,
    };
    let report = pipeline
        .run(SolveRequest {
            day: args.day,
            part: args.part,
            input,
        })
        .await;

    print_report(&report, &args);
    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn apply_cli_overrides(config: &mut AppConfig, args: &CliArgs) {
    if let Some(year) = args.year {
        config.aoc_year = year;
    }
    if let Some(session) = args
        .session
        .as_deref()
        .map(str::trim)
        .filter(|session| !session.is_empty())
    {
        config.aoc_session = Some(session.to_string());
    }
}

fn build_provider(config: &AppConfig, http: HttpClient) -> Result<AnyProvider> {
    let provider = match config.llm_provider {
        ProviderKind::OpenAi => AnyProvider::OpenAi(OpenAiProvider::new(
            http,
            config.openai_api_key.clone(),
            config.openai_model.clone(),
            config.openai_base_url.clone(),
        )?),
        ProviderKind::Gemini => AnyProvider::Gemini(GeminiProvider::new(
            http,
            config.gemini_api_key.clone(),
            config.gemini_model.clone(),
            config.gemini_base_url.clone(),
        )?),
    };
    Ok(provider)
}

fn build_sandbox(config: &SandboxConfig) -> Result<AnySandbox> {
    let limits = config.limits();
    Ok(match config.backend {
        SandboxBackend::Process => {
            AnySandbox::Process(ProcessSandbox::new(config.python.clone(), limits))
        }
        SandboxBackend::Embedded => AnySandbox::Embedded(EmbeddedSandbox::initialize(limits)?),
    })
}

fn print_report(report: &Report, args: &CliArgs) {
    if let Some(solved) = report.solved() {
        if args.show_code {
            println!("Generated code:\n{}\n", solved.solution.code().trim_end());
        }
        if args.show_output && !solved.output.is_empty() {
            println!("Captured output:\n{}\n", solved.output.as_str().trim_end());
        }
    }

    if report.is_success() {
        println!("{report}");
    } else {
        eprintln!("{report}");
    }
}

fn generate_run_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_millis());
    format!("{millis:x}-{:x}", std::process::id())
}
