pub mod models;
pub mod services;

use anyhow::Context;
use models::{InvocationResult, OutputStream, PipeOutput, ProviderKind};
use services::providers::UnavailableTransport;
use services::{
    pipe, ConfigStore, DetectorError, Environment, HttpTransport, PipeConfig, ProcessEnvironment,
    TracingSink,
};

use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

/// `RUST_LOG` (default `info`), with the `audit` target always kept at info
/// so the input/response trail survives stricter settings.
pub fn log_filter(rust_log: Option<&str>) -> EnvFilter {
    let filter = rust_log
        .filter(|s| !s.trim().is_empty())
        .and_then(|s| EnvFilter::try_new(s).ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    match "audit=info".parse::<Directive>() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    }
}

/// Initialize logging with one timestamped log file per run.
///
/// Nothing is ever logged to stdout. The returned guard must outlive the run
/// so the non-blocking writer flushes on drop.
pub fn init_logging(kind: ProviderKind, settings: &PipeConfig, env: &impl Environment) -> Option<WorkerGuard> {
    let env_filter = log_filter(env.var("RUST_LOG").as_deref());

    if env.flag(services::config_store::DISABLE_FILE_LOG_ENV) {
        init_console_only_logging(env_filter);
        info!("File logging disabled via DETECTOR_PIPE_DISABLE_FILE_LOG");
        return None;
    }

    let logs_dir = settings.log_dir(env);
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let log_prefix = format!("{}_pipe_log_{}", kind.slug(), timestamp);

    let appender = match open_log_file(&logs_dir, &log_prefix) {
        Ok(appender) => appender,
        Err(e) => {
            eprintln!("Failed to open log file: {:#}", e);
            init_console_only_logging(env_filter);
            info!("Falling back to stderr logging (log dir not writable)");
            return None;
        }
    };
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_timer(ChronoLocal::new(LOG_TIME_FORMAT.to_string()))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false);

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .try_init();

    info!("Log file: {}/{}.log", logs_dir.display(), log_prefix);
    Some(guard)
}

fn open_log_file(logs_dir: &Path, prefix: &str) -> anyhow::Result<RollingFileAppender> {
    fs::create_dir_all(logs_dir)
        .with_context(|| format!("Failed to create logs directory {}", logs_dir.display()))?;

    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .build(logs_dir)
        .with_context(|| format!("Failed to create log file in {}", logs_dir.display()))
}

fn init_console_only_logging(env_filter: EnvFilter) {
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(ChronoLocal::new(LOG_TIME_FORMAT.to_string()))
        .with_ansi(false)
        .with_target(true);

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .try_init();
}

/// Config file contents, or defaults plus the reason they were used.
fn load_settings(env: &impl Environment) -> (PipeConfig, Option<String>) {
    match ConfigStore::locate(env) {
        Some(store) => match store.load() {
            Ok(config) => (config, None),
            Err(e) => (PipeConfig::default(), Some(format!("{:#}", e))),
        },
        None => (PipeConfig::default(), None),
    }
}

async fn read_stdin() -> anyhow::Result<String> {
    let mut buf = Vec::new();
    tokio::io::stdin()
        .read_to_end(&mut buf)
        .await
        .context("failed to read standard input")?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn emit(output: &PipeOutput) {
    let written = match output.stream {
        OutputStream::Stdout => writeln!(std::io::stdout().lock(), "{}", output.text),
        OutputStream::Stderr => writeln!(std::io::stderr().lock(), "{}", output.text),
    };
    if let Err(e) = written {
        warn!(error = %e, "output.write_failed");
    }
}

/// Process entry for one pipe variant: stdin in, JSON or an error string out.
pub async fn run(kind: ProviderKind) -> ExitCode {
    let env = ProcessEnvironment;
    let (settings, config_error) = load_settings(&env);
    let _log_guard = init_logging(kind, &settings, &env);

    if let Some(e) = config_error {
        warn!("Ignoring config file: {}", e);
    }
    info!(provider = %kind, version = env!("CARGO_PKG_VERSION"), "pipe.start");

    let provider = kind.config(&settings, &env);
    let mut sink = TracingSink;

    let result = match read_stdin().await {
        Ok(text) => match HttpTransport::from_config(&settings, &env) {
            Ok(transport) => pipe::run(&provider, &text, &env, &transport, &mut sink).await,
            Err(e) => {
                let transport = UnavailableTransport::new(e);
                pipe::run(&provider, &text, &env, &transport, &mut sink).await
            }
        },
        Err(e) => {
            let err = DetectorError::Unexpected(format!("{:#}", e));
            warn!("{}", err);
            InvocationResult::Failure {
                kind: err.kind(),
                message: err.to_string(),
            }
        }
    };

    let output = result.render();
    emit(&output);
    info!(exit_code = output.exit_code, "pipe.finish");

    ExitCode::from(output.exit_code)
}
