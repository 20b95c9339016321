use clap::Parser;
use detector_pipe_lib::models::ProviderKind;
use std::process::ExitCode;

/// Read text from stdin, send it to an AI-detection API, print the JSON response.
#[derive(Parser, Debug)]
#[command(name = "detector-pipe", version, about)]
struct Cli {
    /// Detection provider to call
    #[arg(long, short, value_enum, env = "DETECTOR_PIPE_PROVIDER")]
    provider: ProviderKind,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    detector_pipe_lib::run(cli.provider).await
}
