use detector_pipe_lib::models::ProviderKind;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    detector_pipe_lib::run(ProviderKind::GptZero).await
}
