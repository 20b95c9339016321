// Detector Pipe
// stdin text -> one detection request -> InvocationResult

use serde_json::Value;

use super::audit::AuditSink;
use super::config_store::Environment;
use super::providers::{DetectionTransport, DetectorError, ProviderConfig};
use crate::models::{pretty_json, InvocationResult};

/// Run one detection request for `stdin_text`.
///
/// Order is fixed: empty check, log input, credential lookup, a single POST,
/// log outcome. No network call happens when the input is blank or the
/// credential is missing. Errors are folded into the returned value.
pub async fn run<E, T, S>(
    provider: &ProviderConfig,
    stdin_text: &str,
    env: &E,
    transport: &T,
    sink: &mut S,
) -> InvocationResult
where
    E: Environment + ?Sized,
    T: DetectionTransport + ?Sized,
    S: AuditSink,
{
    let text = stdin_text.trim();
    if text.is_empty() {
        let err = DetectorError::EmptyInput;
        sink.warning(err.to_string());
        return failure(err);
    }

    sink.info(format!("Received input: {}", text));

    match detect(provider, text, env, transport).await {
        Ok(body) => {
            sink.info(format!(
                "{} API response: {}",
                provider.kind.display_name(),
                pretty_json(&body)
            ));
            InvocationResult::Success(body)
        }
        Err(err) => {
            sink.error(err.to_string());
            failure(err)
        }
    }
}

async fn detect<E, T>(
    provider: &ProviderConfig,
    text: &str,
    env: &E,
    transport: &T,
) -> Result<Value, DetectorError>
where
    E: Environment + ?Sized,
    T: DetectionTransport + ?Sized,
{
    let credential = env
        .non_empty(provider.credential_env_var)
        .ok_or(DetectorError::MissingCredential(provider.credential_env_var))?;

    let request = provider.build_request(text, &credential);
    transport.post_json(&request).await
}

fn failure(err: DetectorError) -> InvocationResult {
    InvocationResult::Failure {
        kind: err.kind(),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FailureKind, LogLevel, ProviderKind};
    use crate::services::audit::MemorySink;
    use crate::services::config_store::PipeConfig;
    use crate::services::providers::DetectionRequest;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    enum Reply {
        Json(Value),
        Status(u16),
        Unexpected(&'static str),
    }

    struct RecordingTransport {
        reply: Reply,
        calls: Mutex<Vec<DetectionRequest>>,
    }

    impl RecordingTransport {
        fn new(reply: Reply) -> Self {
            Self {
                reply,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<DetectionRequest> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DetectionTransport for RecordingTransport {
        async fn post_json(&self, request: &DetectionRequest) -> Result<Value, DetectorError> {
            self.calls.lock().unwrap().push(request.clone());
            match &self.reply {
                Reply::Json(v) => Ok(v.clone()),
                Reply::Status(code) => Err(DetectorError::Status {
                    status: *code,
                    reason: "Internal Server Error".to_string(),
                    url: request.url.clone(),
                }),
                Reply::Unexpected(msg) => Err(DetectorError::Unexpected(msg.to_string())),
            }
        }
    }

    fn sapling() -> ProviderConfig {
        ProviderKind::Sapling.config(&PipeConfig::default(), &HashMap::<String, String>::new())
    }

    fn env_with_key() -> HashMap<String, String> {
        [("SAPLING_API_KEY".to_string(), "test_key".to_string())].into()
    }

    #[tokio::test]
    async fn test_success_returns_body_and_sends_exact_request() {
        let transport = RecordingTransport::new(Reply::Json(json!({"is_ai_generated": false})));
        let mut sink = MemorySink::default();

        let result = run(&sapling(), "Test input", &env_with_key(), &transport, &mut sink).await;

        assert_eq!(result, InvocationResult::Success(json!({"is_ai_generated": false})));
        assert_eq!(result.render().text, "{\n  \"is_ai_generated\": false\n}");

        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].url, "https://api.sapling.ai/api/v1/aidetect");
        assert_eq!(
            calls[0].body,
            json!({"text": "Test input", "session_id": "cli_pipe_session"})
        );
        assert!(calls[0]
            .headers
            .contains(&("Authorization", "Bearer test_key".to_string())));

        let logged = sink.messages();
        assert_eq!(logged[0], (LogLevel::Info, "Received input: Test input"));
        assert_eq!(logged[1].0, LogLevel::Info);
        assert!(logged[1].1.starts_with("Sapling API response: {"));
    }

    #[tokio::test]
    async fn test_blank_input_makes_no_call() {
        for input in ["", "   ", "\n\t \r\n"] {
            let transport = RecordingTransport::new(Reply::Json(json!({})));
            let mut sink = MemorySink::default();

            let result = run(&sapling(), input, &env_with_key(), &transport, &mut sink).await;

            assert_eq!(result.failure_kind(), Some(FailureKind::EmptyInput));
            assert!(transport.calls().is_empty());
            assert_eq!(sink.messages(), vec![(LogLevel::Warning, "No input received")]);
            let out = result.render();
            assert_eq!(out.text, "No input received");
            assert_eq!(out.exit_code, 1);
        }
    }

    #[tokio::test]
    async fn test_missing_credential_makes_no_call() {
        let transport = RecordingTransport::new(Reply::Json(json!({})));
        let mut sink = MemorySink::default();

        let result = run(&sapling(), "Test input", &HashMap::<String, String>::new(), &transport, &mut sink).await;

        match &result {
            InvocationResult::Failure { message, kind } => {
                assert_eq!(*kind, FailureKind::MissingCredential);
                assert!(message.contains("SAPLING_API_KEY environment variable not set"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(transport.calls().is_empty());
        assert_eq!(result.render().exit_code, 0);
        assert_eq!(
            sink.messages().last().copied(),
            Some((LogLevel::Error, "SAPLING_API_KEY environment variable not set"))
        );
    }

    #[tokio::test]
    async fn test_empty_credential_counts_as_missing() {
        let transport = RecordingTransport::new(Reply::Json(json!({})));
        let env: HashMap<String, String> = [("SAPLING_API_KEY".to_string(), String::new())].into();

        let result = run(&sapling(), "Test input", &env, &transport, &mut MemorySink::default()).await;

        assert_eq!(result.failure_kind(), Some(FailureKind::MissingCredential));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_status_error_is_reported_on_stdout() {
        let transport = RecordingTransport::new(Reply::Status(500));
        let mut sink = MemorySink::default();

        let result = run(&sapling(), "Test input", &env_with_key(), &transport, &mut sink).await;

        assert_eq!(result.failure_kind(), Some(FailureKind::HttpStatusError));
        let out = result.render();
        assert!(out.text.starts_with("API response error: 500"));
        assert_eq!(out.exit_code, 0);
        assert_eq!(transport.calls().len(), 1);
        assert_eq!(sink.messages().last().unwrap().0, LogLevel::Error);
    }

    #[tokio::test]
    async fn test_unexpected_error_passes_through() {
        let transport = RecordingTransport::new(Reply::Unexpected("response is not valid JSON"));

        let result = run(
            &sapling(),
            "Test input",
            &env_with_key(),
            &transport,
            &mut MemorySink::default(),
        )
        .await;

        assert_eq!(
            result,
            InvocationResult::Failure {
                message: "Unexpected error: response is not valid JSON".to_string(),
                kind: FailureKind::UnexpectedError,
            }
        );
    }

    #[tokio::test]
    async fn test_input_is_trimmed_before_sending() {
        let transport = RecordingTransport::new(Reply::Json(json!({"ok": true})));
        let provider = ProviderKind::GptZero.config(&PipeConfig::default(), &HashMap::<String, String>::new());
        let env: HashMap<String, String> = [("GPTZERO_API_KEY".to_string(), "k".to_string())].into();

        run(&provider, "  padded text \n", &env, &transport, &mut MemorySink::default()).await;

        assert_eq!(
            transport.calls()[0].body,
            json!({"document": "padded text", "multilingual": false})
        );
    }
}
