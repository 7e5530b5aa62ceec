//! One-shot invocation runner used by the handler binaries
//!
//! Reads one trigger event from stdin, dispatches it, and writes the response
//! payload to stdout. Exit code 0 means success or skip; 1 means an error was
//! re-signalled and the invoking runtime owns retry.

use crate::context::InvocationContext;
use crate::dispatcher::{ArtifactPipeline, Dispatcher};
use crate::error::{codes, PipelineError, Result};
use crate::event::{decode_event, parse_event};
use crate::response::HandlerResponse;
use serde_json::Value;
use std::process::ExitCode;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::error;

/// Env var carrying the runtime-supplied correlation id
pub const REQUEST_ID_VAR: &str = "INVOCATION_REQUEST_ID";

/// Build the invocation context, taking the correlation id from the
/// environment when the runtime supplies one
pub fn context_from_env(consumer: &'static str) -> InvocationContext {
    match std::env::var(REQUEST_ID_VAR) {
        Ok(id) if !id.trim().is_empty() => InvocationContext::with_request_id(consumer, id.trim()),
        _ => InvocationContext::new(consumer),
    }
}

/// Handle the event on stdin and report the outcome
pub async fn run_once<P: ArtifactPipeline>(
    dispatcher: &Dispatcher<P>,
    ctx: &InvocationContext,
) -> ExitCode {
    let event = match read_event().await.and_then(|raw| parse_event(&raw)) {
        Ok(event) => event,
        Err(e) => return report_failure(&e, None).await,
    };

    match dispatcher.handle(&event, ctx).await {
        Ok(response) => {
            emit(&response).await;
            ExitCode::SUCCESS
        }
        Err(e) => report_failure(&e, business_key(&event).as_deref()).await,
    }
}

/// Print an error payload and return the failure exit code
pub async fn report_failure(err: &PipelineError, business_key: Option<&str>) -> ExitCode {
    error!(
        error_type = err.kind().as_str(),
        code = err.code(),
        business_key,
        error = %err,
        "Invocation failed"
    );
    emit(&HandlerResponse::from_error(err, business_key)).await;
    ExitCode::FAILURE
}

/// Key of the source object, when the event decodes at all
fn business_key(event: &Value) -> Option<String> {
    decode_event(event).ok().map(|(source, _)| source.key)
}

async fn read_event() -> Result<Vec<u8>> {
    let mut raw = Vec::new();
    tokio::io::stdin().read_to_end(&mut raw).await.map_err(|e| {
        PipelineError::invalid_input(
            codes::INVALID_EVENT_JSON,
            format!("Failed to read event from stdin: {e}"),
        )
    })?;
    Ok(raw)
}

async fn emit(response: &HandlerResponse) {
    let mut payload = match serde_json::to_vec(response) {
        Ok(payload) => payload,
        Err(e) => {
            error!(error = %e, "Failed to serialize response");
            return;
        }
    };
    payload.push(b'\n');

    let mut stdout = tokio::io::stdout();
    if let Err(e) = stdout.write_all(&payload).await {
        error!(error = %e, "Failed to write response");
        return;
    }
    if let Err(e) = stdout.flush().await {
        error!(error = %e, "Failed to flush response");
    }
}
