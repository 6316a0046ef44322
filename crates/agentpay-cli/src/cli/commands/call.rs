use super::super::args::CallArgs;
use crate::exit_codes::{DENIED, INVALID_INPUT, SUCCESS};
use agentpay_core::ops::{Request, Response, Service, WireError};
use anyhow::Context;
use serde_json::{json, Value};
use std::io::Read;
use std::path::Path;

pub async fn run(args: CallArgs, service: &Service) -> anyhow::Result<i32> {
    let raw = read_request(&args.request)?;
    let (body, code) = match serde_json::from_str::<Request>(&raw) {
        Ok(request) => render(service.handle(request).await, args.strict)?,
        Err(e) => (invalid_request(&e), INVALID_INPUT),
    };
    let out = if args.pretty {
        serde_json::to_string_pretty(&body)?
    } else {
        serde_json::to_string(&body)?
    };
    println!("{out}");
    Ok(code)
}

fn read_request(path: &Path) -> anyhow::Result<String> {
    if path.to_string_lossy() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read request from stdin")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read request: {}", path.display()))
    }
}

/// Response body and exit code for one handled request.
pub(crate) fn render(
    outcome: agentpay_core::Result<Response>,
    strict: bool,
) -> anyhow::Result<(Value, i32)> {
    match outcome {
        Ok(response) => {
            let code = if strict && is_refusal(&response) {
                DENIED
            } else {
                SUCCESS
            };
            Ok((serde_json::to_value(&response)?, code))
        }
        Err(e) => {
            tracing::warn!(code = e.code(), error = %e, "operation failed");
            Ok((json!({ "error": WireError::from(&e) }), e.exit_code()))
        }
    }
}

pub(crate) fn invalid_request(e: &dyn std::fmt::Display) -> Value {
    json!({
        "error": WireError {
            code: "E_INVALID_REQUEST".to_string(),
            message: e.to_string(),
            violations: Vec::new(),
        }
    })
}

fn is_refusal(response: &Response) -> bool {
    match response {
        Response::VerifyMandate(report) => !report.valid,
        Response::VerifyConsensus(report) => !report.is_valid,
        _ => false,
    }
}
