//! Newline-delimited JSON: one request per input line, one response per
//! output line, in order. Blank lines and `#` comments are skipped.

use super::call::{invalid_request, render};
use crate::exit_codes::SUCCESS;
use agentpay_core::ops::{Request, Service};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

pub async fn run(service: &Service) -> anyhow::Result<i32> {
    let mut input = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let mut buf = Vec::new();
    let mut handled = 0usize;

    tracing::info!("serving requests from stdin");
    loop {
        buf.clear();
        if input.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        let body = match std::str::from_utf8(&buf) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                match serde_json::from_str::<Request>(line) {
                    Ok(request) => render(service.handle(request).await, false)?.0,
                    Err(e) => invalid_request(&e),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "request line is not valid UTF-8");
                invalid_request(&format!("request line is not valid UTF-8: {e}"))
            }
        };
        let mut out = serde_json::to_vec(&body)?;
        out.push(b'\n');
        stdout.write_all(&out).await?;
        stdout.flush().await?;
        handled += 1;
    }
    tracing::info!(handled, "input closed");
    Ok(SUCCESS)
}
