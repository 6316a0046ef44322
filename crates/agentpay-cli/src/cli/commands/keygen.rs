//! `agentpay keygen` - Generate an Ed25519 identity.

use super::super::args::KeygenArgs;
use crate::exit_codes::SUCCESS;
use agentpay_core::Identity;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;

#[derive(Debug, Serialize)]
struct KeyFile {
    did: String,
    public_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    private_key: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl KeyFile {
    fn from_identity(identity: &Identity) -> Self {
        Self {
            did: identity.did().to_string(),
            public_key: identity.public_key_hex(),
            private_key: identity.private_key_hex(),
            created_at: identity.created_at(),
        }
    }
}

pub fn run(args: KeygenArgs) -> Result<i32> {
    let identity = Identity::generate()?;
    let mut key_file = KeyFile::from_identity(&identity);

    let Some(path) = args.out else {
        println!("{}", serde_json::to_string_pretty(&key_file)?);
        return Ok(SUCCESS);
    };

    if path.exists() && !args.force {
        anyhow::bail!(
            "key file already exists: {} (use --force to overwrite)",
            path.display()
        );
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory: {}", parent.display()))?;
    }
    fs::write(&path, serde_json::to_string_pretty(&key_file)?)
        .with_context(|| format!("failed to write key file: {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("failed to restrict permissions: {}", path.display()))?;
    }
    tracing::info!(did = %key_file.did, path = %path.display(), "identity written");

    // Only the public half goes to stdout.
    key_file.private_key = None;
    println!("{}", serde_json::to_string_pretty(&key_file)?);
    Ok(SUCCESS)
}
