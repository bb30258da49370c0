// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{anyhow, Context, Result};
use clap::Args;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;

use crate::config::ChannelConfig;
use crate::crypto::aes_gcm::KeyLength;
use crate::crypto::ecdh::{generate_key_pair, Curve};
use crate::envelope::EnvelopeCipher;
use crate::negotiation::{ChannelContext, NegotiationSession};

/// Arguments for keygen command
#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Curve to generate on (secp256r1 or secp256k1)
    #[arg(long, default_value = "secp256r1")]
    pub curve: String,

    /// Also print the private scalar (hex)
    #[arg(long)]
    pub show_private: bool,
}

/// Arguments for check-config command
#[derive(Args, Debug)]
pub struct CheckConfigArgs {
    /// TOML file with a [negotiate] section (falls back to NEGOTIATE_* env vars)
    #[arg(long, env = "NEGOTIATE_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Arguments for demo command
#[derive(Args, Debug)]
pub struct DemoArgs {
    /// TOML file with a [negotiate] section (falls back to NEGOTIATE_* env vars)
    #[arg(long, env = "NEGOTIATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the configured key length (16, 24 or 32)
    #[arg(long)]
    pub key_length: Option<usize>,

    /// Message sent from requester to responder
    #[arg(long, default_value = "hello shoulder")]
    pub request_message: String,

    /// Message sent back from responder to requester
    #[arg(long, default_value = "hello server")]
    pub response_message: String,
}

/// Load configuration from a file or the environment, then validate it
pub fn load_config(path: Option<&PathBuf>) -> Result<ChannelConfig> {
    let config = match path {
        Some(path) => ChannelConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ChannelConfig::from_env().context("reading NEGOTIATE_* environment")?,
    };
    config.validate()?;
    Ok(config)
}

/// Generate an ephemeral key pair and print it
pub fn keygen(args: KeygenArgs) -> Result<()> {
    let curve: Curve = args.curve.parse()?;
    let pair = generate_key_pair(curve)?;

    println!("curve:      {}", curve);
    println!("public key: {}", hex::encode(pair.public_key()));
    if args.show_private {
        println!("private key: {}", hex::encode(&*pair.private_key_bytes()));
    }
    Ok(())
}

/// Load and validate configuration, printing the effective values
pub fn check_config(args: CheckConfigArgs) -> Result<()> {
    let config = load_config(args.config.as_ref())?;

    println!("✅ Configuration valid");
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

/// Run a handshake and one envelope exchange in each direction, in-process
pub async fn demo(args: DemoArgs) -> Result<()> {
    let mut config = load_config(args.config.as_ref())?;
    if let Some(len) = args.key_length {
        config.key_length = KeyLength::try_from(len)?;
    }

    let requester_ctx = ChannelContext::in_memory(config.clone())?;
    let responder_ctx = ChannelContext::in_memory(config)?;

    let mut requester = NegotiationSession::new(requester_ctx.clone());
    let mut responder = NegotiationSession::new(responder_ctx.clone());

    let request = requester.request(None)?;
    println!("→ request:  {}", request.to_json()?);
    let response = responder.respond(&request).await?;
    println!("← response: {}", response.to_json()?);
    requester.complete(&response).await?;

    let session_id = request.session_id().to_string();
    info!("Session {} established on both sides", session_id);

    let requester_cipher = EnvelopeCipher::new(requester_ctx);
    let responder_cipher = EnvelopeCipher::new(responder_ctx);

    let mut outbound = BTreeMap::new();
    outbound.insert("message".to_string(), args.request_message.into_bytes());
    let sealed = requester_cipher.seal(&session_id, &outbound).await?;
    print_headers("→", &sealed.headers.to_headers());
    let opened = responder_cipher.open(&sealed.headers, &sealed.fields).await?;
    println!(
        "responder read: {}",
        String::from_utf8_lossy(opened.get("message").ok_or_else(|| anyhow!("message field missing"))?)
    );

    let (ciphertext, headers) = responder_cipher
        .encrypt(&session_id, args.response_message.as_bytes())
        .await?;
    print_headers("←", &headers.to_headers());
    let reply = requester_cipher.decrypt(&headers, &ciphertext).await?;
    println!("requester read: {}", String::from_utf8_lossy(&reply));

    Ok(())
}

fn print_headers(direction: &str, headers: &[(&'static str, String)]) {
    for (name, value) in headers {
        println!("{} {}: {}", direction, name, value);
    }
}
