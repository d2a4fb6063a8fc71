//! cachewirectl: Command-line interface for cache topics.
//!
//! Publishes values to topics and prints topic subscriptions from the
//! terminal.

mod commands;

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use cachewire::{Credential, TopicClient, TopicConfig};
use clap::{Parser, Subcommand};

/// Command-line interface for cache topics.
#[derive(Parser, Debug)]
#[command(name = "cachewirectl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Auth token (structured or three-segment)
    #[arg(long, env = "CACHEWIRE_AUTH_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Read the auth token from this environment variable instead
    #[arg(long)]
    token_env: Option<String>,

    /// Override the cache endpoint derived from the token
    #[arg(long, env = "CACHEWIRE_CACHE_ENDPOINT")]
    cache_endpoint: Option<String>,

    /// Override the control endpoint derived from the token
    #[arg(long, env = "CACHEWIRE_CONTROL_ENDPOINT")]
    control_endpoint: Option<String>,

    /// Port of the cache endpoint
    #[arg(long, default_value_t = 443)]
    port: u16,

    /// Connect without TLS
    #[arg(long)]
    plaintext: bool,

    /// Path to a TLS CA certificate (defaults to the platform roots)
    #[arg(long, env = "CACHEWIRE_TLS_CA")]
    tls_ca: Option<PathBuf>,

    /// TLS domain name override
    #[arg(long, env = "CACHEWIRE_TLS_DOMAIN")]
    tls_domain: Option<String>,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Publish a value to a topic
    Publish {
        /// Cache name
        cache: String,
        /// Topic name
        topic: String,
        /// Text payload (or use --file, or pipe to stdin)
        payload: Option<String>,
        /// Read a binary payload from file
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Subscribe to a topic and print items
    Subscribe {
        /// Cache name
        cache: String,
        /// Topic name
        topic: String,
        /// Resume after this topic sequence number
        #[arg(long, default_value_t = 0)]
        resume_at: u64,
        /// Maximum number of items to receive (0 = unlimited)
        #[arg(short, long, default_value_t = 0)]
        count: u64,
    },
}

impl Cli {
    fn credential(&self) -> Result<Credential> {
        let mut credential = match (&self.token_env, &self.token) {
            (Some(var), _) => Credential::from_env_var(var)?,
            (None, Some(token)) => Credential::from_token(token)?,
            (None, None) => {
                return Err(anyhow!(
                    "an auth token is required (--token, --token-env or CACHEWIRE_AUTH_TOKEN)"
                ))
            }
        };

        if let Some(endpoint) = &self.cache_endpoint {
            credential = credential.with_cache_endpoint(endpoint.clone())?;
        }
        if let Some(endpoint) = &self.control_endpoint {
            credential = credential.with_control_endpoint(endpoint.clone())?;
        }
        Ok(credential)
    }

    fn config(&self) -> TopicConfig {
        TopicConfig {
            use_tls: !self.plaintext,
            port: self.port,
            tls_ca: self.tls_ca.clone(),
            tls_domain: self.tls_domain.clone(),
            ..TopicConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for debug output
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let client = TopicClient::builder(cli.credential()?)
        .config(cli.config())
        .build()?;

    let result = match cli.command {
        Commands::Publish {
            cache,
            topic,
            payload,
            file,
        } => commands::publish::run(&client, &cache, &topic, payload, file, cli.output).await,
        Commands::Subscribe {
            cache,
            topic,
            resume_at,
            count,
        } => {
            commands::subscribe::run(&client, &cache, &topic, resume_at, count, cli.output).await
        }
    };

    client.close();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_args_parse() {
        let cli = Cli::try_parse_from([
            "cachewirectl",
            "--token",
            "abc.def.ghi",
            "publish",
            "cache1",
            "topicA",
            "hello",
        ])
        .expect("parse should succeed");

        assert_eq!(cli.output, OutputFormat::Text);
        assert_eq!(cli.port, 443);
        match cli.command {
            Commands::Publish {
                cache,
                topic,
                payload,
                file,
            } => {
                assert_eq!(cache, "cache1");
                assert_eq!(topic, "topicA");
                assert_eq!(payload.as_deref(), Some("hello"));
                assert!(file.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn subscribe_flags_parse() {
        let cli = Cli::try_parse_from([
            "cachewirectl",
            "--plaintext",
            "--port",
            "50051",
            "-o",
            "json",
            "subscribe",
            "cache1",
            "topicA",
            "--resume-at",
            "42",
            "-c",
            "3",
        ])
        .expect("parse should succeed");

        assert!(cli.plaintext);
        assert_eq!(cli.output, OutputFormat::Json);

        let config = cli.config();
        assert!(!config.use_tls);
        assert_eq!(config.port, 50051);

        match cli.command {
            Commands::Subscribe {
                resume_at, count, ..
            } => {
                assert_eq!(resume_at, 42);
                assert_eq!(count, 3);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    // Claims: {"c":"cache.example.com","cp":"control.example.com"}
    const SEGMENT_TOKEN: &str = concat!(
        "eyJhbGciOiJIUzI1NiJ9.",
        "eyJjIjoiY2FjaGUuZXhhbXBsZS5jb20iLCJjcCI6ImNvbnRyb2wuZXhhbXBsZS5jb20ifQ",
        ".c2ln"
    );

    #[test]
    fn endpoint_overrides_apply() {
        let cli = Cli::try_parse_from([
            "cachewirectl",
            "--token",
            SEGMENT_TOKEN,
            "--cache-endpoint",
            "localhost",
            "subscribe",
            "cache1",
            "topicA",
        ])
        .expect("parse should succeed");

        let credential = cli.credential().expect("credential");
        assert_eq!(credential.cache_endpoint(), "localhost");
        assert_eq!(credential.control_endpoint(), "control.example.com");
    }

    #[test]
    fn unknown_output_format_rejected() {
        let err = "yaml".parse::<OutputFormat>().unwrap_err();
        assert!(err.contains("yaml"));
    }
}
