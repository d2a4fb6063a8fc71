//! Publish command implementation.

use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use cachewire::{TopicClient, TopicValue};
use serde::Serialize;

use crate::OutputFormat;

#[derive(Serialize)]
struct PublishOutput {
    cache: String,
    topic: String,
    kind: &'static str,
    payload_size: usize,
}

pub async fn run(
    client: &TopicClient,
    cache: &str,
    topic: &str,
    payload: Option<String>,
    file: Option<PathBuf>,
    format: OutputFormat,
) -> Result<()> {
    let value = match (payload, file) {
        (Some(p), None) => TopicValue::Text(p),
        (None, Some(f)) => TopicValue::Binary(
            fs::read(&f).with_context(|| format!("failed to read file: {}", f.display()))?,
        ),
        (Some(_), Some(_)) => {
            return Err(anyhow!("cannot specify both payload and --file"));
        }
        (None, None) => {
            // Read from stdin; valid UTF-8 is published as text
            use std::io::{self, Read};
            let mut buffer = Vec::new();
            io::stdin()
                .read_to_end(&mut buffer)
                .context("failed to read from stdin")?;
            match String::from_utf8(buffer) {
                Ok(text) => TopicValue::Text(text),
                Err(err) => TopicValue::Binary(err.into_bytes()),
            }
        }
    };

    let kind = match value {
        TopicValue::Text(_) => "text",
        TopicValue::Binary(_) => "binary",
    };

    let result = client
        .publish(cache, topic, value)
        .await
        .context("publish failed")?;

    let output = PublishOutput {
        cache: cache.to_string(),
        topic: topic.to_string(),
        kind,
        payload_size: result.payload_size,
    };

    match format {
        OutputFormat::Text => {
            println!("Published {} value to '{}/{}'", output.kind, cache, topic);
            println!("  Payload size: {} bytes", output.payload_size);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
