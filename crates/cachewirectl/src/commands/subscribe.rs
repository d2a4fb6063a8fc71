//! Subscribe command implementation.

use anyhow::Result;
use cachewire::client::SubscriptionPhase;
use cachewire::{SubscriptionItem, TopicClient};
use serde::Serialize;
use tokio::signal;

use crate::OutputFormat;

#[derive(Serialize)]
struct ItemOutput<'a> {
    cache: &'a str,
    topic: &'a str,
    sequence: u64,
    kind: &'static str,
    payload: String,
    payload_bytes: usize,
}

#[derive(Serialize)]
struct SummaryOutput<'a> {
    cache: &'a str,
    topic: &'a str,
    received: u64,
    resume_at: u64,
}

pub async fn run(
    client: &TopicClient,
    cache: &str,
    topic: &str,
    resume_at: u64,
    count: u64,
    format: OutputFormat,
) -> Result<()> {
    let mut subscription = client.subscribe_from(cache, topic, resume_at).await;

    if format == OutputFormat::Text {
        eprintln!("Subscribed to '{}/{}' (resume at: {})", cache, topic, resume_at);
        eprintln!("Press Ctrl+C to stop...\n");
    }

    let mut received: u64 = 0;
    let mut failure = None;

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                if format == OutputFormat::Text {
                    eprintln!("\nReceived {} item(s)", received);
                }
                break;
            }
            item = subscription.next_item() => {
                let (kind, payload, payload_bytes) = match item {
                    Some(SubscriptionItem::Text(text)) => {
                        let len = text.len();
                        ("text", text, len)
                    }
                    Some(SubscriptionItem::Binary(bytes)) => {
                        ("binary", String::from_utf8_lossy(&bytes).into_owned(), bytes.len())
                    }
                    Some(SubscriptionItem::Error(err)) => {
                        eprintln!("Error: {}", err);
                        eprintln!("  {}", err.hint());
                        // Unrecognized frames are reported without ending the stream.
                        if subscription.phase() == SubscriptionPhase::Streaming {
                            continue;
                        }
                        failure = Some(err);
                        break;
                    }
                    None => {
                        if format == OutputFormat::Text {
                            eprintln!("Stream ended");
                        }
                        break;
                    }
                };

                received += 1;
                let sequence = subscription.resume_sequence_number();
                match format {
                    OutputFormat::Text => {
                        println!("[{}/{}] seq={}: {}", cache, topic, sequence, payload);
                    }
                    OutputFormat::Json => {
                        let output = ItemOutput {
                            cache,
                            topic,
                            sequence,
                            kind,
                            payload,
                            payload_bytes,
                        };
                        println!("{}", serde_json::to_string(&output)?);
                    }
                }

                if count > 0 && received >= count {
                    if format == OutputFormat::Text {
                        eprintln!("\nReached item limit ({})", count);
                    }
                    break;
                }
            }
        }
    }

    let resume_at = subscription.resume_sequence_number();
    subscription.close();

    match format {
        OutputFormat::Text => eprintln!("Resume with --resume-at {}", resume_at),
        OutputFormat::Json => {
            let summary = SummaryOutput {
                cache,
                topic,
                received,
                resume_at,
            };
            println!("{}", serde_json::to_string(&summary)?);
        }
    }

    match failure {
        Some(err) => Err(anyhow::Error::new(err).context("subscription terminated")),
        None => Ok(()),
    }
}
