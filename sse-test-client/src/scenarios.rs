use anyhow::Result;
use colored::*;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::{Duration, Instant};

use crate::output::{print_event, TestResult};
use crate::sse_client::Connection;

pub async fn test_connection(sse: &mut Connection) -> Result<TestResult> {
    let start = Instant::now();

    println!("\n{}", "=== TEST: Connection ===".bright_cyan().bold());
    println!(
        "{} Checking that {} stays open...",
        "→".blue(),
        sse.label
    );

    // Nothing publishes during this window, so a timeout is the healthy outcome.
    match sse.next_event(Duration::from_secs(2)).await {
        Ok(Some(event)) => {
            print_event(&sse.label, &event);
            println!("{} Connection open (event already flowing)", "✓".green());
            Ok(TestResult::pass("connection", None, start.elapsed()))
        }
        Ok(None) => {
            println!("{} Connection open", "✓".green());
            Ok(TestResult::pass("connection", None, start.elapsed()))
        }
        Err(e) => {
            println!("{} Connection dropped: {}", "✗".red(), e);
            Ok(TestResult::fail("connection", e.to_string(), start.elapsed()))
        }
    }
}

pub async fn test_heartbeat(sse: &mut Connection, timeout: Duration) -> Result<TestResult> {
    let start = Instant::now();

    println!("\n{}", "=== TEST: Heartbeat ===".bright_cyan().bold());
    println!(
        "{} Waiting up to {:?} for a heartbeat comment...",
        "→".blue(),
        timeout
    );

    match sse.wait_for_heartbeat(timeout).await {
        Ok(at) => {
            let waited = at.duration_since(start);
            println!("{} Heartbeat received after {:?}", "✓".green(), waited);
            Ok(TestResult::pass(
                "heartbeat",
                Some(format!("first heartbeat after {:?}", waited)),
                start.elapsed(),
            ))
        }
        Err(e) => {
            println!("{} No heartbeat: {}", "✗".red(), e);
            Ok(TestResult::fail("heartbeat", e.to_string(), start.elapsed()))
        }
    }
}

/// Opens raw streams until the server answers 503, then checks that a slot
/// frees up once they are dropped.
pub async fn test_capacity(
    client: &reqwest::Client,
    base_url: &str,
    max_attempts: usize,
) -> Result<TestResult> {
    let start = Instant::now();
    let url = format!("{}/events", base_url);

    println!("\n{}", "=== TEST: Capacity Probe ===".bright_cyan().bold());
    println!(
        "{} Opening up to {} streams against {}...",
        "→".blue(),
        max_attempts,
        url
    );

    let mut open = Vec::new();
    let mut rejection = None;

    for _ in 0..max_attempts {
        let response = client.get(&url).send().await?;
        match response.status() {
            StatusCode::OK => open.push(response),
            StatusCode::SERVICE_UNAVAILABLE => {
                rejection = Some(response);
                break;
            }
            other => {
                let message = format!("Unexpected status {} after {} streams", other, open.len());
                println!("{} {}", "✗".red(), message);
                return Ok(TestResult::fail("capacity", message, start.elapsed()));
            }
        }
    }

    let accepted = open.len();
    let Some(rejection) = rejection else {
        let message = format!("No rejection after {} streams", accepted);
        println!("{} {}", "✗".red(), message);
        return Ok(TestResult::fail("capacity", message, start.elapsed()));
    };

    let retry_after = rejection
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    println!(
        "{} Rejected after {} streams (Retry-After: {})",
        "✓".green(),
        accepted,
        retry_after.as_deref().unwrap_or("none")
    );

    drop(open);
    // The server notices the closed sockets asynchronously.
    tokio::time::sleep(Duration::from_millis(500)).await;

    let reopened = client.get(&url).send().await?;
    if reopened.status() == StatusCode::OK {
        println!("{} Slot reclaimed after disconnect", "✓".green());
        Ok(TestResult::pass(
            "capacity",
            Some(format!("ceiling observed at {} subscribers", accepted)),
            start.elapsed(),
        ))
    } else {
        let message = format!("Reconnect refused with {}", reopened.status());
        println!("{} {}", "✗".red(), message);
        Ok(TestResult::fail("capacity", message, start.elapsed()))
    }
}

pub async fn test_health(client: &reqwest::Client, base_url: &str) -> Result<TestResult> {
    let start = Instant::now();

    println!("\n{}", "=== TEST: Health ===".bright_cyan().bold());

    let response = client.get(format!("{}/health", base_url)).send().await?;
    let status = response.status();
    let body: Value = response.json().await?;

    let reported = &body["data"];
    println!(
        "{} status={} subscribers={} max_subscribers={}",
        "→".blue(),
        reported["status"],
        reported["subscribers"],
        reported["max_subscribers"]
    );

    if status == StatusCode::OK && reported["status"] == "healthy" {
        println!("{} Server healthy", "✓".green());
        Ok(TestResult::pass("health", None, start.elapsed()))
    } else {
        let message = format!("HTTP {} with status {}", status, reported["status"]);
        println!("{} {}", "✗".red(), message);
        Ok(TestResult::fail("health", message, start.elapsed()))
    }
}

/// Prints every event until the duration elapses or the stream ends.
pub async fn listen(sse: &mut Connection, duration: Duration) -> Result<TestResult> {
    let start = Instant::now();
    let mut received = 0usize;

    println!("\n{}", "=== LISTEN ===".bright_cyan().bold());
    println!("{} Listening for {:?}...", "→".blue(), duration);

    loop {
        let remaining = duration.saturating_sub(start.elapsed());
        if remaining.is_zero() {
            break;
        }

        match sse.next_event(remaining).await {
            Ok(Some(event)) => {
                received += 1;
                print_event(&sse.label, &event);
            }
            Ok(None) => break,
            Err(e) => {
                return Ok(TestResult::fail("listen", e.to_string(), start.elapsed()));
            }
        }
    }

    Ok(TestResult::pass(
        "listen",
        Some(format!("{} events received", received)),
        start.elapsed(),
    ))
}
