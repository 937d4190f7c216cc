//! Anonymous usage ping.
//!
//! One GET request to the collector, sent from a detached thread. The result
//! is ignored; failures are logged at debug level only.

use std::thread;
use std::time::Duration;

use ureq::AgentBuilder;

pub const COLLECTOR_URL: &str = "http://collector.singer.io/i";
const TIMEOUT: Duration = Duration::from_secs(10);

/// Query parameters of the ping.
pub fn usage_params() -> [(&'static str, &'static str); 5] {
    [
        ("e", "se"),
        ("aid", "singer"),
        ("se_ca", env!("CARGO_PKG_NAME")),
        ("se_ac", "open"),
        ("se_la", env!("CARGO_PKG_VERSION")),
    ]
}

/// Sends the ping in the background. The thread is never joined.
pub fn spawn() {
    let spawned = thread::Builder::new()
        .name("usage-stats".into())
        .spawn(send_usage_stats);
    if let Err(err) = spawned {
        tracing::debug!("could not start collection thread: {}", err);
    }
}

fn send_usage_stats() {
    let agent = AgentBuilder::new()
        .timeout_connect(TIMEOUT)
        .timeout_read(TIMEOUT)
        .build();
    let request = usage_params()
        .iter()
        .fold(agent.get(COLLECTOR_URL), |request, (key, value)| {
            request.query(key, value)
        });
    match request.call() {
        Ok(response) => tracing::debug!(status = response.status(), "usage stats sent"),
        Err(err) => tracing::debug!("collection request failed: {}", err),
    }
}
