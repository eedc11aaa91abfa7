use std::env;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    /// Maximum undelivered events buffered per connection before the oldest is dropped
    pub hub_queue_capacity: usize,
    /// How long a single delivery to a connection may take
    pub hub_delivery_timeout: Duration,
    /// Interval of SSE keep-alive comments
    pub sse_keep_alive: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            port: parse_var("PORT").unwrap_or(8080),
            hub_queue_capacity: parse_var("HUB_QUEUE_CAPACITY")
                .filter(|capacity| *capacity > 0)
                .unwrap_or(64),
            hub_delivery_timeout: Duration::from_millis(
                parse_var("HUB_DELIVERY_TIMEOUT_MS").unwrap_or(5000),
            ),
            sse_keep_alive: Duration::from_secs(parse_var("SSE_KEEP_ALIVE_SECS").unwrap_or(15)),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            hub_queue_capacity: 64,
            hub_delivery_timeout: Duration::from_millis(5000),
            sse_keep_alive: Duration::from_secs(15),
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}
