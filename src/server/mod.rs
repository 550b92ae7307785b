mod lifecycle;
mod relay_config;
mod relay_server;
mod tick_timer;

pub use relay_config::RelayConfig;
pub use relay_server::{RelayServer, RelayStats};
pub(crate) use tick_timer::TickTimer;

#[cfg(test)]
mod tests;
