//! Command-line options

use std::time::Duration;

use clap::Parser;

use chattime_engine::{BillingConfig, EngineConfig, HubConfig};

/// Interactive demo for the chattime metered chat billing engine.
///
/// One demo user is registered at startup; the prompt accepts both client
/// commands (topup, start, send, ...) and operator commands (pending,
/// approve, reply, ...). Type `help` at the prompt for the full list.
#[derive(Debug, Parser)]
#[command(name = "chattime", version, about)]
pub struct Cli {
    /// Billing period in seconds
    #[arg(long, default_value_t = 60)]
    pub billing_period_secs: u64,

    /// Amount deducted per billing period
    #[arg(long, default_value_t = 10)]
    pub billing_unit_cost: u64,

    /// Smallest accepted top-up amount
    #[arg(long, default_value_t = 10)]
    pub minimum_recharge: u64,

    /// Starting balance for the demo user
    #[arg(long, default_value_t = 30)]
    pub starting_balance: u64,

    /// Print events as JSON lines instead of debug text
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            billing: BillingConfig {
                billing_unit_cost: self.billing_unit_cost,
                billing_period: Duration::from_secs(self.billing_period_secs),
                minimum_recharge: self.minimum_recharge,
                initial_balance: self.starting_balance,
                ..BillingConfig::default()
            },
            hub: HubConfig::default(),
        }
    }
}
