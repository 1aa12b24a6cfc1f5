pub mod guard;
pub mod orchestrator;
pub mod reconcile;
pub mod resolver;
pub mod supply;
pub mod types;

pub use guard::{BalanceGuard, estimate_fee_reserve};
pub use orchestrator::Orchestrator;
pub use resolver::{PoolResolver, Resolution};
pub use types::{DonationPolicy, LiquidityReport, Phase, Reconciliation, Strategy, SupplySettings};
