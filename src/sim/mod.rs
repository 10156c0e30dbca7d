pub mod charge_point;
/// Time sources for backfill and live mode.
pub mod clock;
pub mod fleet;
/// Periodic price publisher.
pub mod price_feed;
pub mod reliability;
/// Session sizing and meter progression.
pub mod session;
pub mod types;

pub use charge_point::{ChargePointEngine, Emitted, SessionSummary};
pub use fleet::Fleet;
pub use price_feed::PriceFeed;
