//! crosslock-timelock
//!
//! Ties the two legs of a swap together. The coordinator refuses orders
//! whose timelocks would let the second funder strand the first, and
//! derives each leg's HTLC parameters from one agreed order. The swap
//! record tracks the orchestrator's view of the whole exchange.

pub mod coordinator;
pub mod swap;

pub use coordinator::{
    recommended_exclusive_period, validate_ordering, CoordinatorConfig, LegParameters, SwapOrder,
    SwapParty, TimelockCoordinator,
};
pub use swap::{CrossChainSwapState, SwapEvent, SwapStatus};
