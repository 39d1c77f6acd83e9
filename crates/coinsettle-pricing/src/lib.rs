//! # coinsettle-pricing
//!
//! Pricing plane: rate resolution, order pricing, and limit checks.
//!
//! ## Architecture
//!
//! Everything here is deterministic and side-effect-free:
//! 1. **RateResolver**: administrator override first, live market rate second
//! 2. **price()**: crypto amount × rate × fee fraction with half-up rounding
//! 3. **LimitGuard**: per-trade bounds + rolling-window tier cap
//!
//! ## Pricing Flow
//!
//! ```text
//! request → RateResolver.resolve() → price() → LimitGuard.check_bounds()
//!         → LimitGuard.check_cap() → frozen pricing snapshot
//! ```
//!
//! The orchestrator persists the snapshot; it is never recomputed after that.

pub mod calc;
pub mod limits;
pub mod rate;

pub use calc::{price, Quote};
pub use limits::LimitGuard;
pub use rate::{OverrideStore, RateResolver, RateSource};
