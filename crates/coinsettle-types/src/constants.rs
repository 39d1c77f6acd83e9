//! System-wide constants for the CoinSettle settlement engine.

/// Default display precision for fiat currencies (decimal places).
pub const DEFAULT_FIAT_PRECISION: u32 = 2;

/// Hours before an unfunded order (external-transfer path) expires.
/// The engine stamps `expires_at`; a separate sweeper enforces it.
pub const ORDER_EXPIRY_HOURS: i64 = 24;

/// Default rolling spending-limit window (hours).
pub const DEFAULT_LIMIT_WINDOW_HOURS: i64 = 24;

/// Idempotency cache size (number of create-order keys to remember).
pub const IDEMPOTENCY_CACHE_SIZE: usize = 500_000;

/// Default page size for order listings.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Maximum page size for order listings.
pub const MAX_PAGE_SIZE: usize = 500;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "CoinSettle";
