use std::time::Duration;

/// One gwei in wei
pub const GWEI: u128 = 1_000_000_000;

/// Gas price assumed by offline commands
pub const DEFAULT_GAS_PRICE_WEI: u128 = 20 * GWEI;

/// Gas price ceiling of a rehearsal executor
pub const DEFAULT_MAX_GAS_PRICE_WEI: u128 = 50 * GWEI;

/// Fee of the rehearsal flash lender, Aave V3's premium
pub const DEFAULT_FLASH_LOAN_FEE_BPS: u32 = 5;

/// How long a submitted transaction may stay unmined
pub const CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(60);
