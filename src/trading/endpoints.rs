//! Trading API endpoint constants.

/// Base URL for the production trading API.
pub const TRADING_PROD_BASE_URL: &str = "https://api.elections.kalshi.com";

/// Base URL for the demo trading API.
pub const TRADING_DEMO_BASE_URL: &str = "https://demo-api.kalshi.co";

/// Public endpoints (no signature required).
pub mod public {
    /// Exchange status and trading hours.
    pub const EXCHANGE_STATUS: &str = "/trade-api/v2/exchange/status";
}

/// Portfolio endpoints (signature required).
pub mod portfolio {
    /// Account balance.
    pub const BALANCE: &str = "/trade-api/v2/portfolio/balance";

    /// Current positions.
    pub const POSITIONS: &str = "/trade-api/v2/portfolio/positions";

    /// Orders; POST to create, `/{order_id}` to cancel.
    pub const ORDERS: &str = "/trade-api/v2/portfolio/orders";

    /// Fill history.
    pub const FILLS: &str = "/trade-api/v2/portfolio/fills";
}
