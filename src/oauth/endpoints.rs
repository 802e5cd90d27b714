//! OAuth provider endpoint constants.

/// Authorization page path.
pub const AUTHORIZE_PATH: &str = "/oauth2/request_auth";
/// Token endpoint path (code and refresh grants).
pub const TOKEN_PATH: &str = "/oauth2/get_token";
/// OpenID userinfo path.
pub const USERINFO_PATH: &str = "/openid/v1/userinfo";
/// Application-scoped current-user path.
pub const APP_USER_PATH: &str = "/fantasy/v2/users;use_login=1";

/// Full authorization page URL.
pub const AUTHORIZE_URL: &str = "https://api.login.yahoo.com/oauth2/request_auth";
/// Full token endpoint URL.
pub const TOKEN_URL: &str = "https://api.login.yahoo.com/oauth2/get_token";
/// Full userinfo URL.
pub const USERINFO_URL: &str = "https://api.login.yahoo.com/openid/v1/userinfo";
/// Full application-scoped current-user URL.
pub const APP_USER_URL: &str = "https://fantasysports.yahooapis.com/fantasy/v2/users;use_login=1";
