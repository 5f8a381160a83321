//! Network URL constants for the notification service.

/// Default REST API base URL.
pub const DEFAULT_API_URL: &str = "https://api.gigharbor.gg";

/// Default push gateway base URL. The transport appends the notification
/// path and `userId` query parameter.
pub const DEFAULT_GATEWAY_URL: &str = "wss://push.gigharbor.gg";

/// Path on the gateway that serves per-user notification streams.
pub const NOTIFICATIONS_WS_PATH: &str = "/ws/notifications";
