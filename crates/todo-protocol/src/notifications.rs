//! Notification name constants.
//!
//! Notifications flow in both directions with no response expected. Server
//! notifications reach clients over the session's GET event stream.

/// All notification names, grouped by direction.
pub struct Notifications;

impl Notifications {
    // ── Client → Server ─────────────────────────────────────────────────
    pub const INITIALIZED: &str = "notifications/initialized";
    pub const CANCELLED: &str = "notifications/cancelled";

    // ── Server → Client ─────────────────────────────────────────────────
    pub const RESOURCES_UPDATED: &str = "notifications/resources/updated";
}
