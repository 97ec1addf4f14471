pub mod health;
pub mod time;
pub mod websocket;

// Re-export all handlers for easy route registration
pub use health::{health_handler, metrics_handler, root_handler};
pub use time::{
    convert_time, get_current_time, get_time_in_zone, list_formats, list_timezones,
    missing_timezone,
};
pub use websocket::time_stream_handler;
