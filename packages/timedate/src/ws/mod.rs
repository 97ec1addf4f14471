//! Time-streaming WebSocket sessions.
//!
//! Each upgraded connection runs one session made of two cooperating loops:
//!
//! - **broadcast**: on every tick, render the subscribed zone and push a
//!   `time_update` message
//! - **command**: read client frames and apply `subscribe` requests to the
//!   shared [`SubscriptionHandle`](subscription::SubscriptionHandle)
//!
//! Both loops watch the cancellation token owned by the session's
//! [`ConnectionLifecycle`](lifecycle::ConnectionLifecycle). Whichever side
//! fails first cancels it; the other exits at its next wait point.

pub mod lifecycle;
pub mod protocol;
pub mod session;
pub mod subscription;

pub use lifecycle::CloseReason;
pub use protocol::{ClientMessage, ServerMessage};
pub use session::{SessionContext, run_session};
