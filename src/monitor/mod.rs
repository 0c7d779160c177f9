//! Rare-event monitoring: closed-form probability model, telemetry storage,
//! statistical testing and real-time alerting.

pub mod event;
pub mod normal;
pub mod rare_event;
pub mod realtime;
pub mod store;
