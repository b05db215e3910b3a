// Service monitoring engine
//
// One MonitorWorker per configuration file. Each worker owns its
// notification state and watchdog timestamp; workers share nothing
// mutable with each other.

pub mod notifier;
pub mod retry;
pub mod worker;

pub use notifier::NotificationState;
pub use retry::RetryPolicy;
pub use worker::MonitorWorker;
