//! Ongoing monitoring: vigilance management, the re-investigation
//! scheduler, lifecycle event intake and alert dispatch.

pub mod alerts;
pub mod lifecycle;
pub mod scheduler;
pub mod vigilance;

pub use alerts::{
    severity_for_signals, Alert, AlertDispatcher, AlertKind, AlertSeverity, DeliveryTracking,
    MemoryNotifier, Notifier,
};
pub use lifecycle::{LifecycleAction, LifecycleEvent, LifecycleEventKind, LifecycleHandler};
pub use scheduler::{MonitoringRunner, MonitoringScheduler};
pub use vigilance::{
    default_vigilance, effective_vigilance, MemoryMonitoringStore, MonitoringConfig,
    MonitoringStore,
};
