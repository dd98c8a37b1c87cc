pub mod error;
pub mod event_bus_service;
pub mod run_mode;

pub use event_bus_service::{EmitOutcome, EventBusService, TransactionalEventBus};
pub use run_mode::RunMode;
