// Application Layer - Scheduling use cases

pub mod admission;
pub mod busy;
pub mod reservation;
pub mod rotation;
pub mod worker;

// Re-exports
pub use admission::{Admission, AdmissionControl};
pub use busy::{BusyQueueObserver, BusyQueues};
pub use reservation::{
    build_reserver, JobReserver, OrderedReserver, ReservationPorts, RoundRobinReserver,
};
pub use rotation::RotationState;
pub use worker::{stop_channel, StopHandle, StopSignal, Worker};
