pub mod model;
pub mod store;
pub mod validation;
pub mod window_gate;

pub use model::{AlertCandidate, AlertId, AlertKind, AlertRecord, AlertStatus, ExecutionPlan};
pub use store::{AlertStore, OracleCallRecord};
pub use validation::{ValidationConfig, ValidationContext, ValidationEngine, ValidationOutcome};
pub use window_gate::{AlertWindowGate, GateDecision, WindowGateConfig};
