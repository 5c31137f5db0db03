//! Pipeline stages, in canonical order.

pub mod actuate;
pub mod bin_packing;
pub mod hardware;
pub mod historical;
pub mod input;
pub mod ranking;
pub mod rightsizing;
pub mod risk;
pub mod safety_gate;
pub mod signal;

pub use actuate::ActuatorStage;
pub use bin_packing::BinPacking;
pub use hardware::HardwareFilter;
pub use historical::HistoricalFilter;
pub use input::InputAdapter;
pub use ranking::CostRanking;
pub use rightsizing::RightsizingExpander;
pub use risk::RiskStage;
pub use safety_gate::SafetyGate;
pub use signal::SignalOverride;
