//! ---
//! ah_section: "11-simulation"
//! ah_subsection: "module"
//! ah_type: "source"
//! ah_scope: "code"
//! ah_description: "Simulation runtime helpers and deployment fleet."
//! ah_version: "v0.0.0-prealpha"
//! ah_owner: "tbd"
//! ---
//! Stand-ins for the outside world: a fleet of deploy agents, a deployment
//! trigger that invents outcomes, and a dataset mutator that injects anomalies.

pub mod fleet;
pub mod mutator;
pub mod trigger;

pub use fleet::{FleetSimulator, FleetStats, FLEET_HEADERS};
pub use mutator::AnomalyInjector;
pub use trigger::SimulatedDeployment;
