//! Domain models shared by the feed and crawler services

mod aircraft;
mod flight;
mod position;
mod position_report;

pub use aircraft::AircraftRecord;
pub use flight::Flight;
pub use position::Position;
pub use position_report::{AircraftCategory, PositionReport};
