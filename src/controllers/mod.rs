//! Driver/Navigator session controllers and the commands they decode
//! (§4.5).

pub mod commands;
pub mod driver;
pub mod navigator;

pub use commands::{DriverCommand, DriverTool, NavigatorCommand, NavigatorTool};
pub use driver::{DriverBuffer, DriverController};
pub use navigator::NavigatorController;
