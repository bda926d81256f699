pub use cosmogen_core::{ExpansionState, ParameterSet, Result, SimError, ThermalState};
pub mod config {
    pub use cosmogen_core::config::*;
}
pub mod error {
    pub use cosmogen_core::error::*;
}
pub mod friedmann {
    pub use cosmogen_core::friedmann::*;
}
pub mod thermo {
    pub use cosmogen_core::thermo::*;
}
pub mod nucleo {
    pub use cosmogen_core::nucleo::*;
}
pub mod grid {
    pub use cosmogen_core::grid::*;
}
pub mod poisson {
    pub use cosmogen_core::poisson::*;
}
pub mod metrics {
    pub use cosmogen_core::metrics::*;
}
pub mod state {
    pub use cosmogen_data::*;
}
pub mod io {
    pub use cosmogen_io::*;
}

pub mod universe;
