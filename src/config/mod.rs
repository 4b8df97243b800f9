//! Configuration for Audio3D ports and the manager

mod manager_desc;
mod port_parameters;

pub use manager_desc::{Audio3dDesc, BedGuardPolicy};
pub use port_parameters::{
    BufferMode, MIN_GRANULARITY, PortParameters, REQUIRED_NUM_BEDS, Rate,
};
