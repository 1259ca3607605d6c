// Core module - Transport contract and device facade
pub mod communication;
pub mod device;
