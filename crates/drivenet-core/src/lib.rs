//! Core of a driving simulation driven by small feed-forward networks: each
//! vehicle reads a fan of range probes, threads the proximity offsets through
//! its network, and turns the four binary outputs into control signals. The
//! best driver's network can be serialized, cloned, and mutated to seed the
//! next generation; uniform random mutation is the only learning mechanism.

pub mod config;
pub mod control;
pub mod course;
pub mod geom;
pub mod network;
pub mod obstacle;
pub mod sensor;
pub mod vehicle;
pub mod world;

pub use config::{SimConfig, SimConfigError};
pub use control::ControlState;
pub use network::{FeedForwardNetwork, NetworkDescriptor, NetworkError};
pub use sensor::RangeSensor;
pub use vehicle::Vehicle;
pub use world::World;
