pub mod interface;
pub mod simu;

// Re-export the modules here for easy import elsewhere.
pub use interface::*;
pub use simu::SimulatedRadio;
