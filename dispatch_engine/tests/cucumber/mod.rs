mod dispatch_world;
mod setups;
mod steps;

pub use dispatch_world::DispatchWorld;
