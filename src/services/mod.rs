pub mod registry;
pub mod saga;
