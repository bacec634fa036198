/// An air conditioner.
pub mod ac;
/// A fan.
pub mod fan;
/// A light.
pub mod light;
