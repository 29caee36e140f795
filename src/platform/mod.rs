// Bindings to native pose models
pub mod pose;
