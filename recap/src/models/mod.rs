pub mod static_models;

pub use static_models::static_models_for;
