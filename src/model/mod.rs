pub mod contrast;
pub mod design;

pub use design::DesignError;
