pub mod variable_traits;

pub use variable_traits::VariableStore;
