pub mod http_variables;
pub mod memory_variables;

pub use http_variables::HttpVariableStore;
pub use memory_variables::InMemoryVariableStore;
