pub mod digest_service;
pub mod discord;
pub mod message_service;

pub use digest_service::{DigestCommandService, DigestInvocation};
pub use message_service::MessageService;
