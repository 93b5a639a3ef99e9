pub mod cli;
pub mod config;
pub mod error;
pub mod http;  // HTTP 事件入口
pub mod infra;
pub mod logging;
pub mod push;
pub mod server;
pub mod service;
pub mod trigger;  // Firestore 触发事件解码

pub use config::NotifierConfig;
pub use error::{Result, ServerError};
pub use push::{DeliveryOutcome, MessageId, PushMessage, PushProvider};
pub use server::NotifierServer;
pub use service::WelcomeService;
pub use trigger::{DocumentCreatedEvent, TokenRecord};
