pub mod welcome_service;

pub use welcome_service::{WelcomeService, WelcomeTemplate, WELCOME_BODY, WELCOME_TITLE};
