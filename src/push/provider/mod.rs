pub mod credentials;
pub mod fcm;
pub mod mock;
pub mod provider_trait;

pub use credentials::{AccessTokenSource, ServiceAccountKey};
pub use fcm::FcmProvider;
pub use mock::MockProvider;
pub use provider_trait::PushProvider;
