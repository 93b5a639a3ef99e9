pub mod types;
pub mod provider;
pub mod delivery_ledger;

pub use types::{DeliveryOutcome, MessageId, Notification, PushMessage};
pub use provider::{FcmProvider, MockProvider, PushProvider};
pub use delivery_ledger::DeliveryLedger;
