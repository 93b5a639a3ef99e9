pub mod event;
pub mod path;

pub use event::{
    classify, DocumentCreatedEvent, DocumentEventData, FirestoreDocument, FirestoreValue,
    TokenRecord, TriggerDecision, TriggerEnvelope, DOCUMENT_CREATED_EVENT_TYPE,
};
pub use path::DocumentPattern;
