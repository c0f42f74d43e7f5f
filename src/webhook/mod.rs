pub mod event;
pub mod signature;

pub use event::{EntityKind, EventAction, WebhookEvent};
pub use signature::{SignatureError, SIGNATURE_HEADER};
