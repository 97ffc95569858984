//! The `events` module defines the notifications request handlers send after
//! a successful mutation.
//!
//! Every event serializes to a JSON object with a `type` discriminator and a
//! type-specific body. Entity bodies (tasks, drafts, media, invitations) are
//! carried as opaque JSON: the hubs never look inside them.

pub mod payload;
pub use payload::{UserEvent, WorkspaceEvent};
