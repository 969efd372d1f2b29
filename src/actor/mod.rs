//! Actor module - serialized execution contexts for stateful units.
//!
//! An actor is any `Send + 'static` value bound to an [`ActorContext`]:
//! composition over a capability, no base type to subclass. All access
//! to the actor's state goes through its context, which guarantees
//! one-at-a-time execution of posted work and of resumptions after
//! suspended operations.

mod context;
mod provider;

pub use context::{ActorContext, Deferred};
pub use provider::{retire_actor, spawn_actor, ActorProvider};
