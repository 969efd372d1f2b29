//! Instance-lifecycle collaborator.
//!
//! The core never constructs or destroys actor instances itself; a
//! host supplies an [`ActorProvider`] (a DI container adapter, a pool,
//! a factory function) and the core only speaks through the trait.

use super::ActorContext;
use crate::error::Result;

/// Constructs and releases actor instances.
///
/// `resolve` produces a fresh instance for a key and arguments;
/// `release` takes the instance back once its context has stopped.
pub trait ActorProvider: Send + Sync {
    /// Lookup key identifying the actor kind or registration.
    type Key;
    /// Construction arguments.
    type Args;
    /// The actor type produced.
    type Actor: Send + 'static;

    /// Construct an instance for the given key and arguments.
    fn resolve(&self, key: Self::Key, args: Self::Args) -> Result<Self::Actor>;

    /// Dispose of an instance the core is done with.
    fn release(&self, actor: Self::Actor);
}

/// Resolve an actor through the provider and bind it to a fresh context.
pub fn spawn_actor<P: ActorProvider>(
    provider: &P,
    key: P::Key,
    args: P::Args,
) -> Result<ActorContext<P::Actor>> {
    let actor = provider.resolve(key, args)?;
    Ok(ActorContext::new(actor))
}

/// Stop the context and hand the actor back to its provider.
///
/// No-op on the provider side if the actor was already reclaimed.
pub fn retire_actor<P: ActorProvider>(provider: &P, context: &ActorContext<P::Actor>) {
    if let Some(actor) = context.stop_and_take() {
        provider.release(actor);
    }
}
