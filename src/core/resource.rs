//! Connection resource and credential collaborator contracts.
//!
//! The scheduler never performs I/O itself. It observes a resource's
//! [`ResourceState`], drives it with `open`/`close`/`abort`, and learns about
//! terminal transitions through a completion handler.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::util::ids::{ResourceId, SubscriptionId};

/// Lifecycle of a connection resource.
///
/// Transitions are monotonic: `Init -> Open -> Closed` or `Init -> Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceState {
    /// Created, not yet opened.
    Init,
    /// Opened and occupying a capacity slot.
    Open,
    /// Terminal. Aborted, errored, or completed normally.
    Closed,
}

/// Completion callback installed on a resource.
///
/// Invoked exactly once when the resource leaves `Open` (or `Init`) for a
/// terminal state. The resource passes its own identity back explicitly.
pub type CompletionHandler = Arc<dyn Fn(ResourceId) + Send + Sync>;

/// Capability interface the scheduler requires from a connection resource.
///
/// `open`, `close` and `abort` are fire-and-forget: the state may move to
/// `Open` or `Closed` during the call or later. The completion notification
/// may be delivered from inside `close()`/`abort()`, and listeners may call
/// back into the scheduler from there. The scheduler never holds its lock
/// across these calls. `subscribe` and `unsubscribe` are called under it and
/// must not block on the scheduler.
pub trait ConnectionResource: Send + Sync + 'static {
    /// Stable identity of this resource.
    fn id(&self) -> ResourceId;
    /// Current lifecycle state.
    fn state(&self) -> ResourceState;
    /// Begin the connection using the supplied credentials.
    fn open(&self, credentials: Credentials);
    /// Request an orderly close.
    fn close(&self);
    /// Forcibly terminate the resource.
    fn abort(&self);
    /// Register a completion handler and return its token.
    fn subscribe(&self, handler: CompletionHandler) -> SubscriptionId;
    /// Remove a previously registered completion handler.
    fn unsubscribe(&self, subscription: SubscriptionId);
}

/// Opaque authorization value handed to [`ConnectionResource::open`].
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials(Option<String>);

impl Credentials {
    /// Credentials carrying a bearer token.
    #[must_use]
    pub fn token(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    /// Anonymous credentials.
    #[must_use]
    pub const fn none() -> Self {
        Self(None)
    }

    /// Token value, if any.
    #[must_use]
    pub fn as_token(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(_) => f.write_str("Credentials(<redacted>)"),
            None => f.write_str("Credentials(None)"),
        }
    }
}

/// Source of credentials, consulted immediately before every `open()`.
pub trait CredentialProvider<R: ?Sized>: Send + Sync + 'static {
    /// Credentials to open `resource` with.
    fn credentials_for(&self, resource: &R) -> Credentials;
}

impl<R, F> CredentialProvider<R> for F
where
    R: ?Sized,
    F: Fn(&R) -> Credentials + Send + Sync + 'static,
{
    fn credentials_for(&self, resource: &R) -> Credentials {
        self(resource)
    }
}

/// Hands out the same stored credentials for every resource.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    credentials: Credentials,
}

impl StaticCredentials {
    /// Hold `credentials` for all future opens.
    #[must_use]
    pub const fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

impl<R: ?Sized> CredentialProvider<R> for StaticCredentials {
    fn credentials_for(&self, _resource: &R) -> Credentials {
        self.credentials.clone()
    }
}
