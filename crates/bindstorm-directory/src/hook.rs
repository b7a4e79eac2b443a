//! Bind-response hooks
//!
//! A hook runs after every bind response has been written and decides
//! whether the session survives. The default hook tears the session down
//! with a notice of disconnect regardless of the bind outcome.

use std::net::SocketAddr;

use tracing::trace;

use crate::service::BindOutcome;

/// Identifier of a client session, unique per server start.
pub type SessionId = u64;

/// What the registry knows about an open session.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub id: SessionId,
    pub peer: SocketAddr,
    /// DN of the last successful bind; `None` while anonymous.
    pub bound_dn: Option<String>,
}

/// Decision returned by a [`BindResponseHook`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    /// Leave the session open.
    Keep,
    /// Send a notice of disconnect, drop the session from the registry, close the transport.
    Disconnect,
}

/// Interceptor invoked after each bind response.
pub trait BindResponseHook: Send + Sync + 'static {
    fn on_bind_response(&self, session: &SessionInfo, outcome: &BindOutcome) -> SessionAction;
}

/// Disconnects every session after its bind attempt, successful or not.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisconnectAfterBind;

impl BindResponseHook for DisconnectAfterBind {
    fn on_bind_response(&self, session: &SessionInfo, outcome: &BindOutcome) -> SessionAction {
        trace!(
            session = session.id,
            success = outcome.is_success(),
            "Disconnecting session after bind"
        );
        SessionAction::Disconnect
    }
}

/// Leaves sessions open after bind.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepSession;

impl BindResponseHook for KeepSession {
    fn on_bind_response(&self, _session: &SessionInfo, _outcome: &BindOutcome) -> SessionAction {
        SessionAction::Keep
    }
}

impl<F> BindResponseHook for F
where
    F: Fn(&SessionInfo, &BindOutcome) -> SessionAction + Send + Sync + 'static,
{
    fn on_bind_response(&self, session: &SessionInfo, outcome: &BindOutcome) -> SessionAction {
        self(session, outcome)
    }
}
