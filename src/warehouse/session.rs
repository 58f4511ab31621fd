use crate::clock::Clock;
use crate::error::FetchError;
use crate::query::table::Table;
use crate::warehouse::auth::{Authenticator, Identity, Session};
use crate::warehouse::{Statement, Warehouse};
use std::sync::Arc;

/// Gates a warehouse behind an authenticated session.
///
/// Call [`WarehouseSession::authenticate`] at startup to log in before any
/// request arrives; otherwise the session is opened before the first
/// statement. When it expires, renewable methods re-authenticate silently;
/// interactive sessions fail the current statement and prompt again on the
/// next one.
pub struct WarehouseSession<W> {
    warehouse: W,
    authenticator: Box<dyn Authenticator>,
    identity: Identity,
    clock: Arc<dyn Clock>,
    session: Option<Session>,
}

impl<W: Warehouse> WarehouseSession<W> {
    pub fn new(
        warehouse: W,
        authenticator: Box<dyn Authenticator>,
        identity: Identity,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            warehouse,
            authenticator,
            identity,
            clock,
            session: None,
        }
    }

    /// The current session, if one has been established and not yet dropped.
    pub const fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Establish the session now rather than on the first statement.
    /// A no-op while a live session exists.
    pub fn authenticate(&mut self) -> Result<(), FetchError> {
        self.ensure_session()
    }

    fn ensure_session(&mut self) -> Result<(), FetchError> {
        let now = self.clock.now();
        if let Some(current) = self.session.take() {
            if !current.is_expired(now) {
                self.session = Some(current);
                return Ok(());
            }
            if !current.method.can_renew_unattended() {
                tracing::warn!(
                    session_id = %current.id,
                    user = %current.user,
                    "Interactive warehouse session expired"
                );
                return Err(FetchError::Connection(
                    "warehouse session expired; re-authenticate".to_string(),
                ));
            }
            tracing::info!(session_id = %current.id, "Renewing expired warehouse session");
        }

        let session = self.authenticator.authenticate(&self.identity, now)?;
        tracing::info!(
            session_id = %session.id,
            account = %self.identity.account,
            user = %session.user,
            warehouse = %self.identity.warehouse,
            expires_at = %session.expires_at,
            "Warehouse session established"
        );
        self.session = Some(session);
        Ok(())
    }
}

impl<W: Warehouse> Warehouse for WarehouseSession<W> {
    fn execute(&mut self, statement: &Statement) -> Result<Table, FetchError> {
        self.ensure_session()?;
        self.warehouse.execute(statement)
    }
}
