//! Authorization gate for export requests
//!
//! Checks, in order and short-circuiting:
//! 1. the request is addressed to this exporter (otherwise a silent no-op),
//! 2. the anti-forgery token is valid for the scope `export_<id>`,
//! 3. the caller holds the exporter's permission.
//!
//! Both denials are fatal for the whole request and happen before any record
//! is read.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::error::AuthError;
use crate::request::ExportRequest;

pub mod token;

pub use token::{TokenAge, TokenAuthority};

/// The authenticated administrator behind a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Caller {
    pub user_id: u64,
    /// Session identifier tokens are bound to.
    pub session: String,
    pub capabilities: BTreeSet<String>,
}

impl Caller {
    pub fn new(user_id: u64, session: impl Into<String>) -> Self {
        Self {
            user_id,
            session: session.into(),
            capabilities: BTreeSet::new(),
        }
    }

    /// A caller with no identity and no permissions.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.insert(capability.into());
        self
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities
            .extend(capabilities.into_iter().map(Into::into));
        self
    }

    pub fn can(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }
}

/// Outcome of a gate check that did not deny.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Request is for this exporter and may proceed.
    Granted,
    /// Request is not for this exporter; nothing to do.
    NotAddressed,
}

/// Token scope for an exporter id.
pub fn token_scope(exporter_id: &str) -> String {
    format!("export_{exporter_id}")
}

/// Verifies tokens and permissions for one exporter at a time.
#[derive(Debug, Clone)]
pub struct AuthorizationGate {
    tokens: TokenAuthority,
}

impl AuthorizationGate {
    pub fn new(tokens: TokenAuthority) -> Self {
        Self { tokens }
    }

    /// Issue the token a trigger link for `exporter_id` must carry.
    pub fn issue_token(&self, caller: &Caller, exporter_id: &str, now_secs: u64) -> String {
        self.tokens.issue(caller, &token_scope(exporter_id), now_secs)
    }

    /// Run the gate for one exporter
    ///
    /// # Arguments
    /// * `request` - Inbound request
    /// * `exporter_id` - Id of the exporter being offered the request
    /// * `capability` - Permission that exporter requires
    /// * `now_secs` - Current Unix time, for the token window
    pub fn authorize(
        &self,
        request: &ExportRequest,
        exporter_id: &str,
        capability: &str,
        now_secs: u64,
    ) -> Result<GateDecision, AuthError> {
        if !request.is_addressed_to(exporter_id) {
            return Ok(GateDecision::NotAddressed);
        }

        let scope = token_scope(exporter_id);
        let token = request.token.as_deref().unwrap_or_default();
        match self.tokens.verify(token, &request.caller, &scope, now_secs) {
            Some(age) => debug!("Token accepted for {} ({:?} tick)", scope, age),
            None => {
                warn!(
                    "Rejected export '{}' for user {}: invalid token",
                    exporter_id, request.caller.user_id
                );
                return Err(AuthError::InvalidToken);
            }
        }

        if !request.caller.can(capability) {
            warn!(
                "Rejected export '{}' for user {}: missing '{}'",
                exporter_id, request.caller.user_id, capability
            );
            return Err(AuthError::Forbidden {
                capability: capability.to_string(),
            });
        }

        Ok(GateDecision::Granted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: u64 = 1_700_000_000;

    fn gate() -> AuthorizationGate {
        AuthorizationGate::new(TokenAuthority::new("secret", 86_400))
    }

    fn request_for(id: &str, token: &str, caller: Caller) -> ExportRequest {
        ExportRequest::from_query(
            &format!("action=export_csv&exporter_id={id}&_token={token}"),
            caller,
        )
    }

    #[test]
    fn test_granted() {
        let gate = gate();
        let caller = Caller::new(1, "s").with_capability("list_users");
        let token = gate.issue_token(&caller, "users", NOW);
        let request = request_for("users", &token, caller);
        assert_eq!(
            gate.authorize(&request, "users", "list_users", NOW),
            Ok(GateDecision::Granted)
        );
    }

    #[test]
    fn test_other_exporter_is_not_addressed() {
        let gate = gate();
        let request = request_for("orders", "garbage", Caller::anonymous());
        assert_eq!(
            gate.authorize(&request, "users", "list_users", NOW),
            Ok(GateDecision::NotAddressed)
        );
    }

    #[test]
    fn test_missing_token_denied() {
        let gate = gate();
        let caller = Caller::new(1, "s").with_capability("list_users");
        let request =
            ExportRequest::from_query("action=export_csv&exporter_id=users", caller);
        assert_eq!(
            gate.authorize(&request, "users", "list_users", NOW),
            Err(AuthError::InvalidToken)
        );
    }

    #[test]
    fn test_token_for_other_scope_denied() {
        let gate = gate();
        let caller = Caller::new(1, "s").with_capabilities(["list_users", "edit_shop_orders"]);
        let token = gate.issue_token(&caller, "orders", NOW);
        let request = request_for("users", &token, caller);
        assert_eq!(
            gate.authorize(&request, "users", "list_users", NOW),
            Err(AuthError::InvalidToken)
        );
    }

    #[test]
    fn test_token_checked_before_permission() {
        let gate = gate();
        let request = request_for("users", "bad", Caller::new(3, "s"));
        assert_eq!(
            gate.authorize(&request, "users", "list_users", NOW),
            Err(AuthError::InvalidToken)
        );
    }

    #[test]
    fn test_missing_permission_forbidden() {
        let gate = gate();
        let caller = Caller::new(3, "s").with_capability("read");
        let token = gate.issue_token(&caller, "users", NOW);
        let request = request_for("users", &token, caller);
        assert_eq!(
            gate.authorize(&request, "users", "list_users", NOW),
            Err(AuthError::Forbidden {
                capability: "list_users".to_string()
            })
        );
    }
}
