//! Authentication ticket lifecycle.
//!
//! State machine: Unauthenticated → Authenticating → Authenticated, back
//! to Unauthenticated on logout or a failed refresh. The ticket slot is
//! read-mostly: callers holding a valid ticket only take the read lock,
//! while expiry funnels everyone through a single-flight refresh guard so
//! exactly one login hits the server no matter how many requests observe
//! the expiry concurrently.

use chrono::{Duration, Utc};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, RwLock};

use async_trait::async_trait;

use crate::error::ProxmoxResult;
use crate::types::{AuthScheme, AuthState, Credentials, Ticket, TicketGrant};

/// Tickets are treated as expired this many seconds early, so a refresh
/// happens on our side of the window instead of racing the server clock.
const EXPIRY_SKEW_SECS: i64 = 30;

/// The login exchange, abstracted so the session manager can be driven by
/// the real transport in production and by stubs in tests.
#[async_trait]
pub trait TicketExchange: Send + Sync {
    async fn request_ticket(
        &self,
        credentials: &Credentials,
        scheme: &AuthScheme,
    ) -> ProxmoxResult<TicketGrant>;
}

/// Owns the one active ticket of a client instance.
#[derive(Debug)]
pub struct SessionManager {
    credentials: Credentials,
    scheme: AuthScheme,
    ticket_lifetime: Duration,
    ticket: RwLock<Option<Ticket>>,
    /// Single-flight guard: at most one login/refresh in flight.
    refresh: Mutex<()>,
    authenticating: AtomicBool,
}

impl SessionManager {
    pub fn new(credentials: Credentials, scheme: AuthScheme, ticket_lifetime_secs: i64) -> Self {
        Self {
            credentials,
            scheme,
            ticket_lifetime: Duration::seconds(ticket_lifetime_secs),
            ticket: RwLock::new(None),
            refresh: Mutex::new(()),
            authenticating: AtomicBool::new(false),
        }
    }

    /// Current state for UI collaborators. Never exposes the ticket.
    pub async fn auth_state(&self) -> AuthState {
        if self.authenticating.load(Ordering::Acquire) {
            return AuthState::Authenticating;
        }
        if matches!(self.credentials, Credentials::ApiToken { .. }) {
            return AuthState::Authenticated;
        }
        let slot = self.ticket.read().await;
        match slot.as_ref() {
            Some(t) if !t.expired_by(Duration::seconds(EXPIRY_SKEW_SECS)) => {
                AuthState::Authenticated
            }
            _ => AuthState::Unauthenticated,
        }
    }

    /// Explicit login with the stored credentials. Failures surface typed
    /// and are never retried automatically.
    pub async fn authenticate(&self, exchange: &dyn TicketExchange) -> ProxmoxResult<()> {
        if matches!(self.credentials, Credentials::ApiToken { .. }) {
            debug!("API token credentials are stateless; nothing to authenticate");
            return Ok(());
        }
        let _guard = self.refresh.lock().await;
        self.refresh_locked(exchange).await.map(|_| ())
    }

    /// Resolve the auth headers for one outgoing request.
    ///
    /// Valid ticket: headers straight from the read path. Expired or
    /// missing ticket: exactly one re-authentication attempt, shared with
    /// every concurrent caller; if it fails the request is never sent.
    pub async fn authorize(
        &self,
        exchange: &dyn TicketExchange,
        mutating: bool,
    ) -> ProxmoxResult<Vec<(String, String)>> {
        if matches!(self.credentials, Credentials::ApiToken { .. }) {
            return Ok(self.token_headers());
        }

        let skew = Duration::seconds(EXPIRY_SKEW_SECS);

        {
            let slot = self.ticket.read().await;
            if let Some(ticket) = slot.as_ref() {
                if !ticket.expired_by(skew) {
                    return Ok(self.ticket_headers(ticket, mutating));
                }
            }
        }

        // Whoever gets the guard performs the refresh; later arrivals
        // find the fresh ticket in the double-check and share it.
        let _guard = self.refresh.lock().await;
        {
            let slot = self.ticket.read().await;
            if let Some(ticket) = slot.as_ref() {
                if !ticket.expired_by(skew) {
                    return Ok(self.ticket_headers(ticket, mutating));
                }
            }
        }

        let ticket = self.refresh_locked(exchange).await?;
        Ok(self.ticket_headers(&ticket, mutating))
    }

    /// Drop the ticket and return to Unauthenticated.
    pub async fn logout(&self) {
        if self.ticket.write().await.take().is_some() {
            info!("session cleared; now unauthenticated");
        }
    }

    // Caller must hold the refresh guard. The stale ticket is dropped
    // before the exchange starts, so a cancelled attempt leaves the state
    // machine at Unauthenticated with the guard released.
    async fn refresh_locked(&self, exchange: &dyn TicketExchange) -> ProxmoxResult<Ticket> {
        *self.ticket.write().await = None;
        let _flight = AuthFlight::start(&self.authenticating);

        debug!("authenticating as {}", self.credentials.login_name());
        let grant = exchange
            .request_ticket(&self.credentials, &self.scheme)
            .await?;

        let now = Utc::now();
        let ticket = Ticket {
            ticket: grant.ticket,
            csrf_token: grant.csrf_token,
            username: if grant.username.is_empty() {
                self.credentials.login_name()
            } else {
                grant.username
            },
            issued_at: now,
            expires_at: now + self.ticket_lifetime,
        };

        info!(
            "authenticated as {} (ticket valid until {})",
            ticket.username, ticket.expires_at
        );
        *self.ticket.write().await = Some(ticket.clone());
        Ok(ticket)
    }

    fn ticket_headers(&self, ticket: &Ticket, mutating: bool) -> Vec<(String, String)> {
        let mut headers = vec![(
            "Cookie".to_string(),
            format!("{}={}", self.scheme.cookie_name, ticket.ticket),
        )];
        if mutating {
            match &ticket.csrf_token {
                Some(csrf) => headers.push((self.scheme.csrf_header.clone(), csrf.clone())),
                None => warn!("mutating request without a CSRF token; the server may refuse it"),
            }
        }
        headers
    }

    fn token_headers(&self) -> Vec<(String, String)> {
        match &self.credentials {
            Credentials::ApiToken {
                user,
                realm,
                token_id,
                secret,
            } => vec![(
                self.scheme.token_header.clone(),
                format!(
                    "{}={}@{}!{}={}",
                    self.scheme.token_prefix, user, realm, token_id, secret
                ),
            )],
            Credentials::Password { .. } => Vec::new(),
        }
    }
}

/// Keeps `auth_state` reporting Authenticating for exactly as long as an
/// exchange is in flight, including when the future is cancelled.
struct AuthFlight<'a>(&'a AtomicBool);

impl<'a> AuthFlight<'a> {
    fn start(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for AuthFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
