use std::sync::Arc;

use chrono::{DateTime, Utc};
use shared::domain::{Vendor, VendorId};
use storage::{PersistedSession, SessionStore};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::{
    events::{ClientEvent, Toast},
    gate::Route,
    token::{token_expiry, TokenError},
};

const LOGOUT_MESSAGE: &str = "Logged out successfully";
const EXPIRED_MESSAGE: &str = "Your session has expired. Please sign in again.";
const INVALID_MESSAGE: &str = "Your saved session could not be read. Please sign in again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    Loading,
    Authenticated,
    Unauthenticated,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: Option<String>,
    pub vendor: Option<Vendor>,
    pub status: AuthStatus,
}

impl Session {
    pub fn loading() -> Self {
        Self {
            token: None,
            vendor: None,
            status: AuthStatus::Loading,
        }
    }

    pub fn signed_out() -> Self {
        Self {
            token: None,
            vendor: None,
            status: AuthStatus::Unauthenticated,
        }
    }

    fn authenticated(token: String, vendor: Vendor) -> Self {
        Self {
            token: Some(token),
            vendor: Some(vendor),
            status: AuthStatus::Authenticated,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.status == AuthStatus::Authenticated
    }

    pub fn is_loading(&self) -> bool {
        self.status == AuthStatus::Loading
    }

    pub fn vendor_id(&self) -> Option<&VendorId> {
        self.vendor.as_ref().map(|vendor| &vendor.id)
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("token rejected: {0}")]
    InvalidToken(#[from] TokenError),
    #[error("token already expired at {0}")]
    TokenExpired(DateTime<Utc>),
    #[error("no active session")]
    NotAuthenticated,
    #[error("failed to serialize vendor profile: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("session storage failed: {source}")]
    Storage { source: anyhow::Error },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutReason {
    UserRequested,
    Expired,
    Invalid,
}

impl LogoutReason {
    fn toast(self) -> Toast {
        match self {
            Self::UserRequested => Toast::success(LOGOUT_MESSAGE),
            Self::Expired => Toast::info(EXPIRED_MESSAGE),
            Self::Invalid => Toast::info(INVALID_MESSAGE),
        }
    }
}

pub struct AuthController {
    store: Arc<dyn SessionStore>,
    state: RwLock<Session>,
    // Serializes initialize, login, logout and expire.
    transition: Mutex<()>,
    events: broadcast::Sender<ClientEvent>,
}

impl AuthController {
    pub fn new(store: Arc<dyn SessionStore>, events: broadcast::Sender<ClientEvent>) -> Arc<Self> {
        Arc::new(Self {
            store,
            state: RwLock::new(Session::loading()),
            transition: Mutex::new(()),
            events,
        })
    }

    pub async fn session(&self) -> Session {
        self.state.read().await.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state.read().await.is_authenticated()
    }

    pub async fn bearer_token(&self) -> Option<String> {
        self.state.read().await.token.clone()
    }

    pub async fn vendor_id(&self) -> Option<VendorId> {
        self.state.read().await.vendor_id().cloned()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Restores the persisted session. Never fails: unreadable storage, a
    /// malformed token or a malformed vendor record all end Unauthenticated.
    /// Calling it again after the first completion is a no-op.
    pub async fn initialize(&self) -> Session {
        let _transition = self.transition.lock().await;
        if !self.state.read().await.is_loading() {
            return self.session().await;
        }

        let persisted = match self.store.load_session().await {
            Ok(persisted) => persisted,
            Err(err) => {
                warn!(error = %err, "failed to read persisted session; starting signed out");
                PersistedSession::default()
            }
        };

        match persisted {
            PersistedSession {
                token: Some(token),
                vendor_json: Some(vendor_json),
                ..
            } => match restore(&token, &vendor_json, Utc::now()) {
                Ok(vendor) => {
                    info!(vendor_id = %vendor.id, "restored persisted session");
                    self.set_state(Session::authenticated(token, vendor)).await;
                }
                Err(reason) => {
                    info!(?reason, "persisted session is not usable");
                    self.end_session(reason).await;
                }
            },
            persisted if persisted.is_empty() => {
                self.set_state(Session::signed_out()).await;
            }
            _ => {
                debug!("discarding partial persisted session");
                self.clear_store().await;
                self.set_state(Session::signed_out()).await;
            }
        }

        self.session().await
    }

    /// Persists the credentials and enters `Authenticated`. A token that is
    /// unreadable or already expired is refused before anything is written.
    pub async fn login(&self, token: String, vendor: Vendor) -> Result<Session, SessionError> {
        let expires_at = token_expiry(&token)?;
        if expires_at <= Utc::now() {
            return Err(SessionError::TokenExpired(expires_at));
        }

        let vendor_json = serde_json::to_string(&vendor)?;
        let _transition = self.transition.lock().await;
        if let Err(source) = self
            .store
            .save_session(&token, &vendor_json, vendor.id.as_str())
            .await
        {
            warn!(error = %source, "failed to persist session on login");
            self.clear_store().await;
            self.set_state(Session::signed_out()).await;
            return Err(SessionError::Storage { source });
        }

        info!(vendor_id = %vendor.id, %expires_at, "vendor signed in");
        self.set_state(Session::authenticated(token, vendor)).await;
        Ok(self.session().await)
    }

    /// Ends the session, sends the client to sign-in and confirms once.
    /// Repeating it only repeats the navigation.
    pub async fn logout(&self) {
        let _transition = self.transition.lock().await;
        self.end_session(LogoutReason::UserRequested).await;
    }

    /// Ends the session because the server stopped accepting its token.
    pub async fn expire(&self) {
        let _transition = self.transition.lock().await;
        self.end_session(LogoutReason::Expired).await;
    }

    pub async fn update_vendor_data(&self, vendor: Vendor) -> Result<Session, SessionError> {
        if !self.is_authenticated().await {
            return Err(SessionError::NotAuthenticated);
        }

        let vendor_json = serde_json::to_string(&vendor)?;
        self.store
            .save_vendor(&vendor_json, vendor.id.as_str())
            .await
            .map_err(|source| SessionError::Storage { source })?;

        let updated = {
            let mut guard = self.state.write().await;
            if !guard.is_authenticated() {
                return Err(SessionError::NotAuthenticated);
            }
            guard.vendor = Some(vendor);
            guard.clone()
        };
        let _ = self.events.send(ClientEvent::SessionChanged(updated.clone()));
        Ok(updated)
    }

    /// Re-reads the token expiry. An expired or unreadable token demotes the
    /// session silently; returns whether the session is still authenticated.
    pub async fn check_expiry(&self) -> bool {
        let token = {
            let guard = self.state.read().await;
            if !guard.is_authenticated() {
                return false;
            }
            guard.token.clone()
        };

        let live = token
            .as_deref()
            .and_then(|token| token_expiry(token).ok())
            .is_some_and(|expires_at| expires_at > Utc::now());
        if !live {
            info!("session token expired; demoting session");
            self.demote().await;
        }
        live
    }

    /// Authenticated → Unauthenticated without navigation or toast.
    pub async fn demote(&self) {
        self.clear_store().await;
        self.set_state(Session::signed_out()).await;
    }

    async fn end_session(&self, reason: LogoutReason) {
        let announce = {
            let guard = self.state.read().await;
            guard.is_authenticated() || reason != LogoutReason::UserRequested
        };

        self.clear_store().await;
        self.set_state(Session::signed_out()).await;

        if announce {
            let _ = self.events.send(ClientEvent::Toast(reason.toast()));
        }
        let _ = self.events.send(ClientEvent::Navigate(Route::SignIn));
    }

    async fn clear_store(&self) {
        if let Err(err) = self.store.clear_session().await {
            warn!(error = %err, "failed to clear persisted session");
        }
    }

    async fn set_state(&self, next: Session) {
        {
            let mut guard = self.state.write().await;
            if *guard == next {
                return;
            }
            *guard = next.clone();
        }
        debug!(status = ?next.status, "session state changed");
        let _ = self.events.send(ClientEvent::SessionChanged(next));
    }
}

fn restore(token: &str, vendor_json: &str, now: DateTime<Utc>) -> Result<Vendor, LogoutReason> {
    let expires_at = token_expiry(token).map_err(|err| {
        warn!(error = %err, "persisted token could not be decoded");
        LogoutReason::Invalid
    })?;
    if expires_at <= now {
        return Err(LogoutReason::Expired);
    }
    serde_json::from_str(vendor_json).map_err(|err| {
        warn!(error = %err, "persisted vendor profile could not be parsed");
        LogoutReason::Invalid
    })
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
