// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session store: the current identity, its paired profile, and
//! loading/error flags, observable through a `watch` channel.

use crate::models::{Identity, Profile};
use crate::providers::{AuthEvent, AuthEventKind, IdentityProvider};
use crate::services::ProfileRepository;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

const INIT_FAILED: &str = "Failed to initialize authentication";
const PROFILE_LOAD_FAILED: &str = "Failed to load profile data";

/// Observable session state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionSnapshot {
    /// True until the initial session fetch resolves, and while an auth
    /// operation is in flight.
    pub loading: bool,
    pub identity: Option<Identity>,
    pub profile: Option<Profile>,
    pub error: Option<String>,
}

pub struct SessionStore {
    state: watch::Sender<SessionSnapshot>,
    profiles: ProfileRepository,
    /// Profile write generations. A fetch result older than the last
    /// applied write is dropped. Only changed while holding the watch lock.
    issued: AtomicU64,
    applied: AtomicU64,
}

impl SessionStore {
    /// New store in the `loading` state; call [`initialize`](Self::initialize).
    pub fn new(profiles: ProfileRepository) -> Self {
        let (state, _) = watch::channel(SessionSnapshot {
            loading: true,
            ..Default::default()
        });
        Self {
            state,
            profiles,
            issued: AtomicU64::new(0),
            applied: AtomicU64::new(0),
        }
    }

    pub fn current(&self) -> Option<Identity> {
        self.state.borrow().identity.clone()
    }

    pub fn profile(&self) -> Option<Profile> {
        self.state.borrow().profile.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    /// Call `handler` with the new identity each time it changes.
    ///
    /// Rapid successive changes may be coalesced; the handler always sees
    /// the latest identity.
    pub fn on_session_change<F>(&self, mut handler: F) -> JoinHandle<()>
    where
        F: FnMut(Option<Identity>) + Send + 'static,
    {
        let mut rx = self.subscribe();
        let mut last = rx.borrow_and_update().identity.clone();

        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let identity = rx.borrow_and_update().identity.clone();
                if identity != last {
                    last = identity.clone();
                    handler(identity);
                }
            }
        })
    }

    /// Load any pre-existing provider session. The store stays `loading`
    /// until this resolves.
    pub async fn initialize(&self, provider: &dyn IdentityProvider) {
        self.set_loading(true);

        match provider.get_session().await {
            Ok(Some(session)) => self.set_identity(Some(session.identity)).await,
            Ok(None) => tracing::debug!("No existing session"),
            Err(err) => {
                tracing::warn!(error = %err, "Error initializing auth");
                self.set_error(Some(INIT_FAILED.to_string()));
            }
        }

        self.set_loading(false);
    }

    /// Set or clear the identity.
    ///
    /// Acquiring an identity fetches its profile; clearing drops the profile
    /// in the same update. When fetches overlap, a result that lands after a
    /// newer one has been applied is discarded.
    pub async fn set_identity(&self, identity: Option<Identity>) {
        let Some(identity) = identity else {
            self.clear();
            return;
        };
        let user_id = identity.id.clone();

        let mut generation = 0;
        self.state.send_if_modified(|state| {
            generation = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
            if state.identity.as_ref() == Some(&identity) {
                return false;
            }
            if state.identity.as_ref().map(|i| &i.id) != Some(&identity.id) {
                state.profile = None;
            }
            state.identity = Some(identity);
            true
        });

        match self.profiles.fetch(&user_id).await {
            Ok(profile) => self.apply_fetched(generation, &user_id, profile),
            Err(err) => {
                tracing::warn!(user_id = %user_id, error = %err, "Error fetching profile for session");
                self.set_error(Some(PROFILE_LOAD_FAILED.to_string()));
            }
        }
    }

    /// Clear identity and profile synchronously. In-flight profile fetches
    /// are superseded.
    pub fn clear(&self) {
        self.state.send_if_modified(|state| {
            self.applied
                .store(self.issued.load(Ordering::SeqCst), Ordering::SeqCst);
            let changed = state.identity.is_some() || state.profile.is_some();
            state.identity = None;
            state.profile = None;
            changed
        });
    }

    /// Replace the paired profile if `user_id` is still the current identity.
    /// Supersedes any profile fetch still in flight.
    pub fn set_profile_for(&self, user_id: &str, profile: Option<Profile>) {
        self.state.send_if_modified(|state| {
            if !is_current(state, user_id) {
                return false;
            }
            let generation = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
            self.applied.store(generation, Ordering::SeqCst);
            replace_profile(state, profile)
        });
    }

    fn apply_fetched(&self, generation: u64, user_id: &str, profile: Option<Profile>) {
        let mut stale = false;
        self.state.send_if_modified(|state| {
            if generation <= self.applied.load(Ordering::SeqCst) {
                stale = true;
                return false;
            }
            if !is_current(state, user_id) {
                return false;
            }
            self.applied.store(generation, Ordering::SeqCst);
            replace_profile(state, profile)
        });

        if stale {
            tracing::debug!(user_id = %user_id, generation, "Dropped superseded profile fetch");
        }
    }

    pub fn set_loading(&self, loading: bool) {
        self.state.send_if_modified(|state| {
            let changed = state.loading != loading;
            state.loading = loading;
            changed
        });
    }

    pub fn set_error(&self, error: Option<String>) {
        self.state.send_if_modified(|state| {
            let changed = state.error != error;
            state.error = error;
            changed
        });
    }

    /// Apply a provider session change.
    ///
    /// Sign-ins and refreshes re-read the provider's current session rather
    /// than trusting the event, so a stale event cannot resurrect a session
    /// that has since ended.
    pub async fn apply_event(&self, event: &AuthEvent, provider: &dyn IdentityProvider) {
        tracing::debug!(kind = ?event.kind, user_id = ?event.identity().map(|i| &i.id), "Auth state changed");

        match event.kind {
            AuthEventKind::SignedOut => self.clear(),
            AuthEventKind::SignedIn | AuthEventKind::TokenRefreshed => {
                match provider.get_session().await {
                    Ok(session) => self.set_identity(session.map(|s| s.identity)).await,
                    Err(err) => {
                        tracing::warn!(error = %err, "Could not read session after auth change")
                    }
                }
            }
        }
    }

    /// Follow a provider's auth-state stream until it closes or the task is
    /// aborted.
    pub fn spawn_listener(
        self: &Arc<Self>,
        provider: Arc<dyn IdentityProvider>,
    ) -> JoinHandle<()> {
        let store = Arc::clone(self);
        let mut events = provider.on_auth_state_change();

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => store.apply_event(&event, provider.as_ref()).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Auth events dropped; resyncing session");
                        match provider.get_session().await {
                            Ok(session) => store.set_identity(session.map(|s| s.identity)).await,
                            Err(err) => tracing::warn!(error = %err, "Session resync failed"),
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

fn is_current(state: &SessionSnapshot, user_id: &str) -> bool {
    state.identity.as_ref().is_some_and(|i| i.id == user_id)
}

fn replace_profile(state: &mut SessionSnapshot, profile: Option<Profile>) -> bool {
    if state.profile == profile {
        return false;
    }
    state.profile = profile;
    true
}
