//! Per-endpoint discovery and authorization.
//!
//! [`AuthService`] owns one [`AuthState`] per monitor endpoint and runs at
//! most one background task per endpoint at a time. Tasks are plain threads:
//! discovery polls the MAC registers until the endpoint identifies itself or
//! its deadline passes, then runs the authorization handshake. Removal
//! confirmation re-enumerates endpoints for a bounded window before
//! declaring an endpoint absent.
//!
//! Every transition is pushed to the injected [`AuthSubscriber`] after the
//! state table is updated and unlocked.

use std::collections::HashMap;
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::identify::{self, MacAddress};
use crate::register::RegisterTransport;
use crate::retry::RetryPolicy;
use crate::state::{AuthState, EndpointId, FailureReason, Identity};

/// Where endpoints come from and how their registers are opened.
pub trait EndpointSource: Send + Sync + 'static {
    type Transport: RegisterTransport + Send;

    /// Endpoints currently connected.
    fn enumerate(&self) -> Result<Vec<EndpointId>>;

    /// Open a register handle. The handle is dropped when the task using it
    /// finishes.
    fn open(&self, endpoint: &EndpointId) -> Result<Self::Transport>;
}

/// Receives every state transition.
pub trait AuthSubscriber: Send + Sync + 'static {
    fn on_transition(&self, endpoint: &EndpointId, state: &AuthState);
}

impl<F> AuthSubscriber for F
where
    F: Fn(&EndpointId, &AuthState) + Send + Sync + 'static,
{
    fn on_transition(&self, endpoint: &EndpointId, state: &AuthState) {
        self(endpoint, state)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotplugKind {
    Arrival,
    Removal,
}

/// A platform device-interface notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotplugEvent {
    pub kind: HotplugKind,
    pub path: String,
}

impl HotplugEvent {
    pub fn arrival(path: impl Into<String>) -> Self {
        Self {
            kind: HotplugKind::Arrival,
            path: path.into(),
        }
    }

    pub fn removal(path: impl Into<String>) -> Self {
        Self {
            kind: HotplugKind::Removal,
            path: path.into(),
        }
    }

    /// Only display and monitor interfaces are of interest.
    pub fn is_display(&self) -> bool {
        let path = self.path.to_ascii_lowercase();
        path.contains("display") || path.contains("monitor")
    }
}

/// Timing for discovery, authorization and hot-plug handling.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// How long discovery keeps polling before settling into `Failed(Timeout)`.
    pub discovery_deadline: Duration,
    /// Delay between identity reads during discovery.
    pub poll_interval: Duration,
    /// Retry policy for the request/query authorization pair.
    pub auth_retry: RetryPolicy,
    /// Client slot requested from the monitor.
    pub auth_index: u8,
    /// Bound on hot-plug rediscovery and removal confirmation.
    pub confirm_window: Duration,
    /// Poll period inside the confirmation window.
    pub confirm_poll: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            discovery_deadline: Duration::from_secs(90),
            poll_interval: Duration::from_millis(500),
            auth_retry: RetryPolicy::default(),
            auth_index: 1,
            confirm_window: Duration::from_millis(3000),
            confirm_poll: Duration::from_millis(10),
        }
    }
}

#[derive(Debug, Default)]
struct Slot {
    state: AuthState,
    deadline: Option<Instant>,
    busy: bool,
    stopped: bool,
    cached: Option<Identity>,
}

#[derive(Debug, Clone, Copy)]
enum Task {
    Discover { poll: Duration },
    ConfirmRemoval,
}

struct Shared<S> {
    source: S,
    subscriber: Box<dyn AuthSubscriber>,
    config: AuthConfig,
    slots: Mutex<HashMap<EndpointId, Slot>>,
    idle: Condvar,
}

/// Monitor authentication service.
pub struct AuthService<S> {
    shared: Arc<Shared<S>>,
}

impl<S> Clone for AuthService<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S: EndpointSource> AuthService<S> {
    pub fn new(source: S, subscriber: impl AuthSubscriber, config: AuthConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                source,
                subscriber: Box::new(subscriber),
                config,
                slots: Mutex::new(HashMap::new()),
                idle: Condvar::new(),
            }),
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.shared.config
    }

    /// Start discovery for every endpoint currently connected.
    ///
    /// Returns how many discovery tasks were started.
    pub fn start(&self) -> Result<usize> {
        let endpoints = self.shared.source.enumerate()?;
        info!(count = endpoints.len(), "starting monitor discovery");
        Ok(endpoints
            .iter()
            .filter(|endpoint| self.reset_deadline(endpoint))
            .count())
    }

    /// Restart processing for `endpoint` with a fresh discovery deadline.
    ///
    /// Starts a discovery task unless one is already running, in which case
    /// only the deadline moves. Returns whether a task was started.
    pub fn reset_deadline(&self, endpoint: &EndpointId) -> bool {
        let deadline = Instant::now() + self.shared.config.discovery_deadline;
        let claimed = {
            let mut slots = self.shared.slots();
            let slot = slots.entry(endpoint.clone()).or_default();
            slot.deadline = Some(deadline);
            slot.stopped = false;
            if slot.busy {
                false
            } else {
                slot.busy = true;
                true
            }
        };
        if !claimed {
            debug!(%endpoint, "discovery already running; deadline extended");
            return false;
        }
        let poll = self.shared.config.poll_interval;
        Shared::spawn(&self.shared, endpoint.clone(), Task::Discover { poll })
    }

    /// Stop discovery or authorization for `endpoint` at its next poll tick
    /// or retry attempt.
    pub fn stop_polling(&self, endpoint: &EndpointId) {
        if let Some(slot) = self.shared.slots().get_mut(endpoint) {
            slot.deadline = Some(Instant::now());
            slot.stopped = true;
            debug!(%endpoint, "polling stopped");
        }
    }

    /// React to a device-interface notification.
    ///
    /// Returns how many tasks were started. Endpoints with a task already in
    /// flight are skipped.
    pub fn on_hotplug(&self, event: &HotplugEvent) -> usize {
        if !event.is_display() {
            debug!(path = %event.path, "ignoring non-display hot-plug event");
            return 0;
        }

        match event.kind {
            HotplugKind::Arrival => self.rediscover(),
            HotplugKind::Removal => self.confirm_removals(),
        }
    }

    fn rediscover(&self) -> usize {
        let present = match self.shared.source.enumerate() {
            Ok(present) => present,
            Err(err) => {
                warn!(error = %err, "endpoint enumeration failed after arrival");
                return 0;
            }
        };
        let deadline = Instant::now() + self.shared.config.confirm_window;
        let poll = self.shared.config.confirm_poll;

        let mut started = 0;
        for endpoint in present {
            let claimed = self
                .shared
                .claim(&endpoint, Some(deadline), |slot| !slot.state.is_authenticated());
            if claimed && Shared::spawn(&self.shared, endpoint, Task::Discover { poll }) {
                started += 1;
            }
        }
        started
    }

    fn confirm_removals(&self) -> usize {
        let authenticated: Vec<EndpointId> = self
            .shared
            .slots()
            .iter()
            .filter(|(_, slot)| slot.state.is_authenticated())
            .map(|(endpoint, _)| endpoint.clone())
            .collect();

        let mut started = 0;
        for endpoint in authenticated {
            let claimed = self
                .shared
                .claim(&endpoint, None, |slot| slot.state.is_authenticated());
            if claimed && Shared::spawn(&self.shared, endpoint, Task::ConfirmRemoval) {
                started += 1;
            }
        }
        started
    }

    /// Feed hot-plug events from a platform watcher on a background thread.
    ///
    /// The thread ends when every sender is dropped.
    pub fn watch(&self, events: Receiver<HotplugEvent>) -> std::io::Result<JoinHandle<()>> {
        let service = self.clone();
        thread::Builder::new()
            .name("cslink-hotplug".to_string())
            .spawn(move || {
                for event in events {
                    let started = service.on_hotplug(&event);
                    debug!(kind = ?event.kind, path = %event.path, started, "hot-plug event handled");
                }
                debug!("hot-plug source closed");
            })
    }

    pub fn state(&self, endpoint: &EndpointId) -> AuthState {
        self.shared
            .slots()
            .get(endpoint)
            .map(|slot| slot.state)
            .unwrap_or_default()
    }

    /// Snapshot of every known endpoint, sorted by id.
    pub fn endpoints(&self) -> Vec<(EndpointId, AuthState)> {
        let mut all: Vec<_> = self
            .shared
            .slots()
            .iter()
            .map(|(endpoint, slot)| (endpoint.clone(), slot.state))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    /// Last identity read from `endpoint`, whatever its current state.
    pub fn cached_identity(&self, endpoint: &EndpointId) -> Option<Identity> {
        self.shared.slots().get(endpoint).and_then(|slot| slot.cached)
    }

    /// Whether any endpoint has ever identified with `mac`.
    pub fn is_known(&self, mac: &MacAddress) -> bool {
        self.shared
            .slots()
            .values()
            .any(|slot| slot.cached.is_some_and(|identity| identity.mac == *mac))
    }

    /// Block until no task is running, or `timeout` passes.
    ///
    /// Returns `true` when idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut slots = self.shared.slots();
        loop {
            if !slots.values().any(|slot| slot.busy) {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            slots = self
                .shared
                .idle
                .wait_timeout(slots, deadline - now)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
    }
}

/// Clears the in-flight flag when a task ends, even by panic.
struct Release<'a, S> {
    shared: &'a Shared<S>,
    endpoint: &'a EndpointId,
}

impl<S> Drop for Release<'_, S> {
    fn drop(&mut self) {
        if let Some(slot) = self.shared.slots().get_mut(self.endpoint) {
            slot.busy = false;
        }
        self.shared.idle.notify_all();
    }
}

impl<S> Shared<S> {
    fn slots(&self) -> MutexGuard<'_, HashMap<EndpointId, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S: EndpointSource> Shared<S> {
    /// Mark `endpoint` busy if it is idle and `eligible`.
    fn claim(
        &self,
        endpoint: &EndpointId,
        deadline: Option<Instant>,
        eligible: impl FnOnce(&Slot) -> bool,
    ) -> bool {
        let mut slots = self.slots();
        let slot = slots.entry(endpoint.clone()).or_default();
        if slot.busy {
            debug!(%endpoint, "task in flight; dropping signal");
            return false;
        }
        if !eligible(slot) {
            return false;
        }
        slot.busy = true;
        slot.stopped = false;
        if deadline.is_some() {
            slot.deadline = deadline;
        }
        true
    }

    /// Run `task` on its own thread. The endpoint must already be claimed.
    fn spawn(shared: &Arc<Self>, endpoint: EndpointId, task: Task) -> bool {
        let worker = Arc::clone(shared);
        let id = endpoint.clone();
        let spawned = thread::Builder::new()
            .name(format!("cslink-auth-{endpoint}"))
            .spawn(move || {
                let _release = Release {
                    shared: &worker,
                    endpoint: &id,
                };
                match task {
                    Task::Discover { poll } => worker.discover(&id, poll),
                    Task::ConfirmRemoval => worker.confirm_removal(&id),
                }
            });

        match spawned {
            Ok(_) => true,
            Err(err) => {
                warn!(%endpoint, error = %err, "failed to spawn auth task");
                drop(Release {
                    shared: shared.as_ref(),
                    endpoint: &endpoint,
                });
                false
            }
        }
    }

    fn transition(&self, endpoint: &EndpointId, state: AuthState) {
        {
            let mut slots = self.slots();
            let slot = slots.entry(endpoint.clone()).or_default();
            slot.state = state;
            if let Some(identity) = state.identity() {
                slot.cached = Some(*identity);
            }
        }
        info!(%endpoint, %state, "auth state changed");
        self.subscriber.on_transition(endpoint, &state);
    }

    fn time_left(&self, endpoint: &EndpointId) -> Option<Duration> {
        let deadline = self.slots().get(endpoint).and_then(|slot| slot.deadline)?;
        deadline
            .checked_duration_since(Instant::now())
            .filter(|left| !left.is_zero())
    }

    fn stopped(&self, endpoint: &EndpointId) -> bool {
        self.slots().get(endpoint).is_some_and(|slot| slot.stopped)
    }

    fn identify(&self, endpoint: &EndpointId) -> Result<(S::Transport, MacAddress)> {
        let mut transport = self.source.open(endpoint)?;
        let mac = identify::read_identity(&mut transport)?;
        Ok((transport, mac))
    }

    fn discover(&self, endpoint: &EndpointId, poll: Duration) {
        self.transition(endpoint, AuthState::Discovering);

        while let Some(left) = self.time_left(endpoint) {
            match self.identify(endpoint) {
                Ok((transport, mac)) => {
                    self.authorize(endpoint, transport, mac);
                    return;
                }
                Err(err) => debug!(%endpoint, error = %err, "identity not readable yet"),
            }
            thread::sleep(poll.min(left));
        }

        warn!(%endpoint, "discovery deadline passed");
        self.transition(endpoint, AuthState::Failed(FailureReason::Timeout));
    }

    fn authorize(&self, endpoint: &EndpointId, mut transport: S::Transport, mac: MacAddress) {
        let mut identity = Identity::new(mac);
        self.transition(endpoint, AuthState::Identified(identity));
        self.transition(endpoint, AuthState::Authenticating);

        let index = self.config.auth_index;
        let outcome = self.config.auth_retry.run_until(
            "authorization",
            || self.stopped(endpoint),
            |_| {
                identify::request_authorization(&mut transport, index)?;
                identify::query_authorization(&mut transport)
            },
        );

        let byte = match outcome {
            Ok(byte) => byte,
            Err(_) if self.stopped(endpoint) => {
                warn!(%endpoint, "authorization stopped");
                self.transition(endpoint, AuthState::Failed(FailureReason::Timeout));
                return;
            }
            Err(_) => {
                self.transition(endpoint, AuthState::Failed(FailureReason::AuthUnavailable));
                return;
            }
        };
        identity.authorization = Some(byte);

        match identify::read_source_port(&mut transport) {
            Ok(source_port) => identity.source_port = Some(source_port),
            Err(err) => debug!(%endpoint, error = %err, "source/port not available"),
        }

        self.transition(endpoint, AuthState::Authenticated(identity));
    }

    fn confirm_removal(&self, endpoint: &EndpointId) {
        let window_end = Instant::now() + self.config.confirm_window;
        loop {
            match self.source.enumerate() {
                Ok(present) if present.contains(endpoint) => {
                    debug!(%endpoint, "endpoint still present; keeping state");
                    return;
                }
                Ok(_) => {}
                Err(err) => debug!(%endpoint, error = %err, "enumeration failed during removal check"),
            }
            let now = Instant::now();
            if now >= window_end {
                break;
            }
            thread::sleep(self.config.confirm_poll.min(window_end - now));
        }

        self.transition(endpoint, AuthState::Absent);
    }
}
