//! Debounced, cached registration resolution
//!
//! Live contact search fires a lookup per keystroke; most of those inputs
//! are superseded milliseconds later. The resolver coalesces them with an
//! explicit debounce gate: every call arms a ticket, and after the window
//! only the most recent ticket is allowed to reach the network. Superseded
//! calls resolve [`Resolution::Superseded`] without any network traffic.
//!
//! Successful verdicts land in a process-lifetime cache keyed by canonical
//! identifier. There is no TTL: a contact's registration status is never
//! refreshed automatically within a session, and the only invalidation is
//! an explicit [`RegistrationResolver::reset`]. Failures propagate to the
//! caller, are never retried here, and are never cached.

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, trace};

use ciphertalk_core::identity::{normalize, Region};
use ciphertalk_core::{RegistrationEntry, ResolverConfig};

use crate::lookup::{LookupError, RegistrationLookup};

// ----------------------------------------------------------------------------
// Resolution
// ----------------------------------------------------------------------------

/// Outcome of a [`RegistrationResolver::check_registration`] call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The lookup ran (or hit the cache) and produced a verdict
    Settled(RegistrationEntry),
    /// A newer input arrived within the debounce window; this call never
    /// reached the network and its result should be ignored
    Superseded,
}

impl Resolution {
    /// The settled entry, if this call was not superseded
    pub fn settled(self) -> Option<RegistrationEntry> {
        match self {
            Resolution::Settled(entry) => Some(entry),
            Resolution::Superseded => None,
        }
    }
}

// ----------------------------------------------------------------------------
// Debounce Gate
// ----------------------------------------------------------------------------

/// Cancellable coalescing gate for one logical operation.
///
/// Arming a new ticket supersedes every ticket armed before it; a ticket
/// that survives its window unchallenged wins. Cancellation is pure ticket
/// supersession and has no other side effect.
#[derive(Debug)]
pub struct DebounceGate {
    window: Duration,
    latest: AtomicU64,
}

impl DebounceGate {
    /// Create a gate with the given coalescing window
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            latest: AtomicU64::new(0),
        }
    }

    /// Arm a new ticket, superseding all previously armed tickets
    pub fn arm(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Whether `ticket` is still the most recently armed one
    pub fn is_current(&self, ticket: u64) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket
    }

    /// Wait out the window; true if the ticket survived unchallenged
    pub async fn expire(&self, ticket: u64) -> bool {
        sleep(self.window).await;
        self.is_current(ticket)
    }
}

// ----------------------------------------------------------------------------
// Registration Cache
// ----------------------------------------------------------------------------

/// Process-lifetime cache of registration verdicts.
///
/// Reads are safe from any caller; writes happen only in the resolver's
/// own lookup completion path. Entries never expire silently.
#[derive(Debug, Default)]
pub struct RegistrationCache {
    entries: Mutex<HashMap<String, RegistrationEntry>>,
}

impl RegistrationCache {
    fn locked(&self) -> std::sync::MutexGuard<'_, HashMap<String, RegistrationEntry>> {
        self.entries
            .lock()
            .expect("registration cache lock poisoned")
    }

    /// Look up a cached entry by canonical identifier
    pub fn get(&self, identifier: &str) -> Option<RegistrationEntry> {
        self.locked().get(identifier).cloned()
    }

    /// Store an entry under its canonical identifier
    pub fn insert(&self, entry: RegistrationEntry) {
        self.locked().insert(entry.identifier.clone(), entry);
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.locked().len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.locked().is_empty()
    }

    /// Drop every entry; the only invalidation the cache supports
    pub fn reset(&self) {
        self.locked().clear();
    }
}

// ----------------------------------------------------------------------------
// Registration Resolver
// ----------------------------------------------------------------------------

/// Translates canonical identifiers into registration verdicts through a
/// debounced, cached external lookup.
pub struct RegistrationResolver<L: RegistrationLookup> {
    lookup: L,
    cache: RegistrationCache,
    gate: DebounceGate,
    region: Region,
}

impl<L: RegistrationLookup> RegistrationResolver<L> {
    /// Create a resolver around a lookup collaborator
    pub fn new(lookup: L, config: &ResolverConfig) -> Self {
        Self {
            lookup,
            cache: RegistrationCache::default(),
            gate: DebounceGate::new(config.debounce_window),
            region: config.region.clone(),
        }
    }

    /// Canonical identifier forms for a raw contact string, normalized
    /// against this resolver's configured region
    pub fn canonical_forms(&self, raw: &str) -> BTreeSet<String> {
        normalize(raw, &self.region)
    }

    /// Resolve the registration verdict for one canonical identifier.
    ///
    /// The ticket is armed synchronously, before the returned future is
    /// first polled, so a later call supersedes this one even when the
    /// futures are awaited out of order. A cache hit settles immediately
    /// without touching the network or waiting out the window.
    pub fn check_registration(
        &self,
        identifier: &str,
    ) -> impl Future<Output = Result<Resolution, LookupError>> + '_ {
        let identifier = identifier.to_string();
        let ticket = self.gate.arm();
        trace!(%identifier, ticket, "registration check armed");

        async move {
            if let Some(entry) = self.cache.get(&identifier) {
                debug!(%identifier, "registration cache hit");
                return Ok(Resolution::Settled(entry));
            }

            if !self.gate.expire(ticket).await {
                trace!(%identifier, ticket, "registration check superseded");
                return Ok(Resolution::Superseded);
            }

            debug!(%identifier, "issuing registration lookup");
            let entry = self.lookup.lookup(&identifier).await?;

            // A stale in-flight result must never overwrite a newer entry.
            if self.gate.is_current(ticket) {
                self.cache.insert(entry.clone());
            }
            Ok(Resolution::Settled(entry))
        }
    }

    /// Access the cache (read-only use by callers)
    pub fn cache(&self) -> &RegistrationCache {
        &self.cache
    }

    /// Explicitly drop all cached verdicts
    pub fn reset(&self) {
        self.cache.reset();
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
