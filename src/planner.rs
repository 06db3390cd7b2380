//! # Search Planner
//!
//! Runs one corridor search end to end:
//! `Idle -> Geocoding -> RoutingOrFallback -> Filtering -> Done | Failed`.
//!
//! Mutable search state lives in an owned [`PlannerState`]. Every search takes a
//! [`SearchTicket`] from it; an outcome is only committed while its ticket is still the
//! latest, so a slow search can never overwrite a newer one or a reset.

use crate::candidate::Capability;
use crate::corridor::{rest_targets, select_candidates, CandidateIndex, CorridorMatch, SelectionPolicy};
use crate::error::SearchError;
use crate::geocoding::{GeocodeResult, Geocoder};
use crate::rate_limit::DispatchRateLimiter;
use crate::route::{route_or_fallback, AcquiredRoute, RouteProvider};
use crate::GeoPoint;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

// ============================================================================
// Parameters
// ============================================================================

/// What to search for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    /// Free-text origin address
    pub origin: String,
    /// Free-text destination address
    pub destination: String,
    /// Corridor half-width (km)
    #[serde(default = "default_corridor_km")]
    pub max_corridor_km: f64,
    #[serde(default)]
    pub policy: SelectionPolicy,
    #[serde(default)]
    pub required_capabilities: BTreeSet<Capability>,
}

fn default_corridor_km() -> f64 {
    SearchParams::DEFAULT_CORRIDOR_KM
}

impl SearchParams {
    pub const DEFAULT_CORRIDOR_KM: f64 = 10.0;

    /// A search with the default corridor (10 km) and rest interval (100 km).
    pub fn new(origin: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            destination: destination.into(),
            max_corridor_km: Self::DEFAULT_CORRIDOR_KM,
            policy: SelectionPolicy::default(),
            required_capabilities: BTreeSet::new(),
        }
    }

    pub fn with_corridor_km(mut self, km: f64) -> Self {
        self.max_corridor_km = km;
        self
    }

    pub fn with_policy(mut self, policy: SelectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn require(mut self, capability: Capability) -> Self {
        self.required_capabilities.insert(capability);
        self
    }

    /// Check the parameters before anything touches the network.
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.origin.trim().is_empty() {
            return Err(SearchError::InvalidParameters("origin is empty".to_string()));
        }
        if self.destination.trim().is_empty() {
            return Err(SearchError::InvalidParameters("destination is empty".to_string()));
        }
        if !self.max_corridor_km.is_finite() || self.max_corridor_km < 0.0 {
            return Err(SearchError::InvalidParameters(format!(
                "corridor width must be a non-negative number, got {}",
                self.max_corridor_km
            )));
        }
        if let SelectionPolicy::IntervalSampled { rest_interval_km } = self.policy {
            if !rest_interval_km.is_finite() || rest_interval_km <= 0.0 {
                return Err(SearchError::InvalidParameters(format!(
                    "rest interval must be a positive number, got {}",
                    rest_interval_km
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// State
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SearchPhase {
    #[default]
    Idle,
    Geocoding,
    RoutingOrFallback,
    Filtering,
    Done,
    Failed,
}

/// Everything a successful search produces.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Ordered by route position
    pub matches: Vec<CorridorMatch>,
    pub origin: GeocodeResult,
    pub destination: GeocodeResult,
    pub route: AcquiredRoute,
    /// Points on the route at each rest target (interval sampling only)
    pub rest_stops: Vec<GeoPoint>,
}

/// Identifies one search; only the latest ticket may commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchTicket {
    generation: u64,
}

impl SearchTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitStatus {
    Applied,
    /// A newer search or a reset happened; nothing changed
    Stale,
}

/// Owned search state: phase, last outcome and last error.
#[derive(Debug, Default)]
pub struct PlannerState {
    phase: SearchPhase,
    generation: u64,
    outcome: Option<SearchOutcome>,
    error: Option<SearchError>,
}

impl PlannerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> SearchPhase {
        self.phase
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The last successful outcome. Survives later failed searches.
    pub fn outcome(&self) -> Option<&SearchOutcome> {
        self.outcome.as_ref()
    }

    pub fn results(&self) -> &[CorridorMatch] {
        self.outcome.as_ref().map_or(&[], |o| o.matches.as_slice())
    }

    /// Error of the last search, if it failed.
    pub fn error(&self) -> Option<&SearchError> {
        self.error.as_ref()
    }

    pub fn is_current(&self, ticket: SearchTicket) -> bool {
        ticket.generation == self.generation
    }

    /// Start a new search, superseding any in flight. Prior results stay visible until
    /// the new search commits.
    pub fn begin_search(&mut self) -> SearchTicket {
        self.generation += 1;
        self.phase = SearchPhase::Geocoding;
        self.error = None;
        SearchTicket { generation: self.generation }
    }

    /// Move a running search to its next phase.
    pub fn advance(&mut self, ticket: SearchTicket, phase: SearchPhase) -> CommitStatus {
        if !self.is_current(ticket) {
            return CommitStatus::Stale;
        }
        self.phase = phase;
        CommitStatus::Applied
    }

    /// Finish a search. A failure keeps the previous outcome.
    pub fn commit(
        &mut self,
        ticket: SearchTicket,
        result: Result<SearchOutcome, SearchError>,
    ) -> CommitStatus {
        if !self.is_current(ticket) {
            debug!(
                "[Planner] Dropping stale search #{} (current #{})",
                ticket.generation, self.generation
            );
            return CommitStatus::Stale;
        }

        match result {
            Ok(outcome) => {
                self.outcome = Some(outcome);
                self.error = None;
                self.phase = SearchPhase::Done;
            }
            Err(e) => {
                self.error = Some(e);
                self.phase = SearchPhase::Failed;
            }
        }
        CommitStatus::Applied
    }

    /// Clear everything back to `Idle`. Searches still in flight become stale.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.phase = SearchPhase::Idle;
        self.outcome = None;
        self.error = None;
    }
}

// ============================================================================
// Planner
// ============================================================================

/// Geocodes, routes and filters with shared providers.
///
/// One rate limiter covers every geocoding call the planner makes, across searches.
pub struct RoutePlanner {
    geocoder: Arc<dyn Geocoder>,
    router: Arc<dyn RouteProvider>,
    limiter: Arc<DispatchRateLimiter>,
    routing_timeout: Duration,
}

impl RoutePlanner {
    pub fn new(
        geocoder: Arc<dyn Geocoder>,
        router: Arc<dyn RouteProvider>,
        geocode_interval: Duration,
        routing_timeout: Duration,
    ) -> Self {
        Self {
            geocoder,
            router,
            limiter: Arc::new(DispatchRateLimiter::new(geocode_interval)),
            routing_timeout,
        }
    }

    /// Planner backed by Nominatim and OSRM.
    #[cfg(feature = "http")]
    pub fn from_config(config: &crate::PlannerConfig) -> Result<Self, reqwest::Error> {
        let geocoder = crate::http::NominatimClient::new(config.nominatim.clone())?;
        let router = crate::http::OsrmClient::new(config.osrm.clone(), config.routing_timeout())?;
        Ok(Self::new(
            Arc::new(geocoder),
            Arc::new(router),
            config.geocode_interval(),
            config.routing_timeout(),
        ))
    }

    pub fn routing_timeout(&self) -> Duration {
        self.routing_timeout
    }

    /// Geocode origin then destination, never faster than the dispatch interval.
    pub async fn geocode_endpoints(
        &self,
        params: &SearchParams,
    ) -> Result<(GeocodeResult, GeocodeResult), SearchError> {
        let origin = self.geocode(params.origin.trim()).await?;
        let destination = self.geocode(params.destination.trim()).await?;
        Ok((origin, destination))
    }

    async fn geocode(&self, query: &str) -> Result<GeocodeResult, SearchError> {
        let slot = self.limiter.wait_for_dispatch_slot().await;
        self.lookup(slot, query).await
    }

    /// Geocode for a tracked search. `None` once the ticket is superseded: the request
    /// is never sent and its dispatch slot goes to whoever asks next.
    async fn geocode_current(
        &self,
        query: &str,
        state: &Mutex<PlannerState>,
        ticket: SearchTicket,
    ) -> Option<Result<GeocodeResult, SearchError>> {
        let slot = self
            .limiter
            .wait_for_dispatch_slot_while(|| lock(state).is_current(ticket))
            .await?;
        Some(self.lookup(slot, query).await)
    }

    async fn lookup(&self, slot: u32, query: &str) -> Result<GeocodeResult, SearchError> {
        match self.geocoder.geocode(query).await {
            Ok(found) => {
                debug!(
                    "[Planner] Geocode #{} {:?} -> ({:.5}, {:.5})",
                    slot, query, found.point.latitude, found.point.longitude
                );
                Ok(found)
            }
            Err(e) => {
                warn!("[Planner] Geocode #{} {:?} failed: {}", slot, query, e);
                Err(e.into())
            }
        }
    }

    /// Road route between the endpoints, or the straight line.
    pub async fn acquire(&self, from: GeoPoint, to: GeoPoint) -> AcquiredRoute {
        route_or_fallback(self.router.as_ref(), from, to, self.routing_timeout).await
    }

    /// Filter and select candidates against an acquired route. Returns the matches and
    /// the rest-stop markers.
    pub fn select(
        params: &SearchParams,
        route: &AcquiredRoute,
        index: &CandidateIndex,
    ) -> (Vec<CorridorMatch>, Vec<GeoPoint>) {
        let inside = index.corridor_matches(
            &route.polyline,
            params.max_corridor_km,
            &params.required_capabilities,
        );
        let in_corridor = inside.len();
        let matches = select_candidates(inside, params.policy, route.distance_km);

        let rest_stops = match params.policy {
            SelectionPolicy::Unthinned => vec![],
            SelectionPolicy::IntervalSampled { rest_interval_km } => {
                rest_targets(route.distance_km, rest_interval_km)
                    .into_iter()
                    .filter_map(|t| route.polyline.point_at_position(t))
                    .collect()
            }
        };

        info!(
            "[Planner] {} of {} candidates within {} km, {} selected",
            in_corridor,
            index.len(),
            params.max_corridor_km,
            matches.len()
        );

        (matches, rest_stops)
    }

    /// Run a search without tracking state.
    pub async fn run(
        &self,
        params: &SearchParams,
        index: &CandidateIndex,
    ) -> Result<SearchOutcome, SearchError> {
        params.validate()?;
        let (origin, destination) = self.geocode_endpoints(params).await?;
        let route = self.acquire(origin.point, destination.point).await;
        Ok(Self::finish(params, origin, destination, route, index))
    }

    /// Run a search against shared state, committing only if no newer search or reset
    /// happened meanwhile. Stops early once superseded.
    pub async fn search(
        &self,
        state: &Mutex<PlannerState>,
        params: &SearchParams,
        index: &CandidateIndex,
    ) -> CommitStatus {
        let ticket = lock(state).begin_search();
        info!(
            "[Planner] Search #{}: {:?} -> {:?}",
            ticket.generation, params.origin, params.destination
        );

        if let Err(e) = params.validate() {
            warn!("[Planner] Search #{} rejected: {}", ticket.generation, e);
            return lock(state).commit(ticket, Err(e));
        }

        let origin = match self.geocode_current(params.origin.trim(), state, ticket).await {
            Some(Ok(found)) => found,
            Some(Err(e)) => return lock(state).commit(ticket, Err(e)),
            None => return Self::superseded(ticket, "origin lookup"),
        };

        let destination = match self.geocode_current(params.destination.trim(), state, ticket).await {
            Some(Ok(found)) => found,
            Some(Err(e)) => return lock(state).commit(ticket, Err(e)),
            None => return Self::superseded(ticket, "destination lookup"),
        };

        let status = lock(state).advance(ticket, SearchPhase::RoutingOrFallback);
        if status == CommitStatus::Stale {
            return Self::superseded(ticket, "routing");
        }

        let route = self.acquire(origin.point, destination.point).await;

        let status = lock(state).advance(ticket, SearchPhase::Filtering);
        if status == CommitStatus::Stale {
            return Self::superseded(ticket, "filtering");
        }

        let outcome = Self::finish(params, origin, destination, route, index);
        lock(state).commit(ticket, Ok(outcome))
    }

    fn superseded(ticket: SearchTicket, step: &str) -> CommitStatus {
        debug!("[Planner] Search #{} superseded before {}", ticket.generation, step);
        CommitStatus::Stale
    }

    fn finish(
        params: &SearchParams,
        origin: GeocodeResult,
        destination: GeocodeResult,
        route: AcquiredRoute,
        index: &CandidateIndex,
    ) -> SearchOutcome {
        let (matches, rest_stops) = Self::select(params, &route, index);
        info!(
            "[Planner] Route {:.1} km ({}), {} results",
            route.distance_km,
            if route.is_road_route { "road" } else { "straight line" },
            matches.len()
        );
        SearchOutcome { matches, origin, destination, route, rest_stops }
    }
}

fn lock(state: &Mutex<PlannerState>) -> MutexGuard<'_, PlannerState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
