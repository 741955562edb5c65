use crate::config::{
    ActionPlaceParams, NetConfig, PlaceTypeTag, ResourcePoolParams, WaitWithTimeoutParams,
};
use crate::places::{
    ActionBehavior, CompletionRouter, EntrypointBehavior, ExitLoggerBehavior, PlaceBehavior,
    PlainBehavior, ResourcePoolBehavior, WaitTimeoutBehavior,
};
use crate::{ActionExecutor, ActionInvoker, ActionRegistry, RetryPolicy};
use petricore::{
    Arc as NetArc, ArcDirection, EngineError, Net, Place, PlaceRef, Subqueue, Token, TokenId,
    Transition,
};
use serde_json::Value;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Lifecycle state of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RuntimeState {
    Stopped = 0,
    Starting = 1,
    Running = 2,
    Stopping = 3,
    Error = 4,
}

struct StateCell(AtomicU8);

impl StateCell {
    fn new(state: RuntimeState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    fn load(&self) -> RuntimeState {
        match self.0.load(Ordering::SeqCst) {
            0 => RuntimeState::Stopped,
            1 => RuntimeState::Starting,
            2 => RuntimeState::Running,
            3 => RuntimeState::Stopping,
            _ => RuntimeState::Error,
        }
    }

    fn store(&self, state: RuntimeState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }
}

/// Cumulative execution statistics.
///
/// `active_tokens` is recomputed on every `stats` call as the sum of tokens
/// in all place queues plus in-flight action contexts.
#[derive(Debug, Clone, Default)]
pub struct RuntimeStats {
    pub epoch: u64,
    pub transitions_fired: u64,
    pub tokens_processed: u64,
    pub active_tokens: usize,
    pub started_at: Option<Instant>,
    pub last_tick_at: Option<Instant>,
}

type TokenEventFn = Box<dyn FnMut(&str, &Token) + Send>;
type TransitionEventFn = Box<dyn FnMut(&str, u64) + Send>;

#[derive(Default)]
struct EventSlots {
    token_enter: Option<TokenEventFn>,
    token_exit: Option<TokenEventFn>,
    transition_fired: Option<TransitionEventFn>,
}

struct Inner {
    net: Net,
    executor: ActionExecutor,
    behaviors: Vec<(String, Box<dyn PlaceBehavior>)>,
    registry: ActionRegistry,
    router: CompletionRouter,
    stats: RuntimeStats,
    errors: Vec<String>,
    config: Option<NetConfig>,
}

impl Inner {
    fn new() -> Self {
        Self {
            net: Net::new(),
            executor: ActionExecutor::new(),
            behaviors: Vec::new(),
            registry: ActionRegistry::new(),
            router: CompletionRouter::new(),
            stats: RuntimeStats::default(),
            errors: Vec::new(),
            config: None,
        }
    }

    /// One discrete step: poll the executor, route completions, tick the
    /// behaviours, then fire enabled transitions by priority.
    fn process_tick(&mut self, events: &Mutex<EventSlots>) {
        self.stats.epoch += 1;
        let epoch = self.stats.epoch;
        self.stats.last_tick_at = Some(Instant::now());

        self.executor.poll();

        // Tokens completed during the poll land in their sub-queues now.
        // Sub-queue arrivals never pass through on_token_enter.
        for routed in self.router.drain() {
            tracing::debug!(
                place = %routed.place_id,
                sub = %routed.sub,
                action = %routed.action_name,
                state = ?routed.state,
                "action completed"
            );
            if let Some(place) = self.net.place_mut(&routed.place_id) {
                place.sub_mut(routed.sub).push(routed.token);
            }
        }

        let now = Instant::now();
        for (place_id, behavior) in &mut self.behaviors {
            if let Some(place) = self.net.place_mut(place_id) {
                behavior.tick(place, now, epoch);
            }
        }

        for transition_id in self.net.transition_ids_by_priority() {
            // Re-check: an earlier firing may have consumed the tokens.
            if !self.net.is_transition_enabled(&transition_id) {
                continue;
            }
            match self.net.fire(&transition_id, epoch) {
                Ok(outcome) => {
                    self.stats.transitions_fired += 1;
                    tracing::debug!(transition = %transition_id, epoch, "transition fired");
                    emit_transition_fired(events, &transition_id, epoch);
                    self.deliver_arrivals(outcome.produced, events);
                }
                Err(err) => {
                    tracing::debug!(transition = %transition_id, %err, "firing aborted");
                }
            }
        }
    }

    /// Hand tokens that landed in default queues to their place's
    /// behaviour, one at a time, in production order.
    fn deliver_arrivals(&mut self, produced: Vec<(PlaceRef, TokenId)>, events: &Mutex<EventSlots>) {
        for (dest, token_id) in produced {
            if dest.sub.is_some() {
                continue;
            }
            let Some(place) = self.net.place_mut(&dest.place_id) else {
                continue;
            };
            let Some(token) = place.remove_token_by_id(token_id) else {
                continue;
            };
            emit_token_enter(events, &dest.place_id, &token);

            match self
                .behaviors
                .iter_mut()
                .find(|(id, _)| id == &dest.place_id)
            {
                Some((_, behavior)) => {
                    behavior.on_token_enter(place, token, &mut self.executor);
                }
                None => {
                    place.tokens_mut().push(token);
                }
            }
        }
    }

    fn active_tokens(&self) -> usize {
        let in_places: usize = self.net.places().map(|p| p.token_count()).sum();
        in_places + self.executor.in_flight_count()
    }
}

fn emit_token_enter(events: &Mutex<EventSlots>, place_id: &str, token: &Token) {
    if let Ok(mut slots) = events.lock() {
        if let Some(callback) = slots.token_enter.as_mut() {
            callback(place_id, token);
        }
    }
}

fn emit_transition_fired(events: &Mutex<EventSlots>, transition_id: &str, epoch: u64) {
    if let Ok(mut slots) = events.lock() {
        if let Some(callback) = slots.transition_fired.as_mut() {
            callback(transition_id, epoch);
        }
    }
}

/// Main orchestrator: owns the net, the executor, and the place
/// behaviours, and drives them from a single discrete-time loop.
///
/// All net mutation happens under one coarse mutex, during either a
/// `tick()` call or a user API call; the optional loop thread takes the
/// same mutex per tick. Event callbacks fire synchronously inside the
/// critical section and must not call back into the controller or block.
pub struct RuntimeController {
    inner: Arc<Mutex<Inner>>,
    events: Arc<Mutex<EventSlots>>,
    state: Arc<StateCell>,
    run_id: Uuid,
    tick_interval: Duration,
    loop_handle: Option<JoinHandle<()>>,
}

impl RuntimeController {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::new())),
            events: Arc::new(Mutex::new(EventSlots::default())),
            state: Arc::new(StateCell::new(RuntimeState::Stopped)),
            run_id: Uuid::new_v4(),
            tick_interval: Duration::from_millis(10),
            loop_handle: None,
        }
    }

    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        // A panic inside a tick poisons the mutex; the state is still
        // consistent enough to inspect, so recover the guard.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Identifier of this controller instance, carried in telemetry.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn state(&self) -> RuntimeState {
        self.state.load()
    }

    /// Interval between automatic ticks. Takes effect at the next `start`.
    pub fn set_tick_interval(&mut self, interval: Duration) {
        self.tick_interval = interval;
    }

    /// Build the net and place behaviours from a parsed configuration.
    ///
    /// Replaces any previously loaded net. Validation errors are recorded
    /// in the error log and abort the load.
    pub fn load_config(&self, config: NetConfig) -> Result<(), EngineError> {
        let mut inner = self.lock_inner();
        inner.errors.clear();
        inner.behaviors.clear();
        inner.net = Net::new();

        let report = config.validate();
        for warning in &report.warnings {
            tracing::warn!(run_id = %self.run_id, "{warning}");
        }
        if !report.is_ok() {
            inner.errors.extend(report.errors.iter().cloned());
            return Err(EngineError::Config(report.errors.join("; ")));
        }

        for place_config in &config.places {
            inner.net.add_place(Place::new(&place_config.id));
        }

        for place_config in &config.places {
            let behavior = Self::build_behavior(&mut inner, place_config, &self.events)?;
            inner.behaviors.push((place_config.id.clone(), behavior));
        }

        for (index, transition_config) in config.transitions.iter().enumerate() {
            let transition_id = format!("t{}", index + 1);
            let mut transition = Transition::new(&transition_id);
            if let Some(priority) = transition_config.priority {
                transition.set_priority(priority);
            }
            for from in &transition_config.from {
                let reference = PlaceRef::parse(from)?;
                transition.add_input_arc(NetArc::new(
                    reference,
                    &transition_id,
                    ArcDirection::PlaceToTransition,
                ));
            }
            for to in &transition_config.to {
                let reference = PlaceRef::parse(to.to())?;
                let mut arc =
                    NetArc::new(reference, &transition_id, ArcDirection::TransitionToPlace);
                if let Some(filter) = to.token_filter() {
                    arc.set_token_filter(filter);
                }
                transition.add_output_arc(arc);
            }
            inner.net.add_transition(transition);
        }

        tracing::info!(
            run_id = %self.run_id,
            places = config.places.len(),
            transitions = config.transitions.len(),
            "configuration loaded"
        );
        inner.config = Some(config);
        Ok(())
    }

    fn build_behavior(
        inner: &mut Inner,
        place_config: &crate::PlaceConfig,
        events: &Arc<Mutex<EventSlots>>,
    ) -> Result<Box<dyn PlaceBehavior>, EngineError> {
        let place = inner
            .net
            .place_mut(&place_config.id)
            .ok_or_else(|| EngineError::Config(format!("place vanished: {}", place_config.id)))?;

        let behavior: Box<dyn PlaceBehavior> = match place_config.place_type {
            PlaceTypeTag::Plain => Box::new(PlainBehavior::new()),
            PlaceTypeTag::Entrypoint => Box::new(EntrypointBehavior::new()),
            PlaceTypeTag::ResourcePool => {
                let params: ResourcePoolParams = place_config.params_as()?;
                Box::new(ResourcePoolBehavior::new(
                    place,
                    params.initial_availability as usize,
                ))
            }
            PlaceTypeTag::WaitWithTimeout => {
                let params: WaitWithTimeoutParams = place_config.params_as()?;
                Box::new(WaitTimeoutBehavior::new(
                    place,
                    params.timeout(),
                    params.on_timeout.clone(),
                ))
            }
            PlaceTypeTag::Action => {
                let params: ActionPlaceParams = place_config.params_as()?;
                let policy = RetryPolicy {
                    max_retries: params.retries,
                    timeout: params.timeout_per_try(),
                    ..Default::default()
                };
                let mut behavior =
                    ActionBehavior::new(place, &params.action_id, policy, inner.router.clone());
                if let Some(invoker) = inner.registry.get(&params.action_id) {
                    behavior.set_invoker(invoker);
                }
                Box::new(behavior)
            }
            PlaceTypeTag::ExitLogger => {
                let mut behavior = ExitLoggerBehavior::new();
                let events = Arc::clone(events);
                behavior.set_logger(Box::new(move |place_id, token| {
                    if let Ok(mut slots) = events.lock() {
                        if let Some(callback) = slots.token_exit.as_mut() {
                            callback(place_id, token);
                        }
                    }
                }));
                Box::new(behavior)
            }
        };
        Ok(behavior)
    }

    /// Parse a JSON configuration string and load it.
    pub fn load_config_str(&self, json: &str) -> Result<(), EngineError> {
        match NetConfig::from_json_str(json) {
            Ok(config) => self.load_config(config),
            Err(err) => {
                self.lock_inner().errors.push(err.to_string());
                Err(err)
            }
        }
    }

    /// Read a configuration file and load it.
    pub fn load_config_file(&self, path: impl AsRef<std::path::Path>) -> Result<(), EngineError> {
        match NetConfig::from_path(path) {
            Ok(config) => self.load_config(config),
            Err(err) => {
                self.lock_inner().errors.push(err.to_string());
                Err(err)
            }
        }
    }

    /// The configuration most recently loaded, if any.
    pub fn config(&self) -> Option<NetConfig> {
        self.lock_inner().config.clone()
    }

    /// Register an invoker under `name` and bind it into every action
    /// place referring to that action. Rebinding replaces the previous
    /// invoker.
    pub fn register_action(&self, name: &str, invoker: ActionInvoker) {
        let mut inner = self.lock_inner();
        inner.registry.register(name, Arc::clone(&invoker));
        for (_, behavior) in &mut inner.behaviors {
            if let Some(action) = behavior.as_any_mut().downcast_mut::<ActionBehavior>() {
                if action.action_name() == name {
                    action.set_invoker(Arc::clone(&invoker));
                }
            }
        }
    }

    /// Inject a token at the named entrypoint place.
    ///
    /// Returns `None` when the place is unknown, is not an entrypoint, or
    /// the entrypoint rejects the token.
    pub fn inject_token(&self, entrypoint_id: &str, token: Token) -> Option<TokenId> {
        let mut inner = self.lock_inner();
        let inner = &mut *inner;

        let Some((_, behavior)) = inner
            .behaviors
            .iter_mut()
            .find(|(id, _)| id == entrypoint_id)
        else {
            tracing::warn!(place = entrypoint_id, "entrypoint not found");
            return None;
        };
        let Some(entrypoint) = behavior.as_any_mut().downcast_mut::<EntrypointBehavior>() else {
            tracing::warn!(place = entrypoint_id, "place is not an entrypoint");
            return None;
        };
        let place = inner.net.place_mut(entrypoint_id)?;

        let token_id = entrypoint.inject(place, token)?;
        inner.stats.tokens_processed += 1;
        tracing::debug!(place = entrypoint_id, token = token_id, "token injected");

        if let Some(entered) = place.tokens().get(token_id) {
            emit_token_enter(&self.events, entrypoint_id, entered);
        }
        Some(token_id)
    }

    /// Start the background tick loop.
    pub fn start(&mut self) {
        if self.state.load() != RuntimeState::Stopped {
            return;
        }
        self.state.store(RuntimeState::Starting);

        {
            let mut inner = self.lock_inner();
            inner.stats = RuntimeStats {
                started_at: Some(Instant::now()),
                ..Default::default()
            };
        }

        self.state.store(RuntimeState::Running);
        tracing::info!(run_id = %self.run_id, interval = ?self.tick_interval, "runtime started");

        let inner = Arc::clone(&self.inner);
        let events = Arc::clone(&self.events);
        let state = Arc::clone(&self.state);
        let interval = self.tick_interval;
        self.loop_handle = Some(std::thread::spawn(move || {
            while state.load() == RuntimeState::Running {
                {
                    let mut guard = match inner.lock() {
                        Ok(guard) => guard,
                        Err(poisoned) => poisoned.into_inner(),
                    };
                    guard.process_tick(&events);
                }
                std::thread::sleep(interval);
            }
        }));
    }

    /// Signal the loop to finish its current tick, then join it.
    pub fn stop(&mut self) {
        if self.state.load() != RuntimeState::Running {
            return;
        }
        self.state.store(RuntimeState::Stopping);
        if let Some(handle) = self.loop_handle.take() {
            let _ = handle.join();
        }
        self.state.store(RuntimeState::Stopped);
        tracing::info!(run_id = %self.run_id, "runtime stopped");
    }

    /// Run one tick. Thread-safe and mutually exclusive with the loop.
    pub fn tick(&self) {
        let mut inner = self.lock_inner();
        inner.process_tick(&self.events);
    }

    pub fn stats(&self) -> RuntimeStats {
        let inner = self.lock_inner();
        let mut stats = inner.stats.clone();
        stats.active_tokens = inner.active_tokens();
        stats
    }

    /// Tokens at a place as `(id, data)` pairs, across the default queue
    /// and all sub-queues.
    pub fn get_place_tokens(&self, place_id: &str) -> Vec<(TokenId, Value)> {
        let inner = self.lock_inner();
        let Some(place) = inner.net.place(place_id) else {
            return Vec::new();
        };
        let mut tokens = place.tokens().snapshot();
        if place.has_subqueues() {
            for sub in Subqueue::ALL {
                tokens.extend(place.sub(sub).snapshot());
            }
        }
        tokens
    }

    /// Tokens injected through the named entrypoint.
    pub fn injected_count(&self, place_id: &str) -> Option<u64> {
        let inner = self.lock_inner();
        inner
            .behaviors
            .iter()
            .find(|(id, _)| id == place_id)
            .and_then(|(_, b)| b.as_any().downcast_ref::<EntrypointBehavior>())
            .map(|b| b.injected_count())
    }

    /// Tokens destroyed by the named exit place.
    pub fn exit_count(&self, place_id: &str) -> Option<u64> {
        let inner = self.lock_inner();
        inner
            .behaviors
            .iter()
            .find(|(id, _)| id == place_id)
            .and_then(|(_, b)| b.as_any().downcast_ref::<ExitLoggerBehavior>())
            .map(|b| b.exit_count())
    }

    /// Errors accumulated by loading and execution.
    pub fn errors(&self) -> Vec<String> {
        self.lock_inner().errors.clone()
    }

    pub fn set_on_token_enter(&self, callback: impl FnMut(&str, &Token) + Send + 'static) {
        if let Ok(mut slots) = self.events.lock() {
            slots.token_enter = Some(Box::new(callback));
        }
    }

    pub fn set_on_token_exit(&self, callback: impl FnMut(&str, &Token) + Send + 'static) {
        if let Ok(mut slots) = self.events.lock() {
            slots.token_exit = Some(Box::new(callback));
        }
    }

    pub fn set_on_transition_fired(&self, callback: impl FnMut(&str, u64) + Send + 'static) {
        if let Ok(mut slots) = self.events.lock() {
            slots.transition_fired = Some(Box::new(callback));
        }
    }
}

impl Default for RuntimeController {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RuntimeController {
    fn drop(&mut self) {
        self.stop();
    }
}
