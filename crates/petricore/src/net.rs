use crate::{EngineError, Place, PlaceRef, Token, TokenId, TokenQueue};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArcDirection {
    /// Input arc (place -> transition).
    PlaceToTransition,
    /// Output arc (transition -> place).
    TransitionToPlace,
}

/// An arc connecting a place (or one of its sub-queues) and a transition.
#[derive(Debug, Clone)]
pub struct Arc {
    place: PlaceRef,
    transition_id: String,
    direction: ArcDirection,
    weight: u32,
    token_filter: Option<String>,
}

impl Arc {
    pub fn new(place: PlaceRef, transition_id: impl Into<String>, direction: ArcDirection) -> Self {
        Self {
            place,
            transition_id: transition_id.into(),
            direction,
            weight: 1,
            token_filter: None,
        }
    }

    pub fn place(&self) -> &PlaceRef {
        &self.place
    }

    pub fn transition_id(&self) -> &str {
        &self.transition_id
    }

    pub fn direction(&self) -> ArcDirection {
        self.direction
    }

    /// Tokens moved per firing. Clamped to at least 1.
    pub fn set_weight(&mut self, weight: u32) {
        self.weight = weight.max(1);
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    /// Restrict this arc to tokens carrying an actor with the given type
    /// tag. On input arcs the filter participates in enabling and token
    /// selection; on output arcs it is routing metadata only.
    pub fn set_token_filter(&mut self, actor_type: impl Into<String>) {
        self.token_filter = Some(actor_type.into());
    }

    pub fn token_filter(&self) -> Option<&str> {
        self.token_filter.as_deref()
    }
}

/// A transition moving tokens between places when it fires.
#[derive(Debug, Clone)]
pub struct Transition {
    id: String,
    priority: i32,
    input_arcs: Vec<Arc>,
    output_arcs: Vec<Arc>,
    last_fired_epoch: u64,
}

impl Transition {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            priority: 1,
            input_arcs: Vec::new(),
            output_arcs: Vec::new(),
            last_fired_epoch: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Higher priority fires first. Defaults to 1.
    pub fn set_priority(&mut self, priority: i32) {
        self.priority = priority;
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn add_input_arc(&mut self, arc: Arc) {
        self.input_arcs.push(arc);
    }

    pub fn add_output_arc(&mut self, arc: Arc) {
        self.output_arcs.push(arc);
    }

    pub fn input_arcs(&self) -> &[Arc] {
        &self.input_arcs
    }

    pub fn output_arcs(&self) -> &[Arc] {
        &self.output_arcs
    }

    pub fn set_last_fired_epoch(&mut self, epoch: u64) {
        self.last_fired_epoch = epoch;
    }

    pub fn last_fired_epoch(&self) -> u64 {
        self.last_fired_epoch
    }
}

/// Outcome of a successful firing.
///
/// `produced` lists the destination and new token id of every token pushed,
/// in output-arc declaration order, so the caller can deliver exactly the
/// newly-arrived tokens to place behaviours.
#[derive(Debug)]
pub struct FireOutcome {
    pub transition_id: String,
    pub consumed: usize,
    pub produced: Vec<(PlaceRef, TokenId)>,
}

/// The complete net: places, transitions, and the tokens inside them.
///
/// The net exclusively owns its places and transitions; arcs are owned by
/// their transitions. Firing moves token ownership between queues.
#[derive(Default)]
pub struct Net {
    places: HashMap<String, Place>,
    transitions: HashMap<String, Transition>,
}

impl Net {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_place(&mut self, place: Place) {
        self.places.insert(place.id().to_string(), place);
    }

    pub fn add_transition(&mut self, transition: Transition) {
        self.transitions
            .insert(transition.id().to_string(), transition);
    }

    pub fn place(&self, id: &str) -> Option<&Place> {
        self.places.get(id)
    }

    pub fn place_mut(&mut self, id: &str) -> Option<&mut Place> {
        self.places.get_mut(id)
    }

    pub fn transition(&self, id: &str) -> Option<&Transition> {
        self.transitions.get(id)
    }

    pub fn transition_mut(&mut self, id: &str) -> Option<&mut Transition> {
        self.transitions.get_mut(id)
    }

    pub fn places(&self) -> impl Iterator<Item = &Place> {
        self.places.values()
    }

    pub fn transitions(&self) -> impl Iterator<Item = &Transition> {
        self.transitions.values()
    }

    pub fn place_count(&self) -> usize {
        self.places.len()
    }

    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }

    /// Resolve a place reference to its queue.
    pub fn resolve(&self, reference: &PlaceRef) -> Option<&TokenQueue> {
        self.places.get(&reference.place_id)?.queue(reference.sub)
    }

    /// Transition ids ordered for firing: priority descending, then least
    /// recently fired, then id. The id tie-break keeps tick order
    /// deterministic.
    pub fn transition_ids_by_priority(&self) -> Vec<String> {
        let mut transitions: Vec<&Transition> = self.transitions.values().collect();
        transitions.sort_by(|a, b| {
            b.priority()
                .cmp(&a.priority())
                .then(a.last_fired_epoch().cmp(&b.last_fired_epoch()))
                .then(a.id().cmp(b.id()))
        });
        transitions.into_iter().map(|t| t.id().to_string()).collect()
    }

    /// A transition is enabled when every input arc's queue exists and
    /// holds at least `weight` unlocked tokens, counting only tokens that
    /// carry the filtered actor type when a filter is set.
    pub fn is_enabled(&self, transition: &Transition) -> bool {
        transition.input_arcs().iter().all(|arc| {
            let Some(queue) = self.resolve(arc.place()) else {
                return false;
            };
            let available = match arc.token_filter() {
                Some(filter) => queue.available_matching(|t| t.has_actor_named(filter)),
                None => queue.available_count(),
            };
            available >= arc.weight() as usize
        })
    }

    pub fn is_transition_enabled(&self, id: &str) -> bool {
        self.transitions
            .get(id)
            .map(|t| self.is_enabled(t))
            .unwrap_or(false)
    }

    /// Ids of all currently enabled transitions, in firing order.
    pub fn enabled_transitions(&self) -> Vec<String> {
        self.transition_ids_by_priority()
            .into_iter()
            .filter(|id| self.is_transition_enabled(id))
            .collect()
    }

    /// Fire a transition: consume `weight` tokens per input arc, produce
    /// them on the output arcs in declaration order, and stamp the epoch.
    ///
    /// The firing is atomic from the caller's perspective. If any input
    /// cannot supply its tokens, or any output destination is missing or
    /// would exceed its capacity, everything consumed so far is returned to
    /// its source queue in reverse order and an error is returned.
    pub fn fire(&mut self, transition_id: &str, epoch: u64) -> Result<FireOutcome, EngineError> {
        let transition = self
            .transitions
            .get(transition_id)
            .ok_or_else(|| EngineError::Runtime(format!("transition not found: {transition_id}")))?;
        let input_arcs = transition.input_arcs().to_vec();
        let output_arcs = transition.output_arcs().to_vec();

        // Phase 1: consume from inputs, remembering sources for rollback.
        let mut consumed: Vec<(PlaceRef, Token)> = Vec::new();
        for arc in &input_arcs {
            for _ in 0..arc.weight() {
                let queue = self
                    .places
                    .get_mut(&arc.place().place_id)
                    .and_then(|p| p.queue_mut(arc.place().sub));
                let popped = match queue {
                    Some(q) => match arc.token_filter() {
                        Some(filter) => q.pop_where(|t| t.has_actor_named(filter)),
                        None => q.pop(),
                    },
                    None => None,
                };
                match popped {
                    Some((_, token)) => consumed.push((arc.place().clone(), token)),
                    None => {
                        self.rollback(consumed);
                        return Err(EngineError::Runtime(format!(
                            "failed to consume token from {} for transition {transition_id}",
                            arc.place()
                        )));
                    }
                }
            }
        }

        // Phase 2a: verify every destination exists and has room before any
        // push, so phase 2b cannot fail midway.
        let mut supply = consumed.len();
        let mut planned: HashMap<&str, usize> = HashMap::new();
        for arc in &output_arcs {
            let count = (arc.weight() as usize).min(supply);
            supply -= count;
            let dest = arc.place();
            let exists = self
                .places
                .get(&dest.place_id)
                .and_then(|p| p.queue(dest.sub))
                .is_some();
            if !exists {
                self.rollback(consumed);
                return Err(EngineError::Runtime(format!(
                    "output queue not found: {dest}"
                )));
            }
            if dest.sub.is_none() && count > 0 {
                *planned.entry(dest.place_id.as_str()).or_default() += count;
            }
        }
        for (place_id, incoming) in &planned {
            let place = &self.places[*place_id];
            if let Some(cap) = place.capacity() {
                if place.tokens().len() + incoming > cap {
                    let place_id = place_id.to_string();
                    self.rollback(consumed);
                    return Err(EngineError::ResourceExhausted(place_id));
                }
            }
        }

        // Phase 2b: produce. Tokens are drawn from the consumed list in
        // order, so the first input routes to the first output. Surplus
        // consumed tokens (inputs outweigh outputs) are dropped.
        let total = consumed.len();
        let mut tokens = consumed.into_iter().map(|(_, t)| t);
        let mut produced = Vec::new();
        'outer: for arc in &output_arcs {
            for _ in 0..arc.weight() {
                let Some(token) = tokens.next() else {
                    break 'outer;
                };
                let dest = arc.place();
                let queue = self
                    .places
                    .get_mut(&dest.place_id)
                    .and_then(|p| p.queue_mut(dest.sub))
                    .expect("destination verified in phase 2a");
                let id = queue.push(token);
                produced.push((dest.clone(), id));
            }
        }

        if let Some(transition) = self.transitions.get_mut(transition_id) {
            transition.set_last_fired_epoch(epoch);
        }

        Ok(FireOutcome {
            transition_id: transition_id.to_string(),
            consumed: total,
            produced,
        })
    }

    /// Return consumed tokens to their source queues, most recent first.
    fn rollback(&mut self, consumed: Vec<(PlaceRef, Token)>) {
        for (source, token) in consumed.into_iter().rev() {
            if let Some(queue) = self
                .places
                .get_mut(&source.place_id)
                .and_then(|p| p.queue_mut(source.sub))
            {
                queue.push(token);
            }
        }
    }
}
