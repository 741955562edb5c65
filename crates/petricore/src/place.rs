use crate::{EngineError, Token, TokenId, TokenQueue};
use std::fmt;

/// Named sub-queues inside a place with sub-queues enabled.
///
/// Sub-queues let behaviours route tokens by outcome: an action place, for
/// example, delivers completed tokens to `success` and exhausted ones to
/// `failure` or `error`. They are independent of the place's default queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subqueue {
    Main,
    InExecution,
    Success,
    Failure,
    Error,
}

impl Subqueue {
    pub const ALL: [Subqueue; 5] = [
        Subqueue::Main,
        Subqueue::InExecution,
        Subqueue::Success,
        Subqueue::Failure,
        Subqueue::Error,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Subqueue::Main => "main",
            Subqueue::InExecution => "in_execution",
            Subqueue::Success => "success",
            Subqueue::Failure => "failure",
            Subqueue::Error => "error",
        }
    }

    pub fn from_suffix(suffix: &str) -> Option<Subqueue> {
        match suffix {
            "main" => Some(Subqueue::Main),
            "in_execution" => Some(Subqueue::InExecution),
            "success" => Some(Subqueue::Success),
            "failure" => Some(Subqueue::Failure),
            "error" => Some(Subqueue::Error),
            _ => None,
        }
    }
}

impl fmt::Display for Subqueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reference to a place, optionally naming one of its sub-queues with the
/// `place_id::suffix` syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceRef {
    pub place_id: String,
    pub sub: Option<Subqueue>,
}

impl PlaceRef {
    pub fn new(place_id: impl Into<String>, sub: Option<Subqueue>) -> Self {
        Self {
            place_id: place_id.into(),
            sub,
        }
    }

    /// Parse `"p"` or `"p::success"`. Unknown suffixes are rejected.
    pub fn parse(reference: &str) -> Result<Self, EngineError> {
        match reference.split_once("::") {
            None => Ok(Self::new(reference, None)),
            Some((place_id, suffix)) => {
                let sub = Subqueue::from_suffix(suffix).ok_or_else(|| {
                    EngineError::Config(format!(
                        "unknown sub-queue suffix '{suffix}' in place reference '{reference}'"
                    ))
                })?;
                Ok(Self::new(place_id, Some(sub)))
            }
        }
    }
}

impl fmt::Display for PlaceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sub {
            Some(sub) => write!(f, "{}::{}", self.place_id, sub),
            None => f.write_str(&self.place_id),
        }
    }
}

#[derive(Default)]
struct SubQueues {
    main: TokenQueue,
    in_execution: TokenQueue,
    success: TokenQueue,
    failure: TokenQueue,
    error: TokenQueue,
}

impl SubQueues {
    fn get(&self, sub: Subqueue) -> &TokenQueue {
        match sub {
            Subqueue::Main => &self.main,
            Subqueue::InExecution => &self.in_execution,
            Subqueue::Success => &self.success,
            Subqueue::Failure => &self.failure,
            Subqueue::Error => &self.error,
        }
    }

    fn get_mut(&mut self, sub: Subqueue) -> &mut TokenQueue {
        match sub {
            Subqueue::Main => &mut self.main,
            Subqueue::InExecution => &mut self.in_execution,
            Subqueue::Success => &mut self.success,
            Subqueue::Failure => &mut self.failure,
            Subqueue::Error => &mut self.error,
        }
    }
}

/// A place in the net that holds tokens.
///
/// Capacity, when set, bounds the default queue only; sub-queues are never
/// capped. `required_actors` is advisory metadata consumed by config
/// validation and user predicates, not enforced at runtime.
pub struct Place {
    id: String,
    capacity: Option<usize>,
    required_actors: Vec<String>,
    tokens: TokenQueue,
    subs: Option<Box<SubQueues>>,
}

impl Place {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            capacity: None,
            required_actors: Vec::new(),
            tokens: TokenQueue::new(),
            subs: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = Some(capacity);
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn set_required_actors(&mut self, actors: Vec<String>) {
        self.required_actors = actors;
    }

    pub fn required_actors(&self) -> &[String] {
        &self.required_actors
    }

    /// Add a token to the default queue.
    ///
    /// Fails with `ResourceExhausted` when the place is at capacity.
    pub fn add_token(&mut self, token: Token) -> Result<TokenId, EngineError> {
        if !self.can_accept_token() {
            return Err(EngineError::ResourceExhausted(self.id.clone()));
        }
        Ok(self.tokens.push(token))
    }

    /// Remove and return the oldest unlocked token from the default queue.
    pub fn remove_token(&mut self) -> Option<(TokenId, Token)> {
        self.tokens.pop()
    }

    /// Remove a specific token from the default queue by id.
    pub fn remove_token_by_id(&mut self, id: TokenId) -> Option<Token> {
        self.tokens.remove(id)
    }

    pub fn has_available_token(&self) -> bool {
        self.tokens.available_count() > 0
    }

    /// Total token count across the default queue and all sub-queues.
    pub fn token_count(&self) -> usize {
        let mut count = self.tokens.len();
        if let Some(subs) = &self.subs {
            for sub in Subqueue::ALL {
                count += subs.get(sub).len();
            }
        }
        count
    }

    /// Unlocked token count in the default queue.
    pub fn available_token_count(&self) -> usize {
        self.tokens.available_count()
    }

    pub fn can_accept_token(&self) -> bool {
        match self.capacity {
            Some(cap) => self.tokens.len() < cap,
            None => true,
        }
    }

    pub fn tokens(&self) -> &TokenQueue {
        &self.tokens
    }

    pub fn tokens_mut(&mut self) -> &mut TokenQueue {
        &mut self.tokens
    }

    pub fn has_subqueues(&self) -> bool {
        self.subs.is_some()
    }

    /// Create the five sub-queues. Idempotent.
    pub fn enable_subqueues(&mut self) {
        if self.subs.is_none() {
            self.subs = Some(Box::default());
        }
    }

    /// Resolve a queue selector: `None` is the default queue, `Some(sub)`
    /// requires sub-queues to be enabled.
    pub fn queue(&self, sub: Option<Subqueue>) -> Option<&TokenQueue> {
        match sub {
            None => Some(&self.tokens),
            Some(s) => self.subs.as_ref().map(|subs| subs.get(s)),
        }
    }

    pub fn queue_mut(&mut self, sub: Option<Subqueue>) -> Option<&mut TokenQueue> {
        match sub {
            None => Some(&mut self.tokens),
            Some(s) => self.subs.as_mut().map(|subs| subs.get_mut(s)),
        }
    }

    /// Access a sub-queue directly.
    ///
    /// # Panics
    /// Panics when sub-queues are not enabled. Behaviours that use this
    /// enable sub-queues in their constructor, so a panic here is a wiring
    /// bug, not a runtime condition.
    pub fn sub(&self, sub: Subqueue) -> &TokenQueue {
        match &self.subs {
            Some(subs) => subs.get(sub),
            None => panic!("sub-queues not enabled for place '{}'", self.id),
        }
    }

    /// Mutable variant of [`Place::sub`]. Same panic contract.
    pub fn sub_mut(&mut self, sub: Subqueue) -> &mut TokenQueue {
        match &mut self.subs {
            Some(subs) => subs.get_mut(sub),
            None => panic!("sub-queues not enabled for place '{}'", self.id),
        }
    }

    /// Move a token between queues of this place. No-op when the token is
    /// not found in the source queue.
    pub fn move_token(&mut self, id: TokenId, from: Option<Subqueue>, to: Option<Subqueue>) {
        let token = match self.queue_mut(from).and_then(|q| q.remove(id)) {
            Some(token) => token,
            None => return,
        };
        if let Some(queue) = self.queue_mut(to) {
            queue.push(token);
        }
    }
}
