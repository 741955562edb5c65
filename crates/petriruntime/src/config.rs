use petricore::{EngineError, PlaceRef};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

/// Parameter type specification for actor init params.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParamSpec {
    #[serde(rename = "type", default)]
    pub ty: String,
}

/// Actor type definition. Metadata for external actor factories; the
/// engine itself only uses the ids for advisory validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorConfig {
    pub id: String,
    #[serde(default)]
    pub required_init_params: BTreeMap<String, ParamSpec>,
    #[serde(default)]
    pub optional_init_params: BTreeMap<String, ParamSpec>,
}

/// Action definition. Metadata only: names the actors an action expects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionConfig {
    pub id: String,
    #[serde(default)]
    pub required_actors: Vec<String>,
}

/// Place type discriminant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceTypeTag {
    #[default]
    Plain,
    Entrypoint,
    ResourcePool,
    WaitWithTimeout,
    Action,
    ExitLogger,
}

impl PlaceTypeTag {
    /// Whether this place type enables sub-queues, making
    /// `place::suffix` references to it resolvable.
    pub fn has_subqueues(self) -> bool {
        matches!(self, PlaceTypeTag::WaitWithTimeout | PlaceTypeTag::Action)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntrypointParams {
    #[serde(default)]
    pub new_actors: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourcePoolParams {
    #[serde(default)]
    pub resource_id: String,
    #[serde(default)]
    pub initial_availability: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WaitWithTimeoutParams {
    #[serde(default)]
    pub timeout_s: Option<u64>,
    #[serde(default)]
    pub timeout_min: Option<u64>,
    #[serde(default)]
    pub on_timeout: Option<String>,
}

impl WaitWithTimeoutParams {
    /// Effective timeout; minutes take precedence, default is 60 s.
    pub fn timeout(&self) -> Duration {
        if let Some(min) = self.timeout_min {
            Duration::from_secs(min * 60)
        } else if let Some(s) = self.timeout_s {
            Duration::from_secs(s)
        } else {
            Duration::from_secs(60)
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionPlaceParams {
    #[serde(default)]
    pub action_id: String,
    #[serde(default)]
    pub retries: u32,
    #[serde(default)]
    pub timeout_per_try_s: Option<u64>,
    #[serde(default)]
    pub timeout_per_try_min: Option<u64>,
    // Parsed but not consumed: semantics are undocumented, so setting
    // either flag only produces a load-time warning.
    #[serde(default)]
    pub failure_as_error: Option<bool>,
    #[serde(default)]
    pub error_to_global_handler: Option<bool>,
}

impl ActionPlaceParams {
    /// Effective per-attempt timeout; minutes take precedence, default is
    /// 30 s.
    pub fn timeout_per_try(&self) -> Duration {
        if let Some(min) = self.timeout_per_try_min {
            Duration::from_secs(min * 60)
        } else if let Some(s) = self.timeout_per_try_s {
            Duration::from_secs(s)
        } else {
            Duration::from_secs(30)
        }
    }
}

/// Place definition: id, type tag, and type-specific params resolved on
/// demand with [`PlaceConfig::params_as`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceConfig {
    pub id: String,
    #[serde(rename = "type", default)]
    pub place_type: PlaceTypeTag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl PlaceConfig {
    /// Deserialize the raw params into the typed struct for this place
    /// type. Missing params resolve to the struct's defaults.
    pub fn params_as<T>(&self) -> Result<T, EngineError>
    where
        T: serde::de::DeserializeOwned + Default,
    {
        match &self.params {
            None => Ok(T::default()),
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
                EngineError::Config(format!("invalid params for place '{}': {e}", self.id))
            }),
        }
    }
}

/// Output arc: either a bare place reference or an object carrying a token
/// filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputArcConfig {
    Simple(String),
    Detailed {
        to: String,
        #[serde(default)]
        token_filter: Option<String>,
    },
}

impl OutputArcConfig {
    pub fn to(&self) -> &str {
        match self {
            OutputArcConfig::Simple(to) => to,
            OutputArcConfig::Detailed { to, .. } => to,
        }
    }

    pub fn token_filter(&self) -> Option<&str> {
        match self {
            OutputArcConfig::Simple(_) => None,
            OutputArcConfig::Detailed { token_filter, .. } => token_filter.as_deref(),
        }
    }
}

/// Transition definition. Ids are assigned positionally (`t1, t2, …`) when
/// the controller loads the net.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionConfig {
    pub from: Vec<String>,
    pub to: Vec<OutputArcConfig>,
    #[serde(default)]
    pub priority: Option<i32>,
}

/// Validation outcome: errors block loading, warnings are advisory.
#[derive(Debug, Default)]
pub struct ConfigReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ConfigReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Complete parsed net configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetConfig {
    #[serde(default)]
    pub actors: Vec<ActorConfig>,
    #[serde(default)]
    pub actions: Vec<ActionConfig>,
    pub places: Vec<PlaceConfig>,
    pub transitions: Vec<TransitionConfig>,
}

impl NetConfig {
    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        serde_json::from_str(json).map_err(|e| EngineError::Config(e.to_string()))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            EngineError::Config(format!("failed to read {}: {e}", path.as_ref().display()))
        })?;
        Self::from_json_str(&raw)
    }

    /// Structural validation ahead of net construction.
    pub fn validate(&self) -> ConfigReport {
        let mut report = ConfigReport::default();

        let mut place_ids = HashSet::new();
        for place in &self.places {
            if !place_ids.insert(place.id.as_str()) {
                report.errors.push(format!("duplicate place id: {}", place.id));
            }
        }

        let actor_ids: HashSet<&str> = self.actors.iter().map(|a| a.id.as_str()).collect();
        let action_ids: HashSet<&str> = self.actions.iter().map(|a| a.id.as_str()).collect();

        for action in &self.actions {
            for actor in &action.required_actors {
                if !actor_ids.contains(actor.as_str()) {
                    report.warnings.push(format!(
                        "action '{}' requires unknown actor '{actor}'",
                        action.id
                    ));
                }
            }
        }

        for place in &self.places {
            match place.place_type {
                PlaceTypeTag::Action => match place.params_as::<ActionPlaceParams>() {
                    Ok(params) => {
                        if params.action_id.is_empty() {
                            report
                                .errors
                                .push(format!("action place '{}' has no action_id", place.id));
                        } else if !action_ids.is_empty()
                            && !action_ids.contains(params.action_id.as_str())
                        {
                            report.warnings.push(format!(
                                "action place '{}' references undeclared action '{}'",
                                place.id, params.action_id
                            ));
                        }
                        if params.failure_as_error.is_some() {
                            report.warnings.push(format!(
                                "place '{}': failure_as_error is parsed but has no effect",
                                place.id
                            ));
                        }
                        if params.error_to_global_handler.is_some() {
                            report.warnings.push(format!(
                                "place '{}': error_to_global_handler is parsed but has no effect",
                                place.id
                            ));
                        }
                    }
                    Err(e) => report.errors.push(e.to_string()),
                },
                PlaceTypeTag::WaitWithTimeout => {
                    if let Err(e) = place.params_as::<WaitWithTimeoutParams>() {
                        report.errors.push(e.to_string());
                    }
                }
                PlaceTypeTag::ResourcePool => {
                    if let Err(e) = place.params_as::<ResourcePoolParams>() {
                        report.errors.push(e.to_string());
                    }
                }
                PlaceTypeTag::Entrypoint => match place.params_as::<EntrypointParams>() {
                    Ok(params) => {
                        for actor in &params.new_actors {
                            if !actor_ids.contains(actor.as_str()) {
                                report.warnings.push(format!(
                                    "entrypoint '{}' names unknown actor '{actor}'",
                                    place.id
                                ));
                            }
                        }
                    }
                    Err(e) => report.errors.push(e.to_string()),
                },
                PlaceTypeTag::Plain | PlaceTypeTag::ExitLogger => {}
            }
        }

        for (index, transition) in self.transitions.iter().enumerate() {
            let label = format!("t{}", index + 1);
            let check_ref = |reference: &str, report: &mut ConfigReport| {
                match PlaceRef::parse(reference) {
                    Err(e) => report.errors.push(format!("{label}: {e}")),
                    Ok(parsed) => {
                        let Some(place) = self.places.iter().find(|p| p.id == parsed.place_id)
                        else {
                            report
                                .errors
                                .push(format!("{label}: unknown place '{}'", parsed.place_id));
                            return;
                        };
                        if parsed.sub.is_some() && !place.place_type.has_subqueues() {
                            report.errors.push(format!(
                                "{label}: place '{}' has no sub-queues but '{reference}' names one",
                                parsed.place_id
                            ));
                        }
                    }
                }
            };

            for from in &transition.from {
                check_ref(from, &mut report);
            }
            for to in &transition.to {
                check_ref(to.to(), &mut report);
            }

            if transition.from.len() != transition.to.len() {
                report.warnings.push(format!(
                    "{label}: {} inputs feed {} outputs; surplus tokens are dropped",
                    transition.from.len(),
                    transition.to.len()
                ));
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINEAR: &str = r#"{
        "places": [
            {"id": "entry", "type": "entrypoint"},
            {"id": "mid"},
            {"id": "exit", "type": "exit_logger"}
        ],
        "transitions": [
            {"from": ["entry"], "to": ["mid"]},
            {"from": ["mid"], "to": ["exit"], "priority": 3}
        ]
    }"#;

    #[test]
    fn parse_linear_config() {
        let config = NetConfig::from_json_str(LINEAR).unwrap();
        assert_eq!(config.places.len(), 3);
        assert_eq!(config.places[0].place_type, PlaceTypeTag::Entrypoint);
        assert_eq!(config.places[1].place_type, PlaceTypeTag::Plain);
        assert_eq!(config.transitions[1].priority, Some(3));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn invalid_json_is_a_config_error() {
        let err = NetConfig::from_json_str("not json").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn missing_places_is_rejected() {
        assert!(NetConfig::from_json_str(r#"{"transitions": []}"#).is_err());
    }

    #[test]
    fn action_params_parse_with_defaults() {
        let config = NetConfig::from_json_str(
            r#"{
                "actions": [{"id": "pick", "required_actors": ["robot"]}],
                "places": [
                    {"id": "act", "type": "action",
                     "params": {"action_id": "pick", "retries": 2, "timeout_per_try_s": 5}}
                ],
                "transitions": []
            }"#,
        )
        .unwrap();

        let params: ActionPlaceParams = config.places[0].params_as().unwrap();
        assert_eq!(params.action_id, "pick");
        assert_eq!(params.retries, 2);
        assert_eq!(params.timeout_per_try(), Duration::from_secs(5));
        assert_eq!(params.failure_as_error, None);
    }

    #[test]
    fn wait_timeout_units() {
        let minutes = WaitWithTimeoutParams {
            timeout_min: Some(2),
            ..Default::default()
        };
        assert_eq!(minutes.timeout(), Duration::from_secs(120));

        let seconds = WaitWithTimeoutParams {
            timeout_s: Some(45),
            ..Default::default()
        };
        assert_eq!(seconds.timeout(), Duration::from_secs(45));

        assert_eq!(WaitWithTimeoutParams::default().timeout(), Duration::from_secs(60));
    }

    #[test]
    fn output_arc_accepts_string_or_object() {
        let config = NetConfig::from_json_str(
            r#"{
                "places": [
                    {"id": "a", "type": "entrypoint"},
                    {"id": "b"}
                ],
                "transitions": [
                    {"from": ["a"], "to": [{"to": "b", "token_filter": "user::Robot"}]}
                ]
            }"#,
        )
        .unwrap();
        let arc = &config.transitions[0].to[0];
        assert_eq!(arc.to(), "b");
        assert_eq!(arc.token_filter(), Some("user::Robot"));
    }

    #[test]
    fn validation_flags_structural_errors() {
        let config = NetConfig::from_json_str(
            r#"{
                "places": [
                    {"id": "p"},
                    {"id": "p"},
                    {"id": "act", "type": "action", "params": {}}
                ],
                "transitions": [
                    {"from": ["ghost"], "to": ["p::success"]}
                ]
            }"#,
        )
        .unwrap();

        let report = config.validate();
        assert!(!report.is_ok());
        assert!(report.errors.iter().any(|e| e.contains("duplicate place id")));
        assert!(report.errors.iter().any(|e| e.contains("no action_id")));
        assert!(report.errors.iter().any(|e| e.contains("unknown place 'ghost'")));
        assert!(report.errors.iter().any(|e| e.contains("no sub-queues")));
    }

    #[test]
    fn undocumented_flags_warn() {
        let config = NetConfig::from_json_str(
            r#"{
                "actions": [{"id": "pick"}],
                "places": [
                    {"id": "act", "type": "action",
                     "params": {"action_id": "pick", "failure_as_error": true}}
                ],
                "transitions": []
            }"#,
        )
        .unwrap();

        let report = config.validate();
        assert!(report.is_ok());
        assert!(report
            .warnings
            .iter()
            .any(|w| w.contains("failure_as_error")));
    }

    #[test]
    fn weight_imbalance_warns() {
        let config = NetConfig::from_json_str(
            r#"{
                "places": [{"id": "a"}, {"id": "b"}, {"id": "c"}],
                "transitions": [
                    {"from": ["a", "b"], "to": ["c"]}
                ]
            }"#,
        )
        .unwrap();

        let report = config.validate();
        assert!(report.is_ok());
        assert!(report.warnings.iter().any(|w| w.contains("surplus tokens")));
    }
}
