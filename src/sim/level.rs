//! Level and campaign configuration.
//!
//! Level data (capacities, costs, targets, difficulty curve) is supplied
//! externally as JSON; the engine only validates and consumes it.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::net::{DbRole, NodeKind, NodeParams};

use super::SimTime;

const BUILTIN_CAMPAIGN: &str = include_str!("../../levels/campaign.json");
const SCHEMA_VERSION: u32 = 1;

/// Errors rejected before a run starts.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("level has no user node")]
    NoUsers,
    #[error("{kind} capacity must be positive")]
    ZeroCapacity { kind: NodeKind },
    #[error("{field} must be within [0, 1], got {value}")]
    OutOfRange { field: String, value: f64 },
    #[error("{field} must be positive")]
    NotPositive { field: String },
    #[error("read_replica is only valid for database nodes, got {kind}")]
    ReplicaOnNonDatabase { kind: NodeKind },
    #[error("duplicate node key {0}")]
    DuplicateKey(String),
    #[error("unknown level {number} (campaign has {available})")]
    UnknownLevel { number: usize, available: usize },
    #[error("unsupported schema_version {0}")]
    UnsupportedSchema(u32),
    #[error("invalid level json: {0}")]
    Json(#[from] serde_json::Error),
}

/// A full campaign: an ordered list of levels, numbered from 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignSpec {
    pub schema_version: u32,
    pub levels: Vec<LevelSpec>,
}

impl CampaignSpec {
    /// Parse and validate every level.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let campaign: CampaignSpec = serde_json::from_str(raw)?;
        if campaign.schema_version != SCHEMA_VERSION {
            return Err(ConfigError::UnsupportedSchema(campaign.schema_version));
        }
        for level in &campaign.levels {
            level.validate()?;
        }
        Ok(campaign)
    }

    /// The campaign shipped in `levels/campaign.json`.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_json(BUILTIN_CAMPAIGN)
    }

    pub fn level(&self, number: usize) -> Result<&LevelSpec, ConfigError> {
        number
            .checked_sub(1)
            .and_then(|idx| self.levels.get(idx))
            .ok_or(ConfigError::UnknownLevel {
                number,
                available: self.levels.len(),
            })
    }
}

/// Per-kind node tuning. Every field is optional and overrides the layer below.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_capacity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hit_rate: Option<f64>,
    /// Client-side concurrency cap; only meaningful on user nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_inflight: Option<u32>,
}

impl NodeSpec {
    pub fn apply(&self, mut params: NodeParams) -> NodeParams {
        if let Some(c) = self.capacity {
            params.capacity = c;
        }
        if let Some(ms) = self.delay_ms {
            params.delay = SimTime::from_millis(ms);
        }
        if let Some(ms) = self.min_delay_ms {
            params.min_delay = SimTime::from_millis(ms);
        }
        if self.max_capacity.is_some() {
            params.max_capacity = self.max_capacity;
        }
        if let Some(p) = self.hit_rate {
            params.hit_rate = p;
        }
        if self.max_inflight.is_some() {
            params.max_inflight = self.max_inflight;
        }
        params
    }
}

/// One node present when the level starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacedNode {
    pub kind: NodeKind,
    #[serde(default)]
    pub read_replica: bool,
    /// Explicit registry key; generated from the kind when absent.
    #[serde(default)]
    pub key: Option<String>,
    #[serde(flatten)]
    pub overrides: NodeSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageSpec {
    pub delay_ms: u64,
    pub packets_per_wave: u32,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficSpec {
    pub initial_delay_ms: u64,
    pub packets_per_wave: u32,
    #[serde(default = "default_stagger_ms")]
    pub stagger_ms: u64,
    #[serde(default = "default_write_ratio")]
    pub write_ratio: f64,
    pub difficulty_interval_ms: u64,
    #[serde(default)]
    pub stages: Vec<StageSpec>,
}

/// Purchase costs and per-kind count limits, keyed by purchase slug
/// (`app_server`, `cache`, `cdn`, `load_balancer`, `database`, `read_replica`, `queue`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomySpec {
    pub costs: BTreeMap<String, u64>,
    /// Missing slug means unlimited.
    pub limits: BTreeMap<String, u32>,
    pub upgrade_cost: u64,
}

impl Default for EconomySpec {
    fn default() -> Self {
        let costs = [
            ("app_server", 50),
            ("cache", 75),
            ("cdn", 100),
            ("load_balancer", 80),
            ("database", 120),
            ("read_replica", 100),
            ("queue", 60),
        ]
        .into_iter()
        .map(|(slug, cost)| (slug.to_string(), cost))
        .collect();
        Self {
            costs,
            limits: BTreeMap::new(),
            upgrade_cost: 40,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelSpec {
    #[serde(default)]
    pub name: Option<String>,
    pub target_total: u64,
    pub max_error_rate: f64,
    #[serde(default)]
    pub starting_money: u64,
    #[serde(default = "default_reward")]
    pub reward_per_success: u64,
    /// Hop latency between nodes, independent of processing delay.
    #[serde(default)]
    pub transit_ms: u64,
    #[serde(default)]
    pub seed: Option<u64>,
    /// Whether packets lost to a missing/inactive destination count as errors.
    #[serde(default = "default_true")]
    pub count_unroutable_as_error: bool,
    #[serde(default)]
    pub node_defaults: BTreeMap<NodeKind, NodeSpec>,
    pub topology: Vec<PlacedNode>,
    pub traffic: TrafficSpec,
    #[serde(default)]
    pub economy: EconomySpec,
}

fn default_stagger_ms() -> u64 {
    50
}

fn default_write_ratio() -> f64 {
    0.3
}

fn default_reward() -> u64 {
    1
}

fn default_true() -> bool {
    true
}

fn check_unit(field: impl Into<String>, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field: field.into(),
            value,
        })
    }
}

fn check_positive(field: impl Into<String>, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::NotPositive {
            field: field.into(),
        });
    }
    Ok(())
}

impl LevelSpec {
    /// Resolve node parameters: built-in kind defaults, then `node_defaults`, then per-node overrides.
    pub fn params_for(&self, kind: NodeKind, read_replica: bool, overrides: &NodeSpec) -> NodeParams {
        let mut params = NodeParams::defaults(kind);
        if let Some(level_defaults) = self.node_defaults.get(&kind) {
            params = level_defaults.apply(params);
        }
        params = overrides.apply(params);
        if kind == NodeKind::Database && read_replica {
            params.role = DbRole::Replica;
        }
        params
    }

    pub fn transit(&self) -> SimTime {
        SimTime::from_millis(self.transit_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_positive("target_total", self.target_total)?;
        check_unit("max_error_rate", self.max_error_rate)?;

        let t = &self.traffic;
        check_positive("traffic.initial_delay_ms", t.initial_delay_ms)?;
        check_positive("traffic.packets_per_wave", u64::from(t.packets_per_wave))?;
        check_positive("traffic.difficulty_interval_ms", t.difficulty_interval_ms)?;
        check_unit("traffic.write_ratio", t.write_ratio)?;
        for (i, stage) in t.stages.iter().enumerate() {
            check_positive(format!("traffic.stages[{i}].delay_ms"), stage.delay_ms)?;
            check_positive(
                format!("traffic.stages[{i}].packets_per_wave"),
                u64::from(stage.packets_per_wave),
            )?;
        }

        // 购买时也会用到各类型默认参数，所以全部校验
        for kind in NodeKind::ALL {
            Self::check_params(kind, &self.params_for(kind, false, &NodeSpec::default()))?;
        }

        let mut users = 0usize;
        let mut keys = HashSet::new();
        for placed in &self.topology {
            if placed.read_replica && placed.kind != NodeKind::Database {
                return Err(ConfigError::ReplicaOnNonDatabase { kind: placed.kind });
            }
            if let Some(key) = &placed.key {
                if !keys.insert(key.as_str()) {
                    return Err(ConfigError::DuplicateKey(key.clone()));
                }
            }
            let params = self.params_for(placed.kind, placed.read_replica, &placed.overrides);
            Self::check_params(placed.kind, &params)?;
            if placed.kind == NodeKind::User {
                users += 1;
            }
        }
        if users == 0 {
            return Err(ConfigError::NoUsers);
        }
        Ok(())
    }

    fn check_params(kind: NodeKind, params: &NodeParams) -> Result<(), ConfigError> {
        if params.capacity == 0 {
            return Err(ConfigError::ZeroCapacity { kind });
        }
        check_unit(format!("{kind}.hit_rate"), params.hit_rate)
    }
}
