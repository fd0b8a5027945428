use crate::net::{DbRole, NodeKind};
use crate::sim::{CampaignSpec, ConfigError, LevelSpec, NodeSpec, SimTime};
use serde_json::{Value, json};

fn base_level() -> Value {
    json!({
        "target_total": 20,
        "max_error_rate": 0.1,
        "node_defaults": { "app_server": { "capacity": 8 } },
        "topology": [
            { "kind": "user" },
            { "kind": "app_server", "delay_ms": 120 },
            { "kind": "database", "read_replica": true }
        ],
        "traffic": {
            "initial_delay_ms": 1000,
            "packets_per_wave": 2,
            "difficulty_interval_ms": 10000
        }
    })
}

fn parse(v: Value) -> LevelSpec {
    serde_json::from_value(v).expect("level json")
}

fn validate(v: Value) -> Result<(), ConfigError> {
    parse(v).validate()
}

#[test]
fn builtin_campaign_is_valid_and_numbered_from_one() {
    let campaign = CampaignSpec::builtin().expect("builtin campaign");
    assert_eq!(campaign.levels.len(), 3);
    assert_eq!(
        campaign.level(1).ok().and_then(|l| l.name.as_deref()),
        Some("monolith")
    );
    assert!(matches!(
        campaign.level(0),
        Err(ConfigError::UnknownLevel { number: 0, available: 3 })
    ));
    assert!(matches!(
        campaign.level(4),
        Err(ConfigError::UnknownLevel { number: 4, .. })
    ));
}

#[test]
fn optional_fields_take_their_defaults() {
    let level = parse(base_level());
    assert_eq!(level.reward_per_success, 1);
    assert_eq!(level.starting_money, 0);
    assert!(level.count_unroutable_as_error);
    assert_eq!(level.transit(), SimTime::ZERO);
    assert_eq!(level.traffic.stagger_ms, 50);
    assert_eq!(level.traffic.write_ratio, 0.3);
    assert_eq!(level.economy.costs.get("read_replica"), Some(&100));
    assert!(level.validate().is_ok());
}

#[test]
fn node_parameters_are_layered_defaults_then_level_then_node() {
    let level = parse(base_level());
    let app = &level.topology[1];
    let p = level.params_for(app.kind, app.read_replica, &app.overrides);
    assert_eq!(p.capacity, 8);
    assert_eq!(p.delay, SimTime::from_millis(120));

    let purchased = level.params_for(NodeKind::AppServer, false, &NodeSpec::default());
    assert_eq!(purchased.capacity, 8);
    assert_eq!(purchased.delay, SimTime::from_millis(300));

    let db = &level.topology[2];
    let p = level.params_for(db.kind, db.read_replica, &db.overrides);
    assert_eq!(p.role, DbRole::Replica);
    assert_eq!(p.capacity, 5);
}

#[test]
fn a_level_needs_at_least_one_user() {
    let mut v = base_level();
    v["topology"] = json!([{ "kind": "app_server" }]);
    assert!(matches!(validate(v), Err(ConfigError::NoUsers)));
}

#[test]
fn out_of_range_probabilities_are_rejected() {
    let mut v = base_level();
    v["node_defaults"]["cache"] = json!({ "hit_rate": 1.5 });
    assert!(matches!(
        validate(v),
        Err(ConfigError::OutOfRange { ref field, .. }) if field == "cache.hit_rate"
    ));

    let mut v = base_level();
    v["traffic"]["write_ratio"] = json!(-0.1);
    assert!(matches!(validate(v), Err(ConfigError::OutOfRange { .. })));

    let mut v = base_level();
    v["max_error_rate"] = json!(2.0);
    assert!(matches!(validate(v), Err(ConfigError::OutOfRange { .. })));
}

#[test]
fn zero_sized_settings_are_rejected() {
    let mut v = base_level();
    v["topology"][1]["capacity"] = json!(0);
    assert!(matches!(
        validate(v),
        Err(ConfigError::ZeroCapacity { kind: NodeKind::AppServer })
    ));

    let mut v = base_level();
    v["target_total"] = json!(0);
    assert!(matches!(validate(v), Err(ConfigError::NotPositive { .. })));

    let mut v = base_level();
    v["traffic"]["packets_per_wave"] = json!(0);
    assert!(matches!(validate(v), Err(ConfigError::NotPositive { .. })));

    let mut v = base_level();
    v["traffic"]["stages"] = json!([{ "delay_ms": 0, "packets_per_wave": 2 }]);
    assert!(matches!(
        validate(v),
        Err(ConfigError::NotPositive { ref field }) if field == "traffic.stages[0].delay_ms"
    ));
}

#[test]
fn replica_flag_and_keys_are_checked() {
    let mut v = base_level();
    v["topology"][1]["read_replica"] = json!(true);
    assert!(matches!(
        validate(v),
        Err(ConfigError::ReplicaOnNonDatabase { kind: NodeKind::AppServer })
    ));

    let mut v = base_level();
    v["topology"][0]["key"] = json!("Edge");
    v["topology"][1]["key"] = json!("Edge");
    assert!(matches!(validate(v), Err(ConfigError::DuplicateKey(ref k)) if k == "Edge"));
}

#[test]
fn campaign_json_errors_are_reported() {
    let wrong_schema = json!({ "schema_version": 2, "levels": [] }).to_string();
    assert!(matches!(
        CampaignSpec::from_json(&wrong_schema),
        Err(ConfigError::UnsupportedSchema(2))
    ));

    assert!(matches!(
        CampaignSpec::from_json("{ not json"),
        Err(ConfigError::Json(_))
    ));

    let mut bad = base_level();
    bad["topology"] = json!([]);
    let raw = json!({ "schema_version": 1, "levels": [base_level(), bad] }).to_string();
    assert!(matches!(CampaignSpec::from_json(&raw), Err(ConfigError::NoUsers)));
}
