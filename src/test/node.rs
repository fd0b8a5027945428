use super::params;
use crate::net::{DbRole, Node, NodeId, NodeKind, NodeParams, Packet};
use crate::sim::SimTime;

fn node(kind: NodeKind, p: NodeParams) -> Node {
    Node::new(NodeId(0), "n", kind, p)
}

#[test]
fn admission_rejects_at_capacity_without_changing_load() {
    let mut app = node(NodeKind::AppServer, params(NodeKind::AppServer, 2, 300));
    assert!(app.try_admit());
    assert!(app.try_admit());
    assert!(!app.try_admit());
    assert_eq!(app.load(), 2);
    assert_eq!(app.rejected, 1);
    assert_eq!(app.load_ratio(), 1.0);

    app.finish();
    assert_eq!(app.load(), 1);
    assert_eq!(app.processed, 1);
    assert!(app.try_admit());
}

#[test]
fn upgrade_multiplies_capacity_by_2_4_and_halves_delay() {
    let mut app = node(NodeKind::AppServer, params(NodeKind::AppServer, 3, 300));
    assert!(app.upgrade());
    assert_eq!(app.level(), 2);
    assert_eq!(app.capacity(), 7);
    assert_eq!(app.delay(), SimTime::from_millis(150));

    assert!(app.upgrade());
    assert_eq!(app.level(), 3);
    assert_eq!(app.capacity(), 16);
    assert_eq!(app.delay(), SimTime::from_millis(75));
}

#[test]
fn upgrade_respects_min_delay_and_max_capacity() {
    let p = NodeParams {
        max_capacity: Some(20),
        min_delay: SimTime::from_millis(10),
        ..params(NodeKind::Cache, 10, 15)
    };
    let mut cache = node(NodeKind::Cache, p);

    assert!(cache.upgrade());
    assert_eq!(cache.capacity(), 20);
    assert_eq!(cache.delay(), SimTime::from_millis(10));

    // 已达上限：拒绝且状态不变
    assert!(!cache.upgrade());
    assert_eq!(cache.level(), 2);
    assert_eq!(cache.capacity(), 20);
    assert_eq!(cache.delay(), SimTime::from_millis(10));
}

#[test]
fn users_cannot_be_upgraded() {
    let mut user = node(NodeKind::User, NodeParams::defaults(NodeKind::User));
    assert!(!user.upgrade());
    assert_eq!(user.level(), 1);
}

#[test]
fn database_delay_grows_with_stored_writes() {
    let mut db = node(NodeKind::Database, params(NodeKind::Database, 5, 400));
    for _ in 0..50 {
        db.record_write();
    }
    assert_eq!(db.writes_stored(), 50);
    assert_eq!(db.base_delay(), SimTime::from_millis(400));
    assert_eq!(db.delay(), SimTime::from_millis(600));

    // 升级只改变基准时延，存储量带来的放大仍然生效
    assert!(db.upgrade());
    assert_eq!(db.delay(), SimTime::from_millis(300));

    db.record_write();
    assert_eq!(db.delay(), SimTime(200_000_000 * 151 / 100));
}

#[test]
fn database_delay_is_unchanged_without_writes() {
    let db = node(NodeKind::Database, params(NodeKind::Database, 5, 400));
    assert_eq!(db.delay(), SimTime::from_millis(400));
}

#[test]
fn user_inflight_cap_throttles_new_requests() {
    let p = NodeParams {
        max_inflight: Some(2),
        ..NodeParams::defaults(NodeKind::User)
    };
    let mut user = node(NodeKind::User, p);
    assert!(user.begin_request());
    assert!(user.begin_request());
    assert!(!user.begin_request());

    user.end_request();
    assert!(user.begin_request());
}

#[test]
fn queue_load_is_its_backlog() {
    let mut q = node(NodeKind::Queue, params(NodeKind::Queue, 2, 100));
    assert_eq!(q.load(), 0);
    assert!(q.enqueue(Packet::new(1, NodeId(9), true, SimTime::ZERO)).is_ok());
    assert!(q.enqueue(Packet::new(2, NodeId(9), true, SimTime::ZERO)).is_ok());
    assert!(q.enqueue(Packet::new(3, NodeId(9), true, SimTime::ZERO)).is_err());
    assert_eq!(q.load(), 2);
    assert_eq!(q.backlog_len(), 2);

    assert!(q.upgrade());
    assert_eq!(q.capacity(), 4);
    assert!(q.enqueue(Packet::new(3, NodeId(9), true, SimTime::ZERO)).is_ok());
}

#[test]
fn purchase_names_are_parsed_leniently() {
    assert_eq!(
        NodeKind::parse_purchase("App-Server"),
        Ok((NodeKind::AppServer, DbRole::Primary))
    );
    assert_eq!(
        NodeKind::parse_purchase("read_replica"),
        Ok((NodeKind::Database, DbRole::Replica))
    );
    assert_eq!(
        NodeKind::parse_purchase(" LB "),
        Ok((NodeKind::LoadBalancer, DbRole::Primary))
    );
    assert!(NodeKind::parse_purchase("mainframe").is_err());

    assert_eq!(NodeKind::Database.purchase_slug(DbRole::Replica), "read_replica");
    assert_eq!(NodeKind::Cdn.key_prefix(DbRole::Primary), "CDN");
}
