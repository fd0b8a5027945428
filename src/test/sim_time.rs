use crate::sim::SimTime;

#[test]
fn sim_time_unit_conversions() {
    assert_eq!(SimTime::from_micros(1), SimTime(1_000));
    assert_eq!(SimTime::from_millis(1), SimTime(1_000_000));
    assert_eq!(SimTime::from_secs(1), SimTime(1_000_000_000));
    assert_eq!(SimTime::from_millis(1_999).as_millis(), 1_999);
    assert_eq!(SimTime(1_999_999).as_millis(), 1);
}

#[test]
fn sim_time_arithmetic_saturates_on_overflow() {
    assert_eq!(SimTime::from_millis(u64::MAX), SimTime(u64::MAX));
    assert_eq!(SimTime(u64::MAX - 1).saturating_add(SimTime(5)), SimTime(u64::MAX));
    assert_eq!(SimTime(50).saturating_mul(3), SimTime(150));
    assert_eq!(SimTime(u64::MAX / 2).saturating_mul(3), SimTime(u64::MAX));
}
