use prometheus::{IntCounter, IntCounterVec};

lazy_static::lazy_static! {
    pub static ref AUTH_GATE_REQUESTS_TOTAL: IntCounterVec = prometheus::register_int_counter_vec!(
        "auth_gate_requests_total",
        "Requests seen by the authentication gate",
        &["outcome"]
    ).expect("valid metric definition");

    pub static ref AUTH_GATE_ROTATIONS_TOTAL: IntCounter = prometheus::register_int_counter!(
        "auth_gate_rotations_total",
        "Rotated credentials relayed to callers"
    ).expect("valid metric definition");
}

pub fn record_outcome(outcome: &str) {
    AUTH_GATE_REQUESTS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_rotation() {
    AUTH_GATE_ROTATIONS_TOTAL.inc();
}
