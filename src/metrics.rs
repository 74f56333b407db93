use lazy_static::lazy_static;
use prometheus::{Counter, Gauge, Histogram, register_counter, register_gauge, register_histogram};


lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("intake_requests_total", "Total number of form submissions received").unwrap();
    pub static ref ADMITTED_TOTAL: Counter =
        register_counter!("intake_admitted_total", "Submissions admitted by the rate limiter").unwrap();
    pub static ref REJECTED_TOTAL: Counter =
        register_counter!("intake_rejected_total", "Submissions rejected for exceeding quota").unwrap();
    pub static ref CONFIG_ERRORS_TOTAL: Counter =
        register_counter!("intake_config_errors_total", "Submissions refused due to invalid form policy").unwrap();
    pub static ref RECLAIMED_TOTAL: Counter =
        register_counter!("intake_reclaimed_total", "Idle visitor records evicted").unwrap();
    pub static ref VISITORS: Gauge =
        register_gauge!("intake_visitors", "Current number of tracked visitor records").unwrap();
    pub static ref ADMISSION_LATENCY: Histogram = register_histogram!(
        "intake_admission_latency_seconds",
        "Time spent deciding admission"
    )
    .unwrap();
}
