//! Process-wide pipeline counters.

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, Registry, TextEncoder};

use crate::error::Result;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new_custom(Some("plate_reader".to_string()), None)
        .unwrap_or_default();
    pub static ref FRAMES_PROCESSED: IntCounter =
        register("frames_processed_total", "Frames run through the pipeline");
    pub static ref CANDIDATES_PROPOSED: IntCounter =
        register("candidates_proposed_total", "Plate-shaped regions found");
    pub static ref OCR_FAILURES: IntCounter =
        register("ocr_failures_total", "OCR calls that returned an error");
    pub static ref TOKENS_ACCEPTED: IntCounter =
        register("tokens_accepted_total", "Frames that produced a valid plate token");
    pub static ref PLATES_CONFIRMED: IntCounter =
        register("plates_confirmed_total", "Newly confirmed plates");
    pub static ref CAPTURES_WRITTEN: IntCounter =
        register("captures_written_total", "Capture files written");
    pub static ref CAPTURE_FAILURES: IntCounter =
        register("capture_failures_total", "Capture files that could not be written");
}

fn register(name: &str, help: &str) -> IntCounter {
    let counter = IntCounter::new(name, help).expect("metric name is valid");
    // A second registration under the same name only happens in tests.
    let _ = REGISTRY.register(Box::new(counter.clone()));
    counter
}

/// Text exposition of every pipeline counter.
pub fn render() -> Result<String> {
    // Touch every counter so they all show up even before the first increment.
    let _ = (
        FRAMES_PROCESSED.get(),
        CANDIDATES_PROPOSED.get(),
        OCR_FAILURES.get(),
        TOKENS_ACCEPTED.get(),
        PLATES_CONFIRMED.get(),
        CAPTURES_WRITTEN.get(),
        CAPTURE_FAILURES.get(),
    );

    let mut buffer = vec![];
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
