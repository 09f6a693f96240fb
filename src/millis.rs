//! Durations in JSON output are fractional milliseconds everywhere.

use std::time::Duration;

use serde::Serializer;

pub fn as_millis_f64(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(as_millis_f64(*duration))
}

pub fn serialize_option<S: Serializer>(
    duration: &Option<Duration>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match duration {
        Some(duration) => serializer.serialize_some(&as_millis_f64(*duration)),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Timing {
        #[serde(serialize_with = "serialize")]
        delay: Duration,
        #[serde(serialize_with = "serialize_option")]
        timeout: Option<Duration>,
    }

    #[test]
    fn whole_and_fractional_millis_are_floats() {
        let json = serde_json::to_value(Timing {
            delay: Duration::from_millis(100),
            timeout: Some(Duration::from_micros(2500)),
        })
        .expect("serialize");
        assert!(json["delay"].is_f64());
        assert_eq!(json["delay"].as_f64(), Some(100.0));
        assert_eq!(json["timeout"].as_f64(), Some(2.5));
    }

    #[test]
    fn missing_timeout_is_null() {
        let json = serde_json::to_value(Timing {
            delay: Duration::ZERO,
            timeout: None,
        })
        .expect("serialize");
        assert!(json["timeout"].is_null());
    }
}
