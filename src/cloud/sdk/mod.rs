pub mod amp;
pub mod beanstalk;
pub mod cloudwatch;
pub mod ec2;
pub mod eks;
pub mod eventbridge;
pub mod grafana;
pub mod iam;
pub mod lambda;
pub mod logs;

use chrono::{DateTime, TimeZone, Utc};

/// Converts an SDK timestamp to UTC. Sub-second precision is dropped, cloud
/// control planes do not resolve finer than seconds for lifecycle times.
pub fn sdk_datetime_to_utc(dt: &aws_sdk_ec2::primitives::DateTime) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(dt.secs(), 0).single()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sdk_datetime_to_utc() {
        let dt = aws_sdk_ec2::primitives::DateTime::from_secs(1_750_000_000);
        let utc = sdk_datetime_to_utc(&dt).unwrap();
        assert_eq!(utc.timestamp(), 1_750_000_000);
    }
}
