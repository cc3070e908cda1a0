/// Determine the `DateTime<Utc>` from the provided `Duration` since the epoch.
pub fn datetime_utc_from_epoch_duration(
    duration: std::time::Duration,
) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::<chrono::Utc>::from(std::time::UNIX_EPOCH + duration)
}

/// Deserialize a `String` as the desired type.
pub fn de_str<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::de::Deserializer<'de>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let data: std::borrow::Cow<'de, str> = serde::de::Deserialize::deserialize(deserializer)?;
    data.parse::<T>().map_err(serde::de::Error::custom)
}

/// Deserialize an optional `String` as the desired type.
///
/// Use alongside `#[serde(default)]` so that absent keys deserialize as `None`.
pub fn de_opt_str<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::de::Deserializer<'de>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let data: Option<std::borrow::Cow<'de, str>> =
        serde::de::Deserialize::deserialize(deserializer)?;

    data.map(|data| data.parse::<T>())
        .transpose()
        .map_err(serde::de::Error::custom)
}

/// Deserialize a `u64` milliseconds value as `DateTime<Utc>`.
pub fn de_u64_epoch_ms_as_datetime_utc<'de, D>(
    deserializer: D,
) -> Result<chrono::DateTime<chrono::Utc>, D::Error>
where
    D: serde::de::Deserializer<'de>,
{
    serde::de::Deserialize::deserialize(deserializer).map(|epoch_ms| {
        datetime_utc_from_epoch_duration(std::time::Duration::from_millis(epoch_ms))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Level {
        #[serde(deserialize_with = "de_str")]
        price: f64,
        #[serde(default, deserialize_with = "de_opt_str")]
        amount: Option<f64>,
    }

    #[test]
    fn test_de_str_and_de_opt_str() {
        struct TestCase {
            input: &'static str,
            expected: Option<Level>,
        }

        let tests = vec![
            TestCase {
                // TC0: both fields present
                input: r#"{"price": "50238.41", "amount": "0.009954"}"#,
                expected: Some(Level {
                    price: 50238.41,
                    amount: Some(0.009954),
                }),
            },
            TestCase {
                // TC1: optional field absent
                input: r#"{"price": "4.00000200"}"#,
                expected: Some(Level {
                    price: 4.000002,
                    amount: None,
                }),
            },
            TestCase {
                // TC2: required field is not a number
                input: r#"{"price": "abc"}"#,
                expected: None,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = serde_json::from_str::<Level>(test.input).ok();
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_de_u64_epoch_ms_as_datetime_utc() {
        #[derive(Deserialize)]
        struct Event {
            #[serde(deserialize_with = "de_u64_epoch_ms_as_datetime_utc")]
            time: chrono::DateTime<chrono::Utc>,
        }

        let event = serde_json::from_str::<Event>(r#"{"time": 1671656397761}"#).unwrap();
        assert_eq!(event.time.timestamp_millis(), 1671656397761);
    }
}
