use serde::{Deserialize, Serialize};
use xgate_integration::{Validator, error::SocketError};

/// [`Binance`](super::Binance) command response message.
///
/// ### Raw Payload Examples
/// See docs: <https://binance-docs.github.io/apidocs/spot/en/#live-subscribing-unsubscribing-to-streams>
/// #### Subscription Success
/// ```json
/// {
///     "id":1,
///     "result":null
/// }
/// ```
///
/// #### Subscription Failure
/// ```json
/// {
///     "id":1,
///     "error":{"code":2,"msg":"Invalid request: unknown variant"}
/// }
/// ```
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize, Serialize)]
pub struct BinanceSubResponse {
    #[serde(default)]
    pub result: Option<Vec<String>>,
    pub id: Option<u64>,
    #[serde(default)]
    pub error: Option<BinanceError>,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize, Serialize)]
pub struct BinanceError {
    pub code: i64,
    pub msg: String,
}

impl Validator for BinanceSubResponse {
    fn validate(self) -> Result<Self, SocketError>
    where
        Self: Sized,
    {
        match (&self.result, &self.error) {
            (None, None) => Ok(self),
            (_, Some(error)) => Err(SocketError::Subscribe(format!(
                "received failure response with code {}: {}",
                error.code, error.msg
            ))),
            (Some(_), None) => Err(SocketError::Subscribe(
                "received failure subscription response".to_owned(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod de {
        use super::*;

        #[test]
        fn test_binance_sub_response() {
            struct TestCase {
                input: &'static str,
                expected: Result<BinanceSubResponse, SocketError>,
            }

            let cases = vec![
                TestCase {
                    // TC0: input response is Subscribed
                    input: r#"{"id":1,"result":null}"#,
                    expected: Ok(BinanceSubResponse {
                        result: None,
                        id: Some(1),
                        error: None,
                    }),
                },
                TestCase {
                    // TC1: input response is failed subscription
                    input: r#"{"result": [], "id": 1}"#,
                    expected: Ok(BinanceSubResponse {
                        result: Some(vec![]),
                        id: Some(1),
                        error: None,
                    }),
                },
                TestCase {
                    // TC2: input response is rejected request
                    input: r#"{"id": 3, "error": {"code": 2, "msg": "Invalid request"}}"#,
                    expected: Ok(BinanceSubResponse {
                        result: None,
                        id: Some(3),
                        error: Some(BinanceError {
                            code: 2,
                            msg: "Invalid request".to_string(),
                        }),
                    }),
                },
            ];

            for (index, test) in cases.into_iter().enumerate() {
                let actual = serde_json::from_str::<BinanceSubResponse>(test.input);
                match (actual, test.expected) {
                    (Ok(actual), Ok(expected)) => {
                        assert_eq!(actual, expected, "TC{} failed", index)
                    }
                    (Err(_), Err(_)) => {
                        // Test passed
                    }
                    (actual, expected) => {
                        // Test failed
                        panic!(
                            "TC{index} failed because actual != expected. \nActual: {actual:?}\nExpected: {expected:?}\n"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_validate_binance_sub_response() {
        struct TestCase {
            input_response: BinanceSubResponse,
            is_valid: bool,
        }

        let cases = vec![
            TestCase {
                // TC0: input response is successful subscription
                input_response: BinanceSubResponse {
                    result: None,
                    id: Some(1),
                    error: None,
                },
                is_valid: true,
            },
            TestCase {
                // TC1: input response is failed subscription
                input_response: BinanceSubResponse {
                    result: Some(vec![]),
                    id: Some(1),
                    error: None,
                },
                is_valid: false,
            },
            TestCase {
                // TC2: input response is rejected request
                input_response: BinanceSubResponse {
                    result: None,
                    id: Some(1),
                    error: Some(BinanceError {
                        code: 2,
                        msg: "Invalid request".to_string(),
                    }),
                },
                is_valid: false,
            },
        ];

        for (index, test) in cases.into_iter().enumerate() {
            let actual = test.input_response.validate().is_ok();
            assert_eq!(actual, test.is_valid, "TestCase {} failed", index);
        }
    }
}
