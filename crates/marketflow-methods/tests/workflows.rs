//! End-to-end runs of generated-style definitions against the real catalog.

use std::sync::Arc;

use serde_json::{json, Value};

use marketflow_catalog::OutputRecorder;
use marketflow_core::{Interpreter, StateMachine};
use marketflow_methods::{AnalysisToolbox, SampleMarketData, SampleNews};

fn toolbox() -> AnalysisToolbox {
    AnalysisToolbox::new(
        Arc::new(SampleMarketData::new()),
        Arc::new(SampleNews),
        Arc::new(OutputRecorder::new()),
    )
}

fn machine(value: Value) -> StateMachine {
    serde_json::from_value(value).expect("machine parses")
}

#[tokio::test]
async fn lambda_invoke_task_reaches_add_time() {
    let catalog = Arc::new(toolbox().build_catalog());
    let interpreter = Interpreter::new(catalog);
    let definition = machine(json!({
        "StartAt": "ShiftDate",
        "States": {
            "ShiftDate": {
                "Type": "Task",
                "Resource": "arn:aws:states:::lambda:invoke",
                "Parameters": {
                    "FunctionName": "AddTime",
                    "Payload": {"date.$": "$.d", "value": 1, "timeUnit": "Days"}
                },
                "End": true
            }
        }
    }));

    let result = interpreter
        .interpret(&definition, json!({"d": "2024-01-01T00:00:00Z"}))
        .await
        .expect("interpretation succeeds");
    assert_eq!(result["ShiftDate"], json!("2024-01-02T00:00:00Z"));
}

#[tokio::test]
async fn map_fans_out_over_pairs_and_records_prices() {
    let toolbox = toolbox();
    let recorder = toolbox.recorder();
    let catalog = Arc::new(toolbox.build_catalog());
    let interpreter = Interpreter::new(catalog);

    let definition = machine(json!({
        "StartAt": "EachPair",
        "States": {
            "EachPair": {
                "Type": "Map",
                "ItemsPath": "$.pairs",
                "MaxConcurrency": 2,
                "Iterator": {
                    "StartAt": "Price",
                    "States": {
                        "Price": {
                            "Type": "Task",
                            "Resource": "GetLatestPrice",
                            "Parameters": {"pair.$": "$"},
                            "ResultPath": "$.price",
                            "Next": "Keep"
                        },
                        "Keep": {
                            "Type": "Task",
                            "Resource": "RecordOutput",
                            "Parameters": {
                                "category": "Latest price",
                                "content.$": "$.price"
                            },
                            "End": true
                        }
                    }
                },
                "End": true
            }
        }
    }));

    let input = json!({"pairs": ["BTCUSDT", "ETHUSDT", "SOLUSDT"]});
    let result = interpreter
        .interpret(&definition, input)
        .await
        .expect("interpretation succeeds");

    let fan = result["EachPair"].as_array().expect("map result");
    assert_eq!(fan.len(), 3);
    assert!(fan.iter().all(|element| element["price"].is_number()));

    let entries = recorder.snapshot();
    assert_eq!(entries.len(), 3);
    assert!(entries.iter().all(|entry| entry.category == "Latest price"));
}

#[tokio::test]
async fn choice_over_recorded_price_band_takes_the_expected_branch() {
    let toolbox = toolbox();
    let catalog = Arc::new(toolbox.build_catalog());
    let interpreter = Interpreter::new(catalog);

    let definition = machine(json!({
        "StartAt": "Price",
        "States": {
            "Price": {
                "Type": "Task",
                "Resource": "GetLatestPrice",
                "Parameters": {"pair": "BTCUSDT"},
                "Next": "Band"
            },
            "Band": {
                "Type": "Choice",
                "Choices": [
                    {"Variable": "$.Price", "NumericGreaterThan": 1000, "Next": "High"}
                ],
                "Default": "Low"
            },
            "High": {"Type": "Pass", "Result": "high", "End": true},
            "Low": {"Type": "Pass", "Result": "low", "End": true}
        }
    }));

    let result = interpreter
        .interpret(&definition, json!({}))
        .await
        .expect("interpretation succeeds");
    assert_eq!(result["High"], json!("high"));
}

#[tokio::test]
async fn unknown_pair_surfaces_as_a_host_error() {
    let catalog = Arc::new(toolbox().build_catalog());
    let interpreter = Interpreter::new(catalog);

    let definition = machine(json!({
        "StartAt": "Price",
        "States": {
            "Price": {
                "Type": "Task",
                "Resource": "GetLatestPrice",
                "Parameters": {"pair": "NOPEUSDT"},
                "End": true
            }
        }
    }));

    let result = interpreter.interpret(&definition, json!({})).await;
    assert!(matches!(
        result,
        Err(marketflow_core::InterpreterError::Host { .. })
    ));
}
