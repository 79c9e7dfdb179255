mod common;

use common::{MockFactory, Write, v1_status, v2_status};
use goe_bridge::catalog::ChargerCatalog;
use goe_bridge::commands::{
    ChargerCommand, CommandInput, CommandKind, CommandRequest, NoReferences,
};
use goe_bridge::config::{ChargerConfig, Config};
use goe_bridge::error::GoeError;
use goe_bridge::snapshot::{CHARGER_MAX_CURRENT, FieldValue, StatusSnapshot};
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;

#[tokio::test]
async fn register_runs_first_refresh_and_starts_polling() {
    let factory = MockFactory::new(v1_status(16));
    let mut catalog = ChargerCatalog::new(factory.clone());

    let coord = catalog
        .register(ChargerConfig::new("garage", "192.168.1.20").with_poll_interval_seconds(10))
        .await
        .unwrap();
    assert_eq!(factory.state.status_calls(), 1);
    assert_eq!(
        coord.current_snapshot().number(CHARGER_MAX_CURRENT),
        Some(16.0)
    );
    assert!(coord.is_running());
    assert_eq!(catalog.names(), vec!["garage".to_string()]);
    catalog.stop_all();
    assert!(!coord.is_running());
}

#[tokio::test]
async fn unreachable_charger_still_registers() {
    let factory = MockFactory::new(v1_status(16));
    factory.state.fail_status(Some("no route to host"));
    let mut catalog = ChargerCatalog::new(factory.clone());

    let coord = catalog
        .register(ChargerConfig::new("garage", "192.168.1.20"))
        .await
        .unwrap();
    assert!(coord.current_snapshot().is_empty());
    catalog.stop_all();
}

#[tokio::test]
async fn duplicate_and_unknown_names() {
    let factory = MockFactory::new(v1_status(16));
    let mut catalog = ChargerCatalog::new(factory.clone());
    catalog
        .register(ChargerConfig::new("garage", "10.0.0.2"))
        .await
        .unwrap();

    let err = catalog
        .register(ChargerConfig::new("garage", "10.0.0.3"))
        .await
        .unwrap_err();
    assert_eq!(err, GoeError::duplicate_device("garage"));
    assert_eq!(
        catalog.get("carport").unwrap_err(),
        GoeError::unknown_device("carport")
    );
    assert!(catalog.remove("carport").is_err());

    let removed = catalog.remove("garage").unwrap();
    assert!(!removed.coordinator().is_running());
    assert!(catalog.is_empty());
}

#[tokio::test]
async fn bad_protocol_fails_registration() {
    let factory = MockFactory::new(v1_status(16));
    let mut catalog = ChargerCatalog::new(factory.clone());
    let err = catalog
        .register(ChargerConfig::new("garage", "10.0.0.2").with_protocol("5"))
        .await
        .unwrap_err();
    assert!(matches!(err, GoeError::InvalidProtocolVersion { .. }));
    assert_eq!(factory.built(), 0);
    assert!(catalog.get("garage").is_err());
}

#[tokio::test]
async fn dispatch_to_named_charger() {
    let factory = MockFactory::new(v2_status(16));
    let mut catalog = ChargerCatalog::new(factory.clone());
    catalog
        .register(ChargerConfig::new("garage", "10.0.0.2").with_protocol("2"))
        .await
        .unwrap();

    let request = CommandRequest::literal("garage", CommandKind::ChargeLimit, "2.5");
    let applied = catalog.dispatch(&request, &NoReferences).await.unwrap();
    assert_eq!(
        applied,
        vec![("garage".to_string(), ChargerCommand::SetChargeLimit(2.5))]
    );
    assert_eq!(
        factory.state.writes(),
        vec![Write::Key("dwo".to_string(), json!(2500))]
    );
    // first refresh at registration, one after the write
    assert_eq!(factory.state.status_calls(), 2);
    catalog.stop_all();
}

#[tokio::test]
async fn dispatch_without_name_reaches_every_charger() {
    let factory = MockFactory::new(v1_status(16));
    let config = Config {
        chargers: vec![
            ChargerConfig::new("garage", "10.0.0.2"),
            ChargerConfig::new("carport", "10.0.0.3"),
        ],
        ..Config::default()
    };
    let catalog = ChargerCatalog::from_config(&config, factory.clone())
        .await
        .unwrap();

    let mut states = HashMap::new();
    states.insert("sensor.pv_surplus_amps".to_string(), FieldValue::Number(9.0));
    let request = CommandRequest::for_all(
        CommandKind::MaxCurrent,
        CommandInput::Reference("sensor.pv_surplus_amps".to_string()),
    );
    let applied = catalog.dispatch(&request, &states).await.unwrap();

    let names: Vec<&str> = applied.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["carport", "garage"]);
    assert_eq!(
        factory.state.writes(),
        vec![Write::TmpMaxCurrent(9), Write::TmpMaxCurrent(9)]
    );
    catalog.stop_all();
}

#[tokio::test]
async fn unresolvable_input_writes_nothing() {
    let factory = MockFactory::new(v1_status(16));
    let mut catalog = ChargerCatalog::new(factory.clone());
    catalog
        .register(ChargerConfig::new("garage", "10.0.0.2"))
        .await
        .unwrap();

    let request = CommandRequest::new(
        "garage",
        CommandKind::MaxCurrent,
        CommandInput::Reference("sensor.missing".to_string()),
    );
    let snapshot = StatusSnapshot::empty();
    let err = catalog.dispatch(&request, &snapshot).await.unwrap_err();
    assert!(matches!(err, GoeError::InvalidCommandInput { .. }));
    assert!(factory.state.writes().is_empty());
    assert_eq!(factory.state.status_calls(), 1);

    let unknown = CommandRequest::literal("carport", CommandKind::MaxCurrent, 16.0);
    assert!(matches!(
        catalog.dispatch(&unknown, &NoReferences).await,
        Err(GoeError::UnknownDevice { .. })
    ));
    catalog.stop_all();
}

#[tokio::test(start_paused = true)]
async fn short_poll_interval_is_raised_to_minimum() {
    let factory = MockFactory::new(v1_status(16));
    let mut catalog = ChargerCatalog::new(factory.clone());
    catalog
        .register(ChargerConfig::new("garage", "10.0.0.2").with_poll_interval_seconds(2))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(factory.state.status_calls(), 1);
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(factory.state.status_calls(), 2);
    catalog.stop_all();
}
