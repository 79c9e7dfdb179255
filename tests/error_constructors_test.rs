use goe_bridge::error::GoeError;

#[test]
fn error_constructors_group_1() {
    assert!(matches!(
        GoeError::invalid_protocol("7"),
        GoeError::InvalidProtocolVersion { .. }
    ));
    assert!(matches!(
        GoeError::unsupported("set_phase_mode", "V1"),
        GoeError::UnsupportedOnProtocol { .. }
    ));
    assert!(matches!(
        GoeError::transport("x"),
        GoeError::Transport { .. }
    ));
    assert!(matches!(
        GoeError::invalid_payload("garage"),
        GoeError::InvalidStatusPayload { .. }
    ));
}

#[test]
fn error_constructors_group_2() {
    assert!(matches!(
        GoeError::unknown_device("x"),
        GoeError::UnknownDevice { .. }
    ));
    assert!(matches!(
        GoeError::duplicate_device("x"),
        GoeError::DuplicateDevice { .. }
    ));
    assert!(matches!(
        GoeError::invalid_input("max_current", "x"),
        GoeError::InvalidCommandInput { .. }
    ));
    assert!(matches!(GoeError::config("x"), GoeError::Config { .. }));
}

#[test]
fn error_constructors_group_3() {
    let ser = GoeError::Serialization {
        message: "s".into(),
    };
    assert!(matches!(ser, GoeError::Serialization { .. }));
    assert!(matches!(GoeError::io("x"), GoeError::Io { .. }));
    assert!(matches!(
        GoeError::validation("f", "m"),
        GoeError::Validation { .. }
    ));
    assert!(matches!(GoeError::timeout("x"), GoeError::Timeout { .. }));
    assert!(matches!(GoeError::generic("x"), GoeError::Generic { .. }));
}

#[test]
fn display_messages() {
    let e = GoeError::invalid_protocol("3");
    assert_eq!(
        e.to_string(),
        "Invalid protocol version '3'. Allowed values are 1 and 2"
    );
    let e = GoeError::invalid_input("charge_limit", "'abc' is not usable");
    assert!(e.to_string().starts_with("No valid value for 'charge_limit'"));
}

#[test]
fn conversions_from_library_errors() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
    assert!(matches!(GoeError::from(io), GoeError::Io { .. }));
    let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    assert!(matches!(
        GoeError::from(json_err),
        GoeError::Serialization { .. }
    ));
}
