use super::PubSubError;
use super::logging;

#[test]
fn logging_init_accepts_levels() {
    // Should not panic
    logging::init("info");
    logging::init("debug");
    logging::init("warn");
}

#[test]
fn parse_level_falls_back_to_info() {
    assert_eq!(logging::parse_level("WARNING"), tracing::Level::WARN);
    assert_eq!(logging::parse_level(" trace "), tracing::Level::TRACE);
    assert_eq!(logging::parse_level("verbose"), tracing::Level::INFO);
}

#[test]
fn invalid_action_names_allowed_types() {
    let text = PubSubError::InvalidAction("PUSH".to_string()).to_string();
    assert!(text.contains("PUSH"));
    for allowed in ["PUBLISH", "SUBSCRIBE", "UNSUBSCRIBE", "UNSUBSCRIBEALL"] {
        assert!(text.contains(allowed), "missing {allowed} in {text}");
    }
}
