use super::*;

#[test]
fn provider_parses_case_insensitively() {
    assert_eq!("github".parse::<OAuthProvider>().unwrap(), OAuthProvider::GitHub);
    assert_eq!(" GitHub ".parse::<OAuthProvider>().unwrap(), OAuthProvider::GitHub);
}

#[test]
fn unknown_provider_is_rejected() {
    let err = "myspace".parse::<OAuthProvider>().unwrap_err();
    assert!(matches!(err, IdentityError::UnsupportedProvider(ref p) if p == "myspace"));
    assert_eq!(err.error_code(), "E_IDENTITY_PROVIDER");
}

#[test]
fn provider_display_matches_wire_name() {
    assert_eq!(OAuthProvider::GitHub.to_string(), "github");
}

#[test]
fn metadata_str_reads_strings_and_skips_null() {
    let user: ProviderUser = serde_json::from_str(
        r#"{"id": "u", "user_metadata": {"full_name": "Ada Lovelace", "avatar": null, "age": 36}}"#,
    )
    .unwrap();
    assert_eq!(user.metadata_str("full_name").as_deref(), Some("Ada Lovelace"));
    assert_eq!(user.metadata_str("avatar"), None);
    assert_eq!(user.metadata_str("missing"), None);
    assert_eq!(user.metadata_str("age").as_deref(), Some("36"));
}

#[test]
fn rejected_displays_provider_message() {
    let err = IdentityError::Rejected { status: 400, message: "Invalid login credentials".into() };
    assert_eq!(err.to_string(), "Invalid login credentials");
    assert!(!err.retryable());
}

#[test]
fn transport_and_server_errors_are_retryable() {
    assert!(IdentityError::Request("timeout".into()).retryable());
    assert!(IdentityError::Rejected { status: 503, message: "down".into() }.retryable());
    assert!(!IdentityError::MissingUserId.retryable());
}
