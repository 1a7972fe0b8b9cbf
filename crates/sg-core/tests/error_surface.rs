use sg_core::errors::{ErrorInfo, SgError};

fn sample_info(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message)
        .with_context("chunk", 3)
        .with_context("reason", "example")
}

#[test]
fn config_error_surface() {
    let err = SgError::Config(sample_info("arm-mismatch", "leading impact on trailing arm"));
    assert_eq!(err.code(), "arm-mismatch");
    assert_eq!(err.info().context.get("chunk").map(String::as_str), Some("3"));
}

#[test]
fn domain_error_surface() {
    let err = SgError::Domain(sample_info("hernquist-negative", "negative argument"));
    assert_eq!(err.info().code, "hernquist-negative");
    assert!(err.to_string().starts_with("domain error: negative argument"));
}

#[test]
fn value_error_surface() {
    let err = SgError::Value(sample_info("odd-gauss-legendre-order", "odd order"));
    assert_eq!(err.code(), "odd-gauss-legendre-order");
}

#[test]
fn solver_and_parallel_error_surface() {
    let solver = SgError::Solver(sample_info("singular-jacobian", "cannot invert"));
    let parallel = SgError::Parallel(sample_info("thread-pool", "pool build failed"));
    assert_eq!(solver.code(), "singular-jacobian");
    assert_eq!(parallel.code(), "thread-pool");
}

#[test]
fn errors_serialise_with_family_tag() {
    let err = SgError::Serde(
        ErrorInfo::new("yaml-deserialize", "bad field").with_hint("check the config keys"),
    );
    let json = serde_json::to_value(&err).unwrap();
    assert_eq!(json["family"], "Serde");
    assert_eq!(json["detail"]["code"], "yaml-deserialize");
    let back: SgError = serde_json::from_value(json).unwrap();
    assert_eq!(back, err);
    assert!(err.to_string().contains("hint: check the config keys"));
}
