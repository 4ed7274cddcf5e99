#[test]
fn peerscout_doctor_contract_json_without_secrets() {
    let bin = assert_cmd::cargo::cargo_bin!("peerscout");

    let out = std::process::Command::new(bin)
        .args(["doctor"])
        // never inherit keys from the environment; doctor must stay boolean-only
        .env_remove("PEERSCOUT_OPENAI_COMPAT_BASE_URL")
        .env_remove("PEERSCOUT_OPENAI_COMPAT_API_KEY")
        .env_remove("PEERSCOUT_OPENAI_COMPAT_MODEL")
        .env_remove("PEERSCOUT_MIN_CALL_INTERVAL_S")
        .env_remove("PEERSCOUT_BASE_RETRY_DELAY_S")
        .env_remove("PEERSCOUT_MAX_RETRIES")
        .output()
        .expect("run peerscout doctor");

    assert!(out.status.success(), "peerscout doctor failed");
    let s = String::from_utf8_lossy(&out.stdout);
    let v: serde_json::Value = serde_json::from_str(&s).expect("parse doctor json");

    assert_eq!(v["schema_version"].as_u64(), Some(1));
    assert_eq!(v["name"].as_str(), Some("peerscout"));
    assert!(!v["version"].as_str().unwrap_or("").is_empty());

    assert_eq!(v["configured"]["llm"]["api_key"].as_bool(), Some(false));
    assert_eq!(v["configured"]["llm"]["model"].as_bool(), Some(false));
    assert_eq!(
        v["configured"]["llm"]["base_url_override"].as_bool(),
        Some(false)
    );

    // governor falls back to its defaults when the env is empty
    assert_eq!(
        v["configured"]["governor"]["min_call_interval_s"].as_u64(),
        Some(25)
    );
    assert_eq!(
        v["configured"]["governor"]["base_retry_delay_s"].as_u64(),
        Some(20)
    );
    assert_eq!(v["configured"]["governor"]["max_retries"].as_u64(), Some(5));
}

#[test]
fn version_prints_the_crate_version() {
    let bin = assert_cmd::cargo::cargo_bin!("peerscout");
    let out = std::process::Command::new(bin)
        .args(["version"])
        .output()
        .expect("run peerscout version");
    assert!(out.status.success());
    let s = String::from_utf8_lossy(&out.stdout);
    assert!(s.starts_with("peerscout "));
    assert!(s.trim().ends_with(env!("CARGO_PKG_VERSION")));
}

#[test]
fn find_requires_a_target() {
    use predicates::prelude::*;

    let dir = tempfile::tempdir().unwrap();
    let out_path = dir.path().join("out.csv");
    assert_cmd::Command::cargo_bin("peerscout")
        .unwrap()
        .arg("find")
        .arg("--out")
        .arg(&out_path)
        .env_remove("PEERSCOUT_OPENAI_COMPAT_MODEL")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--json").or(predicate::str::contains("--name")));
    assert!(!out_path.exists());
}

#[test]
fn find_rejects_name_without_description() {
    use predicates::prelude::*;

    assert_cmd::Command::cargo_bin("peerscout")
        .unwrap()
        .args(["find", "--name", "Acme", "--out", "out.csv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("business-description"));
}
