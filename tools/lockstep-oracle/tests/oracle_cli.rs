use assert_cmd::Command;

#[test]
fn lists_cases_matching_a_filter() {
    let output = Command::cargo_bin("lockstep-oracle")
        .unwrap()
        .args(["differential_sweep", "--list"])
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout).into_owned();
    assert!(stdout.contains("differential_sweep_w8"));
    assert!(stdout.contains("differential_sweep_w64"));
    assert!(!stdout.contains("codegen_"));
}

#[test]
fn unknown_filter_is_an_error() {
    Command::cargo_bin("lockstep-oracle")
        .unwrap()
        .arg("no_such_case")
        .assert()
        .failure();
}

#[test]
fn codegen_cases_pass_quickly() {
    Command::cargo_bin("lockstep-oracle")
        .unwrap()
        .arg("codegen_")
        .assert()
        .success()
        .stdout(predicates::str::contains("0 failed"));
}

#[test]
fn scenario_cases_pass_with_small_stress_budget() {
    Command::cargo_bin("lockstep-oracle")
        .unwrap()
        .args([
            "stress_",
            "--stress-threads",
            "4",
            "--stress-iters",
            "200",
        ])
        .assert()
        .success();
}
