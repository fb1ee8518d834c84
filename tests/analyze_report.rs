//! Crash triage over the files a real run leaves behind.

#[path = "common/mod.rs"]
mod common;

use common::{fast_config, read_lines, write_case_list, Bench};
use cts_serial_runner::report::analyze::{analyze_report, default_output_path, AnalyzeOptions};
use cts_serial_runner::report::REPORT_FILE_NAME;
use cts_serial_runner::{execute, CancelToken, TestTree};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

#[test]
fn test_reasons_come_from_group_logs_of_crashed_rows() {
    let tmp = TempDir::new().unwrap();
    let cases = write_case_list(tmp.path(), &["ok", "boom", "quiet_crash"]);
    let config = fast_config(tmp.path());
    let bench = Bench::new();
    bench.on_group("ok", "DONE!\n");
    bench.on_group(
        "boom",
        "PANIC\nlibc++abi: terminating due to uncaught exception of type std::bad_alloc\n",
    );
    bench.on_group("quiet_crash", "PANIC without details\n");
    execute(&config, &cases, None, &bench.opener, CancelToken::new()).unwrap();

    let report = tmp.path().join(REPORT_FILE_NAME);
    let output = default_output_path(&report);
    let analysis = analyze_report(&report, &output, &AnalyzeOptions::default()).unwrap();

    assert_eq!(analysis.output, tmp.path().join("test_report_with_reasons.csv"));
    assert_eq!(
        analysis.reasons,
        vec![
            (
                "p.boom".to_string(),
                "libc++abi: terminating due to uncaught exception of type std::bad_alloc"
                    .to_string()
            ),
            (
                "p.quiet_crash".to_string(),
                "[libc++abi: not found in log]".to_string()
            ),
        ]
    );

    let lines = read_lines(&output);
    assert!(lines[0].ends_with(",Reason"));
    assert!(lines[1].starts_with("1,p.ok,PASSED,"));
    assert!(lines[1].ends_with(','));
}

#[test]
fn test_run_dispatches_leaf_groups_in_document_order() {
    let tmp = TempDir::new().unwrap();
    let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<TestCaseList PackageName="dEQP-GLES2">
  <TestCase Name="info" CaseType="TestGroup">
    <TestCase Name="vendor" CaseType="SelfValidate"/>
  </TestCase>
  <TestCase Name="functional" CaseType="TestGroup">
    <TestCase Name="shaders" CaseType="TestGroup">
      <TestCase Name="loops" CaseType="TestGroup">
        <TestCase Name="for_constant" CaseType="Capability"/>
      </TestCase>
    </TestCase>
  </TestCase>
</TestCaseList>
"#;
    let cases = tmp.path().join("gles2.xml");
    std::fs::write(&cases, xml).unwrap();

    let tree = TestTree::from_file(&cases).unwrap();
    assert_eq!(
        tree.leaf_group_paths(),
        vec!["dEQP-GLES2.info", "dEQP-GLES2.functional.shaders.loops"]
    );

    let config = fast_config(tmp.path());
    let bench = Bench::new();
    bench.device.respond_to("--deqp-case=", "DONE!\n");
    let output = execute(&config, &cases, None, &bench.opener, CancelToken::new()).unwrap();

    assert_eq!(output.summary.stats.passed, 2);
    let written = bench.device.written_text();
    let info = written.find("'dEQP-GLES2.info.*'").unwrap();
    let loops = written
        .find("'dEQP-GLES2.functional.shaders.loops.*'")
        .unwrap();
    assert!(info < loops);
}
