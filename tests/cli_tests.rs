//! End-to-end tests of the command-line interface on small SAM files.

use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const REFERENCE: &str = "ACGTTGCAACGGTACCATGATCCA";

fn sam_file(dir: &TempDir, name: &str, records: &[String]) -> PathBuf {
    let mut text = format!("@HD\tVN:1.6\tSO:coordinate\n@SQ\tSN:chr1\tLN:{}\n", REFERENCE.len());
    for record in records {
        text.push_str(record);
        text.push('\n');
    }
    let path = dir.path().join(name);
    std::fs::write(&path, text).unwrap();
    path
}

fn record(name: &str, pos: usize, cigar: &str, sequence: &str) -> String {
    format!("{name}\t0\tchr1\t{pos}\t60\t{cigar}\t*\t0\t0\t{sequence}\t*")
}

fn full_coverage(dir: &TempDir) -> PathBuf {
    let mut records: Vec<String> = (0..3)
        .map(|i| record(&format!("r{i}"), 1, "24M", REFERENCE))
        .collect();
    let mut variant = REFERENCE.to_string();
    variant.replace_range(4..5, "A");
    records.push(record("alt", 1, "24M", &variant));
    sam_file(dir, "full.sam", &records)
}

fn cmd() -> Command {
    Command::cargo_bin("clip-consensus").unwrap()
}

#[test]
fn test_consensus_fasta_on_stdout() {
    let dir = TempDir::new().unwrap();
    let input = full_coverage(&dir);

    cmd()
        .arg("consensus")
        .arg(&input)
        .assert()
        .success()
        .stdout(format!(">chr1_cns\n{REFERENCE}\n"))
        .stderr(predicate::str::contains("chr1").and(predicate::str::contains("MD5")));
}

#[test]
fn test_consensus_realign_extends_past_reference_end() {
    let dir = TempDir::new().unwrap();
    let mut records: Vec<String> = (0..3)
        .map(|i| {
            record(
                &format!("clip{i}"),
                15,
                "10M4S",
                &format!("{}TTAG", &REFERENCE[14..]),
            )
        })
        .collect();
    records.push(record("full", 1, "24M", REFERENCE));
    let input = sam_file(&dir, "clipped.sam", &records);

    cmd()
        .args(["consensus", "--realign", "--min-depth", "1"])
        .arg(&input)
        .assert()
        .success()
        .stdout(format!(">chr1_cns\n{REFERENCE}ttag\n"));

    cmd()
        .args(["consensus", "--realign", "--uppercase", "--min-depth", "1"])
        .arg(&input)
        .assert()
        .success()
        .stdout(format!(">chr1_cns\n{REFERENCE}TTAG\n"));
}

#[test]
fn test_consensus_writes_output_and_json_report() {
    let dir = TempDir::new().unwrap();
    let input = full_coverage(&dir);
    let fasta = dir.path().join("out.fa");
    let report = dir.path().join("report.json");

    cmd()
        .args(["consensus", "--format", "json", "--output"])
        .arg(&fasta)
        .arg("--report")
        .arg(&report)
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let written = std::fs::read_to_string(&fasta).unwrap();
    assert!(written.starts_with(">chr1_cns\n"));

    let summaries: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(summaries[0]["name"], "chr1");
    assert_eq!(summaries[0]["consensus_length"], REFERENCE.len());
    assert_eq!(summaries[0]["records"]["tallied"], 4);
}

#[test]
fn test_invalid_threshold_fails_fast() {
    let dir = TempDir::new().unwrap();
    let input = full_coverage(&dir);

    cmd()
        .args(["consensus", "--clip-decay-threshold", "1.5"])
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("clip_decay_threshold"));

    cmd()
        .args(["variants", "--rel-threshold", "2"])
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("rel_threshold"));
}

#[test]
fn test_header_without_contigs_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("empty.sam");
    std::fs::write(&path, "@HD\tVN:1.6\n").unwrap();

    cmd()
        .arg("consensus")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("No @SQ lines"));
}

#[test]
fn test_weights_table() {
    let dir = TempDir::new().unwrap();
    let input = full_coverage(&dir);

    let output = cmd().arg("weights").arg(&input).assert().success();
    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();

    assert_eq!(
        lines[0],
        "contig\tpos\tA\tC\tG\tT\tN\tdepth\tconsensus\tlower_ci\tupper_ci\tshannon"
    );
    assert_eq!(lines.len(), REFERENCE.len() + 1);
    assert!(lines[5].starts_with("chr1\t5\t1\t0\t0\t3\t0\t4\tT\t"));
}

#[test]
fn test_weights_relative_no_confidence() {
    let dir = TempDir::new().unwrap();
    let input = full_coverage(&dir);

    cmd()
        .args(["weights", "--relative", "--no-confidence"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("chr1\t5\t0.25\t0\t0\t0.75\t0\t4\n"));
}

#[test]
fn test_features_table() {
    let dir = TempDir::new().unwrap();
    let input = sam_file(
        &dir,
        "indels.sam",
        &[
            record("a", 1, "3S5M", "GGGACGTT"),
            record("b", 1, "2M1I3M", "ACAGTT"),
        ],
    );

    cmd()
        .arg("features")
        .arg(&input)
        .assert()
        .success()
        .stdout(
            predicate::str::starts_with(
                "contig\tpos\tA\tC\tG\tT\tN\tdepth\tinsertions\tdeletions\tclip_starts\tclip_ends\n",
            )
            .and(predicate::str::contains("chr1\t1\t2\t0\t0\t0\t0\t2\t0\t0\t1\t0\n"))
            .and(predicate::str::contains("chr1\t2\t0\t2\t0\t0\t0\t2\t1\t0\t0\t0\n")),
        );
}

#[test]
fn test_variants_only_variants() {
    let dir = TempDir::new().unwrap();
    let input = full_coverage(&dir);

    let all = cmd().arg("variants").arg(&input).assert().success();
    let all = String::from_utf8(all.get_output().stdout.clone()).unwrap();
    assert_eq!(all.lines().count(), REFERENCE.len() + 1);
    assert!(all.contains("chr1\t1\tA\t0\t0\t4\n"));

    cmd()
        .args(["variants", "--only-variants", "--absolute"])
        .arg(&input)
        .assert()
        .success()
        .stdout("contig\tpos\tref\talt\tvalue\tdepth\nchr1\t5\tT\tA\t1\t4\n");

    cmd()
        .args(["variants", "--only-variants", "--rel-threshold", "0.5"])
        .arg(&input)
        .assert()
        .success()
        .stdout("contig\tpos\tref\talt\tvalue\tdepth\n");
}
