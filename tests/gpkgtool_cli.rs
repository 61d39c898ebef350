use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

const STATIONS_CSV: &str = "\
lat;lon;name;opened
52.52;13.40;Berlin;2023-01-15
48.14;11.58;Munich;2022-06-01
;9.99;Hamburg;2021-03-20
";

fn gpkgtool() -> Command {
    Command::cargo_bin("gpkgtool").expect("gpkgtool binary")
}

fn write_csv(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).expect("write csv");
    path
}

#[test]
fn convert_writes_gpkg_and_reports_skipped_rows() {
    let dir = tempfile::tempdir().expect("temp dir");
    let csv = write_csv(dir.path(), "Train Stations.csv", STATIONS_CSV);
    let out = dir.path().join("stations.gpkg");

    gpkgtool()
        .arg("convert")
        .arg(&csv)
        .arg("-o")
        .arg(&out)
        .args(["-t", "opened=DATE"])
        .assert()
        .success()
        .stdout(predicate::str::contains("stations.gpkg"))
        .stderr(predicate::str::contains("Skipped 1 rows"))
        .stderr(predicate::function(|err: &str| {
            err.to_lowercase().matches("skipped").count() == 1
        }));

    gpkgtool()
        .arg("layers")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("train_stations\tfeatures\tEPSG:4326"));
}

#[test]
fn convert_with_explicit_wkt_column() {
    let dir = tempfile::tempdir().expect("temp dir");
    let csv = write_csv(
        dir.path(),
        "shapes.csv",
        "shape,label\n\"LINESTRING (0 0, 1 1)\",a\n\"POINT (2 2)\",b\n",
    );
    let out = dir.path().join("shapes.gpkg");

    gpkgtool()
        .arg("convert")
        .arg(&csv)
        .arg("--output")
        .arg(&out)
        .args(["--wkt", "shape", "--layer", "shapes"])
        .assert()
        .success();

    gpkgtool()
        .arg("export-text")
        .arg(&out)
        .args(["--column", "label"])
        .assert()
        .success()
        .stdout("a\nb\n");
}

#[test]
fn convert_fails_on_malformed_wkt() {
    let dir = tempfile::tempdir().expect("temp dir");
    let csv = write_csv(
        dir.path(),
        "bad.csv",
        "geom,name\nPOINT (1 2),a\nNOT A GEOM,b\n",
    );
    let out = dir.path().join("bad.gpkg");

    gpkgtool()
        .arg("convert")
        .arg(&csv)
        .arg("-o")
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("row 2"));
    assert!(!out.exists());
}

#[test]
fn convert_rejects_unknown_type_name() {
    gpkgtool()
        .args(["convert", "whatever.csv", "-t", "count=NUMBER"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown column type"));
}

#[test]
fn convert_refuses_existing_output_without_overwrite() {
    let dir = tempfile::tempdir().expect("temp dir");
    let csv = write_csv(dir.path(), "stations.csv", STATIONS_CSV);
    let out = dir.path().join("stations.gpkg");

    let convert = |overwrite: bool| {
        let mut cmd = gpkgtool();
        cmd.arg("convert").arg(&csv).arg("-o").arg(&out);
        if overwrite {
            cmd.arg("--overwrite");
        }
        cmd.assert()
    };

    convert(false).success();
    convert(false)
        .failure()
        .stderr(predicate::str::contains("already exists"));
    convert(true).success();
}

#[test]
fn validate_passes_clean_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let csv = write_csv(dir.path(), "stations.csv", STATIONS_CSV);
    let out = dir.path().join("stations.gpkg");
    gpkgtool()
        .arg("convert")
        .arg(&csv)
        .arg("-o")
        .arg(&out)
        .assert()
        .success();

    gpkgtool()
        .arg("validate")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("No errors found"));
}

#[test]
fn validate_flags_bad_column_names() {
    let dir = tempfile::tempdir().expect("temp dir");
    let csv = write_csv(
        dir.path(),
        "names.csv",
        "geom,station name\nPOINT (1 2),a\n",
    );
    let out = dir.path().join("names.gpkg");
    gpkgtool()
        .arg("convert")
        .arg(&csv)
        .arg("-o")
        .arg(&out)
        .assert()
        .success();

    gpkgtool()
        .arg("validate")
        .arg(&out)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Column 'station name'"));
}

#[test]
fn validate_missing_file_fails() {
    let dir = tempfile::tempdir().expect("temp dir");
    gpkgtool()
        .arg("validate")
        .arg(dir.path().join("missing.gpkg"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}
