use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

fn cargo_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_qr-labels"))
}

const EQUIPMENT_CSV: &str = "\
Modèle;Code matériel;Catégorie;Numéro de Série;Commentaire
Latitude 5440;PC-001;Ordinateur;SN-8841;bureau 12
LaserJet M404;IMP-001;Imprimante;SN-1123;
Latitude 5440;PC-002;Ordinateur;SN-8842;
";

const ROOM_CSV: &str = "\
Numéro de Signalétique;Localisation
A12;3F
B07;RDC
C01;2F
";

fn write_csv(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).expect("Failed to write CSV");
    path
}

fn assert_pdf(path: &Path) {
    assert!(path.exists(), "PDF file was not created: {}", path.display());
    let metadata = fs::metadata(path).expect("Failed to get file metadata");
    assert!(metadata.len() > 1000, "PDF file is too small, likely empty or corrupt");
}

fn file_count(dir: &Path) -> usize {
    fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

#[test]
fn test_models_lists_counts() {
    let tmp = tempfile::tempdir().unwrap();
    let csv = write_csv(tmp.path(), "inventaire.csv", EQUIPMENT_CSV);

    let output = cargo_bin()
        .args(["models", csv.to_str().unwrap()])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success(), "Command failed: {:?}", output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("equipment (3 rows)"), "{}", stdout);
    assert!(stdout.contains("2  Latitude 5440"), "{}", stdout);
    assert!(stdout.contains("1  LaserJet M404"), "{}", stdout);
}

#[test]
fn test_equipment_split_across_formats() {
    let tmp = tempfile::tempdir().unwrap();
    let csv = write_csv(tmp.path(), "inventaire.csv", EQUIPMENT_CSV);
    let out = tmp.path().join("stickers");

    let output = cargo_bin()
        .args([
            "generate",
            csv.to_str().unwrap(),
            "-o", out.to_str().unwrap(),
            "--assign", "Latitude 5440=small-square",
            "--assign", "LaserJet M404=large-vertical",
            "--no-progress",
        ])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success(), "Command failed: {:?}", output);
    assert_pdf(&out.join("smallSquareQRs.pdf"));
    assert_pdf(&out.join("largeVerticalQRs.pdf"));
    assert!(!out.join("mediumHoriQRs.pdf").exists(), "Empty format produced a file");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("✓ Generated:"), "{}", stdout);
    assert!(stdout.contains("Skipped: medium-horizontal"), "{}", stdout);
}

#[test]
fn test_blank_serial_number_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let csv = write_csv(
        tmp.path(),
        "inventaire.csv",
        "Modèle;Code matériel;Catégorie;Numéro de Série\n\
         Latitude 5440;PC-001;Ordinateur;SN1\n\
         Latitude 5440;PC-002;Ordinateur;  \n\
         Latitude 5440;PC-003;Ordinateur;SN3\n",
    );
    let out = tmp.path().join("stickers");

    let output = cargo_bin()
        .args([
            "generate",
            csv.to_str().unwrap(),
            "-o", out.to_str().unwrap(),
            "--default-format", "large-vertical",
            "--no-progress",
        ])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success(), "Blank serial number was accepted");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error: Invalid inventory file"), "{}", stderr);
    assert!(stderr.contains("Numéro de Série"), "{}", stderr);
    assert_eq!(file_count(&out), 0, "Files were written for an invalid batch");
}

#[test]
fn test_meeting_rooms_single_format() {
    let tmp = tempfile::tempdir().unwrap();
    let csv = write_csv(tmp.path(), "salles.csv", ROOM_CSV);
    let out = tmp.path().join("stickers");
    let summary = tmp.path().join("summary.json");

    let output = cargo_bin()
        .args([
            "generate",
            csv.to_str().unwrap(),
            "-o", out.to_str().unwrap(),
            "--default-format", "medium-horizontal",
            "--caption", "Un souci dans cette salle ? Scannez-moi",
            "--summary", summary.to_str().unwrap(),
            "--no-progress",
        ])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success(), "Command failed: {:?}", output);
    assert_pdf(&out.join("mediumHoriQRs.pdf"));
    assert_eq!(file_count(&out), 1);

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&summary).unwrap()).unwrap();
    assert_eq!(json["outputs"][0]["format"], "medium-horizontal");
    assert_eq!(json["outputs"][0]["labels"], 3);
    assert_eq!(json["outputs"][0]["pages"], 1);
}

#[test]
fn test_meeting_rooms_need_a_format() {
    let tmp = tempfile::tempdir().unwrap();
    let csv = write_csv(tmp.path(), "salles.csv", ROOM_CSV);
    let out = tmp.path().join("stickers");

    let output = cargo_bin()
        .args(["generate", csv.to_str().unwrap(), "-o", out.to_str().unwrap(), "--no-progress"])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    assert_eq!(file_count(&out), 0);
}

#[test]
fn test_unassigned_model_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let csv = write_csv(tmp.path(), "inventaire.csv", EQUIPMENT_CSV);
    let out = tmp.path().join("stickers");

    let output = cargo_bin()
        .args([
            "generate",
            csv.to_str().unwrap(),
            "-o", out.to_str().unwrap(),
            "--assign", "Latitude 5440=small-square",
            "--no-progress",
        ])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("LaserJet M404"), "{}", stderr);
    assert_eq!(file_count(&out), 0);
}

#[test]
fn test_skipped_model_is_left_out() {
    let tmp = tempfile::tempdir().unwrap();
    let csv = write_csv(tmp.path(), "inventaire.csv", EQUIPMENT_CSV);
    let out = tmp.path().join("stickers");
    let summary = tmp.path().join("summary.json");

    let output = cargo_bin()
        .args([
            "generate",
            csv.to_str().unwrap(),
            "-o", out.to_str().unwrap(),
            "--assign", "Latitude 5440=small-square",
            "--skip", "LaserJet M404",
            "--summary", summary.to_str().unwrap(),
            "--no-progress",
        ])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success(), "Command failed: {:?}", output);
    assert_pdf(&out.join("smallSquareQRs.pdf"));
    assert_eq!(file_count(&out), 1);

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&summary).unwrap()).unwrap();
    assert_eq!(json["outputs"][0]["labels"], 2);
}

#[test]
fn test_skipping_unknown_model_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let csv = write_csv(tmp.path(), "inventaire.csv", EQUIPMENT_CSV);
    let out = tmp.path().join("stickers");

    let output = cargo_bin()
        .args([
            "generate",
            csv.to_str().unwrap(),
            "-o", out.to_str().unwrap(),
            "--default-format", "small-square",
            "--skip", "Optiplex 7010",
            "--no-progress",
        ])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Optiplex 7010"), "{}", stderr);
    assert_eq!(file_count(&out), 0);
}

#[test]
fn test_unknown_format_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let csv = write_csv(tmp.path(), "inventaire.csv", EQUIPMENT_CSV);

    let output = cargo_bin()
        .args([
            "generate",
            csv.to_str().unwrap(),
            "-o", tmp.path().join("stickers").to_str().unwrap(),
            "--assign", "Latitude 5440=poster",
        ])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown format 'poster'"), "{}", stderr);
}

#[test]
fn test_geometry_round_trip() {
    let tmp = tempfile::tempdir().unwrap();

    let output = cargo_bin()
        .arg("geometry")
        .output()
        .expect("Failed to execute command");
    assert!(output.status.success(), "Command failed: {:?}", output);
    let toml = String::from_utf8_lossy(&output.stdout).to_string();
    assert!(toml.contains("[large_vertical]"));
    assert!(toml.contains("[small_square.qr]"));

    let path = tmp.path().join("sheets.toml");
    fs::write(&path, &toml).unwrap();
    let output = cargo_bin()
        .args(["geometry", "--from", path.to_str().unwrap()])
        .output()
        .expect("Failed to execute command");
    assert!(output.status.success(), "Command failed: {:?}", output);
    assert_eq!(String::from_utf8_lossy(&output.stdout), toml);
}

#[test]
fn test_missing_logo_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let csv = write_csv(tmp.path(), "salles.csv", ROOM_CSV);
    let out = tmp.path().join("stickers");

    let output = cargo_bin()
        .args([
            "generate",
            csv.to_str().unwrap(),
            "-o", out.to_str().unwrap(),
            "--default-format", "large-vertical",
            "--logo", tmp.path().join("nope.png").to_str().unwrap(),
        ])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to load asset"), "{}", stderr);
    assert_eq!(file_count(&out), 0);
}
