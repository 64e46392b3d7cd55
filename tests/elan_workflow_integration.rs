//! Processed tree to ELAN and back, and archive extraction ahead of a run

mod common;

use common::builders::{SessionLogBuilder, Workspace};
use common::{read_tree, FixedDurationProbe};
use datacollect_rs::tools::elan::ElanExporter;
use datacollect_rs::tools::{import_labels, unzip_all};
use datacollect_rs::types::DataType;
use datacollect_rs::{Config, ReorganizeSettings, Reorganizer};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

fn reorganize(ws: &Workspace) {
    let mut config = Config::default();
    config.cameras.insert("a33".into(), DataType::HandheldRgb);
    let report = Reorganizer::new(config, ReorganizeSettings::new(&ws.raw, &ws.log, &ws.out))
        .with_probe(Box::new(FixedDurationProbe(3000)))
        .run()
        .unwrap();
    assert!(!report.has_failures(), "{}", report);
}

fn write_templates(dir: &Path) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join("setup_A.pfsx"), "video={absolute_video_path}").unwrap();
    fs::write(
        dir.join("setup_A_tsconf.xml"),
        "<ts wrist=\"{absolute_wrist_path}\" phone=\"{absolute_phone_path}\"/>",
    )
    .unwrap();
    fs::write(
        dir.join("setup_A.eaf"),
        "<eaf id=\"{session_id}\" ts=\"{absolute_xml_path}\">{{x}}</eaf>",
    )
    .unwrap();
}

fn session_with_every_sensor(ws: &Workspace) {
    ws.write_log(SessionLogBuilder::new().session(1, 1000, 5000, "S1", "A"));
    let tree = ws.raw_tree();
    tree.watch("19700101", "W2", "data.csv", &[1200, 1220, 1240, 1260, 4800]);
    tree.camera("19700101", "a33", "TimeVideo_19700101_070001.000.mp4");
    tree.sensorlogger("19700101", "P1", "rec", 1100, 4900);
}

#[test]
fn test_elan_project_from_processed_tree() {
    let ws = Workspace::new();
    session_with_every_sensor(&ws);
    reorganize(&ws);

    let templates = ws.path().join("templates");
    write_templates(&templates);
    let elan_root = ws.path().join("elan");

    let summary = ElanExporter::new(&ws.out, &templates, &elan_root, 2)
        .run()
        .unwrap();
    assert_eq!(summary.sessions_found, 1);
    assert_eq!(summary.sessions_processed, 1);
    assert_eq!(summary.files_written, 5);
    assert!(summary.failures.is_empty());

    let project = elan_root.join("A/1000_5000_S1_1");
    let eaf = fs::read_to_string(project.join("1000_5000_S1_1.eaf")).unwrap();
    assert!(eaf.starts_with("<eaf id=\"1000_5000_S1_1\" ts=\""));
    assert!(eaf.contains("1000_5000_S1_1_tsconf.xml"));
    assert!(eaf.ends_with("{x}</eaf>"));

    let pfsx = fs::read_to_string(project.join("1000_5000_S1_1.pfsx")).unwrap();
    assert!(pfsx.ends_with("handheld_rgb/a33_handheld_rgb.mp4"));

    let wrist = fs::read_to_string(project.join("1000_5000_S1_1_inertia_watch.csv")).unwrap();
    let lines: Vec<&str> = wrist.lines().collect();
    assert_eq!(lines[0], "sec,timestamp,acc_x,acc_y,acc_z,gyr_x,gyr_y,gyr_z");
    // every second sample survives down-sampling
    assert_eq!(lines.len(), 4);
    assert!(lines[2].starts_with("0.04,1240,"));

    let phone = fs::read_to_string(project.join("1000_5000_S1_1_inertia_phone.csv")).unwrap();
    assert!(phone.starts_with("sec,timestamp,acc_x,acc_y,acc_z\n0,1100,"));

    // a second export leaves existing files alone
    fs::write(project.join("1000_5000_S1_1.eaf"), "annotated").unwrap();
    let again = ElanExporter::new(&ws.out, &templates, &elan_root, 2)
        .run()
        .unwrap();
    assert_eq!(again.files_written, 0);
    assert_eq!(
        fs::read_to_string(project.join("1000_5000_S1_1.eaf")).unwrap(),
        "annotated"
    );
}

#[test]
fn test_elan_skips_sessions_without_video() {
    let ws = Workspace::new();
    ws.write_log(SessionLogBuilder::new().session(1, 1000, 5000, "S1", "A"));
    ws.raw_tree().watch("19700101", "W2", "data.csv", &[1200, 4800]);
    reorganize(&ws);

    let templates = ws.path().join("templates");
    write_templates(&templates);
    let elan_root = ws.path().join("elan");
    let summary = ElanExporter::new(&ws.out, &templates, &elan_root, 4)
        .run()
        .unwrap();
    assert_eq!(summary.skipped.len(), 1);
    assert_eq!(summary.sessions_processed, 0);
    assert!(read_tree(&elan_root).is_empty());
}

#[test]
fn test_unknown_placeholder_fails_only_that_session() {
    let ws = Workspace::new();
    session_with_every_sensor(&ws);
    reorganize(&ws);

    let templates = ws.path().join("templates");
    write_templates(&templates);
    fs::write(templates.join("setup_A.pfsx"), "{absolute_audio_path}").unwrap();

    let summary = ElanExporter::new(&ws.out, &templates, ws.path().join("elan"), 4)
        .run()
        .unwrap();
    assert_eq!(summary.failures.len(), 1);
    assert!(summary.failures[0].1.contains("absolute_audio_path"));
}

#[test]
fn test_edited_setup_cannot_leave_the_elan_root() {
    let ws = Workspace::new();
    session_with_every_sensor(&ws);
    reorganize(&ws);

    let manifest = ws.out.join("1000_5000_S1_1/session.json");
    let text = fs::read_to_string(&manifest).unwrap();
    assert!(text.contains("\"setup_id\": \"A\""));
    fs::write(&manifest, text.replace("\"setup_id\": \"A\"", "\"setup_id\": \"../x\"")).unwrap();

    let templates = ws.path().join("templates");
    write_templates(&templates);
    let elan_root = ws.path().join("elan");
    let summary = ElanExporter::new(&ws.out, &templates, &elan_root, 2)
        .run()
        .unwrap();
    assert_eq!(summary.failures.len(), 1);
    assert!(summary.failures[0].1.contains("../x"));
    assert!(!ws.path().join("x").exists());
}

#[test]
fn test_import_labels_into_processed_tree() {
    let ws = Workspace::new();
    session_with_every_sensor(&ws);
    reorganize(&ws);

    let labels = ws.path().join("labels.txt");
    fs::write(&labels, "walk\nsit\n").unwrap();
    let export = ws.path().join("export.csv");
    fs::write(
        &export,
        "labels,,500,1500,walk,/home/me/elan/A/1000_5000_S1_1/1000_5000_S1_1.eaf\n\
         labels,,0,400,sit ,/home/me/elan/A/1000_5000_S1_1/1000_5000_S1_1.eaf\n",
    )
    .unwrap();

    let summary = import_labels(&export, &labels, &ws.out).unwrap();
    assert_eq!(summary.sessions, 1);
    assert_eq!(summary.rows, 2);
    assert!(summary.missing.is_empty());

    let written = fs::read_to_string(
        ws.out
            .join("1000_5000_S1_1/offline_label/elan_offline_label.csv"),
    )
    .unwrap();
    assert_eq!(written, "label,start,end\nsit,1000,1400\nwalk,1500,2500\n");
}

fn zip_recording(path: &PathBuf, start_ms: i64, end_ms: i64) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
    for sensor in ["Accelerometer.csv", "Gyroscope.csv"] {
        writer
            .start_file(sensor, zip::write::SimpleFileOptions::default())
            .unwrap();
        write!(
            writer,
            "time,seconds_elapsed,z,y,x\n{},0,9.8,0,0\n{},1,9.8,0,0\n",
            start_ms * 1_000_000,
            end_ms * 1_000_000
        )
        .unwrap();
    }
    writer.finish().unwrap();
}

#[test]
fn test_unzipped_recordings_are_reorganized() {
    let ws = Workspace::new();
    ws.write_log(SessionLogBuilder::new().session(1, 1000, 5000, "S1", "A"));
    let archive = ws.raw.join("19700101/P1/sensorlogger/rec.zip");
    zip_recording(&archive, 1100, 4900);

    let report = unzip_all(&ws.raw, true).unwrap();
    assert_eq!(report.extracted.len(), 1);
    assert!(!archive.exists());

    reorganize(&ws);
    assert!(ws
        .out
        .join("1000_5000_S1_1/inertia_phone/P1_inertia_phone/Gyroscope.csv")
        .is_file());
}
