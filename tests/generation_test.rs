use image::{Rgba, RgbaImage};
use qr_labels::{
    parse_batch, run_generation, AssetPaths, LabelFormat, ModelAssignment, NoopProgress,
    RenderAssets, RenderSettings,
};
use std::fmt::Write;

/// Generous ceiling on the bytes one label adds to a sheet without logos.
const MAX_BYTES_PER_LABEL: u64 = 128 * 1024;

fn room_csv(rooms: usize) -> String {
    let mut csv = String::from("Numéro de Signalétique;Localisation\n");
    for n in 1..=rooms {
        writeln!(csv, "S{:02};{}F", n, n % 5).unwrap();
    }
    csv
}

fn write_logo(path: &std::path::Path) {
    let mut logo = RgbaImage::from_pixel(200, 80, Rgba([0, 0, 0, 0]));
    for x in 20..180 {
        for y in 20..60 {
            logo.put_pixel(x, y, Rgba([1, 158, 227, 255]));
        }
    }
    logo.save(path).expect("Failed to write logo");
}

#[test]
fn small_square_pages_after_twelve_labels() {
    let tmp = tempfile::tempdir().unwrap();
    let batch = parse_batch(&room_csv(13)).unwrap();
    let settings = RenderSettings::new(tmp.path());

    let summary = run_generation(
        &batch,
        &ModelAssignment::for_rooms(LabelFormat::SmallSquare),
        &settings,
        &RenderAssets::default(),
        &NoopProgress,
    )
    .unwrap();

    let output = summary.output(LabelFormat::SmallSquare).unwrap();
    assert_eq!(output.labels, 13);
    assert_eq!(output.pages, 2);
    assert_eq!(
        summary.skipped,
        vec![LabelFormat::LargeVertical, LabelFormat::MediumHorizontal]
    );
}

#[test]
fn logos_are_loaded_and_drawn() {
    let tmp = tempfile::tempdir().unwrap();
    let logo = tmp.path().join("logo.png");
    write_logo(&logo);

    let assets = RenderAssets::load(&AssetPaths {
        logo: Some(logo.clone()),
        qr_logo: Some(logo),
        ..Default::default()
    })
    .unwrap();
    assert!(assets.page_logo.is_some());
    assert_eq!(assets.qr_logo.as_ref().map(|l| l.dimensions()), Some((60, 24)));

    let batch = parse_batch(&room_csv(3)).unwrap();
    let out = tmp.path().join("out");
    let plain = tmp.path().join("plain");

    for format in LabelFormat::ALL {
        let settings = RenderSettings::new(&out);
        run_generation(
            &batch,
            &ModelAssignment::for_rooms(format),
            &settings,
            &assets,
            &NoopProgress,
        )
        .unwrap();

        let settings = RenderSettings::new(&plain);
        run_generation(
            &batch,
            &ModelAssignment::for_rooms(format),
            &settings,
            &RenderAssets::default(),
            &NoopProgress,
        )
        .unwrap();
    }

    // The page logo adds an image to the two formats that draw one.
    for format in [LabelFormat::LargeVertical, LabelFormat::MediumHorizontal] {
        let with_logo = std::fs::metadata(out.join(format.file_name())).unwrap().len();
        let without = std::fs::metadata(plain.join(format.file_name())).unwrap().len();
        assert!(with_logo > without, "{}: {} <= {}", format, with_logo, without);
    }
}

#[test]
fn sheets_stay_compact() {
    let tmp = tempfile::tempdir().unwrap();
    let batch = parse_batch(&room_csv(24)).unwrap();

    for format in LabelFormat::ALL {
        let settings = RenderSettings::new(tmp.path());
        run_generation(
            &batch,
            &ModelAssignment::for_rooms(format),
            &settings,
            &RenderAssets::default(),
            &NoopProgress,
        )
        .unwrap();

        let size = std::fs::metadata(tmp.path().join(format.file_name()))
            .unwrap()
            .len();
        assert!(
            size < 24 * MAX_BYTES_PER_LABEL,
            "{}: {} bytes for 24 labels",
            format,
            size
        );
    }
}
