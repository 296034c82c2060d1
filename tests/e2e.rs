//! End-to-end tests against a real LibreOffice + pdfium installation.
//!
//! Gated behind the `E2E_ENABLED` environment variable so they do not run in
//! CI unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 PDFIUM_LIB_PATH=/path/to/libpdfium.so cargo test --test e2e -- --nocapture
//!
//! `PPTX2PNG_SOFFICE` overrides the `soffice` executable.

mod common;

use common::*;
use edgequake_pptx2png::{check_overflow, convert, ConversionConfig, Side};
use std::path::PathBuf;

macro_rules! e2e_skip_unless_enabled {
    () => {
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
    };
}

fn live_config(work: &std::path::Path, dpi: Option<u32>) -> ConversionConfig {
    let mut builder = ConversionConfig::builder().work_dir_parent(work);
    if let Some(soffice) = std::env::var_os("PPTX2PNG_SOFFICE") {
        builder = builder.soffice_path(PathBuf::from(soffice));
    }
    if let Some(dpi) = dpi {
        builder = builder.dpi(dpi);
    }
    builder.build().unwrap()
}

#[tokio::test]
async fn test_live_left_overflow_detected() {
    e2e_skip_unless_enabled!();
    let dir = tempfile::tempdir().unwrap();
    let deck = write_pptx(dir.path(), "left.pptx", 10.0, 7.5, &[vec![boxed(-0.2, 0.0, 2.0, 3.0)]]);

    let report = check_overflow(&deck, &live_config(dir.path(), Some(150)))
        .await
        .expect("check_overflow() should succeed");

    println!("{}", report.warning_text().unwrap_or_default());
    assert_eq!(report.failing_slides(), [1]);
    assert!(report.overflowing[0].margins.iter().any(|m| m.side == Side::Left));
}

#[tokio::test]
async fn test_live_inside_canvas_clean() {
    e2e_skip_unless_enabled!();
    let dir = tempfile::tempdir().unwrap();
    let deck = write_pptx(dir.path(), "inside.pptx", 10.0, 7.5, &[vec![boxed(0.5, 0.5, 2.0, 3.0)]]);

    for dpi in [72, 150, 300] {
        let report = check_overflow(&deck, &live_config(dir.path(), Some(dpi)))
            .await
            .expect("check_overflow() should succeed");
        assert!(report.failing_slides().is_empty(), "dpi {dpi}: {:?}", report.overflowing);
    }
}

#[tokio::test]
async fn test_live_convert_writes_ordered_slides() {
    e2e_skip_unless_enabled!();
    let dir = tempfile::tempdir().unwrap();
    let slides: Vec<_> = (0..3).map(|i| vec![boxed(1.0 + i as f64, 1.0, 2.0, 2.0)]).collect();
    let deck = write_pptx(dir.path(), "three.pptx", 13.333_333, 7.5, &slides);
    let out = dir.path().join("ppt-preview");

    let output = convert(&deck, &out, &live_config(dir.path(), None))
        .await
        .expect("convert() should succeed");

    assert_eq!(output.dpi, 120);
    assert_eq!(output.slide_paths.len(), 3);
    for (i, path) in output.slide_paths.iter().enumerate() {
        assert_eq!(path, &out.join(format!("slide-{}.png", i + 1)));
        let img = image::open(path).unwrap();
        assert!(img.width() <= 1601 && img.height() <= 901, "{}x{}", img.width(), img.height());
    }
    println!("Stats: {:?}", output.stats);
}
