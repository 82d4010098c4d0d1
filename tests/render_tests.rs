//! Certificate layout and PDF output

mod common;

use calcert::core::{Autofill, Config};
use calcert::entities::{
    CertificateDraft, ChannelCount, DraftAction, Equipment, EquipmentKind, InstrumentKind,
};
use calcert::render::{self, compose, AssetKind, Assets, RenderError};
use chrono::NaiveDate;
use common::{calcert, create_manual_draft, run_ok, setup_test_project};
use predicates::prelude::*;
use std::fs;

fn base_draft() -> CertificateDraft {
    let mut draft = CertificateDraft::new("tester", NaiveDate::from_ymd_opt(2025, 5, 20).unwrap());
    let mut autofill = Autofill::seeded(3);
    for action in [
        DraftAction::SetAutomation(false),
        DraftAction::SetTemperature(26.0),
        DraftAction::SetCertificateNumber("321.25".into()),
    ] {
        draft = draft.apply(action, &mut autofill).unwrap().draft;
    }
    draft.serial_number = "SN-7".into();
    draft
}

fn apply(draft: CertificateDraft, action: DraftAction) -> CertificateDraft {
    draft.apply(action, &mut Autofill::seeded(3)).unwrap().draft
}

fn compose_default(draft: &CertificateDraft) -> Result<render::Document, RenderError> {
    let config = Config::default();
    compose(draft, &config.laboratory, &config.standards_used, &Assets::none())
}

fn write_image(path: &std::path::Path, width: u32, height: u32) {
    image::RgbImage::from_pixel(width, height, image::Rgb([40, 90, 160]))
        .save(path)
        .unwrap();
}

fn has_stream_with(bytes: &[u8], key: &[u8]) -> bool {
    let parsed = lopdf::Document::load_mem(bytes).unwrap();
    parsed.objects.values().any(|object| match object {
        lopdf::Object::Dictionary(dict) => dict.has(key),
        lopdf::Object::Stream(stream) => stream.dict.has(key),
        _ => false,
    })
}

#[test]
fn test_point_block_values_on_certificate() {
    let draft = base_draft();
    let point = draft.equipment.points().next().unwrap().id;
    let draft = apply(
        draft,
        DraftAction::SetNominal {
            point,
            volume: Some(100.0),
        },
    );
    let draft = apply(
        draft,
        DraftAction::SetReadings {
            point,
            text: "99.4, 99.5".into(),
        },
    );

    let text = compose_default(&draft).unwrap().plain_text();
    assert!(text.contains("Ponto 1 de medição"));
    assert!(text.contains("99,88µL"));
    assert!(text.contains("-0,12µL"));
    assert!(text.contains("-0,12%"));
    assert!(text.contains("1,0043"));
    assert!(text.contains("321.25"));
}

#[test]
fn test_multichannel_groups_by_channel() {
    let draft = apply(base_draft(), DraftAction::SetInstrument(InstrumentKind::Multichannel));
    let draft = apply(
        draft,
        DraftAction::SetChannelCount(ChannelCount::try_from(8u8).unwrap()),
    );

    let text = compose_default(&draft).unwrap().plain_text();
    assert!(text.contains("Canal 1:"));
    assert!(text.contains("Canal 8:"));
    assert!(text.contains("MICROPIPETA MULTICANAL"));
}

#[test]
fn test_large_multichannel_spans_pages() {
    let draft = apply(base_draft(), DraftAction::SetInstrument(InstrumentKind::Multichannel));
    let draft = apply(
        draft,
        DraftAction::SetChannelCount(ChannelCount::try_from(12u8).unwrap()),
    );
    let draft = apply(draft, DraftAction::SetPointsPerChannel(10));
    assert_eq!(draft.equipment.points().count(), 120);

    let rendered = render::render(&draft, &Config::default(), &Assets::none()).unwrap();
    assert!(rendered.page_count > 1);

    let parsed = lopdf::Document::load_mem(&rendered.bytes).unwrap();
    assert_eq!(parsed.get_pages().len(), rendered.page_count);
    assert_eq!(rendered.fingerprint.len(), 64);
}

#[test]
fn test_accented_text_is_typeset_with_embedded_font() {
    let mut config = Config::default();
    config.laboratory.name = "Laboratório de Calibração São João".into();
    config.laboratory.contact = "Ç ã õ ê µL ± º".into();
    config.standards_used = "Balança analítica nº 3\nTermômetro digital".into();

    let rendered = render::render(&base_draft(), &config, &Assets::none()).unwrap();
    assert_eq!(rendered.page_count, 1);
    assert!(has_stream_with(&rendered.bytes, b"FontFile2"));
}

#[test]
fn test_repipetter_groups_by_syringe() {
    let draft = apply(base_draft(), DraftAction::SetEquipment(EquipmentKind::Repipetter));
    let syringe = draft.equipment.syringes().unwrap()[0].id;
    let draft = apply(
        draft,
        DraftAction::SetSyringeNominal {
            syringe,
            volume: Some(5.0),
            unit: Some("mL".parse().unwrap()),
        },
    );

    let text = compose_default(&draft).unwrap().plain_text();
    assert!(text.contains("Seringa de 5mL:"));
}

#[test]
fn test_repipetter_without_syringes_is_rejected() {
    let mut draft = apply(base_draft(), DraftAction::SetEquipment(EquipmentKind::Repipetter));
    draft.equipment = Equipment::Repipetter {
        syringes: Vec::new(),
    };

    let result = render::render(&draft, &Config::default(), &Assets::none());
    assert!(matches!(result, Err(RenderError::NoSyringes)));
}

#[test]
fn test_discovered_header_is_used() {
    let tmp = tempfile::TempDir::new().unwrap();
    write_image(&tmp.path().join("cabecalho.jpg"), 1030, 200);

    let assets = Assets::discover(&[tmp.path().to_path_buf()]);
    assert!(assets.get(AssetKind::Header).is_some());
    assert!(assets.get(AssetKind::Signature).is_none());

    let config = Config::default();
    let draft = base_draft();
    let document = compose(&draft, &config.laboratory, &config.standards_used, &assets).unwrap();
    assert!(document.uses(AssetKind::Header));
    assert!(!document.uses(AssetKind::Signature));

    let rendered = render::render(&draft, &config, &assets).unwrap();
    assert!(has_stream_with(&rendered.bytes, b"BitsPerComponent"));
}

#[test]
fn test_render_command_writes_pdf() {
    let tmp = setup_test_project();
    let id = create_manual_draft(&tmp);
    run_ok(&tmp, &["point", "nominal", &id, "1", "100"]);
    run_ok(&tmp, &["point", "readings", &id, "1", "99.4, 99.5"]);

    calcert()
        .current_dir(tmp.path())
        .args(["render", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("Rendered"));

    let pdf = tmp.path().join("certificates").join("serie. SN-42.pdf");
    let bytes = fs::read(&pdf).unwrap();
    assert!(bytes.starts_with(b"%PDF-"));
}

#[test]
fn test_render_command_output_and_name() {
    let tmp = setup_test_project();
    let id = create_manual_draft(&tmp);
    let out = tmp.path().join("out");

    let stdout = run_ok(
        &tmp,
        &[
            "render",
            &id,
            "--output",
            out.to_str().unwrap(),
            "--name",
            "{{ number }}.pdf",
            "--format",
            "id",
        ],
    );
    assert!(stdout.trim().ends_with("123.45.pdf"));
    assert!(out.join("123.45.pdf").exists());
}

#[test]
fn test_render_is_reproducible_through_cli() {
    let tmp = setup_test_project();
    let id = create_manual_draft(&tmp);

    let first = run_ok(&tmp, &["render", &id, "--format", "json"]);
    let second = run_ok(&tmp, &["render", &id, "--format", "json"]);
    let a: serde_json::Value = serde_json::from_str(&first).unwrap();
    let b: serde_json::Value = serde_json::from_str(&second).unwrap();
    assert_eq!(a["fingerprint"], b["fingerprint"]);
    assert_eq!(a["pages"], 1);
}
