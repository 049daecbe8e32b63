mod common;

use common::FakeEngine;
use invoice_tables::billing::find_billing_period;
use invoice_tables::engine::PageText;
use std::path::Path;

fn input() -> &'static Path {
    Path::new("rechnung.pdf")
}

#[test]
fn finds_period_on_first_page() {
    let engine = FakeEngine::with_text(&["Stadtwerke\nAbrechnung von 01.01.2024 bis 31.01.2024\nSumme"]);
    let period = find_billing_period(&engine, input(), 3).unwrap().unwrap();
    assert_eq!(period.start_iso(), "2024-01-01");
    assert_eq!(period.end_iso(), "2024-01-31");
    assert_eq!(period.page, 1);
}

#[test]
fn first_matching_page_wins() {
    let engine = FakeEngine::with_text(&[
        "Deckblatt",
        "abrechnung VON 01.02.2024\nbis 29.02.2024",
        "Abrechnung von 01.03.2024 bis 31.03.2024",
    ]);
    let period = find_billing_period(&engine, input(), 3).unwrap().unwrap();
    assert_eq!(period.start_iso(), "2024-02-01");
    assert_eq!(period.end_iso(), "2024-02-29");
    assert_eq!(period.page, 2);
}

#[test]
fn pages_beyond_the_ceiling_are_not_scanned() {
    let engine = FakeEngine::with_text(&[
        "a",
        "b",
        "c",
        "Abrechnung von 01.01.2024 bis 31.01.2024",
    ]);
    assert!(find_billing_period(&engine, input(), 3).unwrap().is_none());
    assert_eq!(*engine.text_calls.borrow(), vec![3]);
}

#[test]
fn failing_page_is_skipped() {
    let mut engine = FakeEngine::with_text(&["", "Abrechnung von 15.05.2023 bis 14.06.2023"]);
    engine.pages[0] = PageText {
        page: 1,
        text: None,
        error: Some("bad content stream".into()),
    };
    let period = find_billing_period(&engine, input(), 3).unwrap().unwrap();
    assert_eq!(period.start_iso(), "2023-05-15");
    assert_eq!(period.page, 2);
}

#[test]
fn unreadable_document_means_no_period() {
    let engine = FakeEngine {
        open_error: Some("PdfReadError: EOF marker not found".into()),
        ..Default::default()
    };
    assert!(find_billing_period(&engine, input(), 3).unwrap().is_none());
}

#[test]
fn empty_document_is_not_scanned() {
    let engine = FakeEngine::default();
    assert!(find_billing_period(&engine, input(), 3).unwrap().is_none());
    assert!(find_billing_period(&engine, input(), 0).unwrap().is_none());
}

#[test]
fn impossible_calendar_date_is_reported() {
    let engine = FakeEngine::with_text(&["Abrechnung von 31.02.2024 bis 31.03.2024"]);
    let err = find_billing_period(&engine, input(), 3).unwrap_err();
    assert!(format!("{err:#}").contains("31.02.2024"));
}

#[test]
fn fullwidth_digits_are_normalized() {
    let engine = FakeEngine::with_text(&["Abrechnung von ０１.０１.２０２４ bis ３１.０１.２０２４"]);
    let period = find_billing_period(&engine, input(), 3).unwrap().unwrap();
    assert_eq!(period.end_iso(), "2024-01-31");
}

#[test]
fn form_feed_and_vertical_tab_separate_words() {
    let engine = FakeEngine::with_text(&["Abrechnung von\x0c01.01.2024 bis 31.01.2024"]);
    let period = find_billing_period(&engine, input(), 3).unwrap().unwrap();
    assert_eq!(period.start_iso(), "2024-01-01");

    let engine = FakeEngine::with_text(&["Abrechnung\x0bvon 01.01.2024\u{85}bis 31.01.2024"]);
    let period = find_billing_period(&engine, input(), 3).unwrap().unwrap();
    assert_eq!(period.end_iso(), "2024-01-31");
}

#[test]
fn page_without_text_layer_is_skipped() {
    let mut engine = FakeEngine::with_text(&["", "Abrechnung von 01.04.2024 bis 30.04.2024"]);
    engine.pages[0].text = None;
    let period = find_billing_period(&engine, input(), 3).unwrap().unwrap();
    assert_eq!(period.page, 2);

    let mut engine = FakeEngine::with_text(&["ignored"]);
    engine.pages[0].text = None;
    assert!(find_billing_period(&engine, input(), 3).unwrap().is_none());
}
