use std::io::{Cursor, Read};

use sheetsmith::{
    AggregateKind, ChartKind, ChartSpec, ColumnFormat, FormatKind, KpiSpec, PivotSpec, SheetSpec,
    Table, Theme, Value, WorkbookSpec, inspect_workbook, parse_document, render, render_to_buffer,
};
use zip::ZipArchive;

fn part(bytes: &[u8], name: &str) -> Option<String> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut file = archive.by_name(name).ok()?;
    let mut xml = String::new();
    file.read_to_string(&mut xml).unwrap();
    Some(xml)
}

fn receivables() -> Table {
    Table::from_columns(vec![
        ("invoice", vec![Value::text("T-1"), Value::text("T-2"), Value::text("T-3")]),
        ("customer", vec![Value::text("Acme"), Value::text("Bolt"), Value::text("Acme")]),
        (
            "face_value",
            vec![Value::Currency(120.0), Value::Currency(990.0), Value::Currency(250.0)],
        ),
        (
            "due_date",
            vec![Value::date(2024, 1, 10), Value::date(2024, 2, 10), Value::date(2024, 3, 10)],
        ),
        ("paid", vec![Value::Bool(true), Value::Bool(false), Value::Bool(false)]),
    ])
    .unwrap()
}

#[test]
fn data_sheet_carries_filter_freeze_and_conditional_rules() {
    let spec = WorkbookSpec::new().sheet(
        SheetSpec::new("Titles", receivables())
            .column(ColumnFormat::new("face_value", FormatKind::Currency).with_width(14.0))
            .freeze("A2"),
    );
    let bytes = render_to_buffer(&spec, Theme::Blue).unwrap();
    let xml = part(&bytes, "xl/worksheets/sheet1.xml").unwrap();

    assert!(xml.contains(r#"<autoFilter ref="A1:E4"/>"#));
    assert!(xml.contains("<pane"));
    assert!(xml.contains("MOD(ROW(),2)=0"));
    assert!(xml.contains("<dataBar"));
    assert!(xml.contains("NOT(ISBLANK($D2))"));
    assert!(xml.contains("$E2=FALSE"));

    let styles = part(&bytes, "xl/styles.xml").unwrap();
    assert!(styles.contains("E8F1FF"));
    assert!(styles.contains("yyyy-mm-dd"));
}

#[test]
fn empty_sheet_has_no_conditional_rules() {
    let table = Table::from_columns(vec![("revenue", Vec::new()), ("due_date", Vec::new())]).unwrap();
    let spec = WorkbookSpec::new().sheet(SheetSpec::new("Empty", table));
    let bytes = render_to_buffer(&spec, Theme::Gray).unwrap();
    let xml = part(&bytes, "xl/worksheets/sheet1.xml").unwrap();

    assert!(xml.contains("revenue") || part(&bytes, "xl/sharedStrings.xml").unwrap().contains("revenue"));
    assert!(!xml.contains("<autoFilter"));
    assert!(!xml.contains("<conditionalFormatting"));
}

#[test]
fn pivot_chart_is_embedded_only_with_a_source() {
    let spec = WorkbookSpec::new()
        .sheet(SheetSpec::new("Titles", receivables()))
        .kpi(KpiSpec::formula("Open titles", "=COUNTIF(Titles!E:E,FALSE)"))
        .pivot(
            PivotSpec::new("By customer", "Titles")
                .index(["customer"])
                .aggregate("face_value", AggregateKind::Sum)
                .chart(ChartSpec::new(ChartKind::Column).title("Face value").y_title("R$")),
        )
        .pivot(
            PivotSpec::new("Orphan", "Missing")
                .index(["customer"])
                .aggregate("face_value", AggregateKind::Sum)
                .chart(ChartSpec::new(ChartKind::Pie)),
        );
    let bytes = render_to_buffer(&spec, Theme::Orange).unwrap();

    let chart = part(&bytes, "xl/charts/chart1.xml").unwrap();
    assert!(chart.contains("'By customer'!$B$2:$B$3"));
    assert!(chart.contains("Face value"));
    assert!(part(&bytes, "xl/charts/chart2.xml").is_none());

    let dashboard = part(&bytes, "xl/worksheets/sheet2.xml").unwrap();
    assert!(dashboard.contains("COUNTIF(Titles!E:E,FALSE)"));
}

#[test]
fn document_round_trip_through_the_filesystem() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("stock.tsv"),
        "sku\tqty\texpiry_date\nA-1\t4\t2030-01-01\nB-2\t7\t2030-02-01\n",
    )
    .unwrap();
    let doc = dir.path().join("book.json");
    let text = r#"{
        "sheets": [{"name": "Stock", "source": "stock.tsv"}],
        "kpis": [{"label": "Units", "value": 11, "format": "int"}],
        "pivots": [{"name": "By sku", "data_sheet": "Stock", "index": ["sku"],
                    "values": {"qty": "sum"}}]
    }"#;
    std::fs::write(&doc, text).unwrap();

    let spec = parse_document(text, &doc).unwrap();
    let output = dir.path().join("stock.xlsx");
    render(&spec, "verde".parse().unwrap(), &output).unwrap();

    let summaries = inspect_workbook(&output).unwrap();
    let names: Vec<_> = summaries.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Stock", "Dashboard", "By sku"]);
    assert_eq!(summaries[0].rows, 3);
    assert_eq!(summaries[2].headers, vec!["sku", "qty"]);

    let bytes = std::fs::read(&output).unwrap();
    let stock = part(&bytes, "xl/worksheets/sheet1.xml").unwrap();
    assert!(stock.contains("$C2&lt;=TODAY()+7"));
    assert!(stock.contains("<dataBar"));
}

#[test]
fn late_delivery_rule_spans_the_whole_row() {
    let table = Table::from_columns(vec![
        ("order", vec![Value::text("P-1"), Value::text("P-2")]),
        ("promised_delivery_date", vec![Value::date(2024, 5, 1), Value::date(2024, 5, 3)]),
        ("actual_delivery_date", vec![Value::date(2024, 5, 4), Value::Null]),
    ])
    .unwrap();
    let spec = WorkbookSpec::new().sheet(SheetSpec::new("Deliveries", table));
    let bytes = render_to_buffer(&spec, Theme::Blue).unwrap();
    let xml = part(&bytes, "xl/worksheets/sheet1.xml").unwrap();

    let formula = "<formula>AND(NOT(ISBLANK($C2)),$C2&gt;$B2)</formula>";
    let at = xml.find(formula).expect("late-delivery rule is written");
    let block = &xml[xml[..at].rfind("<conditionalFormatting").unwrap()..at];
    assert!(block.contains(r#"sqref="A2:C3""#), "{block}");
}

#[test]
fn blank_kpi_keeps_its_styling() {
    let spec = WorkbookSpec::new()
        .kpi(KpiSpec::value("Pending", Value::Null, FormatKind::Currency))
        .kpi(KpiSpec::value("Total", 10i64, FormatKind::Integer));
    let bytes = render_to_buffer(&spec, Theme::Green).unwrap();
    let xml = part(&bytes, "xl/worksheets/sheet1.xml").unwrap();
    assert!(xml.contains(r#"<c r="B3" s=""#), "{xml}");
    assert!(xml.contains(r#"<c r="B4" s=""#), "{xml}");
}
