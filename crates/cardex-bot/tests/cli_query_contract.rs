use assert_cmd::Command;

fn write_catalog(dir: &std::path::Path) {
    let cards: Vec<serde_json::Value> = [
        ("c1", "Lightning Bolt", "M11", "2010-07-16"),
        ("c2", "Bolt of Keranos", "THS", "2013-09-27"),
        ("c3", "Shock", "M21", "2020-07-03"),
        ("c4", "Giant Growth", "M14", "2013-07-19"),
    ]
    .iter()
    .map(|(id, name, set, date)| {
        serde_json::json!({
            "id": id, "name": name,
            "image_url": format!("https://i/{id}.png"),
            "set_code": set, "release_date": date
        })
    })
    .collect();
    let catalog = serde_json::json!({
        "schema_version": 1,
        "version": "1.0.0",
        "cards": cards,
    });
    std::fs::write(
        dir.join("cards_1.0.0.json"),
        serde_json::to_vec(&catalog).unwrap(),
    )
    .unwrap();
}

fn query(dir: &std::path::Path, args: &[&str]) -> serde_json::Value {
    let out = Command::new(assert_cmd::cargo::cargo_bin!("cardex-bot"))
        .args(["query", "--data-dir"])
        .arg(dir)
        .args(args)
        .output()
        .expect("run query");
    assert!(
        out.status.success(),
        "query failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    serde_json::from_slice(&out.stdout).expect("parse response json")
}

#[test]
fn bolt_query_ranks_containing_cards_and_omits_shock() {
    let tmp = tempfile::tempdir().unwrap();
    write_catalog(tmp.path());

    let v = query(tmp.path(), &["--query", "bolt"]);
    let names: Vec<&str> = v["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["display_name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Bolt of Keranos", "Lightning Bolt"]);
    assert_eq!(v["next_offset"].as_str(), Some(""));

    // Every result carries the image contract fields.
    for r in v["results"].as_array().unwrap() {
        assert!(r["result_id"].as_str().is_some());
        assert!(r["image_url"].as_str().unwrap().starts_with("https://"));
    }
}

#[test]
fn malformed_offset_yields_empty_page() {
    let tmp = tempfile::tempdir().unwrap();
    write_catalog(tmp.path());

    let v = query(tmp.path(), &["--query", "bolt", "--offset", "not-a-number"]);
    assert_eq!(v["results"].as_array().unwrap().len(), 0);
    assert_eq!(v["next_offset"].as_str(), Some(""));
}

#[test]
fn empty_query_samples_from_the_catalog() {
    let tmp = tempfile::tempdir().unwrap();
    write_catalog(tmp.path());

    let v = query(tmp.path(), &[]);
    // Catalog smaller than a page: the sample is the whole catalog.
    assert_eq!(v["results"].as_array().unwrap().len(), 4);
    assert_eq!(v["next_offset"].as_str(), Some(""));
}

#[test]
fn skim_backend_is_accepted_and_unknown_backends_are_not() {
    let tmp = tempfile::tempdir().unwrap();
    write_catalog(tmp.path());

    let v = query(tmp.path(), &["--query", "bolt", "--fuzzy", "skim"]);
    assert!(!v["results"].as_array().unwrap().is_empty());

    let out = Command::new(assert_cmd::cargo::cargo_bin!("cardex-bot"))
        .args(["query", "--data-dir"])
        .arg(tmp.path())
        .args(["--query", "bolt", "--fuzzy", "wratio"])
        .output()
        .expect("run query");
    assert!(!out.status.success());
}
