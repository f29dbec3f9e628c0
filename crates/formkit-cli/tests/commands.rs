//! Command tests
//!
//! Runs every command against files in a temporary directory, the way the
//! binary would.

use formkit_cli::commands::{self, SubmitOptions, BLOB_DIR, DOCUMENT_DIR};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const FORM: &str = r#"
fields:
  - name: title
    label: Title
    kind: single-line
    required: true
    min_length: 3
    max_length: 20
  - name: topic
    label: Topic
    kind: select
    placeholder: Choose a topic
    options:
      - { value: tech, label: Technology }
      - { value: health, label: Health }
  - name: photos
    label: Photos
    kind: image-set
    accepted_mime_types: [image/jpeg, image/png]
    max_count: 3
    max_size_mb: 2
persistence_path:
  collection: submissions
  document_id: contact
blob_storage_path: uploads
"#;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("form.yaml"), FORM).unwrap();
        std::fs::write(dir.path().join("cat.jpg"), [0xFF, 0xD8, 0xFF, 0xE0]).unwrap();
        Self { dir }
    }

    fn config(&self) -> PathBuf {
        self.dir.path().join("form.yaml")
    }

    fn input(&self, name: &str, body: &Value) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, serde_json::to_vec(body).unwrap()).unwrap();
        path
    }

    fn data(&self) -> PathBuf {
        self.dir.path().join("data")
    }
}

fn read_json(path: &Path) -> Value {
    serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
}

#[test]
fn check_summarizes_fields() {
    let ws = Workspace::new();
    let report = commands::check(&ws.config()).unwrap();

    assert!(report.ok);
    assert_eq!(report.body["fields"][2], json!({"name": "photos", "kind": "image-set", "required": false}));
    assert_eq!(report.body["persistence_path"], "submissions/contact");
    assert_eq!(report.body["timestamp_field"], "createdAt");
}

#[test]
fn check_rejects_image_fields_without_blob_path() {
    let ws = Workspace::new();
    let path = ws.dir.path().join("broken.yaml");
    std::fs::write(
        &path,
        "fields:\n  - { name: photos, label: Photos, kind: image-set }\n",
    )
    .unwrap();

    let err = commands::check(&path).unwrap_err();
    assert!(format!("{err:#}").contains("photos"));
}

#[test]
fn validate_reports_field_errors() {
    let ws = Workspace::new();
    let input = ws.input("bad.json", &json!({"title": "Hi", "topic": "sports"}));

    let report = commands::validate(&ws.config(), &input).unwrap();
    assert!(!report.ok);
    assert_eq!(report.body["errors"]["title"][0]["kind"], "too_short");
    assert_eq!(report.body["errors"]["topic"][0]["message"], "Topic must be one of: tech, health");
}

#[test]
fn validate_accepts_good_input() {
    let ws = Workspace::new();
    let input = ws.input("good.json", &json!({"title": "Hello", "topic": "tech", "photos": ["cat.jpg"]}));

    let report = commands::validate(&ws.config(), &input).unwrap();
    assert!(report.ok, "{}", report.body);
}

#[test]
fn render_lists_controls() {
    let ws = Workspace::new();
    let report = commands::render(&ws.config()).unwrap();

    let controls = report.body["controls"].as_array().unwrap();
    assert_eq!(controls.len(), 3);
    assert_eq!(controls[1]["control"]["options"][0], json!({"value": "", "label": "Choose a topic"}));
    assert_eq!(controls[2]["control"]["accept"], "image/jpeg,image/png");
    assert_eq!(report.body["submit"], json!({"disabled": false, "label": "Submit"}));
}

#[tokio::test]
async fn submit_writes_blobs_and_document() {
    let ws = Workspace::new();
    let input = ws.input(
        "submit.json",
        &json!({"title": "Hello World", "topic": "", "photos": ["cat.jpg"]}),
    );

    let options = SubmitOptions {
        user: Some("ada".into()),
        anonymous: false,
    };
    let report = commands::submit(&ws.config(), &input, &ws.data(), options).await.unwrap();
    assert!(report.ok, "{}", report.body);

    let upload_path = report.body["receipt"]["uploads"][0]["path"].as_str().unwrap().to_owned();
    assert!(upload_path.starts_with("uploads/cat.jpg-"));
    assert!(ws.data().join(BLOB_DIR).join(&upload_path).exists());

    let stored = read_json(&ws.data().join(DOCUMENT_DIR).join("submissions/contact.json"));
    assert_eq!(stored["title"], "Hello World");
    assert!(stored.get("topic").is_none());
    assert!(stored["photos"][0].as_str().unwrap().starts_with("file://"));
    assert!(stored["createdAt"].is_string());
}

#[tokio::test]
async fn submit_without_user_fails() {
    let ws = Workspace::new();
    let input = ws.input("submit.json", &json!({"title": "Hello"}));

    let err = commands::submit(&ws.config(), &input, &ws.data(), SubmitOptions::default())
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("no authenticated user"));
    assert!(!ws.data().join(DOCUMENT_DIR).exists());
}

#[tokio::test]
async fn anonymous_submit_is_allowed_when_asked() {
    let ws = Workspace::new();
    let input = ws.input("submit.json", &json!({"title": "Hello"}));
    let options = SubmitOptions {
        user: None,
        anonymous: true,
    };

    let report = commands::submit(&ws.config(), &input, &ws.data(), options).await.unwrap();
    assert!(report.ok);
    assert_eq!(report.body["receipt"]["payload"], json!({"title": "Hello"}));
}
