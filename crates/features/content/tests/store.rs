use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::io::AsyncReadExt;
use vanish_content::*;
use vanish_domain::{ApiContext, EntryKind, Expire};
use vanish_index::Index;
use vanish_mailer::MemoryMailer;
use vanish_storage::Storage;

const BASE: &str = "https://share.example.org";

struct Fixture {
    _tmp: TempDir,
    store: ContentStore,
    mailer: Arc<MemoryMailer>,
}

async fn fixture() -> Fixture {
    let tmp = TempDir::new().unwrap();
    let index = Index::builder().path(tmp.path().join("index.redb")).open().await.unwrap();
    let storage = Storage::builder().root(tmp.path().join("uploads")).connect().await.unwrap();
    let mailer = Arc::new(MemoryMailer::new());
    let store = ContentStore::builder()
        .index(index)
        .storage(storage)
        .mailer(mailer.clone())
        .base_url(format!("{BASE}/"))
        .build()
        .unwrap();
    Fixture { _tmp: tmp, store, mailer }
}

fn ctx(name: &str) -> ApiContext {
    ApiContext::new(name).unwrap()
}

fn upload(files: &[(&str, &str)], expire: &str) -> NewUpload {
    NewUpload {
        files: files.iter().map(|(name, body)| UploadFile::new(*name, body.to_string())).collect(),
        expire: Some(expire.to_owned()),
        ..NewUpload::default()
    }
}

async fn read_all(delivery: &mut Delivery) -> Vec<u8> {
    let mut buf = Vec::new();
    delivery.file.read_to_end(&mut buf).await.unwrap();
    buf
}

fn dir_exists(store: &ContentStore, id: &str) -> bool {
    store.storage().entry(id).unwrap().path().exists()
}

#[tokio::test]
async fn asap_upload_is_delivered_once() {
    let fx = fixture().await;
    let team = ctx("team-a");

    let entry = fx.store.create_upload(&team, upload(&[("notes.txt", "hello")], "asap")).await.unwrap();
    assert_eq!(entry.expire, Expire::Asap);
    fx.store.drain().await;

    let mut delivery = fx.store.fetch(&team, &entry.id).await.unwrap();
    assert_eq!(delivery.len, 5);
    assert_eq!(read_all(&mut delivery).await, b"hello");

    fx.store.drain().await;
    let err = fx.store.fetch(&team, &entry.id).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(!dir_exists(&fx.store, &entry.id));
    assert!(fx.store.index().all().await.unwrap().is_empty());
}

#[tokio::test]
async fn peek_leaves_asap_upload_in_place() {
    let fx = fixture().await;
    let team = ctx("team-a");

    let entry = fx.store.create_upload(&team, upload(&[("notes.txt", "hello")], "asap")).await.unwrap();
    fx.store.drain().await;

    for _ in 0..2 {
        let mut delivery = fx.store.peek(&team, &entry.id).await.unwrap();
        assert_eq!(read_all(&mut delivery).await, b"hello");
        fx.store.drain().await;
    }
    assert!(dir_exists(&fx.store, &entry.id));
    assert!(fx.store.peek(&ctx("team-b"), &entry.id).await.unwrap_err().is_not_found());

    let mut delivery = fx.store.fetch(&team, &entry.id).await.unwrap();
    assert_eq!(read_all(&mut delivery).await, b"hello");
    fx.store.drain().await;
    assert!(fx.store.peek(&team, &entry.id).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn blank_expire_means_asap() {
    let fx = fixture().await;
    let entry = fx.store.create_upload(&ctx("t"), upload(&[("a", "x")], "  ")).await.unwrap();
    assert!(entry.expire.is_asap());
}

#[tokio::test]
async fn ttl_upload_is_readable_until_it_expires() {
    let fx = fixture().await;
    let team = ctx("team-a");

    let entry = fx.store.create_upload(&team, upload(&[("a.bin", "abc")], "1s")).await.unwrap();
    fx.store.drain().await;

    for _ in 0..3 {
        let mut delivery = fx.store.fetch(&team, &entry.id).await.unwrap();
        assert_eq!(read_all(&mut delivery).await, b"abc");
    }
    fx.store.drain().await;
    assert!(dir_exists(&fx.store, &entry.id));

    tokio::time::sleep(Duration::from_millis(1200)).await;

    assert!(fx.store.fetch(&team, &entry.id).await.unwrap_err().is_not_found());
    assert!(!dir_exists(&fx.store, &entry.id));
    assert!(fx.store.describe(&team, &entry.id, EntryKind::Upload).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn other_contexts_cannot_see_or_touch_entries() {
    let fx = fixture().await;
    let (a, b) = (ctx("team-a"), ctx("team-b"));

    let entry = fx.store.create_upload(&a, upload(&[("a.txt", "secret")], "1h")).await.unwrap();
    fx.store.drain().await;

    assert!(fx.store.fetch(&b, &entry.id).await.unwrap_err().is_not_found());
    assert!(fx.store.describe(&b, &entry.id, EntryKind::Upload).await.unwrap_err().is_not_found());
    assert!(fx.store.delete(&b, &entry.id, EntryKind::Upload).await.unwrap_err().is_not_found());
    let modify = ModifyUpload { description: Some("mine".into()), ..ModifyUpload::default() };
    assert!(fx.store.modify(&b, &entry.id, modify).await.unwrap_err().is_not_found());
    assert!(fx.store.list(&b, "team-b", None, EntryKind::Upload).await.unwrap().is_empty());

    let same = fx.store.describe(&a, &entry.id, EntryKind::Upload).await.unwrap();
    assert_eq!(same.description(), None);
    assert!(dir_exists(&fx.store, &entry.id));
}

#[tokio::test]
async fn unknown_and_foreign_ids_answer_alike() {
    let fx = fixture().await;
    let a = ctx("team-a");
    let entry = fx.store.create_upload(&a, upload(&[("a", "x")], "1h")).await.unwrap();
    fx.store.drain().await;

    let foreign = fx.store.fetch(&ctx("team-b"), &entry.id).await.unwrap_err();
    let unknown = fx.store.fetch(&a, "00000000-0000-4000-8000-000000000000").await.unwrap_err();
    assert_eq!(foreign.to_string(), unknown.to_string());
    assert_eq!(unknown.to_string(), "No upload with that id could be found!");
}

#[tokio::test]
async fn single_file_is_its_own_artifact() {
    let fx = fixture().await;
    let entry = fx.store.create_upload(&ctx("t"), upload(&[("../My Report.pdf", "%PDF")], "1h")).await.unwrap();

    let body = entry.as_upload().unwrap();
    assert_eq!(body.members.len(), 1);
    assert_eq!(body.file, body.members[0]);
    assert!(body.file.ends_with("-MyReport.pdf"));
    assert_eq!(entry.url.as_deref(), Some(format!("{BASE}/download/{}/{}", entry.id, body.file).as_str()));
}

#[tokio::test]
async fn several_files_are_zipped() {
    let fx = fixture().await;
    let team = ctx("t");
    let files = [("a.txt", "alpha"), ("a.txt", "again"), ("b.txt", "beta")];
    let entry = fx.store.create_upload(&team, upload(&files, "1h")).await.unwrap();
    fx.store.drain().await;

    let body = entry.as_upload().unwrap().clone();
    assert_eq!(body.members.len(), 3);
    assert!(body.file.ends_with("data.zip"));
    assert!(body.members[1].ends_with("a-1.txt"));

    let delivery = fx.store.fetch(&team, &entry.id).await.unwrap();
    assert_eq!(delivery.file_name(), body.file);

    let mut archive = zip::ZipArchive::new(std::fs::File::open(&delivery.path).unwrap()).unwrap();
    assert_eq!(archive.len(), 3);
    for ((member, (_, content)), i) in body.members.iter().zip(files).zip(0..) {
        let mut file = archive.by_index(i).unwrap();
        assert_eq!(file.name(), member.as_str());
        let mut text = String::new();
        file.read_to_string(&mut text).unwrap();
        assert_eq!(text, content);
    }

    let stored = fx.store.storage().entry(&entry.id).unwrap().members().await.unwrap();
    assert_eq!(stored.len(), 4);
}

#[tokio::test]
async fn empty_upload_is_rejected_without_leftovers() {
    let fx = fixture().await;
    let err = fx.store.create_upload(&ctx("t"), NewUpload::default()).await.unwrap_err();
    assert!(err.is_validation());
    assert!(fx.store.storage().entry_dirs().await.unwrap().is_empty());
}

#[tokio::test]
async fn bad_input_is_a_validation_error() {
    let fx = fixture().await;
    let team = ctx("t");

    let err = fx.store.create_upload(&team, upload(&[("a", "x")], "5x")).await.unwrap_err();
    assert!(err.is_validation());
    let err = fx.store.create_upload(&team, upload(&[("a", "x")], "0s")).await.unwrap_err();
    assert!(err.is_validation());

    let mut tagged = upload(&[("a", "x")], "1h");
    tagged.description = Some("<script>".into());
    assert!(fx.store.create_upload(&team, tagged).await.unwrap_err().is_validation());

    let form = NewForm { notify: Some("not an address".into()), ..NewForm::default() };
    assert!(fx.store.create_form(&team, form).await.unwrap_err().is_validation());

    assert!(fx.store.fetch(&team, "../etc").await.unwrap_err().is_validation());
    assert!(fx.store.describe(&team, " ", EntryKind::Form).await.unwrap_err().is_validation());
    assert!(fx.store.list(&team, "a b", None, EntryKind::Upload).await.unwrap_err().is_validation());

    fx.store.drain().await;
    assert!(fx.store.index().all().await.unwrap().is_empty());
}

#[tokio::test]
async fn asap_form_is_consumed_and_notifies() {
    let fx = fixture().await;
    let team = ctx("team-a");

    let form = NewForm {
        notify: Some("owner@example.org".into()),
        description: Some("Send me the logs".into()),
        ..NewForm::default()
    };
    let form = fx.store.create_form(&team, form).await.unwrap();
    assert_eq!(form.url.as_deref(), Some(format!("{BASE}/form/{}", form.id).as_str()));
    fx.store.drain().await;
    assert!(!dir_exists(&fx.store, &form.id));

    let mut answer = upload(&[("logs.txt", "...")], "1d");
    answer.form = Some(form.id.clone());
    let entry = fx.store.create_upload(&team, answer).await.unwrap();
    fx.store.drain().await;

    assert!(fx.store.describe(&team, &form.id, EntryKind::Form).await.unwrap_err().is_not_found());

    let sent = fx.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "owner@example.org");
    assert_eq!(sent[0].subject, format!("Upload form {} has been used", form.id));
    assert_eq!(sent[0].body, format!("Upload is available under: {}", entry.url.unwrap()));
}

#[tokio::test]
async fn ttl_form_survives_use() {
    let fx = fixture().await;
    let team = ctx("team-a");

    let form = NewForm { expire: Some("1d".into()), ..NewForm::default() };
    let form = fx.store.create_form(&team, form).await.unwrap();
    fx.store.drain().await;

    for _ in 0..2 {
        let mut answer = upload(&[("a", "x")], "1h");
        answer.form = Some(form.id.clone());
        fx.store.create_upload(&team, answer).await.unwrap();
        fx.store.drain().await;
    }

    let same = fx.store.describe(&team, &form.id, EntryKind::Form).await.unwrap();
    assert_eq!(same.expire.to_string(), "1d");
    assert!(fx.mailer.sent().is_empty());
}

#[tokio::test]
async fn upload_for_unknown_form_still_succeeds() {
    let fx = fixture().await;
    let mut answer = upload(&[("a", "x")], "1h");
    answer.form = Some("00000000-0000-4000-8000-000000000000".into());
    let entry = fx.store.create_upload(&ctx("t"), answer).await.unwrap();
    fx.store.drain().await;

    assert!(fx.store.describe(&ctx("t"), &entry.id, EntryKind::Upload).await.is_ok());
    assert!(fx.mailer.sent().is_empty());
}

#[tokio::test]
async fn delete_twice_is_not_found() {
    let fx = fixture().await;
    let team = ctx("t");
    let entry = fx.store.create_upload(&team, upload(&[("a", "x")], "1h")).await.unwrap();
    fx.store.drain().await;

    assert!(fx.store.delete(&team, &entry.id, EntryKind::Form).await.unwrap_err().is_not_found());
    fx.store.delete(&team, &entry.id, EntryKind::Upload).await.unwrap();
    assert!(!dir_exists(&fx.store, &entry.id));

    let err = fx.store.delete(&team, &entry.id, EntryKind::Upload).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn forms_are_deleted_by_kind() {
    let fx = fixture().await;
    let team = ctx("t");
    let form = fx.store.create_form(&team, NewForm::default()).await.unwrap();
    fx.store.drain().await;

    assert!(fx.store.fetch(&team, &form.id).await.unwrap_err().is_not_found());
    fx.store.delete(&team, &form.id, EntryKind::Form).await.unwrap();
    assert!(fx.store.describe(&team, &form.id, EntryKind::Form).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn modify_overwrites_only_given_fields() {
    let fx = fixture().await;
    let team = ctx("t");
    let mut req = upload(&[("a", "x")], "1h");
    req.description = Some("first".into());
    let entry = fx.store.create_upload(&team, req).await.unwrap();
    fx.store.drain().await;

    let change = ModifyUpload { expire: Some("2d".into()), description: Some("  ".into()) };
    let changed = fx.store.modify(&team, &entry.id, change).await.unwrap();
    assert_eq!(changed.expire.to_string(), "2d");
    assert_eq!(changed.description(), Some("first"));

    let change = ModifyUpload { description: Some("second".into()), ..ModifyUpload::default() };
    fx.store.modify(&team, &entry.id, change).await.unwrap();

    let stored = fx.store.describe(&team, &entry.id, EntryKind::Upload).await.unwrap();
    assert_eq!(stored.expire.to_string(), "2d");
    assert_eq!(stored.description(), Some("second"));
    assert_eq!(stored.created, entry.created);
    assert!(stored.url.is_some());

    let bad = ModifyUpload { expire: Some("forever".into()), ..ModifyUpload::default() };
    assert!(fx.store.modify(&team, &entry.id, bad).await.unwrap_err().is_validation());
}

#[tokio::test]
async fn list_filters_by_context_and_query() {
    let fx = fixture().await;
    let (a, b) = (ctx("team-a"), ctx("team-b"));

    for (team, name, description) in [(&a, "report.pdf", "quarterly"), (&a, "cat.png", "pets"), (&b, "x.txt", "misc")]
    {
        let mut req = upload(&[(name, "x")], "1h");
        req.description = Some(description.into());
        fx.store.create_upload(team, req).await.unwrap();
    }
    fx.store.create_form(&a, NewForm::default()).await.unwrap();
    fx.store.drain().await;

    assert_eq!(fx.store.list(&a, "team-a", None, EntryKind::Upload).await.unwrap().len(), 2);
    assert_eq!(fx.store.list(&a, "team", None, EntryKind::Upload).await.unwrap().len(), 3);
    assert_eq!(fx.store.list(&a, "", None, EntryKind::Upload).await.unwrap().len(), 3);
    assert_eq!(fx.store.list(&a, "team-a", None, EntryKind::Form).await.unwrap().len(), 1);

    let hits = fx.store.list(&a, "team-a", Some("quarter"), EntryKind::Upload).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert!(hits[0].file().unwrap().ends_with("report.pdf"));
    assert!(hits[0].url.is_some());

    let hits = fx.store.list(&a, "team-a", Some("cat.png"), EntryKind::Upload).await.unwrap();
    assert_eq!(hits.len(), 1);
}

#[tokio::test]
async fn list_leaves_out_expired_entries() {
    let fx = fixture().await;
    let team = ctx("t");
    let short = fx.store.create_upload(&team, upload(&[("a", "x")], "1s")).await.unwrap();
    fx.store.create_upload(&team, upload(&[("b", "y")], "1h")).await.unwrap();
    fx.store.drain().await;

    tokio::time::sleep(Duration::from_millis(1200)).await;

    let live = fx.store.list(&team, "t", None, EntryKind::Upload).await.unwrap();
    assert_eq!(live.len(), 1);
    assert_ne!(live[0].id, short.id);

    fx.store.drain().await;
    assert_eq!(fx.store.index().all().await.unwrap().len(), 1);
    assert!(!dir_exists(&fx.store, &short.id));
}

#[tokio::test]
async fn missing_artifact_drops_the_record() {
    let fx = fixture().await;
    let team = ctx("t");
    let entry = fx.store.create_upload(&team, upload(&[("a.txt", "x")], "1h")).await.unwrap();
    fx.store.drain().await;

    let dir = fx.store.storage().entry(&entry.id).unwrap();
    std::fs::remove_file(dir.member_path(entry.file().unwrap()).unwrap()).unwrap();

    assert!(fx.store.fetch(&team, &entry.id).await.unwrap_err().is_not_found());
    fx.store.drain().await;
    assert!(fx.store.index().all().await.unwrap().is_empty());
    assert!(!dir.path().exists());
}

#[tokio::test]
async fn builder_requires_index_and_storage() {
    let err = ContentStore::builder().build().unwrap_err();
    assert!(err.is_validation());

    let tmp = TempDir::new().unwrap();
    let index = Index::builder().path(tmp.path().join("i.redb")).open().await.unwrap();
    assert!(ContentStore::builder().index(index).build().unwrap_err().is_validation());
}
