//! End-to-end upload, hydration and removal scenarios

use std::sync::Arc;

use fu_attachments::{
    AttachmentError, AttachmentRef, FileSelection, FileUploader, HostEvent, LocalAttachmentStore,
    LocalByteSource, MemoryAttachmentStore, OutputNotifier, RecordingSink, SelectedFile,
    ToastVariant, ATTACHMENT_IDS_ATTRIBUTE,
};
use fu_core::{AttachmentId, UploaderConfig};

fn memory_uploader(
    config: UploaderConfig,
) -> (
    FileUploader<LocalByteSource, MemoryAttachmentStore>,
    Arc<MemoryAttachmentStore>,
    Arc<RecordingSink>,
) {
    let store = Arc::new(MemoryAttachmentStore::with_id_prefix("068xx"));
    let sink = Arc::new(RecordingSink::new());
    let uploader = FileUploader::new(
        config,
        Arc::new(LocalByteSource::new()),
        store.clone(),
        OutputNotifier::with_sink(sink.clone()),
    );
    (uploader, store, sink)
}

fn select(name: &str) -> FileSelection {
    FileSelection::single(SelectedFile::inline(name, format!("contents of {}", name)))
}

#[tokio::test]
async fn upload_report_notifies_once_with_full_list() {
    let (uploader, _store, sink) = memory_uploader(UploaderConfig::for_record("001xx"));

    uploader.upload(select("report.pdf")).await.unwrap();

    assert_eq!(
        uploader.attachments(),
        vec![AttachmentRef::new("068xx001", "report.pdf")]
    );
    let changes: Vec<HostEvent> = sink
        .events()
        .into_iter()
        .filter(|e| matches!(e, HostEvent::AttributeChanged { .. }))
        .collect();
    assert_eq!(
        changes,
        vec![HostEvent::AttributeChanged {
            name: ATTACHMENT_IDS_ATTRIBUTE.to_string(),
            value: vec![AttachmentId::from("068xx001")],
        }]
    );
}

#[tokio::test]
async fn every_change_carries_the_whole_list() {
    let (uploader, _store, sink) = memory_uploader(UploaderConfig::for_record("001xx"));

    uploader.upload(select("a.pdf")).await.unwrap();
    uploader.upload(select("b.pdf")).await.unwrap();
    uploader
        .remove_attachment(&AttachmentId::from("068xx001"))
        .await
        .unwrap();
    uploader.upload(select("c.pdf")).await.unwrap();

    let ids = |list: &[&str]| list.iter().map(|s| AttachmentId::from(*s)).collect::<Vec<_>>();
    assert_eq!(
        sink.changes(),
        vec![
            ids(&["068xx001"]),
            ids(&["068xx001", "068xx002"]),
            ids(&["068xx002"]),
            ids(&["068xx002", "068xx003"]),
        ]
    );
}

#[tokio::test]
async fn partial_hydration_leaves_list_empty() {
    let config = UploaderConfig::for_record("001xx").with_initial_attachment_ids(["a", "b"]);
    let (uploader, store, sink) = memory_uploader(config);
    store.seed("a", "a.pdf", "001xx").await;

    uploader.initialize().await.unwrap();

    assert!(uploader.attachments().is_empty());
    assert!(sink.events().is_empty());
}

#[tokio::test]
async fn failed_hydration_leaves_list_empty() {
    let config = UploaderConfig::for_record("001xx").with_initial_attachment_ids(["a"]);
    let (uploader, store, _sink) = memory_uploader(config);
    store.seed("a", "a.pdf", "001xx").await;
    store.fail_fetches(true);

    uploader.initialize().await.unwrap();
    assert!(uploader.attachments().is_empty());

    // Uploads still work after a failed hydration
    store.fail_fetches(false);
    uploader.upload(select("report.pdf")).await.unwrap();
    assert_eq!(uploader.attachments().len(), 1);
}

#[tokio::test]
async fn removing_absent_id_changes_nothing() {
    let (uploader, _store, sink) = memory_uploader(UploaderConfig::for_record("001xx"));
    uploader.upload(select("a.pdf")).await.unwrap();
    uploader.upload(select("b.pdf")).await.unwrap();
    let before = uploader.attachments();
    sink.clear();

    let removal = uploader.remove_attachment(&AttachmentId::from("missing")).await;

    assert!(removal.is_none());
    assert_eq!(uploader.attachments(), before);
    assert!(sink.changes().is_empty());
}

#[tokio::test]
async fn removing_twice_matches_removing_once() {
    let (uploader, _store, sink) = memory_uploader(UploaderConfig::for_record("001xx"));
    uploader.upload(select("a.pdf")).await.unwrap();
    uploader.upload(select("b.pdf")).await.unwrap();
    let id = AttachmentId::from("068xx001");

    uploader.remove_attachment(&id).await.unwrap();
    let once = uploader.attachments();
    let changes_once = sink.changes().len();

    assert!(uploader.remove_attachment(&id).await.is_none());
    assert_eq!(uploader.attachments(), once);
    assert_eq!(sink.changes().len(), changes_once);
}

#[tokio::test]
async fn failed_store_does_not_advance() {
    let config = UploaderConfig::for_record("001xx").with_advance_on_upload(true);
    let (uploader, store, sink) = memory_uploader(config);
    store.fail_creates(true);

    let result = uploader.upload(select("report.pdf")).await;

    assert!(matches!(result, Err(AttachmentError::StoreFailure(_))));
    assert_eq!(sink.advance_count(), 0);
    assert!(uploader.attachments().is_empty());
}

#[tokio::test]
async fn successful_upload_advances_once() {
    let config = UploaderConfig::for_record("001xx").with_advance_on_upload(true);
    let (uploader, _store, sink) = memory_uploader(config);

    uploader.upload(select("report.pdf")).await.unwrap();
    assert_eq!(sink.advance_count(), 1);
    assert_eq!(
        sink.toasts().last().map(|t| t.title.as_str()),
        Some("report.pdf uploaded successfully!!")
    );
}

#[tokio::test]
async fn empty_gesture_is_rejected() {
    let (uploader, store, sink) = memory_uploader(UploaderConfig::for_record("001xx"));

    let result = uploader.upload(FileSelection::empty()).await;

    assert!(matches!(result, Err(AttachmentError::NoFileSelected)));
    assert!(store.is_empty().await);
    assert!(sink.changes().is_empty());
    assert_eq!(sink.toasts()[0].variant, ToastVariant::Error);
}

#[tokio::test]
async fn overlapping_gesture_is_rejected_and_first_completes() {
    let (uploader, store, sink) = memory_uploader(UploaderConfig::for_record("001xx"));
    let gate = store.pause_creates();

    let first = uploader.upload(select("a.pdf"));
    let second = async {
        while uploader.upload_phase().is_idle() {
            tokio::task::yield_now().await;
        }
        let result = uploader.upload(select("b.pdf")).await;
        gate.release();
        result
    };

    let (first, second) = futures::join!(first, second);
    assert!(first.is_ok());
    assert!(matches!(second, Err(AttachmentError::UploadInProgress)));
    assert_eq!(sink.changes(), vec![vec![AttachmentId::from("068xx001")]]);
}

#[tokio::test]
async fn upload_finishing_during_hydration_keeps_upload() {
    let config = UploaderConfig::for_record("001xx").with_initial_attachment_ids(["a", "b"]);
    let (uploader, store, sink) = memory_uploader(config);
    store.seed("a", "a.pdf", "001xx").await;
    store.seed("b", "b.pdf", "001xx").await;
    let gate = store.pause_fetches();

    let hydrate = uploader.initialize();
    let upload = async {
        // Runs once the hydration fetch is parked on the gate
        tokio::task::yield_now().await;
        let result = uploader.upload(select("report.pdf")).await;
        gate.release();
        result
    };

    let (hydrated, uploaded) = futures::join!(hydrate, upload);
    assert!(matches!(hydrated, Err(AttachmentError::HydrationClosed)));
    assert!(uploaded.is_ok());
    assert_eq!(
        uploader.attachments(),
        vec![AttachmentRef::new("068xx001", "report.pdf")]
    );
    assert_eq!(sink.changes(), vec![vec![AttachmentId::from("068xx001")]]);
}

#[tokio::test]
async fn filtered_type_is_rejected_before_reading() {
    let config = UploaderConfig::for_record("001xx").with_allowed_file_types([".pdf", "image/*"]);
    let (uploader, store, _sink) = memory_uploader(config);

    assert!(uploader.upload(select("scan.png")).await.is_ok());
    let result = uploader.upload(select("script.sh")).await;
    assert!(matches!(result, Err(AttachmentError::UnsupportedFileType { .. })));
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn uploaded_name_matches_rehydrated_name() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(LocalAttachmentStore::new(dir.path()));
    let sink = Arc::new(RecordingSink::new());
    let first = FileUploader::new(
        UploaderConfig::for_record("001xx"),
        Arc::new(LocalByteSource::new()),
        store.clone(),
        OutputNotifier::with_sink(sink.clone()),
    );
    let uploaded = first
        .upload(FileSelection::single(SelectedFile::inline(
            "docs\\report.pdf",
            "%PDF",
        )))
        .await
        .unwrap();
    assert_eq!(uploaded.display_name(), "report.pdf");

    let second = FileUploader::new(
        UploaderConfig::for_record("001xx").with_initial_attachment_ids(first.attachment_ids()),
        Arc::new(LocalByteSource::new()),
        store,
        OutputNotifier::with_sink(Arc::new(RecordingSink::new())),
    );
    second.initialize().await.unwrap();

    assert_eq!(second.attachments(), first.attachments());
}

#[tokio::test]
async fn local_store_survives_a_new_uploader() {
    let dir = tempfile::tempdir().unwrap();
    let files = tempfile::tempdir().unwrap();
    let path = files.path().join("report.pdf");
    std::fs::write(&path, b"%PDF-1.4 report").unwrap();

    let store = Arc::new(LocalAttachmentStore::new(dir.path()));
    let sink = Arc::new(RecordingSink::new());
    let first = FileUploader::new(
        UploaderConfig::for_record("001xx"),
        Arc::new(LocalByteSource::new()),
        store.clone(),
        OutputNotifier::with_sink(sink.clone()),
    );
    let uploaded = first
        .upload(FileSelection::single(SelectedFile::from_path(&path)))
        .await
        .unwrap();

    // The host hands the reported ids to the next uploader instance
    let ids = sink.changes().pop().unwrap();
    let second = FileUploader::new(
        UploaderConfig::for_record("001xx").with_initial_attachment_ids(ids),
        Arc::new(LocalByteSource::new()),
        store,
        OutputNotifier::with_sink(Arc::new(RecordingSink::new())),
    );
    second.initialize().await.unwrap();

    assert_eq!(second.attachments(), vec![uploaded]);
}
