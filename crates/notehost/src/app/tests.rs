use std::sync::Arc;

use serde_json::json;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{timeout, Duration};

use crate::alert::{
    AlertAction, AlertOptions, AlertValue, DialogPresenter, DialogRequest, PrimaryAction,
    UserChoice,
};
use crate::config::HostConfig;
use crate::error::{HostError, HostResult};
use crate::filter::FilterParameters;
use crate::media::{MediaPayload, MediaStore};
use crate::note::NoteInfo;
use crate::tags::{AllowAll, SharedTagDecision, SharedTagPolicy};

use super::App;

/// Forwards presented dialogs to the test, which plays the user.
struct ChannelPresenter {
    sender: mpsc::UnboundedSender<DialogRequest>,
}

#[async_trait::async_trait]
impl DialogPresenter for ChannelPresenter {
    async fn present(&self, dialog: &DialogRequest) -> HostResult<()> {
        self.sender
            .send(dialog.clone())
            .map_err(|_| HostError::Transport("presenter disconnected".to_string()))
    }
}

/// Records uploads and serves deterministic hosted URLs.
#[derive(Default)]
struct RecordingMediaStore {
    uploads: Mutex<Vec<(String, String, usize)>>,
}

#[async_trait::async_trait]
impl MediaStore for RecordingMediaStore {
    async fn upload(&self, note_uuid: &str, media: MediaPayload) -> HostResult<String> {
        let mut uploads = self.uploads.lock().await;
        uploads.push((note_uuid.to_string(), media.mime_type, media.bytes.len()));
        Ok(format!("https://media.test/{note_uuid}/{}", uploads.len()))
    }
}

/// Always fails with a transport error, as an offline uploader would.
struct OfflineMediaStore;

#[async_trait::async_trait]
impl MediaStore for OfflineMediaStore {
    async fn upload(&self, _note_uuid: &str, _media: MediaPayload) -> HostResult<String> {
        Err(HostError::Transport("upload connection reset".to_string()))
    }
}

struct Fixture {
    app: Arc<App>,
    dialogs: mpsc::UnboundedReceiver<DialogRequest>,
    media: Arc<RecordingMediaStore>,
}

fn fixture_with(config: HostConfig) -> Fixture {
    let (sender, dialogs) = mpsc::unbounded_channel();
    let media = Arc::new(RecordingMediaStore::default());
    let app = Arc::new(App::new(
        config,
        Arc::new(AllowAll),
        Arc::new(ChannelPresenter { sender }),
        media.clone(),
    ));
    Fixture { app, dialogs, media }
}

fn fixture() -> Fixture {
    fixture_with(HostConfig::default_new())
}

fn alert_actions() -> AlertOptions {
    AlertOptions {
        actions: vec![
            AlertAction {
                label: "A".to_string(),
                icon: None,
                value: None,
            },
            AlertAction {
                label: "B".to_string(),
                icon: None,
                value: Some("bval".to_string()),
            },
        ],
        ..Default::default()
    }
}

/// Run one alert end to end, answering the dialog with `choice`.
async fn run_alert(options: AlertOptions, choice: UserChoice) -> AlertValue {
    let mut fixture = fixture();
    let app = fixture.app.clone();
    tokio::spawn(async move {
        if let Some(dialog) = fixture.dialogs.recv().await {
            assert!(app.deliver_dialog_choice(&dialog.dialog_id, choice).await);
        }
    });

    timeout(
        Duration::from_secs(1),
        fixture.app.alert(Some("pick one"), Some(options)),
    )
    .await
    .expect("alert timed out")
    .expect("alert failed")
}

#[tokio::test]
async fn create_note_then_find_fills_in_details() {
    let fixture = fixture();
    let uuid = fixture
        .app
        .create_note(Some("Meeting Notes"), &["Weekly Sync".to_string()])
        .await
        .expect("create");

    let handle = fixture
        .app
        .find_note(&NoteInfo::by_uuid(&uuid))
        .await
        .expect("find")
        .expect("found");
    assert_eq!(handle.uuid, uuid);
    assert_eq!(handle.name.as_deref(), Some("Meeting Notes"));
    assert_eq!(handle.tags, Some(vec!["weekly-sync".to_string()]));
}

#[tokio::test]
async fn find_note_requires_uuid_or_name() {
    let fixture = fixture();
    let error = fixture
        .app
        .find_note(&NoteInfo::default())
        .await
        .expect_err("expected contract violation");
    assert!(matches!(error, HostError::InvalidInput(_)));
}

#[tokio::test]
async fn find_note_by_name_honors_negated_tag_clauses() {
    let fixture = fixture();
    fixture
        .app
        .create_note(Some("Plan"), &["work".to_string()])
        .await
        .expect("create");
    let home = fixture
        .app
        .create_note(Some("Plan"), &["home".to_string()])
        .await
        .expect("create");

    let info = NoteInfo {
        uuid: None,
        name: Some("Plan".to_string()),
        tags: Some(vec!["^work".to_string()]),
    };
    let handle = fixture
        .app
        .find_note(&info)
        .await
        .expect("find")
        .expect("found");
    assert_eq!(handle.uuid, home);
}

#[tokio::test]
async fn promotion_redirects_the_local_uuid() {
    let fixture = fixture();
    let local = fixture.app.create_note(Some("Draft"), &[]).await.expect("create");
    fixture
        .app
        .promote_note(&local, "persisted-1")
        .await
        .expect("promote");

    let handle = fixture
        .app
        .find_note(&NoteInfo::by_uuid(&local))
        .await
        .expect("find")
        .expect("found");
    assert_eq!(handle.uuid, "persisted-1");
    assert_eq!(handle.name.as_deref(), Some("Draft"));
}

#[tokio::test]
async fn deleted_notes_vanish_from_lookups_and_filters() {
    let fixture = fixture();
    let keep = fixture.app.create_note(Some("Keep"), &[]).await.expect("create");
    let gone = fixture.app.create_note(Some("Gone"), &[]).await.expect("create");
    fixture.app.mark_note_deleted(&gone).await;

    assert!(fixture
        .app
        .find_note(&NoteInfo::by_uuid(&gone))
        .await
        .expect("find")
        .is_none());

    let handles = fixture.app.filter_notes(None).await.expect("filter");
    assert_eq!(handles.len(), 1);
    assert_eq!(handles[0].uuid, keep);
}

#[tokio::test]
async fn filter_truth_table_end_to_end() {
    let fixture = fixture();
    let a = fixture
        .app
        .create_note(Some("A"), &["x".to_string(), "y".to_string()])
        .await
        .expect("create");
    let b = fixture
        .app
        .create_note(Some("B"), &["y".to_string()])
        .await
        .expect("create");

    let by_tag = |tag: &str| FilterParameters {
        tag: Some(tag.to_string()),
        ..Default::default()
    };

    let hits = fixture
        .app
        .filter_notes(Some(&by_tag("x,^y")))
        .await
        .expect("filter");
    assert!(hits.is_empty());

    let hits = fixture
        .app
        .filter_notes(Some(&by_tag("y")))
        .await
        .expect("filter");
    let uuids: Vec<_> = hits.iter().map(|handle| handle.uuid.clone()).collect();
    assert_eq!(uuids, vec![a.clone(), b.clone()]);

    let hits = fixture
        .app
        .filter_notes(Some(&by_tag("^x")))
        .await
        .expect("filter");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].uuid, b);
}

#[tokio::test]
async fn filter_without_parameters_matches_the_empty_filter() {
    let fixture = fixture();
    fixture.app.create_note(Some("One"), &[]).await.expect("create");
    fixture.app.create_note(Some("Two"), &[]).await.expect("create");

    let all = fixture.app.filter_notes(None).await.expect("filter");
    let empty = fixture
        .app
        .filter_notes(Some(&FilterParameters::default()))
        .await
        .expect("filter");
    assert_eq!(all, empty);
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn group_filter_uses_the_host_taxonomy() {
    let fixture = fixture();
    let archived = fixture.app.create_note(Some("Old"), &[]).await.expect("create");
    fixture.app.create_note(Some("New"), &[]).await.expect("create");
    fixture
        .app
        .set_note_group(&archived, Some("archived"))
        .await
        .expect("set group");

    let params = FilterParameters {
        group: Some("archived".to_string()),
        ..Default::default()
    };
    let hits = fixture.app.filter_notes(Some(&params)).await.expect("filter");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].uuid, archived);
}

#[tokio::test]
async fn add_note_tag_normalizes_and_stores() {
    let fixture = fixture();
    let uuid = fixture.app.create_note(Some("Plan"), &[]).await.expect("create");

    let added = fixture
        .app
        .add_note_tag(&NoteInfo::by_uuid(&uuid), &json!("Team Inbox"))
        .await
        .expect("add tag");
    assert!(added);

    let handle = fixture
        .app
        .find_note(&NoteInfo::by_uuid(&uuid))
        .await
        .expect("find")
        .expect("found");
    assert_eq!(handle.tags, Some(vec!["team-inbox".to_string()]));
}

#[tokio::test]
async fn non_string_tag_fails_without_mutating_the_note() {
    let fixture = fixture();
    let uuid = fixture.app.create_note(Some("Plan"), &[]).await.expect("create");

    let error = fixture
        .app
        .add_note_tag(&NoteInfo::by_uuid(&uuid), &json!(42))
        .await
        .expect_err("expected type violation");
    assert!(matches!(error, HostError::TypeViolation(_)));

    let handle = fixture
        .app
        .find_note(&NoteInfo::by_uuid(&uuid))
        .await
        .expect("find")
        .expect("found");
    assert_eq!(handle.tags, Some(Vec::new()));
}

#[tokio::test]
async fn shared_tag_refusal_returns_false_not_an_error() {
    let (sender, _dialogs) = mpsc::unbounded_channel();
    let policy = Arc::new(SharedTagPolicy::new());
    policy
        .set_decision("team-inbox", SharedTagDecision::Refuse)
        .await;
    let app = App::new(
        HostConfig::default_new(),
        policy,
        Arc::new(ChannelPresenter { sender }),
        Arc::new(RecordingMediaStore::default()),
    );

    let uuid = app.create_note(Some("Plan"), &[]).await.expect("create");
    let added = app
        .add_note_tag(&NoteInfo::by_uuid(&uuid), &json!("Team Inbox"))
        .await
        .expect("add tag");
    assert!(!added);

    let handle = app
        .find_note(&NoteInfo::by_uuid(&uuid))
        .await
        .expect("find")
        .expect("found");
    assert_eq!(handle.tags, Some(Vec::new()));
}

#[tokio::test]
async fn alert_resolution_table_end_to_end() {
    let value = run_alert(alert_actions(), UserChoice::Action { index: 0 }).await;
    assert_eq!(value, AlertValue::Number(0));

    let value = run_alert(alert_actions(), UserChoice::Action { index: 1 }).await;
    assert_eq!(value, AlertValue::Text("bval".to_string()));

    let value = run_alert(alert_actions(), UserChoice::Primary).await;
    assert_eq!(value, AlertValue::Number(-1));

    let value = run_alert(alert_actions(), UserChoice::Dismissed).await;
    assert_eq!(value, AlertValue::Null);
}

#[tokio::test]
async fn primary_action_value_is_returned_for_done() {
    let options = AlertOptions {
        primary_action: Some(PrimaryAction {
            label: "Save".to_string(),
            icon: None,
            value: Some("saved".to_string()),
        }),
        ..Default::default()
    };
    let value = run_alert(options, UserChoice::Primary).await;
    assert_eq!(value, AlertValue::Text("saved".to_string()));
}

#[tokio::test]
async fn concurrent_alerts_resolve_independently() {
    let mut fixture = fixture();
    let app = fixture.app.clone();

    let first = {
        let app = app.clone();
        tokio::spawn(async move { app.alert(Some("first"), Some(alert_actions())).await })
    };
    let second = {
        let app = app.clone();
        tokio::spawn(async move { app.alert(Some("second"), Some(alert_actions())).await })
    };

    // Answer each dialog according to the message it carries, in whatever
    // order presentation happened.
    for _ in 0..2 {
        let dialog = timeout(Duration::from_secs(1), fixture.dialogs.recv())
            .await
            .expect("timeout")
            .expect("dialog presented");
        let choice = match dialog.message.as_deref() {
            Some("first") => UserChoice::Action { index: 1 },
            _ => UserChoice::Dismissed,
        };
        assert!(app.deliver_dialog_choice(&dialog.dialog_id, choice).await);
    }

    let first = first.await.expect("join").expect("alert");
    let second = second.await.expect("join").expect("alert");
    assert_eq!(first, AlertValue::Text("bval".to_string()));
    assert_eq!(second, AlertValue::Null);
}

#[tokio::test]
async fn late_delivery_after_resolution_is_rejected() {
    let mut fixture = fixture();
    let app = fixture.app.clone();

    let alert = {
        let app = app.clone();
        tokio::spawn(async move { app.alert(None, None).await })
    };

    let dialog = timeout(Duration::from_secs(1), fixture.dialogs.recv())
        .await
        .expect("timeout")
        .expect("dialog presented");
    assert!(app.deliver_dialog_choice(&dialog.dialog_id, UserChoice::Dismissed).await);

    let value = alert.await.expect("join").expect("alert");
    assert_eq!(value, AlertValue::Null);

    // The dialog reached its terminal state; a second choice is ignored.
    assert!(!app.deliver_dialog_choice(&dialog.dialog_id, UserChoice::Primary).await);
}

#[tokio::test]
async fn attach_note_media_uploads_and_returns_the_hosted_url() {
    let fixture = fixture();
    let uuid = fixture.app.create_note(Some("Plan"), &[]).await.expect("create");

    let url = fixture
        .app
        .attach_note_media(&NoteInfo::by_uuid(&uuid), "data:image/png;base64,aGVsbG8=")
        .await
        .expect("attach");
    assert!(url.starts_with("https://media.test/"));

    let uploads = fixture.media.uploads.lock().await;
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].0, uuid);
    assert_eq!(uploads[0].1, "image/png");
    assert_eq!(uploads[0].2, 5);
}

#[tokio::test]
async fn oversized_media_is_rejected_before_upload() {
    let fixture = fixture_with(HostConfig {
        max_media_bytes: 4,
        ..HostConfig::default_new()
    });
    let uuid = fixture.app.create_note(Some("Plan"), &[]).await.expect("create");

    let error = fixture
        .app
        .attach_note_media(&NoteInfo::by_uuid(&uuid), "data:image/png;base64,aGVsbG8=")
        .await
        .expect_err("expected size rejection");
    assert!(matches!(error, HostError::MediaTooLarge { size: 5, limit: 4 }));

    assert!(fixture.media.uploads.lock().await.is_empty());
}

#[tokio::test]
async fn upload_failures_propagate_unchanged() {
    let (sender, _dialogs) = mpsc::unbounded_channel();
    let app = App::new(
        HostConfig::default_new(),
        Arc::new(AllowAll),
        Arc::new(ChannelPresenter { sender }),
        Arc::new(OfflineMediaStore),
    );

    let uuid = app.create_note(Some("Plan"), &[]).await.expect("create");
    let error = app
        .attach_note_media(&NoteInfo::by_uuid(&uuid), "data:image/png;base64,aGVsbG8=")
        .await
        .expect_err("expected transport failure");
    assert!(matches!(error, HostError::Transport(_)));
}

#[tokio::test]
async fn malformed_data_urls_are_rejected_before_lookup() {
    let fixture = fixture();
    let error = fixture
        .app
        .attach_note_media(&NoteInfo::by_uuid("missing"), "not-a-data-url")
        .await
        .expect_err("expected rejection");
    assert!(matches!(error, HostError::InvalidInput(_)));
    assert!(fixture.media.uploads.lock().await.is_empty());
}
