//! Pipeline tests with fake transport and model clients.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use crate::relay::avatars::AvatarStore;
use crate::relay::database::Database;
use crate::relay::engine::{APOLOGY, ChatTransport, InboundMessage, ModelClient, RelayEngine};
use crate::relay::personas::PersonaBook;
use crate::relay::profile::SenderProfile;

struct FakeTransport {
    sent: Mutex<Vec<(i64, String)>>,
    photo: Option<Vec<u8>>,
    photo_error: bool,
}

impl FakeTransport {
    fn new(photo: Option<Vec<u8>>) -> Self {
        Self { sent: Mutex::new(Vec::new()), photo, photo_error: false }
    }

    fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatTransport for FakeTransport {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), String> {
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        Ok(())
    }

    async fn show_typing(&self, _chat_id: i64) {}

    async fn fetch_profile_photo(&self, _user_id: i64) -> Result<Option<Vec<u8>>, String> {
        if self.photo_error {
            return Err("photo backend down".to_string());
        }
        Ok(self.photo.clone())
    }
}

struct FakeModel {
    reply: Result<String, String>,
    prompts: Mutex<Vec<String>>,
}

impl FakeModel {
    fn replying(text: &str) -> Self {
        Self { reply: Ok(text.to_string()), prompts: Mutex::new(Vec::new()) }
    }

    fn failing(error: &str) -> Self {
        Self { reply: Err(error.to_string()), prompts: Mutex::new(Vec::new()) }
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelClient for FakeModel {
    async fn generate(&self, prompt: &str) -> Result<String, String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply.clone()
    }
}

struct Harness {
    engine: RelayEngine<FakeTransport, FakeModel>,
    database: Arc<Database>,
    transport: Arc<FakeTransport>,
    model: Arc<FakeModel>,
    _dir: TempDir,
}

fn harness(personas: &str, transport: FakeTransport, model: FakeModel) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let database = Arc::new(Database::open_in_memory());
    let transport = Arc::new(transport);
    let model = Arc::new(model);
    let engine = RelayEngine::new(
        PersonaBook::parse(personas),
        database.clone(),
        AvatarStore::new(dir.path()),
        transport.clone(),
        model.clone(),
    );
    Harness { engine, database, transport, model, _dir: dir }
}

fn inbound(username: &str, text: &str) -> InboundMessage {
    InboundMessage {
        chat_id: 777,
        sender_id: 42,
        sender: SenderProfile {
            username: Some(username.to_string()),
            first_name: "Ada".to_string(),
            last_name: Some("Lovelace".to_string()),
        },
        text: text.to_string(),
    }
}

#[tokio::test]
async fn test_relayed_message_logs_both_directions() {
    let h = harness(
        "[default_persona]Be brief.",
        FakeTransport::new(Some(b"jpeg".to_vec())),
        FakeModel::replying("hello ada"),
    );

    h.engine.handle_message(inbound("ada99", "hi bot")).await;

    let rows = h.database.messages();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].direction, "in");
    assert_eq!(rows[0].user_id, "ada99");
    assert_eq!(rows[0].text, "hi bot");
    assert_eq!(rows[1].direction, "out");
    assert_eq!(rows[1].text, "hello ada");

    // Inbound and outbound rows share the same avatar path.
    assert_eq!(rows[0].profile_pic_path.as_deref(), Some("profile_pics/ada99.jpg"));
    assert_eq!(rows[1].profile_pic_path, rows[0].profile_pic_path);

    assert_eq!(h.transport.sent(), vec![(777, "hello ada".to_string())]);
}

#[tokio::test]
async fn test_no_photo_means_null_avatar_path() {
    let h = harness(
        "[default_persona]Be brief.",
        FakeTransport::new(None),
        FakeModel::replying("ok"),
    );

    h.engine.handle_message(inbound("ada99", "hi")).await;

    let rows = h.database.messages();
    assert_eq!(rows.len(), 2);
    assert!(rows[0].profile_pic_path.is_none());
    assert!(rows[1].profile_pic_path.is_none());
}

#[tokio::test]
async fn test_blocked_user_is_ignored_silently() {
    let h = harness(
        "[default_persona]Be brief.",
        FakeTransport::new(Some(b"jpeg".to_vec())),
        FakeModel::replying("should never be seen"),
    );
    h.database.set_blocked("ada99", true);

    h.engine.handle_message(inbound("ada99", "hi bot")).await;

    assert!(h.database.messages().is_empty());
    assert!(h.transport.sent().is_empty());
    assert!(h.model.prompts().is_empty());
}

#[tokio::test]
async fn test_persona_prefix_is_selected_per_user() {
    let h = harness(
        "[persona:ada99]Speak like a poet.[default_persona]Be brief.",
        FakeTransport::new(None),
        FakeModel::replying("ok"),
    );

    h.engine.handle_message(inbound("ada99", "hello")).await;

    assert_eq!(h.model.prompts(), vec!["Speak like a poet.\n\nhello".to_string()]);
}

#[tokio::test]
async fn test_unconfigured_user_gets_default_persona() {
    let h = harness(
        "[persona:someone_else]Poetic.[default_persona]Be brief.",
        FakeTransport::new(None),
        FakeModel::replying("ok"),
    );

    h.engine.handle_message(inbound("ada99", "hello")).await;

    assert_eq!(h.model.prompts(), vec!["Be brief.\n\nhello".to_string()]);
}

#[tokio::test]
async fn test_model_failure_sends_apology_and_logs_diagnostic() {
    let h = harness(
        "[default_persona]Be brief.",
        FakeTransport::new(None),
        FakeModel::failing("model exploded"),
    );

    h.engine.handle_message(inbound("ada99", "hi")).await;

    // Exactly one apology, no reply.
    assert_eq!(h.transport.sent(), vec![(777, APOLOGY.to_string())]);

    // The inbound row plus one outbound diagnostic row.
    let rows = h.database.messages();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].direction, "in");
    assert_eq!(rows[1].direction, "out");
    assert!(rows[1].text.contains("model exploded"));
}

#[tokio::test]
async fn test_database_flavored_failure_suppresses_diagnostic_row() {
    let h = harness(
        "[default_persona]Be brief.",
        FakeTransport::new(None),
        FakeModel::failing("Database connection refused"),
    );

    h.engine.handle_message(inbound("ada99", "hi")).await;

    // Apology still goes out, but no diagnostic row is written.
    assert_eq!(h.transport.sent(), vec![(777, APOLOGY.to_string())]);
    let rows = h.database.messages();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].direction, "in");
}

#[tokio::test]
async fn test_avatar_fetch_failure_aborts_before_inbound_log() {
    let mut transport = FakeTransport::new(None);
    transport.photo_error = true;
    let h = harness("[default_persona]Be brief.", transport, FakeModel::replying("ok"));

    h.engine.handle_message(inbound("ada99", "hi")).await;

    assert_eq!(h.transport.sent(), vec![(777, APOLOGY.to_string())]);
    assert!(h.model.prompts().is_empty());

    // No inbound row was written; only the outbound diagnostic.
    let rows = h.database.messages();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].direction, "out");
    assert!(rows[0].text.contains("photo backend down"));
    assert!(rows[0].profile_pic_path.is_none());
}

#[tokio::test]
async fn test_derived_identifier_used_when_no_username() {
    let h = harness(
        "[default_persona]Be brief.",
        FakeTransport::new(None),
        FakeModel::replying("ok"),
    );

    let mut msg = inbound("ignored", "hi");
    msg.sender.username = None;
    h.engine.handle_message(msg).await;

    let rows = h.database.messages();
    assert_eq!(rows[0].user_id, "Ada Lovelace");
    assert_eq!(rows[1].user_id, "Ada Lovelace");
}
