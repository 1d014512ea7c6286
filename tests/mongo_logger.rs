//! MongoLogger against a real server.
//!
//! Runs only when `TGSTARTER_TEST_MONGODB_URI` is set; each test works in
//! a fresh database that is dropped afterwards.

use mongodb::bson::oid::ObjectId;
use mongodb::bson::{doc, Bson, Document};
use mongodb::Client;
use serde_json::json;
use teloxide::types::Message;

use tgstarter::database::Database;
use tgstarter::logger::{LogRecord, LoggerOptions, MongoLogger, NotificationTemplate};

const URI_VAR: &str = "TGSTARTER_TEST_MONGODB_URI";

async fn database() -> Option<Database> {
    let Ok(uri) = std::env::var(URI_VAR) else {
        eprintln!("skipping: {URI_VAR} is not set");
        return None;
    };
    let client = Client::with_uri_str(&uri).await.unwrap();
    let name = format!("tgstarter_test_{}", ObjectId::new().to_hex());
    Some(Database::from_client(client, &name))
}

async fn drop_database(db: &Database) {
    db.client().database(db.name()).drop().await.unwrap();
}

fn message() -> Message {
    serde_json::from_value(json!({
        "message_id": 10,
        "date": 1_700_000_000,
        "chat": { "id": 5, "type": "private", "first_name": "Ann" },
        "from": { "id": 7, "is_bot": false, "first_name": "Ann" },
        "text": "hello"
    }))
    .unwrap()
}

fn as_i64(value: Option<&Bson>) -> Option<i64> {
    match value? {
        Bson::Int32(v) => Some(i64::from(*v)),
        Bson::Int64(v) => Some(*v),
        _ => None,
    }
}

#[tokio::test]
async fn test_event_without_exception_returns_none() {
    let Some(db) = database().await else { return };
    let logger = MongoLogger::new(&db, NotificationTemplate::default(), LoggerOptions::default());

    let text = logger.info(LogRecord::event(&message()).unwrap()).await.unwrap();
    assert_eq!(text, None);

    let logs = db.collection::<Document>("logs");
    let stored = logs.find_one(doc! {}).await.unwrap().unwrap();
    assert_eq!(stored.get_str("level").unwrap(), "INFO");
    assert_eq!(stored.get("exception"), Some(&Bson::Null));

    drop_database(&db).await;
}

#[tokio::test]
async fn test_failure_is_stored_and_rendered() {
    let Some(db) = database().await else { return };
    let logger = MongoLogger::new(&db, NotificationTemplate::default(), LoggerOptions::default());

    let error = anyhow::anyhow!("disk is full");
    let record = LogRecord::event(&message()).unwrap().error(&error);
    let text = logger.error(record).await.unwrap().expect("notification for a failure");

    let logs = db.collection::<Document>("logs");
    let stored = logs.find_one(doc! { "level": "ERROR" }).await.unwrap().unwrap();

    assert_eq!(stored.get_str("type").unwrap(), "EVENT");
    assert_eq!(stored.get_str("came_from").unwrap(), "USER");

    let user_info = stored.get_document("user_info").unwrap();
    assert_eq!(as_i64(user_info.get_document("user").unwrap().get("id")), Some(7));
    assert_eq!(as_i64(user_info.get_document("chat").unwrap().get("id")), Some(5));

    let exception = stored.get_document("exception").unwrap();
    assert_eq!(exception.get_str("value").unwrap(), "disk is full");
    assert_eq!(exception.get_str("type").unwrap(), "anyhow::Error");

    let id = stored.get_object_id("_id").unwrap();
    assert!(text.contains(&id.to_hex()), "{text}");
    assert!(text.contains("disk is full"), "{text}");

    drop_database(&db).await;
}
