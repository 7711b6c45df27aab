use super::*;
use std::sync::Arc;

fn image(name: &str) -> Attachment {
    Attachment::new(name, "image/png", "QUJDRA==")
}

#[test]
fn pruning_lowers_estimated_usage() {
    let history = ConversationHistory::from_messages(vec![
        Message::user("one", vec![image("1.png"), image("2.png")]),
        Message::model("ok"),
        Message::user("two", vec![image("3.png")]),
        Message::model("ok"),
    ]);

    let before = calculate_context_usage(history.messages(), "", 100_000);
    let pruned = HistoryPruner::new(true).prepare(&history);
    let after = calculate_context_usage(pruned.messages(), "", 100_000);

    // The latest exchange keeps its image
    assert_eq!(before.image_count, 3);
    assert_eq!(after.image_count, 1);
    assert_eq!(before.used - after.used, 550);
}

#[test]
fn replayed_turns_never_contain_model_attachments() {
    let mut model = Message::model("generated");
    model.attachments = Some(vec![image("gen.png")]);
    let messages = vec![Message::user("draw", vec![image("ref.png")]), model];

    let turns = build_outgoing_turns(&messages);
    let inline: usize = turns.iter().map(Turn::inline_data_count).sum();
    assert_eq!(inline, 1);
    assert_eq!(turns[0].role, TurnRole::User);
}

#[tokio::test]
async fn degraded_save_round_trips_through_load() {
    let store = Arc::new(MemoryStore::with_quota(600));
    let gateway = PersistenceGateway::new(store);
    let big = Attachment::new("big.png", "image/png", "A".repeat(2_000));
    let messages = vec![Message::user("q", vec![big]), Message::model("a")];

    assert_eq!(gateway.save(&messages).await, SaveOutcome::SavedDegraded);

    let loaded = gateway.load().await.expect("degraded history is stored");
    let attachment = &loaded.messages()[0].attachments()[0];
    assert_eq!(attachment.name, "big.png");
    assert!(!attachment.has_payload());
    assert!(attachment.preview_url.is_empty());
}

#[test]
fn settings_context_config_feeds_estimator() {
    let settings = Settings {
        context_limit: 1_000,
        ..Settings::default()
    };
    let config = settings.context_config();
    let usage = calculate_context_usage(&[Message::user("x".repeat(3_000), vec![])], "", config.limit);
    assert!(usage.is_critical);
}
