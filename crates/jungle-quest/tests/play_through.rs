use std::time::Duration;

use jungle_quest::Scenario;
use jungle_quest::core::marker::GAME_OVER_MESSAGE;
use jungle_quest::core::{Error, Role};
use jungle_quest_model::ModelMessage;
use jungle_quest_test_model::{PresetResponse, TestModelProvider};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_millis(500);

#[tokio::test]
async fn test_jubilee_jungle_play_through() {
    let scenario = Scenario::JUBILEE_JUNGLE;
    let mut provider = TestModelProvider::default();
    provider.add_response(PresetResponse::with_text(
        "Guide: Welcome, traveller. What is your name, gender and race?",
    ));
    provider.add_response(PresetResponse::with_text(
        "Guide: A bridge of vines sways over the gorge. Cross it, or climb down?",
    ));
    provider.add_response(PresetResponse::with_text(
        "Guide: The vines snap. You fall into the mist. The End...",
    ));
    let session = scenario.session_builder(provider.clone()).build();

    let opening_move = scenario.opening_move.unwrap();
    for input in [opening_move, "Ayla, a female elf", "Cross it"] {
        let outcome = timeout(WAIT, session.submit_turn(input))
            .await
            .unwrap()
            .unwrap();
        assert!(outcome.reply().starts_with("Guide:"));
    }
    assert!(session.is_ended().await.unwrap());

    let transcript = session.transcript().await.unwrap();
    assert_eq!(transcript.len(), 2 + 3 * 2 + 1);
    assert_eq!(transcript.system_prompt(), scenario.system_prompt.trim());
    let last = transcript.last().unwrap();
    assert_eq!(last.role(), Role::Assistant);
    assert_eq!(last.content(), GAME_OVER_MESSAGE);

    let err = session.submit_turn("Try again").await.unwrap_err();
    assert!(matches!(err, Error::Ended));

    let first_request = &provider.requests()[0];
    assert_eq!(
        first_request.messages,
        vec![
            ModelMessage::System(scenario.system_prompt.trim().to_owned()),
            ModelMessage::Assistant(scenario.welcome_message.trim().to_owned()),
            ModelMessage::User("Begin the adventure.".to_owned()),
        ]
    );
}

#[tokio::test]
async fn test_amazon_rainforest_survives_failed_turn() {
    let mut provider = TestModelProvider::default();
    provider.add_response(
        PresetResponse::with_text("A caiman watches you from the river.")
            .with_failures(1),
    );
    let session = Scenario::AMAZON_RAINFOREST
        .session_builder(provider)
        .build();

    assert!(session.submit_turn("I am Rui, armed with daggers").await.is_err());
    let outcome = session
        .submit_turn("I am Rui, armed with daggers")
        .await
        .unwrap();
    assert!(!outcome.is_game_over());
    assert_eq!(session.transcript().await.unwrap().len(), 4);
}
