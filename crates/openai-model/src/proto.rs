use jungle_quest_model::{ModelMessage, ModelRequest};
use serde::{Deserialize, Serialize};

use crate::OpenAIConfig;

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub choices: Vec<Choice>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct Choice {
    pub delta: Delta,
    pub finish_reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct Delta {
    pub content: Option<String>,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System { content: String },
    User { content: String },
    Assistant { content: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    stream: bool,
}

// -----------
// Conversions
// -----------

#[inline]
pub fn create_request(
    req: &ModelRequest,
    config: &OpenAIConfig,
) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: config.model.clone(),
        messages: req.messages.iter().map(create_message).collect(),
        stream: true,
    }
}

#[inline]
fn create_message(msg: &ModelMessage) -> Message {
    let content = msg.content().to_owned();
    match msg {
        ModelMessage::System(_) => Message::System { content },
        ModelMessage::User(_) => Message::User { content },
        ModelMessage::Assistant(_) => Message::Assistant { content },
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::OpenAIConfigBuilder;

    fn model_message(msg: Message) -> ModelMessage {
        match msg {
            Message::System { content } => ModelMessage::System(content),
            Message::User { content } => ModelMessage::User(content),
            Message::Assistant { content } => ModelMessage::Assistant(content),
        }
    }

    fn adventure_request() -> ModelRequest {
        ModelRequest {
            messages: vec![
                ModelMessage::System("You are the guide.".to_owned()),
                ModelMessage::Assistant("Welcome, adventurer!".to_owned()),
                ModelMessage::User("I take the broadsword".to_owned()),
                ModelMessage::Assistant("A jaguar blocks the path.".to_owned()),
                ModelMessage::User("  \"Run!\"\n  I flee ✨ ".to_owned()),
            ],
        }
    }

    #[test]
    fn test_create_request() {
        let config = OpenAIConfigBuilder::with_api_key("xxx")
            .with_model("custom")
            .build();
        let request = create_request(&adventure_request(), &config);
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "model": "custom",
                "messages": [
                    { "role": "system", "content": "You are the guide." },
                    { "role": "assistant", "content": "Welcome, adventurer!" },
                    { "role": "user", "content": "I take the broadsword" },
                    { "role": "assistant", "content": "A jaguar blocks the path." },
                    { "role": "user", "content": "  \"Run!\"\n  I flee ✨ " },
                ],
                "stream": true,
            })
        );
    }

    #[test]
    fn test_wire_round_trip() {
        let config = OpenAIConfigBuilder::with_api_key("xxx").build();
        let original = adventure_request();
        let encoded =
            serde_json::to_string(&create_request(&original, &config))
                .unwrap();
        let decoded: ChatCompletionRequest =
            serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.model, "gpt-3.5-turbo");
        let messages: Vec<_> =
            decoded.messages.into_iter().map(model_message).collect();
        assert_eq!(messages, original.messages);
    }

    #[test]
    fn test_parse_chunk() {
        let chunk: ChatCompletionChunk = serde_json::from_value(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion.chunk",
            "choices": [{
                "index": 0,
                "delta": { "role": "assistant", "content": "The End..." },
                "finish_reason": null
            }]
        }))
        .unwrap();
        assert_eq!(chunk.id, "chatcmpl-1");
        assert_eq!(chunk.choices[0].delta.content.as_deref(), Some("The End..."));
        assert_eq!(chunk.choices[0].finish_reason, None);
    }
}
