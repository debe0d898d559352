//! Mapping between abstraction types and Groq-specific types

use crate::llm::core::types::{
    FinishReason, GenerateRequest, Message, StreamEvent, UsageMetadata,
};

use super::types::{ChatCompletionChunk, ChatCompletionRequest, GroqMessage};

/// Convert our abstraction request to Groq's request format
///
/// The request's `system` instructions become the leading system message,
/// followed by the conversation in order.
pub fn to_groq_request(request: GenerateRequest, model: &str) -> ChatCompletionRequest {
    let instructions = request.system.map(Message::system);

    ChatCompletionRequest {
        model: model.to_string(),
        messages: instructions
            .into_iter()
            .chain(request.messages)
            .map(to_groq_message)
            .collect(),
        max_tokens: request.config.max_tokens,
        temperature: request.config.temperature,
        top_p: request.config.top_p,
        stop: request.config.stop_sequences,
        stream: true,
    }
}

fn to_groq_message(message: Message) -> GroqMessage {
    GroqMessage {
        role: message.role.as_str().to_string(),
        content: message.content,
    }
}

/// Tracks whether the stream has started, across chunks
#[derive(Debug, Default)]
pub struct StreamState {
    started: bool,
}

/// Convert a Groq chunk to our abstraction's events
///
/// One chunk can carry the first token, text and the finish reason at once,
/// so a vector is returned.
pub fn from_groq_chunk(chunk: ChatCompletionChunk, state: &mut StreamState) -> Vec<StreamEvent> {
    let mut events = Vec::new();

    if !state.started {
        state.started = true;
        events.push(StreamEvent::MessageStart {
            id: chunk.id.clone(),
            model: chunk.model.clone(),
        });
    }

    let usage = chunk
        .x_groq
        .and_then(|x| x.usage)
        .or(chunk.usage)
        .map(|u| UsageMetadata::new(u.prompt_tokens, u.completion_tokens));

    // Only the first choice is requested (n defaults to 1)
    if let Some(choice) = chunk.choices.into_iter().find(|c| c.index == 0) {
        if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
            events.push(StreamEvent::TextDelta { text });
        }

        if let Some(reason) = choice.finish_reason {
            events.push(StreamEvent::MessageEnd {
                finish_reason: FinishReason::from_provider(&reason),
                usage,
            });
        }
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::core::config::GenerationConfig;
    use crate::llm::core::types::MessageRole;

    fn chunk(json: &str) -> ChatCompletionChunk {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_to_groq_request_puts_instructions_first() {
        let request = GenerateRequest {
            messages: vec![
                Message::system("You are a helpful customer support agent for a crypto platform."),
                Message::user("hello"),
                Message::assistant("hi"),
            ],
            config: GenerationConfig::new(300).with_temperature(0.2),
            system: Some("Answer user questions about fiat-to-crypto transactions.".to_string()),
        };

        let groq = to_groq_request(request, "llama-3.3-70b-versatile");

        assert_eq!(groq.model, "llama-3.3-70b-versatile");
        assert_eq!(groq.max_tokens, 300);
        assert_eq!(groq.temperature, Some(0.2));
        assert!(groq.stream);

        let roles: Vec<&str> = groq.messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "system", "user", "assistant"]);
        assert!(groq.messages[0].content.contains("fiat-to-crypto"));
        assert_eq!(groq.messages[2].content, "hello");
    }

    #[test]
    fn test_to_groq_request_without_instructions() {
        let request = GenerateRequest {
            messages: vec![Message::new(MessageRole::User, "gm")],
            config: GenerationConfig::default(),
            system: None,
        };

        let groq = to_groq_request(request, "m");
        assert_eq!(groq.messages.len(), 1);
        assert_eq!(groq.messages[0].role, "user");
    }

    #[test]
    fn test_from_groq_chunk_sequence() {
        let mut state = StreamState::default();

        let first = from_groq_chunk(
            chunk(r#"{"id":"c1","model":"m","choices":[{"index":0,"delta":{"role":"assistant","content":""},"finish_reason":null}]}"#),
            &mut state,
        );
        assert_eq!(first.len(), 1);
        assert!(matches!(&first[0], StreamEvent::MessageStart { id, .. } if id == "c1"));

        let middle = from_groq_chunk(
            chunk(r#"{"id":"c1","model":"m","choices":[{"index":0,"delta":{"content":"Hi"},"finish_reason":null}]}"#),
            &mut state,
        );
        assert_eq!(middle.len(), 1);
        assert!(matches!(&middle[0], StreamEvent::TextDelta { text } if text == "Hi"));

        let last = from_groq_chunk(
            chunk(r#"{"id":"c1","model":"m","choices":[{"index":0,"delta":{},"finish_reason":"stop"}],"x_groq":{"usage":{"prompt_tokens":10,"completion_tokens":2}}}"#),
            &mut state,
        );
        match &last[0] {
            StreamEvent::MessageEnd {
                finish_reason,
                usage,
            } => {
                assert_eq!(*finish_reason, FinishReason::Stop);
                assert_eq!(usage.unwrap().total_tokens, 12);
            }
            other => panic!("Expected MessageEnd, got {:?}", other),
        }
    }

    #[test]
    fn test_from_groq_chunk_without_choices() {
        let mut state = StreamState { started: true };
        let events = from_groq_chunk(chunk(r#"{"id":"c1","choices":[]}"#), &mut state);
        assert!(events.is_empty());
    }
}
