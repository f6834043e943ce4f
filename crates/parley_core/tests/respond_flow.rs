use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

use parley_core::config::{ChatConfig, DefaultsConfig};
use parley_core::context::{AttachmentView, ReplyRef};
use parley_core::model::{Architecture, Endpoint, Modality, Pricing};
use parley_core::respond::{EMPTY_CONTEXT_MESSAGE, GENERATION_FAILED_MESSAGE, NO_MODEL_MESSAGE};
use parley_core::{
    AgentIdentity, BackendResponse, ChatRole, ContentPart, CoreError, CurationPolicy,
    GenerationBackend, GenerationRequest, InMemoryPreferenceStore, MessageNode, MessageSource,
    Model, ModelCatalog, ModelRegistry, Outcome, Responder, Result, Router, Usage, UserDirectory,
};

struct FixedRegistry(Vec<Model>);

#[async_trait]
impl ModelRegistry for FixedRegistry {
    async fn list_models(&self) -> Result<Vec<Model>> {
        Ok(self.0.clone())
    }

    async fn list_endpoints(&self, _model: &Model) -> Result<Option<Vec<Endpoint>>> {
        Ok(Some(vec![Endpoint {
            name: "Google | gemini".to_string(),
            provider_name: "Google".to_string(),
            status: 0,
            context_length: Some(1_000_000),
        }]))
    }
}

#[derive(Default)]
struct FakeBackend {
    replies: Mutex<Vec<std::result::Result<String, String>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl FakeBackend {
    fn replying(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().rev().map(|r| Ok(r.to_string())).collect()),
            ..Default::default()
        }
    }

    fn failing() -> Self {
        Self {
            replies: Mutex::new(vec![Err("upstream exploded".to_string())]),
            ..Default::default()
        }
    }
}

#[async_trait]
impl GenerationBackend for FakeBackend {
    async fn complete(&self, request: GenerationRequest) -> Result<BackendResponse> {
        let model_id = request.model_id.clone();
        self.requests.lock().push(request);
        match self.replies.lock().pop() {
            Some(Ok(text)) => Ok(BackendResponse {
                text,
                model_id,
                usage: Usage {
                    input_tokens: Some(2048),
                    output_tokens: Some(12),
                },
            }),
            Some(Err(cause)) => Err(CoreError::GenerationFailed { model_id, cause }),
            None => Err(CoreError::GenerationFailed {
                model_id,
                cause: "no scripted reply".to_string(),
            }),
        }
    }
}

#[derive(Default)]
struct FakeSource {
    messages: HashMap<String, MessageNode>,
}

#[async_trait]
impl MessageSource for FakeSource {
    async fn referenced_message(&self, message: &MessageNode) -> Result<Option<MessageNode>> {
        Ok(message
            .reply_to
            .as_ref()
            .and_then(|r| self.messages.get(&r.message_id).cloned()))
    }

    async fn thread_history(&self, message: &MessageNode, _limit: usize) -> Result<Vec<MessageNode>> {
        Ok(vec![message.clone()])
    }
}

fn gemini(id: &str, name: &str, prompt: &str) -> Model {
    Model {
        id: id.to_string(),
        name: name.to_string(),
        canonical_slug: id.to_string(),
        created: Utc::now().timestamp() - 7 * 24 * 60 * 60,
        description: "A test model".to_string(),
        context_length: 1_000_000,
        architecture: Architecture {
            input_modalities: vec![Modality::Text, Modality::Image],
            output_modalities: vec![Modality::Text],
        },
        pricing: Pricing {
            prompt: Some(prompt.to_string()),
            completion: Some("0.000002".to_string()),
            image: None,
        },
        endpoints: Vec::new(),
    }
}

fn agent() -> AgentIdentity {
    AgentIdentity::new("900", "Parley")
}

fn message(id: &str, author: &str, text: &str, reply_to: Option<&str>) -> MessageNode {
    MessageNode {
        id: id.to_string(),
        channel_id: "chan".to_string(),
        author_id: author.to_string(),
        is_from_agent: author == "900",
        text: text.to_string(),
        reply_to: reply_to.map(|r| ReplyRef {
            channel_id: "chan".to_string(),
            message_id: r.to_string(),
        }),
        ..Default::default()
    }
}

async fn responder(models: Vec<Model>, backend: Arc<FakeBackend>, chat: ChatConfig) -> Responder {
    let catalog = Arc::new(ModelCatalog::new(
        Arc::new(FixedRegistry(models)),
        CurationPolicy::default(),
        25,
    ));
    catalog.refresh().await;

    let users = UserDirectory::new(
        Arc::new(InMemoryPreferenceStore::new()),
        catalog.clone(),
        DefaultsConfig::default(),
    );
    let router = Router::new(catalog, backend);
    Responder::new(users, router, chat)
}

#[tokio::test]
async fn empty_catalog_yields_no_model() {
    let backend = Arc::new(FakeBackend::replying(&["unused"]));
    let responder = responder(Vec::new(), backend.clone(), ChatConfig::default()).await;

    let outcome = responder
        .respond(&FakeSource::default(), &agent(), &message("1", "7", "hello", None))
        .await;

    assert!(matches!(outcome, Outcome::NoModel));
    assert_eq!(outcome.user_message(), Some(NO_MODEL_MESSAGE));
    assert!(backend.requests.lock().is_empty());
}

#[tokio::test]
async fn reply_chain_is_generated_and_chunked() {
    let backend = Arc::new(FakeBackend::replying(&[
        "<think>let me see</think>\nParis is the capital.",
    ]));
    let responder = responder(
        vec![
            gemini("google/gemini-pro", "Google: Gemini Pro", "0.000004"),
            gemini("google/gemini-flash", "Google: Gemini Flash", "0.000001"),
        ],
        backend.clone(),
        ChatConfig::default(),
    )
    .await;

    let mut first = message("1", "7", "<@900> what is the capital of France?", None);
    first.attachments.push(AttachmentView {
        url: "https://cdn.test/map.png".to_string(),
        filename: "map.png".to_string(),
        content_type: Some("image/png".to_string()),
    });
    let second = message("2", "900", "Do you mean today?", Some("1"));
    let third = message("3", "7", "yes", Some("2"));
    let source = FakeSource {
        messages: [first, second]
            .into_iter()
            .map(|m| (m.id.clone(), m))
            .collect(),
    };

    let Outcome::Reply(reply) = responder.respond(&source, &agent(), &third).await else {
        panic!("expected a reply");
    };

    assert_eq!(reply.result.model_id, "google/gemini-flash");
    assert_eq!(reply.chunks.len(), 1);
    assert_eq!(reply.chunks[0].body, "Paris is the capital.");
    assert_eq!(
        reply.chunks[0].footer.as_deref(),
        Some("-# Google: Gemini Flash - 2,048 input tokens - 12 output tokens")
    );

    let requests = backend.requests.lock();
    let request = &requests[0];
    assert_eq!(request.system_prompt, "You are a helpful assistant.");
    let roles: Vec<ChatRole> = request.messages.iter().map(|t| t.role()).collect();
    assert_eq!(
        roles,
        vec![ChatRole::User, ChatRole::Assistant, ChatRole::User]
    );
    assert_eq!(
        request.messages[0].content(),
        &[
            ContentPart::text("what is the capital of France?"),
            ContentPart::Image {
                url: "https://cdn.test/map.png".to_string()
            },
        ]
    );
}

#[tokio::test]
async fn long_replies_are_split() {
    let long = format!("{}\n{}", "a".repeat(30), "b".repeat(30));
    let backend = Arc::new(FakeBackend::replying(&[long.as_str()]));
    let chat = ChatConfig {
        chunk_size: 40,
        ..ChatConfig::default()
    };
    let responder = responder(
        vec![gemini("google/gemini-flash", "Google: Gemini Flash", "0.000001")],
        backend,
        chat,
    )
    .await;

    let Outcome::Reply(reply) = responder
        .respond(&FakeSource::default(), &agent(), &message("1", "7", "go", None))
        .await
    else {
        panic!("expected a reply");
    };

    assert_eq!(reply.chunks.len(), 2);
    assert!(reply.chunks[0].footer.is_none());
    assert!(reply.chunks[1].footer.is_some());
    let joined: String = reply.chunks.iter().map(|c| c.body.as_str()).collect();
    assert_eq!(joined, long);
}

#[tokio::test]
async fn mention_only_message_is_empty_context() {
    let backend = Arc::new(FakeBackend::replying(&["unused"]));
    let responder = responder(
        vec![gemini("google/gemini-flash", "Google: Gemini Flash", "0.000001")],
        backend,
        ChatConfig::default(),
    )
    .await;

    let outcome = responder
        .respond(&FakeSource::default(), &agent(), &message("1", "7", "<@900>", None))
        .await;
    assert!(matches!(outcome, Outcome::EmptyContext));
    assert_eq!(outcome.user_message(), Some(EMPTY_CONTEXT_MESSAGE));
}

#[tokio::test]
async fn failed_generation_fails_over_to_next_model() {
    let backend = Arc::new(FakeBackend::failing());
    let responder = responder(
        vec![
            gemini("google/gemini-pro", "Google: Gemini Pro", "0.000004"),
            gemini("google/gemini-flash", "Google: Gemini Flash", "0.000001"),
        ],
        backend.clone(),
        ChatConfig::default(),
    )
    .await;
    let leaf = message("1", "7", "hello", None);

    let outcome = responder.respond(&FakeSource::default(), &agent(), &leaf).await;
    assert!(matches!(outcome, Outcome::GenerationFailed));
    assert_eq!(outcome.user_message(), Some(GENERATION_FAILED_MESSAGE));

    // the cheapest model was blacklisted, so the next attempt uses the other one
    backend.replies.lock().push(Ok("hi".to_string()));
    let Outcome::Reply(reply) = responder.respond(&FakeSource::default(), &agent(), &leaf).await
    else {
        panic!("expected a reply");
    };
    assert_eq!(reply.result.model_id, "google/gemini-pro");
}

#[tokio::test]
async fn thread_title_is_generated_from_exchange() {
    let long_title = format!("  {}  ", "T".repeat(150));
    let backend = Arc::new(FakeBackend::replying(&[
        "Sure, here is a haiku.",
        long_title.as_str(),
    ]));
    let responder = responder(
        vec![gemini("google/gemini-flash", "Google: Gemini Flash", "0.000001")],
        backend.clone(),
        ChatConfig::default(),
    )
    .await;

    let Outcome::Reply(reply) = responder
        .respond(&FakeSource::default(), &agent(), &message("1", "7", "write a haiku", None))
        .await
    else {
        panic!("expected a reply");
    };

    let title = responder.title_for(&reply).await.unwrap();
    assert_eq!(title.chars().count(), 100);

    let requests = backend.requests.lock();
    assert!(requests[1].system_prompt.starts_with("You are a youtube video title generator."));
    assert_eq!(requests[1].messages.len(), 2);
    assert_eq!(requests[1].messages[1].role(), ChatRole::Assistant);
}
