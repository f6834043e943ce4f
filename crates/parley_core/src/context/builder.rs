//! ContextBuilder: walks a message's reply chain or thread into turns

use tracing::{debug, warn};

use super::{ConversationTurn, MessageNode, MessageSource, TurnFormatter};
use crate::config::ChatConfig;

/// Assembles the ordered conversation leading up to a message
///
/// Thread messages use the thread's recent history. Anything else follows
/// reply references upwards until a message without one, or until
/// `max_depth` messages have been collected.
pub struct ContextBuilder<'a> {
    source: &'a dyn MessageSource,
    formatter: &'a dyn TurnFormatter,
    max_depth: usize,
    thread_limit: usize,
}

impl<'a> ContextBuilder<'a> {
    pub fn new(source: &'a dyn MessageSource, formatter: &'a dyn TurnFormatter) -> Self {
        let defaults = ChatConfig::default();
        Self {
            source,
            formatter,
            max_depth: defaults.max_reply_depth,
            thread_limit: defaults.thread_history_limit,
        }
    }

    pub fn with_config(mut self, config: &ChatConfig) -> Self {
        self.max_depth = config.max_reply_depth.max(1);
        self.thread_limit = config.thread_history_limit;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    pub fn with_thread_limit(mut self, limit: usize) -> Self {
        self.thread_limit = limit;
        self
    }

    /// Build the turns for `leaf`, oldest first.
    pub async fn build(&self, leaf: &MessageNode) -> Vec<ConversationTurn> {
        let messages = self.collect(leaf).await;
        messages
            .iter()
            .filter_map(|m| self.formatter.format(m))
            .collect()
    }

    /// Gather the raw messages in conversation order.
    async fn collect(&self, leaf: &MessageNode) -> Vec<MessageNode> {
        // newest first while walking
        let mut chain: Vec<MessageNode> = Vec::new();
        let mut prefix: Vec<MessageNode> = Vec::new();
        let mut current = leaf.clone();

        loop {
            if current.thread.is_thread() {
                prefix = self.thread_messages(&current).await;
                break;
            }

            let has_reply = current.reply_to.is_some();
            chain.push(current);

            if !has_reply {
                break;
            }
            if chain.len() >= self.max_depth {
                debug!(
                    leaf = %leaf.id,
                    depth = chain.len(),
                    "reply chain truncated at maximum depth"
                );
                break;
            }

            let Some(child) = chain.last() else { break };
            match self.source.referenced_message(child).await {
                Ok(Some(parent)) => current = parent,
                Ok(None) => break,
                Err(e) => {
                    warn!(message = %child.id, error = %e, "could not resolve replied-to message");
                    break;
                }
            }
        }

        chain.reverse();
        prefix.extend(chain);
        prefix
    }

    async fn thread_messages(&self, message: &MessageNode) -> Vec<MessageNode> {
        match self.source.thread_history(message, self.thread_limit).await {
            Ok(history) if !history.is_empty() => history,
            Ok(_) => vec![message.clone()],
            Err(e) => {
                warn!(message = %message.id, error = %e, "could not fetch thread history");
                vec![message.clone()]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{
        AgentIdentity, ChatRole, MessageFormatter, ReplyRef, ThreadMembership,
    };
    use crate::error::{CoreError, Result};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeSource {
        messages: HashMap<String, MessageNode>,
        thread: Vec<MessageNode>,
        broken: Vec<String>,
    }

    impl FakeSource {
        fn with(messages: &[MessageNode]) -> Self {
            Self {
                messages: messages.iter().map(|m| (m.id.clone(), m.clone())).collect(),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl MessageSource for FakeSource {
        async fn referenced_message(&self, message: &MessageNode) -> Result<Option<MessageNode>> {
            let Some(reply) = &message.reply_to else {
                return Ok(None);
            };
            if self.broken.contains(&reply.message_id) {
                return Err(CoreError::MessageFetchFailed {
                    message_id: reply.message_id.clone(),
                    cause: "deleted".to_string(),
                });
            }
            Ok(self.messages.get(&reply.message_id).cloned())
        }

        async fn thread_history(
            &self,
            _message: &MessageNode,
            limit: usize,
        ) -> Result<Vec<MessageNode>> {
            let skip = self.thread.len().saturating_sub(limit);
            Ok(self.thread[skip..].to_vec())
        }
    }

    fn message(id: &str, text: &str, reply_to: Option<&str>) -> MessageNode {
        MessageNode {
            id: id.to_string(),
            channel_id: "chan".to_string(),
            author_id: "7".to_string(),
            text: text.to_string(),
            reply_to: reply_to.map(|r| ReplyRef {
                channel_id: "chan".to_string(),
                message_id: r.to_string(),
            }),
            ..Default::default()
        }
    }

    fn formatter() -> MessageFormatter {
        MessageFormatter::text_only(AgentIdentity::new("42", "Parley"))
    }

    fn texts(turns: &[ConversationTurn]) -> Vec<String> {
        turns.iter().map(|t| t.text()).collect()
    }

    #[tokio::test]
    async fn test_reply_chain_is_oldest_first() {
        let a = message("a", "A", None);
        let mut b = message("b", "B", Some("a"));
        b.is_from_agent = true;
        let c = message("c", "C", Some("b"));
        let source = FakeSource::with(&[a, b]);
        let formatter = formatter();

        let turns = ContextBuilder::new(&source, &formatter).build(&c).await;
        assert_eq!(texts(&turns), vec!["A", "B", "C"]);
        assert_eq!(turns[1].role(), ChatRole::Assistant);
    }

    #[tokio::test]
    async fn test_empty_messages_are_skipped() {
        let a = message("a", "A", None);
        let b = message("b", "<@42>", Some("a"));
        let c = message("c", "C", Some("b"));
        let source = FakeSource::with(&[a, b]);
        let formatter = formatter();

        let turns = ContextBuilder::new(&source, &formatter).build(&c).await;
        assert_eq!(texts(&turns), vec!["A", "C"]);
    }

    #[tokio::test]
    async fn test_depth_limit_keeps_most_recent() {
        let mut messages = vec![message("m0", "0", None)];
        for i in 1..10 {
            messages.push(message(
                &format!("m{i}"),
                &i.to_string(),
                Some(&format!("m{}", i - 1)),
            ));
        }
        let leaf = messages.last().cloned().unwrap();
        let source = FakeSource::with(&messages);
        let formatter = formatter();

        let turns = ContextBuilder::new(&source, &formatter)
            .with_max_depth(3)
            .build(&leaf)
            .await;
        assert_eq!(texts(&turns), vec!["7", "8", "9"]);
    }

    #[tokio::test]
    async fn test_reply_cycle_terminates() {
        let a = message("a", "A", Some("b"));
        let b = message("b", "B", Some("a"));
        let source = FakeSource::with(&[a.clone(), b]);
        let formatter = formatter();

        let turns = ContextBuilder::new(&source, &formatter)
            .with_max_depth(5)
            .build(&a)
            .await;
        assert_eq!(turns.len(), 5);
    }

    #[tokio::test]
    async fn test_unresolvable_reference_stops_walk() {
        let b = message("b", "B", Some("gone"));
        let c = message("c", "C", Some("b"));
        let mut source = FakeSource::with(&[b]);
        source.broken.push("gone".to_string());
        let formatter = formatter();

        let turns = ContextBuilder::new(&source, &formatter).build(&c).await;
        assert_eq!(texts(&turns), vec!["B", "C"]);
    }

    #[tokio::test]
    async fn test_thread_membership_short_circuits() {
        let mut leaf = message("t3", "third", Some("elsewhere"));
        leaf.thread = ThreadMembership::Private;
        let mut source = FakeSource::default();
        source.thread = vec![
            message("t0", "zeroth", None),
            message("t1", "first", None),
            message("t2", "second", None),
            leaf.clone(),
        ];
        let formatter = formatter();

        let turns = ContextBuilder::new(&source, &formatter)
            .with_thread_limit(3)
            .build(&leaf)
            .await;
        assert_eq!(texts(&turns), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_reply_into_thread_uses_thread_history() {
        let mut root = message("t1", "thread start", None);
        root.thread = ThreadMembership::Public;
        let leaf = message("x", "outside reply", Some("t1"));
        let mut source = FakeSource::with(&[root.clone()]);
        source.thread = vec![root];
        let formatter = formatter();

        let turns = ContextBuilder::new(&source, &formatter).build(&leaf).await;
        assert_eq!(texts(&turns), vec!["thread start", "outside reply"]);
    }
}
