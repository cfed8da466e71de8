//! User message extraction and de-duplication
//!
//! Codex records each prompt twice: as a `response_item` user message and as
//! a `user_message` event. The two copies can differ in whitespace and in
//! whether attachment placeholders (`[Image #1]`) survived. This module
//! decides when two copies are the same turn and which copy to keep.

use crate::chunks::attachments::{attachment_from_data_url, fingerprint};
use crate::config::AttachmentLimits;
use crate::ingest::entry::{ContentBlock, EventPayload, LogEntry, MessageRole, ResponseItemPayload};
use crate::types::{ContentSource, UserAttachment, UserChunk};
use chrono::{DateTime, Utc};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(?:Image|Attachment) #\d+\]").expect("placeholder pattern is valid")
});

/// Detect CLI-injected context sent with the "user" role.
///
/// These blocks carry environment and instruction context, not human input.
pub fn is_system_injected_context(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.starts_with("<environment_context>")
        || trimmed.starts_with("<user_shell_command>")
        || trimmed.starts_with("<INSTRUCTIONS>")
        || trimmed.starts_with("<user_instructions>")
        || trimmed.starts_with("<system")
        || trimmed.starts_with("# AGENTS.md instructions for")
}

/// Collapse every run of whitespace to one space and trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn placeholder_count(text: &str) -> usize {
    PLACEHOLDER_RE.find_iter(text).count()
}

pub fn strip_placeholders(text: &str) -> String {
    PLACEHOLDER_RE.replace_all(text, " ").into_owned()
}

/// Whether two user texts are the same turn.
///
/// Equal after whitespace normalization, or equal and non-empty once
/// placeholders are stripped. Two texts that are nothing but placeholders
/// match only with the same positive placeholder count.
pub fn are_equivalent(a: &str, b: &str) -> bool {
    if normalize_whitespace(a) == normalize_whitespace(b) {
        return true;
    }

    let stripped_a = normalize_whitespace(&strip_placeholders(a));
    let stripped_b = normalize_whitespace(&strip_placeholders(b));
    if !stripped_a.is_empty() && stripped_a == stripped_b {
        return true;
    }

    if stripped_a.is_empty() && stripped_b.is_empty() {
        let count = placeholder_count(a);
        return count > 0 && count == placeholder_count(b);
    }

    false
}

/// One copy of a user turn, from either channel.
#[derive(Debug, Clone, PartialEq)]
pub struct UserCandidate {
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub source: ContentSource,
    pub attachments: Vec<UserAttachment>,
}

/// Extract the user turn carried by an entry, if any.
///
/// Returns `None` for non-user entries and for user entries whose text is
/// empty once injected context is removed.
pub fn user_candidate(entry: &LogEntry, limits: &AttachmentLimits) -> Option<UserCandidate> {
    let (content, source, attachments) = match entry {
        LogEntry::ResponseItem(item) => match &item.payload {
            ResponseItemPayload::Message(msg) if msg.role == MessageRole::User => {
                let text = msg
                    .text_blocks()
                    .filter(|block| !is_system_injected_context(block))
                    .collect::<Vec<_>>()
                    .join("\n");
                let attachments = msg
                    .content
                    .iter()
                    .filter_map(|block| match block {
                        ContentBlock::InputImage { image_url } => {
                            attachment_from_data_url(image_url, limits)
                        }
                        _ => None,
                    })
                    .collect();
                (text, ContentSource::Response, attachments)
            }
            _ => return None,
        },
        LogEntry::EventMsg(event) => match &event.payload {
            EventPayload::UserMessage { message, images } => {
                let text = if is_system_injected_context(message) {
                    String::new()
                } else {
                    message.clone()
                };
                let attachments = images
                    .iter()
                    .filter_map(|url| attachment_from_data_url(url, limits))
                    .collect();
                (text, ContentSource::Event, attachments)
            }
            _ => return None,
        },
        _ => return None,
    };

    let content = content.trim().to_string();
    if content.is_empty() {
        return None;
    }

    Some(UserCandidate {
        content,
        timestamp: entry.timestamp(),
        source,
        attachments: dedup_attachments(attachments),
    })
}

fn dedup_attachments(attachments: Vec<UserAttachment>) -> Vec<UserAttachment> {
    let mut seen = HashSet::new();
    attachments
        .into_iter()
        .filter(|a| seen.insert(fingerprint(a)))
        .collect()
}

/// The user turn waiting to be emitted.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingUser {
    candidate: UserCandidate,
    fingerprints: HashSet<String>,
}

impl PendingUser {
    pub fn new(candidate: UserCandidate) -> Self {
        let fingerprints = candidate.attachments.iter().map(fingerprint).collect();
        Self {
            candidate,
            fingerprints,
        }
    }

    pub fn is_equivalent(&self, other: &UserCandidate) -> bool {
        are_equivalent(&self.candidate.content, &other.content)
    }

    /// Fold an equivalent copy into this turn.
    ///
    /// The copy with more placeholders wins the text; on a tie the
    /// response-sourced copy wins. Attachments are unioned by fingerprint.
    /// The earliest timestamp is kept.
    pub fn merge(&mut self, other: UserCandidate) {
        let ours = placeholder_count(&self.candidate.content);
        let theirs = placeholder_count(&other.content);
        let take_other = theirs > ours
            || (theirs == ours
                && other.source == ContentSource::Response
                && self.candidate.source == ContentSource::Event);

        if take_other {
            self.candidate.content = other.content;
            self.candidate.source = other.source;
        }
        if other.timestamp < self.candidate.timestamp {
            self.candidate.timestamp = other.timestamp;
        }

        for attachment in other.attachments {
            if self.fingerprints.insert(fingerprint(&attachment)) {
                self.candidate.attachments.push(attachment);
            }
        }
    }

    pub fn into_chunk(self) -> UserChunk {
        UserChunk {
            content: self.candidate.content,
            timestamp: self.candidate.timestamp,
            attachments: self.candidate.attachments,
        }
    }
}
