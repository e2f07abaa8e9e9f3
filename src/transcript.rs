//! Client-side chat history: an append-only log of turns that can be cleared
//! or exported as JSON. Nothing here is persisted by the server.

use anyhow::{Context, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
    pub time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probs: Option<Vec<f32>>,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            time: now(),
            emotions: None,
            probs: None,
        }
    }

    pub fn assistant(content: impl Into<String>, emotions: Vec<String>, probs: Vec<f32>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            time: now(),
            emotions: Some(emotions),
            probs: if probs.is_empty() { None } else { Some(probs) },
        }
    }

    /// Assistant turn recording a failed exchange.
    pub fn assistant_error(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            time: now(),
            emotions: Some(Vec::new()),
            probs: None,
        }
    }

    /// Emotion badges, each with its score when one is aligned with it.
    pub fn badges(&self) -> Vec<(String, Option<f32>)> {
        let Some(emotions) = &self.emotions else {
            return Vec::new();
        };
        emotions
            .iter()
            .enumerate()
            .map(|(i, emo)| {
                let score = self.probs.as_ref().and_then(|p| p.get(i)).copied();
                (emo.clone(), score)
            })
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct Transcript {
    turns: Vec<ChatTurn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: ChatTurn) {
        self.turns.push(turn);
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn export_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.turns).context("failed to serialize transcript")
    }

    pub fn export_to(&self, path: &Path) -> Result<()> {
        fs::write(path, self.export_json()?)
            .with_context(|| format!("failed to write transcript to {}", path.display()))
    }

    /// Default export file name, e.g. `chat_20260101_120000.json`.
    pub fn export_file_name() -> String {
        format!("chat_{}.json", Local::now().format("%Y%m%d_%H%M%S"))
    }
}

/// Badge colour family for an emotion name.
pub fn badge_class(emotion: &str) -> &'static str {
    let e = emotion.to_lowercase();
    if e.contains("joy") || e.contains("excite") {
        "badge-joy"
    } else if e.contains("sad") || e.contains("grief") || e.contains("remorse") {
        "badge-sadness"
    } else if e.contains("anger") || e.contains("annoy") {
        "badge-anger"
    } else if e.contains("fear") || e.contains("nervous") {
        "badge-fear"
    } else if e.contains("disgust") {
        "badge-disgust"
    } else if e.contains("neutral") {
        "badge-neutral"
    } else {
        "badge-default"
    }
}

fn now() -> String {
    Local::now().format(TIME_FORMAT).to_string()
}
