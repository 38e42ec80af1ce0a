pub mod uci;

#[cfg(test)]
pub(crate) mod scripted;

use std::ops::RangeInclusive;

use async_trait::async_trait;
use log::debug;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{CoordinatorError, EngineError};

/// Parameter names a client may change, anything else is ignored.
pub const ALLOWED_PARAMETERS: [&str; 4] = ["threads", "hashSizeMb", "skillLevel", "variantName"];

const THREADS_RANGE: RangeInclusive<u32> = 1..=512;
const HASH_RANGE: RangeInclusive<u32> = 1..=33_554_432;
const SKILL_RANGE: RangeInclusive<u32> = 0..=20;

/// A search engine that can be pointed at a position and asked for moves.
#[async_trait]
pub trait SearchEngine: Send {
    async fn set_position(&mut self, fen: &str) -> Result<(), EngineError>;

    /// `None` when the position has no legal move.
    async fn best_move(&mut self) -> Result<Option<String>, EngineError>;

    /// Best `count` moves, strongest first.
    async fn top_moves(&mut self, count: usize) -> Result<Vec<TopMove>, EngineError>;

    fn parameters(&self) -> EngineParameters;

    async fn set_parameters(&mut self, patch: &ParameterPatch) -> Result<(), EngineError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopMove {
    #[serde(rename = "move")]
    pub uci: String,
    pub centipawn: Option<i32>,
    pub mate: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineParameters {
    pub threads: u32,
    pub hash_size_mb: u32,
    pub skill_level: u32,
    pub variant_name: Option<String>,
}

impl Default for EngineParameters {
    fn default() -> Self {
        EngineParameters {
            threads: 1,
            hash_size_mb: 16,
            skill_level: 1,
            variant_name: None,
        }
    }
}

impl EngineParameters {
    pub fn apply(&mut self, patch: &ParameterPatch) {
        if let Some(threads) = patch.threads {
            self.threads = threads;
        }
        if let Some(hash_size_mb) = patch.hash_size_mb {
            self.hash_size_mb = hash_size_mb;
        }
        if let Some(skill_level) = patch.skill_level {
            self.skill_level = skill_level;
        }
        if let Some(variant_name) = &patch.variant_name {
            self.variant_name = Some(variant_name.clone());
        }
    }

    pub fn uci_options(&self) -> Vec<(&'static str, String)> {
        ParameterPatch {
            threads: Some(self.threads),
            hash_size_mb: Some(self.hash_size_mb),
            skill_level: Some(self.skill_level),
            variant_name: self.variant_name.clone(),
        }
        .uci_options()
    }
}

/// The allow-listed subset of a parameter update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterPatch {
    pub threads: Option<u32>,
    pub hash_size_mb: Option<u32>,
    pub skill_level: Option<u32>,
    pub variant_name: Option<String>,
}

impl ParameterPatch {
    pub fn from_json(body: &Map<String, Value>) -> Result<ParameterPatch, CoordinatorError> {
        let mut patch = ParameterPatch::default();

        for (key, value) in body {
            match key.as_str() {
                "threads" => patch.threads = Some(int_in_range(key, value, THREADS_RANGE)?),
                "hashSizeMb" => patch.hash_size_mb = Some(int_in_range(key, value, HASH_RANGE)?),
                "skillLevel" => patch.skill_level = Some(int_in_range(key, value, SKILL_RANGE)?),
                "variantName" => match value.as_str().map(str::trim) {
                    Some(name) if !name.is_empty() => patch.variant_name = Some(name.to_string()),
                    _ => return Err(invalid(key, value)),
                },
                _ => debug!("ignoring engine parameter {key}"),
            }
        }

        Ok(patch)
    }

    pub fn is_empty(&self) -> bool {
        *self == ParameterPatch::default()
    }

    /// UCI option names and values for every field set in this patch.
    pub fn uci_options(&self) -> Vec<(&'static str, String)> {
        let mut options = Vec::new();

        if let Some(threads) = self.threads {
            options.push(("Threads", threads.to_string()));
        }
        if let Some(hash_size_mb) = self.hash_size_mb {
            options.push(("Hash", hash_size_mb.to_string()));
        }
        if let Some(skill_level) = self.skill_level {
            options.push(("Skill Level", skill_level.to_string()));
        }
        if let Some(variant_name) = &self.variant_name {
            options.push(("UCI_Variant", variant_name.clone()));
        }

        options
    }
}

fn invalid(key: &str, value: &Value) -> CoordinatorError {
    CoordinatorError::InvalidParameter(format!("{key} = {value}"))
}

fn int_in_range(
    key: &str,
    value: &Value,
    range: RangeInclusive<u32>,
) -> Result<u32, CoordinatorError> {
    let parsed = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };

    parsed
        .and_then(|n| u32::try_from(n).ok())
        .filter(|n| range.contains(n))
        .ok_or_else(|| invalid(key, value))
}
