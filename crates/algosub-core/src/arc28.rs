//! ARC-28 event schemas and log decoding.
//!
//! An event schema declares a name and an ordered argument list; its
//! *selector* is the first 4 bytes of the SHA-512/256 digest of the
//! canonical signature string `Name(type1,type2,…)`. A transaction log
//! whose leading 4 bytes match a declared selector is decoded into an
//! [`Arc28Event`](crate::types::Arc28Event); everything else is skipped.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512_256};

use crate::error::DecodeError;
use crate::types::Arc28Event;

// ─── Schema declarations ──────────────────────────────────────────────────────

/// Supported ABI argument types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Arc28ArgType {
    #[serde(rename = "uint64")]
    Uint64,
    #[serde(rename = "uint32")]
    Uint32,
    #[serde(rename = "byte")]
    Byte,
    /// 32-byte identifier, surfaced base64-encoded.
    #[serde(rename = "address")]
    Address,
    /// Fixed-length blob, surfaced base64-encoded.
    #[serde(rename = "byte[]")]
    FixedBytes(usize),
    /// 16-bit big-endian length prefix followed by raw bytes.
    #[serde(rename = "string")]
    Str,
}

impl Arc28ArgType {
    /// The canonical type name used inside signatures.
    pub fn signature_name(&self) -> String {
        match self {
            Self::Uint64 => "uint64".into(),
            Self::Uint32 => "uint32".into(),
            Self::Byte => "byte".into(),
            Self::Address => "address".into(),
            Self::FixedBytes(n) => format!("byte[{n}]"),
            Self::Str => "string".into(),
        }
    }
}

/// A single declared argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arc28EventArg {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Arc28ArgType,
}

/// A declared event: name plus ordered argument list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arc28EventSpec {
    pub name: String,
    pub args: Vec<Arc28EventArg>,
}

impl Arc28EventSpec {
    /// The canonical signature string, `Name(type1,type2,…)`.
    pub fn signature(&self) -> String {
        let types: Vec<String> = self.args.iter().map(|a| a.ty.signature_name()).collect();
        format!("{}({})", self.name, types.join(","))
    }
}

/// A named group of event declarations. The group name is carried on every
/// decoded event so consumers can tell overlapping vocabularies apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arc28EventGroup {
    #[serde(rename = "group-name")]
    pub group_name: String,
    pub events: Vec<Arc28EventSpec>,
}

/// Compute the 4-byte selector for a canonical signature string.
pub fn selector(signature: &str) -> [u8; 4] {
    let digest = Sha512_256::digest(signature.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&digest[..4]);
    out
}

// ─── Compiled selector table ──────────────────────────────────────────────────

struct CompiledEvent {
    group_name: String,
    signature: String,
    spec: Arc28EventSpec,
}

/// The selector → schema lookup table, built once per subscription.
///
/// Selector collisions across declarations resolve first-declared-wins.
#[derive(Default)]
pub struct CompiledEventGroups {
    by_selector: HashMap<[u8; 4], CompiledEvent>,
}

impl CompiledEventGroups {
    pub fn compile(groups: &[Arc28EventGroup]) -> Self {
        let mut by_selector: HashMap<[u8; 4], CompiledEvent> = HashMap::new();
        for group in groups {
            for spec in &group.events {
                let signature = spec.signature();
                let sel = selector(&signature);
                by_selector.entry(sel).or_insert_with(|| CompiledEvent {
                    group_name: group.group_name.clone(),
                    signature,
                    spec: spec.clone(),
                });
            }
        }
        Self { by_selector }
    }

    pub fn is_empty(&self) -> bool {
        self.by_selector.is_empty()
    }

    /// Decode every log that matches a declared selector.
    ///
    /// Logs shorter than 4 bytes, logs with no matching selector, and logs
    /// whose argument tail cannot be decoded produce no entry; the last case
    /// is logged as a diagnostic.
    pub fn decode_logs(&self, txn_id: &str, logs: &[String]) -> Vec<Arc28Event> {
        if self.by_selector.is_empty() {
            return vec![];
        }
        let mut events = Vec::new();
        for log in logs {
            let bytes = match BASE64.decode(log) {
                Ok(b) => b,
                Err(e) => {
                    let err = DecodeError::InvalidBase64(e.to_string());
                    tracing::warn!(txn = txn_id, error = %err, "skipping undecodable log");
                    continue;
                }
            };
            if bytes.len() < 4 {
                continue;
            }
            let mut sel = [0u8; 4];
            sel.copy_from_slice(&bytes[..4]);
            let Some(compiled) = self.by_selector.get(&sel) else {
                continue;
            };
            match decode_args(&compiled.spec, &bytes[4..]) {
                Ok(args) => events.push(Arc28Event {
                    group_name: compiled.group_name.clone(),
                    event_name: compiled.spec.name.clone(),
                    signature: compiled.signature.clone(),
                    args,
                }),
                Err(e) => {
                    tracing::warn!(
                        txn = txn_id,
                        event = %compiled.spec.name,
                        selector = %hex::encode(sel),
                        error = %e,
                        "skipping log with undecodable arguments"
                    );
                }
            }
        }
        events
    }
}

fn decode_args(
    spec: &Arc28EventSpec,
    data: &[u8],
) -> Result<HashMap<String, serde_json::Value>, DecodeError> {
    let mut args = HashMap::with_capacity(spec.args.len());
    let mut offset = 0usize;

    let mut take = |len: usize, arg: &str| -> Result<std::ops::Range<usize>, DecodeError> {
        let end = offset.checked_add(len).filter(|e| *e <= data.len()).ok_or_else(|| {
            DecodeError::UnexpectedEnd {
                event: spec.name.clone(),
                arg: arg.to_string(),
            }
        })?;
        let range = offset..end;
        offset = end;
        Ok(range)
    };

    for arg in &spec.args {
        let value = match arg.ty {
            Arc28ArgType::Uint64 => {
                let r = take(8, &arg.name)?;
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&data[r]);
                serde_json::Value::from(u64::from_be_bytes(buf))
            }
            Arc28ArgType::Uint32 => {
                let r = take(4, &arg.name)?;
                let mut buf = [0u8; 4];
                buf.copy_from_slice(&data[r]);
                serde_json::Value::from(u32::from_be_bytes(buf))
            }
            Arc28ArgType::Byte => {
                let r = take(1, &arg.name)?;
                serde_json::Value::from(data[r.start])
            }
            Arc28ArgType::Address => {
                let r = take(32, &arg.name)?;
                serde_json::Value::from(BASE64.encode(&data[r]))
            }
            Arc28ArgType::FixedBytes(n) => {
                let r = take(n, &arg.name)?;
                serde_json::Value::from(BASE64.encode(&data[r]))
            }
            Arc28ArgType::Str => {
                let r = take(2, &arg.name)?;
                let len = u16::from_be_bytes([data[r.start], data[r.start + 1]]) as usize;
                let r = take(len, &arg.name)?;
                serde_json::Value::from(String::from_utf8_lossy(&data[r]).into_owned())
            }
        };
        args.insert(arg.name.clone(), value);
    }
    Ok(args)
}
