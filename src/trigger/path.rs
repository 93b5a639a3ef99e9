use std::collections::HashMap;

use crate::error::{Result, ServerError};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// Firestore 文档路径模式，例如 `device_tokens/{tokenId}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl DocumentPattern {
    pub fn parse(pattern: &str) -> Result<Self> {
        let trimmed = pattern.trim_matches('/');
        if trimmed.is_empty() {
            return Err(ServerError::Configuration(
                "document pattern must not be empty".to_string(),
            ));
        }

        let mut segments = Vec::new();
        for part in trimmed.split('/') {
            if part.is_empty() {
                return Err(ServerError::Configuration(format!(
                    "document pattern has an empty segment: {}",
                    pattern
                )));
            }
            if let Some(name) = part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                if name.is_empty() {
                    return Err(ServerError::Configuration(format!(
                        "document pattern has an unnamed parameter: {}",
                        pattern
                    )));
                }
                segments.push(Segment::Param(name.to_string()));
            } else {
                segments.push(Segment::Literal(part.to_string()));
            }
        }

        Ok(Self {
            raw: trimmed.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// 匹配文档路径，返回路径参数
    ///
    /// 接受完整资源名（`projects/p/databases/d/documents/...`）、
    /// CloudEvent subject（`documents/...`）或相对路径。
    pub fn matches(&self, document: &str) -> Option<HashMap<String, String>> {
        let relative = relative_document_path(document);
        let parts: Vec<&str> = relative.split('/').collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            if part.is_empty() {
                return None;
            }
            match segment {
                Segment::Literal(lit) if lit == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => {
                    params.insert(name.clone(), part.to_string());
                }
            }
        }
        Some(params)
    }

    /// 模式中最后一个参数名（作为记录 ID）
    pub fn record_param(&self) -> Option<&str> {
        self.segments.iter().rev().find_map(|s| match s {
            Segment::Param(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }
}

/// 去掉 `documents/` 或 `projects/{p}/databases/{db}/documents/` 前缀，得到集合内的相对路径
///
/// 只剥离根前缀；路径内部名为 `documents` 的集合保持不变。
pub fn relative_document_path(document: &str) -> &str {
    let document = document.trim_matches('/');
    if let Some(rest) = document.strip_prefix("documents/") {
        return rest;
    }

    let parts: Vec<&str> = document.splitn(6, '/').collect();
    match parts.as_slice() {
        ["projects", _, "databases", _, "documents", rest] => *rest,
        _ => document,
    }
}
