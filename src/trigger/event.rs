//! Firestore 触发事件解码
//!
//! 事件分发运行时通过 HTTP 以 CloudEvent 形式投递 Firestore 文档事件，
//! 支持 binary 模式（`ce-*` 请求头 + JSON body）和 structured 模式
//! （`application/cloudevents+json` 信封）。body 为 JSON 编码的 `DocumentEventData`。

use axum::http::{header, HeaderMap};
use serde::Deserialize;
use std::collections::HashMap;

use crate::error::{Result, ServerError};
use crate::trigger::path::DocumentPattern;

/// 文档创建事件类型
pub const DOCUMENT_CREATED_EVENT_TYPE: &str = "google.cloud.firestore.document.v1.created";
/// 带认证上下文的文档创建事件类型
pub const DOCUMENT_CREATED_WITH_AUTH_EVENT_TYPE: &str =
    "google.cloud.firestore.document.v1.created.withAuthContext";

const STRUCTURED_CONTENT_TYPE: &str = "application/cloudevents+json";

/// Firestore 类型化字段值
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum FirestoreValue {
    NullValue(serde_json::Value),
    BooleanValue(bool),
    IntegerValue(serde_json::Value),
    DoubleValue(f64),
    TimestampValue(String),
    StringValue(String),
    BytesValue(String),
    ReferenceValue(String),
    GeoPointValue(serde_json::Value),
    ArrayValue(serde_json::Value),
    MapValue(serde_json::Value),
}

impl FirestoreValue {
    /// 转为字符串；null 视为不存在，其他类型原样渲染
    pub fn to_opaque_string(&self) -> Option<String> {
        match self {
            FirestoreValue::NullValue(_) => None,
            FirestoreValue::StringValue(s)
            | FirestoreValue::TimestampValue(s)
            | FirestoreValue::BytesValue(s)
            | FirestoreValue::ReferenceValue(s) => Some(s.clone()),
            FirestoreValue::BooleanValue(b) => Some(b.to_string()),
            FirestoreValue::DoubleValue(d) => Some(d.to_string()),
            FirestoreValue::IntegerValue(v) => Some(match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
            FirestoreValue::GeoPointValue(v)
            | FirestoreValue::ArrayValue(v)
            | FirestoreValue::MapValue(v) => Some(v.to_string()),
        }
    }
}

/// Firestore 文档快照
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FirestoreDocument {
    pub name: String,
    #[serde(default)]
    pub fields: HashMap<String, FirestoreValue>,
    #[serde(default)]
    pub create_time: Option<String>,
    #[serde(default)]
    pub update_time: Option<String>,
}

/// `DocumentEventData` 的 JSON 形式
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentEventData {
    #[serde(default)]
    pub value: Option<FirestoreDocument>,
    #[serde(default)]
    pub old_value: Option<FirestoreDocument>,
}

/// 一条设备 token 记录。token 按不透明字符串处理，不做本地校验
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenRecord {
    pub token: Option<String>,
}

impl TokenRecord {
    pub fn from_fields(fields: &HashMap<String, FirestoreValue>) -> Self {
        Self {
            token: fields.get("token").and_then(FirestoreValue::to_opaque_string),
        }
    }
}

/// 解码后的 CloudEvent
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerEnvelope {
    pub id: String,
    pub event_type: String,
    pub source: Option<String>,
    pub subject: Option<String>,
    pub data: DocumentEventData,
}

#[derive(Debug, Deserialize)]
struct StructuredCloudEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    data: Option<DocumentEventData>,
}

/// `application/json`、`text/json` 或 `*/*+json`（忽略参数）
fn is_json_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || essence == "text/json" || essence.ends_with("+json")
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

impl TriggerEnvelope {
    /// 从 HTTP 请求解码
    pub fn from_http(headers: &HeaderMap, body: &[u8]) -> Result<Self> {
        let content_type = header_str(headers, header::CONTENT_TYPE.as_str()).unwrap_or("");

        if content_type.starts_with(STRUCTURED_CONTENT_TYPE) {
            let event: StructuredCloudEvent = serde_json::from_slice(body)
                .map_err(|e| ServerError::BadRequest(format!("invalid structured CloudEvent: {}", e)))?;
            let data = event
                .data
                .ok_or_else(|| ServerError::BadRequest("CloudEvent has no data".to_string()))?;
            return Ok(Self {
                id: event.id,
                event_type: event.event_type,
                source: event.source,
                subject: event.subject,
                data,
            });
        }

        let id = header_str(headers, "ce-id")
            .ok_or_else(|| ServerError::BadRequest("missing ce-id header".to_string()))?;
        let event_type = header_str(headers, "ce-type")
            .ok_or_else(|| ServerError::BadRequest("missing ce-type header".to_string()))?;

        let data: DocumentEventData = if body.is_empty() {
            DocumentEventData::default()
        } else if !content_type.is_empty() && !is_json_content_type(content_type) {
            return Err(ServerError::BadRequest(format!(
                "unsupported event data content type {}; the trigger must deliver JSON-encoded DocumentEventData",
                content_type
            )));
        } else {
            serde_json::from_slice(body)
                .map_err(|e| ServerError::BadRequest(format!("invalid DocumentEventData: {}", e)))?
        };

        Ok(Self {
            id: id.to_string(),
            event_type: event_type.to_string(),
            source: header_str(headers, "ce-source").map(str::to_string),
            subject: header_str(headers, "ce-subject").map(str::to_string),
            data,
        })
    }

    pub fn is_document_created(&self) -> bool {
        self.event_type == DOCUMENT_CREATED_EVENT_TYPE
            || self.event_type == DOCUMENT_CREATED_WITH_AUTH_EVENT_TYPE
    }

    /// 文档路径：优先使用快照的资源名，其次 subject
    pub fn document_path(&self) -> Option<&str> {
        self.data
            .value
            .as_ref()
            .map(|doc| doc.name.as_str())
            .filter(|name| !name.is_empty())
            .or(self.subject.as_deref())
    }
}

/// 新建 token 记录事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentCreatedEvent {
    pub event_id: String,
    pub document: String,
    pub token_id: String,
    pub create_time: Option<String>,
    pub record: TokenRecord,
}

impl DocumentCreatedEvent {
    /// 同一次文档创建的标识，用于识别重投
    pub fn delivery_key(&self) -> String {
        match &self.create_time {
            Some(ts) => format!("{}@{}", self.document, ts),
            None => self.event_id.clone(),
        }
    }
}

/// 事件分类结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerDecision {
    Created(DocumentCreatedEvent),
    Ignored(String),
}

/// 将 CloudEvent 归类为 token 创建事件或忽略
pub fn classify(envelope: TriggerEnvelope, pattern: &DocumentPattern) -> Result<TriggerDecision> {
    if !envelope.is_document_created() {
        return Ok(TriggerDecision::Ignored(format!(
            "unsupported event type {}",
            envelope.event_type
        )));
    }

    let document = envelope
        .document_path()
        .ok_or_else(|| ServerError::BadRequest("event carries no document path".to_string()))?
        .to_string();

    let params = match pattern.matches(&document) {
        Some(params) => params,
        None => {
            return Ok(TriggerDecision::Ignored(format!(
                "document {} does not match {}",
                document,
                pattern.as_str()
            )))
        }
    };

    let token_id = pattern
        .record_param()
        .and_then(|name| params.get(name).cloned())
        .unwrap_or_default();

    let (record, create_time) = match &envelope.data.value {
        Some(doc) => (TokenRecord::from_fields(&doc.fields), doc.create_time.clone()),
        None => (TokenRecord::default(), None),
    };

    Ok(TriggerDecision::Created(DocumentCreatedEvent {
        event_id: envelope.id,
        document,
        token_id,
        create_time,
        record,
    }))
}
