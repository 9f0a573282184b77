//! KeyCodec port - 通知キーのシリアライズ境界
//!
//! ストアにとってペイロードは不透明なテキストです。
//! エンコード/デコードは呼び出し側が差し込む codec が担当します。

use crate::domain::NotificationKey;
use crate::error::NotifqError;

/// Pluggable serializer/deserializer pair for notification keys.
pub trait KeyCodec: Send + Sync {
    fn encode<K: NotificationKey>(&self, key: &K) -> Result<String, NotifqError>;

    fn decode<K: NotificationKey>(&self, payload: &str) -> Result<K, NotifqError>;
}

/// Default codec: JSON text via serde_json.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonKeyCodec;

impl KeyCodec for JsonKeyCodec {
    fn encode<K: NotificationKey>(&self, key: &K) -> Result<String, NotifqError> {
        serde_json::to_string(key).map_err(|e| NotifqError::Serialization(format!("json encode: {e}")))
    }

    fn decode<K: NotificationKey>(&self, payload: &str) -> Result<K, NotifqError> {
        serde_json::from_str(payload).map_err(|e| NotifqError::Serialization(format!("json decode: {e}")))
    }
}
