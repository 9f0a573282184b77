//! NotificationKey - 型付き通知キー
//!
//! Task trait と同じく、関連定数で型の識別子（discriminator）を宣言します。
//! ストアはペイロードを不透明なテキストとして保持し、
//! この識別子だけを型情報として一緒に保存します。

use serde::Serialize;
use serde::de::DeserializeOwned;

/// A typed notification key payload.
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct InvoiceDue {
///     invoice_id: u64,
/// }
///
/// impl NotificationKey for InvoiceDue {
///     const KEY_TYPE: &'static str = "billing.invoice.due.v1";
/// }
/// ```
pub trait NotificationKey: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// 型の識別子
    ///
    /// # 命名規約
    /// - `{service}.{domain}.{event}.v{major}`
    const KEY_TYPE: &'static str;
}
