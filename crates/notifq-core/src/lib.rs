//! notifq-core
//!
//! In-process, time-ordered notification queue.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, queue_name, key, notification）
//! - **ports**: 抽象化レイヤー（Clock, IdGenerator, KeyCodec）
//! - **queue**: 時刻順ストア + キュー facade + キューサービス + retry policy
//! - **runtime**: handler trait と key_type ごとの registry
//! - **dispatcher**: ready なエントリを handler に流すポーリングループ
//! - **config**: TOML 設定
//! - **observability**: 件数スナップショット
//! - **error**: エラー型

pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod error;
pub mod observability;
pub mod ports;
pub mod queue;
pub mod runtime;

pub use config::QueueConfig;
pub use dispatcher::{DispatchReport, Dispatcher, DispatcherHandle};
pub use error::{HandlerError, NotifqError};
pub use queue::{InMemoryNotificationQueue, NotificationQueue, NotificationQueueService, NotificationStore};
