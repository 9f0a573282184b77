//! Ports - 抽象化レイヤー
//!
//! ストアが外部に依存する部分（時刻、ID 生成、キーのシリアライズ）を
//! trait として切り出し、テストで差し替えられるようにします。

pub mod clock;
pub mod codec;
pub mod id_generator;

pub use self::clock::{Clock, FixedClock, ManualClock, SystemClock};
pub use self::codec::{JsonKeyCodec, KeyCodec};
pub use self::id_generator::{IdGenerator, UlidGenerator};
