//! Domain identifiers (strongly-typed IDs).
//!
//! ULID ベースの ID + Phantom type パターン。
//!
//! ## ULID の特性
//! - **文字列順 = 数値順**: Crockford base32 は順序を保存するので、
//!   `Ord` の結果は正規文字列表現の辞書順と一致する
//! - **分散生成可能**: 調整なしで複数ノードで生成できる
//! - **UUID互換**: 128-bit
//!
//! `NotificationId` はストア内の順序付けの第二キーとして使われるため、
//! この「全順序であること」が重要になる。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
///
/// Display で使うプレフィックス（"notif-", "token-"）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
///
/// `T` は PhantomData で、実行時にはメモリを消費しませんが、
/// コンパイル時に型安全性を提供します。
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    /// ULID から Id を作成
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    /// 内部の ULID を取得
    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }

    /// Parse the `Display` form (`<prefix><ulid>`) or a bare ULID string.
    pub fn parse(s: &str) -> Option<Self> {
        let raw = s.strip_prefix(T::prefix()).unwrap_or(s);
        Ulid::from_string(raw).ok().map(Self::from_ulid)
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

// ========================================
// マーカー型の定義
// ========================================

/// Notification のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Notification {}

impl IdMarker for Notification {
    fn prefix() -> &'static str {
        "notif-"
    }
}

/// 呼び出し側が渡す相関トークンのマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Token {}

impl IdMarker for Token {
    fn prefix() -> &'static str {
        "token-"
    }
}

/// Identifier of a scheduled notification entry.
pub type NotificationId = Id<Notification>;

/// Caller-supplied correlation token, carried through to the handler untouched.
pub type UserToken = Id<Token>;

/// Account reference used to group notifications per owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OwnerId(u64);

impl OwnerId {
    pub fn new(account_record_id: u64) -> Self {
        Self(account_record_id)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_types() {
        let ulid1 = Ulid::new();
        let ulid2 = Ulid::new();

        let notification = NotificationId::from_ulid(ulid1);
        let token = UserToken::from_ulid(ulid2);

        assert_eq!(notification.as_ulid(), ulid1);
        assert_eq!(token.as_ulid(), ulid2);

        assert!(notification.to_string().starts_with("notif-"));
        assert!(token.to_string().starts_with("token-"));
        // let _: NotificationId = token; // <- does not compile
    }

    #[test]
    fn ord_matches_canonical_string_order() {
        let mut ids: Vec<NotificationId> = (0..64)
            .map(|_| NotificationId::from_ulid(Ulid::from_parts(1_700_000_000_000, rand::random())))
            .collect();
        ids.sort();

        let as_strings: Vec<String> = ids.iter().map(|id| id.as_ulid().to_string()).collect();
        let mut sorted_strings = as_strings.clone();
        sorted_strings.sort();

        assert_eq!(as_strings, sorted_strings);
    }

    #[test]
    fn parse_accepts_display_and_bare_forms() {
        let id = NotificationId::from_ulid(Ulid::new());

        assert_eq!(NotificationId::parse(&id.to_string()), Some(id));
        assert_eq!(NotificationId::parse(&id.as_ulid().to_string()), Some(id));
        assert_eq!(NotificationId::parse("notif-not-a-ulid"), None);
    }

    #[test]
    fn ids_can_be_serialized() {
        let id = NotificationId::from_ulid(Ulid::new());

        let serialized = serde_json::to_string(&id).unwrap();
        let deserialized: NotificationId = serde_json::from_str(&serialized).unwrap();

        assert_eq!(id, deserialized);
    }

    #[test]
    fn phantom_data_does_not_consume_memory() {
        use std::mem::size_of;

        assert_eq!(size_of::<NotificationId>(), size_of::<Ulid>());
        assert_eq!(size_of::<UserToken>(), size_of::<Ulid>());
    }
}
