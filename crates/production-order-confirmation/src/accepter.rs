//! Accepter 词表与解析策略
//!
//! 调用方在消息中声明需要读取的子资源（accepter），本模块把请求列表
//! 展开为实际派发的列表：空列表或首元素为 "All" 时展开为完整的五项，
//! 否则原样透传，不校验名称是否在词表内。

use std::fmt;
use std::str::FromStr;

use crate::error::ConfirmationError;

/// 请求全部 accepter 的字面量
pub const ALL: &str = "All";

/// 可读取的子资源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Accepter {
    ConfByOrderId,
    MaterialMovements,
    BatchCharacteristic,
    ConfByOrderIdConfGroup,
    ConfByOrderIdSeqOp,
}

impl Accepter {
    /// 规范顺序，"All" 展开时按此顺序派发
    pub const CANONICAL: [Accepter; 5] = [
        Accepter::ConfByOrderId,
        Accepter::MaterialMovements,
        Accepter::BatchCharacteristic,
        Accepter::ConfByOrderIdConfGroup,
        Accepter::ConfByOrderIdSeqOp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfByOrderId => "ConfByOrderID",
            Self::MaterialMovements => "MaterialMovements",
            Self::BatchCharacteristic => "BatchCharacteristic",
            Self::ConfByOrderIdConfGroup => "ConfByOrderIDConfGroup",
            Self::ConfByOrderIdSeqOp => "ConfByOrderIDSeqOp",
        }
    }
}

impl fmt::Display for Accepter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Accepter {
    type Err = ConfirmationError;

    /// 名称区分大小写，与消息中的写法严格一致
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::CANONICAL
            .into_iter()
            .find(|accepter| accepter.as_str() == s)
            .ok_or_else(|| ConfirmationError::UnknownAccepter(s.to_string()))
    }
}

/// 把请求的 accepter 列表解析为实际派发的列表
///
/// - 空列表等价于 `["All"]`
/// - 只检查首元素是否为 "All"：`["x", "All"]` 不会展开
/// - 其余情况原样返回，未知名称交给 API 调用方处理
pub fn resolve_accepters(requested: &[String]) -> Vec<String> {
    match requested.first() {
        None => canonical_accepters(),
        Some(first) if first == ALL => canonical_accepters(),
        Some(_) => requested.to_vec(),
    }
}

fn canonical_accepters() -> Vec<String> {
    Accepter::CANONICAL
        .iter()
        .map(|accepter| accepter.as_str().to_string())
        .collect()
}
