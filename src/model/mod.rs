//! 数据模型。

pub mod generic;
