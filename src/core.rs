//! The protocol core: the sender and receiver engines.
//! 协议核心：发送端与接收端引擎。

pub mod chunker;
pub mod receiver;
pub mod sender;

#[cfg(test)]
pub mod test_utils;
