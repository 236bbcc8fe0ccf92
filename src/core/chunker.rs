//! Splits a byte stream into payload-sized chunks before it is handed to the
//! sender engine.
//!
//! 在交给发送端引擎之前，将字节流切分为载荷大小的数据块。

use bytes::Bytes;

/// Splits `data` into consecutive chunks of at most `chunk_size` bytes.
///
/// The chunks share the underlying buffer with `data`. An empty input yields
/// no chunks. `chunk_size` must be positive.
///
/// 将 `data` 切分为最多 `chunk_size` 字节的连续数据块。
///
/// 数据块与 `data` 共享底层缓冲区。空输入不产生任何数据块。`chunk_size` 必须为正。
pub fn split_into_chunks(data: Bytes, chunk_size: usize) -> Vec<Bytes> {
    debug_assert!(chunk_size > 0, "chunk_size must be positive");
    let chunk_size = chunk_size.max(1);
    let mut chunks = Vec::with_capacity(data.len().div_ceil(chunk_size));
    let mut offset = 0;
    while offset < data.len() {
        let end = usize::min(offset + chunk_size, data.len());
        chunks.push(data.slice(offset..end));
        offset = end;
    }
    chunks
}
