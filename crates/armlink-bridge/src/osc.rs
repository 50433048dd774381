//! OSC 1.0 编解码
//!
//! 只实现桥接需要的子集：
//!
//! | 类型标签 | 含义 | 映射 |
//! |---------|------|------|
//! | `i` / `h` | int32 / int64（大端） | `BusArg::Int` |
//! | `f` / `d` | float32 / float64（大端） | `BusArg::Float` |
//! | `s` / `S` | 以 0 结尾、4 字节对齐的字符串 | `BusArg::Str` |
//! | `T` / `F` | 布尔（无数据） | `BusArg::Int(1/0)` |
//! | `N` / `I` / `b` | nil / impulse / blob | 忽略 |
//!
//! 编码时整数优先用 `i`（超出 i32 范围用 `h`），浮点统一用 `f`：
//! 常见控制面软件对 `d` 支持不一致。
//!
//! 与推送流不同，OSC 全部是**大端**字节序。

use crate::bus::{BusArg, BusMessage};
use crate::error::BusError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

const BUNDLE_TAG: &[u8] = b"#bundle\0";

/// 嵌套 bundle 的最大深度
const MAX_BUNDLE_DEPTH: usize = 8;

/// 编码一条消息
pub fn encode_message(message: &BusMessage) -> Result<Bytes, BusError> {
    if !message.address.starts_with('/') {
        return Err(BusError::Encode(format!(
            "address must start with '/': {:?}",
            message.address
        )));
    }

    let mut buf = BytesMut::with_capacity(message.address.len() + 8 + message.args.len() * 8);
    put_string(&mut buf, &message.address)?;

    let mut tags = String::with_capacity(message.args.len() + 1);
    tags.push(',');
    for arg in &message.args {
        tags.push(match arg {
            BusArg::Int(v) if i32::try_from(*v).is_ok() => 'i',
            BusArg::Int(_) => 'h',
            BusArg::Float(_) => 'f',
            BusArg::Str(_) => 's',
        });
    }
    put_string(&mut buf, &tags)?;

    for arg in &message.args {
        match arg {
            BusArg::Int(v) => match i32::try_from(*v) {
                Ok(small) => buf.put_i32(small),
                Err(_) => buf.put_i64(*v),
            },
            BusArg::Float(v) => buf.put_f32(*v as f32),
            BusArg::Str(s) => put_string(&mut buf, s)?,
        }
    }

    Ok(buf.freeze())
}

/// 解码一个数据报（单条消息或 bundle），返回其中的所有消息
pub fn decode_packet(packet: &[u8]) -> Result<Vec<BusMessage>, BusError> {
    let mut out = Vec::new();
    decode_into(packet, 0, &mut out)?;
    Ok(out)
}

fn decode_into(packet: &[u8], depth: usize, out: &mut Vec<BusMessage>) -> Result<(), BusError> {
    if packet.starts_with(BUNDLE_TAG) {
        if depth >= MAX_BUNDLE_DEPTH {
            return Err(malformed("bundle nesting too deep"));
        }
        let mut buf = &packet[BUNDLE_TAG.len()..];
        if buf.remaining() < 8 {
            return Err(malformed("bundle time tag truncated"));
        }
        // 时间标签：立即执行，忽略
        buf.advance(8);

        while buf.has_remaining() {
            if buf.remaining() < 4 {
                return Err(malformed("bundle element size truncated"));
            }
            let size = buf.get_i32();
            let size = usize::try_from(size).map_err(|_| malformed("negative element size"))?;
            if size > buf.remaining() {
                return Err(malformed("bundle element truncated"));
            }
            decode_into(&buf[..size], depth + 1, out)?;
            buf.advance(size);
        }
        Ok(())
    } else {
        out.push(decode_message(packet)?);
        Ok(())
    }
}

/// 解码单条消息
pub fn decode_message(packet: &[u8]) -> Result<BusMessage, BusError> {
    let mut buf = packet;
    let address = take_string(&mut buf)?;
    if !address.starts_with('/') {
        return Err(malformed(format!("bad address {:?}", address)));
    }

    // 没有类型标签字符串的旧式消息：视为无参数
    if !buf.has_remaining() {
        return Ok(BusMessage::new(address, Vec::new()));
    }

    let tags = take_string(&mut buf)?;
    let tags = tags
        .strip_prefix(',')
        .ok_or_else(|| malformed("type tag string must start with ','"))?;

    let mut args = Vec::with_capacity(tags.len());
    for tag in tags.chars() {
        match tag {
            'i' => args.push(BusArg::Int(i64::from(take_i32(&mut buf)?))),
            'h' => {
                need(buf, 8)?;
                args.push(BusArg::Int(buf.get_i64()));
            },
            'f' => {
                need(buf, 4)?;
                args.push(BusArg::Float(f64::from(buf.get_f32())));
            },
            'd' => {
                need(buf, 8)?;
                args.push(BusArg::Float(buf.get_f64()));
            },
            's' | 'S' => args.push(BusArg::Str(take_string(&mut buf)?)),
            'T' => args.push(BusArg::Int(1)),
            'F' => args.push(BusArg::Int(0)),
            'N' | 'I' => {},
            'b' => {
                let len = usize::try_from(take_i32(&mut buf)?)
                    .map_err(|_| malformed("negative blob size"))?;
                let padded = pad4(len);
                need(buf, padded)?;
                buf.advance(padded);
            },
            other => return Err(malformed(format!("unsupported type tag '{}'", other))),
        }
    }

    Ok(BusMessage::new(address, args))
}

fn malformed(msg: impl Into<String>) -> BusError {
    BusError::Malformed(msg.into())
}

fn pad4(len: usize) -> usize {
    (len + 3) & !3
}

fn need(buf: &[u8], n: usize) -> Result<(), BusError> {
    if buf.len() < n {
        return Err(malformed(format!(
            "argument truncated: need {} bytes, {} left",
            n,
            buf.len()
        )));
    }
    Ok(())
}

fn take_i32(buf: &mut &[u8]) -> Result<i32, BusError> {
    need(buf, 4)?;
    Ok(buf.get_i32())
}

fn put_string(buf: &mut BytesMut, s: &str) -> Result<(), BusError> {
    if s.as_bytes().contains(&0) {
        return Err(BusError::Encode(format!("string contains NUL: {:?}", s)));
    }
    let padded = pad4(s.len() + 1);
    buf.put_slice(s.as_bytes());
    buf.put_bytes(0, padded - s.len());
    Ok(())
}

fn take_string(buf: &mut &[u8]) -> Result<String, BusError> {
    let end = buf
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| malformed("unterminated string"))?;
    let s = std::str::from_utf8(&buf[..end])
        .map_err(|_| malformed("string is not UTF-8"))?
        .to_owned();
    let padded = pad4(end + 1);
    need(buf, padded)?;
    buf.advance(padded);
    Ok(s)
}
