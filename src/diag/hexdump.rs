//! 规范 hex+ASCII 转储（每行 16 字节）

use core::fmt::{self, Write};

const BYTES_PER_LINE: usize = 16;

/// 按 `hexdump -C` 的格式输出
///
/// ```text
/// 00000000  aa aa aa aa 41 42 00 7f                           |....AB..|
/// ```
///
/// 不可打印字节显示为 `.`。`base` 加在每行的偏移上。
pub fn hexdump<W: Write>(out: &mut W, base: u64, bytes: &[u8]) -> fmt::Result {
    for (line, chunk) in bytes.chunks(BYTES_PER_LINE).enumerate() {
        write!(out, "{:08x} ", base + (line * BYTES_PER_LINE) as u64)?;

        for i in 0..BYTES_PER_LINE {
            if i % 8 == 0 {
                out.write_char(' ')?;
            }
            match chunk.get(i) {
                Some(b) => write!(out, "{:02x} ", b)?,
                None => out.write_str("   ")?,
            }
        }

        out.write_str(" |")?;
        for &b in chunk {
            let c = if (0x20..0x7f).contains(&b) { b as char } else { '.' };
            out.write_char(c)?;
        }
        out.write_str("|\n")?;
    }
    Ok(())
}
