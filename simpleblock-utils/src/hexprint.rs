use std::fmt::Write;

const BYTES_PER_LINE: usize = 16;
const BYTES_PER_GROUP: usize = 4;

/// Format `buf` as a hex dump, one line per 16 bytes. The address column
/// starts from `start`, so a sector can be dumped at its position on disk.
///
/// ```text
/// 0x00000200    48 65 6C 6C  6F 00 00 00  00 00 00 00  00 00 00 00  |Hello...........|
/// ```
pub fn hex_dump(buf: &[u8], start: usize) -> String {
    let lines = buf.chunks(BYTES_PER_LINE);
    let mut str = String::with_capacity(lines.len() * 80);
    for (i, line) in lines.enumerate() {
        if i > 0 {
            str.push('\n');
        }
        write!(str, "{:#010X}   ", start + i * BYTES_PER_LINE).unwrap();
        for (j, byte) in line.iter().enumerate() {
            if j > 0 && j % BYTES_PER_GROUP == 0 {
                str.push(' ');
            }
            write!(str, " {:02X}", byte).unwrap();
        }
        // Pad a short final line so the ASCII column stays aligned.
        let missing = BYTES_PER_LINE - line.len();
        let missing_gaps = (BYTES_PER_LINE - 1) / BYTES_PER_GROUP
            - line.len().saturating_sub(1) / BYTES_PER_GROUP;
        for _ in 0..(missing * 3 + missing_gaps) {
            str.push(' ');
        }
        str.push_str("  |");
        str.extend(line.iter().map(|&b| printable(b)));
        str.push('|');
    }
    str
}

fn printable(chr: u8) -> char {
    match chr {
        32..=126 => chr.into(),
        _ => '.',
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_line() {
        let mut buf = b"Hello".to_vec();
        buf.resize(16, 0);
        assert_eq!(
            hex_dump(&buf, 0x200),
            "0x00000200    48 65 6C 6C  6F 00 00 00  00 00 00 00  00 00 00 00  |Hello...........|"
        );
    }

    #[test]
    fn test_short_line_is_padded() {
        let full = hex_dump(&[0x41; 16], 0);
        let short = hex_dump(&[0x41; 5], 0);
        // The ASCII column starts at the same position.
        assert_eq!(full.find('|'), short.find('|'));
        assert!(short.ends_with("|AAAAA|"));
    }

    #[test]
    fn test_multiple_lines() {
        let dump = hex_dump(&[0xFF; 40], 0x10);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("0x00000010"));
        assert!(lines[1].starts_with("0x00000020"));
        assert!(lines[2].starts_with("0x00000030"));
    }

    #[test]
    fn test_empty() {
        assert_eq!(hex_dump(&[], 0), "");
    }
}
