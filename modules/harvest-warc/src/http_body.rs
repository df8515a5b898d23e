/// Split a raw WARC response record body into its HTTP header block and
/// message body, then dechunk the body if `Transfer-Encoding: chunked` is
/// present. Recording proxies write the full wire response (status line,
/// headers, body) as the record payload; downstream item parsing only wants
/// the payload.
pub fn extract_http_body(raw: &[u8]) -> Vec<u8> {
    let Some(split_at) = find_header_boundary(raw) else {
        return raw.to_vec();
    };
    let (header_block, body) = raw.split_at(split_at);

    if is_chunked(header_block) {
        dechunk(body)
    } else {
        body.to_vec()
    }
}

fn find_header_boundary(raw: &[u8]) -> Option<usize> {
    raw.windows(4).position(|w| w == b"\r\n\r\n").map(|i| i + 4)
}

fn is_chunked(header_block: &[u8]) -> bool {
    let text = String::from_utf8_lossy(header_block).to_lowercase();
    text.lines()
        .any(|line| line.starts_with("transfer-encoding:") && line.contains("chunked"))
}

/// Decode HTTP/1.1 chunked transfer encoding. Malformed input (a missing or
/// unparsable chunk-size line) stops decoding and returns what was
/// successfully decoded so far rather than erroring — recording proxies
/// occasionally truncate the final zero-length chunk on abrupt connection
/// close.
fn dechunk(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len());
    let mut cursor = 0;

    loop {
        let Some(line_end) = body[cursor..].windows(2).position(|w| w == b"\r\n") else {
            break;
        };
        let size_line = &body[cursor..cursor + line_end];
        let size_str = String::from_utf8_lossy(size_line);
        let size_str = size_str.split(';').next().unwrap_or("").trim();
        let Ok(size) = usize::from_str_radix(size_str, 16) else {
            break;
        };

        cursor += line_end + 2;
        if size == 0 {
            break;
        }
        if cursor + size > body.len() {
            out.extend_from_slice(&body[cursor..]);
            break;
        }
        out.extend_from_slice(&body[cursor..cursor + size]);
        cursor += size + 2; // skip trailing CRLF after chunk data
    }

    out
}
