//! gRPC-Web framing: 1-byte flag + 4-byte big-endian length + payload.

use base64::Engine as _;

/// `flag` byte marking the trailer frame (ASCII `key: value\r\n` headers as
/// its payload); any other flag (normally `0x00`) marks a data frame.
const FLAG_TRAILER: u8 = 0x80;

/// True if `content_type` (already expected lower-cased) names gRPC-Web.
#[must_use]
pub fn is_grpc_web(content_type: &str) -> bool {
    let ct = content_type.to_ascii_lowercase();
    ct.contains("grpc-web") || ct.contains("grpc+proto")
}

/// True if `content_type` is the base64-wrapped `grpc-web-text` subtype.
#[must_use]
pub fn is_grpc_web_text(content_type: &str) -> bool {
    content_type.to_ascii_lowercase().contains("grpc-web-text")
}

/// One gRPC-Web frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub is_trailer: bool,
    pub payload: Vec<u8>,
}

/// Parse a gRPC-Web body into its constituent frames.
///
/// Returns `None` on any structural inconsistency (a declared length that
/// runs past the end of the buffer) rather than erroring.
#[must_use]
pub fn parse_frames(body: &[u8]) -> Option<Vec<Frame>> {
    let mut frames = Vec::new();
    let mut pos = 0usize;

    while pos < body.len() {
        let flag = *body.get(pos)?;
        pos += 1;
        let len_bytes: [u8; 4] = body.get(pos..pos + 4)?.try_into().ok()?;
        pos += 4;
        let len = u32::from_be_bytes(len_bytes) as usize;
        let payload = body.get(pos..pos + len)?.to_vec();
        pos += len;

        frames.push(Frame {
            is_trailer: flag & FLAG_TRAILER != 0,
            payload,
        });
    }

    Some(frames)
}

/// Decode a `grpc-web-text` body (base64-wrapped) into its frames.
#[must_use]
pub fn parse_text_frames(body: &str) -> Option<Vec<Frame>> {
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(body.trim())
        .ok()?;
    parse_frames(&decoded)
}
