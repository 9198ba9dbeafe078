//! Server-Sent Events parsing (the receiving side — decoding an observed
//! `text/event-stream` body into events).

/// True if `content_type` names the SSE media type.
#[must_use]
pub fn is_sse(content_type: &str) -> bool {
    content_type.to_ascii_lowercase().contains("text/event-stream")
}

/// One decoded SSE event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub id: Option<String>,
    /// Multi-line `data:` fields joined with `\n`, in encounter order.
    pub data: String,
}

/// Parse an SSE body into its events.
///
/// Per the RFC: events are separated by a blank line; `data:`, `event:`,
/// `id:` are recognized fields; lines starting with `:` are comments and
/// ignored; a bare field name with no `:` is treated as that field with an
/// empty value.
#[must_use]
pub fn parse_sse(body: &str) -> Vec<SseEvent> {
    let mut events = Vec::new();
    let mut current = SseEvent::default();
    let mut data_lines: Vec<&str> = Vec::new();
    let mut has_content = false;

    let flush = |current: &mut SseEvent, data_lines: &mut Vec<&str>, events: &mut Vec<SseEvent>, has_content: &mut bool| {
        if *has_content {
            current.data = data_lines.join("\n");
            events.push(std::mem::take(current));
        }
        data_lines.clear();
        *has_content = false;
    };

    for line in body.lines() {
        if line.is_empty() {
            flush(&mut current, &mut data_lines, &mut events, &mut has_content);
            continue;
        }
        if line.starts_with(':') {
            continue;
        }

        let (field, value) = match line.split_once(':') {
            Some((f, v)) => (f, v.strip_prefix(' ').unwrap_or(v)),
            None => (line, ""),
        };

        match field {
            "data" => {
                data_lines.push(value);
                has_content = true;
            }
            "event" => {
                current.event = Some(value.to_string());
                has_content = true;
            }
            "id" => {
                current.id = Some(value.to_string());
                has_content = true;
            }
            _ => {}
        }
    }
    flush(&mut current, &mut data_lines, &mut events, &mut has_content);

    events
}
