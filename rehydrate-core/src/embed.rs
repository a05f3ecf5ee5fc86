//! Handing a mutation log from server-rendered markup to the client
//!
//! The log travels as a JSON `<script>` element placed at the end of the
//! document head. The client extracts it once at boot and removes the element.

use crate::capture::MutationLog;

/// `id` attribute of the embedded element
pub const EMBED_ELEMENT_ID: &str = "mutation-recorder";

const OPEN_TAG: &str = r#"<script type="application/json" id="mutation-recorder">"#;
const CLOSE_TAG: &str = "</script>";

/// Embed `log` into `html` just before `</head>`.
///
/// Documents without a head get the element appended. `</` inside the JSON is
/// written as `<\/` so string values cannot close the script element early.
pub fn inject(html: &str, log: &MutationLog) -> serde_json::Result<String> {
    let payload = log.to_json()?.replace("</", "<\\/");
    let element = format!("{OPEN_TAG}{payload}{CLOSE_TAG}");

    let mut out = String::with_capacity(html.len() + element.len());
    match html.to_ascii_lowercase().find("</head>") {
        Some(at) => {
            out.push_str(&html[..at]);
            out.push_str(&element);
            out.push_str(&html[at..]);
        }
        None => {
            out.push_str(html);
            out.push_str(&element);
        }
    }
    Ok(out)
}

/// Take the embedded log out of `html`.
///
/// Returns the JSON payload and the document with the element removed, or
/// `None` if the document carries no log. The payload is valid JSON as is:
/// `<\/` decodes to `</`.
pub fn extract(html: &str) -> Option<(String, String)> {
    let start = html.find(OPEN_TAG)?;
    let body = start + OPEN_TAG.len();
    let end = body + html[body..].find(CLOSE_TAG)?;

    let payload = html[body..end].to_string();
    let mut rest = String::with_capacity(html.len() - (end + CLOSE_TAG.len() - start));
    rest.push_str(&html[..start]);
    rest.push_str(&html[end + CLOSE_TAG.len()..]);
    Some((payload, rest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{MutationLog, MutationRecord};

    fn log() -> MutationLog {
        let mut log = MutationLog::new();
        log.push(MutationRecord::new("e1", "ui", "text", "A"));
        log
    }

    #[test]
    fn test_inject_places_element_at_end_of_head() {
        let html = "<html><head><title>t</title></HEAD><body></body></html>";
        let out = inject(html, &log()).unwrap();
        assert_eq!(
            out,
            "<html><head><title>t</title>\
             <script type=\"application/json\" id=\"mutation-recorder\">\
             [{\"id\":\"e1\",\"cat\":\"ui\",\"prop\":\"text\",\"val\":\"A\"}]\
             </script></HEAD><body></body></html>"
        );
    }

    #[test]
    fn test_inject_without_head_appends() {
        let out = inject("<p>hi</p>", &MutationLog::new()).unwrap();
        assert!(out.starts_with("<p>hi</p><script"));
        assert!(out.ends_with("[]</script>"));
    }

    #[test]
    fn test_script_close_in_values_is_escaped() {
        let mut log = MutationLog::new();
        log.push(MutationRecord::new("e1", "ui", "html", "</script><b>x</b>"));

        let html = inject("<head></head>", &log).unwrap();
        assert_eq!(html.matches("</script>").count(), 1);

        let (payload, rest) = extract(&html).unwrap();
        assert_eq!(rest, "<head></head>");
        let decoded = MutationLog::from_json(&payload, 10).unwrap();
        assert_eq!(decoded, log);
    }

    #[test]
    fn test_extract_without_element() {
        assert!(extract("<html><head></head></html>").is_none());
    }
}
