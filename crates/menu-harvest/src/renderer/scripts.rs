//! Page scripts run through [`RenderContext::execute_js`](super::RenderContext::execute_js).
//!
//! Every script starts with a `/* harvest:<name> ... */` marker. Browsers
//! ignore it; the scripted test browser uses it to recognise the request.

/// Marker prefix shared by all scripts.
pub const MARKER_PREFIX: &str = "harvest:";

/// Scroll to the current bottom of the document; returns the new height.
pub const SCROLL_TO_BOTTOM: &str = r#"/* harvest:scroll */
(() => {
  window.scrollTo(0, document.body.scrollHeight);
  return document.body.scrollHeight;
})()"#;

/// Shared predicate: visible, clickable controls in document order.
const VISIBLE_CONTROLS: &str = r#"
  const controls = Array.from(document.querySelectorAll(
    "button, [role='button'], a[class*='button'], a[class*='btn'], input[type='button'], input[type='submit']"
  )).filter(el => {
    const style = window.getComputedStyle(el);
    const rect = el.getBoundingClientRect();
    return style.visibility !== 'hidden' && style.display !== 'none' && rect.width > 0 && rect.height > 0;
  });"#;

/// List the text and `aria-label` of the first `limit` visible controls.
///
/// Returns `[{ "text": "...", "aria": "..." }, ...]`.
pub fn scan_controls(limit: usize) -> String {
    format!(
        r#"/* harvest:scan-controls limit={limit} */
(() => {{{VISIBLE_CONTROLS}
  return controls.slice(0, {limit}).map(el => ({{
    text: (el.innerText || el.value || '').trim(),
    aria: (el.getAttribute('aria-label') || '').trim()
  }}));
}})()"#
    )
}

/// Click the control at `index` of the list [`scan_controls`] returned.
///
/// Returns `true` when a control was clicked.
pub fn click_control(index: usize) -> String {
    format!(
        r#"/* harvest:click-control index={index} */
(() => {{{VISIBLE_CONTROLS}
  const target = controls[{index}];
  if (!target) return false;
  target.click();
  return true;
}})()"#
    )
}

/// Rendered text (`innerText`) of the first container present, else `<body>`.
pub fn rendered_text(content_selectors: &[String]) -> String {
    let selectors = serde_json::to_string(content_selectors).unwrap_or_else(|_| "[]".into());
    format!(
        r#"/* harvest:rendered-text */
(() => {{
  for (const sel of {selectors}) {{
    const el = document.querySelector(sel);
    if (el && el.innerText && el.innerText.trim().length > 0) return el.innerText;
  }}
  return document.body ? document.body.innerText : '';
}})()"#
    )
}

/// The `name` of a script, from its marker, if it has one.
pub fn script_name(script: &str) -> Option<&str> {
    let start = script.find(MARKER_PREFIX)? + MARKER_PREFIX.len();
    let rest = &script[start..];
    let end = rest.find(|c: char| c.is_whitespace() || c == '*')?;
    Some(&rest[..end])
}

/// A numeric `key=value` argument from a script's marker.
pub fn script_arg(script: &str, key: &str) -> Option<usize> {
    let marker_end = script.find("*/")?;
    let marker = &script[..marker_end];
    let needle = format!("{key}=");
    let start = marker.find(&needle)? + needle.len();
    marker[start..]
        .chars()
        .take_while(char::is_ascii_digit)
        .collect::<String>()
        .parse()
        .ok()
}
