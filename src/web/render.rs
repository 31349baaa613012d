//! HTML fragments for the server-rendered pages.

use axum::response::Html;

use crate::predictions::{Prediction, PredictionType};

/// Escapes text for use in element content and quoted attributes.
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

const STYLE: &str = "body{font-family:system-ui,sans-serif;margin:0;background:#f5f7fa;color:#222}\
nav{background:#1f3a5f;padding:.8rem 1.5rem}nav a{color:#fff;margin-right:1rem;text-decoration:none}\
main{max-width:960px;margin:1.5rem auto;padding:0 1rem}\
.cards{display:flex;gap:1rem;flex-wrap:wrap}.card{background:#fff;border-radius:8px;padding:1rem 1.5rem;\
box-shadow:0 1px 3px rgba(0,0,0,.1);flex:1;min-width:160px}\
table{width:100%;border-collapse:collapse;background:#fff}td,th{padding:.5rem;border-bottom:1px solid #ddd;text-align:left}\
form label{display:block;margin:.4rem 0}input{padding:.3rem;width:14rem}\
#result{margin-top:1rem;font-weight:bold}";

const SCRIPT: &str = r#"<script>
async function submitJson(form, url, onOk) {
  const data = {};
  for (const [k, v] of new FormData(form).entries()) {
    data[k] = form.dataset.numeric === "true" && v !== "" ? Number(v) : v;
  }
  const res = await fetch(url, {
    method: "POST",
    headers: {"Content-Type": "application/json"},
    credentials: "same-origin",
    body: JSON.stringify(data)
  });
  const body = await res.json().catch(() => ({}));
  const out = document.getElementById("result");
  if (res.ok) { onOk(body, out); } else { out.textContent = body.error || ("Request failed: " + res.status); }
}
</script>"#;

/// Wraps `body` in the site layout. `username` switches the navigation to
/// the signed-in variant.
pub fn layout(title: &str, username: Option<&str>, body: &str) -> Html<String> {
    let nav = match username {
        Some(name) => format!(
            r##"<a href="/dashboard">Dashboard</a><a href="/traffic">Traffic</a>
<a href="/air-quality">Air quality</a><a href="/energy">Energy</a><a href="/history">History</a>
<a href="#" onclick="fetch('/auth/logout',{{method:'POST'}}).then(()=>location.href='/')">Log out ({})</a>"##,
            escape(name)
        ),
        None => r#"<a href="/">Smart City</a>"#.to_string(),
    };
    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>{title} | Smart City</title><style>{STYLE}</style></head>
<body><nav>{nav}</nav><main>{body}</main>{SCRIPT}</body>
</html>"#,
        title = escape(title),
    ))
}

/// Table of predictions, newest first.
pub fn prediction_table(rows: &[Prediction]) -> String {
    if rows.is_empty() {
        return "<p>No predictions yet.</p>".to_string();
    }
    let body: String = rows
        .iter()
        .map(|p| {
            let kind = PredictionType::parse(&p.prediction_type)
                .map(PredictionType::title)
                .unwrap_or("Unknown");
            let confidence = p
                .confidence
                .map(|c| format!("{:.1}%", c * 100.0))
                .unwrap_or_else(|| "-".into());
            format!(
                "<tr><td>{}</td><td>{:.2}</td><td>{}</td><td>{}</td><td><code>{}</code></td></tr>",
                escape(kind),
                p.prediction_result,
                confidence,
                escape(&p.created_at.to_string()),
                escape(&p.input_data.to_string()),
            )
        })
        .collect();
    format!(
        "<table><thead><tr><th>Type</th><th>Result</th><th>Confidence</th><th>Created</th><th>Input</th></tr></thead><tbody>{body}</tbody></table>"
    )
}

/// Form with one numeric input per field that posts to `endpoint` and
/// shows `result_js(body)` on success.
pub fn prediction_form(endpoint: &str, fields: &[&str], result_js: &str) -> String {
    let inputs: String = fields
        .iter()
        .map(|f| {
            format!(
                r#"<label>{name} <input name="{name}" type="number" step="any" required></label>"#,
                name = escape(f)
            )
        })
        .collect();
    format!(
        r#"<form data-numeric="true" onsubmit="event.preventDefault(); submitJson(this, '{endpoint}', (body, out) => {{ out.textContent = {result_js}; }})">
{inputs}<button type="submit">Predict</button></form><div id="result"></div>"#,
        endpoint = escape(endpoint),
    )
}
