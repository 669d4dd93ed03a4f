//! Portal pages.

use crate::config::Credential;

const PAGE_HEAD: &str = "<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"utf-8\">\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\
<title>AP Configure</title></head><body>";

const ADD_FORM: &str = "<form action=\"/add\" method=\"get\"><table><tbody>\
<tr><td><label for=\"ssid\">SSID</label></td><td><input id=\"ssid\" name=\"ssid\" maxlength=\"32\"/></td></tr>\
<tr><td><label for=\"pass\">Password</label></td><td><input id=\"pass\" name=\"pass\" type=\"password\" maxlength=\"64\"/></td></tr>\
<tr><td><button type=\"submit\">Add</button></td></tr>\
</tbody></table></form><br/>";

const PAGE_TAIL: &str = "</body></html>";

/// Escape text for HTML element and attribute content.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Link that removes `credential`.
pub fn remove_link(credential: &Credential) -> String {
    format!(
        "/remove?ssid={}&pass={}",
        urlencoding::encode(credential.ssid()),
        urlencoding::encode(credential.password())
    )
}

/// Root page: add form followed by the saved networks.
pub fn render_root(credentials: &[Credential]) -> String {
    let mut page = String::from(PAGE_HEAD);
    page.push_str(ADD_FORM);
    page.push_str("<table><tbody>");
    for credential in credentials {
        page.push_str(&format!(
            "<tr><td><a href=\"{}\">&times;</a></td><td>{}</td><td>-</td><td>{}</td></tr>",
            escape_html(&remove_link(credential)),
            escape_html(credential.ssid()),
            if credential.is_open() { "open" } else { "********" }
        ));
    }
    page.push_str("</tbody></table>");
    page.push_str(PAGE_TAIL);
    page
}

/// Acknowledgement sent before the restart.
pub fn render_rebooting() -> String {
    format!("{}The device will now reboot.{}", PAGE_HEAD, PAGE_TAIL)
}
