//! HTML info pages.

use crate::platform::ChatSummary;

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Percent-encode one URL path segment.
fn segment(text: &str) -> String {
    url::form_urlencoded::byte_serialize(text.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>{title}</title>
    <style>
        body {{ font-family: sans-serif; margin: 2em; color: #222; }}
        table {{ border-collapse: collapse; }}
        td, th {{ padding: 4px 12px; border-bottom: 1px solid #ddd; text-align: left; }}
        code {{ background: #f4f4f4; padding: 0 4px; }}
        textarea {{ width: 40em; height: 8em; }}
    </style>
</head>
<body>
<h1>{title}</h1>
{body}
</body>
</html>
"#,
        title = escape(title),
        body = body
    )
}

pub fn index(host: &str, port: u16) -> String {
    let body = format!(
        r#"<p>Relay is listening on <code>{host}:{port}</code>.</p>
<ul>
    <li><code>/chats/&lt;secret&gt;/</code> lists the chats messages can be sent to</li>
    <li><code>/message/&lt;chat_id&gt;/&lt;secret&gt;/</code> sends the <code>msg</code> field</li>
    <li><code>/msg2/</code> sends <code>msg</code> signed with <code>md5</code></li>
    <li><code>/github-post-commit/&lt;chat_id&gt;/&lt;secret&gt;/</code> relays GitHub pushes</li>
    <li><code>/teamcity/&lt;chat_id&gt;/&lt;secret&gt;/</code> relays TeamCity builds</li>
</ul>
<p>The trailing slash is optional.</p>"#,
        host = escape(host),
        port = port
    );
    layout("Relay bot", &body)
}

pub fn chats(chats: &[ChatSummary], secret: &str) -> String {
    if chats.is_empty() {
        return layout(
            "Open chats",
            "<p>No chats yet. Add the bot to a chat and send <code>/chatid</code> there.</p>",
        );
    }

    let mut rows = String::new();
    for chat in chats {
        let last_seen = chat
            .last_seen
            .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "-".to_string());
        rows.push_str(&format!(
            r#"    <tr><td>{name}</td><td><code>{id}</code></td><td>{last_seen}</td><td><a href="/chat_message/{secret_seg}/{id_seg}/">send message</a></td></tr>
"#,
            name = escape(&chat.name),
            id = escape(chat.id.as_str()),
            last_seen = last_seen,
            secret_seg = escape(&segment(secret)),
            id_seg = escape(&segment(chat.id.as_str())),
        ));
    }

    let body = format!(
        "<table>\n    <tr><th>Name</th><th>Chat id</th><th>Last seen</th><th></th></tr>\n{}</table>",
        rows
    );
    layout("Open chats", &body)
}

pub fn chat_message(chat_id: &str, secret: &str) -> String {
    let body = format!(
        r#"<p>Chat <code>{id}</code></p>
<form method="post" action="/message/{id_seg}/{secret_seg}/">
    <p><textarea name="msg"></textarea></p>
    <p><button type="submit">Send</button></p>
</form>"#,
        id = escape(chat_id),
        id_seg = escape(&segment(chat_id)),
        secret_seg = escape(&segment(secret)),
    );
    layout("Send message", &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::ChatId;

    #[test]
    fn test_index_shows_host_and_port() {
        let html = index("0.0.0.0", 5000);
        assert!(html.contains("0.0.0.0:5000"));
    }

    #[test]
    fn test_chats_lists_each_chat() {
        let list = vec![
            ChatSummary {
                id: ChatId::from("-100"),
                name: "Ops <team>".to_string(),
                last_seen: None,
            },
            ChatSummary {
                id: ChatId::from("@releases"),
                name: "Releases".to_string(),
                last_seen: None,
            },
        ];
        let html = chats(&list, "s3cret");
        assert!(html.contains("Ops &lt;team&gt;"));
        assert!(html.contains(r#"href="/chat_message/s3cret/-100/""#));
        assert!(html.contains(r#"href="/chat_message/s3cret/%40releases/""#));
    }

    #[test]
    fn test_chats_empty() {
        assert!(chats(&[], "s3cret").contains("No chats yet"));
    }

    #[test]
    fn test_chat_message_form_targets_message_route() {
        let html = chat_message("-100", "a b");
        assert!(html.contains(r#"action="/message/-100/a%20b/""#));
        assert!(html.contains(r#"name="msg""#));
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape(r#"<a href="x">&'"#), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }
}
