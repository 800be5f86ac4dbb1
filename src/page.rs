//! Page copy and the single-page chat UI served at `GET /`.

use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::prompt::Variant;

pub struct PageCopy {
    pub title: &'static str,
    /// Welcome text shown above the chat, one paragraph per entry.
    pub intro: &'static [&'static str],
    /// Corpus list shown under the intro.
    pub sources: &'static [&'static str],
    pub placeholder: &'static str,
}

const STRICT_COPY: PageCopy = PageCopy {
    title: "AA Chatbot",
    intro: &[
        "Welcome to an Alpha of An AA Chatbot, v0.2.1",
        "This chatbot is intended as an aid to living Alcoholics Anonymous' program.",
        "It is NOT MEANT TO REPLACE sponsorship, meetings, friends or AA literature. It is supplemental to your program.",
        "Being an alpha (in early development), expect for random things to fail. Also, expect the LLM model to flat out lie/hallucinate occasionally.",
        "This is a normal part of LLM software development. If these sorts of errors bug you, call your sponsor.",
    ],
    sources: &[
        "Alcoholics Anonymous (Big Book) - 4th Edition",
        "Twelve Steps and Twelve Traditions",
    ],
    placeholder: "Chat about the program of Alcoholics Anonymous ...",
};

const SIMPLE_COPY: PageCopy = PageCopy {
    title: "AA Literature Chatbot",
    intro: &["Ask questions about the Big Book and 12&12"],
    sources: &[],
    placeholder: "Ask about AA literature...",
};

pub fn copy_for(variant: Variant) -> &'static PageCopy {
    match variant {
        Variant::Strict => &STRICT_COPY,
        Variant::Simple => &SIMPLE_COPY,
    }
}

/// Render the chat page. The script creates one session per tab (kept in
/// `sessionStorage`) and talks to the JSON API.
pub fn render(variant: Variant) -> String {
    let copy = copy_for(variant);
    let title = encode_text(copy.title);

    let mut intro = String::new();
    for p in copy.intro {
        intro.push_str(&format!("<p>{}</p>\n", encode_text(p)));
    }
    if !copy.sources.is_empty() {
        intro.push_str("<hr>\n<p><strong>Current Sources:</strong></p>\n<ul>\n");
        for s in copy.sources {
            intro.push_str(&format!("<li>{}</li>\n", encode_text(s)));
        }
        intro.push_str("</ul>\n");
    }

    format!(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>
{style}</style>
</head>
<body>
<h1>&#128214; {title}</h1>
<section id="intro">
{intro}</section>
<hr>
<section id="gate" class="hidden">
<label>Password <input id="password" type="password" autocomplete="off"></label>
<p id="gate-error" class="error"></p>
</section>
<section id="chat" class="hidden">
<div id="transcript"></div>
<p id="status"></p>
<form id="chat-form">
<input id="chat-input" placeholder="{placeholder}" autocomplete="off">
<button type="submit">Send</button>
</form>
</section>
<script>
{script}</script>
</body>
</html>
"#,
        title = title,
        intro = intro,
        placeholder = encode_double_quoted_attribute(copy.placeholder),
        style = PAGE_STYLE,
        script = PAGE_SCRIPT,
    )
}

const PAGE_STYLE: &str = r#"body { font-family: system-ui, sans-serif; max-width: 46rem; margin: 2rem auto; padding: 0 1rem; }
.turn { white-space: pre-wrap; padding: .6rem .8rem; margin: .5rem 0; border-radius: .4rem; }
.user { background: #eef3fb; }
.assistant { background: #f6f6f6; }
.error { color: #b00020; }
blockquote { border-left: 3px solid #ccc; margin: .3rem 0; padding-left: .6rem; }
#chat-form { display: flex; gap: .5rem; margin-top: 1rem; }
#chat-input { flex: 1; padding: .5rem; }
.hidden { display: none; }
"#;

const PAGE_SCRIPT: &str = r#"const api = "/api/sessions";
let sessionId = sessionStorage.getItem("aa-chat-session");

function el(tag, cls, text) {
  const e = document.createElement(tag);
  if (cls) e.className = cls;
  if (text !== undefined) e.textContent = text;
  return e;
}

function addTurn(role, content) {
  document.getElementById("transcript").appendChild(el("div", "turn " + role, content));
}

function addSources(sources) {
  if (!sources || sources.length === 0) return;
  const d = el("details");
  d.appendChild(el("summary", null, "\u{1F4DA} View Source Material"));
  sources.forEach((s, i) => {
    d.appendChild(el("strong", null, "Source " + (i + 1) + ":"));
    d.appendChild(el("blockquote", null, s.text));
    if (s.metadata) d.appendChild(el("small", null, "Metadata: " + JSON.stringify(s.metadata)));
    d.appendChild(el("hr"));
  });
  document.getElementById("transcript").appendChild(d);
}

function show(view) {
  document.getElementById("gate").classList.toggle("hidden", !view.locked);
  document.getElementById("chat").classList.toggle("hidden", view.locked);
  document.getElementById("gate-error").textContent = view.error ? "\u{1F615} " + view.error : "";
}

async function newSession() {
  const res = await fetch(api, { method: "POST" });
  const created = await res.json();
  sessionId = created.id;
  sessionStorage.setItem("aa-chat-session", sessionId);
  return fetch(api + "/" + sessionId);
}

async function start() {
  let res = sessionId ? await fetch(api + "/" + sessionId) : null;
  if (!res || !res.ok) res = await newSession();
  const view = await res.json();
  view.turns.forEach(t => addTurn(t.role, t.content));
  show(view);
}

// The server ends idle sessions. Start over with a fresh one.
async function restart(status) {
  document.getElementById("transcript").replaceChildren();
  const view = await (await newSession()).json();
  show(view);
  status.className = "error";
  status.textContent = "Your session expired and a new one was started. Please ask again.";
}

document.getElementById("password").addEventListener("change", async (ev) => {
  const res = await fetch(api + "/" + sessionId + "/unlock", {
    method: "POST",
    headers: { "content-type": "application/json" },
    body: JSON.stringify({ password: ev.target.value }),
  });
  ev.target.value = "";
  if (res.status === 404) {
    await restart(document.getElementById("gate-error"));
    return;
  }
  const out = await res.json();
  show({ locked: !out.unlocked, error: out.error });
});

document.getElementById("chat-form").addEventListener("submit", async (ev) => {
  ev.preventDefault();
  const input = document.getElementById("chat-input");
  const content = input.value;
  if (content.trim() === "") return;
  input.value = "";
  input.disabled = true;
  addTurn("user", content);
  const status = document.getElementById("status");
  status.className = "";
  status.textContent = "Searching AA literature...";
  try {
    const res = await fetch(api + "/" + sessionId + "/messages", {
      method: "POST",
      headers: { "content-type": "application/json" },
      body: JSON.stringify({ content }),
    });
    if (res.status === 404) {
      await restart(status);
      return;
    }
    const out = await res.json();
    if (!res.ok) throw new Error(out.error ? out.error.message : res.statusText);
    status.textContent = "";
    addTurn("assistant", out.answer);
    addSources(out.sources);
  } catch (e) {
    status.className = "error";
    status.textContent = String(e.message || e);
  } finally {
    input.disabled = false;
    input.focus();
  }
});

start();
"#;
