//! Server-rendered pages. Templates are compiled into the binary.
//!
//! User-supplied text is HTML-escaped and substituted last, so it can never
//! be mistaken for a placeholder.

use std::convert::Infallible;

use anyhow::Result;
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use hyper::{Response, StatusCode};

use crate::handlers::utils::deliver_html;

const BASE: &str = include_str!("../../templates/base.html");
const HOME: &str = include_str!("../../templates/home.html");
const LOGIN: &str = include_str!("../../templates/login.html");
const TAREAS: &str = include_str!("../../templates/tareas.html");
const UNAUTHORIZED: &str = include_str!("../../templates/unauthorized.html");

const NAV_LOGGED_IN: &str =
    r#"    <a href="/tareas">Tareas</a> | <a href="/logout">Cerrar sesión</a>"#;
const NAV_LOGGED_OUT: &str =
    r#"    <a href="/">Inicio</a> | <a href="/login_home">Iniciar sesión</a>"#;

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

fn layout(title: &str, logged_in: bool, content: &str) -> String {
    let nav = if logged_in {
        NAV_LOGGED_IN
    } else {
        NAV_LOGGED_OUT
    };
    BASE.replacen("{{title}}", title, 1)
        .replacen("{{nav}}", nav, 1)
        .replacen("{{content}}", content, 1)
}

pub fn render_home(logged_in: bool) -> String {
    layout("Inicio", logged_in, HOME)
}

pub fn render_login(logged_in: bool) -> String {
    layout("Iniciar sesión", logged_in, LOGIN)
}

pub fn render_tareas(username: &str) -> String {
    let content = TAREAS.replacen("{{usuario}}", &escape_html(username), 1);
    layout("Tareas", true, &content)
}

pub fn render_unauthorized() -> String {
    layout("No autorizado", false, UNAUTHORIZED)
}

/// The "not logged in" page, always with status 401.
pub fn deliver_unauthorized_page() -> Result<Response<BoxBody<Bytes, Infallible>>> {
    deliver_html(render_unauthorized(), StatusCode::UNAUTHORIZED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_html(r#"<script>alert("x") & 'y'</script>"#),
            "&lt;script&gt;alert(&quot;x&quot;) &amp; &#x27;y&#x27;&lt;/script&gt;"
        );
        assert_eq!(escape_html("alice"), "alice");
    }

    #[test]
    fn tareas_shows_escaped_username() {
        let page = render_tareas("<b>alice</b>");
        assert!(page.contains("&lt;b&gt;alice&lt;/b&gt;"));
        assert!(!page.contains("<b>alice</b>"));
        assert!(page.contains("/logout"));
    }

    #[test]
    fn placeholder_like_usernames_are_left_alone() {
        let page = render_tareas("{{nav}}");
        assert!(page.contains("{{nav}}"));
    }

    #[test]
    fn no_placeholders_survive() {
        for page in [
            render_home(false),
            render_login(false),
            render_tareas("alice"),
            render_unauthorized(),
        ] {
            assert!(!page.contains("{{"), "{}", page);
        }
    }

    #[test]
    fn login_form_posts_to_login_home() {
        let page = render_login(false);
        assert!(page.contains(r#"action="/login_home""#));
        assert!(page.contains(r#"name="usuario""#));
        assert!(page.contains(r#"name="contraseña""#));
    }
}
