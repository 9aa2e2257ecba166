use pulldown_cmark::{html, Options, Parser};

/// Renders a section's accumulated markdown to HTML. The whole buffer is
/// re-parsed on every call, so identical input always renders identically.
pub fn render_markdown(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(markdown, options);
    let mut rendered = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut rendered, parser);
    rendered
}
