//! A small indentation-aware source writer.

/// Accumulates generated source line by line.
#[derive(Debug, Default)]
pub struct SourceWriter {
    buf: String,
    indent: usize,
}

impl SourceWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if text.is_empty() {
            self.buf.push('\n');
            return;
        }
        for _ in 0..self.indent {
            self.buf.push_str("    ");
        }
        self.buf.push_str(text);
        self.buf.push('\n');
    }

    pub fn blank(&mut self) {
        // Avoid stacking blank lines.
        if !self.buf.ends_with("\n\n") && !self.buf.is_empty() {
            self.buf.push('\n');
        }
    }

    /// A `///` doc comment, split over lines.
    pub fn doc(&mut self, text: &str) {
        for line in text.lines() {
            if line.is_empty() {
                self.line("///");
            } else {
                self.line(format!("/// {line}"));
            }
        }
    }

    /// Opens a brace-delimited block; the closure writes its body.
    pub fn block(&mut self, header: &str, body: impl FnOnce(&mut Self)) {
        self.line(format!("{header} {{"));
        self.indent += 1;
        body(self);
        self.indent -= 1;
        self.line("}");
    }

    pub fn finish(self) -> String {
        self.buf
    }
}

/// `byIds` / `by_ids` / `BY_IDS` → `ByIds`
pub fn pascal_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = true;
    let uniform_case =
        name.chars().all(|c| !c.is_ascii_lowercase()) || name.chars().all(|c| !c.is_ascii_uppercase());
    let mut prev_lower = false;
    for ch in name.chars() {
        if ch == '_' || ch == '-' {
            upper_next = true;
            continue;
        }
        if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else if ch.is_ascii_uppercase() && prev_lower && !uniform_case {
            // camelCase boundary inside a mixed-case name.
            out.push(ch);
        } else if uniform_case {
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
        prev_lower = ch.is_ascii_lowercase();
    }
    out
}

/// `byIds` / `ByIds` → `by_ids`
pub fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for ch in name.chars() {
        if ch == '-' {
            out.push('_');
            prev_lower = false;
            continue;
        }
        if ch.is_ascii_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
            prev_lower = false;
        } else {
            out.push(ch);
            prev_lower = ch.is_ascii_lowercase() || ch.is_ascii_digit();
        }
    }
    out
}

/// Keeps generated identifiers legal Rust.
pub fn sanitize_ident(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.is_empty() || out.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    const RESERVED: &[&str] = &[
        "as", "box", "break", "const", "continue", "crate", "dyn", "else", "enum", "extern",
        "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub",
        "ref", "return", "self", "static", "struct", "super", "trait", "true", "false", "type",
        "unsafe", "use", "where", "while", "async", "await",
    ];
    if RESERVED.contains(&out.as_str()) {
        out.push('_');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_conversions() {
        assert_eq!(pascal_case("byIds"), "ByIds");
        assert_eq!(pascal_case("by_ids"), "ByIds");
        assert_eq!(pascal_case("UUID"), "Uuid");
        assert_eq!(snake_case("byIds"), "by_ids");
        assert_eq!(snake_case("ByIds"), "by_ids");
        assert_eq!(snake_case("id"), "id");
    }

    #[test]
    fn sanitized_identifiers_are_legal() {
        assert_eq!(sanitize_ident("type"), "type_");
        assert_eq!(sanitize_ident("1st"), "_1st");
        assert_eq!(sanitize_ident("a::b"), "a__b");
    }

    #[test]
    fn writer_indents_blocks() {
        let mut w = SourceWriter::new();
        w.block("pub struct Row", |w| {
            w.line("pub id: i64,");
        });
        assert_eq!(w.finish(), "pub struct Row {\n    pub id: i64,\n}\n");
    }
}
