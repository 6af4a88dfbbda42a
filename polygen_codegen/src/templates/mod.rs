//! Emitters for the generated C/C++ sources. Every function here is pure:
//! the same context always produces the same text.

pub(crate) mod export_bridge;
pub(crate) mod host;
pub(crate) mod import_bridge;
pub(crate) mod static_module;

pub(crate) const HEADER: &str = "\
/*
 * This file was generated by polygen. Do not edit it, changes are
 * overwritten the next time the module is generated.
 */
";

const INDENT: &str = "  ";

/// Line-oriented text builder with indentation tracking.
pub(crate) struct SourceWriter {
    output: String,
    indent: usize,
}

impl SourceWriter {
    pub(crate) fn new() -> Self {
        Self {
            output: String::from(HEADER),
            indent: 0,
        }
    }

    pub(crate) fn line(&mut self, line: impl AsRef<str>) -> &mut Self {
        let line = line.as_ref();
        if !line.is_empty() {
            for _ in 0..self.indent {
                self.output.push_str(INDENT);
            }
            self.output.push_str(line);
        }
        self.output.push('\n');
        self
    }

    pub(crate) fn blank(&mut self) -> &mut Self {
        self.line("")
    }

    pub(crate) fn indent(&mut self) -> &mut Self {
        self.indent += 1;
        self
    }

    pub(crate) fn dedent(&mut self) -> &mut Self {
        self.indent = self.indent.saturating_sub(1);
        self
    }

    /// Writes `line` and indents what follows until the matching [`close`].
    ///
    /// [`close`]: SourceWriter::close
    pub(crate) fn open(&mut self, line: impl AsRef<str>) -> &mut Self {
        self.line(line).indent()
    }

    pub(crate) fn close(&mut self, line: impl AsRef<str>) -> &mut Self {
        self.dedent().line(line)
    }

    pub(crate) fn finish(self) -> String {
        self.output
    }
}

/// Renders `value` as a C string literal.
pub(crate) fn quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for byte in value.bytes() {
        match byte {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            0x20..=0x7e => out.push(byte as char),
            _ => out.push_str(&format!("\\{:03o}", byte)),
        }
    }
    out.push('"');
    out
}

/// Makes `value` safe to embed in a block comment.
pub(crate) fn comment_text(value: &str) -> String {
    value.replace("*/", "* /")
}
