//! `ProcBuilder` — an indentation-aware string accumulator for the emitted procedure body.
//!
//! Builds DOT/Mermaid/ASCII-style text line-by-line with `output.push_str(&format!(...))`
//! rather than through a host-language AST. The emitter renders JS/TS-shaped procedure
//! text the same way: direct string lines, no intermediate tree. The addition over a flat
//! accumulator is the indent stack, since emitted procedures nest (`try`/`catch`,
//! `if`/`else`, scope closures) far deeper than a graph renderer's output ever does.

#[derive(Debug, Default)]
pub struct ProcBuilder {
    out: String,
    indent: usize,
}

impl ProcBuilder {
    pub fn new() -> Self {
        Self { out: String::new(), indent: 0 }
    }

    /// Append one line at the current indent level.
    pub fn line(&mut self, text: impl AsRef<str>) -> &mut Self {
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
        self.out.push_str(text.as_ref());
        self.out.push('\n');
        self
    }

    /// Append a blank line (no indentation, for readability between node emissions).
    pub fn blank(&mut self) -> &mut Self {
        self.out.push('\n');
        self
    }

    /// Emit `text {` and increase the indent for everything until the matching
    /// [`ProcBuilder::close_block`].
    pub fn open_block(&mut self, text: impl AsRef<str>) -> &mut Self {
        self.line(format!("{} {{", text.as_ref()));
        self.indent += 1;
        self
    }

    /// Close the most recently opened block, emitting a bare `}` (or `} <text>` when a
    /// trailer like `else {` is needed).
    pub fn close_block(&mut self) -> &mut Self {
        self.indent = self.indent.saturating_sub(1);
        self.line("}");
        self
    }

    /// Close a block and immediately reopen another on the same line, e.g. `} else {`.
    pub fn close_and_open(&mut self, text: impl AsRef<str>) -> &mut Self {
        self.indent = self.indent.saturating_sub(1);
        self.line(format!("}} {} {{", text.as_ref()));
        self.indent += 1;
        self
    }

    pub fn indent(&mut self) {
        self.indent += 1;
    }

    pub fn dedent(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    pub fn finish(self) -> String {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nests_blocks_with_two_space_indent() {
        let mut pb = ProcBuilder::new();
        pb.open_block("if (x)");
        pb.line("doThing();");
        pb.close_block();
        assert_eq!(pb.finish(), "if (x) {\n  doThing();\n}\n");
    }

    #[test]
    fn close_and_open_emits_single_line_else() {
        let mut pb = ProcBuilder::new();
        pb.open_block("if (x)");
        pb.line("a();");
        pb.close_and_open("else");
        pb.line("b();");
        pb.close_block();
        assert_eq!(pb.finish(), "if (x) {\n  a();\n} else {\n  b();\n}\n");
    }
}
