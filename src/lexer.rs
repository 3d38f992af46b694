//! A module implementing lexical analysis (tokenization) of one input line into argument words.
//!
//! Quoting follows the usual shell conventions with one deliberate asymmetry: inside double
//! quotes a backslash only escapes `$`, `` ` ``, `"`, `\` and newline, while outside of quotes
//! it escapes any following character.

/// Characters a backslash may escape inside double quotes.
const DOUBLE_QUOTE_ESCAPES: [char; 5] = ['$', '`', '"', '\\', '\n'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Unquoted,
    ReadingSingleQuote,
    ReadingDoubleQuote,
}

struct LexingFSM {
    state: LexingState,
    escape_next: bool,
    buffer: String,
    tokens: Vec<String>,
}

impl LexingFSM {
    fn new() -> Self {
        LexingFSM {
            state: LexingState::Unquoted,
            escape_next: false,
            buffer: String::new(),
            tokens: Vec::new(),
        }
    }

    /// Runs the state machine over `line` and returns the collected words.
    ///
    /// Unbalanced quotes are not an error: whatever was accumulated becomes the last word.
    fn make_tokens(mut self, line: &str) -> Vec<String> {
        for ch in line.chars() {
            match self.state {
                LexingState::Unquoted => self.handle_unquoted(ch),
                LexingState::ReadingSingleQuote => self.handle_single_quote(ch),
                LexingState::ReadingDoubleQuote => self.handle_double_quote(ch),
            }
        }

        self.finalize_current_word();
        self.tokens
    }

    fn handle_unquoted(&mut self, ch: char) {
        if self.escape_next {
            self.escape_next = false;
            self.buffer.push(ch);
            return;
        }

        match ch {
            '\\' => self.escape_next = true,
            '\'' => self.state = LexingState::ReadingSingleQuote,
            '"' => self.state = LexingState::ReadingDoubleQuote,
            ' ' => self.finalize_current_word(),
            c => self.buffer.push(c),
        }
    }

    fn handle_single_quote(&mut self, ch: char) {
        match ch {
            '\'' => self.state = LexingState::Unquoted,
            c => self.buffer.push(c),
        }
    }

    fn handle_double_quote(&mut self, ch: char) {
        if self.escape_next {
            self.escape_next = false;
            if !DOUBLE_QUOTE_ESCAPES.contains(&ch) {
                self.buffer.push('\\');
            }
            self.buffer.push(ch);
            return;
        }

        match ch {
            '\\' => self.escape_next = true,
            '"' => self.state = LexingState::Unquoted,
            c => self.buffer.push(c),
        }
    }

    fn finalize_current_word(&mut self) {
        if !self.buffer.is_empty() {
            self.tokens.push(std::mem::take(&mut self.buffer));
        }
    }
}

/// The main entry point function to perform lexical analysis.
///
/// Splits `line` on unquoted spaces. Quote characters are removed, adjacent quoted and
/// unquoted segments join into a single word (`'foo'bar` becomes `foobar`), and runs of
/// spaces never produce empty words. This never fails.
pub fn split_into_tokens(line: &str) -> Vec<String> {
    LexingFSM::new().make_tokens(line)
}
