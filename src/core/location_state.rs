use crate::protocol::Location;

/// Reading head over the `#`-tokens of the current location.
///
/// Tab menus built while a view is constructed each take the next token in
/// turn; the depth they got it at is where they later write their selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationStateCursor {
    tokens: Vec<String>,
    cursor: usize,
}

impl LocationStateCursor {
    pub fn from_location(location: &Location) -> Self {
        Self {
            tokens: location.tokens.clone(),
            cursor: 0,
        }
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Token under the cursor and its depth; the cursor moves on only when a
    /// token was there.
    pub fn next_token(&mut self) -> (Option<String>, usize) {
        match self.tokens.get(self.cursor) {
            Some(token) => {
                let out = (Some(token.clone()), self.cursor);
                self.cursor += 1;
                out
            }
            None => (None, self.cursor),
        }
    }

    /// Keep the first `depth` tokens, append `token`, and continue reading
    /// right after it.
    pub fn resize_and_append(&mut self, depth: usize, token: &str) {
        if depth > self.tokens.len() {
            log::debug!(
                "location state shorter ({}) than tab depth {depth}",
                self.tokens.len()
            );
        }
        self.tokens.truncate(depth);
        self.tokens.push(token.to_string());
        self.cursor = self.tokens.len();
    }

    /// `location` carrying the current state tokens.
    pub fn location_with_state(&self, location: &Location) -> Location {
        location.with_tokens(self.tokens.clone())
    }

    /// Where `location` would point after `resize_and_append(depth, token)`,
    /// without changing anything.
    pub fn location_after_resize_and_append(
        &self,
        location: &Location,
        depth: usize,
        token: &str,
    ) -> Location {
        let mut tokens: Vec<String> = self.tokens.iter().take(depth).cloned().collect();
        tokens.push(token.to_string());
        location.with_tokens(tokens)
    }
}
